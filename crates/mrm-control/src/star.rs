//! 全向（星形）组合
//!
//! 四个全向轮依次安装在 45°、135°、225°、315°（0° 为正前方，逆时针为正），
//! 轮 k 的速度为 `speed · sin(θk − α) + rotation`。

use crate::{apply, clamp_and_scale};
use mrm_driver::{CanBus, DeviceError, MotorOutputs};
use tracing::trace;

/// 车轮安装角（度）
pub const WHEEL_ANGLES_DEG: [f32; 4] = [45.0, 135.0, 225.0, 315.0];

/// 计算四个轮速
///
/// `angle_deg` 为期望运动方向，`rotation` 叠加到每个轮上实现自转。
pub fn star_speeds(speed: i16, angle_deg: f32, rotation: i16, speed_limit: i16) -> [i16; 4] {
    let speed = speed as f32;
    let rotation = rotation as f32;
    let raw = WHEEL_ANGLES_DEG
        .map(|theta| speed * (theta - angle_deg).to_radians().sin() + rotation);
    clamp_and_scale(raw, speed_limit)
}

/// 全向电机组
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorGroupStar {
    motors: [usize; 4],
}

impl MotorGroupStar {
    /// 电机序号依次对应 45°、135°、225°、315° 的车轮
    pub fn new(motors: [usize; 4]) -> Self {
        Self { motors }
    }

    pub fn motors(&self) -> [usize; 4] {
        self.motors
    }

    pub fn go(
        &self,
        outputs: &mut dyn MotorOutputs,
        bus: &mut CanBus,
        speed: i16,
        angle_deg: f32,
        rotation: i16,
        speed_limit: i16,
    ) -> Result<[i16; 4], DeviceError> {
        let speeds = star_speeds(speed, angle_deg, rotation, speed_limit);
        trace!("star go ({speed}, {angle_deg}°, {rotation}) -> {speeds:?}");
        apply(outputs, bus, self.motors, speeds)?;
        Ok(speeds)
    }

    pub fn stop(
        &self,
        outputs: &mut dyn MotorOutputs,
        bus: &mut CanBus,
    ) -> Result<(), DeviceError> {
        apply(outputs, bus, self.motors, [0; 4])
    }
}
