//! # MRM Control
//!
//! 电机组合：把整车运动指令分解成四个电机的速度，再逐个调用
//! [`MotorOutputs::speed_set`]。不持有协议状态。
//!
//! 两种组合共用同一限速策略：每个轮速先限幅到 ±127，若最大绝对值
//! 超过 `speed_limit`，所有轮速按同一比例缩小到限值；从不放大。

pub mod differential;
pub mod star;

pub use differential::{MotorGroupDifferential, differential_speeds};
pub use star::{MotorGroupStar, star_speeds};

use mrm_driver::{CanBus, DeviceError, MAX_SPEED, MotorOutputs};

/// 限幅后按比例缩放
pub fn clamp_and_scale(raw: [f32; 4], speed_limit: i16) -> [i16; 4] {
    let max = MAX_SPEED as f32;
    let limit = speed_limit.clamp(0, MAX_SPEED) as f32;
    let clamped = raw.map(|s| s.clamp(-max, max));
    let peak = clamped.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    let factor = if peak > limit { limit / peak } else { 1.0 };
    clamped.map(|s| ((s * factor).round() as i16).clamp(-MAX_SPEED, MAX_SPEED))
}

/// 向四个电机下发速度
fn apply(
    outputs: &mut dyn MotorOutputs,
    bus: &mut CanBus,
    motors: [usize; 4],
    speeds: [i16; 4],
) -> Result<(), DeviceError> {
    for (motor, speed) in motors.into_iter().zip(speeds) {
        outputs.speed_set(bus, motor, speed)?;
    }
    Ok(())
}
