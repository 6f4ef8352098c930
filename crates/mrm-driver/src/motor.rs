//! 电机板能力
//!
//! 速度范围 [-127, 127]，线上编码为 `speed + 128`。同一速度重复下发时
//! 不发帧；方向反转在编码前取反，调用方始终使用逻辑方向。

use crate::board::Board;
use crate::bus::CanBus;
use crate::error::DeviceError;
use crate::profile::{BoardProfile, Decoded};
use mrm_protocol::{BoardKind, ByteOrder, CommandCode, ProtocolError, require_len, speed_payload};
use tracing::{debug, warn};

/// 最大速度（绝对值）
pub const MAX_SPEED: i16 = 127;

/// 电机通道读数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MotorReading {
    /// 编码器计数
    pub encoder: i32,
}

/// 电机控制器类型
pub trait MotorProfile: BoardProfile<Reading = MotorReading> {}

/// 解码编码器帧 `[0x13, i32]`
pub(crate) fn decode_encoder(
    order: ByteOrder,
    code: u8,
    data: &[u8],
    reading: &mut MotorReading,
) -> Result<Decoded, ProtocolError> {
    if code != CommandCode::MeasureSending.code() {
        return Ok(Decoded::Unknown);
    }
    require_len(data, 5)?;
    reading.encoder = order.read_i32(data, 1).unwrap_or(reading.encoder);
    Ok(Decoded::Sample)
}

impl<P: MotorProfile> Board<P> {
    /// 设定电机方向反转（接线反向时使用）
    pub fn set_reversed(&mut self, motor: usize, reversed: bool) -> Result<(), DeviceError> {
        let device = self.device_mut(motor)?;
        if device.reversed != reversed {
            device.reversed = reversed;
            device.commanded_speed = None;
        }
        Ok(())
    }

    fn wire_speed(&self, motor: usize, speed: i16) -> Result<i16, DeviceError> {
        let device = self.device(motor)?;
        Ok(if device.reversed { -speed } else { speed })
    }

    /// 设定速度
    ///
    /// 超出范围的值被限幅；与上次下发相同则不发帧，返回 `false`。
    pub fn speed_set(
        &mut self,
        bus: &mut CanBus,
        motor: usize,
        speed: i16,
    ) -> Result<bool, DeviceError> {
        let speed = speed.clamp(-MAX_SPEED, MAX_SPEED);
        if self.device(motor)?.commanded_speed == Some(speed) {
            return Ok(false);
        }
        let wire = self.wire_speed(motor, speed)?;
        self.send_to(bus, motor, &speed_payload(CommandCode::SpeedSet, wire))?;
        self.devices[motor].commanded_speed = Some(speed);
        Ok(true)
    }

    /// 设定速度并等待设备确认
    pub fn speed_set_confirmed(
        &mut self,
        bus: &mut CanBus,
        motor: usize,
        speed: i16,
    ) -> Result<(), DeviceError> {
        let speed = speed.clamp(-MAX_SPEED, MAX_SPEED);
        let wire = self.wire_speed(motor, speed)?;
        let payload = speed_payload(CommandCode::SpeedSetRequestNotification, wire);
        self.notification_request(bus, motor, &payload)?;
        self.devices[motor].commanded_speed = Some(speed);
        Ok(())
    }

    /// 所有电机强制下发 0（不做去重）
    ///
    /// 某个通道发送失败时继续处理其余通道，返回第一个错误。
    pub fn stop_motors(&mut self, bus: &mut CanBus) -> Result<(), DeviceError> {
        let mut first_error = None;
        for motor in 0..self.devices.len() {
            let payload = speed_payload(CommandCode::SpeedSet, 0);
            match self.send_to(bus, motor, &payload) {
                Ok(()) => self.devices[motor].commanded_speed = Some(0),
                Err(e) => {
                    warn!("{} motor {}: stop failed: {}", P::KIND, motor, e);
                    self.devices[motor].commanded_speed = None;
                    first_error.get_or_insert(e);
                },
            }
        }
        debug!("{}: {} motor(s) stopped", P::KIND, self.devices.len());
        first_error.map_or(Ok(()), Err)
    }

    /// 编码器计数
    pub fn encoder(&mut self, bus: &mut CanBus, motor: usize) -> Result<i32, DeviceError> {
        Ok(self.reading(bus, motor)?.encoder)
    }
}

/// 电机输出（对象安全），供电机组与故障停机使用
pub trait MotorOutputs {
    fn kind(&self) -> BoardKind;
    fn motor_count(&self) -> usize;
    fn speed_set(
        &mut self,
        bus: &mut CanBus,
        motor: usize,
        speed: i16,
    ) -> Result<bool, DeviceError>;
    fn stop_motors(&mut self, bus: &mut CanBus) -> Result<(), DeviceError>;
}

impl<P: MotorProfile> MotorOutputs for Board<P> {
    fn kind(&self) -> BoardKind {
        P::KIND
    }

    fn motor_count(&self) -> usize {
        self.len()
    }

    fn speed_set(
        &mut self,
        bus: &mut CanBus,
        motor: usize,
        speed: i16,
    ) -> Result<bool, DeviceError> {
        Board::<P>::speed_set(self, bus, motor, speed)
    }

    fn stop_motors(&mut self, bus: &mut CanBus) -> Result<(), DeviceError> {
        Board::<P>::stop_motors(self, bus)
    }
}
