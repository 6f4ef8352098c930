//! mrm-col-can，6 通道颜色传感器
//!
//! 原始模式（`0x10`）发送 6 个通道；计算模式（`0x15`）发送 HSV 与
//! 设备端识别的图案编号。
//!
//! | code | 负载 |
//! |------|------|
//! | 0x04 | 通道 0-2（u16 LE） |
//! | 0x05 | 通道 3-5（u16 LE） |
//! | 0x06 | hue u16 LE, saturation u8, value u8 |
//! | 0x16 | 图案编号 u8 |

use crate::board::Board;
use crate::bus::CanBus;
use crate::error::DeviceError;
use crate::profile::{BoardProfile, Decoded, StreamPolicy, read_u16_group};
use crate::sensor::CalculatedDataProfile;
use mrm_protocol::{BoardKind, CommandCode, ProtocolError, require_len};
use std::time::Duration;

const COLORS_0_2: u8 = 0x04;
const COLORS_3_5: u8 = 0x05;
const HSV: u8 = 0x06;

/// 颜色通道（按波长排序）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorChannel {
    Violet = 0,
    Blue = 1,
    Green = 2,
    Yellow = 3,
    Orange = 4,
    Red = 5,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColorReading {
    pub channels: [u16; 6],
    pub hue: u16,
    pub saturation: u8,
    pub value: u8,
    pub pattern: u8,
}

pub struct ColorSensor;

impl BoardProfile for ColorSensor {
    const KIND: BoardKind = BoardKind::Color;
    const STREAM: StreamPolicy = StreamPolicy::with_staleness(Duration::from_secs(30));
    type Reading = ColorReading;

    fn decode(
        code: u8,
        data: &[u8],
        reading: &mut ColorReading,
    ) -> Result<Decoded, ProtocolError> {
        let order = Self::BYTE_ORDER;
        match code {
            COLORS_0_2 => read_u16_group(order, data, &mut reading.channels, 0, 3)?,
            COLORS_3_5 => read_u16_group(order, data, &mut reading.channels, 3, 3)?,
            HSV => {
                require_len(data, 5)?;
                reading.hue = order.read_u16(data, 1).unwrap_or(reading.hue);
                reading.saturation = data[3];
                reading.value = data[4];
            },
            c if c == CommandCode::CalculatedSending.code() => {
                require_len(data, 2)?;
                reading.pattern = data[1];
            },
            _ => return Ok(Decoded::Unknown),
        }
        Ok(Decoded::Sample)
    }
}

impl CalculatedDataProfile for ColorSensor {}

impl Board<ColorSensor> {
    /// 单个通道的强度
    pub fn channel(
        &mut self,
        bus: &mut CanBus,
        sensor: usize,
        channel: ColorChannel,
    ) -> Result<u16, DeviceError> {
        Ok(self.reading(bus, sensor)?.channels[channel as usize])
    }

    pub fn color_red(&mut self, bus: &mut CanBus, sensor: usize) -> Result<u16, DeviceError> {
        self.channel(bus, sensor, ColorChannel::Red)
    }

    pub fn color_green(&mut self, bus: &mut CanBus, sensor: usize) -> Result<u16, DeviceError> {
        self.channel(bus, sensor, ColorChannel::Green)
    }

    pub fn color_blue(&mut self, bus: &mut CanBus, sensor: usize) -> Result<u16, DeviceError> {
        self.channel(bus, sensor, ColorChannel::Blue)
    }

    /// `(hue, saturation, value)`，计算模式
    pub fn hsv(&mut self, bus: &mut CanBus, sensor: usize) -> Result<(u16, u8, u8), DeviceError> {
        let reading = self.calculated_reading(bus, sensor)?;
        Ok((reading.hue, reading.saturation, reading.value))
    }

    /// 设备识别出的图案编号，计算模式
    pub fn pattern(&mut self, bus: &mut CanBus, sensor: usize) -> Result<u8, DeviceError> {
        Ok(self.calculated_reading(bus, sensor)?.pattern)
    }
}
