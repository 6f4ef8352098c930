//! mrm-ref-can，9 路反射传感器
//!
//! 原始模式按三帧发送 9 路模拟量（`0x04`-`0x06`，每帧 3 个 u16 LE）；
//! 计算模式 `0x16` 发送设备端阈值判断后的"暗"位图（u16 LE，bit k = 传感器 k）。

use crate::board::Board;
use crate::bus::CanBus;
use crate::error::DeviceError;
use crate::profile::{BoardProfile, Decoded, read_u16_group};
use crate::sensor::CalculatedDataProfile;
use mrm_protocol::{BoardKind, CommandCode, ProtocolError, require_len};

/// 每块板的传感器数
pub const REFLECTANCE_SENSORS: usize = 9;

const GROUP_FIRST: u8 = 0x04;
const GROUP_LAST: u8 = 0x06;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReflectanceReading {
    pub analog: [u16; REFLECTANCE_SENSORS],
    pub dark_mask: u16,
}

pub struct ReflectanceArray;

impl BoardProfile for ReflectanceArray {
    const KIND: BoardKind = BoardKind::Reflectance;
    type Reading = ReflectanceReading;

    fn decode(
        code: u8,
        data: &[u8],
        reading: &mut ReflectanceReading,
    ) -> Result<Decoded, ProtocolError> {
        match code {
            GROUP_FIRST..=GROUP_LAST => {
                let first = 3 * (code - GROUP_FIRST) as usize;
                read_u16_group(Self::BYTE_ORDER, data, &mut reading.analog, first, 3)?;
            },
            c if c == CommandCode::CalculatedSending.code() => {
                require_len(data, 3)?;
                reading.dark_mask = Self::BYTE_ORDER.read_u16(data, 1).unwrap_or(0);
            },
            _ => return Ok(Decoded::Unknown),
        }
        Ok(Decoded::Sample)
    }
}

impl CalculatedDataProfile for ReflectanceArray {}

impl Board<ReflectanceArray> {
    /// 模拟量
    pub fn analog(
        &mut self,
        bus: &mut CanBus,
        board: usize,
        sensor: usize,
    ) -> Result<u16, DeviceError> {
        let reading = self.reading(bus, board)?;
        Ok(reading.analog.get(sensor).copied().unwrap_or(0))
    }

    /// 传感器是否在暗线上方（计算模式）
    pub fn dark(
        &mut self,
        bus: &mut CanBus,
        board: usize,
        sensor: usize,
    ) -> Result<bool, DeviceError> {
        let reading = self.calculated_reading(bus, board)?;
        Ok(sensor < REFLECTANCE_SENSORS && reading.dark_mask & (1 << sensor) != 0)
    }
}
