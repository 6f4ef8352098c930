//! mrm-ir-finder3，红外球定位
//!
//! 原始模式 `0x04`-`0x07` 每帧 3 个 u16 LE，共 12 个传感器；
//! 计算模式 `0x16`：`[0x16, angle i16 LE, distance u16 LE, near u8]`。

use crate::board::Board;
use crate::bus::CanBus;
use crate::error::DeviceError;
use crate::profile::{BoardProfile, Decoded, read_u16_group};
use crate::sensor::CalculatedDataProfile;
use mrm_protocol::{BoardKind, CommandCode, ProtocolError, require_len};

pub const IR_FINDER_SENSORS: usize = 12;

const RAW_FIRST: u8 = 0x04;
const RAW_LAST: u8 = 0x07;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IrFinderReading {
    pub raw: [u16; IR_FINDER_SENSORS],
    /// 球的方向（度，0 为正前方，顺时针为正）
    pub angle_deg: i16,
    pub distance: u16,
    pub near: bool,
}

pub struct IrFinder;

impl BoardProfile for IrFinder {
    const KIND: BoardKind = BoardKind::IrFinder;
    type Reading = IrFinderReading;

    fn decode(
        code: u8,
        data: &[u8],
        reading: &mut IrFinderReading,
    ) -> Result<Decoded, ProtocolError> {
        let order = Self::BYTE_ORDER;
        match code {
            RAW_FIRST..=RAW_LAST => {
                let first = 3 * (code - RAW_FIRST) as usize;
                read_u16_group(order, data, &mut reading.raw, first, 3)?;
            },
            c if c == CommandCode::CalculatedSending.code() => {
                require_len(data, 6)?;
                reading.angle_deg = order.read_i16(data, 1).unwrap_or(0);
                reading.distance = order.read_u16(data, 3).unwrap_or(0);
                reading.near = data[5] != 0;
            },
            _ => return Ok(Decoded::Unknown),
        }
        Ok(Decoded::Sample)
    }
}

impl CalculatedDataProfile for IrFinder {}

impl Board<IrFinder> {
    pub fn raw(
        &mut self,
        bus: &mut CanBus,
        finder: usize,
        sensor: usize,
    ) -> Result<u16, DeviceError> {
        Ok(self.reading(bus, finder)?.raw.get(sensor).copied().unwrap_or(0))
    }

    pub fn angle(&mut self, bus: &mut CanBus, finder: usize) -> Result<i16, DeviceError> {
        Ok(self.calculated_reading(bus, finder)?.angle_deg)
    }

    pub fn distance(&mut self, bus: &mut CanBus, finder: usize) -> Result<u16, DeviceError> {
        Ok(self.calculated_reading(bus, finder)?.distance)
    }

    pub fn near(&mut self, bus: &mut CanBus, finder: usize) -> Result<bool, DeviceError> {
        Ok(self.calculated_reading(bus, finder)?.near)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::test_util::streaming_device;

    #[test]
    fn test_calculated_ball_position() {
        let (mut bus, _, mut board) =
            streaming_device::<IrFinder>(0x15, vec![vec![0x16, 0xD3, 0xFF, 0x64, 0x00, 1]]);
        assert_eq!(board.angle(&mut bus, 0).unwrap(), -45);
        assert_eq!(board.distance(&mut bus, 0).unwrap(), 100);
        assert!(board.near(&mut bus, 0).unwrap());
    }

    #[test]
    fn test_raw_last_group() {
        let mut reading = IrFinderReading::default();
        let decoded = IrFinder::decode(0x07, &[0x07, 9, 0, 10, 0, 11, 0], &mut reading).unwrap();
        assert_eq!(decoded, Decoded::Sample);
        assert_eq!(reading.raw[9..], [9, 10, 11]);
    }
}
