//! mrm-therm-b-can，红外测温
//!
//! `[0x13, hi, lo]`，有符号摄氏度，**大端**。

use crate::board::Board;
use crate::bus::CanBus;
use crate::error::DeviceError;
use crate::profile::{BoardProfile, Decoded, StreamPolicy};
use mrm_protocol::{BoardKind, CommandCode, ProtocolError, require_len};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThermalReading {
    pub celsius: i16,
}

pub struct Thermal;

impl BoardProfile for Thermal {
    const KIND: BoardKind = BoardKind::Thermal;
    const STREAM: StreamPolicy = StreamPolicy::with_staleness(Duration::from_secs(30));
    type Reading = ThermalReading;

    fn decode(
        code: u8,
        data: &[u8],
        reading: &mut ThermalReading,
    ) -> Result<Decoded, ProtocolError> {
        if code != CommandCode::MeasureSending.code() {
            return Ok(Decoded::Unknown);
        }
        require_len(data, 3)?;
        reading.celsius = Self::BYTE_ORDER.read_i16(data, 1).unwrap_or(reading.celsius);
        Ok(Decoded::Sample)
    }
}

impl Board<Thermal> {
    /// 温度（°C）
    pub fn temperature(&mut self, bus: &mut CanBus, sensor: usize) -> Result<i16, DeviceError> {
        Ok(self.reading(bus, sensor)?.celsius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::test_util::streaming_device;

    #[test]
    fn test_temperature_is_big_endian() {
        let (mut bus, _, mut board) =
            streaming_device::<Thermal>(0x10, vec![vec![0x13, 0x01, 0x02]]);
        assert_eq!(board.temperature(&mut bus, 0).unwrap(), 0x0102);
    }

    #[test]
    fn test_negative_temperature() {
        let mut reading = ThermalReading::default();
        Thermal::decode(0x13, &[0x13, 0xFF, 0xF6], &mut reading).unwrap();
        assert_eq!(reading.celsius, -10);
    }
}
