//! 测距传感器：mrm-lid-can-b、mrm-lid-can-b2、mrm-us-b
//!
//! 三者共用 `[0x13, distance_lo, distance_hi]`（毫米，小端）。

use crate::board::Board;
use crate::bus::CanBus;
use crate::error::DeviceError;
use crate::profile::{BoardProfile, Decoded, StreamPolicy};
use mrm_protocol::{BoardKind, ByteOrder, CommandCode, ProtocolError, require_len};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DistanceReading {
    pub distance_mm: u16,
}

/// 返回单一距离的传感器
pub trait RangeProfile: BoardProfile<Reading = DistanceReading> {}

fn decode_distance(
    order: ByteOrder,
    code: u8,
    data: &[u8],
    reading: &mut DistanceReading,
) -> Result<Decoded, ProtocolError> {
    if code != CommandCode::MeasureSending.code() {
        return Ok(Decoded::Unknown);
    }
    require_len(data, 3)?;
    reading.distance_mm = order.read_u16(data, 1).unwrap_or(reading.distance_mm);
    Ok(Decoded::Sample)
}

/// mrm-lid-can-b，2 m 激光测距
pub struct Lidar2m;

impl BoardProfile for Lidar2m {
    const KIND: BoardKind = BoardKind::Lidar2m;
    type Reading = DistanceReading;

    fn decode(
        code: u8,
        data: &[u8],
        reading: &mut DistanceReading,
    ) -> Result<Decoded, ProtocolError> {
        decode_distance(Self::BYTE_ORDER, code, data, reading)
    }
}

impl RangeProfile for Lidar2m {}

/// mrm-lid-can-b2，4 m 激光测距
pub struct Lidar4m;

impl BoardProfile for Lidar4m {
    const KIND: BoardKind = BoardKind::Lidar4m;
    type Reading = DistanceReading;

    fn decode(
        code: u8,
        data: &[u8],
        reading: &mut DistanceReading,
    ) -> Result<Decoded, ProtocolError> {
        decode_distance(Self::BYTE_ORDER, code, data, reading)
    }
}

impl RangeProfile for Lidar4m {}

/// mrm-us-b，超声波测距
///
/// 测量周期较长，放宽过期时间。
pub struct Ultrasonic;

impl BoardProfile for Ultrasonic {
    const KIND: BoardKind = BoardKind::Ultrasonic;
    const STREAM: StreamPolicy = StreamPolicy::with_staleness(Duration::from_secs(20));
    type Reading = DistanceReading;

    fn decode(
        code: u8,
        data: &[u8],
        reading: &mut DistanceReading,
    ) -> Result<Decoded, ProtocolError> {
        decode_distance(Self::BYTE_ORDER, code, data, reading)
    }
}

impl RangeProfile for Ultrasonic {}

impl<P: RangeProfile> Board<P> {
    /// 距离（毫米）
    pub fn distance(&mut self, bus: &mut CanBus, sensor: usize) -> Result<u16, DeviceError> {
        Ok(self.reading(bus, sensor)?.distance_mm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::test_util::streaming_device;

    #[test]
    fn test_lidar_distance() {
        let (mut bus, _, mut board) =
            streaming_device::<Lidar4m>(0x10, vec![vec![0x13, 0xA0, 0x0F]]);
        assert_eq!(board.distance(&mut bus, 0).unwrap(), 4000);
    }

    #[test]
    fn test_ultrasonic_distance() {
        let (mut bus, _, mut board) =
            streaming_device::<Ultrasonic>(0x10, vec![vec![0x13, 0x2C, 0x01]]);
        assert_eq!(board.distance(&mut bus, 0).unwrap(), 300);
        assert_eq!(board.policy().staleness, Duration::from_secs(20));
    }

    #[test]
    fn test_short_distance_frame_is_rejected() {
        let mut reading = DistanceReading::default();
        assert!(Lidar2m::decode(0x13, &[0x13, 1], &mut reading).is_err());
        let decoded = Lidar2m::decode(0x05, &[0x05], &mut reading).unwrap();
        assert_eq!(decoded, Decoded::Unknown);
    }
}
