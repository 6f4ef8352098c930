//! 设备端计算数据

use crate::board::Board;
use crate::bus::CanBus;
use crate::device::DeviceSelector;
use crate::error::DeviceError;
use crate::profile::{BoardProfile, StartKind};

/// 支持 `0x15` 计算模式的传感器
pub trait CalculatedDataProfile: BoardProfile {}

impl<P: CalculatedDataProfile> Board<P> {
    /// 开始连续发送计算结果
    pub fn continuous_reading_calculated_data_start(
        &mut self,
        bus: &mut CanBus,
        selector: DeviceSelector,
    ) -> Result<(), DeviceError> {
        self.start_as(bus, selector, StartKind::Calculated, 0, 0)
    }

    /// 以计算模式读取（必要时切换模式并重新握手）
    pub fn calculated_reading(
        &mut self,
        bus: &mut CanBus,
        index: usize,
    ) -> Result<&P::Reading, DeviceError> {
        self.reading_as(bus, index, StartKind::Calculated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::device::StreamState;
    use crate::drivers::ColorSensor;
    use mrm_can::MockCanAdapter;
    use std::sync::Arc;

    #[test]
    fn test_calculated_start_sends_its_command() {
        let (adapter, handle) = MockCanAdapter::new();
        let mut bus = CanBus::new(adapter, Arc::new(ManualClock::new()));
        let mut board: Board<ColorSensor> = Board::new();
        board.add_default().unwrap();
        board.add_default().unwrap();

        board
            .continuous_reading_calculated_data_start(&mut bus, DeviceSelector::All)
            .unwrap();

        let sent = handle.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].id, 0x160);
        assert_eq!(sent[0].data_slice(), &[0x15]);
        assert_eq!(sent[1].id, 0x162);
        assert_eq!(board.device(1).unwrap().stream_state(), StreamState::Starting);
    }
}
