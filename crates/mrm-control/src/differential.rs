//! 差速（四轮）组合
//!
//! 车轮顺序 `[left_front, right_front, left_back, right_back]`。
//! `lateral` 为横移分量（麦克纳姆轮），普通差速车传 0。

use crate::{apply, clamp_and_scale};
use mrm_driver::{CanBus, DeviceError, MotorOutputs};
use tracing::trace;

/// 计算四个轮速
pub fn differential_speeds(left: i16, right: i16, lateral: i16, speed_limit: i16) -> [i16; 4] {
    let (left, right, lateral) = (left as f32, right as f32, lateral as f32);
    clamp_and_scale(
        [
            left + lateral,
            right - lateral,
            left - lateral,
            right + lateral,
        ],
        speed_limit,
    )
}

/// 差速电机组
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorGroupDifferential {
    motors: [usize; 4],
}

impl MotorGroupDifferential {
    pub fn new(
        left_front: usize,
        right_front: usize,
        left_back: usize,
        right_back: usize,
    ) -> Self {
        Self {
            motors: [left_front, right_front, left_back, right_back],
        }
    }

    pub fn motors(&self) -> [usize; 4] {
        self.motors
    }

    /// 下发运动指令，返回实际下发的轮速
    pub fn go(
        &self,
        outputs: &mut dyn MotorOutputs,
        bus: &mut CanBus,
        left: i16,
        right: i16,
        lateral: i16,
        speed_limit: i16,
    ) -> Result<[i16; 4], DeviceError> {
        let speeds = differential_speeds(left, right, lateral, speed_limit);
        trace!("differential go ({left}, {right}, {lateral}) -> {speeds:?}");
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

#[cfg(test)]
mod tests {
    use super::*;
    use mrm_can::MockCanAdapter;
    use mrm_driver::drivers::Mot4x36;
    use mrm_driver::{Board, ManualClock};
    use std::sync::Arc;

    #[test]
    fn test_go_150_0_0_limit_100() {
        // 150 先限幅到 127，再按比例缩放到 100
        assert_eq!(differential_speeds(150, 0, 0, 100), [100, 0, 100, 0]);
    }

    #[test]
    fn test_mixed_ratio_scaling() {
        // 左 127（限幅自 200）、右 -63 → 缩放到 100 后右轮约 -50
        assert_eq!(differential_speeds(200, -63, 0, 100), [100, -50, 100, -50]);
    }

    #[test]
    fn test_lateral_component() {
        assert_eq!(differential_speeds(0, 0, 40, 127), [40, -40, -40, 40]);
        assert_eq!(differential_speeds(30, 30, 10, 127), [40, 20, 20, 40]);
    }

    #[test]
    fn test_go_sends_speed_frames() {
        let (adapter, handle) = MockCanAdapter::new();
        let mut bus = CanBus::new(adapter, Arc::new(ManualClock::new()));
        let mut board: Board<Mot4x36> = Board::new();
        for _ in 0..4 {
            board.add_default().unwrap();
        }
        let group = MotorGroupDifferential::new(0, 1, 2, 3);

        let speeds = group.go(&mut board, &mut bus, 150, 0, 0, 100).unwrap();
        assert_eq!(speeds, [100, 0, 100, 0]);
        let sent = handle.take_sent();
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[0].data_slice(), &[0x20, 228]);
        assert_eq!(sent[1].data_slice(), &[0x20, 128]);

        // 相同指令不重复发送
        group.go(&mut board, &mut bus, 150, 0, 0, 100).unwrap();
        assert!(handle.take_sent().is_empty());

        group.stop(&mut board, &mut bus).unwrap();
        assert_eq!(handle.take_sent().len(), 2);
    }
}
