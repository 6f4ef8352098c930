//! 存活探测
//!
//! 主机向设备 inbound ID 发送 1 字节 `ReportAlive`，设备在 outbound ID
//! 上回同一命令码。没有序列号，严格按 outbound ID 匹配；只探测每块
//! 物理板的第一个通道，回复同时标记整块板。探测严格串行。

use crate::board::Board;
use crate::bus::CanBus;
use crate::device::DeviceSelector;
use crate::error::DeviceError;
use crate::profile::BoardProfile;
use mrm_protocol::CommandCode;
use tracing::{debug, info, warn};

/// 全部设备
pub const ALL_DEVICES: u32 = u32::MAX;

impl<P: BoardProfile> Board<P> {
    /// 扫描 `mask` 选中的设备，返回其中存活的设备数
    ///
    /// 未选中的设备保留原有存活位。
    pub fn devices_scan(
        &mut self,
        bus: &mut CanBus,
        verbose: bool,
        mask: u32,
    ) -> Result<usize, DeviceError> {
        let per_board = P::KIND.devices_per_board();
        let mut alive = 0;

        for first in (0..self.devices.len()).step_by(per_board) {
            let group = self.board_group_mask(first) & mask;
            if group == 0 {
                continue;
            }

            if self.probe(bus, first)? {
                self.alive_mask |= group;
                alive += group.count_ones() as usize;
                if verbose {
                    let device = &self.devices[first];
                    info!(
                        "{} '{}' found (0x{:03X})",
                        P::KIND, device.name, device.inbound_id
                    );
                }
            } else {
                self.alive_mask &= !group;
                debug!("{} device {}: no reply", P::KIND, first);
            }
        }

        if verbose {
            info!("{}: {} device(s) alive", P::KIND, alive);
        }
        Ok(alive)
    }

    /// 探测单个设备
    fn probe(&mut self, bus: &mut CanBus, index: usize) -> Result<bool, DeviceError> {
        let outbound = self.device(index)?.outbound_id;
        self.send_to(bus, index, &[CommandCode::ReportAlive.code()])?;
        let timeout = self.timing.scan_timeout;
        self.wait_for(bus, timeout, |_, frame, _| {
            frame.id == outbound && frame.command() == Some(CommandCode::ReportAlive.code())
        })
    }

    /// 存活检查
    ///
    /// 返回缓存的存活位；`DeviceSelector::All` 表示"任一设备存活"。
    /// 为假且 `recheck_if_dead` 时重新探测（只探测被查询的设备所在的板），
    /// 仍为假且 `fatal_if_still_dead` 时返回错误，否则记录警告后返回 `false`。
    pub fn alive(
        &mut self,
        bus: &mut CanBus,
        selector: DeviceSelector,
        recheck_if_dead: bool,
        fatal_if_still_dead: bool,
    ) -> Result<bool, DeviceError> {
        let mask = match selector {
            DeviceSelector::All => ALL_DEVICES,
            DeviceSelector::One(index) => {
                self.device(index)?;
                1 << index
            },
        };
        let is_alive = |board: &Self| board.alive_mask & mask != 0;

        if is_alive(self) {
            return Ok(true);
        }
        if !recheck_if_dead {
            return Ok(false);
        }

        let scan_mask = match selector {
            DeviceSelector::All => ALL_DEVICES,
            DeviceSelector::One(index) => self.board_group_mask(index),
        };
        self.devices_scan(bus, false, scan_mask)?;
        if is_alive(self) {
            return Ok(true);
        }

        match selector {
            DeviceSelector::All if fatal_if_still_dead => {
                Err(DeviceError::NoDeviceAlive { board: P::KIND })
            },
            DeviceSelector::One(index) if fatal_if_still_dead => Err(DeviceError::DeviceDead {
                board: P::KIND,
                device: index,
                attempts: 1,
            }),
            DeviceSelector::All => {
                warn!("{}: no device alive", P::KIND);
                Ok(false)
            },
            DeviceSelector::One(index) => {
                warn!("{} '{}' not alive", P::KIND, self.devices[index].name);
                Ok(false)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::drivers::{ColorSensor, Mot4x36};
    use mrm_can::{MockCanAdapter, MockHandle, MrmFrame, Replies};
    use std::sync::Arc;
    use std::time::Duration;

    fn setup<P: BoardProfile>(count: usize) -> (CanBus, MockHandle, Arc<ManualClock>, Board<P>) {
        let (adapter, handle) = MockCanAdapter::new();
        let clock = Arc::new(ManualClock::new());
        let bus = CanBus::new(adapter, clock.clone());
        let mut board = Board::new();
        for _ in 0..count {
            board.add_default().unwrap();
        }
        (bus, handle, clock, board)
    }

    #[test]
    fn test_scan_round_trip() {
        let (mut bus, handle, _, mut board) = setup::<ColorSensor>(1);
        handle.echo(0x160, 0x161, 0xFF);

        assert_eq!(board.devices_scan(&mut bus, true, ALL_DEVICES).unwrap(), 1);
        assert!(board.alive(&mut bus, DeviceSelector::One(0), false, false).unwrap());
        assert_eq!(handle.count_sent(0x160, 0xFF), 1);
    }

    #[test]
    fn test_rescan_is_idempotent() {
        let (mut bus, handle, _, mut board) = setup::<ColorSensor>(3);
        handle.echo(0x160, 0x161, 0xFF);
        handle.echo(0x164, 0x165, 0xFF);

        let first = board.devices_scan(&mut bus, false, ALL_DEVICES).unwrap();
        let mask = board.alive_mask();
        let second = board.devices_scan(&mut bus, false, ALL_DEVICES).unwrap();
        assert_eq!(first, 2);
        assert_eq!(first, second);
        assert_eq!(mask, board.alive_mask());
    }

    #[test]
    fn test_dead_device_scan_waits_the_full_window() {
        let (mut bus, _handle, clock, mut board) = setup::<ColorSensor>(1);
        assert_eq!(board.devices_scan(&mut bus, false, ALL_DEVICES).unwrap(), 0);
        assert_eq!(clock.now(), Duration::from_micros(500));
    }

    #[test]
    fn test_stray_traffic_is_not_a_false_positive() {
        let (mut bus, handle, _, mut board) = setup::<ColorSensor>(2);
        // 探测设备 0 时，回复来自设备 1 和另一块板卡
        handle.respond(|frame| {
            let mut replies = Replies::new();
            if frame.id == 0x160 {
                replies.push(MrmFrame::new_standard(0x101, &[0xFF]));
                replies.push(MrmFrame::new_standard(0x163, &[0xFF]));
            }
            replies
        });

        assert!(!board.alive(&mut bus, DeviceSelector::One(0), true, false).unwrap());
        assert!(!board.is_alive(0));
        assert!(board.is_alive(1));
        // 其它板卡的帧留在 backlog
        assert_eq!(bus.backlog_len(), 1);
    }

    #[test]
    fn test_recheck_only_probes_queried_device() {
        let (mut bus, handle, _, mut board) = setup::<ColorSensor>(3);
        handle.echo(0x160, 0x161, 0xFF);
        handle.echo(0x164, 0x165, 0xFF);
        board.devices_scan(&mut bus, false, ALL_DEVICES).unwrap();
        handle.take_sent();

        assert!(!board.alive(&mut bus, DeviceSelector::One(1), false, false).unwrap());
        assert!(handle.sent().is_empty());

        handle.clear_responders();
        assert!(!board.alive(&mut bus, DeviceSelector::One(1), true, false).unwrap());
        let sent = handle.take_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id, 0x162);
        assert!(board.is_alive(0));
        assert!(board.is_alive(2));
    }

    #[test]
    fn test_fatal_if_still_dead() {
        let (mut bus, _handle, _, mut board) = setup::<ColorSensor>(2);
        let err = board.alive(&mut bus, DeviceSelector::One(1), true, true).unwrap_err();
        assert!(matches!(err, DeviceError::DeviceDead { device: 1, .. }));
        let err = board
            .alive(&mut bus, DeviceSelector::All, true, true)
            .unwrap_err();
        assert!(matches!(err, DeviceError::NoDeviceAlive { .. }));
    }

    #[test]
    fn test_motor_board_probes_first_channel_only() {
        let (mut bus, handle, _, mut board) = setup::<Mot4x36>(8);
        handle.echo(0x200, 0x201, 0xFF);

        assert_eq!(board.devices_scan(&mut bus, false, ALL_DEVICES).unwrap(), 4);
        assert_eq!(board.alive_mask(), 0b0000_1111);
        let probes: Vec<u32> = handle.sent().iter().map(|f| f.id).collect();
        assert_eq!(probes, vec![0x200, 0x208]);
        assert!(board.alive(&mut bus, DeviceSelector::One(3), false, false).unwrap());
    }
}
