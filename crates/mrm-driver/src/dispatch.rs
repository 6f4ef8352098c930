//! 命令下发与通用回复解码

use crate::board::Board;
use crate::bus::CanBus;
use crate::device::{DeviceSelector, StreamState, FPS_AWAITING};
use crate::error::DeviceError;
use crate::profile::{BoardProfile, Decoded, StartKind};
use mrm_can::MrmFrame;
use mrm_protocol::{ByteOrder, CommandCode, require_len, start_payload};
use std::time::Duration;
use tracing::{debug, info, trace};

impl<P: BoardProfile> Board<P> {
    /// 向设备 inbound ID 发送一帧
    pub(crate) fn send_to(
        &self,
        bus: &mut CanBus,
        index: usize,
        data: &[u8],
    ) -> Result<(), DeviceError> {
        let inbound = self.device(index)?.inbound_id;
        bus.send(inbound, data)?;
        Ok(())
    }

    fn send_each(
        &self,
        bus: &mut CanBus,
        selector: DeviceSelector,
        data: &[u8],
    ) -> Result<Vec<usize>, DeviceError> {
        let indices = self.selected(selector)?;
        for &index in &indices {
            self.send_to(bus, index, data)?;
        }
        Ok(indices)
    }

    /// 发送开始连续测量命令
    ///
    /// `mode == 0 && refresh_ms == 0` 时使用单字节短格式。
    pub fn start(
        &mut self,
        bus: &mut CanBus,
        selector: DeviceSelector,
        mode: u8,
        refresh_ms: u16,
    ) -> Result<(), DeviceError> {
        self.start_as(bus, selector, StartKind::Raw, mode, refresh_ms)
    }

    pub(crate) fn start_as(
        &mut self,
        bus: &mut CanBus,
        selector: DeviceSelector,
        kind: StartKind,
        mode: u8,
        refresh_ms: u16,
    ) -> Result<(), DeviceError> {
        let (payload, len) = start_payload(kind.command(), mode, refresh_ms);
        for index in self.send_each(bus, selector, &payload[..len])? {
            let device = &mut self.devices[index];
            device.start_kind = kind;
            if device.stream == StreamState::NotStarted {
                device.stream = StreamState::Starting;
            }
            debug!("{} '{}': start {:?}", P::KIND, device.name, kind);
        }
        Ok(())
    }

    /// 停止连续测量
    pub fn stop(&mut self, bus: &mut CanBus, selector: DeviceSelector) -> Result<(), DeviceError> {
        for index in self.send_each(bus, selector, &[CommandCode::MeasureStop.code()])? {
            self.devices[index].stream = StreamState::NotStarted;
        }
        Ok(())
    }

    /// 请求固件版本（回复写入 `Device::firmware`）
    pub fn firmware_request(
        &mut self,
        bus: &mut CanBus,
        selector: DeviceSelector,
    ) -> Result<(), DeviceError> {
        self.send_each(bus, selector, &[CommandCode::FirmwareRequest.code()])?;
        Ok(())
    }

    /// 请求帧率，回复到达前 `Device::fps` 为 [`FPS_AWAITING`]
    pub fn fps_request(
        &mut self,
        bus: &mut CanBus,
        selector: DeviceSelector,
    ) -> Result<(), DeviceError> {
        for index in self.send_each(bus, selector, &[CommandCode::FpsRequest.code()])? {
            self.devices[index].fps = FPS_AWAITING;
        }
        Ok(())
    }

    /// 请求设备信息（设备以文本消息回复）
    pub fn info(&mut self, bus: &mut CanBus, selector: DeviceSelector) -> Result<(), DeviceError> {
        self.send_each(bus, selector, &[CommandCode::InfoRequest.code()])?;
        Ok(())
    }

    /// 复位设备，设备重启后需要重新握手
    pub fn reset(&mut self, bus: &mut CanBus, selector: DeviceSelector) -> Result<(), DeviceError> {
        for index in self.send_each(bus, selector, &[CommandCode::Reset.code()])? {
            let device = &mut self.devices[index];
            device.stream = StreamState::NotStarted;
            device.commanded_speed = None;
        }
        Ok(())
    }

    /// 修改设备编号
    ///
    /// 设备改用新编号的 ID 对，主机端注册表不跟随修改，需要重新注册。
    pub fn id_change(
        &mut self,
        bus: &mut CanBus,
        index: usize,
        new_number: u8,
    ) -> Result<(), DeviceError> {
        P::KIND.ids(new_number as usize)?;
        self.send_to(bus, index, &[CommandCode::IdChangeRequest.code(), new_number])?;
        info!(
            "{} device {}: requested ID change to #{}, re-register after restart",
            P::KIND, index, new_number
        );
        Ok(())
    }

    /// 发送需要应用层确认的命令
    ///
    /// 每次发送后等待 `notification_timeout`，最多 `notification_retries` 次。
    pub fn notification_request(
        &mut self,
        bus: &mut CanBus,
        index: usize,
        payload: &[u8],
    ) -> Result<(), DeviceError> {
        self.device(index)?;
        let attempts = self.timing.notification_retries.max(1);
        let timeout = self.timing.notification_timeout;

        for attempt in 1..=attempts {
            self.devices[index].notified = false;
            self.send_to(bus, index, payload)?;
            let acked = self.wait_for(bus, timeout, |board, _, _| board.devices[index].notified)?;
            if acked {
                trace!("{} device {}: acknowledged on attempt {}", P::KIND, index, attempt);
                return Ok(());
            }
            debug!("{} device {}: no notification, attempt {}", P::KIND, index, attempt);
        }

        Err(DeviceError::NotificationTimeout {
            board: P::KIND,
            device: index,
            attempts,
        })
    }

    /// 解码所有板卡共有的命令码
    ///
    /// 返回 `false` 表示命令码不属于通用层，应交给设备自定义解码。
    pub fn message_decode_common(
        &mut self,
        can_id: u32,
        data: &[u8],
        index: usize,
    ) -> Result<bool, DeviceError> {
        if !self.is_for_me(can_id, index) {
            return Ok(false);
        }
        let Some(&code) = data.first() else {
            return Ok(false);
        };
        let Ok(command) = CommandCode::try_from(code) else {
            return Ok(false);
        };

        let order = ByteOrder::Little;
        let group = self.board_group_mask(index);
        let device = &mut self.devices[index];
        match command {
            CommandCode::ReportAlive => {
                self.alive_mask |= group;
            },
            CommandCode::Error => {
                let error = data.get(1).copied().unwrap_or(0);
                device.last_error = Some(error);
                return Err(DeviceError::DeviceReported {
                    board: P::KIND,
                    device: index,
                    code: error,
                });
            },
            CommandCode::FirmwareSending => {
                require_len(data, 3)?;
                device.firmware = order.read_u16(data, 1);
                debug!("{} '{}': firmware {:?}", P::KIND, device.name, device.firmware);
            },
            CommandCode::FpsSending => {
                require_len(data, 3)?;
                device.fps = order.read_u16(data, 1).unwrap_or(0);
                debug!("{} '{}': {} fps", P::KIND, device.name, device.fps);
            },
            CommandCode::MessageSending1
            | CommandCode::MessageSending2
            | CommandCode::MessageSending3
            | CommandCode::MessageSending4 => {
                let part = command.message_part().unwrap_or(0);
                let name = device.name.clone();
                if let Some(text) = device.store_message_part(part, &data[1..]) {
                    info!("{} '{}': {}", P::KIND, name, text);
                }
            },
            CommandCode::Notification => {
                device.notified = true;
            },
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// 处理一帧
    ///
    /// 返回 `Ok(false)` 表示帧不属于本注册表。
    pub fn handle_frame(&mut self, frame: &MrmFrame, now: Duration) -> Result<bool, DeviceError> {
        let Some(index) = self.device_index_for(frame.id) else {
            return Ok(false);
        };
        let data = frame.data_slice();
        {
            let device = &mut self.devices[index];
            device.last_message_at = Some(now);
            device.frames += 1;
        }
        let Some(&code) = data.first() else {
            trace!("{} device {}: empty frame", P::KIND, index);
            return Ok(true);
        };
        // 任何来自设备的帧都说明它在线
        self.alive_mask |= 1 << index;

        if self.message_decode_common(frame.id, data, index)? {
            return Ok(true);
        }

        let device = &mut self.devices[index];
        match P::decode(code, data, &mut device.reading)? {
            Decoded::Sample => {
                device.last_reading_at = Some(now);
                Ok(true)
            },
            Decoded::Handled => Ok(true),
            Decoded::Unknown => {
                device.unknown_command = Some(code);
                Err(DeviceError::UnknownCommandByte {
                    board: P::KIND,
                    device: index,
                    command: code,
                })
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::drivers::{Lidar2m, Mot4x36};
    use mrm_can::{MockCanAdapter, MockHandle, Replies};
    use mrm_protocol::ProtocolError;
    use std::sync::Arc;

    fn setup() -> (CanBus, MockHandle, Board<Lidar2m>) {
        let (adapter, handle) = MockCanAdapter::new();
        let bus = CanBus::new(adapter, Arc::new(ManualClock::new()));
        let mut board = Board::new();
        board.add_default().unwrap();
        board.add_default().unwrap();
        (bus, handle, board)
    }

    #[test]
    fn test_start_short_and_long_form() {
        let (mut bus, handle, mut board) = setup();
        board.start(&mut bus, DeviceSelector::One(0), 0, 0).unwrap();
        board.start(&mut bus, DeviceSelector::One(1), 1, 20).unwrap();

        let sent = handle.take_sent();
        assert_eq!(sent[0].data_slice(), &[0x10]);
        assert_eq!(sent[1].id, 0x102);
        assert_eq!(sent[1].data_slice(), &[0x10, 1, 20, 0]);
        assert_eq!(board.device(0).unwrap().stream_state(), StreamState::Starting);
    }

    #[test]
    fn test_stop_all_iterates_devices() {
        let (mut bus, handle, mut board) = setup();
        board.stop(&mut bus, DeviceSelector::All).unwrap();
        assert_eq!(handle.count_sent(0x100, 0x12), 1);
        assert_eq!(handle.count_sent(0x102, 0x12), 1);
    }

    #[test]
    fn test_stop_returns_stream_to_not_started() {
        let (mut bus, handle, mut board) = setup();
        board.start(&mut bus, DeviceSelector::All, 0, 0).unwrap();
        board.stop(&mut bus, DeviceSelector::One(1)).unwrap();

        assert_eq!(board.device(0).unwrap().stream_state(), StreamState::Starting);
        assert_eq!(board.device(1).unwrap().stream_state(), StreamState::NotStarted);
        assert_eq!(handle.count_sent(0x102, 0x12), 1);
        assert_eq!(handle.count_sent(0x100, 0x12), 0);
    }

    #[test]
    fn test_reset_clears_stream_and_commanded_speed() {
        let (adapter, handle) = MockCanAdapter::new();
        let mut bus = CanBus::new(adapter, Arc::new(ManualClock::new()));
        let mut board: Board<Mot4x36> = Board::new();
        board.add_default().unwrap();

        board.start(&mut bus, DeviceSelector::One(0), 0, 0).unwrap();
        assert!(board.speed_set(&mut bus, 0, 10).unwrap());
        board.reset(&mut bus, DeviceSelector::One(0)).unwrap();

        let device = board.device(0).unwrap();
        assert_eq!(device.stream_state(), StreamState::NotStarted);
        assert_eq!(device.commanded_speed(), None);

        // 复位后同一速度需要重新下发
        assert!(board.speed_set(&mut bus, 0, 10).unwrap());
        let codes: Vec<Option<u8>> = handle.sent().iter().map(|f| f.command()).collect();
        assert_eq!(codes, vec![Some(0x10), Some(0x20), Some(0x1B), Some(0x20)]);
    }

    #[test]
    fn test_info_request_frame() {
        let (mut bus, handle, mut board) = setup();
        board.info(&mut bus, DeviceSelector::One(1)).unwrap();

        let sent = handle.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id, 0x102);
        assert_eq!(sent[0].data_slice(), &[0x24]);
        assert!(board.info(&mut bus, DeviceSelector::One(5)).is_err());
    }

    #[test]
    fn test_fps_request_sets_sentinel_until_reply() {
        let (mut bus, _handle, mut board) = setup();
        board.fps_request(&mut bus, DeviceSelector::One(1)).unwrap();
        assert_eq!(board.device(1).unwrap().fps(), FPS_AWAITING);

        let reply = MrmFrame::new_standard(0x103, &[0x31, 0x2C, 0x01]);
        assert!(board.handle_frame(&reply, Duration::ZERO).unwrap());
        assert_eq!(board.device(1).unwrap().fps(), 300);
    }

    #[test]
    fn test_firmware_reply() {
        let (_, _, mut board) = setup();
        let reply = MrmFrame::new_standard(0x101, &[0x1A, 0x03, 0x00]);
        board.handle_frame(&reply, Duration::ZERO).unwrap();
        assert_eq!(board.device(0).unwrap().firmware(), Some(3));

        let short = MrmFrame::new_standard(0x101, &[0x1A, 0x03]);
        assert!(matches!(
            board.handle_frame(&short, Duration::ZERO),
            Err(DeviceError::Protocol(ProtocolError::InvalidLength { .. }))
        ));
    }

    #[test]
    fn test_id_change_validates_block() {
        let (mut bus, handle, mut board) = setup();
        board.id_change(&mut bus, 0, 3).unwrap();
        assert_eq!(handle.sent()[0].data_slice(), &[0x40, 3]);
        assert!(board.id_change(&mut bus, 0, 14).is_err());
    }

    #[test]
    fn test_device_error_report() {
        let (_, _, mut board) = setup();
        let frame = MrmFrame::new_standard(0x101, &[0xEE, 0x05]);
        let err = board.handle_frame(&frame, Duration::ZERO).unwrap_err();
        assert!(matches!(err, DeviceError::DeviceReported { device: 0, code: 5, .. }));
        assert_eq!(board.device(0).unwrap().last_error(), Some(5));
    }

    #[test]
    fn test_unknown_command_byte_is_reported() {
        let (_, _, mut board) = setup();
        let frame = MrmFrame::new_standard(0x103, &[0x07, 1, 2]);
        let err = board.handle_frame(&frame, Duration::ZERO).unwrap_err();
        assert!(matches!(
            err,
            DeviceError::UnknownCommandByte { device: 1, command: 0x07, .. }
        ));
        assert_eq!(board.device(1).unwrap().unknown_command(), Some(0x07));
    }

    #[test]
    fn test_foreign_frames_are_not_claimed() {
        let (_, _, mut board) = setup();
        let frame = MrmFrame::new_standard(0x161, &[0x13, 1, 2]);
        assert!(!board.handle_frame(&frame, Duration::ZERO).unwrap());
        // 主机发给设备的帧也不认领
        let frame = MrmFrame::new_standard(0x100, &[0x10]);
        assert!(!board.handle_frame(&frame, Duration::ZERO).unwrap());
    }

    #[test]
    fn test_common_decode_declines_device_codes() {
        let (_, _, mut board) = setup();
        assert!(!board.message_decode_common(0x101, &[0x13, 1, 0], 0).unwrap());
        assert!(!board.message_decode_common(0x103, &[0xFF], 0).unwrap());
        assert!(board.message_decode_common(0x101, &[0xFF], 0).unwrap());
        assert!(board.is_alive(0));
    }

    #[test]
    fn test_notification_acknowledged() {
        let (mut bus, handle, mut board) = setup();
        let mut calls = 0;
        handle.respond(move |frame| {
            let mut replies = Replies::new();
            if frame.id == 0x100 {
                calls += 1;
                // 第一次不回复
                if calls > 1 {
                    replies.push(MrmFrame::new_standard(0x101, &[0x41]));
                }
            }
            replies
        });

        board.notification_request(&mut bus, 0, &[0x24]).unwrap();
        assert_eq!(handle.count_sent(0x100, 0x24), 2);
    }

    #[test]
    fn test_notification_timeout() {
        let (mut bus, handle, mut board) = setup();
        let err = board.notification_request(&mut bus, 1, &[0x24]).unwrap_err();
        assert!(matches!(
            err,
            DeviceError::NotificationTimeout { device: 1, attempts: 3, .. }
        ));
        assert_eq!(handle.count_sent(0x102, 0x24), 3);
        assert_eq!(bus.now(), Duration::from_millis(60));
    }

    #[test]
    fn test_alive_report_marks_whole_physical_board() {
        let mut board: Board<Mot4x36> = Board::new();
        for _ in 0..8 {
            board.add_default().unwrap();
        }
        let frame = MrmFrame::new_standard(0x20B, &[0xFF]);
        board.handle_frame(&frame, Duration::ZERO).unwrap();
        assert_eq!(board.alive_mask(), 0b1111_0000);
    }
}
