//! 单个设备的缓存状态

use crate::profile::StartKind;
use mrm_protocol::{BoardKind, MESSAGE_PART_LEN};
use std::time::Duration;

/// FPS 请求已发出、回复未到
pub const FPS_AWAITING: u16 = 0xFFFF;

/// 设备选择：全部或单个序号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceSelector {
    All,
    One(usize),
}

impl From<usize> for DeviceSelector {
    fn from(index: usize) -> Self {
        DeviceSelector::One(index)
    }
}

/// 连续测量握手状态
///
/// ```text
/// NotStarted --ensure_streaming--> Starting --新鲜数据--> Streaming
///     ^                               |                      |
///     +------- 重试耗尽 / stop --------+------ 数据过期 -------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    NotStarted,
    Starting,
    Streaming,
}

/// 注册表中的一个设备
///
/// 序号（`index`）在注册后永不改变，`swap` 只交换 CAN ID。
#[derive(Debug, Clone)]
pub struct Device<R> {
    pub(crate) index: usize,
    pub(crate) name: String,
    pub(crate) inbound_id: u32,
    pub(crate) outbound_id: u32,
    pub(crate) last_message_at: Option<Duration>,
    pub(crate) last_reading_at: Option<Duration>,
    pub(crate) fps: u16,
    pub(crate) firmware: Option<u16>,
    pub(crate) last_error: Option<u8>,
    pub(crate) unknown_command: Option<u8>,
    pub(crate) frames: u64,
    pub(crate) message_parts: [[u8; MESSAGE_PART_LEN]; 4],
    pub(crate) message_mask: u8,
    pub(crate) message: Option<String>,
    pub(crate) notified: bool,
    pub(crate) stream: StreamState,
    pub(crate) start_kind: StartKind,
    pub(crate) commanded_speed: Option<i16>,
    pub(crate) reversed: bool,
    pub(crate) reading: R,
}

impl<R: Default> Device<R> {
    pub(crate) fn new(index: usize, name: String, inbound_id: u32, outbound_id: u32) -> Self {
        Self {
            index,
            name,
            inbound_id,
            outbound_id,
            last_message_at: None,
            last_reading_at: None,
            fps: 0,
            firmware: None,
            last_error: None,
            unknown_command: None,
            frames: 0,
            message_parts: [[0; MESSAGE_PART_LEN]; 4],
            message_mask: 0,
            message: None,
            notified: false,
            stream: StreamState::NotStarted,
            start_kind: StartKind::Raw,
            commanded_speed: None,
            reversed: false,
            reading: R::default(),
        }
    }
}

impl<R> Device<R> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 主机 → 设备
    pub fn inbound_id(&self) -> u32 {
        self.inbound_id
    }

    /// 设备 → 主机
    pub fn outbound_id(&self) -> u32 {
        self.outbound_id
    }

    /// 最后一次收到任意帧的时刻
    pub fn last_message_at(&self) -> Option<Duration> {
        self.last_message_at
    }

    /// 最后一次收到测量数据的时刻
    pub fn last_reading_at(&self) -> Option<Duration> {
        self.last_reading_at
    }

    /// 最近一次 FPS 回复，[`FPS_AWAITING`] 表示仍在等待
    pub fn fps(&self) -> u16 {
        self.fps
    }

    pub fn firmware(&self) -> Option<u16> {
        self.firmware
    }

    /// 设备通过 `0xEE` 上报的最近一个错误码
    pub fn last_error(&self) -> Option<u8> {
        self.last_error
    }

    /// 最近一个无法识别的命令码
    pub fn unknown_command(&self) -> Option<u8> {
        self.unknown_command
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// 最近一条完整的文本消息
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn stream_state(&self) -> StreamState {
        self.stream
    }

    /// 最近一次下发的速度（电机板）
    pub fn commanded_speed(&self) -> Option<i16> {
        self.commanded_speed
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// 缓存的读数（不触发握手）
    pub fn cached_reading(&self) -> &R {
        &self.reading
    }

    /// 读数的年龄
    pub fn reading_age(&self, now: Duration) -> Option<Duration> {
        self.last_reading_at.map(|at| now.saturating_sub(at))
    }

    pub(crate) fn reading_within(&self, now: Duration, window: Duration) -> bool {
        self.reading_age(now).is_some_and(|age| age < window)
    }

    /// 存一段文本消息，第 4 段到达后拼接并返回完整消息
    pub(crate) fn store_message_part(&mut self, part: usize, bytes: &[u8]) -> Option<&str> {
        let slot = &mut self.message_parts[part];
        *slot = [0; MESSAGE_PART_LEN];
        let len = bytes.len().min(MESSAGE_PART_LEN);
        slot[..len].copy_from_slice(&bytes[..len]);
        self.message_mask |= 1 << part;

        if part < 3 {
            return None;
        }
        let text: String = self
            .message_parts
            .iter()
            .enumerate()
            .filter(|(i, _)| self.message_mask & (1 << i) != 0)
            .flat_map(|(_, chunk)| chunk.iter())
            .take_while(|&&b| b != 0)
            .map(|&b| if b.is_ascii() { b as char } else { '?' })
            .collect();
        self.message_mask = 0;
        self.message = Some(text.trim_end().to_owned());
        self.message.as_deref()
    }
}

/// 设备状态摘要（CLI 与 `Robot::status` 使用）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSummary {
    pub kind: BoardKind,
    pub index: usize,
    pub name: String,
    pub inbound_id: u32,
    pub outbound_id: u32,
    pub alive: bool,
    pub firmware: Option<u16>,
    pub fps: u16,
    pub last_error: Option<u8>,
    pub stream: StreamState,
    pub frames: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_assembly() {
        let mut device: Device<()> = Device::new(0, "lid2m-0".into(), 0x100, 0x101);
        assert!(device.store_message_part(0, b"Hello, ").is_none());
        assert!(device.store_message_part(1, b"world").is_none());
        assert!(device.store_message_part(2, b"").is_none());
        assert_eq!(device.store_message_part(3, b""), Some("Hello, world"));
        assert_eq!(device.message(), Some("Hello, world"));
    }

    #[test]
    fn test_message_missing_parts_are_skipped() {
        let mut device: Device<()> = Device::new(0, "x".into(), 0x100, 0x101);
        // 第 0 段不足 7 字节时以 0 结尾，后续段不再拼接
        device.store_message_part(0, b"abc");
        assert_eq!(device.store_message_part(3, b"xyz"), Some("abc"));
        device.store_message_part(0, b"abcdefg");
        assert_eq!(device.store_message_part(3, b"xyz"), Some("abcdefgxyz"));
    }

    #[test]
    fn test_reading_age() {
        let mut device: Device<()> = Device::new(0, "x".into(), 0x100, 0x101);
        assert_eq!(device.reading_age(Duration::from_secs(1)), None);
        device.last_reading_at = Some(Duration::from_millis(900));
        assert_eq!(
            device.reading_age(Duration::from_secs(1)),
            Some(Duration::from_millis(100))
        );
        assert!(device.reading_within(Duration::from_secs(1), Duration::from_millis(101)));
        assert!(!device.reading_within(Duration::from_secs(1), Duration::from_millis(100)));
    }
}
