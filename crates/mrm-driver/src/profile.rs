//! 板卡类型描述
//!
//! 每种板卡用一个零大小类型实现 [`BoardProfile`]：类型常量、字节序、
//! 读数结构、握手策略和设备自定义命令码的解码。通用的注册表逻辑
//! 全部写在 [`crate::Board`] 上。

use mrm_protocol::{BoardKind, ByteOrder, CommandCode, ProtocolError};
use std::fmt::Debug;
use std::time::Duration;

/// 连续测量的启动方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartKind {
    /// 原始数据（`0x10`）
    #[default]
    Raw,
    /// 设备端计算后的数据（`0x15`）
    Calculated,
}

impl StartKind {
    pub fn command(self) -> CommandCode {
        match self {
            StartKind::Raw => CommandCode::MeasureContinuous,
            StartKind::Calculated => CommandCode::MeasureContinuousCalculated,
        }
    }
}

/// 连续测量握手策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamPolicy {
    /// 默认启动方式
    pub start: StartKind,
    /// 读数超过该年龄视为流已中断
    pub staleness: Duration,
    /// 启动命令最多发送次数
    pub retries: u8,
    /// 每次发送后等待数据的时长
    pub retry_wait: Duration,
    /// 等待期间，读数年龄小于该值才算"新鲜"
    pub fresh_within: Duration,
}

impl StreamPolicy {
    pub const DEFAULT: StreamPolicy = StreamPolicy {
        start: StartKind::Raw,
        staleness: Duration::from_secs(10),
        retries: 8,
        retry_wait: Duration::from_millis(50),
        fresh_within: Duration::from_millis(100),
    };

    pub const fn with_staleness(staleness: Duration) -> Self {
        StreamPolicy {
            staleness,
            ..Self::DEFAULT
        }
    }
}

impl Default for StreamPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// 设备自定义解码结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    /// 新的测量值（刷新读数时间戳）
    Sample,
    /// 已识别，但不是测量值
    Handled,
    /// 无法识别的命令码
    Unknown,
}

/// 板卡类型描述
pub trait BoardProfile: 'static {
    const KIND: BoardKind;
    const BYTE_ORDER: ByteOrder = Self::KIND.byte_order();
    const STREAM: StreamPolicy = StreamPolicy::DEFAULT;

    /// 每个设备缓存的读数
    type Reading: Default + Clone + Debug + Send + 'static;

    /// 解码设备自定义命令码（通用命令码已由注册表处理）
    fn decode(code: u8, data: &[u8], reading: &mut Self::Reading) -> Result<Decoded, ProtocolError>;
}

/// 按固定字节序读取一组连续 u16（`data[1..]`）到 `out[first..]`
pub(crate) fn read_u16_group(
    order: ByteOrder,
    data: &[u8],
    out: &mut [u16],
    first: usize,
    count: usize,
) -> Result<(), ProtocolError> {
    mrm_protocol::require_len(data, 1 + 2 * count)?;
    for (i, slot) in out.iter_mut().skip(first).take(count).enumerate() {
        if let Some(value) = order.read_u16(data, 1 + 2 * i) {
            *slot = value;
        }
    }
    Ok(())
}
