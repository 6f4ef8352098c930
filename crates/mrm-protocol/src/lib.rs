//! # MRM Protocol
//!
//! MRM 模块化机器人板卡的 CAN 总线协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `commands`: 命令码（byte 0）定义与命令帧构建
//! - `ids`: 板卡类型与 CAN ID 分配
//! - `byte_order`: 各板卡类型的 16/32 位字段字节序
//!
//! ## 帧格式
//!
//! 每帧最多 8 字节，`data[0]` 永远是命令码，其余为负载。
//! 设备 k 的 ID 对为 `inbound = base + 2k`（主机 → 设备），
//! `outbound = base + 2k + 1`（设备 → 主机）。

pub mod byte_order;
pub mod commands;
pub mod ids;

pub use byte_order::ByteOrder;
pub use commands::*;
pub use ids::*;

use thiserror::Error;

/// CAN 2.0 帧的统一抽象
///
/// 协议层与硬件层之间的中间类型：
///
/// ```text
/// Driver Layer (mrm-driver)
///     ↓ 命令构建 / 回复解析
/// MrmFrame (此类型)
///     ↓ 转换逻辑在 CAN 层实现
/// CAN Layer (mrm-can)
///     ↓ SocketCAN / Mock
/// Hardware
/// ```
///
/// 固定 8 字节数据、实现 `Copy`，不做堆分配。
///
/// ```rust
/// use mrm_protocol::MrmFrame;
///
/// let frame = MrmFrame::new_standard(0x150, &[0xFF]);
/// assert_eq!(frame.id(), 0x150);
/// assert_eq!(frame.command(), Some(0xFF));
/// assert_eq!(frame.data_slice(), &[0xFF]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MrmFrame {
    /// CAN ID（标准帧或扩展帧）
    pub id: u32,

    /// 帧数据（固定 8 字节，未使用部分为 0）
    pub data: [u8; 8],

    /// 有效数据长度 (0-8)
    pub len: u8,

    /// 是否为扩展帧（29-bit ID）
    pub is_extended: bool,

    /// 接收时间戳（微秒），0 表示不可用
    pub timestamp_us: u64,
}

impl MrmFrame {
    /// 创建标准帧（11-bit ID）
    pub fn new_standard(id: u16, data: &[u8]) -> Self {
        Self::new(id as u32, data, false)
    }

    /// 创建扩展帧（29-bit ID）
    pub fn new_extended(id: u32, data: &[u8]) -> Self {
        Self::new(id, data, true)
    }

    /// 按 ID 大小自动选择标准帧或扩展帧
    pub fn with_id(id: u32, data: &[u8]) -> Self {
        Self::new(id, data, id > 0x7FF)
    }

    fn new(id: u32, data: &[u8], is_extended: bool) -> Self {
        let mut fixed_data = [0u8; 8];
        let len = data.len().min(8);
        fixed_data[..len].copy_from_slice(&data[..len]);

        Self {
            id,
            data: fixed_data,
            len: len as u8,
            is_extended,
            timestamp_us: 0,
        }
    }

    /// 获取数据切片（只包含有效数据）
    pub fn data_slice(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// 获取 CAN ID
    pub fn id(&self) -> u32 {
        self.id
    }

    /// 命令码（byte 0），空帧返回 `None`
    pub fn command(&self) -> Option<u8> {
        (self.len > 0).then_some(self.data[0])
    }
}

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid frame length for command 0x{command:02X}: expected {expected}, got {actual}")]
    InvalidLength {
        command: u8,
        expected: usize,
        actual: usize,
    },

    #[error("Unknown command code: 0x{0:02X}")]
    UnknownCommand(u8),

    #[error("Device number {index} outside the ID block of {kind} (max {max})")]
    IdOutOfBlock {
        kind: &'static str,
        index: usize,
        max: usize,
    },

    #[error("Unknown board kind '{0}'")]
    UnknownBoardKind(String),
}

/// 校验负载长度（含命令码）
pub fn require_len(data: &[u8], expected: usize) -> Result<(), ProtocolError> {
    if data.len() < expected {
        return Err(ProtocolError::InvalidLength {
            command: data.first().copied().unwrap_or(0),
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}
