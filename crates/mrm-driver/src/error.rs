//! 驱动层错误类型定义

use mrm_can::CanError;
use mrm_protocol::{BoardKind, ProtocolError};
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DeviceError {
    /// 注册表已满
    #[error("{board}: capacity of {capacity} devices exceeded")]
    CapacityExceeded { board: BoardKind, capacity: usize },

    /// 设备名称过长
    #[error("Device name '{name}' is longer than {max} characters")]
    NameTooLong { name: String, max: usize },

    /// 设备序号越界
    #[error("{board}: device index {index} out of range ({count} registered)")]
    DeviceIndexOutOfRange {
        board: BoardKind,
        index: usize,
        count: usize,
    },

    /// 同一注册表内 CAN ID 重复
    #[error("{board}: CAN ID 0x{id:X} already used by device {existing}")]
    DuplicateId {
        board: BoardKind,
        id: u32,
        existing: usize,
    },

    /// 设备发来无法识别的命令码
    #[error("{board} device {device}: unknown command byte 0x{command:02X}")]
    UnknownCommandByte {
        board: BoardKind,
        device: usize,
        command: u8,
    },

    /// 连续测量握手失败
    #[error("{board} device {device}: no data after {attempts} start attempts")]
    DeviceDead {
        board: BoardKind,
        device: usize,
        attempts: u8,
    },

    /// 复查后整块板卡仍无存活设备
    #[error("{board}: no device alive")]
    NoDeviceAlive { board: BoardKind },

    /// 应用层确认超时
    #[error("{board} device {device}: no notification after {attempts} attempts")]
    NotificationTimeout {
        board: BoardKind,
        device: usize,
        attempts: u8,
    },

    /// 设备上报错误（`0xEE`）
    #[error("{board} device {device}: device reported error 0x{code:02X}")]
    DeviceReported {
        board: BoardKind,
        device: usize,
        code: u8,
    },

    /// CAN 传输错误
    #[error("CAN error: {0}")]
    Can(#[from] CanError),

    /// 协议解析错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl DeviceError {
    /// 无法通过重试恢复的错误（配置错误、总线故障）
    ///
    /// 设备层面的问题（掉线、未知命令码、设备上报错误）不算致命。
    pub fn is_fatal(&self) -> bool {
        match self {
            DeviceError::CapacityExceeded { .. }
            | DeviceError::NameTooLong { .. }
            | DeviceError::DeviceIndexOutOfRange { .. }
            | DeviceError::DuplicateId { .. }
            | DeviceError::NoDeviceAlive { .. } => true,
            DeviceError::Can(CanError::Timeout | CanError::BufferOverflow) => false,
            DeviceError::Can(CanError::Device(e)) => e.is_fatal(),
            DeviceError::Can(_) => true,
            DeviceError::UnknownCommandByte { .. }
            | DeviceError::DeviceDead { .. }
            | DeviceError::NotificationTimeout { .. }
            | DeviceError::DeviceReported { .. }
            | DeviceError::Protocol(_) => false,
        }
    }
}
