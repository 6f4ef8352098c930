//! 命令码定义与命令负载构建
//!
//! 所有板卡类型共享 0x10 以上的通用命令码；0x00-0x0F 留给各板卡自定义。

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 通用命令码（`data[0]`）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum CommandCode {
    /// 开始连续测量（周期广播）
    MeasureContinuous = 0x10,
    /// 单次测量
    MeasureOnce = 0x11,
    /// 停止连续测量
    MeasureStop = 0x12,
    /// 设备发送测量值
    MeasureSending = 0x13,
    /// 开始连续测量，设备端计算后再发送
    MeasureContinuousCalculated = 0x15,
    /// 设备发送计算结果
    CalculatedSending = 0x16,
    FirmwareRequest = 0x19,
    FirmwareSending = 0x1A,
    Reset = 0x1B,
    /// 多帧文本消息第 1-4 段（每段 7 字节，第 4 段结束）
    MessageSending1 = 0x1C,
    MessageSending2 = 0x1D,
    MessageSending3 = 0x1E,
    MessageSending4 = 0x1F,
    SpeedSet = 0x20,
    /// 设定速度并要求设备回复 `Notification`
    SpeedSetRequestNotification = 0x21,
    InfoRequest = 0x24,
    FpsRequest = 0x30,
    FpsSending = 0x31,
    IdChangeRequest = 0x40,
    /// 应用层确认
    Notification = 0x41,
    Error = 0xEE,
    ReportAlive = 0xFF,
}

impl CommandCode {
    /// 命令码字节
    pub fn code(self) -> u8 {
        self.into()
    }

    /// 文本消息分段序号（0-3），非文本消息命令返回 `None`
    pub fn message_part(self) -> Option<usize> {
        match self {
            CommandCode::MessageSending1 => Some(0),
            CommandCode::MessageSending2 => Some(1),
            CommandCode::MessageSending3 => Some(2),
            CommandCode::MessageSending4 => Some(3),
            _ => None,
        }
    }
}

/// 每段文本消息的字节数
pub const MESSAGE_PART_LEN: usize = 7;

/// 速度编码偏移：`byte1 = speed + 128`
pub const SPEED_OFFSET: i16 = 128;

/// 构建开始连续测量命令
///
/// `mode == 0 && refresh_ms == 0` 时只发送命令码，否则附带模式与刷新周期（LE）。
pub fn start_payload(code: CommandCode, mode: u8, refresh_ms: u16) -> ([u8; 4], usize) {
    if mode == 0 && refresh_ms == 0 {
        ([code.code(), 0, 0, 0], 1)
    } else {
        let [lo, hi] = refresh_ms.to_le_bytes();
        ([code.code(), mode, lo, hi], 4)
    }
}

/// 构建速度命令负载，`speed` 会被限幅到 [-127, 127]
pub fn speed_payload(code: CommandCode, speed: i16) -> [u8; 2] {
    let clamped = speed.clamp(-127, 127);
    [code.code(), (clamped + SPEED_OFFSET) as u8]
}
