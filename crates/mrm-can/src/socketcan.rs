//! SocketCAN CAN 适配器实现
//!
//! Linux 内核 CAN 接口。波特率由 `ip link` 配置，不在应用层设置。
//!
//! ```bash
//! sudo ip link set can0 type can bitrate 250000
//! sudo ip link set up can0
//! ```

use crate::{CanAdapter, CanDeviceError, CanDeviceErrorKind, CanError, MrmFrame};
use ::socketcan::{CanFrame, CanSocket, EmbeddedFrame, ExtendedId, Frame, Socket, StandardId};
use std::io::ErrorKind;
use std::time::Duration;
use tracing::{trace, warn};

/// 默认读超时，短超时保证主循环能及时返回
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// SocketCAN 适配器
///
/// ```no_run
/// use mrm_can::{CanAdapter, MrmFrame, SocketCanAdapter};
///
/// let mut adapter = SocketCanAdapter::new("can0").unwrap();
/// adapter.send(MrmFrame::new_standard(0x100, &[0xFF])).unwrap();
/// let reply = adapter.try_receive().unwrap();
/// ```
#[derive(Debug)]
pub struct SocketCanAdapter {
    socket: CanSocket,
    interface: String,
    read_timeout: Duration,
}

impl SocketCanAdapter {
    /// 打开 CAN 接口
    ///
    /// # 错误
    /// - `CanError::Device`（`NotFound`）：接口不存在或无法打开
    /// - `CanError::Io`：设置读超时失败
    pub fn new(interface: impl Into<String>) -> Result<Self, CanError> {
        let interface = interface.into();

        let socket = CanSocket::open(&interface).map_err(|e| {
            CanError::Device(CanDeviceError::new(
                CanDeviceErrorKind::NotFound,
                format!(
                    "Failed to open CAN interface '{}': {}. Is it up?\n  sudo ip link set up {}",
                    interface, e, interface
                ),
            ))
        })?;

        socket.set_read_timeout(DEFAULT_READ_TIMEOUT).map_err(CanError::Io)?;
        trace!("SocketCAN interface '{}' opened", interface);

        Ok(Self {
            socket,
            interface,
            read_timeout: DEFAULT_READ_TIMEOUT,
        })
    }

    /// 接口名称
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// 设置读超时
    pub fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), CanError> {
        // SO_RCVTIMEO 为 0 表示无限阻塞，用 1µs 代替“立即返回”
        let effective = timeout.max(Duration::from_micros(1));
        self.socket.set_read_timeout(effective).map_err(CanError::Io)?;
        self.read_timeout = timeout;
        Ok(())
    }

    fn to_socketcan(frame: &MrmFrame) -> Result<CanFrame, CanError> {
        let data = frame.data_slice();
        let built = if frame.is_extended {
            ExtendedId::new(frame.id).and_then(|id| CanFrame::new(id, data))
        } else {
            StandardId::new(frame.id as u16).and_then(|id| CanFrame::new(id, data))
        };
        built.ok_or_else(|| {
            CanError::Device(CanDeviceError::new(
                CanDeviceErrorKind::InvalidFrame,
                format!("Failed to create frame with ID 0x{:X}", frame.id),
            ))
        })
    }
}

impl CanAdapter for SocketCanAdapter {
    fn send(&mut self, frame: MrmFrame) -> Result<(), CanError> {
        let can_frame = Self::to_socketcan(&frame)?;
        self.socket.write_frame(&can_frame).map_err(|e| match e.kind() {
            ErrorKind::WouldBlock => CanError::BufferOverflow,
            _ => CanError::Io(e),
        })?;
        trace!("Sent CAN frame: ID=0x{:X}, len={}", frame.id, frame.len);
        Ok(())
    }

    /// 接收帧，自动丢弃错误帧和远程帧
    fn receive(&mut self) -> Result<MrmFrame, CanError> {
        loop {
            let can_frame = match self.socket.read_frame() {
                Ok(frame) => frame,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(CanError::Timeout);
                },
                Err(e) => return Err(CanError::Io(e)),
            };

            match can_frame {
                CanFrame::Data(_) => {
                    let frame = if can_frame.is_extended() {
                        MrmFrame::new_extended(can_frame.raw_id(), can_frame.data())
                    } else {
                        MrmFrame::new_standard(can_frame.raw_id() as u16, can_frame.data())
                    };
                    trace!("Received CAN frame: ID=0x{:X}, len={}", frame.id, frame.len);
                    return Ok(frame);
                },
                CanFrame::Error(err) => {
                    warn!("CAN error frame on '{}': {:?}", self.interface, err);
                },
                CanFrame::Remote(_) => {},
            }
        }
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        if let Err(e) = self.set_read_timeout(timeout) {
            warn!("Failed to set receive timeout: {}", e);
        }
    }

    fn receive_timeout(&mut self, timeout: Duration) -> Result<MrmFrame, CanError> {
        let old_timeout = self.read_timeout;
        self.set_read_timeout(timeout)?;
        let result = self.receive();
        let _ = self.set_read_timeout(old_timeout);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_interface_is_not_found() {
        match SocketCanAdapter::new("mrm_no_such_can") {
            Err(CanError::Device(e)) => assert_eq!(e.kind, CanDeviceErrorKind::NotFound),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("interface should not exist"),
        }
    }

    #[test]
    fn test_frame_conversion_rejects_bad_standard_id() {
        let frame = MrmFrame {
            id: 0x800,
            data: [0; 8],
            len: 1,
            is_extended: false,
            timestamp_us: 0,
        };
        assert!(SocketCanAdapter::to_socketcan(&frame).is_err());
        assert!(SocketCanAdapter::to_socketcan(&MrmFrame::new_standard(0x7FF, &[1])).is_ok());
        assert!(SocketCanAdapter::to_socketcan(&MrmFrame::new_extended(0x800, &[1])).is_ok());
    }
}
