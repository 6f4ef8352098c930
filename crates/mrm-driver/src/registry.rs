//! 异构注册表接口
//!
//! 编排层把各类型的 `Board<P>` 放在同一个列表里遍历：路由帧、扫描、停止。

use crate::board::{Board, ProbeTiming};
use crate::bus::CanBus;
use crate::device::{DeviceSelector, DeviceSummary};
use crate::error::DeviceError;
use crate::liveness::ALL_DEVICES;
use crate::profile::{BoardProfile, StreamPolicy};
use mrm_can::MrmFrame;
use mrm_protocol::BoardKind;
use std::time::Duration;

/// 对象安全的注册表接口
pub trait BoardRegistry: Send {
    fn kind(&self) -> BoardKind;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn capacity(&self) -> usize;
    fn alive_mask(&self) -> u32;

    /// 按默认名称和 ID 段注册下一个设备
    fn add_default(&mut self) -> Result<usize, DeviceError>;

    fn policy(&self) -> StreamPolicy;
    fn set_policy(&mut self, policy: StreamPolicy);
    fn set_timing(&mut self, timing: ProbeTiming);

    /// 处理一帧，返回是否被认领
    fn handle_frame(&mut self, frame: &MrmFrame, now: Duration) -> Result<bool, DeviceError>;

    /// 扫描全部设备
    fn devices_scan(&mut self, bus: &mut CanBus, verbose: bool) -> Result<usize, DeviceError>;

    /// 停止全部设备的连续测量
    fn stop_all(&mut self, bus: &mut CanBus) -> Result<(), DeviceError>;

    /// 向存活设备请求固件版本与帧率
    fn request_info(&mut self, bus: &mut CanBus) -> Result<(), DeviceError>;

    /// 取出等待期间暂存的解码错误
    fn take_errors(&mut self) -> Vec<DeviceError>;

    fn summaries(&self) -> Vec<DeviceSummary>;
}

impl<P: BoardProfile> BoardRegistry for Board<P> {
    fn kind(&self) -> BoardKind {
        P::KIND
    }

    fn len(&self) -> usize {
        Board::len(self)
    }

    fn capacity(&self) -> usize {
        Board::capacity(self)
    }

    fn alive_mask(&self) -> u32 {
        Board::alive_mask(self)
    }

    fn add_default(&mut self) -> Result<usize, DeviceError> {
        Board::add_default(self)
    }

    fn policy(&self) -> StreamPolicy {
        Board::policy(self)
    }

    fn set_policy(&mut self, policy: StreamPolicy) {
        Board::set_policy(self, policy)
    }

    fn set_timing(&mut self, timing: ProbeTiming) {
        Board::set_timing(self, timing)
    }

    fn handle_frame(&mut self, frame: &MrmFrame, now: Duration) -> Result<bool, DeviceError> {
        Board::handle_frame(self, frame, now)
    }

    fn devices_scan(&mut self, bus: &mut CanBus, verbose: bool) -> Result<usize, DeviceError> {
        Board::devices_scan(self, bus, verbose, ALL_DEVICES)
    }

    fn stop_all(&mut self, bus: &mut CanBus) -> Result<(), DeviceError> {
        if Board::is_empty(self) {
            return Ok(());
        }
        self.stop(bus, DeviceSelector::All)
    }

    fn request_info(&mut self, bus: &mut CanBus) -> Result<(), DeviceError> {
        for index in 0..Board::len(self) {
            if self.is_alive(index) {
                self.firmware_request(bus, DeviceSelector::One(index))?;
                self.fps_request(bus, DeviceSelector::One(index))?;
            }
        }
        Ok(())
    }

    fn take_errors(&mut self) -> Vec<DeviceError> {
        Board::take_errors(self)
    }

    fn summaries(&self) -> Vec<DeviceSummary> {
        self.devices
            .iter()
            .map(|device| DeviceSummary {
                kind: P::KIND,
                index: device.index(),
                name: device.name().to_owned(),
                inbound_id: device.inbound_id(),
                outbound_id: device.outbound_id(),
                alive: self.is_alive(device.index()),
                firmware: device.firmware(),
                fps: device.fps(),
                last_error: device.last_error(),
                stream: device.stream_state(),
                frames: device.frames(),
            })
            .collect()
    }
}
