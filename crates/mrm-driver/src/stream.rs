//! 连续测量握手
//!
//! 读数前确认设备正在连续发送：未启动或数据过期时发送启动命令，
//! 每次最多等待 `retry_wait`，直到出现新鲜读数；重试耗尽后回到
//! `NotStarted` 并报告设备掉线。所有读数接口都经过这里。

use crate::board::Board;
use crate::bus::CanBus;
use crate::device::{DeviceSelector, StreamState};
use crate::error::DeviceError;
use crate::profile::{BoardProfile, StartKind};
use std::time::Duration;
use tracing::{debug, warn};

impl<P: BoardProfile> Board<P> {
    /// 处理总线上已到达的本注册表帧（不等待）
    pub fn pump(&mut self, bus: &mut CanBus) -> Result<(), DeviceError> {
        self.wait_for(bus, Duration::ZERO, |_, _, _| false)?;
        Ok(())
    }

    /// 确保设备以默认方式连续发送
    pub fn ensure_streaming(&mut self, bus: &mut CanBus, index: usize) -> Result<(), DeviceError> {
        let kind = self.policy.start;
        self.ensure_streaming_as(bus, index, kind)
    }

    pub(crate) fn ensure_streaming_as(
        &mut self,
        bus: &mut CanBus,
        index: usize,
        kind: StartKind,
    ) -> Result<(), DeviceError> {
        let policy = self.policy;
        let device = self.device(index)?;
        if device.stream == StreamState::Streaming && device.start_kind == kind {
            if device.reading_within(bus.now(), policy.staleness) {
                return Ok(());
            }
            debug!("{} '{}': stream stale, restarting", P::KIND, device.name);
        }

        let attempts = policy.retries.max(1);
        for attempt in 1..=attempts {
            self.start_as(bus, DeviceSelector::One(index), kind, 0, 0)?;
            self.devices[index].stream = StreamState::Starting;
            let fresh = policy.fresh_within;
            let streaming = self.wait_for(bus, policy.retry_wait, |board, frame, now| {
                board.is_for_me(frame.id, index) && board.devices[index].reading_within(now, fresh)
            })?;
            if streaming {
                self.devices[index].stream = StreamState::Streaming;
                debug!(
                    "{} '{}': streaming after {} attempt(s)",
                    P::KIND, self.devices[index].name, attempt
                );
                return Ok(());
            }
        }

        self.devices[index].stream = StreamState::NotStarted;
        warn!(
            "{} '{}': no data after {} start attempts",
            P::KIND, self.devices[index].name, attempts
        );
        Err(DeviceError::DeviceDead {
            board: P::KIND,
            device: index,
            attempts,
        })
    }

    /// 读取设备的最新读数
    ///
    /// 设备未存活时立即失败，不发送任何帧。
    pub fn reading(&mut self, bus: &mut CanBus, index: usize) -> Result<&P::Reading, DeviceError> {
        let kind = self.policy.start;
        self.reading_as(bus, index, kind)
    }

    pub(crate) fn reading_as(
        &mut self,
        bus: &mut CanBus,
        index: usize,
        kind: StartKind,
    ) -> Result<&P::Reading, DeviceError> {
        self.device(index)?;
        if !self.is_alive(index) {
            return Err(DeviceError::DeviceDead {
                board: P::KIND,
                device: index,
                attempts: 0,
            });
        }
        self.pump(bus)?;
        self.ensure_streaming_as(bus, index, kind)?;
        Ok(&self.devices[index].reading)
    }

    /// 读取失败时返回默认读数并记录警告
    pub fn reading_or_default(&mut self, bus: &mut CanBus, index: usize) -> P::Reading {
        match self.reading(bus, index) {
            Ok(reading) => reading.clone(),
            Err(e) => {
                warn!("{}", e);
                P::Reading::default()
            },
        }
    }
}
