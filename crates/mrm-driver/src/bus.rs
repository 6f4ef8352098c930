//! 总线泵
//!
//! [`CanBus`] 独占进程内唯一的 CAN 适配器。所有等待（存活探测、握手、确认）
//! 都是"轮询 + 短休眠"的协作循环：每轮先把 backlog 中暂存的帧重新交给
//! 处理函数，再排空适配器接收队列。不属于当前等待者的帧进入 backlog，
//! 之后由主循环 [`CanBus::drain_all`] 取走分发，帧的到达顺序保持不变。

use crate::clock::Clock;
use crate::metrics::BusMetrics;
use mrm_can::{CanAdapter, CanError, MrmFrame};
use std::collections::VecDeque;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tracing::{trace, warn};

/// 处理函数对一帧的认领结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// 不属于本处理者，留给别人
    NotMine,
    /// 已处理
    Mine,
    /// 已处理，且等待条件已满足
    Finished,
}

/// 总线泵参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// backlog 容量，满时丢弃最旧的帧
    pub backlog_capacity: usize,
    /// 等待循环两次轮询之间的休眠
    pub poll_interval: Duration,
    /// 单次轮询最多从适配器读取的帧数
    pub max_frames_per_poll: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            backlog_capacity: 256,
            poll_interval: Duration::from_micros(100),
            max_frames_per_poll: 512,
        }
    }
}

/// CAN 总线（适配器 + 时钟 + backlog）
pub struct CanBus {
    adapter: Box<dyn CanAdapter + Send>,
    clock: Arc<dyn Clock>,
    backlog: VecDeque<MrmFrame>,
    config: BusConfig,
    metrics: Arc<BusMetrics>,
}

impl CanBus {
    pub fn new<A>(adapter: A, clock: Arc<dyn Clock>) -> Self
    where
        A: CanAdapter + Send + 'static,
    {
        Self::with_config(adapter, clock, BusConfig::default())
    }

    pub fn with_config<A>(adapter: A, clock: Arc<dyn Clock>, config: BusConfig) -> Self
    where
        A: CanAdapter + Send + 'static,
    {
        Self {
            adapter: Box::new(adapter),
            clock,
            backlog: VecDeque::with_capacity(config.backlog_capacity),
            config,
            metrics: Arc::new(BusMetrics::default()),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    pub fn sleep(&self, duration: Duration) {
        self.clock.sleep(duration);
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<BusMetrics> {
        &self.metrics
    }

    /// backlog 中暂存的帧数
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// 发送一帧（`messageSend`）
    pub fn send(&mut self, id: u32, data: &[u8]) -> Result<(), CanError> {
        let frame = MrmFrame::with_id(id, data);
        match self.adapter.send(frame) {
            Ok(()) => {
                BusMetrics::bump(&self.metrics.frames_sent);
                trace!("TX 0x{:03X} {:02X?}", id, frame.data_slice());
                Ok(())
            },
            Err(e) => {
                BusMetrics::bump(&self.metrics.send_errors);
                Err(e)
            },
        }
    }

    /// 单轮轮询
    ///
    /// 先把 backlog 中的每一帧交给 `handler` 一次，再排空适配器。
    /// 返回本轮是否有帧让 `handler` 给出 [`Claim::Finished`]。
    /// 处理函数报错不会中断本轮，其余帧照常处理，最后返回第一个错误。
    pub fn poll<E, F>(&mut self, mut handler: F) -> Result<bool, E>
    where
        E: From<CanError> + Display,
        F: FnMut(&MrmFrame, Duration) -> Result<Claim, E>,
    {
        let now = self.clock.now();
        let mut outcome = PollOutcome::default();

        for _ in 0..self.backlog.len() {
            let Some(frame) = self.backlog.pop_front() else {
                break;
            };
            if !outcome.offer(&mut handler, &frame, now) {
                self.backlog.push_back(frame);
            }
        }

        for _ in 0..self.config.max_frames_per_poll {
            let frame = match self.adapter.try_receive() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    outcome.fail(E::from(e));
                    break;
                },
            };
            BusMetrics::bump(&self.metrics.frames_received);
            trace!("RX 0x{:03X} {:02X?}", frame.id, frame.data_slice());
            if !outcome.offer(&mut handler, &frame, now) {
                self.defer(frame);
            }
        }

        outcome.finish()
    }

    /// 反复轮询直到 `handler` 给出 [`Claim::Finished`] 或到达 `deadline`
    ///
    /// 休眠时长不超过剩余时间，因此不会越过截止时刻。
    pub fn wait_until<E, F>(&mut self, deadline: Duration, mut handler: F) -> Result<bool, E>
    where
        E: From<CanError> + Display,
        F: FnMut(&MrmFrame, Duration) -> Result<Claim, E>,
    {
        loop {
            if self.poll(&mut handler)? {
                return Ok(true);
            }
            let now = self.now();
            if now >= deadline {
                return Ok(false);
            }
            self.sleep((deadline - now).min(self.config.poll_interval));
        }
    }

    /// 记录一帧无人认领的帧
    pub fn note_unclaimed(&self, frame: &MrmFrame) {
        BusMetrics::bump(&self.metrics.unclaimed);
        trace!("Unclaimed frame 0x{:03X} {:02X?}", frame.id, frame.data_slice());
    }

    /// 取出全部待处理帧：先 backlog，再适配器队列
    pub fn drain_all(&mut self) -> Result<Vec<MrmFrame>, CanError> {
        let mut frames: Vec<MrmFrame> = self.backlog.drain(..).collect();
        for _ in 0..self.config.max_frames_per_poll {
            match self.adapter.try_receive() {
                Ok(Some(frame)) => {
                    BusMetrics::bump(&self.metrics.frames_received);
                    trace!("RX 0x{:03X} {:02X?}", frame.id, frame.data_slice());
                    frames.push(frame);
                },
                Ok(None) => break,
                Err(e) => {
                    // 已取出的帧放回 backlog，下一轮再处理
                    self.backlog.extend(frames);
                    return Err(e);
                },
            }
        }
        Ok(frames)
    }

    fn defer(&mut self, frame: MrmFrame) {
        if self.backlog.len() >= self.config.backlog_capacity {
            if let Some(dropped) = self.backlog.pop_front() {
                BusMetrics::bump(&self.metrics.backlog_dropped);
                warn!(
                    "Backlog full ({}), dropping frame 0x{:03X}",
                    self.config.backlog_capacity, dropped.id
                );
            }
        }
        if self.config.backlog_capacity > 0 {
            BusMetrics::bump(&self.metrics.frames_deferred);
            self.backlog.push_back(frame);
        }
    }
}

struct PollOutcome<E> {
    finished: bool,
    error: Option<E>,
}

impl<E> Default for PollOutcome<E> {
    fn default() -> Self {
        Self {
            finished: false,
            error: None,
        }
    }
}

impl<E: Display> PollOutcome<E> {
    /// 返回帧是否被认领
    fn offer<F>(&mut self, handler: &mut F, frame: &MrmFrame, now: Duration) -> bool
    where
        F: FnMut(&MrmFrame, Duration) -> Result<Claim, E>,
    {
        match handler(frame, now) {
            Ok(Claim::NotMine) => false,
            Ok(Claim::Mine) => true,
            Ok(Claim::Finished) => {
                self.finished = true;
                true
            },
            Err(e) => {
                self.fail(e);
                true
            },
        }
    }

    fn fail(&mut self, error: E) {
        if self.error.is_some() {
            warn!("Further error in the same poll: {}", error);
        } else {
            self.error = Some(error);
        }
    }

    fn finish(self) -> Result<bool, E> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.finished),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use mrm_can::{MockCanAdapter, MockHandle};

    fn bus_with(config: BusConfig) -> (CanBus, MockHandle, Arc<ManualClock>) {
        let (adapter, handle) = MockCanAdapter::new();
        let clock = Arc::new(ManualClock::new());
        (CanBus::with_config(adapter, clock.clone(), config), handle, clock)
    }

    fn claim_id(id: u32) -> impl FnMut(&MrmFrame, Duration) -> Result<Claim, CanError> {
        move |frame, _| Ok(if frame.id == id { Claim::Mine } else { Claim::NotMine })
    }

    #[test]
    fn test_send_records_metrics() {
        let (mut bus, handle, _) = bus_with(BusConfig::default());
        bus.send(0x100, &[0xFF]).unwrap();
        assert_eq!(handle.count_sent(0x100, 0xFF), 1);
        assert_eq!(bus.metrics().snapshot().frames_sent, 1);

        handle.fail_sends(true);
        assert!(bus.send(0x100, &[0xFF]).is_err());
        assert_eq!(bus.metrics().snapshot().send_errors, 1);
    }

    #[test]
    fn test_unclaimed_frames_are_deferred_in_order() {
        let (mut bus, handle, _) = bus_with(BusConfig::default());
        handle.push(0x101, &[0x13, 1]);
        handle.push(0x161, &[0x13, 2]);
        handle.push(0x163, &[0x13, 3]);

        assert!(!bus.poll(claim_id(0x101)).unwrap());
        assert_eq!(bus.backlog_len(), 2);

        let frames = bus.drain_all().unwrap();
        let ids: Vec<u32> = frames.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![0x161, 0x163]);
        assert_eq!(bus.backlog_len(), 0);
    }

    #[test]
    fn test_backlog_is_offered_before_new_frames() {
        let (mut bus, handle, _) = bus_with(BusConfig::default());
        handle.push(0x161, &[0x13, 1]);
        bus.poll(claim_id(0x101)).unwrap();

        handle.push(0x161, &[0x13, 2]);
        let mut seen = Vec::new();
        bus.poll(|frame: &MrmFrame, _| -> Result<Claim, CanError> {
            seen.push(frame.data[1]);
            Ok(Claim::Mine)
        })
        .unwrap();
        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn test_backlog_overflow_drops_oldest() {
        let (mut bus, handle, _) = bus_with(BusConfig {
            backlog_capacity: 2,
            ..BusConfig::default()
        });
        for n in 0..3u8 {
            handle.push(0x161, &[0x13, n]);
        }
        bus.poll(claim_id(0x101)).unwrap();

        let frames = bus.drain_all().unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data[1], 1);
        assert_eq!(bus.metrics().snapshot().backlog_dropped, 1);
    }

    #[test]
    fn test_wait_until_stops_at_deadline() {
        let (mut bus, _handle, clock) = bus_with(BusConfig::default());
        let deadline = Duration::from_micros(500);
        let finished = bus.wait_until(deadline, claim_id(0x101)).unwrap();
        assert!(!finished);
        assert_eq!(clock.now(), deadline);
    }

    #[test]
    fn test_wait_until_returns_on_finished() {
        let (mut bus, handle, clock) = bus_with(BusConfig::default());
        handle.echo(0x100, 0x101, 0xFF);
        bus.send(0x100, &[0xFF]).unwrap();

        let finished = bus
            .wait_until(Duration::from_millis(10), |frame: &MrmFrame, _| {
                Ok::<_, CanError>(if frame.id == 0x101 {
                    Claim::Finished
                } else {
                    Claim::NotMine
                })
            })
            .unwrap();
        assert!(finished);
        assert_eq!(clock.now(), Duration::ZERO);
    }
}
