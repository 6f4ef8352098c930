//! 总线计数器
//!
//! 全部为原子计数，CLI 可以在另一个线程里读取快照。

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct BusMetrics {
    pub frames_sent: AtomicU64,
    pub frames_received: AtomicU64,
    pub send_errors: AtomicU64,
    /// 等待期间读到、暂存到 backlog 的帧
    pub frames_deferred: AtomicU64,
    /// backlog 满时丢弃的最旧帧
    pub backlog_dropped: AtomicU64,
    /// 没有任何注册表认领的帧
    pub unclaimed: AtomicU64,
}

/// 计数器快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub send_errors: u64,
    pub frames_deferred: u64,
    pub backlog_dropped: u64,
    pub unclaimed: u64,
}

impl BusMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            frames_deferred: self.frames_deferred.load(Ordering::Relaxed),
            backlog_dropped: self.backlog_dropped.load(Ordering::Relaxed),
            unclaimed: self.unclaimed.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}
