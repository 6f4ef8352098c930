//! 中断计数区
//!
//! 固定数量的边沿计数器，由中断回调（或 GPIO 监听线程）写入、主循环读取。
//! 构造后不再分配内存，写入只用原子操作。

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

/// 边沿计数器组
#[derive(Debug)]
pub struct EdgeCounters<const N: usize = 8> {
    counts: [AtomicU32; N],
    last_edge_us: [AtomicU64; N],
}

impl<const N: usize> Default for EdgeCounters<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> EdgeCounters<N> {
    pub fn new() -> Self {
        Self {
            counts: std::array::from_fn(|_| AtomicU32::new(0)),
            last_edge_us: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    pub const fn channels(&self) -> usize {
        N
    }

    /// 记录一次边沿，通道越界返回 `false`
    pub fn record_edge(&self, channel: usize, now: Duration) -> bool {
        let (Some(count), Some(last)) = (self.counts.get(channel), self.last_edge_us.get(channel))
        else {
            return false;
        };
        count.fetch_add(1, Ordering::Relaxed);
        // 0 表示从未触发
        last.store((now.as_micros() as u64).max(1), Ordering::Release);
        true
    }

    pub fn count(&self, channel: usize) -> u32 {
        self.counts
            .get(channel)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    /// 读取并清零
    pub fn take(&self, channel: usize) -> u32 {
        self.counts
            .get(channel)
            .map_or(0, |c| c.swap(0, Ordering::AcqRel))
    }

    pub fn last_edge(&self, channel: usize) -> Option<Duration> {
        let us = self.last_edge_us.get(channel)?.load(Ordering::Acquire);
        (us != 0).then(|| Duration::from_micros(us))
    }

    pub fn reset(&self) {
        for (count, last) in self.counts.iter().zip(&self.last_edge_us) {
            count.store(0, Ordering::Relaxed);
            last.store(0, Ordering::Relaxed);
        }
    }
}
