//! 时钟抽象
//!
//! 所有超时（存活探测、握手重试、确认等待）都通过 [`Clock`] 计时，
//! 测试中用 [`ManualClock`] 让 `sleep` 直接推进虚拟时间。

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 单调时钟
pub trait Clock: Send + Sync {
    /// 自时钟创建以来经过的时间
    fn now(&self) -> Duration;

    /// 休眠（总线泵在两次轮询之间调用）
    fn sleep(&self, duration: Duration);
}

/// 系统单调时钟，微秒级休眠使用 `spin_sleep`
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    anchor: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            anchor: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.anchor.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            spin_sleep::sleep(duration);
        }
    }
}

/// 手动推进的虚拟时钟
///
/// `sleep` 不阻塞，只把当前时间向前推。
#[derive(Debug, Default)]
pub struct ManualClock {
    now_us: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// 推进虚拟时间
    pub fn advance(&self, duration: Duration) {
        self.now_us
            .fetch_add(duration.as_micros() as u64, Ordering::SeqCst);
    }

    /// 直接设定虚拟时间
    pub fn set(&self, now: Duration) {
        self.now_us.store(now.as_micros() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_micros(self.now_us.load(Ordering::SeqCst))
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}
