//! 日志初始化
//!
//! `RUST_LOG` 优先，未设置时使用给定的默认级别。`log` crate 的记录
//! 通过 `tracing-log` 转发。重复调用无副作用。

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// 以 `info` 为默认级别初始化
pub fn init_logger() {
    init_logger_with("info");
}

/// 以指定的默认过滤指令初始化（如 `"mrm_driver=debug"`）
pub fn init_logger_with(default_directive: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive));
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .finish();
        if tracing::subscriber::set_global_default(subscriber).is_ok() {
            let _ = tracing_log::LogTracer::init();
        }
    });
}
