//! # 机器人配置
//!
//! TOML 配置文件，所有字段都有默认值，空文件也是合法配置：
//!
//! ```toml
//! [bus]
//! interface = "can0"
//! backlog_capacity = 256
//!
//! [timing]
//! scan_timeout_us = 500
//! stream_retries = 8
//!
//! [failsafe]
//! halt_motors_on_error = true
//!
//! [[boards]]
//! kind = "lidar2m"
//! count = 2
//!
//! [[boards]]
//! kind = "mot4x36"
//! count = 4
//! ```

use crate::error::RobotError;
use mrm_driver::{BusConfig, ProbeTiming, StreamPolicy};
use mrm_protocol::BoardKind;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 配置根
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    pub bus: BusSettings,
    pub timing: TimingSettings,
    pub failsafe: FailsafeSettings,
    pub boards: Vec<BoardEntry>,
}

/// `[bus]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusSettings {
    /// SocketCAN 接口名，或 `"mock"`（内存总线，需启用 `mock` feature）
    pub interface: String,
    /// 暂存帧队列容量
    pub backlog_capacity: usize,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            interface: "can0".to_owned(),
            backlog_capacity: 256,
        }
    }
}

/// `[timing]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    pub scan_timeout_us: u64,
    pub poll_interval_us: u64,
    pub stream_retries: u8,
    pub stream_retry_wait_ms: u64,
    pub stream_fresh_ms: u64,
    pub notification_timeout_ms: u64,
    pub notification_retries: u8,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            scan_timeout_us: 500,
            poll_interval_us: 100,
            stream_retries: 8,
            stream_retry_wait_ms: 50,
            stream_fresh_ms: 100,
            notification_timeout_ms: 20,
            notification_retries: 3,
        }
    }
}

/// `[failsafe]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailsafeSettings {
    /// 设备错误时把全部电机速度置 0
    pub halt_motors_on_error: bool,
}

impl Default for FailsafeSettings {
    fn default() -> Self {
        Self {
            halt_motors_on_error: true,
        }
    }
}

/// `[[boards]]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardEntry {
    pub kind: BoardKind,
    #[serde(default = "default_count")]
    pub count: usize,
}

fn default_count() -> usize {
    1
}

impl RobotConfig {
    /// 从文件加载并校验
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RobotError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| RobotError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// 解析 TOML 文本并校验
    pub fn from_toml_str(content: &str) -> Result<Self, RobotError> {
        let config: RobotConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, RobotError> {
        toml::to_string_pretty(self).map_err(|e| RobotError::Config(e.to_string()))
    }

    /// 校验取值范围与板卡数量
    pub fn validate(&self) -> Result<(), RobotError> {
        if self.bus.interface.trim().is_empty() {
            return Err(RobotError::Config("bus.interface must not be empty".into()));
        }
        if self.bus.backlog_capacity == 0 {
            return Err(RobotError::Config("bus.backlog_capacity must be > 0".into()));
        }
        if self.timing.stream_retries == 0 {
            return Err(RobotError::Config("timing.stream_retries must be > 0".into()));
        }
        if self.timing.notification_retries == 0 {
            return Err(RobotError::Config(
                "timing.notification_retries must be > 0".into(),
            ));
        }
        if self.timing.scan_timeout_us == 0 {
            return Err(RobotError::Config("timing.scan_timeout_us must be > 0".into()));
        }
        if self.timing.poll_interval_us == 0 {
            return Err(RobotError::Config("timing.poll_interval_us must be > 0".into()));
        }

        for kind in BoardKind::ALL {
            let total: usize = self
                .boards
                .iter()
                .filter(|entry| entry.kind == kind)
                .map(|entry| entry.count)
                .sum();
            if total > kind.max_devices() {
                return Err(RobotError::Config(format!(
                    "{kind}: {total} devices configured, at most {} supported",
                    kind.max_devices()
                )));
            }
        }
        Ok(())
    }

    pub fn bus_config(&self) -> BusConfig {
        BusConfig {
            backlog_capacity: self.bus.backlog_capacity,
            poll_interval: Duration::from_micros(self.timing.poll_interval_us),
            ..BusConfig::default()
        }
    }

    pub fn probe_timing(&self) -> ProbeTiming {
        ProbeTiming {
            scan_timeout: Duration::from_micros(self.timing.scan_timeout_us),
            notification_timeout: Duration::from_millis(self.timing.notification_timeout_ms),
            notification_retries: self.timing.notification_retries,
        }
    }

    /// 在某类型默认握手策略上套用配置的重试参数（新鲜度阈值保留类型默认值）
    pub fn stream_policy(&self, base: StreamPolicy) -> StreamPolicy {
        StreamPolicy {
            retries: self.timing.stream_retries,
            retry_wait: Duration::from_millis(self.timing.stream_retry_wait_ms),
            fresh_within: Duration::from_millis(self.timing.stream_fresh_ms),
            ..base
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = RobotConfig::from_toml_str("").unwrap();
        assert_eq!(config, RobotConfig::default());
        assert_eq!(config.bus.interface, "can0");
        assert_eq!(config.timing.stream_retries, 8);
        assert!(config.failsafe.halt_motors_on_error);
        assert!(config.boards.is_empty());
    }

    #[test]
    fn test_partial_sections() {
        let config = RobotConfig::from_toml_str(
            r#"
            [bus]
            interface = "vcan0"

            [timing]
            stream_retries = 3

            [[boards]]
            kind = "color"
            count = 3

            [[boards]]
            kind = "mot4x36"
            "#,
        )
        .unwrap();
        assert_eq!(config.bus.interface, "vcan0");
        assert_eq!(config.bus.backlog_capacity, 256);
        assert_eq!(config.timing.stream_retries, 3);
        assert_eq!(config.timing.stream_retry_wait_ms, 50);
        assert_eq!(
            config.boards,
            vec![
                BoardEntry { kind: BoardKind::Color, count: 3 },
                BoardEntry { kind: BoardKind::Mot4x36, count: 1 },
            ]
        );
    }

    #[test]
    fn test_too_many_devices_rejected() {
        let err = RobotConfig::from_toml_str(
            r#"
            [[boards]]
            kind = "ir_finder"
            count = 2
            [[boards]]
            kind = "ir_finder"
            count = 1
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, RobotError::Config(_)), "{err}");
    }

    #[test]
    fn test_unknown_kind_is_parse_error() {
        let err = RobotConfig::from_toml_str("[[boards]]\nkind = \"toaster\"\n").unwrap_err();
        assert!(matches!(err, RobotError::ConfigParse(_)));
    }

    #[test]
    fn test_zero_retries_rejected() {
        let err = RobotConfig::from_toml_str("[timing]\nstream_retries = 0\n").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let err = RobotConfig::from_toml_str("[timing]\npoll_interval_us = 0\n").unwrap_err();
        assert!(err.is_config(), "{err}");
        assert!(RobotConfig::from_toml_str("[timing]\npoll_interval_us = 1\n").is_ok());
    }

    #[test]
    fn test_toml_string_parses_back() {
        let mut config = RobotConfig::default();
        config.boards.push(BoardEntry {
            kind: BoardKind::Thermal,
            count: 2,
        });
        let text = config.to_toml_string().unwrap();
        assert_eq!(RobotConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_kind_names_match_serde() {
        for kind in BoardKind::ALL {
            let text = format!("[[boards]]\nkind = \"{}\"\n", kind.name());
            let config = RobotConfig::from_toml_str(&text).unwrap();
            assert_eq!(config.boards[0].kind, kind);
        }
    }

    #[test]
    fn test_derived_driver_settings() {
        let config = RobotConfig::default();
        assert_eq!(config.probe_timing(), ProbeTiming::default());
        assert_eq!(config.bus_config(), BusConfig::default());

        let base = StreamPolicy::with_staleness(Duration::from_secs(30));
        let policy = config.stream_policy(base);
        assert_eq!(policy.staleness, Duration::from_secs(30));
        assert_eq!(policy.retries, 8);
        assert_eq!(policy.retry_wait, Duration::from_millis(50));
    }
}
