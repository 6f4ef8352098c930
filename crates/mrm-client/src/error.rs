//! 编排层错误类型

use mrm_can::CanError;
use mrm_driver::DeviceError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RobotError {
    /// 设备错误
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// CAN 传输错误
    #[error("CAN error: {0}")]
    Can(#[from] CanError),

    /// 配置内容无效
    #[error("Configuration error: {0}")]
    Config(String),

    /// 配置文件无法读取
    #[error("Failed to read config file {}: {source}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML 解析失败
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl RobotError {
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            RobotError::Config(_) | RobotError::ConfigIo { .. } | RobotError::ConfigParse(_)
        )
    }
}
