//! 子命令

mod info;
mod scan;
mod stop;
mod stream;

pub use info::InfoCommand;
pub use scan::ScanCommand;
pub use stop::StopCommand;
pub use stream::StreamCommand;

use crate::Connection;
use anyhow::{Context, Result};
use mrm_client::{Robot, RobotConfig};

/// 按配置文件与命令行参数构建 Robot
pub fn connect(connection: &Connection) -> Result<Robot> {
    let config = match &connection.config {
        Some(path) => RobotConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => RobotConfig::default(),
    };

    let mut builder = Robot::builder().config(config);
    if let Some(interface) = &connection.interface {
        builder = builder.interface(interface.as_str());
    }
    let robot = builder.build().context("opening the CAN bus")?;
    Ok(robot)
}
