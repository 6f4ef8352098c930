//! 固件与帧率查询

use crate::Connection;
use anyhow::Result;
use clap::Args;
use mrm_driver::FPS_AWAITING;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct InfoCommand {
    /// 等待回复的时长（毫秒）
    #[arg(short, long, default_value_t = 50)]
    pub wait_ms: u64,
}

impl InfoCommand {
    pub fn execute(&self, connection: &Connection) -> Result<()> {
        let mut robot = super::connect(connection)?;
        robot.devices_scan(false)?;
        robot.request_info()?;

        let step = Duration::from_millis(5);
        let deadline = robot.bus().now() + Duration::from_millis(self.wait_ms);
        while robot.bus().now() < deadline {
            robot.no_loop_without_this()?;
            robot.bus().sleep(step);
        }
        robot.no_loop_without_this()?;

        let status = robot.status();
        for device in status.devices.iter().filter(|d| d.alive) {
            let firmware = device
                .firmware
                .map_or_else(|| "?".to_owned(), |v| v.to_string());
            let fps = match device.fps {
                FPS_AWAITING => "?".to_owned(),
                fps => fps.to_string(),
            };
            println!(
                "{:<16} {:<9} firmware {:>5}  fps {:>5}",
                device.kind.model(),
                device.name,
                firmware,
                fps
            );
        }
        print!("{status}");
        Ok(())
    }
}
