//! 扫描命令

use crate::Connection;
use anyhow::Result;
use clap::Args;

#[derive(Args, Debug)]
pub struct ScanCommand {
    /// 只打印汇总
    #[arg(short, long)]
    pub quiet: bool,
}

impl ScanCommand {
    pub fn execute(&self, connection: &Connection) -> Result<()> {
        let mut robot = super::connect(connection)?;
        let alive = robot.devices_scan(!self.quiet)?;
        robot.no_loop_without_this()?;

        let status = robot.status();
        if !self.quiet {
            for device in &status.devices {
                println!(
                    "{:<16} {:<9} in 0x{:03X} out 0x{:03X}  {}",
                    device.kind.model(),
                    device.name,
                    device.inbound_id,
                    device.outbound_id,
                    if device.alive { "alive" } else { "-" }
                );
            }
        }
        println!("{} of {} devices alive", alive, status.devices.len());
        Ok(())
    }
}
