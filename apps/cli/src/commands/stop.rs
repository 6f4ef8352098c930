//! 停止命令

use crate::Connection;
use anyhow::Result;
use clap::Args;

#[derive(Args, Debug)]
pub struct StopCommand {}

impl StopCommand {
    pub fn execute(&self, connection: &Connection) -> Result<()> {
        let mut robot = super::connect(connection)?;
        robot.stop_all()?;
        println!("All measurements stopped, motors at 0");
        Ok(())
    }
}
