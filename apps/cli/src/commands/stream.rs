//! 连续读数

use crate::Connection;
use anyhow::{Result, bail};
use clap::Args;
use mrm_client::{BoardKind, Boards, CanBus, DeviceError};
use mrm_driver::{Board, BoardProfile};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Args, Debug)]
pub struct StreamCommand {
    /// 板卡类型（如 lidar2m、color、thermal）
    #[arg(short, long)]
    pub kind: BoardKind,

    /// 设备序号
    #[arg(short, long, default_value_t = 0)]
    pub device: usize,

    /// 读数条数，不指定时一直运行到 Ctrl-C
    #[arg(short = 'n', long)]
    pub count: Option<u64>,

    /// 两次读数之间的间隔（毫秒）
    #[arg(long, default_value_t = 100)]
    pub interval_ms: u64,
}

impl StreamCommand {
    pub fn execute(&self, connection: &Connection) -> Result<()> {
        let mut robot = super::connect(connection)?;
        let registered = robot.boards().registry(self.kind).len();
        if self.device >= registered {
            bail!(
                "{} has {} registered device(s), no device {}",
                self.kind,
                registered,
                self.device
            );
        }

        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))?;

        robot.devices_scan(false)?;
        let interval = Duration::from_millis(self.interval_ms);
        let mut rounds = 0u64;
        while running.load(Ordering::SeqCst) && self.count.is_none_or(|n| rounds < n) {
            robot.no_loop_without_this()?;
            let (kind, device) = (self.kind, self.device);
            let (boards, bus) = robot.split();
            let result = tolerate_device_errors(sample(boards, bus, kind, device));
            if let Some(line) = robot.guard(result)? {
                println!("{:>6} {}", rounds, line);
            }
            rounds += 1;
            robot.bus().sleep(interval);
        }

        info!("Streaming stopped after {} rounds", rounds);
        robot.stop_all()?;
        Ok(())
    }
}

fn describe<P: BoardProfile>(
    board: &mut Board<P>,
    bus: &mut CanBus,
    index: usize,
) -> Result<String, DeviceError> {
    board.reading(bus, index).map(|reading| format!("{reading:?}"))
}

/// 设备掉线等非致命错误只记录，下一轮重新握手
fn tolerate_device_errors(
    result: Result<String, DeviceError>,
) -> Result<Option<String>, DeviceError> {
    match result {
        Ok(line) => Ok(Some(line)),
        Err(e) if !e.is_fatal() => {
            warn!("{}", e);
            Ok(None)
        },
        Err(e) => Err(e),
    }
}

/// 读一次并格式化
fn sample(
    boards: &mut Boards,
    bus: &mut CanBus,
    kind: BoardKind,
    index: usize,
) -> Result<String, DeviceError> {
    match kind {
        BoardKind::Lidar2m => describe(&mut boards.lidars_2m, bus, index),
        BoardKind::Lidar4m => describe(&mut boards.lidars_4m, bus, index),
        BoardKind::Reflectance => describe(&mut boards.reflectance, bus, index),
        BoardKind::Color => describe(&mut boards.colors, bus, index),
        BoardKind::Thermal => describe(&mut boards.thermal, bus, index),
        BoardKind::Node => describe(&mut boards.nodes, bus, index),
        BoardKind::Ultrasonic => describe(&mut boards.ultrasonic, bus, index),
        BoardKind::IrFinder => describe(&mut boards.ir_finders, bus, index),
        BoardKind::Mot4x36 => describe(&mut boards.mot4x36, bus, index),
        BoardKind::Mot4x10 => describe(&mut boards.mot4x10, bus, index),
        BoardKind::Mot2x50 => describe(&mut boards.mot2x50, bus, index),
        BoardKind::Bldc2x50 => describe(&mut boards.bldc2x50, bus, index),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dead_device_does_not_end_stream() {
        let dead = DeviceError::DeviceDead {
            board: BoardKind::Lidar2m,
            device: 0,
            attempts: 8,
        };
        assert_eq!(tolerate_device_errors(Err(dead)).unwrap(), None);
        assert_eq!(
            tolerate_device_errors(Ok("1000".into())).unwrap(),
            Some("1000".to_owned())
        );
    }

    #[test]
    fn test_fatal_error_ends_stream() {
        let err = tolerate_device_errors(Err(DeviceError::NoDeviceAlive {
            board: BoardKind::Color,
        }))
        .unwrap_err();
        assert!(matches!(err, DeviceError::NoDeviceAlive { .. }));
    }
}
