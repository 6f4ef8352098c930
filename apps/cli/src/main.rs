//! # MRM CLI
//!
//! MRM CAN 板卡的命令行工具。
//!
//! ```bash
//! # 扫描配置文件中登记的全部板卡
//! mrm-cli --config robot.toml scan
//!
//! # 固件版本与帧率
//! mrm-cli --config robot.toml info
//!
//! # 连续打印 2 号激光测距读数，Ctrl-C 结束
//! mrm-cli --config robot.toml stream --kind lidar2m --device 2
//!
//! # 不接硬件试运行
//! mrm-cli --interface mock --config robot.toml scan
//! ```
//!
//! 日志级别由 `RUST_LOG` 控制（默认 `info`）。

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

use commands::{InfoCommand, ScanCommand, StopCommand, StreamCommand};

/// MRM CLI - CAN 板卡命令行工具
#[derive(Parser, Debug)]
#[command(name = "mrm-cli")]
#[command(about = "Command-line tool for MRM CAN boards", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    connection: Connection,

    #[command(subcommand)]
    command: Commands,
}

/// 连接参数（所有子命令共用）
#[derive(clap::Args, Debug, Clone)]
pub struct Connection {
    /// 机器人配置文件（TOML）
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// CAN 接口（覆盖配置），`mock` 为内存总线
    #[arg(short, long, global = true)]
    pub interface: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 探测已登记设备是否在线
    Scan {
        #[command(flatten)]
        args: ScanCommand,
    },

    /// 查询在线设备的固件版本与帧率
    Info {
        #[command(flatten)]
        args: InfoCommand,
    },

    /// 连续打印某个设备的读数
    Stream {
        #[command(flatten)]
        args: StreamCommand,
    },

    /// 停止全部测量，电机速度置 0
    Stop {
        #[command(flatten)]
        args: StopCommand,
    },
}

fn main() -> Result<()> {
    mrm_client::init_logger();

    let cli = Cli::parse();
    match cli.command {
        Commands::Scan { args } => args.execute(&cli.connection),
        Commands::Info { args } => args.execute(&cli.connection),
        Commands::Stream { args } => args.execute(&cli.connection),
        Commands::Stop { args } => args.execute(&cli.connection),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mrm_protocol::BoardKind;

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["mrm-cli", "scan", "--interface", "vcan0"]).unwrap();
        assert_eq!(cli.connection.interface.as_deref(), Some("vcan0"));
        assert!(matches!(cli.command, Commands::Scan { .. }));
    }

    #[test]
    fn test_stream_arguments() {
        let cli = Cli::try_parse_from([
            "mrm-cli", "-c", "robot.toml", "stream", "--kind", "color", "--device", "1",
            "--count", "5",
        ])
        .unwrap();
        assert_eq!(cli.connection.config, Some(PathBuf::from("robot.toml")));
        match cli.command {
            Commands::Stream { args } => {
                assert_eq!(args.kind, BoardKind::Color);
                assert_eq!(args.device, 1);
                assert_eq!(args.count, Some(5));
            },
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_kind_rejected() {
        assert!(Cli::try_parse_from(["mrm-cli", "stream", "--kind", "toaster"]).is_err());
    }
}
