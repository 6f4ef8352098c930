//! # MRM Client
//!
//! 面向应用的入口：从 TOML 配置构建 [`Robot`]，在主循环中路由总线帧，
//! 出错时执行故障停机。
//!
//! ```no_run
//! use mrm_client::{Robot, RobotConfig, init_logger};
//!
//! # fn main() -> Result<(), mrm_client::RobotError> {
//! init_logger();
//! let config = RobotConfig::load("robot.toml")?;
//! let mut robot = Robot::builder().config(config).build()?;
//! robot.devices_scan(true)?;
//! loop {
//!     robot.no_loop_without_this()?;
//!     let distance = robot.run(|boards, bus| boards.lidars_2m.distance(bus, 0))?;
//!     if distance < 100 {
//!         robot.stop_all()?;
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod boards;
pub mod config;
pub mod error;
pub mod logging;
pub mod robot;

pub use boards::Boards;
pub use config::{BoardEntry, BusSettings, FailsafeSettings, RobotConfig, TimingSettings};
pub use error::RobotError;
pub use logging::{init_logger, init_logger_with};
pub use robot::{BoardStatus, MOCK_INTERFACE, Robot, RobotBuilder, RobotStatus};

pub use mrm_control::{MotorGroupDifferential, MotorGroupStar};
pub use mrm_driver::{CanBus, DeviceError, DeviceSelector};
pub use mrm_protocol::BoardKind;
