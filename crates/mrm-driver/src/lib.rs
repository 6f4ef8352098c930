//! # MRM Driver
//!
//! 设备注册表、存活探测、命令分发与连续测量握手。
//!
//! ## 层次
//!
//! ```text
//! Board<P: BoardProfile>   每种板卡一个注册表（最多 32 个设备）
//!     ↓ send / wait_for
//! CanBus                   独占 CAN 适配器 + 时钟 + backlog
//!     ↓
//! CanAdapter (mrm-can)
//! ```
//!
//! 所有等待都是单线程协作轮询，超时由注入的 [`Clock`] 计时。
//!
//! ## 示例
//!
//! ```rust
//! use mrm_can::MockCanAdapter;
//! use mrm_driver::drivers::Lidar2m;
//! use mrm_driver::{ALL_DEVICES, Board, CanBus, ManualClock};
//! use std::sync::Arc;
//!
//! let (adapter, handle) = MockCanAdapter::new();
//! handle.echo(0x100, 0x101, 0xFF);
//! let mut bus = CanBus::new(adapter, Arc::new(ManualClock::new()));
//!
//! let mut lidars: Board<Lidar2m> = Board::new();
//! lidars.add_default().unwrap();
//! assert_eq!(lidars.devices_scan(&mut bus, false, ALL_DEVICES).unwrap(), 1);
//! ```

pub mod board;
pub mod bus;
pub mod clock;
pub mod device;
mod dispatch;
pub mod drivers;
pub mod error;
pub mod isr;
pub mod liveness;
pub mod metrics;
pub mod motor;
pub mod profile;
pub mod registry;
pub mod sensor;
mod stream;

pub use board::{Board, ProbeTiming};
pub use bus::{BusConfig, CanBus, Claim};
pub use clock::{Clock, ManualClock, SystemClock};
pub use device::{Device, DeviceSelector, DeviceSummary, FPS_AWAITING, StreamState};
pub use error::DeviceError;
pub use isr::EdgeCounters;
pub use liveness::ALL_DEVICES;
pub use metrics::{BusMetrics, MetricsSnapshot};
pub use motor::{MAX_SPEED, MotorOutputs, MotorProfile, MotorReading};
pub use profile::{BoardProfile, Decoded, StartKind, StreamPolicy};
pub use registry::BoardRegistry;
pub use sensor::CalculatedDataProfile;
