//! 各型号板卡
//!
//! 每个文件定义板卡的 profile 类型、读数结构和类型化读数接口。
//! 设备自定义命令码（0x00-0x0F）只在对应文件中解释。

mod color;
mod ir_finder;
mod motors;
mod node;
mod range;
mod reflectance;
mod thermal;

pub use color::{ColorChannel, ColorReading, ColorSensor};
pub use ir_finder::{IrFinder, IrFinderReading};
pub use motors::{Bldc2x50, Mot2x50, Mot4x10, Mot4x36};
pub use node::{Node, NodeReading};
pub use range::{DistanceReading, Lidar2m, Lidar4m, RangeProfile, Ultrasonic};
pub use reflectance::{ReflectanceArray, ReflectanceReading};
pub use thermal::{Thermal, ThermalReading};
