//! 全部板卡类型的注册表集合

use crate::error::RobotError;
use mrm_driver::drivers::{
    Bldc2x50, ColorSensor, IrFinder, Lidar2m, Lidar4m, Mot2x50, Mot4x10, Mot4x36, Node,
    ReflectanceArray, Thermal, Ultrasonic,
};
use mrm_driver::{Board, BoardRegistry, MotorOutputs, ProbeTiming, StreamPolicy};
use mrm_protocol::BoardKind;
use tracing::debug;

/// 每种板卡类型一个 `Board<P>`
#[derive(Debug, Default)]
pub struct Boards {
    pub lidars_2m: Board<Lidar2m>,
    pub lidars_4m: Board<Lidar4m>,
    pub reflectance: Board<ReflectanceArray>,
    pub colors: Board<ColorSensor>,
    pub thermal: Board<Thermal>,
    pub nodes: Board<Node>,
    pub ultrasonic: Board<Ultrasonic>,
    pub ir_finders: Board<IrFinder>,
    pub mot4x36: Board<Mot4x36>,
    pub mot4x10: Board<Mot4x10>,
    pub mot2x50: Board<Mot2x50>,
    pub bldc2x50: Board<Bldc2x50>,
}

impl Boards {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按默认名称和 ID 注册 `count` 个 `kind` 设备
    ///
    /// 容量不足时不注册任何设备。
    pub fn register(&mut self, kind: BoardKind, count: usize) -> Result<(), RobotError> {
        let registry = self.registry_mut(kind);
        let free = registry.capacity() - registry.len();
        if count > free {
            return Err(RobotError::Config(format!(
                "{kind}: cannot add {count} devices, {free} slots left"
            )));
        }
        for _ in 0..count {
            registry.add_default()?;
        }
        debug!("{}: {} devices registered", kind, registry.len());
        Ok(())
    }

    /// 路由顺序固定，与 `BoardKind::ALL` 一致
    pub fn registries(&self) -> [&dyn BoardRegistry; 12] {
        [
            &self.lidars_2m,
            &self.lidars_4m,
            &self.reflectance,
            &self.colors,
            &self.thermal,
            &self.nodes,
            &self.ultrasonic,
            &self.ir_finders,
            &self.mot4x36,
            &self.mot4x10,
            &self.mot2x50,
            &self.bldc2x50,
        ]
    }

    pub fn registries_mut(&mut self) -> [&mut dyn BoardRegistry; 12] {
        [
            &mut self.lidars_2m,
            &mut self.lidars_4m,
            &mut self.reflectance,
            &mut self.colors,
            &mut self.thermal,
            &mut self.nodes,
            &mut self.ultrasonic,
            &mut self.ir_finders,
            &mut self.mot4x36,
            &mut self.mot4x10,
            &mut self.mot2x50,
            &mut self.bldc2x50,
        ]
    }

    pub fn registry(&self, kind: BoardKind) -> &dyn BoardRegistry {
        match kind {
            BoardKind::Lidar2m => &self.lidars_2m,
            BoardKind::Lidar4m => &self.lidars_4m,
            BoardKind::Reflectance => &self.reflectance,
            BoardKind::Color => &self.colors,
            BoardKind::Thermal => &self.thermal,
            BoardKind::Node => &self.nodes,
            BoardKind::Ultrasonic => &self.ultrasonic,
            BoardKind::IrFinder => &self.ir_finders,
            BoardKind::Mot4x36 => &self.mot4x36,
            BoardKind::Mot4x10 => &self.mot4x10,
            BoardKind::Mot2x50 => &self.mot2x50,
            BoardKind::Bldc2x50 => &self.bldc2x50,
        }
    }

    pub fn registry_mut(&mut self, kind: BoardKind) -> &mut dyn BoardRegistry {
        match kind {
            BoardKind::Lidar2m => &mut self.lidars_2m,
            BoardKind::Lidar4m => &mut self.lidars_4m,
            BoardKind::Reflectance => &mut self.reflectance,
            BoardKind::Color => &mut self.colors,
            BoardKind::Thermal => &mut self.thermal,
            BoardKind::Node => &mut self.nodes,
            BoardKind::Ultrasonic => &mut self.ultrasonic,
            BoardKind::IrFinder => &mut self.ir_finders,
            BoardKind::Mot4x36 => &mut self.mot4x36,
            BoardKind::Mot4x10 => &mut self.mot4x10,
            BoardKind::Mot2x50 => &mut self.mot2x50,
            BoardKind::Bldc2x50 => &mut self.bldc2x50,
        }
    }

    /// 全部电机控制器
    pub fn motor_outputs_mut(&mut self) -> [&mut dyn MotorOutputs; 4] {
        [
            &mut self.mot4x36,
            &mut self.mot4x10,
            &mut self.mot2x50,
            &mut self.bldc2x50,
        ]
    }

    /// 套用探测超时，并在每个类型的默认握手策略上套用 `policy`
    pub fn configure(
        &mut self,
        timing: ProbeTiming,
        policy: impl Fn(StreamPolicy) -> StreamPolicy,
    ) {
        for registry in self.registries_mut() {
            registry.set_timing(timing);
            let adjusted = policy(registry.policy());
            registry.set_policy(adjusted);
        }
    }

    /// 已注册的设备总数
    pub fn device_count(&self) -> usize {
        self.registries().iter().map(|r| r.len()).sum()
    }
}
