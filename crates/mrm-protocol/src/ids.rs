//! 板卡类型与 CAN ID 分配
//!
//! 每种板卡类型占用一段连续 ID：设备 k 的 `inbound = base + 2k`，
//! `outbound = base + 2k + 1`。各类型的 ID 段互不重叠。

use crate::{ByteOrder, ProtocolError};

/// 设备名称最大长度（字符）
pub const MAX_NAME_LEN: usize = 9;

/// 单个注册表的设备上限（存活位图为 u32）
pub const MAX_REGISTRY_DEVICES: usize = 32;

/// 支持的板卡类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum BoardKind {
    /// mrm-lid-can-b，2 m 激光测距
    Lidar2m,
    /// mrm-lid-can-b2，4 m 激光测距
    Lidar4m,
    /// mrm-ref-can，9 路反射传感器
    Reflectance,
    /// mrm-col-can，6 通道颜色传感器
    Color,
    /// mrm-therm-b-can，红外测温
    Thermal,
    /// mrm-node，模拟量 + 开关
    Node,
    /// mrm-us-b，超声波测距
    Ultrasonic,
    /// mrm-ir-finder3，红外球定位
    IrFinder,
    /// mrm-mot4x3.6can，4 路电机控制器
    Mot4x36,
    /// mrm-mot4x10，4 路电机控制器
    Mot4x10,
    /// mrm-mot2x50，2 路电机控制器
    Mot2x50,
    /// mrm-bldc2x50，2 路无刷电机控制器
    Bldc2x50,
}

impl BoardKind {
    /// 全部板卡类型
    pub const ALL: [BoardKind; 12] = [
        BoardKind::Lidar2m,
        BoardKind::Lidar4m,
        BoardKind::Reflectance,
        BoardKind::Color,
        BoardKind::Thermal,
        BoardKind::Node,
        BoardKind::Ultrasonic,
        BoardKind::IrFinder,
        BoardKind::Mot4x36,
        BoardKind::Mot4x10,
        BoardKind::Mot2x50,
        BoardKind::Bldc2x50,
    ];

    /// ID 段起始（设备 0 的 inbound ID）
    pub const fn base_id(self) -> u32 {
        match self {
            BoardKind::Lidar2m => 0x0100,
            BoardKind::Lidar4m => 0x0120,
            BoardKind::Reflectance => 0x0140,
            BoardKind::Color => 0x0160,
            BoardKind::Thermal => 0x0170,
            BoardKind::Node => 0x0180,
            BoardKind::Ultrasonic => 0x0190,
            BoardKind::IrFinder => 0x01A0,
            BoardKind::Mot4x36 => 0x0200,
            BoardKind::Mot4x10 => 0x0220,
            BoardKind::Mot2x50 => 0x0240,
            BoardKind::Bldc2x50 => 0x0250,
        }
    }

    /// 该类型最多可注册的设备数
    pub const fn max_devices(self) -> usize {
        match self {
            BoardKind::Lidar2m | BoardKind::Lidar4m => 14,
            BoardKind::Reflectance => 8,
            BoardKind::Color
            | BoardKind::Thermal
            | BoardKind::Node
            | BoardKind::Ultrasonic => 4,
            BoardKind::IrFinder => 2,
            BoardKind::Mot4x36 | BoardKind::Mot4x10 => 16,
            BoardKind::Mot2x50 | BoardKind::Bldc2x50 => 8,
        }
    }

    /// 同一块物理板上的设备（通道）数
    ///
    /// 存活探测只发给物理板的第一个通道，回复同时标记该板全部通道。
    pub const fn devices_per_board(self) -> usize {
        match self {
            BoardKind::Mot4x36 | BoardKind::Mot4x10 => 4,
            BoardKind::Mot2x50 | BoardKind::Bldc2x50 => 2,
            _ => 1,
        }
    }

    /// 默认设备名前缀（不超过 6 字符，保证 `"{prefix}-{k}"` 不超过 9 字符）
    pub const fn short_name(self) -> &'static str {
        match self {
            BoardKind::Lidar2m => "lid2m",
            BoardKind::Lidar4m => "lid4m",
            BoardKind::Reflectance => "ref",
            BoardKind::Color => "col",
            BoardKind::Thermal => "therm",
            BoardKind::Node => "node",
            BoardKind::Ultrasonic => "us",
            BoardKind::IrFinder => "irfind",
            BoardKind::Mot4x36 => "mot4x3",
            BoardKind::Mot4x10 => "m4x10",
            BoardKind::Mot2x50 => "m2x50",
            BoardKind::Bldc2x50 => "bldc",
        }
    }

    /// 配置文件与命令行使用的名称
    pub const fn name(self) -> &'static str {
        match self {
            BoardKind::Lidar2m => "lidar2m",
            BoardKind::Lidar4m => "lidar4m",
            BoardKind::Reflectance => "reflectance",
            BoardKind::Color => "color",
            BoardKind::Thermal => "thermal",
            BoardKind::Node => "node",
            BoardKind::Ultrasonic => "ultrasonic",
            BoardKind::IrFinder => "ir_finder",
            BoardKind::Mot4x36 => "mot4x36",
            BoardKind::Mot4x10 => "mot4x10",
            BoardKind::Mot2x50 => "mot2x50",
            BoardKind::Bldc2x50 => "bldc2x50",
        }
    }

    /// 产品型号
    pub const fn model(self) -> &'static str {
        match self {
            BoardKind::Lidar2m => "mrm-lid-can-b",
            BoardKind::Lidar4m => "mrm-lid-can-b2",
            BoardKind::Reflectance => "mrm-ref-can",
            BoardKind::Color => "mrm-col-can",
            BoardKind::Thermal => "mrm-therm-b-can",
            BoardKind::Node => "mrm-node",
            BoardKind::Ultrasonic => "mrm-us-b",
            BoardKind::IrFinder => "mrm-ir-finder3",
            BoardKind::Mot4x36 => "mrm-mot4x3.6can",
            BoardKind::Mot4x10 => "mrm-mot4x10",
            BoardKind::Mot2x50 => "mrm-mot2x50",
            BoardKind::Bldc2x50 => "mrm-bldc2x50",
        }
    }

    /// 16/32 位负载字段的字节序
    ///
    /// 测温板与 mrm-node 的固件按大端发送，其余为小端。
    pub const fn byte_order(self) -> ByteOrder {
        match self {
            BoardKind::Thermal | BoardKind::Node => ByteOrder::Big,
            _ => ByteOrder::Little,
        }
    }

    /// 是否为电机控制器
    pub const fn is_motor(self) -> bool {
        matches!(
            self,
            BoardKind::Mot4x36 | BoardKind::Mot4x10 | BoardKind::Mot2x50 | BoardKind::Bldc2x50
        )
    }

    /// 设备 `index` 的 `(inbound, outbound)` ID 对
    pub fn ids(self, index: usize) -> Result<(u32, u32), ProtocolError> {
        if index >= self.max_devices() {
            return Err(ProtocolError::IdOutOfBlock {
                kind: self.model(),
                index,
                max: self.max_devices(),
            });
        }
        let inbound = self.base_id() + 2 * index as u32;
        Ok((inbound, inbound + 1))
    }

    /// ID 段的结束位置（不含）
    pub const fn block_end(self) -> u32 {
        self.base_id() + 2 * self.max_devices() as u32
    }

    /// 判断 `id` 是否落在该类型的 ID 段
    pub fn owns_id(self, id: u32) -> bool {
        (self.base_id()..self.block_end()).contains(&id)
    }

    /// 按 ID 反查板卡类型
    pub fn from_id(id: u32) -> Option<BoardKind> {
        Self::ALL.into_iter().find(|kind| kind.owns_id(id))
    }
}

impl std::fmt::Display for BoardKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.model())
    }
}

/// 接受配置名、默认设备名前缀或产品型号
impl std::str::FromStr for BoardKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| {
                kind.name().eq_ignore_ascii_case(s)
                    || kind.short_name().eq_ignore_ascii_case(s)
                    || kind.model().eq_ignore_ascii_case(s)
            })
            .ok_or_else(|| ProtocolError::UnknownBoardKind(s.to_owned()))
    }
}
