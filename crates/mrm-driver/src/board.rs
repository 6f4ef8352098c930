//! 设备注册表
//!
//! `Board<P>` 保存同一类型的全部设备（最多 32 个）、存活位图和握手策略。
//! 存活探测见 `liveness`，命令与通用解码见 `dispatch`，
//! 连续测量握手见 `stream`。

use crate::bus::{CanBus, Claim};
use crate::device::{Device, DeviceSelector};
use crate::error::DeviceError;
use crate::profile::{BoardProfile, StreamPolicy};
use mrm_can::MrmFrame;
use mrm_protocol::{BoardKind, MAX_NAME_LEN, MAX_REGISTRY_DEVICES};
use std::marker::PhantomData;
use std::time::Duration;
use tracing::{debug, warn};

/// 等待期间暂存的解码错误上限
const MAX_DEFERRED_ERRORS: usize = 32;

/// 探测与确认超时
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTiming {
    /// 每块物理板的存活探测窗口
    pub scan_timeout: Duration,
    /// 每次等待 `Notification` 的时长
    pub notification_timeout: Duration,
    /// 确认命令最多发送次数
    pub notification_retries: u8,
}

impl Default for ProbeTiming {
    fn default() -> Self {
        Self {
            scan_timeout: Duration::from_micros(500),
            notification_timeout: Duration::from_millis(20),
            notification_retries: 3,
        }
    }
}

/// 同一类型设备的注册表
pub struct Board<P: BoardProfile> {
    pub(crate) devices: Vec<Device<P::Reading>>,
    capacity: usize,
    pub(crate) alive_mask: u32,
    pub(crate) policy: StreamPolicy,
    pub(crate) timing: ProbeTiming,
    deferred_errors: Vec<DeviceError>,
    _profile: PhantomData<fn() -> P>,
}

impl<P: BoardProfile> Default for Board<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: BoardProfile> std::fmt::Debug for Board<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Board")
            .field("kind", &P::KIND)
            .field("devices", &self.devices.len())
            .field("alive_mask", &format_args!("{:#034b}", self.alive_mask))
            .finish()
    }
}

impl<P: BoardProfile> Board<P> {
    /// 以该类型的最大设备数为容量
    pub fn new() -> Self {
        Self::with_capacity(P::KIND.max_devices())
    }

    /// 指定容量（不超过该类型的最大设备数）
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.min(P::KIND.max_devices()).min(MAX_REGISTRY_DEVICES);
        Self {
            devices: Vec::with_capacity(capacity),
            capacity,
            alive_mask: 0,
            policy: P::STREAM,
            timing: ProbeTiming::default(),
            deferred_errors: Vec::new(),
            _profile: PhantomData,
        }
    }

    pub fn kind(&self) -> BoardKind {
        P::KIND
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn devices(&self) -> &[Device<P::Reading>] {
        &self.devices
    }

    pub fn device(&self, index: usize) -> Result<&Device<P::Reading>, DeviceError> {
        self.devices
            .get(index)
            .ok_or(DeviceError::DeviceIndexOutOfRange {
                board: P::KIND,
                index,
                count: self.devices.len(),
            })
    }

    pub(crate) fn device_mut(
        &mut self,
        index: usize,
    ) -> Result<&mut Device<P::Reading>, DeviceError> {
        let count = self.devices.len();
        self.devices
            .get_mut(index)
            .ok_or(DeviceError::DeviceIndexOutOfRange {
                board: P::KIND,
                index,
                count,
            })
    }

    pub fn policy(&self) -> StreamPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: StreamPolicy) {
        self.policy = policy;
    }

    pub fn timing(&self) -> ProbeTiming {
        self.timing
    }

    pub fn set_timing(&mut self, timing: ProbeTiming) {
        self.timing = timing;
    }

    /// 注册一个设备，返回其序号
    ///
    /// 失败时注册表保持不变。
    pub fn add(
        &mut self,
        name: &str,
        inbound_id: u32,
        outbound_id: u32,
    ) -> Result<usize, DeviceError> {
        if self.devices.len() >= self.capacity {
            return Err(DeviceError::CapacityExceeded {
                board: P::KIND,
                capacity: self.capacity,
            });
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(DeviceError::NameTooLong {
                name: name.to_owned(),
                max: MAX_NAME_LEN,
            });
        }
        for device in &self.devices {
            for id in [inbound_id, outbound_id] {
                if id == device.inbound_id || id == device.outbound_id {
                    return Err(DeviceError::DuplicateId {
                        board: P::KIND,
                        id,
                        existing: device.index,
                    });
                }
            }
        }

        let index = self.devices.len();
        self.devices
            .push(Device::new(index, name.to_owned(), inbound_id, outbound_id));
        debug!(
            "{}: added '{}' as device {} (in 0x{:03X}, out 0x{:03X})",
            P::KIND,
            name,
            index,
            inbound_id,
            outbound_id
        );
        Ok(index)
    }

    /// 按默认名称和 ID 段注册下一个设备
    pub fn add_default(&mut self) -> Result<usize, DeviceError> {
        let index = self.devices.len();
        if index >= self.capacity {
            return Err(DeviceError::CapacityExceeded {
                board: P::KIND,
                capacity: self.capacity,
            });
        }
        let (inbound, outbound) = P::KIND.ids(index)?;
        let name = format!("{}-{}", P::KIND.short_name(), index);
        self.add(&name, inbound, outbound)
    }

    /// 交换两个设备的 CAN ID 对，序号与缓存保持不变
    pub fn swap(&mut self, a: usize, b: usize) -> Result<(), DeviceError> {
        self.device(a)?;
        self.device(b)?;
        if a == b {
            return Ok(());
        }
        let ids_a = (self.devices[a].inbound_id, self.devices[a].outbound_id);
        let ids_b = (self.devices[b].inbound_id, self.devices[b].outbound_id);
        (self.devices[a].inbound_id, self.devices[a].outbound_id) = ids_b;
        (self.devices[b].inbound_id, self.devices[b].outbound_id) = ids_a;
        Ok(())
    }

    /// 帧来自该设备（匹配 outbound ID）
    pub fn is_for_me(&self, can_id: u32, index: usize) -> bool {
        self.devices
            .get(index)
            .is_some_and(|d| d.outbound_id == can_id)
    }

    /// 帧发往该设备（匹配 inbound ID）
    pub fn is_from_me(&self, can_id: u32, index: usize) -> bool {
        self.devices
            .get(index)
            .is_some_and(|d| d.inbound_id == can_id)
    }

    /// 按 outbound ID 查找设备序号
    pub fn device_index_for(&self, can_id: u32) -> Option<usize> {
        self.devices.iter().position(|d| d.outbound_id == can_id)
    }

    /// 缓存的存活位
    pub fn is_alive(&self, index: usize) -> bool {
        index < self.devices.len() && self.alive_mask & (1 << index) != 0
    }

    /// 存活位图（bit k = 设备 k）
    pub fn alive_mask(&self) -> u32 {
        self.alive_mask
    }

    pub fn alive_count(&self) -> usize {
        self.alive_mask.count_ones() as usize
    }

    /// 取出等待期间暂存的解码错误
    pub fn take_errors(&mut self) -> Vec<DeviceError> {
        std::mem::take(&mut self.deferred_errors)
    }

    /// 选择器展开为序号列表
    pub(crate) fn selected(&self, selector: DeviceSelector) -> Result<Vec<usize>, DeviceError> {
        match selector {
            DeviceSelector::All => Ok((0..self.devices.len()).collect()),
            DeviceSelector::One(index) => {
                self.device(index)?;
                Ok(vec![index])
            },
        }
    }

    /// 设备 `index` 所在物理板的全部设备位
    pub(crate) fn board_group_mask(&self, index: usize) -> u32 {
        let per_board = P::KIND.devices_per_board();
        let first = index - index % per_board;
        let last = (first + per_board).min(self.devices.len());
        (first..last).fold(0u32, |mask, i| mask | (1 << i))
    }

    pub(crate) fn defer_error(&mut self, error: DeviceError) {
        warn!("{}", error);
        if self.deferred_errors.len() < MAX_DEFERRED_ERRORS {
            self.deferred_errors.push(error);
        }
    }

    /// 在总线上等待，直到 `done` 成立或超时
    ///
    /// 本注册表的帧在等待期间照常解码，解码错误暂存到 `take_errors`；
    /// 其它帧留在总线 backlog 中。
    pub(crate) fn wait_for<F>(
        &mut self,
        bus: &mut CanBus,
        timeout: Duration,
        mut done: F,
    ) -> Result<bool, DeviceError>
    where
        F: FnMut(&Self, &MrmFrame, Duration) -> bool,
    {
        let deadline = bus.now() + timeout;
        bus.wait_until(deadline, |frame, now| {
            match self.handle_frame(frame, now) {
                Ok(false) => return Ok(Claim::NotMine),
                Ok(true) => {},
                Err(e) => self.defer_error(e),
            }
            Ok(if done(self, frame, now) {
                Claim::Finished
            } else {
                Claim::Mine
            })
        })
    }
}
