//! # Robot
//!
//! 持有总线与全部注册表的顶层对象。用户主循环的每一轮都要调用一次
//! [`Robot::no_loop_without_this`]：它排空总线、把每一帧交给认领它的注册表，
//! 出错时执行故障停机（全部电机速度置 0）。

use crate::boards::Boards;
use crate::config::RobotConfig;
use crate::error::RobotError;
use mrm_can::CanAdapter;
use mrm_driver::{
    CanBus, Clock, DeviceError, DeviceSummary, EdgeCounters, MetricsSnapshot, SystemClock,
};
use mrm_protocol::BoardKind;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// 保留的最近错误条数
const ERROR_LOG_LEN: usize = 16;

/// 使用内存总线的接口名
pub const MOCK_INTERFACE: &str = "mock";

pub struct Robot {
    bus: CanBus,
    boards: Boards,
    config: RobotConfig,
    edge_counters: Arc<EdgeCounters>,
    error_log: VecDeque<String>,
    halts: u64,
}

impl Robot {
    pub fn builder() -> RobotBuilder {
        RobotBuilder::new()
    }

    /// 每轮主循环必须调用
    ///
    /// 先处理等待期间暂存的帧，再处理适配器中的新帧。无人认领的帧只计数。
    /// 任何设备错误都会触发故障停机（`failsafe.halt_motors_on_error`），
    /// 并返回第一个错误。
    pub fn no_loop_without_this(&mut self) -> Result<(), RobotError> {
        let frames = match self.bus.drain_all() {
            Ok(frames) => frames,
            Err(e) => return Err(self.fail(DeviceError::Can(e))),
        };
        let now = self.bus.now();
        let mut first_error: Option<DeviceError> = None;

        for frame in &frames {
            let mut claimed = false;
            for registry in self.boards.registries_mut() {
                match registry.handle_frame(frame, now) {
                    Ok(false) => continue,
                    Ok(true) => {},
                    Err(e) => {
                        warn!("Frame 0x{:03X}: {}", frame.id, e);
                        first_error.get_or_insert(e);
                    },
                }
                claimed = true;
                break;
            }
            if !claimed {
                self.bus.note_unclaimed(frame);
            }
        }

        for registry in self.boards.registries_mut() {
            for e in registry.take_errors() {
                warn!("Deferred: {}", e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(self.fail(e)),
            None => Ok(()),
        }
    }

    /// 把驱动层的结果交给故障停机逻辑
    pub fn guard<T>(&mut self, result: Result<T, DeviceError>) -> Result<T, RobotError> {
        result.map_err(|e| self.fail(e))
    }

    /// 在注册表与总线上执行一次操作，出错时触发故障停机
    ///
    /// ```no_run
    /// # fn demo(robot: &mut mrm_client::Robot) -> Result<(), mrm_client::RobotError> {
    /// let distance = robot.run(|boards, bus| boards.lidars_2m.distance(bus, 0))?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn run<T>(
        &mut self,
        f: impl FnOnce(&mut Boards, &mut CanBus) -> Result<T, DeviceError>,
    ) -> Result<T, RobotError> {
        let result = f(&mut self.boards, &mut self.bus);
        self.guard(result)
    }

    fn fail(&mut self, e: DeviceError) -> RobotError {
        if self.error_log.len() == ERROR_LOG_LEN {
            self.error_log.pop_front();
        }
        self.error_log.push_back(e.to_string());

        if self.config.failsafe.halt_motors_on_error {
            error!("{}; halting all motors", e);
            self.halt_motors();
        } else {
            error!("{}", e);
        }
        RobotError::Device(e)
    }

    /// 全部电机速度置 0
    ///
    /// 某块板发送失败时继续停其余的板。
    pub fn halt_motors(&mut self) {
        self.halts += 1;
        for outputs in self.boards.motor_outputs_mut() {
            if let Err(e) = outputs.stop_motors(&mut self.bus) {
                error!("{}: halt failed: {}", outputs.kind(), e);
            }
        }
    }

    /// 扫描全部注册表，返回存活设备数
    pub fn devices_scan(&mut self, verbose: bool) -> Result<usize, RobotError> {
        let mut total = 0;
        let mut first_error = None;
        for registry in self.boards.registries_mut() {
            if registry.is_empty() {
                continue;
            }
            match registry.devices_scan(&mut self.bus, verbose) {
                Ok(count) => total += count,
                Err(e) => {
                    first_error.get_or_insert(e);
                },
            }
        }
        if let Some(e) = first_error {
            return Err(self.fail(e));
        }
        info!(
            "Scan finished: {} of {} devices alive",
            total,
            self.boards.device_count()
        );
        Ok(total)
    }

    /// 停止全部设备的连续测量，并把电机速度置 0
    pub fn stop_all(&mut self) -> Result<(), RobotError> {
        let mut first_error = None;
        for registry in self.boards.registries_mut() {
            if let Err(e) = registry.stop_all(&mut self.bus) {
                first_error.get_or_insert(e);
            }
        }
        for outputs in self.boards.motor_outputs_mut() {
            if let Err(e) = outputs.stop_motors(&mut self.bus) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(self.fail(e)),
            None => Ok(()),
        }
    }

    /// 向存活设备请求固件版本与帧率，回复由后续的 `no_loop_without_this` 处理
    pub fn request_info(&mut self) -> Result<(), RobotError> {
        let mut first_error = None;
        for registry in self.boards.registries_mut() {
            if let Err(e) = registry.request_info(&mut self.bus) {
                first_error = Some(e);
                break;
            }
        }
        match first_error {
            Some(e) => Err(self.fail(e)),
            None => Ok(()),
        }
    }

    pub fn status(&self) -> RobotStatus {
        let mut boards = Vec::new();
        let mut devices = Vec::new();
        for registry in self.boards.registries() {
            if registry.is_empty() {
                continue;
            }
            boards.push(BoardStatus {
                kind: registry.kind(),
                registered: registry.len(),
                alive: registry.alive_mask().count_ones() as usize,
            });
            devices.extend(registry.summaries());
        }
        RobotStatus {
            boards,
            devices,
            metrics: self.bus.metrics().snapshot(),
            recent_errors: self.error_log.iter().cloned().collect(),
            halts: self.halts,
        }
    }

    pub fn boards(&self) -> &Boards {
        &self.boards
    }

    pub fn boards_mut(&mut self) -> &mut Boards {
        &mut self.boards
    }

    pub fn bus(&self) -> &CanBus {
        &self.bus
    }

    /// 同时借出注册表与总线
    pub fn split(&mut self) -> (&mut Boards, &mut CanBus) {
        (&mut self.boards, &mut self.bus)
    }

    pub fn config(&self) -> &RobotConfig {
        &self.config
    }

    /// 中断计数器，可交给其他线程
    pub fn edge_counters(&self) -> Arc<EdgeCounters> {
        self.edge_counters.clone()
    }

    pub fn halts(&self) -> u64 {
        self.halts
    }
}

/// 单个板卡类型的存活统计
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardStatus {
    pub kind: BoardKind,
    pub registered: usize,
    pub alive: usize,
}

/// 机器人状态快照
#[derive(Debug, Clone)]
pub struct RobotStatus {
    pub boards: Vec<BoardStatus>,
    pub devices: Vec<DeviceSummary>,
    pub metrics: MetricsSnapshot,
    pub recent_errors: Vec<String>,
    pub halts: u64,
}

impl RobotStatus {
    pub fn alive_total(&self) -> usize {
        self.boards.iter().map(|b| b.alive).sum()
    }
}

impl fmt::Display for RobotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for board in &self.boards {
            writeln!(f, "{}: {}/{} alive", board.kind, board.alive, board.registered)?;
        }
        let m = &self.metrics;
        writeln!(
            f,
            "frames: {} sent, {} received, {} unclaimed, {} dropped",
            m.frames_sent, m.frames_received, m.unclaimed, m.backlog_dropped
        )?;
        if self.halts > 0 {
            writeln!(f, "fail-safe halts: {}", self.halts)?;
        }
        for e in &self.recent_errors {
            writeln!(f, "error: {}", e)?;
        }
        Ok(())
    }
}

/// Robot 构建器
///
/// 未指定适配器时按 `bus.interface` 打开；未指定时钟时使用 [`SystemClock`]。
pub struct RobotBuilder {
    config: RobotConfig,
    adapter: Option<Box<dyn CanAdapter + Send>>,
    clock: Option<Arc<dyn Clock>>,
}

impl Default for RobotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RobotBuilder {
    pub fn new() -> Self {
        Self {
            config: RobotConfig::default(),
            adapter: None,
            clock: None,
        }
    }

    pub fn config(mut self, config: RobotConfig) -> Self {
        self.config = config;
        self
    }

    /// 覆盖配置中的接口名
    pub fn interface(mut self, interface: impl Into<String>) -> Self {
        self.config.bus.interface = interface.into();
        self
    }

    pub fn adapter<A>(mut self, adapter: A) -> Self
    where
        A: CanAdapter + Send + 'static,
    {
        self.adapter = Some(Box::new(adapter));
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<Robot, RobotError> {
        let RobotBuilder {
            config,
            adapter,
            clock,
        } = self;
        config.validate()?;

        let mut boards = Boards::new();
        boards.configure(config.probe_timing(), |base| config.stream_policy(base));
        for entry in &config.boards {
            boards.register(entry.kind, entry.count)?;
        }

        let adapter = match adapter {
            Some(adapter) => adapter,
            None => open_adapter(&config.bus.interface)?,
        };
        let clock = clock.unwrap_or_else(|| Arc::new(SystemClock::new()));
        let bus = CanBus::with_config(adapter, clock, config.bus_config());
        debug!(
            "Robot built: {} devices on '{}'",
            boards.device_count(),
            config.bus.interface
        );

        Ok(Robot {
            bus,
            boards,
            config,
            edge_counters: Arc::new(EdgeCounters::new()),
            error_log: VecDeque::with_capacity(ERROR_LOG_LEN),
            halts: 0,
        })
    }
}

fn open_adapter(interface: &str) -> Result<Box<dyn CanAdapter + Send>, RobotError> {
    if interface == MOCK_INTERFACE {
        return open_mock();
    }
    open_socketcan(interface)
}

#[cfg(feature = "mock")]
fn open_mock() -> Result<Box<dyn CanAdapter + Send>, RobotError> {
    let (adapter, _handle) = mrm_can::MockCanAdapter::new();
    warn!("Using in-memory mock bus, no device will answer");
    Ok(Box::new(adapter))
}

#[cfg(not(feature = "mock"))]
fn open_mock() -> Result<Box<dyn CanAdapter + Send>, RobotError> {
    Err(RobotError::Config(
        "interface \"mock\" requires the `mock` feature".into(),
    ))
}

#[cfg(target_os = "linux")]
fn open_socketcan(interface: &str) -> Result<Box<dyn CanAdapter + Send>, RobotError> {
    Ok(Box::new(mrm_can::SocketCanAdapter::new(interface)?))
}

#[cfg(not(target_os = "linux"))]
fn open_socketcan(interface: &str) -> Result<Box<dyn CanAdapter + Send>, RobotError> {
    Err(RobotError::Config(format!(
        "no CAN backend for '{interface}' on this platform"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mrm_can::MockCanAdapter;
    use mrm_driver::ManualClock;

    fn robot_with(config: RobotConfig) -> (Robot, mrm_can::MockHandle) {
        let (adapter, handle) = MockCanAdapter::new();
        let robot = Robot::builder()
            .config(config)
            .adapter(adapter)
            .clock(Arc::new(ManualClock::new()))
            .build()
            .unwrap();
        (robot, handle)
    }

    #[test]
    fn test_build_registers_configured_boards() {
        let config = RobotConfig::from_toml_str(
            "[[boards]]\nkind = \"lidar2m\"\ncount = 2\n[[boards]]\nkind = \"mot2x50\"\ncount = 2\n",
        )
        .unwrap();
        let (robot, _handle) = robot_with(config);
        assert_eq!(robot.boards().lidars_2m.len(), 2);
        assert_eq!(robot.boards().mot2x50.len(), 2);
        assert_eq!(robot.boards().device_count(), 4);
    }

    #[test]
    fn test_unclaimed_frames_are_counted() {
        let (mut robot, handle) = robot_with(RobotConfig::default());
        handle.push(0x7F0, &[0x13, 1, 2]);
        robot.no_loop_without_this().unwrap();
        assert_eq!(robot.status().metrics.unclaimed, 1);
    }

    #[test]
    fn test_error_log_is_bounded() {
        let mut config = RobotConfig::default();
        config.failsafe.halt_motors_on_error = false;
        let (mut robot, _handle) = robot_with(config);
        for _ in 0..(ERROR_LOG_LEN + 4) {
            let _ = robot.guard::<()>(Err(DeviceError::NoDeviceAlive {
                board: BoardKind::Color,
            }));
        }
        let status = robot.status();
        assert_eq!(status.recent_errors.len(), ERROR_LOG_LEN);
        assert_eq!(status.halts, 0);
    }

    #[test]
    fn test_request_info_send_failure_halts_motors() {
        let config = RobotConfig::from_toml_str(
            "[[boards]]\nkind = \"color\"\n[[boards]]\nkind = \"mot4x36\"\n",
        )
        .unwrap();
        let (mut robot, handle) = robot_with(config);
        handle.echo(0x160, 0x161, 0xFF);
        assert_eq!(robot.devices_scan(false).unwrap(), 1);

        handle.fail_sends(true);
        let err = robot.request_info().unwrap_err();
        assert!(matches!(err, RobotError::Device(DeviceError::Can(_))), "{err}");
        assert_eq!(robot.halts(), 1);
        assert_eq!(robot.status().recent_errors.len(), 1);
    }

    #[test]
    fn test_request_info_reaches_alive_devices_only() {
        let config = RobotConfig::from_toml_str("[[boards]]\nkind = \"color\"\ncount = 2\n").unwrap();
        let (mut robot, handle) = robot_with(config);
        handle.echo(0x162, 0x163, 0xFF);
        robot.devices_scan(false).unwrap();

        handle.take_sent();
        robot.request_info().unwrap();
        let ids: Vec<u32> = handle.sent().iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![0x162, 0x162]);
        assert_eq!(robot.halts(), 0);
    }

    #[test]
    fn test_status_display_lists_boards() {
        let config = RobotConfig::from_toml_str("[[boards]]\nkind = \"thermal\"\n").unwrap();
        let (robot, _handle) = robot_with(config);
        let text = robot.status().to_string();
        assert!(text.contains("mrm-therm-b-can: 0/1 alive"), "{text}");
    }

    #[cfg(not(feature = "mock"))]
    #[test]
    fn test_mock_interface_requires_feature() {
        let err = Robot::builder().interface(MOCK_INTERFACE).build().err().unwrap();
        assert!(err.is_config());
    }
}
