//! 内存 Mock 总线
//!
//! `MockCanAdapter` 交给被测代码独占，`MockHandle` 留在测试中用于：
//! - 查看已发送的帧
//! - 注入设备发来的帧
//! - 注册回复脚本（每发送一帧都会调用，返回值排入接收队列）
//!
//! 回复脚本在内部锁内执行，脚本中不能再调用同一个 `MockHandle`。

use crate::{CanAdapter, CanError, MrmFrame};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::sync::Arc;

/// 回复缓冲区，一次发送通常只触发 0-2 帧回复
pub type Replies = SmallVec<[MrmFrame; 4]>;

type Responder = Box<dyn FnMut(&MrmFrame) -> Replies + Send>;

#[derive(Default)]
struct MockState {
    rx: VecDeque<MrmFrame>,
    sent: Vec<MrmFrame>,
    responders: Vec<Responder>,
    fail_sends: bool,
}

/// Mock CAN 适配器
pub struct MockCanAdapter {
    state: Arc<Mutex<MockState>>,
}

/// 测试侧句柄
#[derive(Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockCanAdapter {
    /// 创建适配器与配套句柄
    pub fn new() -> (Self, MockHandle) {
        let state = Arc::new(Mutex::new(MockState::default()));
        (
            Self {
                state: state.clone(),
            },
            MockHandle { state },
        )
    }
}

impl CanAdapter for MockCanAdapter {
    fn send(&mut self, frame: MrmFrame) -> Result<(), CanError> {
        let mut state = self.state.lock();
        if state.fail_sends {
            return Err(CanError::BufferOverflow);
        }
        state.sent.push(frame);

        let mut replies = Replies::new();
        for responder in state.responders.iter_mut() {
            replies.extend(responder(&frame));
        }
        state.rx.extend(replies);
        Ok(())
    }

    fn receive(&mut self) -> Result<MrmFrame, CanError> {
        self.state.lock().rx.pop_front().ok_or(CanError::Timeout)
    }
}

impl MockHandle {
    /// 注入一帧（设备 → 主机）
    pub fn push_rx(&self, frame: MrmFrame) {
        self.state.lock().rx.push_back(frame);
    }

    /// 按 ID 与负载注入一帧
    pub fn push(&self, id: u32, data: &[u8]) {
        self.push_rx(MrmFrame::with_id(id, data));
    }

    /// 已发送帧的快照
    pub fn sent(&self) -> Vec<MrmFrame> {
        self.state.lock().sent.clone()
    }

    /// 取出并清空已发送帧
    pub fn take_sent(&self) -> Vec<MrmFrame> {
        std::mem::take(&mut self.state.lock().sent)
    }

    /// 发往 `id` 且命令码为 `command` 的帧数
    pub fn count_sent(&self, id: u32, command: u8) -> usize {
        self.state
            .lock()
            .sent
            .iter()
            .filter(|f| f.id == id && f.command() == Some(command))
            .count()
    }

    /// 待接收帧数
    pub fn pending_rx(&self) -> usize {
        self.state.lock().rx.len()
    }

    /// 注册回复脚本
    pub fn respond<F>(&self, responder: F)
    where
        F: FnMut(&MrmFrame) -> Replies + Send + 'static,
    {
        self.state.lock().responders.push(Box::new(responder));
    }

    /// 模拟设备在 `outbound` 上回应发往 `inbound` 的某个命令码（回显命令码）
    pub fn echo(&self, inbound: u32, outbound: u32, command: u8) {
        self.respond(move |frame| {
            let mut replies = Replies::new();
            if frame.id == inbound && frame.command() == Some(command) {
                replies.push(MrmFrame::with_id(outbound, &[command]));
            }
            replies
        });
    }

    /// 清除全部回复脚本（模拟设备掉线）
    pub fn clear_responders(&self) {
        self.state.lock().responders.clear();
    }

    /// 后续发送全部失败（`CanError::BufferOverflow`）
    pub fn fail_sends(&self, fail: bool) {
        self.state.lock().fail_sends = fail;
    }
}
