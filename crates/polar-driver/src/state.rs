//! 连接状态与反馈状态
//!
//! 所有状态只由连接管理任务写入（单写者），调用方通过无锁读取或
//! `watch` 订阅获得快照。
//!
//! - 热数据（反馈）：`ArcSwap`，整体替换，从不局部修改
//! - 连接状态：原子 `u8`
//! - 推送：`tokio::sync::watch`，晚到的订阅者只看到当前快照，不看历史

use crate::transport::SocketId;
use arc_swap::{ArcSwap, ArcSwapOption};
use polar_protocol::Feedback;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use tokio::sync::watch;
use tokio::time::Instant;

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ConnectionState {
    /// 未连接（初始状态）
    #[default]
    Disconnected = 0,
    /// 已连接（socket 已打开）
    Connected = 1,
}

impl ConnectionState {
    /// 从 u8 转换
    ///
    /// 如果值无效，返回 Disconnected。
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connected,
            _ => Self::Disconnected,
        }
    }

    /// 转换为 u8
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

/// 连接状态（原子版本，用于跨任务共享）
#[derive(Debug)]
pub struct AtomicConnectionState {
    inner: AtomicU8,
}

impl AtomicConnectionState {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            inner: AtomicU8::new(state.as_u8()),
        }
    }

    pub fn get(&self, ordering: Ordering) -> ConnectionState {
        ConnectionState::from_u8(self.inner.load(ordering))
    }

    pub fn set(&self, state: ConnectionState, ordering: Ordering) {
        self.inner.store(state.as_u8(), ordering);
    }
}

impl Default for AtomicConnectionState {
    fn default() -> Self {
        Self::new(ConnectionState::Disconnected)
    }
}

/// 最新反馈状态
///
/// 只保留最新一条反馈，旧值直接丢弃。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FeedbackState {
    /// 最新反馈（未收到前为全零）
    pub feedback: Feedback,
    /// 已接受的反馈条数（单调递增，0 表示尚未收到）
    pub sequence: u64,
    /// 最新反馈的接收时间
    pub received_at: Option<Instant>,
}

/// 解析错误报告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseErrorReport {
    /// 错误描述
    pub message: String,
    /// 原始消息文本（截断）
    pub raw: String,
    /// 第几个解析错误（从 1 开始）
    pub count: u64,
}

impl ParseErrorReport {
    /// 原始文本保留的最大字节数
    pub const MAX_RAW_LEN: usize = 256;

    pub(crate) fn new(message: String, raw: &str, count: u64) -> Self {
        let mut end = raw.len().min(Self::MAX_RAW_LEN);
        while !raw.is_char_boundary(end) {
            end -= 1;
        }
        Self {
            message,
            raw: raw[..end].to_string(),
            count,
        }
    }
}

/// 对外推送的状态快照
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BridgeSnapshot {
    pub connection: ConnectionState,
    pub feedback: FeedbackState,
    pub last_parse_error: Option<ParseErrorReport>,
    pub last_transport_error: Option<String>,
    /// 最近一次传输错误所属的 socket（空地址等未打开 socket 的错误不记录）
    pub last_failed_socket: Option<SocketId>,
}

/// 桥接上下文（所有可观测状态的聚合）
///
/// 写入方法仅对 crate 内可见，保证单写者。
pub struct BridgeContext {
    connection: AtomicConnectionState,
    feedback: ArcSwap<FeedbackState>,
    parse_error: ArcSwapOption<ParseErrorReport>,
    transport_error: ArcSwapOption<String>,
    /// 0 表示无（socket 编号从 1 开始）
    failed_socket: AtomicU64,
    snapshot_tx: watch::Sender<BridgeSnapshot>,
}

impl BridgeContext {
    pub fn new() -> Self {
        let (snapshot_tx, _) = watch::channel(BridgeSnapshot::default());
        Self {
            connection: AtomicConnectionState::default(),
            feedback: ArcSwap::from_pointee(FeedbackState::default()),
            parse_error: ArcSwapOption::empty(),
            transport_error: ArcSwapOption::empty(),
            failed_socket: AtomicU64::new(0),
            snapshot_tx,
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.get(Ordering::Acquire)
    }

    pub fn feedback(&self) -> FeedbackState {
        **self.feedback.load()
    }

    pub fn last_parse_error(&self) -> Option<ParseErrorReport> {
        self.parse_error.load_full().map(|report| (*report).clone())
    }

    pub fn last_transport_error(&self) -> Option<String> {
        self.transport_error.load_full().map(|err| (*err).clone())
    }

    pub fn last_failed_socket(&self) -> Option<SocketId> {
        match self.failed_socket.load(Ordering::Acquire) {
            0 => None,
            id => Some(id),
        }
    }

    /// 当前快照
    pub fn snapshot(&self) -> BridgeSnapshot {
        BridgeSnapshot {
            connection: self.connection_state(),
            feedback: self.feedback(),
            last_parse_error: self.last_parse_error(),
            last_transport_error: self.last_transport_error(),
            last_failed_socket: self.last_failed_socket(),
        }
    }

    /// 订阅快照推送
    pub fn subscribe(&self) -> watch::Receiver<BridgeSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// 更新连接状态；状态未变化时不推送
    pub(crate) fn set_connection(&self, state: ConnectionState) -> bool {
        let previous = self.connection.get(Ordering::Acquire);
        if previous == state {
            return false;
        }
        self.connection.set(state, Ordering::Release);
        self.publish();
        true
    }

    /// 整体替换最新反馈，返回新的序号
    pub(crate) fn store_feedback(&self, feedback: Feedback) -> u64 {
        let sequence = self.feedback.load().sequence + 1;
        self.feedback.store(Arc::new(FeedbackState {
            feedback,
            sequence,
            received_at: Some(Instant::now()),
        }));
        self.publish();
        sequence
    }

    pub(crate) fn store_parse_error(&self, report: ParseErrorReport) {
        self.parse_error.store(Some(Arc::new(report)));
        self.publish();
    }

    pub(crate) fn store_transport_error(&self, message: String, socket: Option<SocketId>) {
        self.transport_error.store(Some(Arc::new(message)));
        if let Some(id) = socket {
            self.failed_socket.store(id, Ordering::Release);
        }
        self.publish();
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot());
    }
}

impl Default for BridgeContext {
    fn default() -> Self {
        Self::new()
    }
}
