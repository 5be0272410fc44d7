//! Bridge 对外 API
//!
//! `Bridge` 是连接管理任务的句柄：所有操作都只是向任务队列投递一条消息，
//! 不等待网络；状态读取走无锁快照。

use crate::error::DriverError;
use crate::metrics::{BridgeMetrics, MetricsSnapshot};
use crate::pipeline::{BridgeActor, BridgeMessage, bridge_loop};
use crate::state::{BridgeContext, BridgeSnapshot, ConnectionState, FeedbackState, ParseErrorReport};
use crate::transport::{Connector, SocketId};
use polar_protocol::{BridgeCodec, CodecConfig, Feedback, MoveCommand};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::trace;

/// rosbridge 连接句柄
///
/// 可以廉价克隆，所有克隆共享同一个连接管理任务。
/// 最后一个克隆被丢弃时，任务退出并关闭 socket。
///
/// 使用 [`BridgeBuilder`](crate::BridgeBuilder) 构造。
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    tx: mpsc::UnboundedSender<BridgeMessage>,
    ctx: Arc<BridgeContext>,
    metrics: Arc<BridgeMetrics>,
    codec: BridgeCodec,
    port: u16,
}

impl Drop for BridgeInner {
    fn drop(&mut self) {
        // 任务可能已退出，忽略错误
        let _ = self.tx.send(BridgeMessage::Shutdown);
    }
}

impl Bridge {
    pub(crate) fn spawn(
        handle: &Handle,
        port: u16,
        codec_config: CodecConfig,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let ctx = Arc::new(BridgeContext::new());
        let metrics = Arc::new(BridgeMetrics::new());
        let codec = BridgeCodec::new(codec_config);

        let actor = BridgeActor::new(
            ctx.clone(),
            metrics.clone(),
            codec.clone(),
            connector,
            port,
            tx.downgrade(),
        );
        handle.spawn(bridge_loop(actor, rx));

        Self {
            inner: Arc::new(BridgeInner {
                tx,
                ctx,
                metrics,
                codec,
                port,
            }),
        }
    }

    fn submit(&self, msg: BridgeMessage) -> Result<(), DriverError> {
        self.inner.tx.send(msg).map_err(|_| DriverError::ChannelClosed)
    }

    /// 连接到 `ws://<address>:<port>`
    ///
    /// 已持有 socket（连接中或已连接）时为空操作。只提交连接请求，
    /// 打开成功或失败通过连接状态异步体现。
    pub fn connect(&self, address: impl Into<String>) -> Result<(), DriverError> {
        self.submit(BridgeMessage::Connect {
            address: address.into(),
            reply: None,
        })
    }

    /// 断开连接
    ///
    /// 以关闭码 1000 发起关闭握手，状态立即变为 `Disconnected`。
    pub fn disconnect(&self) -> Result<(), DriverError> {
        self.submit(BridgeMessage::Disconnect)
    }

    /// 发送一条原始文本消息
    ///
    /// 未连接时消息被丢弃（记录 `tx_rejected` 并输出 warn 日志），不返回错误。
    pub fn send(&self, text: impl Into<String>) -> Result<(), DriverError> {
        self.submit(BridgeMessage::Send { text: text.into() })
    }

    /// 编码并发送移动指令
    pub fn send_command(&self, cmd: &MoveCommand) -> Result<(), DriverError> {
        let text = self.inner.codec.encode_command(cmd)?;
        trace!("Submitting {:?}", cmd);
        self.send(text)
    }

    pub fn send_move(&self, radius: f32, angle: f32) -> Result<(), DriverError> {
        self.send_command(&MoveCommand::new(radius, angle))
    }

    /// 等待此前提交的所有操作被连接管理任务处理完
    pub async fn flush(&self) -> Result<(), DriverError> {
        let (done, rx) = oneshot::channel();
        self.submit(BridgeMessage::Flush { done })?;
        rx.await.map_err(|_| DriverError::ChannelClosed)
    }

    /// 等待连接建立
    ///
    /// # 错误
    /// - `DriverError::Timeout`: 超时仍未连接
    pub async fn wait_for_connection(&self, timeout: Duration) -> Result<(), DriverError> {
        let rx = self.subscribe();
        tokio::time::timeout(timeout, self.wait_connected(rx, None))
            .await
            .map_err(|_| DriverError::Timeout)?
    }

    /// 连接并等待 socket 打开
    ///
    /// 与 [`connect`](Self::connect) 不同，等待期间的传输错误会以
    /// `DriverError::ConnectFailed` 返回。
    pub async fn connect_and_wait(
        &self,
        address: impl Into<String>,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        let rx = self.subscribe();
        let (reply, socket) = oneshot::channel();
        self.submit(BridgeMessage::Connect {
            address: address.into(),
            reply: Some(reply),
        })?;

        tokio::time::timeout(timeout, self.wait_opened(rx, socket))
            .await
            .map_err(|_| DriverError::Timeout)?
    }

    /// 等待本次 connect 对应的 socket 打开
    async fn wait_opened(
        &self,
        rx: watch::Receiver<BridgeSnapshot>,
        socket: oneshot::Receiver<Result<SocketId, DriverError>>,
    ) -> Result<(), DriverError> {
        let id = socket.await.map_err(|_| DriverError::ChannelClosed)??;
        self.wait_connected(rx, Some(id)).await
    }

    /// 等待 `Connected`；给定 socket 时，只有该 socket 的传输错误会提前结束等待
    async fn wait_connected(
        &self,
        mut rx: watch::Receiver<BridgeSnapshot>,
        socket: Option<SocketId>,
    ) -> Result<(), DriverError> {
        loop {
            {
                let snapshot = rx.borrow_and_update();
                if socket.is_some() && snapshot.last_failed_socket == socket {
                    let reason = snapshot
                        .last_transport_error
                        .clone()
                        .unwrap_or_else(|| "transport error".to_string());
                    return Err(DriverError::ConnectFailed(reason));
                }
                if snapshot.connection.is_connected() {
                    return Ok(());
                }
            }
            rx.changed().await.map_err(|_| DriverError::ChannelClosed)?;
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state().is_connected()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.ctx.connection_state()
    }

    /// 最新反馈（未收到前为全零）
    pub fn latest_feedback(&self) -> Feedback {
        self.inner.ctx.feedback().feedback
    }

    /// 最新反馈及其序号、接收时间
    pub fn feedback_state(&self) -> FeedbackState {
        self.inner.ctx.feedback()
    }

    pub fn last_parse_error(&self) -> Option<ParseErrorReport> {
        self.inner.ctx.last_parse_error()
    }

    pub fn last_transport_error(&self) -> Option<String> {
        self.inner.ctx.last_transport_error()
    }

    pub fn snapshot(&self) -> BridgeSnapshot {
        self.inner.ctx.snapshot()
    }

    /// 订阅状态快照（只保留最新值，不保留历史）
    pub fn subscribe(&self) -> watch::Receiver<BridgeSnapshot> {
        self.inner.ctx.subscribe()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    pub fn codec(&self) -> &BridgeCodec {
        &self.inner.codec
    }

    pub fn port(&self) -> u16 {
        self.inner.port
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("port", &self.inner.port)
            .field("connection", &self.connection_state())
            .finish()
    }
}
