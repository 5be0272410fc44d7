//! 连接管理任务
//!
//! 单一状态所有者：socket 句柄、连接状态、最新反馈只在这里被修改。
//! 调用方的操作和 socket 生命周期事件进入同一个消息队列，按到达顺序处理，
//! 因此不需要额外的锁。
//!
//! 每个 socket 带有递增的 [`SocketId`]；来自已被替换（断开后重连）的旧 socket
//! 的事件会被忽略，不会影响当前连接。

use crate::error::DriverError;
use crate::metrics::BridgeMetrics;
use crate::state::{BridgeContext, ConnectionState, ParseErrorReport};
use crate::transport::{CLOSE_NORMAL, Connector, EventSink, SocketEvent, SocketId, SocketWriter};
use polar_protocol::BridgeCodec;
use std::net::Ipv6Addr;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

/// 用户主动断开时的关闭原因
pub const USER_DISCONNECT_REASON: &str = "User disconnected";

/// 连接管理任务的输入消息
#[derive(Debug)]
pub(crate) enum BridgeMessage {
    /// `reply` 收到此次请求对应的 socket：新打开的，或已持有的
    Connect {
        address: String,
        reply: Option<oneshot::Sender<Result<SocketId, DriverError>>>,
    },
    Disconnect,
    Send { text: String },
    Flush { done: oneshot::Sender<()> },
    Shutdown,
    Socket { id: SocketId, event: SocketEvent },
}

/// 根据地址和端口构造 rosbridge URL
///
/// IPv6 字面量会自动加方括号。空地址返回 `None`。
///
/// # Example
///
/// ```
/// use polar_driver::bridge_url;
///
/// assert_eq!(bridge_url("192.168.1.20", 9090).as_deref(), Some("ws://192.168.1.20:9090"));
/// assert_eq!(bridge_url("fe80::1", 9090).as_deref(), Some("ws://[fe80::1]:9090"));
/// assert_eq!(bridge_url("  ", 9090), None);
/// ```
pub fn bridge_url(address: &str, port: u16) -> Option<String> {
    let host = address.trim();
    if host.is_empty() {
        return None;
    }
    if host.parse::<Ipv6Addr>().is_ok() {
        Some(format!("ws://[{host}]:{port}"))
    } else {
        Some(format!("ws://{host}:{port}"))
    }
}

struct ActiveSocket {
    id: SocketId,
    url: String,
    writer: Box<dyn SocketWriter>,
}

/// 连接管理任务状态
pub(crate) struct BridgeActor {
    ctx: Arc<BridgeContext>,
    metrics: Arc<BridgeMetrics>,
    codec: BridgeCodec,
    connector: Arc<dyn Connector>,
    port: u16,
    inbox: mpsc::WeakUnboundedSender<BridgeMessage>,
    socket: Option<ActiveSocket>,
    next_socket_id: SocketId,
    parse_errors: u64,
}

impl BridgeActor {
    pub(crate) fn new(
        ctx: Arc<BridgeContext>,
        metrics: Arc<BridgeMetrics>,
        codec: BridgeCodec,
        connector: Arc<dyn Connector>,
        port: u16,
        inbox: mpsc::WeakUnboundedSender<BridgeMessage>,
    ) -> Self {
        Self {
            ctx,
            metrics,
            codec,
            connector,
            port,
            inbox,
            socket: None,
            next_socket_id: 1,
            parse_errors: 0,
        }
    }

    fn handle_connect(&mut self, address: &str) -> Result<SocketId, DriverError> {
        // 已持有 socket（连接中或已连接）时忽略，保证同一时刻最多一个 socket
        if let Some(socket) = &self.socket {
            debug!("connect({}) ignored: socket to {} already open", address, socket.url);
            return Ok(socket.id);
        }

        let Some(url) = bridge_url(address, self.port) else {
            let message = "empty bridge address".to_string();
            warn!("Cannot connect: {}", message);
            BridgeMetrics::incr(&self.metrics.transport_errors);
            self.ctx.store_transport_error(message.clone(), None);
            return Err(DriverError::ConnectFailed(message));
        };

        BridgeMetrics::incr(&self.metrics.connect_attempts);
        let id = self.next_socket_id;
        self.next_socket_id += 1;

        info!("Connecting to rosbridge at {} (socket #{})", url, id);
        let events = EventSink::new(id, self.inbox.clone());
        let writer = self.connector.open(&url, events);
        self.socket = Some(ActiveSocket { id, url, writer });
        Ok(id)
    }

    fn handle_disconnect(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            info!("Disconnecting from {}", socket.url);
            socket.writer.close(CLOSE_NORMAL, USER_DISCONNECT_REASON);
        }
        // 不等待关闭握手完成
        self.ctx.set_connection(ConnectionState::Disconnected);
    }

    fn handle_send(&mut self, text: String) {
        let connected = self.ctx.connection_state().is_connected();
        let Some(socket) = self.socket.as_mut().filter(|_| connected) else {
            BridgeMetrics::incr(&self.metrics.tx_rejected);
            warn!("Cannot send message, not connected");
            return;
        };

        match socket.writer.send_text(text) {
            Ok(()) => BridgeMetrics::incr(&self.metrics.tx_messages_total),
            Err(e) => {
                let id = socket.id;
                self.handle_failure(id, format!("write failed: {e}"));
            },
        }
    }

    fn handle_socket_event(&mut self, id: SocketId, event: SocketEvent) {
        let current = self.socket.as_ref().map(|s| s.id);
        if current != Some(id) {
            trace!("Ignoring {:?} from stale socket #{}", event, id);
            return;
        }

        match event {
            SocketEvent::Opened => self.handle_opened(),
            SocketEvent::Message(text) => self.handle_message(&text),
            SocketEvent::InvalidFrame(reason) => self.handle_invalid_frame(reason),
            SocketEvent::Closing { code, reason } => self.handle_closing(code, &reason),
            SocketEvent::Failure(message) => self.handle_failure(id, message),
        }
    }

    fn handle_opened(&mut self) {
        if let Some(socket) = &self.socket {
            info!("WebSocket connection to {} opened", socket.url);
        }
        self.ctx.set_connection(ConnectionState::Connected);

        // 连接建立后立即订阅反馈话题
        match self.codec.encode_subscribe() {
            Ok(text) => self.handle_send(text),
            Err(e) => warn!("Failed to encode feedback subscription: {}", e),
        }
    }

    fn handle_message(&mut self, text: &str) {
        BridgeMetrics::incr(&self.metrics.rx_messages_total);

        match self.codec.decode_feedback(text) {
            Ok(feedback) => {
                let sequence = self.ctx.store_feedback(feedback);
                BridgeMetrics::incr(&self.metrics.rx_feedback_valid);
                trace!("Feedback #{}: {:?}", sequence, feedback);
            },
            Err(e) => {
                // 单条消息解析失败只影响这条消息
                self.parse_errors += 1;
                BridgeMetrics::incr(&self.metrics.rx_parse_errors);
                warn!("Error parsing message: {}", e);
                self.ctx
                    .store_parse_error(ParseErrorReport::new(e.to_string(), text, self.parse_errors));
            },
        }
    }

    fn handle_invalid_frame(&mut self, reason: String) {
        BridgeMetrics::incr(&self.metrics.rx_messages_total);
        self.parse_errors += 1;
        BridgeMetrics::incr(&self.metrics.rx_parse_errors);
        warn!("Error parsing message: {}", reason);
        self.ctx
            .store_parse_error(ParseErrorReport::new(reason, "", self.parse_errors));
    }

    fn handle_closing(&mut self, code: u16, reason: &str) {
        BridgeMetrics::incr(&self.metrics.server_closes);
        info!("WebSocket closing: {} / {}", code, reason);

        if let Some(mut socket) = self.socket.take() {
            // 回应关闭握手
            socket.writer.close(CLOSE_NORMAL, "");
        }
        self.ctx.set_connection(ConnectionState::Disconnected);
    }

    fn handle_failure(&mut self, id: SocketId, message: String) {
        BridgeMetrics::incr(&self.metrics.transport_errors);
        warn!("WebSocket error on socket #{}: {}", id, message);

        // 不自动重连
        self.socket = None;
        self.ctx.store_transport_error(message, Some(id));
        self.ctx.set_connection(ConnectionState::Disconnected);
    }

    fn shutdown(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            info!("Bridge dropped, closing connection to {}", socket.url);
            socket.writer.close(CLOSE_NORMAL, USER_DISCONNECT_REASON);
        }
        self.ctx.set_connection(ConnectionState::Disconnected);
    }
}

/// 连接管理主循环
///
/// 收到 `Shutdown` 或所有发送端都被丢弃时退出，退出前关闭 socket。
pub(crate) async fn bridge_loop(
    mut actor: BridgeActor,
    mut inbox: mpsc::UnboundedReceiver<BridgeMessage>,
) {
    while let Some(msg) = inbox.recv().await {
        match msg {
            BridgeMessage::Connect { address, reply } => {
                let result = actor.handle_connect(&address);
                if let Some(reply) = reply {
                    // 调用方可能已超时放弃
                    let _ = reply.send(result);
                }
            },
            BridgeMessage::Disconnect => actor.handle_disconnect(),
            BridgeMessage::Send { text } => actor.handle_send(text),
            BridgeMessage::Flush { done } => {
                let _ = done.send(());
            },
            BridgeMessage::Socket { id, event } => actor.handle_socket_event(id, event),
            BridgeMessage::Shutdown => break,
        }
    }

    actor.shutdown();
    debug!("Bridge loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_url() {
        assert_eq!(
            bridge_url("192.168.1.20", 9090).as_deref(),
            Some("ws://192.168.1.20:9090")
        );
        assert_eq!(
            bridge_url(" robot.local ", 9090).as_deref(),
            Some("ws://robot.local:9090")
        );
        assert_eq!(bridge_url("::1", 9090).as_deref(), Some("ws://[::1]:9090"));
        assert_eq!(bridge_url("", 9090), None);
    }
}
