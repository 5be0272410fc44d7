//! 传输层抽象
//!
//! 连接管理任务通过 [`Connector`] 打开 socket，通过 [`SocketWriter`] 写入，
//! socket 生命周期事件（打开、消息、服务端关闭、失败）经 [`EventSink`]
//! 回送到连接管理任务的同一个消息队列。
//!
//! ```text
//! Bridge ──BridgeMessage──> bridge_loop ──SocketWriter──> socket 任务 ──> rosbridge
//!                               ▲                              │
//!                               └──────── SocketEvent ─────────┘
//! ```
//!
//! 生产实现为 [`WsConnector`]（tokio-tungstenite），每个 socket 一个 IO 任务。

use crate::error::DriverError;
use crate::pipeline::BridgeMessage;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, trace, warn};

/// socket 标识（每次 connect 递增）
pub type SocketId = u64;

/// 正常关闭码
pub const CLOSE_NORMAL: u16 = 1000;

/// socket 生命周期事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// 握手完成，socket 可写
    Opened,
    /// 收到一条文本消息
    Message(String),
    /// 服务端发起关闭
    Closing { code: u16, reason: String },
    /// 收到一帧无法解码为文本的消息（走解析错误路径，不影响连接）
    InvalidFrame(String),
    /// 传输错误（连接失败、读写失败、异常断开）
    Failure(String),
}

/// 二进制帧转为事件
///
/// rosbridge 可能以二进制帧发送 JSON；非 UTF-8 内容不做替换，直接报告为无效帧。
pub fn binary_frame_event(data: &[u8]) -> SocketEvent {
    match std::str::from_utf8(data) {
        Ok(text) => SocketEvent::Message(text.to_string()),
        Err(e) => SocketEvent::InvalidFrame(format!("binary frame is not valid UTF-8: {e}")),
    }
}

/// 事件回送通道
///
/// 持有连接管理任务队列的弱引用：连接管理任务退出后，事件被直接丢弃，
/// socket 任务不会让连接管理任务保持存活。
#[derive(Debug, Clone)]
pub struct EventSink {
    socket_id: SocketId,
    tx: mpsc::WeakUnboundedSender<BridgeMessage>,
}

impl EventSink {
    pub(crate) fn new(socket_id: SocketId, tx: mpsc::WeakUnboundedSender<BridgeMessage>) -> Self {
        Self { socket_id, tx }
    }

    pub fn socket_id(&self) -> SocketId {
        self.socket_id
    }

    /// 回送事件
    ///
    /// 返回 `false` 表示连接管理任务已退出。
    pub fn emit(&self, event: SocketEvent) -> bool {
        match self.tx.upgrade() {
            Some(tx) => tx
                .send(BridgeMessage::Socket {
                    id: self.socket_id,
                    event,
                })
                .is_ok(),
            None => false,
        }
    }
}

/// socket 写端
///
/// 所有方法必须非阻塞（只入队，不等待网络）。
pub trait SocketWriter: Send {
    /// 写入一条文本消息
    fn send_text(&mut self, text: String) -> Result<(), DriverError>;

    /// 发起关闭握手
    fn close(&mut self, code: u16, reason: &str);
}

/// socket 工厂
///
/// `open` 只负责提交连接请求，不能阻塞调用方；打开成功或失败通过
/// `events` 异步报告。
pub trait Connector: Send + Sync + 'static {
    fn open(&self, url: &str, events: EventSink) -> Box<dyn SocketWriter>;
}

/// 出站帧
#[derive(Debug)]
enum OutboundFrame {
    Text(String),
    Close { code: u16, reason: String },
}

/// 基于 tokio-tungstenite 的连接器
#[derive(Debug, Clone)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl Connector for WsConnector {
    fn open(&self, url: &str, events: EventSink) -> Box<dyn SocketWriter> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(socket_task(
            url.to_string(),
            events,
            rx,
            self.connect_timeout,
        ));
        Box::new(WsWriter { tx })
    }
}

/// WebSocket 写端（向 socket 任务投递出站帧）
struct WsWriter {
    tx: mpsc::UnboundedSender<OutboundFrame>,
}

impl SocketWriter for WsWriter {
    fn send_text(&mut self, text: String) -> Result<(), DriverError> {
        self.tx
            .send(OutboundFrame::Text(text))
            .map_err(|_| DriverError::ChannelClosed)
    }

    fn close(&mut self, code: u16, reason: &str) {
        let _ = self.tx.send(OutboundFrame::Close {
            code,
            reason: reason.to_string(),
        });
    }
}

/// 单个 socket 的 IO 任务
///
/// 负责握手、按提交顺序写出出站帧、把入站消息转换为事件。
/// 写端被丢弃时以正常关闭码结束连接。
async fn socket_task(
    url: String,
    events: EventSink,
    mut out_rx: mpsc::UnboundedReceiver<OutboundFrame>,
    connect_timeout: Duration,
) {
    let ws = match tokio::time::timeout(connect_timeout, connect_async(url.as_str())).await {
        Ok(Ok((ws, _response))) => ws,
        Ok(Err(e)) => {
            events.emit(SocketEvent::Failure(format!("connect to {url} failed: {e}")));
            return;
        },
        Err(_) => {
            events.emit(SocketEvent::Failure(format!(
                "connect to {url} timed out after {} ms",
                connect_timeout.as_millis()
            )));
            return;
        },
    };

    debug!("WebSocket handshake with {} completed", url);
    events.emit(SocketEvent::Opened);

    let (mut sink, mut stream) = ws.split();
    let mut server_closing = false;

    loop {
        tokio::select! {
            frame = out_rx.recv() => match frame {
                Some(OutboundFrame::Text(text)) => {
                    trace!("-> {}", text);
                    if let Err(e) = sink.send(Message::text(text)).await {
                        if !server_closing {
                            events.emit(SocketEvent::Failure(format!("write failed: {e}")));
                        }
                        break;
                    }
                },
                Some(OutboundFrame::Close { code, reason }) => {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.into(),
                    };
                    // 服务端已发起关闭时，tungstenite 已自动回复，这里的错误可忽略
                    let _ = sink.send(Message::Close(Some(frame))).await;
                    let _ = sink.close().await;
                    break;
                },
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    let _ = sink.close().await;
                    break;
                },
            },
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    trace!("<- {}", text.as_str());
                    events.emit(SocketEvent::Message(text.as_str().to_string()));
                },
                Some(Ok(Message::Binary(data))) => {
                    events.emit(binary_frame_event(&data));
                },
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.as_str().to_string()))
                        .unwrap_or((1005, String::new()));
                    server_closing = true;
                    events.emit(SocketEvent::Closing { code, reason });
                },
                Some(Ok(_)) => {},
                Some(Err(e)) => {
                    if !server_closing {
                        events.emit(SocketEvent::Failure(format!("read failed: {e}")));
                    }
                    break;
                },
                None => {
                    if !server_closing {
                        warn!("WebSocket stream to {} ended without close frame", url);
                        events.emit(SocketEvent::Failure("connection closed unexpectedly".to_string()));
                    }
                    break;
                },
            },
        }
    }

    debug!("WebSocket task for {} exited", url);
}
