//! Mock 传输（无网络依赖）
//!
//! 用于测试连接管理和自动化序列：测试代码通过 [`MockSocket`] 注入
//! socket 生命周期事件，并检查带时间戳的出站消息。
//!
//! # 示例
//!
//! ```rust
//! use polar_driver::BridgeBuilder;
//! use polar_driver::mock::MockConnector;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let connector = MockConnector::new();
//! let bridge = BridgeBuilder::new()
//!     .connector(connector.clone())
//!     .build()
//!     .unwrap();
//!
//! bridge.connect("10.0.0.2").unwrap();
//! bridge.flush().await.unwrap();
//!
//! let socket = connector.last_socket().unwrap();
//! assert_eq!(socket.url(), "ws://10.0.0.2:9090");
//! socket.open();
//! bridge.flush().await.unwrap();
//! assert!(bridge.is_connected());
//! # }
//! ```

use crate::error::DriverError;
use crate::transport::{Connector, EventSink, SocketEvent, SocketWriter, binary_frame_event};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time::Instant;

/// 一条出站消息（带写入时间）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    pub text: String,
    pub at: Instant,
}

/// Mock 连接器
///
/// 记录每一次 `open` 调用，克隆后共享同一份记录。
#[derive(Clone, Default)]
pub struct MockConnector {
    sockets: Arc<Mutex<Vec<MockSocket>>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已打开的 socket 数量
    pub fn open_count(&self) -> usize {
        self.sockets.lock().len()
    }

    pub fn socket(&self, index: usize) -> Option<MockSocket> {
        self.sockets.lock().get(index).cloned()
    }

    pub fn last_socket(&self) -> Option<MockSocket> {
        self.sockets.lock().last().cloned()
    }
}

impl Connector for MockConnector {
    fn open(&self, url: &str, events: EventSink) -> Box<dyn SocketWriter> {
        let socket = MockSocket {
            inner: Arc::new(MockSocketInner {
                url: url.to_string(),
                events,
                sent: Mutex::new(Vec::new()),
                close_frame: Mutex::new(None),
            }),
        };
        self.sockets.lock().push(socket.clone());
        Box::new(MockWriter { socket })
    }
}

struct MockSocketInner {
    url: String,
    events: EventSink,
    sent: Mutex<Vec<SentFrame>>,
    close_frame: Mutex<Option<(u16, String)>>,
}

/// 单个 mock socket 的控制端
#[derive(Clone)]
pub struct MockSocket {
    inner: Arc<MockSocketInner>,
}

impl MockSocket {
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// 模拟握手完成
    pub fn open(&self) -> bool {
        self.inner.events.emit(SocketEvent::Opened)
    }

    /// 模拟收到一条消息
    pub fn receive(&self, text: impl Into<String>) -> bool {
        self.inner.events.emit(SocketEvent::Message(text.into()))
    }

    /// 模拟收到一帧二进制消息
    pub fn receive_binary(&self, data: &[u8]) -> bool {
        self.inner.events.emit(binary_frame_event(data))
    }

    /// 模拟服务端发起关闭
    pub fn server_close(&self, code: u16, reason: impl Into<String>) -> bool {
        self.inner.events.emit(SocketEvent::Closing {
            code,
            reason: reason.into(),
        })
    }

    /// 模拟传输错误
    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.inner.events.emit(SocketEvent::Failure(message.into()))
    }

    /// 已写入的消息（按写入顺序）
    pub fn sent(&self) -> Vec<SentFrame> {
        self.inner.sent.lock().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.inner.sent.lock().iter().map(|f| f.text.clone()).collect()
    }

    /// 客户端发起的关闭（关闭码、原因）
    pub fn close_frame(&self) -> Option<(u16, String)> {
        self.inner.close_frame.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.close_frame.lock().is_some()
    }
}

struct MockWriter {
    socket: MockSocket,
}

impl SocketWriter for MockWriter {
    fn send_text(&mut self, text: String) -> Result<(), DriverError> {
        if self.socket.is_closed() {
            return Err(DriverError::ChannelClosed);
        }
        self.socket.inner.sent.lock().push(SentFrame {
            text,
            at: Instant::now(),
        });
        Ok(())
    }

    fn close(&mut self, code: u16, reason: &str) {
        let mut close_frame = self.socket.inner.close_frame.lock();
        if close_frame.is_none() {
            *close_frame = Some((code, reason.to_string()));
        }
    }
}
