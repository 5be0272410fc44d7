//! 驱动层模块
//!
//! 本模块管理与 rosbridge 服务端之间唯一的一条 WebSocket 连接，包括：
//! - 连接管理任务（单一状态所有者，顺序处理调用方操作和 socket 事件）
//! - 状态同步（ArcSwap 无锁读取 + watch 推送）
//! - 入站反馈解析（单条解析失败不影响连接）
//! - 连接指标（被静默丢弃的发送可观测）
//!
//! # 使用场景
//!
//! 适用于需要直接收发 rosbridge 消息的场景。
//! 需要按计划自动下发指令时，使用 `polar-client` 提供的更高级接口。
//!
//! # Example
//!
//! ```no_run
//! use polar_driver::BridgeBuilder;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), polar_driver::DriverError> {
//! let bridge = BridgeBuilder::new().build()?;
//! bridge.connect_and_wait("192.168.1.20", Duration::from_secs(3)).await?;
//! bridge.send_move(10.0, 90.0)?;
//!
//! let feedback = bridge.latest_feedback();
//! println!("moved to r={} θ={}", feedback.moved_radius, feedback.moved_angle);
//! bridge.disconnect()?;
//! # Ok(())
//! # }
//! ```

mod bridge;
mod builder;
pub mod config;
mod error;
pub mod metrics;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod pipeline;
pub mod state;
pub mod transport;

pub use bridge::Bridge;
pub use builder::BridgeBuilder;
pub use config::{BridgeConfig, DEFAULT_BRIDGE_PORT};
pub use error::DriverError;
pub use metrics::{BridgeMetrics, MetricsSnapshot};
pub use pipeline::{USER_DISCONNECT_REASON, bridge_url};
pub use state::*;
pub use transport::{
    CLOSE_NORMAL, Connector, EventSink, SocketEvent, SocketId, SocketWriter, WsConnector, binary_frame_event,
};
