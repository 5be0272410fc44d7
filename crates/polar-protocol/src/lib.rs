//! # Polar Protocol
//!
//! rosbridge 消息信封定义与编解码（无 IO 依赖）
//!
//! ## 模块
//!
//! - `messages`: 线上数据结构（信封、移动指令、机器人反馈）
//! - `config`: 编解码配置（话题、类型、负载编码方式）
//! - `codec`: 无状态编解码器
//!
//! ## 负载编码
//!
//! rosbridge 的负载既可能是原生 JSON 对象，也可能是 `std_msgs/String`
//! 包裹的 JSON 字符串（需要二次解析）。两种形式由 [`PayloadEncoding`]
//! 在构造编解码器时选定，调用方无需关心。

pub mod codec;
pub mod config;
pub mod messages;

// 重新导出常用类型
pub use codec::BridgeCodec;
pub use config::*;
pub use messages::*;

use thiserror::Error;

/// 协议编解码错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Failed to encode envelope: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(#[source] serde_json::Error),

    #[error("Unexpected op: expected \"publish\", got {op:?}")]
    UnexpectedOp { op: String },

    #[error("Envelope has no msg payload")]
    MissingPayload,

    #[error("Invalid nested payload string: {0}")]
    InvalidNestedPayload(#[source] serde_json::Error),

    #[error("Payload does not match feedback shape: {0}")]
    InvalidFeedback(#[source] serde_json::Error),
}

impl ProtocolError {
    /// 是否为接收方向的解析错误（编码错误以外的所有变体）
    pub fn is_decode_error(&self) -> bool {
        !matches!(self, Self::Encode(_))
    }
}
