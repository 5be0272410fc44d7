//! 无状态编解码器
//!
//! 在类型化的指令/反馈与 rosbridge 信封 JSON 文本之间转换。
//!
//! # 两阶段解析
//!
//! 反馈话题实际使用 `std_msgs/String` 传输，真正的反馈对象是 `msg.data`
//! 中的 JSON 字符串。解码流程：
//!
//! ```text
//! 原始文本 ──parse──> 外层信封 {op, topic, msg}
//!                        │
//!                        ├─ msg 是对象且 data 为字符串 ──parse──> Feedback
//!                        ├─ msg 是字符串              ──parse──> Feedback
//!                        └─ msg 是对象                ─────────> Feedback
//! ```

use crate::config::{CodecConfig, PayloadEncoding};
use crate::messages::{Envelope, Feedback, MoveCommand, Op, StringMessage};
use crate::ProtocolError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 接收方向的外层信封（负载延迟解析）
#[derive(Debug, Deserialize)]
struct InboundEnvelope {
    op: String,
    #[serde(default)]
    msg: Option<Value>,
}

/// rosbridge 编解码器
///
/// 负载编码方式在构造时选定，调用方不需要区分两种线上形式。
///
/// # Example
///
/// ```
/// use polar_protocol::{BridgeCodec, CodecConfig, MoveCommand};
///
/// let codec = BridgeCodec::new(CodecConfig::default());
/// let text = codec.encode_command(&MoveCommand::new(10.0, 90.0)).unwrap();
/// assert!(text.contains(r#""topic":"/polar_move_cmd""#));
///
/// let feedback = codec
///     .decode_feedback(r#"{"op":"publish","topic":"/robot_feedback","msg":{"data":"{\"moved_radius\":9.5,\"moved_angle\":89.0,\"error_vector\":0.5}"}}"#)
///     .unwrap();
/// assert_eq!(feedback.moved_radius, 9.5);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BridgeCodec {
    config: CodecConfig,
}

impl BridgeCodec {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// 编码移动指令为 publish 信封
    ///
    /// 输出是确定性的：相同输入和配置总是得到相同的文本。
    pub fn encode_command(&self, cmd: &MoveCommand) -> Result<String, ProtocolError> {
        encode_publish(
            &self.config.command_topic,
            Some(self.config.command_type().to_string()),
            cmd,
            self.config.command_encoding,
        )
    }

    /// 编码反馈话题的订阅请求
    pub fn encode_subscribe(&self) -> Result<String, ProtocolError> {
        self.encode_subscribe_topic(
            &self.config.feedback_topic,
            self.config.feedback_type.as_deref(),
        )
    }

    /// 编码任意话题的订阅请求（不含 msg 字段）
    pub fn encode_subscribe_topic(
        &self,
        topic: &str,
        msg_type: Option<&str>,
    ) -> Result<String, ProtocolError> {
        let env = Envelope::subscribe(topic, msg_type.map(str::to_string));
        serde_json::to_string(&env).map_err(ProtocolError::Encode)
    }

    /// 编码反馈话题的取消订阅请求
    pub fn encode_unsubscribe(&self) -> Result<String, ProtocolError> {
        let env = Envelope::unsubscribe(self.config.feedback_topic.as_str());
        serde_json::to_string(&env).map_err(ProtocolError::Encode)
    }

    /// 编码反馈 publish 信封（桥接端方向，用于模拟器和测试）
    pub fn encode_feedback(
        &self,
        feedback: &Feedback,
        encoding: PayloadEncoding,
    ) -> Result<String, ProtocolError> {
        let msg_type = match encoding {
            PayloadEncoding::Plain => None,
            PayloadEncoding::StringWrapped => self.config.feedback_type.clone(),
        };
        encode_publish(&self.config.feedback_topic, msg_type, feedback, encoding)
    }

    /// 解码反馈信封
    ///
    /// # 错误
    /// - `ProtocolError::InvalidEnvelope`: 外层不是合法信封
    /// - `ProtocolError::UnexpectedOp`: `op` 不是 `"publish"`
    /// - `ProtocolError::MissingPayload`: 缺少 `msg`
    /// - `ProtocolError::InvalidNestedPayload`: 内层 JSON 字符串无法解析
    /// - `ProtocolError::InvalidFeedback`: 负载字段与反馈结构不匹配
    pub fn decode_feedback(&self, text: &str) -> Result<Feedback, ProtocolError> {
        let envelope: InboundEnvelope =
            serde_json::from_str(text).map_err(ProtocolError::InvalidEnvelope)?;

        if envelope.op != Op::Publish.as_str() {
            return Err(ProtocolError::UnexpectedOp { op: envelope.op });
        }

        let msg = envelope.msg.ok_or(ProtocolError::MissingPayload)?;
        decode_feedback_payload(msg)
    }
}

/// 按编码方式构造 publish 信封文本
fn encode_publish<T: Serialize>(
    topic: &str,
    msg_type: Option<String>,
    payload: &T,
    encoding: PayloadEncoding,
) -> Result<String, ProtocolError> {
    match encoding {
        PayloadEncoding::Plain => {
            let env = Envelope::publish(topic, msg_type, payload);
            serde_json::to_string(&env).map_err(ProtocolError::Encode)
        },
        PayloadEncoding::StringWrapped => {
            let data = serde_json::to_string(payload).map_err(ProtocolError::Encode)?;
            let env = Envelope::publish(topic, msg_type, StringMessage { data });
            serde_json::to_string(&env).map_err(ProtocolError::Encode)
        },
    }
}

/// 解析反馈负载（自动识别原生对象 / 字符串包裹两种形式）
fn decode_feedback_payload(msg: Value) -> Result<Feedback, ProtocolError> {
    if let Some(Value::String(nested)) = msg.get("data") {
        return decode_nested(nested);
    }
    match msg {
        Value::String(nested) => decode_nested(&nested),
        other => serde_json::from_value(other).map_err(ProtocolError::InvalidFeedback),
    }
}

/// 第二阶段：解析内层 JSON 字符串
fn decode_nested(nested: &str) -> Result<Feedback, ProtocolError> {
    let inner: Value = serde_json::from_str(nested).map_err(ProtocolError::InvalidNestedPayload)?;
    serde_json::from_value(inner).map_err(ProtocolError::InvalidFeedback)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> BridgeCodec {
        BridgeCodec::default()
    }

    #[test]
    fn test_encode_command_plain() {
        let text = codec().encode_command(&MoveCommand::new(10.0, 90.0)).unwrap();
        assert_eq!(
            text,
            r#"{"op":"publish","topic":"/polar_move_cmd","type":"my_robot_interfaces/msg/PolarMove","msg":{"radius":10.0,"angle":90.0}}"#
        );
    }

    #[test]
    fn test_encode_command_string_wrapped() {
        let codec = BridgeCodec::new(CodecConfig {
            command_encoding: PayloadEncoding::StringWrapped,
            ..Default::default()
        });
        let text = codec.encode_command(&MoveCommand::new(10.0, 90.0)).unwrap();

        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["op"], "publish");
        assert_eq!(value["type"], "std_msgs/String");
        let data = value["msg"]["data"].as_str().unwrap();
        let inner: MoveCommand = serde_json::from_str(data).unwrap();
        assert_eq!(inner, MoveCommand::new(10.0, 90.0));
    }

    #[test]
    fn test_encode_command_deterministic() {
        let codec = codec();
        let cmd = MoveCommand::new(1.25, -45.0);
        assert_eq!(
            codec.encode_command(&cmd).unwrap(),
            codec.encode_command(&cmd).unwrap()
        );
    }

    #[test]
    fn test_encode_subscribe() {
        let text = codec().encode_subscribe().unwrap();
        assert_eq!(
            text,
            r#"{"op":"subscribe","topic":"/robot_feedback","type":"std_msgs/String"}"#
        );
        let value: Value = serde_json::from_str(&text).unwrap();
        assert!(value.get("msg").is_none());
    }

    #[test]
    fn test_encode_subscribe_without_type() {
        let text = codec().encode_subscribe_topic("/other", None).unwrap();
        assert_eq!(text, r#"{"op":"subscribe","topic":"/other"}"#);
    }

    #[test]
    fn test_encode_unsubscribe() {
        let text = codec().encode_unsubscribe().unwrap();
        assert_eq!(text, r#"{"op":"unsubscribe","topic":"/robot_feedback"}"#);
    }

    #[test]
    fn test_decode_plain_feedback() {
        let text = r#"{"op":"publish","topic":"/robot_feedback","msg":{"moved_radius":9.5,"moved_angle":88.0,"error_vector":2.5}}"#;
        let fb = codec().decode_feedback(text).unwrap();
        assert_eq!(fb, Feedback::new(9.5, 88.0, 2.5));
    }

    #[test]
    fn test_decode_nested_feedback() {
        let text = r#"{"op":"publish","topic":"/robot_feedback","msg":{"data":"{\"moved_radius\":9.5,\"moved_angle\":88.0,\"error_vector\":2.5}"}}"#;
        let fb = codec().decode_feedback(text).unwrap();
        assert_eq!(fb, Feedback::new(9.5, 88.0, 2.5));
    }

    #[test]
    fn test_decode_bare_string_payload() {
        let text = r#"{"op":"publish","msg":"{\"moved_radius\":1,\"moved_angle\":2,\"error_vector\":3}"}"#;
        let fb = codec().decode_feedback(text).unwrap();
        assert_eq!(fb, Feedback::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_decode_ignores_extra_fields() {
        let text = r#"{"op":"publish","topic":"/robot_feedback","id":"x","msg":{"moved_radius":1.0,"moved_angle":2.0,"error_vector":3.0,"stamp":12}}"#;
        assert!(codec().decode_feedback(text).is_ok());
    }

    #[test]
    fn test_decode_rejects_non_publish() {
        let text = r#"{"op":"status","msg":{"level":"error"}}"#;
        match codec().decode_feedback(text) {
            Err(ProtocolError::UnexpectedOp { op }) => assert_eq!(op, "status"),
            other => panic!("Expected UnexpectedOp, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_missing_msg() {
        let text = r#"{"op":"publish","topic":"/robot_feedback"}"#;
        assert!(matches!(
            codec().decode_feedback(text),
            Err(ProtocolError::MissingPayload)
        ));

        let text = r#"{"op":"publish","topic":"/robot_feedback","msg":null}"#;
        assert!(matches!(
            codec().decode_feedback(text),
            Err(ProtocolError::MissingPayload)
        ));
    }

    #[test]
    fn test_decode_invalid_envelope() {
        assert!(matches!(
            codec().decode_feedback("not json"),
            Err(ProtocolError::InvalidEnvelope(_))
        ));
        assert!(matches!(
            codec().decode_feedback(r#"{"topic":"/robot_feedback"}"#),
            Err(ProtocolError::InvalidEnvelope(_))
        ));
    }

    #[test]
    fn test_decode_invalid_nested_string() {
        let text = r#"{"op":"publish","msg":{"data":"{not json"}}"#;
        assert!(matches!(
            codec().decode_feedback(text),
            Err(ProtocolError::InvalidNestedPayload(_))
        ));
    }

    #[test]
    fn test_decode_wrong_shape() {
        // 外层合法，但内层缺少 error_vector
        let text = r#"{"op":"publish","msg":{"data":"{\"moved_radius\":1.0,\"moved_angle\":2.0}"}}"#;
        assert!(matches!(
            codec().decode_feedback(text),
            Err(ProtocolError::InvalidFeedback(_))
        ));

        // camelCase 字段名不被接受
        let text = r#"{"op":"publish","msg":{"movedRadius":1.0,"movedAngle":2.0,"errorVector":3.0}}"#;
        assert!(matches!(
            codec().decode_feedback(text),
            Err(ProtocolError::InvalidFeedback(_))
        ));
    }

    #[test]
    fn test_feedback_roundtrip_both_encodings() {
        let codec = codec();
        let fb = Feedback::new(12.5, -30.0, 0.75);
        for encoding in [PayloadEncoding::Plain, PayloadEncoding::StringWrapped] {
            let text = codec.encode_feedback(&fb, encoding).unwrap();
            assert_eq!(codec.decode_feedback(&text).unwrap(), fb, "{:?}", encoding);
        }
    }
}
