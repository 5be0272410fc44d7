//! rosbridge 线上数据结构
//!
//! 字段名与桥接端约定完全一致（外部固定协议），拼写错误属于正确性问题。

use serde::{Deserialize, Serialize};

/// rosbridge 操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    /// 向话题发布消息（双向使用：发送指令 / 接收反馈）
    Publish,
    /// 订阅话题
    Subscribe,
    /// 取消订阅
    Unsubscribe,
}

impl Op {
    /// 线上字符串表示
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Publish => "publish",
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
        }
    }
}

/// rosbridge 信封
///
/// 双向通用：`{op, topic?, type?, msg?}`。值为 `None` 的可选字段不会被序列化
/// （桥接端不接受 `null` 占位）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub op: Op,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub msg_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<T>,
}

impl<T> Envelope<T> {
    /// 构造 publish 信封
    pub fn publish(topic: impl Into<String>, msg_type: Option<String>, msg: T) -> Self {
        Self {
            op: Op::Publish,
            topic: Some(topic.into()),
            msg_type,
            msg: Some(msg),
        }
    }
}

impl Envelope<()> {
    /// 构造 subscribe 信封（无 msg 字段）
    pub fn subscribe(topic: impl Into<String>, msg_type: Option<String>) -> Self {
        Self {
            op: Op::Subscribe,
            topic: Some(topic.into()),
            msg_type,
            msg: None,
        }
    }

    /// 构造 unsubscribe 信封（无 msg 字段）
    pub fn unsubscribe(topic: impl Into<String>) -> Self {
        Self {
            op: Op::Unsubscribe,
            topic: Some(topic.into()),
            msg_type: None,
            msg: None,
        }
    }
}

/// 极坐标移动指令
///
/// 每次发送时构造，不可变。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MoveCommand {
    /// 半径位移
    pub radius: f32,
    /// 角度位移
    pub angle: f32,
}

impl MoveCommand {
    pub fn new(radius: f32, angle: f32) -> Self {
        Self { radius, angle }
    }
}

/// 机器人执行指令后的反馈
///
/// 包含实际位移和跟踪误差。线上字段为 snake_case：
/// `moved_radius` / `moved_angle` / `error_vector`。
/// 默认值全零（尚未收到任何反馈时的初始状态）。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Feedback {
    /// 实际半径位移
    pub moved_radius: f32,
    /// 实际角度位移
    pub moved_angle: f32,
    /// 跟踪误差
    pub error_vector: f32,
}

impl Feedback {
    pub fn new(moved_radius: f32, moved_angle: f32, error_vector: f32) -> Self {
        Self {
            moved_radius,
            moved_angle,
            error_vector,
        }
    }
}

/// `std_msgs/String` 负载
///
/// 字符串包裹形式下，真正的负载是 `data` 字段里的 JSON 文本。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringMessage {
    pub data: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_serialization() {
        assert_eq!(serde_json::to_string(&Op::Publish).unwrap(), "\"publish\"");
        assert_eq!(
            serde_json::to_string(&Op::Subscribe).unwrap(),
            "\"subscribe\""
        );
        let op: Op = serde_json::from_str("\"unsubscribe\"").unwrap();
        assert_eq!(op, Op::Unsubscribe);
        assert_eq!(op.as_str(), "unsubscribe");
    }

    #[test]
    fn test_subscribe_envelope_omits_msg() {
        let env = Envelope::subscribe("/robot_feedback", None);
        let json = serde_json::to_string(&env).unwrap();
        assert_eq!(json, r#"{"op":"subscribe","topic":"/robot_feedback"}"#);
    }

    #[test]
    fn test_envelope_type_field_name() {
        let env = Envelope::publish(
            "/polar_move_cmd",
            Some("my_robot_interfaces/msg/PolarMove".to_string()),
            MoveCommand::new(1.0, 2.0),
        );
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value["type"], "my_robot_interfaces/msg/PolarMove");
        assert!(value.get("msg_type").is_none());
        assert_eq!(value["msg"]["radius"], 1.0);
        assert_eq!(value["msg"]["angle"], 2.0);
    }

    #[test]
    fn test_feedback_wire_field_names() {
        let fb = Feedback::new(1.5, 30.0, 0.25);
        let value = serde_json::to_value(fb).unwrap();
        assert_eq!(value["moved_radius"], 1.5);
        assert_eq!(value["moved_angle"], 30.0);
        assert_eq!(value["error_vector"], 0.25);
    }

    #[test]
    fn test_feedback_default_is_zero() {
        let fb = Feedback::default();
        assert_eq!(fb, Feedback::new(0.0, 0.0, 0.0));
    }
}
