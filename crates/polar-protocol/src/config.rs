//! 编解码配置
//!
//! 话题名、消息类型和指令负载编码方式。两套已部署的桥接端对指令话题的
//! 负载形式约定不同，因此编码方式必须可配置。

use serde::{Deserialize, Serialize};

/// 指令话题默认名
pub const DEFAULT_COMMAND_TOPIC: &str = "/polar_move_cmd";
/// 反馈话题默认名
pub const DEFAULT_FEEDBACK_TOPIC: &str = "/robot_feedback";
/// 原生指令消息类型
pub const POLAR_MOVE_TYPE: &str = "my_robot_interfaces/msg/PolarMove";
/// 字符串包裹消息类型
pub const STRING_MSG_TYPE: &str = "std_msgs/String";

/// 负载编码方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadEncoding {
    /// 负载直接是 JSON 对象：`"msg": {"radius": 1.0, "angle": 2.0}`
    #[default]
    Plain,
    /// 负载是 `std_msgs/String`：`"msg": {"data": "{\"radius\":1.0,...}"}`
    StringWrapped,
}

impl PayloadEncoding {
    /// 该编码方式对应的默认消息类型
    pub fn default_command_type(self) -> &'static str {
        match self {
            Self::Plain => POLAR_MOVE_TYPE,
            Self::StringWrapped => STRING_MSG_TYPE,
        }
    }
}

impl std::str::FromStr for PayloadEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(Self::Plain),
            "string-wrapped" | "string" => Ok(Self::StringWrapped),
            other => Err(format!(
                "unknown payload encoding '{other}' (expected 'plain' or 'string-wrapped')"
            )),
        }
    }
}

/// 编解码器配置
///
/// # Example
///
/// ```
/// use polar_protocol::{CodecConfig, PayloadEncoding};
///
/// let config = CodecConfig {
///     command_encoding: PayloadEncoding::StringWrapped,
///     ..Default::default()
/// };
/// assert_eq!(config.command_type(), "std_msgs/String");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// 指令话题
    pub command_topic: String,
    /// 指令消息类型（`None` 时根据编码方式推导）
    pub command_type: Option<String>,
    /// 指令负载编码方式
    pub command_encoding: PayloadEncoding,
    /// 反馈话题
    pub feedback_topic: String,
    /// 订阅反馈时声明的消息类型
    pub feedback_type: Option<String>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            command_topic: DEFAULT_COMMAND_TOPIC.to_string(),
            command_type: None,
            command_encoding: PayloadEncoding::Plain,
            feedback_topic: DEFAULT_FEEDBACK_TOPIC.to_string(),
            feedback_type: Some(STRING_MSG_TYPE.to_string()),
        }
    }
}

impl CodecConfig {
    /// 发布指令时声明的消息类型
    pub fn command_type(&self) -> &str {
        self.command_type
            .as_deref()
            .unwrap_or_else(|| self.command_encoding.default_command_type())
    }
}
