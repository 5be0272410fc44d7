//! 客户端接口模块
//!
//! 本模块在连接层之上提供面向操作员的接口，包括：
//! - 自动化序列（按计划下发指令，步骤间定时等待）
//! - `RobotClient` 门面（连接、单次移动、序列、状态订阅）
//!
//! 如果只需要收发 rosbridge 消息，可以直接使用 `polar-driver`。

pub mod automation;
pub mod client;

// 重新导出常用类型
pub use automation::{
    AutomationError, AutomationHandle, AutomationReport, AutomationRunner, AutomationStep,
    NO_FEEDBACK_ERROR,
};
pub use client::RobotClient;
