//! 驱动层错误类型定义

use polar_protocol::ProtocolError;
use thiserror::Error;

/// 驱动层错误类型
///
/// 连接/断开/传输失败不会以错误形式返回，而是体现为连接状态变化；
/// 这里只覆盖调用方确实需要处理的情况。
#[derive(Error, Debug)]
pub enum DriverError {
    /// 协议编码错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 命令通道已关闭（连接管理任务已退出）
    #[error("Command channel closed")]
    ChannelClosed,

    /// 当前线程不在 tokio 运行时中
    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),

    /// 配置文件读取或解析失败
    #[error("Config error: {0}")]
    Config(String),

    /// 操作超时
    #[error("Operation timeout")]
    Timeout,

    /// 等待连接期间发生传输错误
    #[error("Connect failed: {0}")]
    ConnectFailed(String),
}

#[cfg(test)]
mod tests {
    use super::DriverError;
    use polar_protocol::ProtocolError;

    /// 测试 DriverError 的 Display 实现
    #[test]
    fn test_driver_error_display() {
        let driver_error = DriverError::ChannelClosed;
        assert_eq!(format!("{}", driver_error), "Command channel closed");

        let driver_error = DriverError::Timeout;
        assert_eq!(format!("{}", driver_error), "Operation timeout");

        let driver_error = DriverError::Config("bad port".to_string());
        let msg = format!("{}", driver_error);
        assert!(msg.contains("Config error") && msg.contains("bad port"));

        let driver_error = DriverError::ConnectFailed("connection refused".to_string());
        assert_eq!(format!("{}", driver_error), "Connect failed: connection refused");

        let driver_error = DriverError::Protocol(ProtocolError::MissingPayload);
        let msg = format!("{}", driver_error);
        assert!(msg.contains("Protocol error"), "Protocol error message: {}", msg);
    }

    /// 测试 From<ProtocolError> 转换
    #[test]
    fn test_from_protocol_error() {
        let err: DriverError = ProtocolError::UnexpectedOp {
            op: "status".to_string(),
        }
        .into();
        match err {
            DriverError::Protocol(ProtocolError::UnexpectedOp { op }) => assert_eq!(op, "status"),
            _ => panic!("Expected Protocol variant"),
        }
    }
}
