//! Builder 模式实现
//!
//! 提供链式构造 `Bridge` 实例的便捷方式。

use crate::bridge::Bridge;
use crate::config::{BridgeConfig, DEFAULT_BRIDGE_PORT};
use crate::error::DriverError;
use crate::transport::{Connector, WsConnector};
use polar_protocol::{CodecConfig, PayloadEncoding};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

/// Bridge Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use polar_driver::BridgeBuilder;
/// use polar_protocol::PayloadEncoding;
///
/// # #[tokio::main]
/// # async fn main() {
/// // 使用默认配置（端口 9090，原生 JSON 负载）
/// let bridge = BridgeBuilder::new().build().unwrap();
///
/// // 自定义端口和指令编码
/// let bridge = BridgeBuilder::new()
///     .port(9191)
///     .command_encoding(PayloadEncoding::StringWrapped)
///     .build()
///     .unwrap();
/// # }
/// ```
pub struct BridgeBuilder {
    port: Option<u16>,
    codec: Option<CodecConfig>,
    /// 握手超时（仅对默认的 WebSocket 连接器生效）
    connect_timeout: Option<Duration>,
    connector: Option<Arc<dyn Connector>>,
}

impl BridgeBuilder {
    pub fn new() -> Self {
        Self {
            port: None,
            codec: None,
            connect_timeout: None,
            connector: None,
        }
    }

    /// 应用完整配置（之后的链式调用可以覆盖其中的字段）
    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.port = Some(config.port);
        self.connect_timeout = Some(config.connect_timeout());
        self.codec = Some(config.codec);
        self
    }

    /// 设置 rosbridge 端口（可选，默认 9090）
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// 设置编解码配置（可选）
    pub fn codec_config(mut self, codec: CodecConfig) -> Self {
        self.codec = Some(codec);
        self
    }

    /// 只修改指令负载编码方式
    pub fn command_encoding(mut self, encoding: PayloadEncoding) -> Self {
        self.codec.get_or_insert_with(CodecConfig::default).command_encoding = encoding;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// 替换传输层（测试时注入 `MockConnector`）
    pub fn connector(mut self, connector: impl Connector) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// 构建 `Bridge` 并启动连接管理任务
    ///
    /// # 错误
    /// - `DriverError::NoRuntime`: 当前线程不在 tokio 运行时中
    pub fn build(self) -> Result<Bridge, DriverError> {
        let handle = Handle::try_current().map_err(|e| DriverError::NoRuntime(e.to_string()))?;

        let connector: Arc<dyn Connector> = match self.connector {
            Some(connector) => connector,
            None => Arc::new(WsConnector::new(
                self.connect_timeout
                    .unwrap_or_else(|| BridgeConfig::default().connect_timeout()),
            )),
        };

        Ok(Bridge::spawn(
            &handle,
            self.port.unwrap_or(DEFAULT_BRIDGE_PORT),
            self.codec.unwrap_or_default(),
            connector,
        ))
    }
}

impl Default for BridgeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockConnector;

    #[test]
    fn test_build_without_runtime() {
        let result = BridgeBuilder::new().connector(MockConnector::new()).build();
        assert!(matches!(result, Err(DriverError::NoRuntime(_))));
    }

    #[tokio::test]
    async fn test_builder_defaults() {
        let bridge = BridgeBuilder::new().connector(MockConnector::new()).build().unwrap();
        assert_eq!(bridge.port(), 9090);
        assert_eq!(bridge.codec().config(), &CodecConfig::default());
        assert!(!bridge.is_connected());
    }

    #[tokio::test]
    async fn test_builder_config_then_override() {
        let config = BridgeConfig {
            port: 9191,
            ..Default::default()
        };
        let bridge = BridgeBuilder::new()
            .config(config)
            .command_encoding(PayloadEncoding::StringWrapped)
            .connector(MockConnector::new())
            .build()
            .unwrap();

        assert_eq!(bridge.port(), 9191);
        assert_eq!(
            bridge.codec().config().command_encoding,
            PayloadEncoding::StringWrapped
        );
    }
}
