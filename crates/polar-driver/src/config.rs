//! 连接配置
//!
//! 可以从 TOML 文件加载：
//!
//! ```toml
//! port = 9090
//! connect_timeout_ms = 3000
//!
//! [codec]
//! command_topic = "/polar_move_cmd"
//! command_encoding = "string-wrapped"
//! ```

use crate::error::DriverError;
use polar_protocol::CodecConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// rosbridge 默认端口
pub const DEFAULT_BRIDGE_PORT: u16 = 9090;

/// 桥接连接配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// rosbridge 端口
    pub port: u16,
    /// 握手超时（毫秒）
    pub connect_timeout_ms: u64,
    /// 编解码配置
    pub codec: CodecConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_BRIDGE_PORT,
            connect_timeout_ms: 5000,
            codec: CodecConfig::default(),
        }
    }
}

impl BridgeConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, DriverError> {
        toml::from_str(content).map_err(|e| DriverError::Config(e.to_string()))
    }

    /// 从文件加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DriverError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| DriverError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
