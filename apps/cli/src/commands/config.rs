//! 配置管理命令
//!
//! 用于管理 CLI 默认值（桥接地址、端口、指令编码）

use anyhow::{Context, Result};
use clap::Subcommand;
use polar_driver::DEFAULT_BRIDGE_PORT;
use polar_protocol::PayloadEncoding;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 配置文件路径
fn config_dir() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?;

    path.push("polar-bridge");
    Ok(path)
}

pub fn config_file() -> Result<PathBuf> {
    let mut path = config_dir()?;
    path.push("config.toml");
    Ok(path)
}

/// CLI 配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    /// 默认桥接地址
    pub host: Option<String>,

    /// rosbridge 端口
    pub port: Option<u16>,

    /// 指令负载编码方式
    pub command_encoding: Option<PayloadEncoding>,
}

impl CliConfig {
    /// 加载配置（文件不存在时返回默认配置）
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("读取配置文件失败")?;
        toml::from_str(&content).with_context(|| format!("解析配置文件失败: {}", path.display()))
    }

    /// 保存配置
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_file()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("创建配置目录失败")?;
        }

        let body = toml::to_string_pretty(self).context("序列化配置失败")?;
        let content = format!("# Polar Bridge CLI Configuration\n\n{}", body);
        fs::write(path, content).context("写入配置文件失败")?;

        Ok(())
    }

    /// 命令行参数优先，其次是配置文件
    pub fn resolve_host(&self, host: Option<&str>) -> Result<String> {
        host.map(str::to_string)
            .or_else(|| self.host.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("未指定桥接地址，请使用 --host 或 `polar-cli config set --host`")
            })
    }

    pub fn resolve_port(&self, port: Option<u16>) -> u16 {
        port.or(self.port).unwrap_or(DEFAULT_BRIDGE_PORT)
    }

    pub fn resolve_encoding(&self, encoding: Option<PayloadEncoding>) -> PayloadEncoding {
        encoding.or(self.command_encoding).unwrap_or_default()
    }
}

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 设置配置项
    Set {
        /// 桥接地址（IP 或主机名）
        #[arg(long)]
        host: Option<String>,

        /// rosbridge 端口
        #[arg(short, long)]
        port: Option<u16>,

        /// 指令负载编码（plain / string-wrapped）
        #[arg(short, long)]
        encoding: Option<PayloadEncoding>,
    },

    /// 获取配置项
    Get {
        /// 配置项名称
        #[arg(default_value = "all")]
        key: String,
    },

    /// 检查配置
    Check,
}

impl ConfigCommand {
    pub async fn execute(self) -> Result<()> {
        match self {
            ConfigCommand::Set {
                host,
                port,
                encoding,
            } => Self::set_(host, port, encoding).await,

            ConfigCommand::Get { key } => Self::get_(key).await,

            ConfigCommand::Check => Self::check_().await,
        }
    }

    async fn set_(
        host: Option<String>,
        port: Option<u16>,
        encoding: Option<PayloadEncoding>,
    ) -> Result<()> {
        let mut config = CliConfig::load()?;

        if let Some(host) = host {
            println!("✅ 设置默认地址: {}", host);
            config.host = Some(host);
        }

        if let Some(port) = port {
            config.port = Some(port);
            println!("✅ 设置端口: {}", port);
        }

        if let Some(encoding) = encoding {
            config.command_encoding = Some(encoding);
            println!("✅ 设置指令编码: {:?}", encoding);
        }

        config.save()?;
        Ok(())
    }

    async fn get_(key: String) -> Result<()> {
        let config = CliConfig::load()?;

        match key.as_str() {
            "host" => match config.host {
                Some(host) => println!("{}", host),
                None => println!("(未设置)"),
            },

            "port" => println!("{}", config.resolve_port(None)),

            "encoding" | "command_encoding" => println!("{:?}", config.resolve_encoding(None)),

            _ => {
                println!("Polar CLI 配置:");
                println!("  地址: {:?}", config.host);
                println!("  端口: {}", config.resolve_port(None));
                println!("  指令编码: {:?}", config.resolve_encoding(None));
            },
        }

        Ok(())
    }

    async fn check_() -> Result<()> {
        let path = config_file()?;
        let config = CliConfig::load_from(&path)?;

        println!("配置文件: {}", path.display());
        if !path.exists() {
            println!("  (文件不存在，使用默认值)");
        }
        println!("  地址: {:?}", config.host);
        println!("  端口: {}", config.resolve_port(None));
        println!("  指令编码: {:?}", config.resolve_encoding(None));

        if config.host.is_none() {
            println!("⚠️  未设置默认地址，运行命令时需要 --host");
        }

        Ok(())
    }
}
