//! 移动命令
//!
//! 连接 → 发送一条极坐标移动指令 → 等待反馈 → 断开

use anyhow::{Context, Result};
use clap::Args;
use polar_protocol::PayloadEncoding;
use std::time::Duration;
use tracing::warn;

use super::config::CliConfig;
use crate::utils::{ConnectOptions, connect_client, format_feedback};

/// 移动命令参数
#[derive(Args, Debug)]
pub struct MoveCommand {
    /// 目标半径
    #[arg(short, long, allow_negative_numbers = true)]
    pub radius: f64,

    /// 目标角度
    #[arg(short, long, allow_negative_numbers = true)]
    pub angle: f64,

    /// 等待反馈的时间（毫秒）
    #[arg(long, default_value_t = 1000)]
    pub wait_ms: u64,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

/// 连接参数（覆盖配置文件）
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// 桥接地址（IP 或主机名）
    #[arg(long)]
    pub host: Option<String>,

    /// rosbridge 端口
    #[arg(short, long)]
    pub port: Option<u16>,

    /// 指令负载编码（plain / string-wrapped）
    #[arg(short, long)]
    pub encoding: Option<PayloadEncoding>,

    /// 连接超时（毫秒）
    #[arg(long, default_value_t = 5000)]
    pub timeout_ms: u64,
}

impl ConnectionArgs {
    /// 与配置文件合并
    pub fn resolve(&self) -> Result<ConnectOptions> {
        let config = CliConfig::load()?;
        self.resolve_with(&config)
    }

    pub fn resolve_with(&self, config: &CliConfig) -> Result<ConnectOptions> {
        Ok(ConnectOptions {
            host: config.resolve_host(self.host.as_deref())?,
            port: config.resolve_port(self.port),
            encoding: config.resolve_encoding(self.encoding),
            timeout: Duration::from_millis(self.timeout_ms),
        })
    }
}

impl MoveCommand {
    pub async fn execute(&self) -> Result<()> {
        if !self.radius.is_finite() || !self.angle.is_finite() {
            anyhow::bail!("半径和角度必须是有限数值");
        }

        let options = self.connection.resolve()?;
        let client = connect_client(&options).await?;
        let before = client.bridge().feedback_state().sequence;

        println!("🎯 发送移动指令: r={} θ={}", self.radius, self.angle);
        client.send_move(self.radius, self.angle)?;

        tokio::time::sleep(Duration::from_millis(self.wait_ms)).await;

        let state = client.bridge().feedback_state();
        if state.sequence > before {
            println!("📍 反馈: {}", format_feedback(&state));
        } else {
            warn!("No feedback received within {} ms", self.wait_ms);
        }

        client.disconnect()?;
        client.bridge().flush().await.context("断开连接失败")?;
        println!("👋 已断开");

        Ok(())
    }
}
