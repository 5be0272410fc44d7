//! 公共工具
//!
//! 连接建立、Ctrl+C 处理和反馈格式化

use anyhow::{Context, Result};
use polar_client::RobotClient;
use polar_driver::{BridgeConfig, FeedbackState};
use polar_protocol::PayloadEncoding;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// 连接参数
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    pub encoding: PayloadEncoding,
    pub timeout: Duration,
}

/// 创建客户端并等待连接建立
pub async fn connect_client(options: &ConnectOptions) -> Result<RobotClient> {
    let mut config = BridgeConfig {
        port: options.port,
        connect_timeout_ms: options.timeout.as_millis() as u64,
        ..Default::default()
    };
    config.codec.command_encoding = options.encoding;

    debug!("Connecting with {:?}", options);
    let client = RobotClient::from_config(config)?;
    println!("🔌 连接到 ws://{}:{} ...", options.host, options.port);
    client
        .connect_and_wait(options.host.as_str(), options.timeout)
        .await
        .with_context(|| format!("连接 {} 失败", options.host))?;
    println!("✅ 已连接");

    Ok(client)
}

/// 安装 Ctrl+C 处理
///
/// 返回的接收端在收到信号后变为 `true`。进程内只能调用一次。
pub fn ctrl_c_signal() -> Result<watch::Receiver<bool>> {
    let (tx, rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        let _ = tx.send(true);
        eprintln!("\n收到退出信号，正在停止...");
    })
    .context("设置 Ctrl+C 处理失败")?;
    Ok(rx)
}

/// 等待 Ctrl+C
pub async fn wait_for_signal(rx: &mut watch::Receiver<bool>) {
    // 发送端随处理函数常驻，wait_for 只会在收到信号后返回
    let _ = rx.wait_for(|stopped| *stopped).await;
}

/// 格式化一条反馈
pub fn format_feedback(state: &FeedbackState) -> String {
    if state.sequence == 0 {
        return "(尚未收到反馈)".to_string();
    }
    format!(
        "#{:<5} r={:>9.3}  θ={:>9.3}  err={:>8.4}",
        state.sequence,
        state.feedback.moved_radius,
        state.feedback.moved_angle,
        state.feedback.error_vector
    )
}
