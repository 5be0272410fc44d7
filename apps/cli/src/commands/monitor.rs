//! monitor 命令
//!
//! 持续打印连接状态和反馈快照，直到 Ctrl+C

use anyhow::Result;
use clap::Args;
use polar_driver::{BridgeSnapshot, ConnectionState};

use super::r#move::ConnectionArgs;
use crate::utils::{connect_client, ctrl_c_signal, format_feedback, wait_for_signal};

/// 监控命令参数
#[derive(Args, Debug)]
pub struct MonitorCommand {
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl MonitorCommand {
    pub async fn execute(&self) -> Result<()> {
        let options = self.connection.resolve()?;
        let client = connect_client(&options).await?;
        let mut stop = ctrl_c_signal()?;
        let mut rx = client.subscribe();

        println!("📊 监控中（按 Ctrl+C 停止）\n");

        let mut last = rx.borrow_and_update().clone();
        print_snapshot(&last, None);

        loop {
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = rx.borrow_and_update().clone();
                    print_snapshot(&snapshot, Some(&last));
                    let disconnected = snapshot.connection == ConnectionState::Disconnected;
                    last = snapshot;

                    if disconnected {
                        println!("🔌 连接已断开");
                        break;
                    }
                },
                _ = wait_for_signal(&mut stop) => break,
            }
        }

        let metrics = client.metrics();
        println!();
        println!("📈 统计:");
        println!("  收到消息: {}", metrics.rx_messages_total);
        println!("  有效反馈: {}", metrics.rx_feedback_valid);
        println!(
            "  解析错误: {} ({:.1}%)",
            metrics.rx_parse_errors,
            metrics.parse_error_rate()
        );

        client.disconnect()?;
        client.bridge().flush().await?;
        Ok(())
    }
}

/// 只打印发生变化的部分
fn print_snapshot(snapshot: &BridgeSnapshot, previous: Option<&BridgeSnapshot>) {
    if previous.is_none_or(|p| p.connection != snapshot.connection) {
        println!("[{}]", snapshot.connection);
    }

    if previous.is_none_or(|p| p.feedback.sequence != snapshot.feedback.sequence) {
        println!("  {}", format_feedback(&snapshot.feedback));
    }

    if let Some(report) = &snapshot.last_parse_error
        && previous.is_none_or(|p| p.last_parse_error.as_ref().map(|r| r.count) != Some(report.count))
    {
        println!("  ⚠️  解析错误 #{}: {}", report.count, report.message);
    }

    if let Some(err) = &snapshot.last_transport_error
        && previous.is_none_or(|p| p.last_transport_error.as_ref() != Some(err))
    {
        println!("  ❌ 传输错误: {}", err);
    }
}
