//! run 命令
//!
//! 加载自动化计划并按序执行，Ctrl+C 取消

use anyhow::Result;
use clap::Args;
use polar_client::{AutomationError, AutomationReport, AutomationStep};

use super::r#move::ConnectionArgs;
use crate::plan::Plan;
use crate::utils::{connect_client, ctrl_c_signal, wait_for_signal};

/// 计划执行命令参数
#[derive(Args, Debug)]
pub struct RunCommand {
    /// 计划文件路径（.toml / .json）
    #[arg(long)]
    pub plan: String,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl RunCommand {
    /// 执行计划
    pub async fn execute(&self) -> Result<()> {
        println!("📜 加载计划: {}", self.plan);

        let plan = Plan::load(&self.plan)?;
        if let Some(name) = &plan.name {
            println!("📋 计划: {}", name);
        }
        let steps = plan.into_steps()?;
        println!("    {} 个步骤，预计 {} 秒", steps.len(), total_delay(&steps));
        println!();

        let options = self.connection.resolve()?;
        let client = connect_client(&options).await?;
        let mut stop = ctrl_c_signal()?;

        println!("▶️  开始执行（按 Ctrl+C 取消）");

        let result = tokio::select! {
            result = client.run_automation(steps) => result,
            _ = wait_for_signal(&mut stop) => {
                // 运行 future 被丢弃，运行标志随之复位
                Err(AutomationError::Cancelled)
            },
        };

        client.disconnect()?;
        client.bridge().flush().await?;

        match result {
            Ok(report) => {
                print_report(&report);
                Ok(())
            },
            Err(AutomationError::Cancelled) => {
                println!("⏹️  已取消");
                Ok(())
            },
            Err(e) => Err(e.into()),
        }
    }
}

/// 计划总延时（秒），溢出时饱和
fn total_delay(steps: &[AutomationStep]) -> u64 {
    steps
        .iter()
        .map(|s| s.delay_seconds)
        .fold(0u64, u64::saturating_add)
}

fn print_report(report: &AutomationReport) {
    println!();
    println!("📊 执行结果:");
    println!(
        "  {:>4}  {:>10}  {:>10}  {:>10}  {:>10}  {}",
        "序号", "半径", "角度", "实际半径", "实际角度", "备注"
    );
    for step in &report.steps {
        let observed = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{:.3}", v));
        println!(
            "  {:>4}  {:>10.3}  {:>10.3}  {:>10}  {:>10}  {}",
            step.sequence_number,
            step.radius,
            step.angle,
            observed(step.observed_radius),
            observed(step.observed_angle),
            step.error.as_deref().unwrap_or("")
        );
    }
    println!();
    println!("  指令数: {}", report.commands_sent);
    println!("  收到反馈: {}/{}", report.observed_count(), report.steps.len());
    println!("  耗时: {:.2} 秒", report.elapsed.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_delay() {
        let steps = vec![
            AutomationStep::new(1, 10.0, 0.0, 1),
            AutomationStep::new(2, 20.0, 90.0, 2),
        ];
        assert_eq!(total_delay(&steps), 3);
        assert_eq!(total_delay(&[]), 0);
    }

    #[test]
    fn test_total_delay_saturates() {
        let steps: Vec<_> = (1..=3)
            .map(|i| AutomationStep::new(i, 1.0, 0.0, i64::MAX as u64))
            .collect();
        assert_eq!(total_delay(&steps), u64::MAX);
    }
}
