//! # Polar CLI
//!
//! Command-line operator tool for a robot behind a rosbridge server.
//!
//! ```bash
//! # 配置默认地址
//! polar-cli config set --host 192.168.1.20
//!
//! # 单次移动（内部：连接 -> 发送 -> 等待反馈 -> 断开）
//! polar-cli move --radius 10 --angle 90
//!
//! # 按计划执行
//! polar-cli run --plan plan.toml
//!
//! # 监控反馈
//! polar-cli monitor
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod plan;
mod utils;

use commands::{ConfigCommand, MonitorCommand, MoveCommand, RunCommand};

/// Polar CLI - rosbridge 机器人命令行工具
/// 未设置 `RUST_LOG` 时的日志过滤（CLI 自身的 warn 诊断需要可见）
const DEFAULT_LOG_FILTER: &str = "polar_cli=info,polar_driver=info";

#[derive(Parser, Debug)]
#[command(name = "polar-cli")]
#[command(about = "Command-line operator tool for the polar rosbridge client", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 发送一条极坐标移动指令
    Move {
        #[command(flatten)]
        args: MoveCommand,
    },

    /// 执行自动化计划
    Run {
        #[command(flatten)]
        args: RunCommand,
    },

    /// 监控连接状态和反馈
    Monitor {
        #[command(flatten)]
        args: MonitorCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config(cmd) => cmd.execute().await,

        Commands::Move { args } => args.execute().await,

        Commands::Run { args } => args.execute().await,

        Commands::Monitor { args } => args.execute().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_log_filter() {
        let filter = tracing_subscriber::EnvFilter::try_new(DEFAULT_LOG_FILTER).unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("polar_cli=info"), "{}", rendered);
        assert!(rendered.contains("polar_driver=info"), "{}", rendered);
    }

    #[test]
    fn test_parse_move() {
        let cli = Cli::try_parse_from([
            "polar-cli", "move", "--host", "10.0.0.2", "--radius", "10", "--angle", "-45",
        ])
        .unwrap();
        match cli.command {
            Commands::Move { args } => {
                assert_eq!(args.radius, 10.0);
                assert_eq!(args.angle, -45.0);
                assert_eq!(args.wait_ms, 1000);
                assert_eq!(args.connection.host.as_deref(), Some("10.0.0.2"));
            },
            other => panic!("Expected Move, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_run_with_encoding() {
        let cli = Cli::try_parse_from([
            "polar-cli", "run", "--plan", "plan.toml", "--encoding", "string-wrapped",
        ])
        .unwrap();
        match cli.command {
            Commands::Run { args } => {
                assert_eq!(args.plan, "plan.toml");
                assert_eq!(
                    args.connection.encoding,
                    Some(polar_protocol::PayloadEncoding::StringWrapped)
                );
            },
            other => panic!("Expected Run, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_config_set() {
        let cli = Cli::try_parse_from(["polar-cli", "config", "set", "--port", "9191"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config(ConfigCommand::Set { port: Some(9191), .. })
        ));
    }
}
