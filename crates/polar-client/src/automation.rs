//! 自动化序列
//!
//! 按顺序下发一组移动指令，每条指令发出后等待该步骤的延时再进入下一步。
//!
//! # 设计要点
//!
//! - **互斥运行**：运行标志使用 compare-exchange 获取，两次运行不会重叠；
//!   运行中再次调用返回 [`AutomationError::AlreadyRunning`]，不发送任何指令
//! - **RAII 语义**：运行标志由守卫持有，运行 future 被丢弃（任务取消）时自动复位
//! - **不检查连接**：断开期间的发送由连接层丢弃，序列照常按时推进
//! - **反馈捕获**：每步延时结束后，若期间收到过新反馈，记录到该步骤
//!
//! # 使用示例
//!
//! ```rust,no_run
//! use polar_client::{AutomationRunner, AutomationStep};
//! use polar_driver::BridgeBuilder;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bridge = BridgeBuilder::new().build()?;
//! bridge.connect("192.168.1.20")?;
//!
//! let runner = AutomationRunner::new(bridge);
//! let report = runner
//!     .run(vec![
//!         AutomationStep::new(1, 10.0, 0.0, 1),
//!         AutomationStep::new(2, 20.0, 90.0, 2),
//!     ])
//!     .await?;
//! println!("{} commands in {:?}", report.commands_sent, report.elapsed);
//! # Ok(())
//! # }
//! ```

use polar_driver::{Bridge, DriverError};
use polar_protocol::MoveCommand;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// 步骤延时内未收到反馈时记录的错误
pub const NO_FEEDBACK_ERROR: &str = "no feedback received";

/// 自动化计划中的一步
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationStep {
    /// 序号（计划表中的行号）
    pub sequence_number: i32,
    pub radius: f64,
    pub angle: f64,
    /// 发送后等待的秒数
    pub delay_seconds: u64,
    /// 实际到达的半径（执行后填充）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_radius: Option<f64>,
    /// 实际到达的角度（执行后填充）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AutomationStep {
    pub fn new(sequence_number: i32, radius: f64, angle: f64, delay_seconds: u64) -> Self {
        Self {
            sequence_number,
            radius,
            angle,
            delay_seconds,
            observed_radius: None,
            observed_angle: None,
            error: None,
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_seconds)
    }

    /// 线上指令（单精度）
    pub fn command(&self) -> MoveCommand {
        MoveCommand::new(self.radius as f32, self.angle as f32)
    }
}

/// 自动化错误类型
#[derive(Error, Debug)]
pub enum AutomationError {
    /// 已有序列在运行（本次调用没有任何效果）
    #[error("Automation already running")]
    AlreadyRunning,

    /// 连接层错误（连接管理任务已退出等）
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// 序列被取消
    #[error("Automation cancelled")]
    Cancelled,

    /// 运行任务异常退出
    #[error("Automation task failed: {0}")]
    TaskFailed(String),
}

/// 一次运行的结果
#[derive(Debug, Clone, PartialEq)]
pub struct AutomationReport {
    /// 执行后的步骤（含观测值或错误）
    pub steps: Vec<AutomationStep>,
    /// 提交给连接层的指令数（未连接时提交的指令同样计入）
    pub commands_sent: usize,
    pub elapsed: Duration,
}

impl AutomationReport {
    /// 收到反馈的步骤数
    pub fn observed_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.observed_radius.is_some())
            .count()
    }
}

/// 运行标志守卫
///
/// 持有期间运行标志为 `true`，Drop 时复位。
struct RunningGuard {
    flag: Arc<AtomicBool>,
}

impl RunningGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag: flag.clone() })
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// 自动化序列执行器
///
/// 克隆后共享同一个运行标志。
#[derive(Debug, Clone)]
pub struct AutomationRunner {
    bridge: Bridge,
    running: Arc<AtomicBool>,
}

impl AutomationRunner {
    pub fn new(bridge: Bridge) -> Self {
        Self {
            bridge,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// 执行序列，直到最后一步的延时结束
    ///
    /// # 错误
    /// - `AutomationError::AlreadyRunning`: 已有序列在运行
    /// - `AutomationError::Driver`: 连接管理任务已退出
    pub async fn run(
        &self,
        steps: Vec<AutomationStep>,
    ) -> Result<AutomationReport, AutomationError> {
        let guard = RunningGuard::acquire(&self.running).ok_or(AutomationError::AlreadyRunning)?;
        execute(self.bridge.clone(), steps, guard).await
    }

    /// 在后台任务中执行序列
    ///
    /// 运行标志在返回前已经获取，所以紧随其后的 `run`/`start` 一定会得到
    /// `AlreadyRunning`。
    pub fn start(&self, steps: Vec<AutomationStep>) -> Result<AutomationHandle, AutomationError> {
        let handle = Handle::try_current()
            .map_err(|e| AutomationError::Driver(DriverError::NoRuntime(e.to_string())))?;
        let guard = RunningGuard::acquire(&self.running).ok_or(AutomationError::AlreadyRunning)?;

        let task = handle.spawn(execute(self.bridge.clone(), steps, guard));
        Ok(AutomationHandle { task })
    }
}

/// 后台序列句柄
///
/// 丢弃句柄不会停止序列，需要显式调用 [`cancel`](Self::cancel)。
#[derive(Debug)]
pub struct AutomationHandle {
    task: JoinHandle<Result<AutomationReport, AutomationError>>,
}

impl AutomationHandle {
    /// 取消序列（运行标志随任务退出复位）
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// 等待序列结束
    pub async fn join(self) -> Result<AutomationReport, AutomationError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(AutomationError::Cancelled),
            Err(e) => Err(AutomationError::TaskFailed(e.to_string())),
        }
    }
}

async fn execute(
    bridge: Bridge,
    mut steps: Vec<AutomationStep>,
    _guard: RunningGuard,
) -> Result<AutomationReport, AutomationError> {
    let started = Instant::now();
    let total = steps.len();
    let mut commands_sent = 0;
    info!("Automation started ({} steps)", total);

    for (index, step) in steps.iter_mut().enumerate() {
        let seen = bridge.feedback_state().sequence;
        if !bridge.is_connected() {
            warn!(
                "Automation step #{} sent while disconnected, command will be dropped",
                step.sequence_number
            );
        }

        bridge.send_command(&step.command())?;
        commands_sent += 1;
        debug!(
            "Step {}/{} (#{}): r={} θ={}, waiting {}s",
            index + 1,
            total,
            step.sequence_number,
            step.radius,
            step.angle,
            step.delay_seconds
        );

        tokio::time::sleep(step.delay()).await;

        let state = bridge.feedback_state();
        if state.sequence > seen {
            step.observed_radius = Some(f64::from(state.feedback.moved_radius));
            step.observed_angle = Some(f64::from(state.feedback.moved_angle));
            step.error = None;
        } else {
            step.observed_radius = None;
            step.observed_angle = None;
            step.error = Some(NO_FEEDBACK_ERROR.to_string());
        }
    }

    let elapsed = started.elapsed();
    info!("Automation finished: {} commands in {:?}", commands_sent, elapsed);
    Ok(AutomationReport {
        steps,
        commands_sent,
        elapsed,
    })
}
