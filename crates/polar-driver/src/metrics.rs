//! 连接指标模块
//!
//! 提供零开销的原子计数器，用于观察连接链路的健康状态。
//! 被静默丢弃的操作（例如未连接时发送）在这里留下可观测的痕迹。

use std::sync::atomic::{AtomicU64, Ordering};

/// 桥接连接实时指标
///
/// 所有计数器都使用原子操作，可以在任何线程安全地读取，不会引入锁竞争。
///
/// # 使用示例
///
/// ```rust
/// use polar_driver::BridgeMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = BridgeMetrics::new();
/// metrics.tx_rejected.fetch_add(1, Ordering::Relaxed);
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.tx_rejected, 1);
/// ```
#[derive(Debug, Default)]
pub struct BridgeMetrics {
    /// 发起的连接次数（忽略已连接时的重复 connect）
    pub connect_attempts: AtomicU64,

    /// 收到的消息总数
    pub rx_messages_total: AtomicU64,

    /// 成功解析的反馈数
    pub rx_feedback_valid: AtomicU64,

    /// 解析失败的消息数
    pub rx_parse_errors: AtomicU64,

    /// 写入 socket 的消息总数（含订阅请求）
    pub tx_messages_total: AtomicU64,

    /// 因未连接而被丢弃的发送次数
    pub tx_rejected: AtomicU64,

    /// 传输层错误次数（连接失败、写失败、异常断开）
    pub transport_errors: AtomicU64,

    /// 服务端主动关闭次数
    pub server_closes: AtomicU64,
}

impl BridgeMetrics {
    /// 创建新的指标实例（所有计数器初始化为 0）
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取指标快照
    ///
    /// 使用 `Ordering::Relaxed`，不同计数器之间可能有微小的时间差。
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            rx_messages_total: self.rx_messages_total.load(Ordering::Relaxed),
            rx_feedback_valid: self.rx_feedback_valid.load(Ordering::Relaxed),
            rx_parse_errors: self.rx_parse_errors.load(Ordering::Relaxed),
            tx_messages_total: self.tx_messages_total.load(Ordering::Relaxed),
            tx_rejected: self.tx_rejected.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            server_closes: self.server_closes.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        self.connect_attempts.store(0, Ordering::Relaxed);
        self.rx_messages_total.store(0, Ordering::Relaxed);
        self.rx_feedback_valid.store(0, Ordering::Relaxed);
        self.rx_parse_errors.store(0, Ordering::Relaxed);
        self.tx_messages_total.store(0, Ordering::Relaxed);
        self.tx_rejected.store(0, Ordering::Relaxed);
        self.transport_errors.store(0, Ordering::Relaxed);
        self.server_closes.store(0, Ordering::Relaxed);
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// 指标快照（不可变，用于读取）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub connect_attempts: u64,
    pub rx_messages_total: u64,
    pub rx_feedback_valid: u64,
    pub rx_parse_errors: u64,
    pub tx_messages_total: u64,
    pub tx_rejected: u64,
    pub transport_errors: u64,
    pub server_closes: u64,
}

impl MetricsSnapshot {
    /// 解析失败率（百分比）
    ///
    /// 返回 0.0 到 100.0 之间的值。如果 `rx_messages_total` 为 0，返回 0.0。
    pub fn parse_error_rate(&self) -> f64 {
        if self.rx_messages_total == 0 {
            return 0.0;
        }
        (self.rx_parse_errors as f64 / self.rx_messages_total as f64) * 100.0
    }
}
