//! 操作员接口
//!
//! [`RobotClient`] 把连接管理和自动化序列组合成一个对象，供界面层或 CLI 使用。
//! 丢弃时自动断开连接。

use crate::automation::{AutomationError, AutomationHandle, AutomationReport, AutomationRunner, AutomationStep};
use polar_driver::{
    Bridge, BridgeBuilder, BridgeConfig, BridgeSnapshot, ConnectionState, DriverError, MetricsSnapshot,
};
use polar_protocol::Feedback;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// 机器人客户端
///
/// # Example
///
/// ```rust,no_run
/// use polar_client::{AutomationStep, RobotClient};
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = RobotClient::new()?;
/// client.connect_and_wait("192.168.1.20", Duration::from_secs(3)).await?;
///
/// client.send_move(10.0, 90.0)?;
/// client
///     .run_automation(vec![AutomationStep::new(1, 15.0, 45.0, 2)])
///     .await?;
/// println!("{:?}", client.latest_feedback());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RobotClient {
    bridge: Bridge,
    runner: AutomationRunner,
}

impl RobotClient {
    /// 使用默认配置创建（需要在 tokio 运行时中调用）
    pub fn new() -> Result<Self, DriverError> {
        Ok(Self::with_bridge(BridgeBuilder::new().build()?))
    }

    pub fn from_config(config: BridgeConfig) -> Result<Self, DriverError> {
        Ok(Self::with_bridge(BridgeBuilder::new().config(config).build()?))
    }

    /// 使用已构造的 `Bridge`（测试时注入 mock 传输）
    pub fn with_bridge(bridge: Bridge) -> Self {
        let runner = AutomationRunner::new(bridge.clone());
        Self { bridge, runner }
    }

    pub fn connect(&self, address: impl Into<String>) -> Result<(), DriverError> {
        self.bridge.connect(address)
    }

    pub async fn connect_and_wait(
        &self,
        address: impl Into<String>,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        self.bridge.connect_and_wait(address, timeout).await
    }

    /// 断开连接（运行中的序列继续按时推进，但指令会被丢弃）
    pub fn disconnect(&self) -> Result<(), DriverError> {
        self.bridge.disconnect()
    }

    pub fn send_move(&self, radius: f64, angle: f64) -> Result<(), DriverError> {
        self.bridge.send_move(radius as f32, angle as f32)
    }

    pub async fn run_automation(
        &self,
        steps: Vec<AutomationStep>,
    ) -> Result<AutomationReport, AutomationError> {
        self.runner.run(steps).await
    }

    pub fn start_automation(
        &self,
        steps: Vec<AutomationStep>,
    ) -> Result<AutomationHandle, AutomationError> {
        self.runner.start(steps)
    }

    pub fn is_automating(&self) -> bool {
        self.runner.is_running()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.bridge.connection_state()
    }

    pub fn latest_feedback(&self) -> Feedback {
        self.bridge.latest_feedback()
    }

    pub fn snapshot(&self) -> BridgeSnapshot {
        self.bridge.snapshot()
    }

    /// 订阅状态快照
    pub fn subscribe(&self) -> watch::Receiver<BridgeSnapshot> {
        self.bridge.subscribe()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.bridge.metrics()
    }

    /// 底层连接句柄
    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }
}

impl Drop for RobotClient {
    fn drop(&mut self) {
        // 连接管理任务可能已退出
        if self.bridge.disconnect().is_err() {
            debug!("Bridge already shut down when dropping RobotClient");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polar_driver::mock::MockConnector;
    use polar_driver::{CLOSE_NORMAL, USER_DISCONNECT_REASON};

    fn mock_client() -> (RobotClient, MockConnector) {
        let connector = MockConnector::new();
        let bridge = BridgeBuilder::new().connector(connector.clone()).build().unwrap();
        (RobotClient::with_bridge(bridge), connector)
    }

    #[tokio::test]
    async fn test_client_connect_and_send() {
        let (client, connector) = mock_client();
        client.connect("10.0.0.2").unwrap();
        client.bridge().flush().await.unwrap();
        connector.last_socket().unwrap().open();

        client.bridge().wait_for_connection(Duration::from_secs(1)).await.unwrap();
        assert_eq!(client.connection_state(), ConnectionState::Connected);

        client.send_move(12.5, 30.0).unwrap();
        client.bridge().flush().await.unwrap();
        let texts = connector.last_socket().unwrap().sent_texts();
        assert!(texts[1].contains(r#""msg":{"radius":12.5,"angle":30.0}"#));
    }

    #[tokio::test]
    async fn test_client_observes_feedback() {
        let (client, connector) = mock_client();
        let mut rx = client.subscribe();
        client.connect("10.0.0.2").unwrap();
        client.bridge().flush().await.unwrap();
        let socket = connector.last_socket().unwrap();
        socket.open();
        socket.receive(
            r#"{"op":"publish","topic":"/robot_feedback","msg":{"moved_radius":1.5,"moved_angle":2.5,"error_vector":0.25}}"#,
        );
        client.bridge().flush().await.unwrap();

        assert_eq!(client.latest_feedback(), Feedback::new(1.5, 2.5, 0.25));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().feedback.sequence, 1);
    }

    #[tokio::test]
    async fn test_drop_disconnects() {
        let (client, connector) = mock_client();
        let bridge = client.bridge().clone();
        client.connect("10.0.0.2").unwrap();
        bridge.flush().await.unwrap();
        connector.last_socket().unwrap().open();
        bridge.flush().await.unwrap();
        assert!(bridge.is_connected());

        drop(client);
        bridge.flush().await.unwrap();
        assert!(!bridge.is_connected());
        assert_eq!(
            connector.last_socket().unwrap().close_frame(),
            Some((CLOSE_NORMAL, USER_DISCONNECT_REASON.to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_mid_automation() {
        let (client, connector) = mock_client();
        client.connect("10.0.0.2").unwrap();
        client.bridge().flush().await.unwrap();
        let socket = connector.last_socket().unwrap();
        socket.open();

        let handle = client
            .start_automation(vec![
                AutomationStep::new(1, 10.0, 0.0, 1),
                AutomationStep::new(2, 20.0, 90.0, 1),
            ])
            .unwrap();
        assert!(client.is_automating());

        tokio::time::sleep(Duration::from_millis(500)).await;
        client.disconnect().unwrap();

        let report = handle.join().await.unwrap();
        assert_eq!(report.commands_sent, 2);
        assert!(!client.is_automating());
        assert_eq!(client.metrics().tx_rejected, 1);
        // 订阅 + 第一步
        assert_eq!(socket.sent_texts().len(), 2);
    }
}
