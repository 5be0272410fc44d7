//! WebSocket 端到端集成测试
//!
//! 在本机临时端口启动一个最小的 rosbridge 服务端（tokio-tungstenite），
//! 验证握手、订阅、指令下发、反馈解析和服务端关闭的完整流程。

use futures::{SinkExt, Stream, StreamExt};
use polar_driver::{BridgeBuilder, ConnectionState, DriverError};
use polar_protocol::Feedback;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

const TIMEOUT: Duration = Duration::from_secs(5);

/// 读取下一条文本消息
async fn next_text<S>(stream: &mut S) -> String
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        match tokio::time::timeout(TIMEOUT, stream.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => return text.as_str().to_string(),
            Ok(Some(Ok(_))) => continue,
            other => panic!("Expected text frame, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_end_to_end_over_websocket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (received_tx, received_rx) = oneshot::channel::<Vec<String>>();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        let subscribe = next_text(&mut ws).await;
        let command = next_text(&mut ws).await;

        // 一条非法消息 + 一条 std_msgs/String 包裹的反馈
        ws.send(Message::text("{\"op\":\"status\"}")).await.unwrap();
        ws.send(Message::text(
            r#"{"op":"publish","topic":"/robot_feedback","msg":{"data":"{\"moved_radius\":9.5,\"moved_angle\":89.0,\"error_vector\":0.5}"}}"#,
        ))
        .await
        .unwrap();

        received_tx.send(vec![subscribe, command]).unwrap();

        // 等待客户端确认后由服务端发起关闭
        let _ = next_text(&mut ws).await;
        ws.close(None).await.unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let bridge = BridgeBuilder::new().port(port).build().unwrap();
    bridge.connect_and_wait("127.0.0.1", TIMEOUT).await.unwrap();
    assert_eq!(bridge.connection_state(), ConnectionState::Connected);

    bridge.send_move(10.0, 90.0).unwrap();

    let received = tokio::time::timeout(TIMEOUT, received_rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        received[0],
        r#"{"op":"subscribe","topic":"/robot_feedback","type":"std_msgs/String"}"#
    );
    assert_eq!(
        received[1],
        r#"{"op":"publish","topic":"/polar_move_cmd","type":"my_robot_interfaces/msg/PolarMove","msg":{"radius":10.0,"angle":90.0}}"#
    );

    // 等待反馈到达
    let mut rx = bridge.subscribe();
    tokio::time::timeout(TIMEOUT, async {
        while rx.borrow_and_update().feedback.sequence == 0 {
            rx.changed().await.unwrap();
        }
    })
    .await
    .unwrap();

    assert_eq!(bridge.latest_feedback(), Feedback::new(9.5, 89.0, 0.5));
    assert!(bridge.last_parse_error().is_some());
    assert!(bridge.is_connected());

    // 触发服务端关闭
    bridge.send("{\"op\":\"ack\"}").unwrap();
    tokio::time::timeout(TIMEOUT, async {
        while rx.borrow_and_update().connection.is_connected() {
            rx.changed().await.unwrap();
        }
    })
    .await
    .unwrap();

    let metrics = bridge.metrics();
    assert_eq!(metrics.server_closes, 1);
    assert_eq!(metrics.transport_errors, 0);
    assert_eq!(metrics.rx_feedback_valid, 1);
    assert_eq!(metrics.rx_parse_errors, 1);

    tokio::time::timeout(TIMEOUT, server).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_connect_refused_reports_failure() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let bridge = BridgeBuilder::new()
        .port(port)
        .connect_timeout(Duration::from_secs(2))
        .build()
        .unwrap();

    let err = bridge
        .connect_and_wait("127.0.0.1", TIMEOUT)
        .await
        .unwrap_err();
    assert!(matches!(err, DriverError::ConnectFailed(_)), "got {:?}", err);
    assert_eq!(bridge.connection_state(), ConnectionState::Disconnected);
    assert_eq!(bridge.metrics().transport_errors, 1);

    // 失败后 socket 已释放，可以再次发起连接
    bridge.connect("127.0.0.1").unwrap();
    bridge.flush().await.unwrap();
    assert_eq!(bridge.metrics().connect_attempts, 2);
}

#[tokio::test]
async fn test_user_disconnect_sends_close_frame() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let _subscribe = next_text(&mut ws).await;

        loop {
            match tokio::time::timeout(TIMEOUT, ws.next()).await {
                Ok(Some(Ok(Message::Close(frame)))) => return frame,
                Ok(Some(Ok(_))) => continue,
                other => panic!("Expected close frame, got {:?}", other),
            }
        }
    });

    let bridge = BridgeBuilder::new().port(port).build().unwrap();
    bridge.connect_and_wait("127.0.0.1", TIMEOUT).await.unwrap();
    bridge.disconnect().unwrap();
    bridge.flush().await.unwrap();
    assert!(!bridge.is_connected());

    let frame = tokio::time::timeout(TIMEOUT, server)
        .await
        .unwrap()
        .unwrap()
        .expect("close frame with code");
    assert_eq!(u16::from(frame.code), 1000);
    assert_eq!(frame.reason.as_str(), "User disconnected");
}
