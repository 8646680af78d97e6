// konektis_ws_utils/tests/server_transport_integration_test.rs

use futures_util::{SinkExt, StreamExt};
use konektis_models::{ChargingState, ClientMessage, Message};
use konektis_ws_utils::server::transport::{receive_client_message, send_message, ServerTransport, WsStream};
use konektis_ws_utils::WsError;
use log::{info, LevelFilter};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as TungsteniteMessage};

fn init_test_logger() {
    let _ = env_logger::builder().filter_level(LevelFilter::Debug).is_test(true).try_init();
}

/// 启动一个服务端，把每个连接上解码得到的结果 (成功或错误描述) 转发给测试主流程。
async fn start_recording_server() -> (SocketAddr, mpsc::UnboundedReceiver<Result<ClientMessage, String>>, tokio::task::JoinHandle<Result<(), WsError>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("无法绑定到随机端口");
    let addr = listener.local_addr().expect("无法获取本地监听地址");
    let (tx, rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(ServerTransport::serve(listener, move |ws_stream: WsStream, peer_addr: SocketAddr| {
        let tx = tx.clone();
        async move {
            info!("[Test Server] 新连接来自 {}", peer_addr);
            let (mut sink, mut source) = ws_stream.split();
            while let Some(result) = receive_client_message(&mut source).await {
                let is_auth = matches!(result, Ok(ClientMessage::Authenticate { .. }));
                let _ = tx.send(result.map_err(|e| e.to_string()));
                if is_auth {
                    let reply = Message::Authenticated { username: "alice".into() };
                    if send_message(&mut sink, &reply).await.is_err() {
                        break;
                    }
                }
            }
        }
    }));
    (addr, rx, handle)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_server_decodes_commands_and_replies() {
    init_test_logger();
    let (addr, mut rx, server_handle) = start_recording_server().await;

    let (mut client, _response) = connect_async(format!("ws://{}/ws", addr)).await.expect("客户端连接失败");
    client
        .send(TungsteniteMessage::Text(
            r#"{"type":"Authenticate","username":"alice","password":"pw"}"#.to_string(),
        ))
        .await
        .expect("发送认证帧失败");

    let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("等待服务端解码超时")
        .expect("通道意外关闭");
    assert_eq!(
        received,
        Ok(ClientMessage::Authenticate { username: "alice".into(), password: "pw".into() })
    );

    match tokio::time::timeout(Duration::from_secs(5), client.next()).await {
        Ok(Some(Ok(TungsteniteMessage::Text(text)))) => {
            assert_eq!(text, r#"{"type":"Authenticated","username":"alice"}"#);
        }
        other => panic!("客户端未收到 Authenticated 回复: {:?}", other),
    }

    client
        .send(TungsteniteMessage::Text(
            r#"{"type":"SetCharging","chargingState":{"type":"ChargingWithExcessPower"}}"#.to_string(),
        ))
        .await
        .expect("发送充电命令失败");
    let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("等待服务端解码超时")
        .expect("通道意外关闭");
    assert_eq!(
        received,
        Ok(ClientMessage::SetCharging { charging_state: ChargingState::ChargingWithExcessPower })
    );

    let _ = client.close(None).await;
    server_handle.abort();
    let _ = server_handle.await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_server_reports_unknown_and_binary_frames() {
    init_test_logger();
    let (addr, mut rx, server_handle) = start_recording_server().await;

    let (mut client, _response) = connect_async(format!("ws://{}/ws", addr)).await.expect("客户端连接失败");
    client
        .send(TungsteniteMessage::Text(r#"{"type":"Reboot"}"#.to_string()))
        .await
        .expect("发送未知命令失败");
    client
        .send(TungsteniteMessage::Binary(vec![1, 2, 3]))
        .await
        .expect("发送二进制帧失败");

    for expected_fragment in ["解码错误", "非预期的帧"] {
        let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("等待服务端解码超时")
            .expect("通道意外关闭");
        match received {
            Err(details) => assert!(details.contains(expected_fragment), "错误描述 '{}' 不含 '{}'", details, expected_fragment),
            Ok(message) => panic!("预期解码失败，实际得到: {:?}", message),
        }
    }

    let _ = client.close(None).await;
    server_handle.abort();
    let _ = server_handle.await;
}
