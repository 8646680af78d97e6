// konektis_mock_server/tests/end_to_end_test.rs

//! 真实客户端对模拟服务端的端到端测试。

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use konektis_client::{ConnectionStatus, WebSocketClientService};
use konektis_mock_server::{MockEnergyServer, ServerConfig};
use konektis_models::{ChargingState, ClientMessage, Device, Message};
use log::LevelFilter;
use tokio::net::TcpListener;
use tokio::time::timeout;

fn init_test_logger() {
    let _ = env_logger::builder().filter_level(LevelFilter::Debug).is_test(true).try_init();
}

async fn start_server() -> (String, Arc<MockEnergyServer>, tokio::task::JoinHandle<()>) {
    let mut users = BTreeMap::new();
    users.insert("alice".to_string(), "secret".to_string());
    let config = ServerConfig { host: "127.0.0.1".into(), port: 0, update_interval_ms: 50, users };

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("无法绑定到随机端口");
    let addr = listener.local_addr().expect("无法获取本地监听地址");
    let server = Arc::new(MockEnergyServer::new(config));
    let serving = server.clone();
    let handle = tokio::spawn(async move {
        let _ = serving.serve(listener).await;
    });
    (format!("ws://{}/ws", addr), server, handle)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_valid_user_receives_power_updates() {
    init_test_logger();
    let (url, _server, handle) = start_server().await;
    let client = WebSocketClientService::with_settings(url, Duration::from_millis(200), 16);
    let mut status_rx = client.connection_status();
    let mut messages = client.messages();

    client.connect("alice", "secret").await;
    timeout(Duration::from_secs(5), status_rx.wait_for(ConnectionStatus::is_connected))
        .await
        .expect("等待连接超时")
        .expect("状态通道已关闭");

    let message = timeout(Duration::from_secs(5), messages.recv())
        .await
        .expect("等待能量数据超时")
        .expect("消息通道异常");
    match &message {
        Message::PowerUsageUpdate { updates } => {
            assert_eq!(updates.len(), Device::ALL.len());
            let solar = message.power_of(Device::Solar).expect("缺少光伏读数");
            assert!(solar <= 0, "光伏只会发电: {}", solar);
        }
        other => panic!("预期 PowerUsageUpdate，实际: {:?}", other),
    }

    client.disconnect().await;
    handle.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_wrong_password_is_unauthorized() {
    init_test_logger();
    let (url, _server, handle) = start_server().await;
    let client = WebSocketClientService::with_settings(url, Duration::from_millis(200), 16);
    let mut status_rx = client.connection_status();

    client.connect("alice", "guess").await;
    timeout(Duration::from_secs(5), status_rx.wait_for(|s| *s == ConnectionStatus::Unauthorized))
        .await
        .expect("等待认证结果超时")
        .expect("状态通道已关闭");
    assert!(!client.is_active().await);
    handle.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_set_charging_updates_server_state() {
    init_test_logger();
    let (url, server, handle) = start_server().await;
    let mut charging_rx = server.charging_state();
    assert_eq!(*charging_rx.borrow_and_update(), ChargingState::NotCharging);

    let client = WebSocketClientService::with_settings(url, Duration::from_millis(200), 16);
    let mut status_rx = client.connection_status();
    client.connect("alice", "secret").await;
    timeout(Duration::from_secs(5), status_rx.wait_for(ConnectionStatus::is_connected))
        .await
        .expect("等待连接超时")
        .expect("状态通道已关闭");

    client
        .send_message(&ClientMessage::SetCharging { charging_state: ChargingState::with_max_power(9000) })
        .await;
    let state = *timeout(Duration::from_secs(5), charging_rx.wait_for(|s| *s != ChargingState::NotCharging))
        .await
        .expect("等待充电状态变化超时")
        .expect("充电状态通道已关闭");
    assert_eq!(state, ChargingState::ChargingWithMaxPower { max_power: 7680 });

    client.disconnect().await;
    handle.abort();
}
