// konektis_mock_server/src/ws_server/client_session.rs

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use konektis_models::ws_payloads::random_power_usage_update;
use konektis_models::{ChargingState, ClientMessage, Message};
use konektis_ws_utils::server::transport::{receive_client_message, send_message, WsStream};
use log::{debug, info, warn};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::protocol::Message as WsFrame;

use crate::config::ServerConfig;
use crate::error::ServerError;

type SessionSink = SplitSink<WsStream, WsFrame>;
type SessionSource = SplitStream<WsStream>;

/// 单个客户端连接的处理流程。
///
/// 第一条消息必须是 `Authenticate`：凭据正确时回复 `Authenticated` 并开始周期推送，
/// 否则回复 `Unauthorized` 并关闭连接。
pub struct ClientSession {
    peer_addr: SocketAddr,
    config: Arc<ServerConfig>,
    charging_tx: Arc<watch::Sender<ChargingState>>,
}

impl ClientSession {
    pub fn new(peer_addr: SocketAddr, config: Arc<ServerConfig>, charging_tx: Arc<watch::Sender<ChargingState>>) -> Self {
        Self { peer_addr, config, charging_tx }
    }

    pub async fn run(self, ws_stream: WsStream) {
        let (mut sink, mut source) = ws_stream.split();
        match self.serve_connection(&mut sink, &mut source).await {
            Ok(()) => info!("[模拟服务端] 与 {} 的会话结束", self.peer_addr),
            Err(e) => warn!("[模拟服务端] 与 {} 的会话异常结束: {}", self.peer_addr, e),
        }
        let _ = sink.close().await;
    }

    async fn serve_connection(&self, sink: &mut SessionSink, source: &mut SessionSource) -> Result<(), ServerError> {
        let Some(username) = self.authenticate(sink, source).await? else {
            return Ok(());
        };

        let mut ticker = tokio::time::interval(self.config.update_interval());
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    send_message(sink, &random_power_usage_update()).await?;
                }
                received = receive_client_message(source) => match received {
                    Some(Ok(ClientMessage::SetCharging { charging_state })) => {
                        info!("[模拟服务端] 用户 '{}' 设置充电模式: {:?}", username, charging_state);
                        self.charging_tx.send_replace(charging_state);
                    }
                    Some(Ok(ClientMessage::Authenticate { .. })) => {
                        debug!("[模拟服务端] 忽略 {} 已认证后的重复 Authenticate", self.peer_addr);
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(()),
                },
            }
        }
    }

    /// 等待并处理认证。返回 `None` 表示连接在认证完成前结束或认证被拒绝。
    async fn authenticate(&self, sink: &mut SessionSink, source: &mut SessionSource) -> Result<Option<String>, ServerError> {
        loop {
            match receive_client_message(source).await {
                Some(Ok(ClientMessage::Authenticate { username, password })) => {
                    if self.config.check_credentials(&username, &password) {
                        info!("[模拟服务端] {} 以用户 '{}' 认证成功", self.peer_addr, username);
                        send_message(sink, &Message::Authenticated { username: username.clone() }).await?;
                        return Ok(Some(username));
                    }
                    warn!("[模拟服务端] {} 的用户 '{}' 认证失败", self.peer_addr, username);
                    send_message(sink, &Message::Unauthorized { username }).await?;
                    return Ok(None);
                }
                Some(Ok(other)) => {
                    warn!("[模拟服务端] {} 在认证前发送了 {}，忽略", self.peer_addr, other.kind());
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(None),
            }
        }
    }
}
