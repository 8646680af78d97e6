// konektis_mock_server/src/ws_server/service.rs

//! 模拟服务端的监听入口。

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use konektis_models::ChargingState;
use konektis_ws_utils::server::transport::{ServerTransport, WsStream};
use log::info;
use tokio::net::TcpListener;
use tokio::sync::watch;

use super::client_session::ClientSession;
use crate::config::ServerConfig;
use crate::error::ServerError;

/// 模拟的家庭能源服务端。
///
/// 所有连接共享同一个充电状态，最近一次 `SetCharging` 命令会覆盖它。
pub struct MockEnergyServer {
    config: Arc<ServerConfig>,
    charging_tx: Arc<watch::Sender<ChargingState>>,
}

impl MockEnergyServer {
    /// # 参数
    /// * `config` - 监听地址、推送间隔和用户表。
    pub fn new(config: ServerConfig) -> Self {
        let (charging_tx, _) = watch::channel(ChargingState::NotCharging);
        Self { config: Arc::new(config), charging_tx: Arc::new(charging_tx) }
    }

    /// 订阅当前充电状态。
    pub fn charging_state(&self) -> watch::Receiver<ChargingState> {
        self.charging_tx.subscribe()
    }

    /// 绑定配置中的地址并开始服务，直到任务被中止。
    ///
    /// # 返回
    /// 地址无效或绑定失败时返回 `ServerError`。
    pub async fn start(&self) -> Result<(), ServerError> {
        let addr = self.config.socket_addr()?;
        self.log_listening(addr);
        ServerTransport::start(addr, self.connection_handler()).await?;
        Ok(())
    }

    /// 在已绑定的监听器上服务，直到任务被中止。
    ///
    /// # 参数
    /// * `listener` - 调用方已绑定的监听器，测试中通常绑定到随机端口。
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        if let Ok(addr) = listener.local_addr() {
            self.log_listening(addr);
        }
        ServerTransport::serve(listener, self.connection_handler()).await?;
        Ok(())
    }

    /// 为每个握手成功的连接创建一个 `ClientSession`。
    fn connection_handler(
        &self,
    ) -> impl Fn(WsStream, SocketAddr) -> BoxFuture<'static, ()> + Send + Sync + Clone + 'static {
        let config = self.config.clone();
        let charging_tx = self.charging_tx.clone();
        move |ws_stream: WsStream, peer_addr: SocketAddr| {
            ClientSession::new(peer_addr, config.clone(), charging_tx.clone()).run(ws_stream).boxed()
        }
    }

    fn log_listening(&self, addr: SocketAddr) {
        info!(
            "[模拟服务端] 正在监听 ws://{}，已配置 {} 个用户，推送间隔 {:?}",
            addr,
            self.config.users.len(),
            self.config.update_interval()
        );
    }
}
