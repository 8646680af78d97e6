// konektis_client/src/ws_client/service.rs

//! Konektis 客户端的 WebSocket 连接服务。
//!
//! `WebSocketClientService` 管理与家庭能源服务端之间的单个逻辑会话：建立连接、认证、
//! 接收消息、在传输错误后按固定间隔重连，以及在调用方请求时断开。
//! 所有网络 I/O 都在每个会话唯一的后台任务 (`ConnectionLoop`) 中进行；
//! 对外只暴露两个并发安全的发布通道：状态 (`watch`，新订阅者立即看到当前值)
//! 和消息 (`broadcast`，不缓存历史消息)。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use konektis_models::{ClientMessage, Message};
use konektis_ws_utils::client::transport::{
    close_sender, connect_client, receive_message, send_client_message, ClientConnection, ClientWsSink,
    ClientWsSource,
};
use konektis_ws_utils::WsError;
use log::{debug, error, info, warn};
use tokio::sync::Mutex as TokioMutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::status::ConnectionStatus;
use crate::config::ClientConfig;
use crate::credentials::Credentials;

/// 关闭一个会话时等待发送端锁与 Close 帧发出的最长时间。
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);
/// 单条命令写入连接的最长时间。对端停止读取时，发送在此之后放弃。
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// 一个传输会话的发送端，以及该传输会话关闭时被取消的令牌。
///
/// 令牌与发送端放在一起，正在等待写入的 `send_message` 可以在会话关闭时立即放弃，
/// 从而释放发送端锁。
struct ActiveSink {
    sink: ClientWsSink,
    closed: CancellationToken,
}

/// 当前会话的发送端。`None` 表示没有可写的会话。
type SharedSink = Arc<TokioMutex<Option<ActiveSink>>>;

/// 一次 `connect` 所建立的逻辑会话。
struct ConnectionSession {
    credentials: Credentials,
    cancel_token: CancellationToken,
    task_handle: JoinHandle<()>,
}

/// 单个传输会话的结束原因。
#[derive(Debug)]
enum SessionEnd {
    /// 服务端拒绝了凭据。
    Rejected(String),
    /// 服务端违反了协议，或本地无法继续 (例如 URL 无效)。不重试。
    Fatal(String),
    /// 网络层面的故障，等待固定间隔后重连。
    Transient(String),
}

/// WebSocket 客户端服务。
///
/// 同一实例任意时刻最多只有一个存活的后台任务和一个打开的传输会话。
pub struct WebSocketClientService {
    /// 服务端 WebSocket 地址。
    server_url: String,
    /// 传输错误后的固定重连间隔。
    reconnect_delay: Duration,
    /// 连接状态的发布端，新订阅者立即看到当前值。
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
    /// 认证之后收到的服务端消息的广播端。
    message_tx: broadcast::Sender<Message>,
    /// 发送端单独加锁，`send_message` 的并发调用在这里串行化。
    ws_send_channel: SharedSink,
    /// 后台任务处于重连等待中时为 `true`。在发布对应的 `Error` 状态之前设置。
    reconnect_pending: Arc<AtomicBool>,
    /// 当前逻辑会话。`disconnect` 时被取出。
    session: TokioMutex<Option<ConnectionSession>>,
}

impl WebSocketClientService {
    /// 根据客户端配置创建服务。
    ///
    /// # 参数
    /// * `config` - 提供服务端地址、重连间隔与消息通道容量。
    pub fn new(config: &ClientConfig) -> Self {
        Self::with_settings(config.server_url.clone(), config.reconnect_delay(), config.message_channel_capacity)
    }

    /// 以显式参数创建服务，测试中常用较短的 `reconnect_delay`。
    ///
    /// # 参数
    /// * `server_url` - 服务端 WebSocket 地址 (`ws://` 或 `wss://`)。
    /// * `reconnect_delay` - 传输错误后到下一次连接尝试之间的等待时间。
    /// * `message_channel_capacity` - 每个消息订阅者可缓存的未读消息数，为 0 时按 1 处理。
    pub fn with_settings(server_url: impl Into<String>, reconnect_delay: Duration, message_channel_capacity: usize) -> Self {
        let server_url = server_url.into();
        info!("[WsClient] 初始化 WebSocketClientService，服务端地址: {}", server_url);
        let (status_tx, _) = watch::channel(ConnectionStatus::Idle);
        let (message_tx, _) = broadcast::channel(message_channel_capacity.max(1));
        Self {
            server_url,
            reconnect_delay,
            status_tx: Arc::new(status_tx),
            message_tx,
            ws_send_channel: Arc::new(TokioMutex::new(None)),
            reconnect_pending: Arc::new(AtomicBool::new(false)),
            session: TokioMutex::new(None),
        }
    }

    /// 使用给定凭据开始一个逻辑会话。
    ///
    /// 如果已有存活的后台任务 (包括正处于重连等待中的任务)，此调用不做任何事。
    /// 否则把状态置为 `Idle`，并启动一个负责连接、认证、读取与重连的后台任务。
    ///
    /// # 参数
    /// * `username` / `password` - 本次逻辑会话使用的凭据，在 `disconnect` 时清除。
    ///
    /// # 返回
    /// 启动了新的后台任务时返回 `true`，已有任务在运行时返回 `false`。
    pub async fn connect(&self, username: &str, password: &str) -> bool {
        let mut session = self.session.lock().await;
        if let Some(active) = session.as_ref() {
            if !active.task_handle.is_finished() {
                debug!("[WsClient] 用户 '{}' 的连接任务仍在运行，忽略重复的 connect 调用", active.credentials.username);
                return false;
            }
        }

        let credentials = Credentials::new(username, password);
        let cancel_token = CancellationToken::new();
        self.reconnect_pending.store(false, Ordering::SeqCst);
        self.status_tx.send_replace(ConnectionStatus::Idle);

        let connection_loop = ConnectionLoop {
            server_url: self.server_url.clone(),
            reconnect_delay: self.reconnect_delay,
            credentials: credentials.clone(),
            status_tx: self.status_tx.clone(),
            message_tx: self.message_tx.clone(),
            ws_send_channel: self.ws_send_channel.clone(),
            reconnect_pending: self.reconnect_pending.clone(),
            cancel_token: cancel_token.clone(),
        };
        let task_handle = tokio::spawn(connection_loop.run());
        info!("[WsClient] 已为用户 '{}' 启动连接任务", username);

        *session = Some(ConnectionSession { credentials, cancel_token, task_handle });
        true
    }

    /// 向当前会话发送一条命令。
    ///
    /// 发送是尽力而为的：没有可写会话、发送失败、超过 `SEND_TIMEOUT` 仍未写完，
    /// 或会话在写入期间被关闭时，只记录警告，不向调用方返回错误。
    /// 并发调用在发送端锁上排队，同一时刻只有一个写入者。
    ///
    /// # 参数
    /// * `message` - 要发送的客户端命令。日志中只记录其类型。
    pub async fn send_message(&self, message: &ClientMessage) {
        let mut sink_guard = self.ws_send_channel.lock().await;
        let Some(ActiveSink { sink, closed }) = sink_guard.as_mut().filter(|active| !active.closed.is_cancelled()) else {
            warn!("[WsClient] 当前没有活动的连接，丢弃 {} 消息", message.kind());
            return;
        };

        tokio::select! {
            biased;
            _ = closed.cancelled() => {
                warn!("[WsClient] 发送 {} 消息期间会话已关闭，放弃发送", message.kind());
            }
            result = tokio::time::timeout(SEND_TIMEOUT, send_client_message(sink, message)) => match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("[WsClient] 发送 {} 消息失败: {}", message.kind(), e),
                Err(_) => warn!("[WsClient] 发送 {} 消息超时 ({:?})，对端可能已停止读取", message.kind(), SEND_TIMEOUT),
            },
        }
    }

    /// 结束当前逻辑会话：取消后台任务并等待其退出，清除凭据，关闭会话，状态置为 `Idle`。
    ///
    /// 取消会立即打断读循环、重连等待以及正在写入的 `send_message`，因此此调用很快返回。
    /// 没有活动会话时调用也是安全的。
    pub async fn disconnect(&self) {
        let mut session = self.session.lock().await;
        if let Some(active) = session.take() {
            info!("[WsClient] 正在断开用户 '{}' 的连接", active.credentials.username);
            active.cancel_token.cancel();
            if let Err(e) = active.task_handle.await {
                if e.is_panic() {
                    error!("[WsClient] 连接任务异常退出: {}", e);
                }
            }
        }
        close_shared_sink(&self.ws_send_channel).await;
        self.reconnect_pending.store(false, Ordering::SeqCst);
        self.status_tx.send_replace(ConnectionStatus::Idle);
    }

    /// 订阅连接状态。返回的接收端立即持有当前状态。
    pub fn connection_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    /// 当前连接状态的快照。
    pub fn status(&self) -> ConnectionStatus {
        self.status_tx.borrow().clone()
    }

    /// 订阅认证之后收到的服务端消息。订阅之前的消息不会补发。
    ///
    /// # 返回
    /// 一个独立的广播接收端。读取过慢时最旧的消息被丢弃，`recv` 返回 `Lagged`。
    pub fn messages(&self) -> broadcast::Receiver<Message> {
        self.message_tx.subscribe()
    }

    /// 后台任务是否仍在运行 (连接中、已连接或等待重连)。
    pub async fn is_active(&self) -> bool {
        self.session.lock().await.as_ref().map_or(false, |s| !s.task_handle.is_finished())
    }

    /// 后台任务是否正在等待重连。
    ///
    /// 观察到 `ConnectionStatus::Error` 的订阅者可以用它区分两种情况：
    /// 返回 `true` 表示暂时性故障，稍后会自动重连；返回 `false` 表示会话已终止。
    /// 该标志在对应的 `Error` 状态发布之前设置，读取它不需要等待。
    pub fn is_reconnect_pending(&self) -> bool {
        self.reconnect_pending.load(Ordering::SeqCst)
    }

    /// 当前逻辑会话的用户名，没有会话时返回 `None`。
    pub async fn current_username(&self) -> Option<String> {
        self.session.lock().await.as_ref().map(|s| s.credentials.username.clone())
    }

    /// 构造时给定的服务端地址。
    pub fn server_url(&self) -> &str {
        &self.server_url
    }
}

impl Drop for WebSocketClientService {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.cancel_token.cancel();
        }
    }
}

/// 取出并关闭共享的发送端 (如果有)。
///
/// 获取锁与发送 Close 帧都受 `CLOSE_TIMEOUT` 限制；超时后直接放弃，连接随发送端一起被丢弃。
async fn close_shared_sink(ws_send_channel: &SharedSink) {
    let taken = match tokio::time::timeout(CLOSE_TIMEOUT, ws_send_channel.lock()).await {
        Ok(mut guard) => guard.take(),
        Err(_) => {
            warn!("[WsClient] 等待发送端锁超时，跳过关闭握手");
            return;
        }
    };
    if let Some(mut active) = taken {
        active.closed.cancel();
        if tokio::time::timeout(CLOSE_TIMEOUT, close_sender(&mut active.sink)).await.is_err() {
            debug!("[WsClient] 关闭会话超时，直接丢弃连接");
        }
    }
}

/// 后台连接任务：连接、认证、读循环，并在传输错误后重连，直到被取消或遇到终止性结果。
struct ConnectionLoop {
    server_url: String,
    reconnect_delay: Duration,
    credentials: Credentials,
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
    message_tx: broadcast::Sender<Message>,
    ws_send_channel: SharedSink,
    reconnect_pending: Arc<AtomicBool>,
    cancel_token: CancellationToken,
}

impl ConnectionLoop {
    async fn run(self) {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            debug!("[WsClient] 第 {} 次连接尝试: {}", attempt, self.server_url);

            // 每个传输会话一个子令牌：会话结束或整个任务被取消时都会被取消。
            let transport_token = self.cancel_token.child_token();
            let end = tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => None,
                end = self.run_session(&transport_token) => Some(end),
            };
            transport_token.cancel();
            close_shared_sink(&self.ws_send_channel).await;

            // 取消后不再修改状态，最终状态由 disconnect 设置。
            let end = match end {
                Some(end) if !self.cancel_token.is_cancelled() => end,
                _ => {
                    info!("[WsClient] 连接任务已取消");
                    return;
                }
            };

            match end {
                SessionEnd::Rejected(username) => {
                    warn!("[WsClient] 服务端拒绝了用户 '{}' 的凭据，不再重试", username);
                    self.status_tx.send_replace(ConnectionStatus::Unauthorized);
                    return;
                }
                SessionEnd::Fatal(reason) => {
                    error!("[WsClient] 会话因协议错误终止，不再重试: {}", reason);
                    self.status_tx.send_replace(ConnectionStatus::Error(reason));
                    return;
                }
                SessionEnd::Transient(reason) => {
                    warn!("[WsClient] 连接中断: {}。{:?} 后重连", reason, self.reconnect_delay);
                    self.reconnect_pending.store(true, Ordering::SeqCst);
                    self.status_tx.send_replace(ConnectionStatus::Error(reason));
                    let cancelled = tokio::select! {
                        biased;
                        _ = self.cancel_token.cancelled() => true,
                        _ = tokio::time::sleep(self.reconnect_delay) => false,
                    };
                    self.reconnect_pending.store(false, Ordering::SeqCst);
                    if cancelled {
                        info!("[WsClient] 重连等待期间连接任务被取消");
                        return;
                    }
                }
            }
        }
    }

    /// 一次完整的传输会话：连接、发送认证、读循环。
    async fn run_session(&self, transport_token: &CancellationToken) -> SessionEnd {
        let ClientConnection { mut ws_sender, mut ws_receiver } = match connect_client(&self.server_url).await {
            Ok(connection) => connection,
            Err(e) => return classify_error(e),
        };

        let authenticate = ClientMessage::Authenticate {
            username: self.credentials.username.clone(),
            password: self.credentials.password.clone(),
        };
        let auth_result = send_client_message(&mut ws_sender, &authenticate).await;
        *self.ws_send_channel.lock().await = Some(ActiveSink { sink: ws_sender, closed: transport_token.clone() });
        if let Err(e) = auth_result {
            return classify_error(e);
        }

        self.read_loop(&mut ws_receiver).await
    }

    async fn read_loop(&self, ws_receiver: &mut ClientWsSource) -> SessionEnd {
        let mut authenticated = false;
        loop {
            let message = match receive_message(ws_receiver).await {
                Some(Ok(message)) => message,
                Some(Err(e)) => return classify_error(e),
                None => return SessionEnd::Transient("连接已被服务端关闭".to_string()),
            };

            match message {
                Message::Authenticated { username } => {
                    if authenticated {
                        debug!("[WsClient] 忽略重复的 Authenticated 消息 (用户 '{}')", username);
                    } else {
                        authenticated = true;
                        info!("[WsClient] 用户 '{}' 认证成功", username);
                        self.status_tx.send_replace(ConnectionStatus::Connected);
                    }
                }
                Message::Unauthorized { username } => return SessionEnd::Rejected(username),
                other if !authenticated => {
                    return SessionEnd::Fatal(format!("认证完成前收到 {} 消息", other.kind()));
                }
                other => {
                    // 没有订阅者时发送失败，消息直接丢弃。
                    let _ = self.message_tx.send(other);
                }
            }
        }
    }
}

fn classify_error(e: WsError) -> SessionEnd {
    if e.is_transient() {
        SessionEnd::Transient(e.to_string())
    } else {
        SessionEnd::Fatal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn test_service(url: &str) -> WebSocketClientService {
        WebSocketClientService::with_settings(url, Duration::from_millis(100), 8)
    }

    #[tokio::test]
    async fn test_send_without_session_is_dropped() {
        let service = test_service("ws://127.0.0.1:1/ws");
        let send = service.send_message(&ClientMessage::SetCharging {
            charging_state: konektis_models::ChargingState::NotCharging,
        });
        tokio::time::timeout(Duration::from_secs(1), send).await.expect("无会话时发送不应阻塞");
        assert_eq!(service.status(), ConnectionStatus::Idle);
    }

    #[tokio::test]
    async fn test_disconnect_when_idle_is_noop() {
        let service = test_service("ws://127.0.0.1:1/ws");
        service.disconnect().await;
        service.disconnect().await;
        assert_eq!(service.status(), ConnectionStatus::Idle);
        assert!(!service.is_active().await);
        assert!(!service.is_reconnect_pending());
        assert_eq!(service.current_username().await, None);
    }

    #[tokio::test]
    async fn test_invalid_url_ends_session_without_retry() {
        let service = test_service("http://127.0.0.1:1/ws");
        let mut status_rx = service.connection_status();
        assert!(service.connect("alice", "pw").await);

        let status = tokio::time::timeout(Duration::from_secs(2), status_rx.wait_for(|s| s.is_error()))
            .await
            .expect("等待错误状态超时")
            .expect("状态通道已关闭")
            .clone();
        assert!(matches!(status, ConnectionStatus::Error(reason) if reason.contains("无效的URL")));
        assert!(!service.is_reconnect_pending(), "终止性错误不应标记为等待重连");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!service.is_active().await, "无效 URL 不应触发重连");
    }

    #[tokio::test]
    async fn test_transient_error_marks_reconnect_pending() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("绑定随机端口失败");
        let addr = listener.local_addr().expect("获取本地地址失败");
        drop(listener);

        let service = WebSocketClientService::with_settings(format!("ws://{}/ws", addr), Duration::from_secs(30), 8);
        let mut status_rx = service.connection_status();
        service.connect("alice", "pw").await;
        tokio::time::timeout(Duration::from_secs(2), status_rx.wait_for(|s| s.is_error()))
            .await
            .expect("等待错误状态超时")
            .expect("状态通道已关闭");
        assert!(service.is_reconnect_pending(), "连接被拒绝属于暂时性故障");

        service.disconnect().await;
        assert!(!service.is_reconnect_pending());
    }

    #[test]
    fn test_error_classification() {
        assert!(matches!(classify_error(WsError::DecodeError("x".into())), SessionEnd::Fatal(_)));
        assert!(matches!(classify_error(WsError::UnexpectedFrame("x".into())), SessionEnd::Fatal(_)));
        assert!(matches!(classify_error(WsError::InvalidUrl("x".into())), SessionEnd::Fatal(_)));
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(matches!(classify_error(WsError::from(io)), SessionEnd::Transient(_)));
    }
}
