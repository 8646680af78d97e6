// konektis_ws_utils/src/client/transport.rs

//! 客户端 WebSocket 传输层。
//!
//! 负责建立与服务端的连接、发送编码后的 `ClientMessage`，以及接收并解码服务端的 `Message`。
//! 连接的生命周期 (认证、重连、状态) 由上层的 `konektis_client` 管理，本模块不保存任何状态。

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use konektis_models::{ClientMessage, Message};
use log::{debug, error, info};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as WsFrame, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::WsError;
use crate::frames::{next_text_frame, send_text_frame};
use crate::message::{decode_message, encode_client_message};

/// 客户端连接成功后得到的 WebSocket 流，可能经过 TLS 加密。
pub type ClientWsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;
/// 客户端连接的发送端。
pub type ClientWsSink = SplitSink<ClientWsStream, WsFrame>;
/// 客户端连接的接收端。
pub type ClientWsSource = SplitStream<ClientWsStream>;

/// 一个已建立的客户端 WebSocket 连接，拆分为独立的发送端与接收端。
///
/// 拆分后发送端可以交给一个单写者锁，接收端留在读循环里，两者互不阻塞。
pub struct ClientConnection {
    pub ws_sender: ClientWsSink,
    pub ws_receiver: ClientWsSource,
}

impl ClientConnection {
    /// 编码并发送一条客户端命令。
    pub async fn send_message(&mut self, message: &ClientMessage) -> Result<(), WsError> {
        send_client_message(&mut self.ws_sender, message).await
    }

    /// 接收下一条服务端消息，语义同 [`receive_message`]。
    pub async fn receive_message(&mut self) -> Option<Result<Message, WsError>> {
        receive_message(&mut self.ws_receiver).await
    }
}

/// 校验 WebSocket URL，只接受 `ws` 与 `wss` 方案。
///
/// # 返回
/// 解析失败或方案不受支持时返回 `WsError::InvalidUrl`。
pub fn parse_ws_url(url_str: &str) -> Result<Url, WsError> {
    let parsed = Url::parse(url_str)
        .map_err(|e| WsError::InvalidUrl(format!("无效的 WebSocket URL '{}': {}", url_str, e)))?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(parsed),
        other => Err(WsError::InvalidUrl(format!(
            "不支持的 URL 方案 '{}' (仅支持 ws/wss): {}",
            other, url_str
        ))),
    }
}

/// 异步连接到指定的 WebSocket 服务器。
///
/// 连接与握手成功后，将流拆分为发送端和接收端并封装在 `ClientConnection` 中返回。
/// 除传输层自身的超时外，这里不额外设置连接超时。
///
/// # 参数
/// * `url_str` - 形如 `ws://host:port/ws` 的服务端地址。
///
/// # 返回
/// URL 无效时返回 `WsError::InvalidUrl`，TCP 或握手失败时返回对应的传输错误。
pub async fn connect_client(url_str: &str) -> Result<ClientConnection, WsError> {
    info!("[WsClient] 开始连接 WebSocket 服务器: {}", url_str);
    let parsed_url = parse_ws_url(url_str)?;

    match connect_async(parsed_url.as_str()).await {
        Ok((ws_stream, response)) => {
            info!("[WsClient] 已连接到 {} (HTTP 状态码: {})", url_str, response.status());
            let (ws_sender, ws_receiver) = ws_stream.split();
            Ok(ClientConnection { ws_sender, ws_receiver })
        }
        Err(e) => {
            error!("[WsClient] 连接到 {} 失败: {}", url_str, e);
            Err(WsError::WebSocketProtocolError(e))
        }
    }
}

/// 编码并通过发送端发送一条客户端命令。
///
/// 日志中只记录消息类型，不记录内容 (认证消息含有密码)。
///
/// # 参数
/// * `ws_sender` - 连接的发送端，调用方负责保证同一时刻只有一个写者。
/// * `message` - 要发送的命令。
pub async fn send_client_message(ws_sender: &mut ClientWsSink, message: &ClientMessage) -> Result<(), WsError> {
    let text = encode_client_message(message)?;
    send_text_frame(ws_sender, text).await?;
    debug!("[WsClient] 已发送 {} 消息", message.kind());
    Ok(())
}

/// 从接收端读取并解码下一条服务端消息。
///
/// # 返回
/// - `Some(Ok(message))`：成功接收并解码。
/// - `Some(Err(WsError::DecodeError(..)))`：收到了无法归类的文本帧。
/// - `Some(Err(..))`：其他接收错误 (网络错误、二进制帧等)。
/// - `None`：连接已关闭。
pub async fn receive_message(ws_receiver: &mut ClientWsSource) -> Option<Result<Message, WsError>> {
    match next_text_frame(ws_receiver).await? {
        Ok(text) => Some(decode_message(&text)),
        Err(e) => Some(Err(e)),
    }
}

/// 尽力关闭发送端：先发送 Close 帧，再关闭底层 Sink。错误只记录日志。
pub async fn close_sender(ws_sender: &mut ClientWsSink) {
    if let Err(e) = ws_sender.send(WsFrame::Close(None)).await {
        debug!("[WsClient] 发送 Close 帧失败 (连接可能已断开): {}", e);
    }
    if let Err(e) = ws_sender.close().await {
        debug!("[WsClient] 关闭发送端失败: {}", e);
    }
}
