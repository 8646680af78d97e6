// konektis_ws_utils/src/server/transport.rs

//! 服务端 WebSocket 监听、接受连接和通信逻辑。

use std::future::Future;
use std::net::SocketAddr;

use futures_util::{Sink, Stream};
use konektis_models::{ClientMessage, Message};
use log::{debug, error, info};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::{protocol::Message as WsFrame, Error as TungsteniteError};
use tokio_tungstenite::{accept_async, WebSocketStream};

use crate::error::WsError;
use crate::frames::{next_text_frame, send_text_frame};
use crate::message::{decode_client_message, encode_message};

/// 经过 WebSocket 握手后的 TCP 流。
pub type WsStream = WebSocketStream<TcpStream>;

/// 负责 WebSocket 服务端的监听和连接接受。
pub struct ServerTransport;

impl ServerTransport {
    /// 绑定 `addr` 并开始服务，参见 [`ServerTransport::serve`]。
    ///
    /// # 参数
    /// * `addr` - 监听地址。
    /// * `on_connect` - 每个握手成功的连接调用一次，返回的 Future 在独立任务中运行。
    ///
    /// # 返回
    /// 只有绑定失败时返回错误 (`WsError::IoError`)。
    pub async fn start<F, Fut>(addr: SocketAddr, on_connect: F) -> Result<(), WsError>
    where
        F: Fn(WsStream, SocketAddr) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr).await?;
        info!("[WsServer] WebSocket 服务器正在监听地址: {}", addr);
        Self::serve(listener, on_connect).await
    }

    /// 在一个已绑定的监听器上接受连接。
    ///
    /// 每个连接在独立的 Tokio 任务中完成握手，握手成功后调用 `on_connect`。
    /// 接受失败只记录日志，服务器继续运行；此函数只有在任务被中止时才会结束。
    pub async fn serve<F, Fut>(listener: TcpListener, on_connect: F) -> Result<(), WsError>
    where
        F: Fn(WsStream, SocketAddr) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        loop {
            match listener.accept().await {
                Ok((tcp_stream, peer_addr)) => {
                    debug!("[WsServer] 从 {} 接受了新的 TCP 连接", peer_addr);
                    let on_connect_callback = on_connect.clone();
                    tokio::spawn(async move {
                        match accept_async(tcp_stream).await {
                            Ok(ws_stream) => {
                                info!("[WsServer] 与 {} 的 WebSocket 握手成功", peer_addr);
                                on_connect_callback(ws_stream, peer_addr).await;
                            }
                            Err(e) => {
                                error!("[WsServer] 与 {} 的 WebSocket 握手失败: {}", peer_addr, e);
                            }
                        }
                    });
                }
                Err(e) => {
                    error!("[WsServer] 接受 TCP 连接失败: {}。服务器将继续运行。", e);
                }
            }
        }
    }
}

/// 编码并向客户端发送一条服务端消息。
///
/// # 参数
/// * `ws_sender` - 任意接受 WebSocket 帧的 Sink，通常是拆分后的发送端。
/// * `message` - 要发送的服务端消息。
pub async fn send_message<S>(ws_sender: &mut S, message: &Message) -> Result<(), WsError>
where
    S: Sink<WsFrame, Error = TungsteniteError> + Unpin,
{
    let text = encode_message(message)?;
    send_text_frame(ws_sender, text).await
}

/// 发送一段原始文本帧，不经过编码。用于测试客户端对畸形帧的处理。
pub async fn send_raw_text<S>(ws_sender: &mut S, text: impl Into<String>) -> Result<(), WsError>
where
    S: Sink<WsFrame, Error = TungsteniteError> + Unpin,
{
    send_text_frame(ws_sender, text.into()).await
}

/// 读取并解码客户端发来的下一条命令，返回值语义与客户端的 `receive_message` 相同。
pub async fn receive_client_message<S>(ws_receiver: &mut S) -> Option<Result<ClientMessage, WsError>>
where
    S: Stream<Item = Result<WsFrame, TungsteniteError>> + Unpin,
{
    match next_text_frame(ws_receiver).await? {
        Ok(text) => Some(decode_client_message(&text)),
        Err(e) => Some(Err(e)),
    }
}
