// konektis_ws_utils/src/frames.rs

//! 客户端与服务端共用的底层帧读写辅助函数。

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use log::{debug, error};
use tokio_tungstenite::tungstenite::{protocol::Message as WsFrame, Error as TungsteniteError};

use crate::error::WsError;

/// 从 WebSocket 流中读取下一个文本帧。
///
/// Ping/Pong 等控制帧由 tokio-tungstenite 自动处理，这里直接跳过。
/// 二进制帧不属于本协议，返回 `WsError::UnexpectedFrame`。
///
/// # Returns
/// - `Some(Ok(text))`：收到一个文本帧。
/// - `Some(Err(e))`：接收过程中发生错误。
/// - `None`：对端关闭了连接或流已耗尽。
pub(crate) async fn next_text_frame<S>(ws_receiver: &mut S) -> Option<Result<String, WsError>>
where
    S: Stream<Item = Result<WsFrame, TungsteniteError>> + Unpin,
{
    loop {
        match ws_receiver.next().await {
            Some(Ok(WsFrame::Text(text))) => {
                debug!("[WsFrames] 收到文本帧，长度: {} 字节", text.len());
                break Some(Ok(text));
            }
            Some(Ok(WsFrame::Binary(bin))) => {
                break Some(Err(WsError::UnexpectedFrame(format!(
                    "收到长度为 {} 字节的二进制帧",
                    bin.len()
                ))));
            }
            Some(Ok(WsFrame::Ping(_))) | Some(Ok(WsFrame::Pong(_))) | Some(Ok(WsFrame::Frame(_))) => {
                // 控制帧，继续等待业务帧
            }
            Some(Ok(WsFrame::Close(close_frame))) => {
                debug!("[WsFrames] 收到 Close 帧: {:?}", close_frame);
                break None;
            }
            Some(Err(TungsteniteError::ConnectionClosed)) | Some(Err(TungsteniteError::AlreadyClosed)) => {
                debug!("[WsFrames] 连接已关闭。");
                break None;
            }
            Some(Err(e)) => {
                error!("[WsFrames] 从 WebSocket 流接收帧时发生错误: {}", e);
                break Some(Err(WsError::WebSocketProtocolError(e)));
            }
            None => {
                debug!("[WsFrames] WebSocket 接收流已结束。");
                break None;
            }
        }
    }
}

/// 发送一个文本帧。
pub(crate) async fn send_text_frame<S>(ws_sender: &mut S, text: String) -> Result<(), WsError>
where
    S: Sink<WsFrame, Error = TungsteniteError> + Unpin,
{
    ws_sender.send(WsFrame::Text(text)).await?;
    Ok(())
}
