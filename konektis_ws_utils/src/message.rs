// konektis_ws_utils/src/message.rs

//! Konektis 消息编解码。
//!
//! 线格式为 JSON 文本，联合体通过 `"type"` 字段区分变体。解码严格失败关闭：
//! 任何无法归类的文本都返回 `WsError::DecodeError`，绝不会被当作某个默认消息。

use konektis_models::{ClientMessage, Message};

use crate::error::WsError;

/// 将客户端命令编码为 JSON 文本。
pub fn encode_client_message(message: &ClientMessage) -> Result<String, WsError> {
    serde_json::to_string(message)
        .map_err(|e| WsError::EncodeError(format!("{} 消息编码失败: {}", message.kind(), e)))
}

/// 将服务端发来的 JSON 文本解码为 `Message`。
pub fn decode_message(text: &str) -> Result<Message, WsError> {
    serde_json::from_str::<Message>(text)
        .map_err(|e| WsError::DecodeError(format!("无法解码服务端消息: {}, 原始文本: '{}'", e, text)))
}

/// 将服务端消息编码为 JSON 文本。
pub fn encode_message(message: &Message) -> Result<String, WsError> {
    serde_json::to_string(message)
        .map_err(|e| WsError::EncodeError(format!("{} 消息编码失败: {}", message.kind(), e)))
}

/// 将客户端发来的 JSON 文本解码为 `ClientMessage`。
///
/// 错误信息中不包含原始文本，因为其中可能带有明文密码。
pub fn decode_client_message(text: &str) -> Result<ClientMessage, WsError> {
    serde_json::from_str::<ClientMessage>(text)
        .map_err(|e| WsError::DecodeError(format!("无法解码客户端消息: {}", e)))
}
