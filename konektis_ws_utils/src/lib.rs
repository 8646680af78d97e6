//! `konektis_ws_utils` 提供 Konektis 协议在 WebSocket 之上的传输与编解码工具。
//!
//! 主要模块包括：
//! - `message`: 带标签联合体消息与 JSON 文本之间的编解码 (纯函数，无 I/O)。
//! - `error`: 库中统一使用的错误类型 `WsError`。
//! - `client`: 客户端传输层，建立连接、发送命令、接收并解码服务端消息。
//! - `server`: 服务端传输层，供模拟服务器与集成测试使用。

pub mod client;
pub mod error;
mod frames;
pub mod message;
pub mod server;

pub use error::WsError;
pub use message::{decode_client_message, decode_message, encode_client_message, encode_message};
