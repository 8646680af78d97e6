// konektis_client/src/ws_client/mod.rs

//! WebSocket 客户端服务模块。

pub mod service;
pub mod status;

pub use service::WebSocketClientService;
pub use status::ConnectionStatus;
