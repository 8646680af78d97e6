// konektis_ws_utils/src/client/mod.rs

//! WebSocket 客户端模块。
//!
//! `transport` 子模块提供建立连接 (`connect_client`)、发送命令 (`send_client_message`)
//! 与接收服务端消息 (`receive_message`) 的函数。

pub mod transport;
