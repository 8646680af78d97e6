// konektis_ws_utils/src/server/mod.rs

//! WebSocket 服务端模块。
//!
//! 提供监听、握手与逐连接回调 (`ServerTransport`)，以及服务端方向的消息收发函数。
//! 模拟服务器与各 crate 的集成测试都建立在它之上。

pub mod transport;
