//! `konektis_mock_server` 家庭能源模拟服务端。
//!
//! 实现与真实服务端相同的线协议，供客户端的本地开发与端到端测试使用：
//! - `config`: 监听地址、推送间隔与用户表。
//! - `error`: 服务端错误类型。
//! - `ws_server`: 接受连接、认证客户端、周期推送随机能量数据并记录充电命令。

pub mod config;
pub mod error;
pub mod ws_server;

pub use config::ServerConfig;
pub use error::ServerError;
pub use ws_server::MockEnergyServer;
