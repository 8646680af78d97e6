//! `konektis_client` 家庭能源客户端核心逻辑。
//!
//! - `ws_client`: 连接状态机 `WebSocketClientService` 与对外可观察的 `ConnectionStatus`。
//! - `credentials`: 凭据存储接口及其文件 / 内存实现。
//! - `login`: 登录、登出与自动登录的协调逻辑。
//! - `config`: 客户端配置的加载与校验。
//! - `error`: 客户端错误类型。

pub mod config;
pub mod credentials;
pub mod error;
pub mod login;
pub mod ws_client;

pub use config::ClientConfig;
pub use credentials::{CredentialStore, Credentials, FileCredentialStore, MemoryCredentialStore};
pub use error::ClientError;
pub use login::LoginCoordinator;
pub use ws_client::{ConnectionStatus, WebSocketClientService};
