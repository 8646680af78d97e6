// konektis_client/src/error.rs

//! 客户端错误类型。
//!
//! 连接过程中的传输错误不会出现在这里：状态机会把它们全部转换为
//! `ConnectionStatus` 的状态迁移，调用方只会看到下面这些本地操作的失败。

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("用户名和密码不能为空")]
    EmptyCredentials,

    #[error("凭据文件 {path:?} 读写失败: {source}")]
    CredentialIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("凭据序列化失败: {0}")]
    CredentialFormat(#[from] serde_json::Error),

    #[error("配置错误: {0}")]
    Config(String),
}
