use std::path::PathBuf;

use konektis_ws_utils::WsError;
use thiserror::Error;

/// 模拟服务端的错误类型
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("WebSocket 服务错误: {0}")]
    WebSocketService(#[from] WsError),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("配置文件 {path:?} 读写失败: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
