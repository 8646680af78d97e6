// konektis_ws_utils/src/error.rs

//! 定义 WebSocket 工具库相关的错误类型。

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WsError {
    /// 消息编码为 JSON 文本失败。
    #[error("编码错误: {0}")]
    EncodeError(String),

    /// 收到的文本不是合法 JSON，或不匹配任何已知的消息变体
    /// (未知标签、缺少必填字段、字段类型不符)。
    #[error("解码错误: {0}")]
    DecodeError(String),

    /// WebSocket 协议相关的错误，例如握手失败、连接被重置。
    #[error("WebSocket协议错误: {0}")]
    WebSocketProtocolError(#[from] tokio_tungstenite::tungstenite::Error),

    /// 底层 I/O 错误。
    #[error("I/O错误: {0}")]
    IoError(#[from] std::io::Error),

    /// 无效的 URL 格式或不支持的协议方案。
    #[error("无效的URL: {0}")]
    InvalidUrl(String),

    /// 收到了协议中不存在的帧类型 (例如二进制帧)。
    #[error("非预期的帧: {0}")]
    UnexpectedFrame(String),
}

impl WsError {
    /// 该错误是否属于网络层面的暂时性故障。
    ///
    /// # 返回
    /// - `true`：WebSocket 协议层或底层 I/O 错误，重新建立连接后可能恢复。
    /// - `false`：对端违反了消息协议 (`DecodeError`、`UnexpectedFrame`)，
    ///   或本地无法继续 (`InvalidUrl`、`EncodeError`)。重连不会改变结果，调用方应终止会话。
    pub fn is_transient(&self) -> bool {
        match self {
            WsError::WebSocketProtocolError(_) | WsError::IoError(_) => true,
            WsError::DecodeError(_)
            | WsError::UnexpectedFrame(_)
            | WsError::InvalidUrl(_)
            | WsError::EncodeError(_) => false,
        }
    }
}
