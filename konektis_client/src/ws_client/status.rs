// konektis_client/src/ws_client/status.rs

use std::fmt;

use serde::Serialize;

/// 连接的对外可观察状态。任意时刻只有一个值有效，且只由连接状态机修改。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason")]
pub enum ConnectionStatus {
    /// 未连接，或已发起连接但尚未收到认证结果。
    Idle,
    /// 已通过认证，正在接收消息。
    Connected,
    /// 服务端拒绝了凭据。不会自动重试。
    Unauthorized,
    /// 连接出错。附带人类可读的原因。
    Error(String),
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ConnectionStatus::Error(_))
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        ConnectionStatus::Idle
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Idle => write!(f, "未连接"),
            ConnectionStatus::Connected => write!(f, "已连接"),
            ConnectionStatus::Unauthorized => write!(f, "认证失败"),
            ConnectionStatus::Error(reason) => write!(f, "连接错误: {}", reason),
        }
    }
}
