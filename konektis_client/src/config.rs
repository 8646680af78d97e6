// konektis_client/src/config.rs

//! 客户端配置管理模块。
//!
//! 配置以 JSON 文件保存，缺省的字段使用默认值。配置文件不存在时直接使用默认配置，
//! 文件存在但内容无法解析时返回带上下文的错误，避免悄悄连接到错误的服务器。

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use konektis_ws_utils::client::transport::parse_ws_url;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// 默认的服务端地址。
pub const DEFAULT_SERVER_URL: &str = "ws://192.168.129.60:8080/ws";
/// 传输错误后到下一次重连之间的固定等待时间 (毫秒)。
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 5000;
/// 每个消息订阅者最多缓存的未读消息数。
pub const DEFAULT_MESSAGE_CHANNEL_CAPACITY: usize = 64;
/// 默认配置文件名。
pub const DEFAULT_CONFIG_FILE: &str = "client_settings.json";

/// 客户端配置。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// 服务端 WebSocket 地址，例如 `"ws://192.168.129.60:8080/ws"`。
    pub server_url: String,
    /// 重连退避时间 (毫秒)。
    pub reconnect_delay_ms: u64,
    /// 消息广播通道容量。慢订阅者落后超过该数量时会丢失最旧的消息。
    pub message_channel_capacity: usize,
    /// 凭据文件路径。
    pub credentials_path: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            message_channel_capacity: DEFAULT_MESSAGE_CHANNEL_CAPACITY,
            credentials_path: PathBuf::from("credentials.json"),
        }
    }
}

impl ClientConfig {
    /// 从指定路径加载配置并校验。
    pub fn load(path: &Path) -> Result<Self> {
        let config = match fs::read_to_string(path) {
            Ok(content) => {
                let config: ClientConfig = serde_json::from_str(&content)
                    .with_context(|| format!("解析配置文件 {:?} 失败，请确认其为有效的 JSON", path))?;
                log::info!("[配置模块] 已从 {:?} 加载客户端配置，服务端地址: {}", path, config.server_url);
                config
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::warn!("[配置模块] 配置文件 {:?} 不存在，使用默认配置。", path);
                ClientConfig::default()
            }
            Err(e) => {
                return Err(e).with_context(|| format!("无法读取配置文件 {:?}", path));
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// 校验配置项。
    pub fn validate(&self) -> Result<(), ClientError> {
        parse_ws_url(&self.server_url).map_err(|e| ClientError::Config(e.to_string()))?;
        if self.message_channel_capacity == 0 {
            return Err(ClientError::Config("message_channel_capacity 必须大于 0".to_string()));
        }
        Ok(())
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}
