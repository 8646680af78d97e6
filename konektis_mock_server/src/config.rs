// konektis_mock_server/src/config.rs

//! 模拟服务端配置模块。

use std::collections::BTreeMap;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::ServerError;

/// 默认监听地址
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// 默认端口号，与客户端的默认服务端地址一致
pub const DEFAULT_PORT: u16 = 8080;
/// 默认配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "mock_server_settings.json";

/// 模拟服务端配置
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// 绑定的 IP 地址
    pub host: String,
    /// 监听端口
    pub port: u16,
    /// 认证成功后推送 PowerUsageUpdate 的间隔 (毫秒)
    pub update_interval_ms: u64,
    /// 允许登录的用户名 → 密码
    pub users: BTreeMap<String, String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let mut users = BTreeMap::new();
        users.insert("demo".to_string(), "demo".to_string());
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            update_interval_ms: 2000,
            users,
        }
    }
}

impl ServerConfig {
    /// 加载配置文件；文件不存在时写出一份默认配置。
    ///
    /// 文件内容损坏时使用默认配置，但不覆盖原文件。
    pub fn load_or_create(path: &Path) -> Result<Self, ServerError> {
        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<ServerConfig>(&content) {
                Ok(config) => {
                    info!("[配置模块] 已从 {:?} 加载模拟服务端配置", path);
                    Ok(config)
                }
                Err(e) => {
                    warn!("[配置模块] 解析 {:?} 失败: {}。本次使用默认配置。", path, e);
                    Ok(ServerConfig::default())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = ServerConfig::default();
                let content = serde_json::to_string_pretty(&config)
                    .map_err(|e| ServerError::Config(format!("序列化默认配置失败: {}", e)))?;
                fs::write(path, content).map_err(|source| ServerError::ConfigIo { path: path.to_path_buf(), source })?;
                info!("[配置模块] 未找到配置文件，已在 {:?} 写出默认配置", path);
                Ok(config)
            }
            Err(source) => Err(ServerError::ConfigIo { path: path.to_path_buf(), source }),
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ServerError::Config(format!("无效的监听地址 {}:{}: {}", self.host, self.port, e)))
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms.max(1))
    }

    /// 校验用户名与密码。
    pub fn check_credentials(&self, username: &str, password: &str) -> bool {
        self.users.get(username).map_or(false, |expected| expected == password)
    }
}
