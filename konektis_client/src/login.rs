// konektis_client/src/login.rs

//! 登录流程协调。
//!
//! 把凭据存储与连接服务组合在一起：登录时先保存凭据再连接，登出时先清除凭据再断开，
//! 启动时如果存有凭据则自动登录。

use std::sync::Arc;

use log::info;

use crate::credentials::CredentialStore;
use crate::error::ClientError;
use crate::ws_client::WebSocketClientService;

pub struct LoginCoordinator {
    client: Arc<WebSocketClientService>,
    store: Arc<dyn CredentialStore>,
}

impl LoginCoordinator {
    /// 创建登录协调器。
    ///
    /// # 参数
    /// * `client` - 共享的连接服务，登录与登出都作用于它。
    /// * `store` - 凭据存储，登录时写入，登出时清除。
    pub fn new(client: Arc<WebSocketClientService>, store: Arc<dyn CredentialStore>) -> Self {
        Self { client, store }
    }

    /// 保存凭据并发起连接。
    ///
    /// # 参数
    /// * `username` / `password` - 要保存并用于认证的凭据。
    ///
    /// # 返回
    /// 用户名或密码为空时返回 `ClientError::EmptyCredentials`，不做任何改动；
    /// 凭据写入失败时返回存储错误，此时不会发起连接。
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ClientError> {
        if username.is_empty() || password.is_empty() {
            return Err(ClientError::EmptyCredentials);
        }
        self.store.save(username, password).await?;
        info!("[登录] 用户 '{}' 正在登录", username);
        self.client.connect(username, password).await;
        Ok(())
    }

    /// 清除已保存的凭据并断开连接。
    ///
    /// # 返回
    /// 清除凭据失败时返回存储错误；无论如何连接都会被断开。
    pub async fn logout(&self) -> Result<(), ClientError> {
        let cleared = self.store.clear().await;
        self.client.disconnect().await;
        info!("[登录] 已登出");
        cleared
    }

    /// 使用已保存的凭据自动登录。
    ///
    /// # 返回
    /// 存有凭据并已发起连接时返回 `true`，没有凭据时返回 `false`。
    pub async fn auto_login(&self) -> bool {
        match self.store.current() {
            Some(credentials) => {
                info!("[登录] 使用已保存的凭据自动登录用户 '{}'", credentials.username);
                self.client.connect(&credentials.username, &credentials.password).await;
                true
            }
            None => false,
        }
    }

    /// 登录协调器驱动的连接服务，用于订阅状态和消息。
    pub fn client(&self) -> &Arc<WebSocketClientService> {
        &self.client
    }

    /// 底层的凭据存储。
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{Credentials, MemoryCredentialStore};
    use std::time::Duration;

    fn coordinator(store: MemoryCredentialStore) -> LoginCoordinator {
        // 端口 1 上没有服务，连接任务会停留在重连循环中。
        let client = Arc::new(WebSocketClientService::with_settings("ws://127.0.0.1:1/ws", Duration::from_secs(60), 8));
        LoginCoordinator::new(client, Arc::new(store))
    }

    #[tokio::test]
    async fn test_login_rejects_empty_fields() {
        let coordinator = coordinator(MemoryCredentialStore::new());
        assert!(matches!(coordinator.login("", "pw").await, Err(ClientError::EmptyCredentials)));
        assert!(matches!(coordinator.login("alice", "").await, Err(ClientError::EmptyCredentials)));
        assert_eq!(coordinator.store().current(), None);
        assert!(!coordinator.client().is_active().await);
    }

    #[tokio::test]
    async fn test_login_then_logout() {
        let coordinator = coordinator(MemoryCredentialStore::new());
        coordinator.login("alice", "pw").await.expect("登录失败");
        assert_eq!(coordinator.store().current(), Some(Credentials::new("alice", "pw")));
        assert!(coordinator.client().is_active().await);
        assert_eq!(coordinator.client().current_username().await.as_deref(), Some("alice"));

        coordinator.logout().await.expect("登出失败");
        assert_eq!(coordinator.store().current(), None);
        assert!(!coordinator.client().is_active().await);
        assert_eq!(coordinator.client().current_username().await, None);
    }

    #[tokio::test]
    async fn test_auto_login_uses_saved_credentials() {
        let empty = coordinator(MemoryCredentialStore::new());
        assert!(!empty.auto_login().await);
        assert!(!empty.client().is_active().await);

        let saved = coordinator(MemoryCredentialStore::with_credentials(Some(Credentials::new("bob", "pw"))));
        assert!(saved.auto_login().await);
        assert_eq!(saved.client().current_username().await.as_deref(), Some("bob"));
        saved.logout().await.expect("登出失败");
    }
}
