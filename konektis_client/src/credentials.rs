// konektis_client/src/credentials.rs

//! 凭据存储。
//!
//! 当前凭据以可观察的方式对外暴露：订阅者先收到当前值，之后收到每一次 `save` / `clear` 的结果。
//! `FileCredentialStore` 把凭据持久化为一个 JSON 文件，进程重启后仍可用于自动登录。

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::ClientError;

/// 一组用户名 / 密码。
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials").field("username", &self.username).field("password", &"***").finish()
    }
}

/// 凭据存储接口。
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// 订阅当前凭据。新订阅者立即能读到当前值。
    fn observe(&self) -> watch::Receiver<Option<Credentials>>;

    /// 保存凭据，覆盖已有的值。
    async fn save(&self, username: &str, password: &str) -> Result<(), ClientError>;

    /// 清除凭据。没有已保存的凭据时也视为成功。
    async fn clear(&self) -> Result<(), ClientError>;

    /// 当前凭据的快照。
    fn current(&self) -> Option<Credentials> {
        self.observe().borrow().clone()
    }
}

/// 仅保存在内存中的凭据存储，主要用于测试和不需要持久化的场景。
pub struct MemoryCredentialStore {
    current_tx: watch::Sender<Option<Credentials>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::with_credentials(None)
    }

    pub fn with_credentials(initial: Option<Credentials>) -> Self {
        let (current_tx, _) = watch::channel(initial);
        Self { current_tx }
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    fn observe(&self) -> watch::Receiver<Option<Credentials>> {
        self.current_tx.subscribe()
    }

    async fn save(&self, username: &str, password: &str) -> Result<(), ClientError> {
        self.current_tx.send_replace(Some(Credentials::new(username, password)));
        Ok(())
    }

    async fn clear(&self) -> Result<(), ClientError> {
        self.current_tx.send_replace(None);
        Ok(())
    }
}

/// 以 JSON 文件保存凭据的存储。
///
/// 写入时先写临时文件再重命名，避免进程中途退出留下半个文件。
pub struct FileCredentialStore {
    path: PathBuf,
    current_tx: watch::Sender<Option<Credentials>>,
}

impl FileCredentialStore {
    /// 打开 (不存在时不创建) 凭据文件并读取其中的凭据。
    ///
    /// 文件内容无法解析时记录警告并视为没有已保存的凭据；其他 I/O 错误向上返回。
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, ClientError> {
        let path = path.into();
        let initial = match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<Credentials>(&content) {
                Ok(credentials) => {
                    log::info!("[凭据存储] 已从 {:?} 读取用户 '{}' 的凭据", path, credentials.username);
                    Some(credentials)
                }
                Err(e) => {
                    log::warn!("[凭据存储] 凭据文件 {:?} 格式无效，忽略: {}", path, e);
                    None
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("[凭据存储] 凭据文件 {:?} 不存在", path);
                None
            }
            Err(source) => return Err(ClientError::CredentialIo { path, source }),
        };
        let (current_tx, _) = watch::channel(initial);
        Ok(Self { path, current_tx })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> ClientError {
        ClientError::CredentialIo { path: self.path.clone(), source }
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    fn observe(&self) -> watch::Receiver<Option<Credentials>> {
        self.current_tx.subscribe()
    }

    async fn save(&self, username: &str, password: &str) -> Result<(), ClientError> {
        let credentials = Credentials::new(username, password);
        let content = serde_json::to_string_pretty(&credentials)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| self.io_error(e))?;
        }
        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, content).await.map_err(|e| self.io_error(e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| self.io_error(e))?;
        }
        tokio::fs::rename(&temp_path, &self.path).await.map_err(|e| self.io_error(e))?;

        log::info!("[凭据存储] 已保存用户 '{}' 的凭据到 {:?}", username, self.path);
        self.current_tx.send_replace(Some(credentials));
        Ok(())
    }

    async fn clear(&self) -> Result<(), ClientError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => log::info!("[凭据存储] 已删除凭据文件 {:?}", self.path),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(self.io_error(e)),
        }
        self.current_tx.send_replace(None);
        Ok(())
    }
}
