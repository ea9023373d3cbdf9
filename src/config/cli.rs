use crate::core::session::{Role, Session};
use crate::core::Storage;
use crate::utils::error::{AppError, ErrorCategory, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const SESSION_FILE: &str = "session.json";

#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn full_path(&self, path: &str) -> PathBuf {
        Path::new(&self.base_path).join(path)
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let data = fs::read(self.full_path(path))?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.full_path(path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(full_path, data)?;
        Ok(())
    }

    async fn remove_file(&self, path: &str) -> Result<()> {
        match fs::remove_file(self.full_path(path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// 本次執行所用 session 的來源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSource {
    /// 從 session 檔讀出
    Saved,
    /// `--token` 或 `INSCRIPCIONES_TOKEN`
    Token,
    Anonymous,
}

/// 保存登入後的 session，下次執行指令時沿用
pub struct SessionStore<S: Storage> {
    storage: S,
}

impl<S: Storage> SessionStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// 沒有 session 檔時回傳 `None`；檔案損毀視同未登入
    pub async fn load(&self) -> Result<Option<Session>> {
        let data = match self.storage.read_file(SESSION_FILE).await {
            Ok(data) => data,
            Err(AppError::Io(e)) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        match serde_json::from_slice::<Session>(&data) {
            Ok(session) if !session.token().is_empty() => Ok(Some(session)),
            Ok(_) => Ok(None),
            Err(e) => {
                tracing::warn!("Ignoring unreadable session file: {}", e);
                Ok(None)
            }
        }
    }

    pub async fn save(&self, session: &Session) -> Result<()> {
        let data = serde_json::to_vec_pretty(session)?;
        self.storage.write_file(SESSION_FILE, &data).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.storage.remove_file(SESSION_FILE).await
    }

    /// 明確給的 token 優先，否則讀 session 檔
    pub async fn resolve(&self, token: Option<String>) -> Result<(Option<Session>, SessionSource)> {
        if let Some(token) = token {
            return Ok((
                Some(Session::new(token, Role::Operador, "token")),
                SessionSource::Token,
            ));
        }
        Ok(match self.load().await? {
            Some(session) => (Some(session), SessionSource::Saved),
            None => (None, SessionSource::Anonymous),
        })
    }

    /// 後端拒絕了保存的 token 時刪除 session 檔；回傳是否有刪除
    pub async fn discard_rejected(&self, source: SessionSource, error: &AppError) -> Result<bool> {
        if source != SessionSource::Saved || error.category() != ErrorCategory::Auth {
            return Ok(false);
        }
        self.clear().await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_storage_write_read_remove() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().to_string_lossy().to_string());

        storage.write_file("nested/file.txt", b"hola").await.unwrap();
        assert_eq!(storage.read_file("nested/file.txt").await.unwrap(), b"hola");

        storage.remove_file("nested/file.txt").await.unwrap();
        assert!(storage.read_file("nested/file.txt").await.is_err());

        // 刪除不存在的檔案不算錯誤
        storage.remove_file("nested/file.txt").await.unwrap();
    }

    #[tokio::test]
    async fn test_session_store_round_trip_and_clear() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(LocalStorage::new(dir.path().to_string_lossy().to_string()));

        assert!(store.load().await.unwrap().is_none());

        let session = Session::new("demo-token", Role::Admin, "admin");
        store.save(&session).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(session));

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupted_session_file_is_ignored() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().to_string_lossy().to_string());
        storage.write_file(SESSION_FILE, b"{not json").await.unwrap();

        let store = SessionStore::new(storage);
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_explicit_token_wins_over_saved_session() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(LocalStorage::new(dir.path().to_string_lossy().to_string()));
        store
            .save(&Session::new("saved-token", Role::Admin, "admin"))
            .await
            .unwrap();

        let (session, source) = store.resolve(Some("env-token".to_string())).await.unwrap();
        assert_eq!(source, SessionSource::Token);
        assert_eq!(session.unwrap().token(), "env-token");

        let (session, source) = store.resolve(None).await.unwrap();
        assert_eq!(source, SessionSource::Saved);
        assert_eq!(session.unwrap().token(), "saved-token");

        store.clear().await.unwrap();
        let (session, source) = store.resolve(None).await.unwrap();
        assert_eq!(source, SessionSource::Anonymous);
        assert!(session.is_none());
    }

    #[tokio::test]
    async fn test_rejected_explicit_token_keeps_session_file() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(LocalStorage::new(dir.path().to_string_lossy().to_string()));
        let saved = Session::new("saved-token", Role::Admin, "admin");
        store.save(&saved).await.unwrap();
        let rejected = AppError::auth("Token inválido");

        assert!(!store
            .discard_rejected(SessionSource::Token, &rejected)
            .await
            .unwrap());
        assert_eq!(store.load().await.unwrap(), Some(saved.clone()));

        // 非認證錯誤不影響 session 檔
        assert!(!store
            .discard_rejected(
                SessionSource::Saved,
                &AppError::Api {
                    status: 502,
                    message: "Bad Gateway".to_string()
                }
            )
            .await
            .unwrap());
        assert_eq!(store.load().await.unwrap(), Some(saved));

        assert!(store
            .discard_rejected(SessionSource::Saved, &rejected)
            .await
            .unwrap());
        assert!(store.load().await.unwrap().is_none());
    }
}
