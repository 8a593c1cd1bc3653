use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;

pub const ACCESS_TOKEN_KEY: &str = "access_token";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token storage error: {0}")]
    Storage(String),

    #[error("token storage lock poisoned")]
    LockPoisoned,
}

/// Source of the bearer token attached to every backend request.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// `Ok(None)` means the user is signed out.
    async fn bearer_token(&self) -> Result<Option<SecretString>, TokenError>;
}

/// Fixed token, handy for hosts that manage the session themselves.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenProvider {
    token: Option<SecretString>,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(SecretString::new(token.into())),
        }
    }

    pub fn signed_out() -> Self {
        Self { token: None }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn bearer_token(&self) -> Result<Option<SecretString>, TokenError> {
        Ok(self.token.clone())
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use self::sqlite::SqliteTokenStore;

#[cfg(not(target_arch = "wasm32"))]
mod sqlite {
    use super::{TokenError, TokenProvider, ACCESS_TOKEN_KEY};
    use async_trait::async_trait;
    use rusqlite::{params, Connection, OptionalExtension};
    use secrecy::{ExposeSecret, SecretString};
    use std::path::Path;
    use std::sync::Mutex;
    use tracing::{debug, instrument};

    /// Persistent key/value session storage backed by SQLite.
    pub struct SqliteTokenStore {
        conn: Mutex<Connection>,
        key: String,
    }

    impl SqliteTokenStore {
        pub fn open(path: impl AsRef<Path>) -> Result<Self, TokenError> {
            let conn = Connection::open(path).map_err(storage_error)?;
            Self::init(conn)
        }

        pub fn open_in_memory() -> Result<Self, TokenError> {
            let conn = Connection::open_in_memory().map_err(storage_error)?;
            Self::init(conn)
        }

        fn init(conn: Connection) -> Result<Self, TokenError> {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS session_kv (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                )",
                [],
            )
            .map_err(storage_error)?;

            Ok(Self {
                conn: Mutex::new(conn),
                key: ACCESS_TOKEN_KEY.to_string(),
            })
        }

        /// Stores the token under a different key, e.g. per environment.
        #[must_use]
        pub fn with_key(mut self, key: impl Into<String>) -> Self {
            self.key = key.into();
            self
        }

        #[instrument(skip(self, token), fields(key = %self.key))]
        pub fn store(&self, token: &SecretString) -> Result<(), TokenError> {
            let conn = self.conn.lock().map_err(|_| TokenError::LockPoisoned)?;
            conn.execute(
                "INSERT INTO session_kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![self.key, token.expose_secret()],
            )
            .map_err(storage_error)?;
            debug!("Access token stored");
            Ok(())
        }

        #[instrument(skip(self), fields(key = %self.key))]
        pub fn clear(&self) -> Result<(), TokenError> {
            let conn = self.conn.lock().map_err(|_| TokenError::LockPoisoned)?;
            conn.execute("DELETE FROM session_kv WHERE key = ?1", params![self.key])
                .map_err(storage_error)?;
            debug!("Access token cleared");
            Ok(())
        }

        pub fn load(&self) -> Result<Option<SecretString>, TokenError> {
            let conn = self.conn.lock().map_err(|_| TokenError::LockPoisoned)?;
            let value: Option<String> = conn
                .query_row(
                    "SELECT value FROM session_kv WHERE key = ?1",
                    params![self.key],
                    |row| row.get(0),
                )
                .optional()
                .map_err(storage_error)?;

            Ok(value
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::new))
        }
    }

    #[async_trait]
    impl TokenProvider for SqliteTokenStore {
        async fn bearer_token(&self) -> Result<Option<SecretString>, TokenError> {
            self.load()
        }
    }

    fn storage_error(e: rusqlite::Error) -> TokenError {
        TokenError::Storage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticTokenProvider::new("abc");
        let token = provider.bearer_token().await.unwrap().unwrap();
        assert_eq!(token.expose_secret(), "abc");

        assert!(StaticTokenProvider::signed_out()
            .bearer_token()
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_sqlite_store_roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.db");

        {
            let store = SqliteTokenStore::open(&path).unwrap();
            assert!(store.bearer_token().await.unwrap().is_none());
            store.store(&SecretString::new("first".into())).unwrap();
            store.store(&SecretString::new("second".into())).unwrap();
        }

        let reopened = SqliteTokenStore::open(&path).unwrap();
        let token = reopened.bearer_token().await.unwrap().unwrap();
        assert_eq!(token.expose_secret(), "second");

        reopened.clear().unwrap();
        assert!(reopened.bearer_token().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_store_keys_are_isolated() {
        let store = SqliteTokenStore::open_in_memory().unwrap().with_key("staging_token");
        store.store(&SecretString::new("staging".into())).unwrap();
        assert_eq!(
            store.load().unwrap().unwrap().expose_secret(),
            "staging"
        );
    }

    #[test]
    fn test_blank_token_treated_as_signed_out() {
        let store = SqliteTokenStore::open_in_memory().unwrap();
        store.store(&SecretString::new("   ".into())).unwrap();
        assert!(store.load().unwrap().is_none());
    }
}
