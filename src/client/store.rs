//! Key-value storage for session tokens.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::ClientError;
use crate::types::{AuthResponse, UserSummary};

pub const TOKEN_KEY: &str = "scholar_finder_token";
pub const REFRESH_TOKEN_KEY: &str = "scholar_finder_refresh_token";
pub const USER_KEY: &str = "scholar_finder_user";

pub trait TokenStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, ClientError>;
    fn set(&self, key: &str, value: &str) -> Result<(), ClientError>;
    fn remove(&self, key: &str) -> Result<(), ClientError>;
}

fn poisoned() -> ClientError {
    ClientError::TokenStore("token store lock poisoned".to_string())
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        Ok(self.values.lock().map_err(|_| poisoned())?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
        self.values
            .lock()
            .map_err(|_| poisoned())?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ClientError> {
        self.values.lock().map_err(|_| poisoned())?.remove(key);
        Ok(())
    }
}

/// A JSON object on disk, rewritten on every change.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<HashMap<String, String>, ClientError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| ClientError::TokenStore(format!("failed to read {:?}: {}", self.path, e)))?;
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&content)
            .map_err(|e| ClientError::TokenStore(format!("failed to parse {:?}: {}", self.path, e)))
    }

    fn write(&self, values: &HashMap<String, String>) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| ClientError::TokenStore(format!("failed to create {:?}: {}", parent, e)))?;
        }
        let json = serde_json::to_string_pretty(values)
            .map_err(|e| ClientError::TokenStore(format!("failed to encode tokens: {}", e)))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)
            .and_then(|_| fs::rename(&tmp, &self.path))
            .map_err(|e| ClientError::TokenStore(format!("failed to write {:?}: {}", self.path, e)))
    }

    fn update(&self, change: impl FnOnce(&mut HashMap<String, String>)) -> Result<(), ClientError> {
        let _guard = self.lock.lock().map_err(|_| poisoned())?;
        let mut values = self.read()?;
        change(&mut values);
        self.write(&values)
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        let _guard = self.lock.lock().map_err(|_| poisoned())?;
        Ok(self.read()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
        self.update(|values| {
            values.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), ClientError> {
        self.update(|values| {
            values.remove(key);
        })
    }
}

/// Typed access to the session kept in a [`TokenStore`].
#[derive(Clone)]
pub struct TokenService {
    store: Arc<dyn TokenStore>,
}

impl TokenService {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryTokenStore::new()))
    }

    pub fn token(&self) -> Result<Option<String>, ClientError> {
        self.store.get(TOKEN_KEY)
    }

    pub fn set_token(&self, token: &str) -> Result<(), ClientError> {
        self.store.set(TOKEN_KEY, token)
    }

    pub fn refresh_token(&self) -> Result<Option<String>, ClientError> {
        self.store.get(REFRESH_TOKEN_KEY)
    }

    pub fn set_refresh_token(&self, token: &str) -> Result<(), ClientError> {
        self.store.set(REFRESH_TOKEN_KEY, token)
    }

    /// The stored user. Unreadable JSON counts as no user.
    pub fn user(&self) -> Result<Option<UserSummary>, ClientError> {
        Ok(self
            .store
            .get(USER_KEY)?
            .and_then(|raw| serde_json::from_str(&raw).ok()))
    }

    pub fn set_user(&self, user: &UserSummary) -> Result<(), ClientError> {
        let json = serde_json::to_string(user)
            .map_err(|e| ClientError::TokenStore(format!("failed to encode user: {}", e)))?;
        self.store.set(USER_KEY, &json)
    }

    /// Store both tokens and the user from a login, register or refresh.
    pub fn store_session(&self, auth: &AuthResponse) -> Result<(), ClientError> {
        self.set_token(&auth.access_token)?;
        self.set_refresh_token(&auth.refresh_token)?;
        self.set_user(&auth.user)
    }

    pub fn clear(&self) -> Result<(), ClientError> {
        self.store.remove(TOKEN_KEY)?;
        self.store.remove(REFRESH_TOKEN_KEY)?;
        self.store.remove(USER_KEY)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.token(), Ok(Some(_)))
    }
}
