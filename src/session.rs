//! Session storage.
//!
//! The access token and the user's profile live in a key/value store
//! that callers pass around explicitly. The statistics code never sees it.

use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Well-known session keys.
pub mod keys {
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const FIRST_NAME: &str = "first_name";
    pub const LAST_NAME: &str = "last_name";
    pub const USER_EMAIL: &str = "user_email";
    pub const IS_AUTHENTICATED: &str = "is_authenticated";
}

/// Key/value capability holding session state.
pub trait SessionStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn clear(&mut self) -> Result<()>;

    /// The stored access token, if the user is logged in.
    fn access_token(&self) -> Option<String> {
        self.get(keys::ACCESS_TOKEN).filter(|t| !t.is_empty())
    }

    /// Record the user's name and email.
    fn set_profile(&mut self, first_name: &str, last_name: &str, email: &str) -> Result<()> {
        self.set(keys::FIRST_NAME, first_name)?;
        self.set(keys::LAST_NAME, last_name)?;
        self.set(keys::USER_EMAIL, email)
    }
}

/// Store that lives only as long as the process.
#[allow(dead_code)] // Used by tests and embedders without a session file
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.values.clear();
        Ok(())
    }
}

/// Store persisted as a JSON object on disk. Every write is flushed.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileStore {
    /// Open the store at `path`, starting empty if the file doesn't exist.
    pub fn open(path: &Path) -> Result<Self> {
        let values = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read session file: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse session file: {}", path.display()))?
        } else {
            debug!("No session file at {}", path.display());
            BTreeMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            values,
        })
    }

    fn persist(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write session file: {}", self.path.display()))
    }
}

impl SessionStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        self.persist()
    }

    fn clear(&mut self) -> Result<()> {
        self.values.clear();
        if self.path.exists() {
            std::fs::remove_file(&self.path).with_context(|| {
                format!("Failed to remove session file: {}", self.path.display())
            })?;
        }
        Ok(())
    }
}
