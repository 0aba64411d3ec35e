// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token persistence scoped to one tab (one manager, or one CLI state dir).
//!
//! The access and refresh tokens are saved and cleared as a pair. A store
//! holding only one of them loads as empty.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Key of the access token entry.
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Key of the refresh token entry.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// File name used by [`FileStore::in_dir`].
pub const TOKEN_FILE: &str = "tokens.json";

/// A persisted token pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTokens {
    pub access_token: String,
    pub refresh_token: String,
}

impl StoredTokens {
    /// `None` when either token is empty; an empty token counts as missing.
    pub fn nonempty(self) -> Option<Self> {
        if self.access_token.is_empty() || self.refresh_token.is_empty() {
            return None;
        }
        Some(self)
    }
}

impl std::fmt::Debug for StoredTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredTokens")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Persistence backend for the token pair.
pub trait TokenStore: Send + Sync {
    /// Both tokens, or `None` if either is missing or unreadable.
    fn load(&self) -> Option<StoredTokens>;
    fn save(&self, tokens: &StoredTokens) -> anyhow::Result<()>;
    fn clear(&self) -> anyhow::Result<()>;
}

/// In-memory keyed store, the equivalent of a browser tab's session storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_item(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    pub fn set_item(&self, key: &str, value: impl Into<String>) {
        self.entries.lock().insert(key.to_owned(), value.into());
    }

    pub fn remove_item(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl TokenStore for MemoryStore {
    fn load(&self) -> Option<StoredTokens> {
        let entries = self.entries.lock();
        let access_token = entries.get(ACCESS_TOKEN_KEY)?.clone();
        let refresh_token = entries.get(REFRESH_TOKEN_KEY)?.clone();
        StoredTokens { access_token, refresh_token }.nonempty()
    }

    fn save(&self, tokens: &StoredTokens) -> anyhow::Result<()> {
        let mut entries = self.entries.lock();
        entries.insert(ACCESS_TOKEN_KEY.to_owned(), tokens.access_token.clone());
        entries.insert(REFRESH_TOKEN_KEY.to_owned(), tokens.refresh_token.clone());
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        let mut entries = self.entries.lock();
        entries.remove(ACCESS_TOKEN_KEY);
        entries.remove(REFRESH_TOKEN_KEY);
        Ok(())
    }
}

/// JSON file store with atomic writes (temp file + rename).
///
/// The temp file is created owner-only, so the token file is `0600` on unix.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(TOKEN_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

impl TokenStore for FileStore {
    fn load(&self) -> Option<StoredTokens> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), err = %e, "failed to read token file");
                return None;
            }
        };
        match serde_json::from_str::<StoredTokens>(&contents) {
            Ok(tokens) => tokens.nonempty(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), err = %e, "ignoring unreadable token file");
                None
            }
        }
    }

    fn save(&self, tokens: &StoredTokens) -> anyhow::Result<()> {
        let dir = self.dir();
        std::fs::create_dir_all(dir)?;
        let json = serde_json::to_vec(tokens)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
