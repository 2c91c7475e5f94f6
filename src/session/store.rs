//! CredentialStore - durable credential and usage counter.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::veo::Credential;

/// Key of the stored credential entry.
pub const CREDENTIAL_KEY: &str = "gemini-api-key";

/// Key of the stored usage counter entry (textual integer).
pub const USAGE_KEY: &str = "generationCount";

/// What was last persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredState {
    pub credential: Option<Credential>,
    pub usage: u32,
}

/// Persistence for the credential and its usage counter.
///
/// Single reader and writer; no cross-process coordination.
pub trait CredentialStore {
    /// Last saved values, or defaults when nothing was stored.
    fn load(&self) -> Result<StoredState, StoreError>;

    /// Overwrite the credential and reset the counter to 0.
    fn save(&mut self, credential: &Credential) -> Result<(), StoreError>;

    /// Remove the credential. The counter is left as is.
    fn clear(&mut self) -> Result<(), StoreError>;

    /// Persist the usage counter.
    fn record_usage(&mut self, usage: u32) -> Result<(), StoreError>;
}

/// Build a state from the two string-keyed entries.
fn state_from_entries(entries: &BTreeMap<String, String>) -> StoredState {
    let credential = entries
        .get(CREDENTIAL_KEY)
        .and_then(|value| Credential::new(value.as_str()).ok());
    let usage = match entries.get(USAGE_KEY) {
        Some(text) => text.trim().parse::<u32>().unwrap_or_else(|_| {
            log::warn!("Ignoring malformed usage counter {:?}", text);
            0
        }),
        None => 0,
    };
    StoredState { credential, usage }
}

/// In-memory store, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw entry access.
    pub fn entry(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Insert a raw entry.
    pub fn set_entry(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }
}

impl CredentialStore for MemoryStore {
    fn load(&self) -> Result<StoredState, StoreError> {
        Ok(state_from_entries(&self.entries))
    }

    fn save(&mut self, credential: &Credential) -> Result<(), StoreError> {
        self.set_entry(CREDENTIAL_KEY, credential.expose());
        self.set_entry(USAGE_KEY, "0");
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.entries.remove(CREDENTIAL_KEY);
        Ok(())
    }

    fn record_usage(&mut self, usage: u32) -> Result<(), StoreError> {
        self.set_entry(USAGE_KEY, &usage.to_string());
        Ok(())
    }
}

/// TOML file of string entries, replaced atomically on every write.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store at the default location: `<data dir>/veo-studio/state.toml`.
    pub fn with_default_path() -> Self {
        Self::new(default_state_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>, StoreError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| StoreError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| StoreError::Parse {
            path: self.path.clone(),
            source: e,
        })
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let io_err = |e| StoreError::Io {
            path: self.path.clone(),
            source: e,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = toml::to_string(entries)?;
        let tmp = self.path.with_extension("toml.tmp");
        std::fs::write(&tmp, content).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<(), StoreError> {
        let mut entries = self.read_entries()?;
        f(&mut entries);
        self.write_entries(&entries)
    }
}

impl CredentialStore for FileStore {
    fn load(&self) -> Result<StoredState, StoreError> {
        Ok(state_from_entries(&self.read_entries()?))
    }

    fn save(&mut self, credential: &Credential) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.insert(CREDENTIAL_KEY.to_string(), credential.expose().to_string());
            entries.insert(USAGE_KEY.to_string(), "0".to_string());
        })
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.remove(CREDENTIAL_KEY);
        })
    }

    fn record_usage(&mut self, usage: u32) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.insert(USAGE_KEY.to_string(), usage.to_string());
        })
    }
}

/// Default state file path.
pub fn default_state_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from(".local/share"))
        .join("veo-studio")
        .join("state.toml")
}

/// Errors from reading or writing the state file.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to access state file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse state file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to encode state: {0}")]
    Encode(#[from] toml::ser::Error),
}
