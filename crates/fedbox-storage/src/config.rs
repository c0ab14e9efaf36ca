use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{StorageError, StorageResult};

/// Which physical storage a repository uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Single-file embedded key-value store (redb).
    #[default]
    Kv,
    /// Directory tree with symlinked collection members.
    Fs,
}

/// Storage settings handed to a repository constructor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: BackendKind,
    /// Storage directory. The kv backend keeps its database file inside it.
    pub path: PathBuf,
    /// Public base IRI of this instance; collections under other hosts are
    /// never mutated locally.
    pub base_url: String,
    /// bcrypt work factor for stored passwords.
    pub bcrypt_cost: u32,
}

impl StorageConfig {
    pub const KV_FILE_NAME: &'static str = "fedbox.redb";

    pub fn base(&self) -> StorageResult<Url> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| StorageError::NotValid(format!("base url {}: {e}", self.base_url)))?;
        if !url.has_host() {
            return Err(StorageError::NotValid(format!("base url {} has no host", self.base_url)));
        }
        Ok(url)
    }

    pub fn kv_file(&self) -> PathBuf {
        self.path.join(Self::KV_FILE_NAME)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            path: PathBuf::from("storage"),
            base_url: "http://localhost:4000".into(),
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}
