use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

use fedbox_cache::CacheConfig;
use fedbox_storage::StorageConfig;

/// File read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "fedbox.toml";

/// Contents of the configuration file.
///
/// ```toml
/// [storage]
/// backend = "fs"
/// path = "/var/lib/fedbox"
/// base_url = "https://example.com"
///
/// [cache]
/// enabled = false
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub cache: CacheConfig,
}

impl Config {
    /// Read `path`, or `fedbox.toml` when absent. Only the default file may
    /// be missing; defaults are used in that case.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no configuration file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        Self::parse(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }
}
