//! IRI-addressed document storage for FedBOX.
//!
//! Every ActivityStreams document is stored at the location its IRI maps
//! to (see [`addressing`]). Collections are documents too, and membership is
//! always a reference to the member's IRI, never a copy of the member.
//!
//! # Backends
//!
//! All backends implement the [`Repository`] trait:
//!
//! - [`KvRepository`] -- redb database file, or an in-memory database for tests
//! - [`FsRepository`] -- directory tree with symlinked collection members
//!
//! Password and metadata storage are optional capabilities, probed with
//! [`password_store`] and [`metadata_store`].
//!
//! # Design Rules
//!
//! 1. One IRI, one document. Saving again overwrites.
//! 2. Deleting writes a Tombstone in place; references to it stay valid.
//! 3. Only collections on the local instance are ever mutated.
//! 4. Secrets live beside the document, never inside it.
//! 5. Every operation acquires and releases its own storage handle.

pub mod addressing;
pub mod bootstrap;
pub mod bulk;
pub mod config;
pub mod error;
pub mod fs;
pub mod id;
pub mod kv;
pub mod membership;
pub mod metadata;
pub mod traits;

pub use addressing::Location;
pub use bootstrap::bootstrap;
pub use bulk::{copy_to_collection, move_to_collection, TransferReport};
pub use config::{BackendKind, StorageConfig};
pub use error::{StorageError, StorageResult};
pub use fs::FsRepository;
pub use kv::KvRepository;
pub use metadata::Metadata;
pub use traits::{load_item, metadata_store, password_store, MetadataStore, PasswordStore, Repository};

/// Build the repository selected by `config`.
pub fn open_repository(config: &StorageConfig) -> StorageResult<Box<dyn Repository>> {
    let repo: Box<dyn Repository> = match config.backend {
        BackendKind::Kv => Box::new(KvRepository::new(config)?),
        BackendKind::Fs => Box::new(FsRepository::new(config)?),
    };
    tracing::debug!(backend = ?config.backend, path = %config.path.display(), "repository configured");
    Ok(repo)
}
