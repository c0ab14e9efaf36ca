//! The repository contract every storage backend implements.

use url::Url;

use fedbox_filters::{Filters, Page};
use fedbox_vocab::Item;

use crate::error::{StorageError, StorageResult};
use crate::id;
use crate::metadata::Metadata;

/// IRI-addressed document storage.
///
/// All implementations must satisfy these invariants:
/// - An IRI identifies at most one document; saving it again overwrites.
/// - Collection membership is a reference by IRI, never a copy.
/// - Deletion leaves a Tombstone at the IRI; storage keys are never removed
///   for deleted items, and references held by collections stay in place.
/// - Every method acquires the storage handle itself and releases it on all
///   exit paths. Implementations are `Send + Sync` and may be called from
///   many threads at once.
pub trait Repository: Send + Sync {
    /// Acquire the storage handle. Calling it repeatedly is harmless.
    fn open(&self) -> StorageResult<()>;

    /// Release whatever [`Repository::open`] acquired. Calling it
    /// repeatedly is harmless.
    fn close(&self);

    /// Base IRI of the local instance.
    fn base_url(&self) -> &Url;

    /// Resolve the filter's target and return the matching page.
    ///
    /// Collections list their members after predicate filtering; a single
    /// item is returned alone, or not at all when the predicates reject it.
    /// A missing target is `NotFound` unless it is a valid collection IRI,
    /// which loads as an empty collection.
    fn load(&self, filters: &Filters) -> StorageResult<Page>;

    /// Upsert the item at its own IRI, creating its relationship
    /// collections on first save. Returns the stored document.
    fn save(&self, item: Item) -> StorageResult<Item>;

    /// Replace the item with a Tombstone and tear down the collections it
    /// owns. Returns the Tombstone.
    fn delete(&self, item: &Item) -> StorageResult<Item>;

    /// Record `item` as a member of the local collection `collection`.
    /// Adding an existing member is a no-op.
    fn add_to_collection(&self, collection: &str, item: &Item) -> StorageResult<()>;

    /// Drop `item` from the local collection `collection`.
    fn remove_from_collection(&self, collection: &str, item: &Item) -> StorageResult<()>;

    /// A fresh IRI under the root partition matching the item's type.
    fn generate_id(&self, item: &Item, by: Option<&Item>) -> StorageResult<String> {
        id::generate(self.base_url(), item, by)
    }

    fn as_password_store(&self) -> Option<&dyn PasswordStore> {
        None
    }

    fn as_metadata_store(&self) -> Option<&dyn MetadataStore> {
        None
    }
}

/// Optional capability: password storage.
pub trait PasswordStore: Send + Sync {
    /// Hash and store a password for an existing item.
    fn password_set(&self, iri: &str, password: &[u8]) -> StorageResult<()>;

    /// Compare against the stored hash; a mismatch is `Unauthorized`.
    fn password_check(&self, iri: &str, password: &[u8]) -> StorageResult<()>;
}

/// Optional capability: metadata side storage.
pub trait MetadataStore: Send + Sync {
    /// Missing metadata is `NotFound`, never a default value.
    fn load_metadata(&self, iri: &str) -> StorageResult<Metadata>;

    fn save_metadata(&self, iri: &str, meta: &Metadata) -> StorageResult<()>;
}

/// Probe a repository for password storage.
pub fn password_store(repo: &dyn Repository) -> StorageResult<&dyn PasswordStore> {
    repo.as_password_store()
        .ok_or(StorageError::NotImplemented("password storage"))
}

/// Probe a repository for metadata storage.
pub fn metadata_store(repo: &dyn Repository) -> StorageResult<&dyn MetadataStore> {
    repo.as_metadata_store()
        .ok_or(StorageError::NotImplemented("metadata storage"))
}

/// Load a single item by IRI, treating an empty result as `NotFound`.
pub fn load_item(repo: &dyn Repository, iri: &str) -> StorageResult<Item> {
    let page = repo.load(&Filters::new(iri))?;
    if page.is_collection() {
        return Err(StorageError::NotValid(format!("{iri} is a collection")));
    }
    page.items
        .into_iter()
        .next()
        .ok_or_else(|| StorageError::not_found(iri))
}
