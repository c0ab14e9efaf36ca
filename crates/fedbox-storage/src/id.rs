//! IRI generation for new items.

use tracing::debug;
use url::Url;
use uuid::Uuid;

use fedbox_vocab::{iri, CollectionType, Item};

use crate::error::{StorageError, StorageResult};

/// Root partition IRI for an item: `{base}/activities`, `{base}/actors`
/// or `{base}/objects`.
pub fn partition_iri(base: &Url, item: &Item) -> StorageResult<String> {
    let kind = item
        .kind()
        .ok_or_else(|| StorageError::NotValid("cannot generate an id for an item without a type".into()))?;
    Ok(CollectionType::partition_for(kind).iri(base.as_str()))
}

/// `{partition}/{uuid}` with a time-ordered v7 UUID.
pub fn generate(base: &Url, item: &Item, by: Option<&Item>) -> StorageResult<String> {
    let partition = partition_iri(base, item)?;
    let id = iri::join(&partition, &Uuid::now_v7().to_string());
    debug!(
        id = %id,
        kind = item.kind().unwrap_or_default(),
        by = by.and_then(Item::id).unwrap_or_default(),
        "generated id"
    );
    Ok(id)
}
