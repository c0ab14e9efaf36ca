//! First-run setup of a storage location.

use serde_json::json;
use tracing::{debug, info};

use fedbox_vocab::{CollectionType, Item};

use crate::error::{StorageError, StorageResult};
use crate::membership;
use crate::traits::{load_item, Repository};

/// Create the instance's Service actor at the base IRI and the three root
/// partition collections. An instance that already has its Service actor
/// is returned as is.
pub fn bootstrap(repo: &dyn Repository) -> StorageResult<Item> {
    let base = repo.base_url().as_str().trim_end_matches('/').to_string();
    if let Some(existing) = load_service(repo, &base)? {
        debug!(base = %base, "storage already bootstrapped");
        return Ok(existing);
    }

    for partition in CollectionType::PARTITIONS {
        repo.save(membership::new_collection(&partition.iri(&base)))?;
    }
    let service = Item::try_from(json!({
        "id": base,
        "type": "Service",
        "name": "self",
        "inbox": CollectionType::Inbox.iri(&base),
        "outbox": CollectionType::Outbox.iri(&base),
    }))?;
    let service = repo.save(service)?;
    info!(base = %base, "storage bootstrapped");
    Ok(service)
}

fn load_service(repo: &dyn Repository, base: &str) -> StorageResult<Option<Item>> {
    match load_item(repo, base) {
        Ok(item) => Ok(Some(item)),
        Err(StorageError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::kv::KvRepository;
    use fedbox_filters::Filters;

    fn repo() -> KvRepository {
        let config = StorageConfig {
            base_url: "https://example.com".into(),
            ..StorageConfig::default()
        };
        KvRepository::in_memory(&config).unwrap()
    }

    #[test]
    fn creates_service_and_partitions() {
        let repo = repo();
        let service = bootstrap(&repo).unwrap();
        assert_eq!(service.id(), Some("https://example.com"));
        assert!(service.is_actor());
        assert!(load_item(&repo, "https://example.com").is_ok());

        let page = repo.load(&Filters::new("https://example.com/outbox")).unwrap();
        assert!(page.is_collection());
        assert_eq!(page.total_items, 0);
    }

    #[test]
    fn running_twice_keeps_existing_documents() {
        let repo = repo();
        let first = bootstrap(&repo).unwrap();
        let second = bootstrap(&repo).unwrap();
        assert_eq!(first, second);
    }
}
