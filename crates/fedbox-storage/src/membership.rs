//! Collection-membership bookkeeping shared by the backends.
//!
//! Actors own inbox/outbox/followers/following/liked, every other object
//! owns likes/shares/replies. Those collections are created empty the first
//! time the owner is saved with the field populated, and the field is
//! flattened to the collection IRI on the stored document.

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use url::Url;

use fedbox_vocab::{iri, CollectionType, Item};

use crate::addressing::Location;
use crate::error::{StorageError, StorageResult};

/// Relationship collections referenced by an item, one per populated field.
pub fn owned_collections(item: &Item) -> Vec<(CollectionType, String)> {
    if item.is_link() || item.is_collection() || item.is_tombstone() {
        return Vec::new();
    }
    let kinds: Vec<CollectionType> = if item.is_actor() {
        CollectionType::ACTOR.into_iter().chain(CollectionType::OBJECT).collect()
    } else {
        CollectionType::OBJECT.to_vec()
    };
    kinds
        .into_iter()
        .filter_map(|kind| Some((kind, item.iris(kind.as_str()).into_iter().next()?)))
        .collect()
}

/// Collections the item owns that live on this instance below the item's
/// own IRI; these are the ones removed when the item is deleted.
pub fn teardown_collections(item: &Item, base: &Url) -> Vec<String> {
    let Some(owner) = item.id() else {
        return Vec::new();
    };
    owned_collections(item)
        .into_iter()
        .map(|(_, col)| col)
        .filter(|col| is_local(base, col) && iri::contains_str(owner, col))
        .collect()
}

/// Flatten collection fields to IRIs and return the local collections that
/// must exist once the item is stored.
pub fn prepare_for_save(mut item: Item, base: &Url) -> (Item, Vec<String>) {
    let mut ensure = Vec::new();
    for (kind, col) in owned_collections(&item) {
        item.set(kind.as_str(), Value::String(col.clone()));
        if is_local(base, &col) {
            ensure.push(col);
        }
    }
    (item, ensure)
}

pub fn is_local(base: &Url, target: &str) -> bool {
    iri::parse(target).is_some_and(|u| iri::same_origin(base, &u))
}

/// Accept only recognised collection IRIs on this instance.
pub fn check_local_collection(base: &Url, collection: &str) -> StorageResult<CollectionType> {
    let kind = CollectionType::of_iri(collection)
        .ok_or_else(|| StorageError::NotValid(format!("{collection} is not a collection")))?;
    if !is_local(base, collection) {
        return Err(StorageError::NotValid(format!(
            "{collection} does not belong to this instance"
        )));
    }
    Ok(kind)
}

/// The IRI of an item about to be added to or removed from a collection.
pub fn member_iri(item: &Item) -> StorageResult<&str> {
    item.id()
        .ok_or_else(|| StorageError::NotValid("item has no id".into()))
}

/// The IRI a document is stored under. A bare link only references a
/// document and cannot be stored itself.
pub fn document_iri(item: &Item) -> StorageResult<&str> {
    let iri = member_iri(item)?;
    if item.is_link() {
        return Err(StorageError::NotValid(format!("{iri} is a link, not a document")));
    }
    Ok(iri)
}

/// True when `member` is stored directly below the partition `collection`.
/// That membership follows from the storage layout and cannot be changed.
pub fn stored_in_partition(kind: CollectionType, collection: &str, member: &str) -> bool {
    if !kind.is_partition() {
        return false;
    }
    match (Location::from_iri(collection), Location::from_iri(member).and_then(|m| m.parent())) {
        (Some(collection), Some(parent)) => collection == parent,
        _ => false,
    }
}

/// An empty ordered collection document.
pub fn new_collection(collection: &str) -> Item {
    let doc = json!({
        "id": collection,
        "type": "OrderedCollection",
        "totalItems": 0,
        "orderedItems": [],
        "published": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    });
    Item::try_from(doc).unwrap_or_else(|_| Item::link(collection))
}

/// Member IRIs recorded on a collection document, in insertion order.
pub fn member_refs(collection: &Item) -> Vec<String> {
    collection.collection_items().iter().filter_map(|m| m.id().map(str::to_string)).collect()
}

/// Append a member reference. Returns false if it was already present.
pub fn add_ref(collection: &mut Item, member: &str) -> bool {
    let mut refs = member_refs(collection);
    if refs.iter().any(|r| r == member) {
        return false;
    }
    refs.push(member.to_string());
    write_refs(collection, refs);
    true
}

/// Drop a member reference. Returns false if it was not present.
pub fn remove_ref(collection: &mut Item, member: &str) -> bool {
    let mut refs = member_refs(collection);
    let before = refs.len();
    refs.retain(|r| r != member);
    if refs.len() == before {
        return false;
    }
    write_refs(collection, refs);
    true
}

fn write_refs(collection: &mut Item, refs: Vec<String>) {
    collection.remove("items");
    collection.set("totalItems", json!(refs.len()));
    collection.set("orderedItems", Value::Array(refs.into_iter().map(Value::String).collect()));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com").unwrap()
    }

    fn actor() -> Item {
        Item::try_from(json!({
            "id": "https://example.com/actors/a",
            "type": "Person",
            "inbox": "https://example.com/actors/a/inbox",
            "outbox": {"id": "https://example.com/actors/a/outbox", "type": "OrderedCollection"},
            "followers": "https://remote.org/actors/a/followers",
        }))
        .unwrap()
    }

    #[test]
    fn actor_collections_are_flattened() {
        let (saved, ensure) = prepare_for_save(actor(), &base());
        assert_eq!(saved.get("outbox"), Some(&json!("https://example.com/actors/a/outbox")));
        assert_eq!(
            ensure,
            vec![
                "https://example.com/actors/a/inbox".to_string(),
                "https://example.com/actors/a/outbox".to_string(),
            ]
        );
        // Remote collection IRIs stay on the document but are not created.
        assert_eq!(saved.get("followers"), Some(&json!("https://remote.org/actors/a/followers")));
    }

    #[test]
    fn objects_own_replies_likes_shares() {
        let note = Item::try_from(json!({
            "id": "https://example.com/objects/1",
            "type": "Note",
            "replies": "https://example.com/objects/1/replies",
            "inbox": "https://example.com/objects/1/inbox",
        }))
        .unwrap();
        let owned = owned_collections(&note);
        assert_eq!(owned, vec![(CollectionType::Replies, "https://example.com/objects/1/replies".into())]);
    }

    #[test]
    fn collections_and_tombstones_own_nothing() {
        assert!(owned_collections(&new_collection("https://example.com/objects/1/replies")).is_empty());
        assert!(owned_collections(&Item::new("Tombstone", Some("https://example.com/objects/1"))).is_empty());
    }

    #[test]
    fn teardown_only_covers_own_local_collections() {
        let torn = teardown_collections(&actor(), &base());
        assert_eq!(
            torn,
            vec![
                "https://example.com/actors/a/inbox".to_string(),
                "https://example.com/actors/a/outbox".to_string(),
            ]
        );
    }

    #[test]
    fn local_collection_check() {
        assert_eq!(
            check_local_collection(&base(), "https://example.com/actors/a/liked").unwrap(),
            CollectionType::Liked
        );
        assert!(check_local_collection(&base(), "https://remote.org/actors/a/liked").is_err());
        assert!(check_local_collection(&base(), "https://example.com/actors/a").is_err());
    }

    #[test]
    fn links_are_not_documents() {
        let err = document_iri(&Item::link("https://example.com/objects/1")).unwrap_err();
        assert!(matches!(err, StorageError::NotValid(_)));
        let note = Item::new("Note", Some("https://example.com/objects/1"));
        assert_eq!(document_iri(&note).unwrap(), "https://example.com/objects/1");
    }

    #[test]
    fn partition_children_are_fixed_members() {
        let objects = "https://example.com/objects";
        assert!(stored_in_partition(CollectionType::Objects, objects, "https://example.com/objects/1"));
        assert!(stored_in_partition(CollectionType::Objects, objects, "http://example.com/objects/1"));
        assert!(!stored_in_partition(CollectionType::Objects, objects, "https://example.com/objects/1/replies"));
        assert!(!stored_in_partition(CollectionType::Objects, objects, "https://remote.org/objects/1"));
        assert!(!stored_in_partition(
            CollectionType::Inbox,
            "https://example.com/actors/a/inbox",
            "https://example.com/actors/a/inbox/1"
        ));
    }

    #[test]
    fn refs_are_never_duplicated() {
        let mut col = new_collection("https://example.com/actors/a/liked");
        assert!(add_ref(&mut col, "https://example.com/activities/1"));
        assert!(!add_ref(&mut col, "https://example.com/activities/1"));
        assert!(add_ref(&mut col, "https://example.com/activities/2"));
        assert_eq!(member_refs(&col).len(), 2);
        assert_eq!(col.get("totalItems"), Some(&json!(2)));

        assert!(remove_ref(&mut col, "https://example.com/activities/1"));
        assert!(!remove_ref(&mut col, "https://example.com/activities/1"));
        assert_eq!(member_refs(&col), vec!["https://example.com/activities/2".to_string()]);
    }
}
