//! Invalidation after an activity has been processed.
//!
//! The invalidation set over-approximates: dropping an entry that did not
//! change costs a reload, keeping one that did serves stale data.

use std::collections::HashSet;

use tracing::debug;

use fedbox_vocab::{collections::is_valid_collection_iri, iri, CollectionType, Item};

use crate::cache::Cache;

/// Every IRI whose rendered representation `activity` may have changed.
///
/// `received_in` is the collection the activity arrived through: the
/// actor's outbox for outbound activities, the recipient's inbox for
/// inbound ones.
pub fn invalidation_set(activity: &Item, received_in: Option<&str>) -> Vec<String> {
    let mut set = Closure::default();

    for recipient in activity.recipients() {
        if iri::is_public(&recipient) {
            continue;
        }
        if is_valid_collection_iri(&recipient) {
            set.push(recipient);
        } else {
            set.push(CollectionType::Inbox.iri(&recipient));
        }
    }
    if let Some(collection) = received_in {
        set.push(collection.to_string());
    }
    set.object(activity);
    set.items
}

/// Drop the cache entries invalidated by `activity`. Returns true if any
/// entry was dropped.
pub fn activity_purge(cache: &Cache, activity: &Item, received_in: Option<&str>) -> bool {
    if !cache.is_enabled() {
        return false;
    }
    let set = invalidation_set(activity, received_in);
    let iris: Vec<&str> = set.iter().map(String::as_str).collect();
    let removed = cache.remove(&iris);
    debug!(
        activity = activity.id().unwrap_or_default(),
        iris = iris.len(),
        removed,
        "activity purge"
    );
    removed
}

#[derive(Default)]
struct Closure {
    items: Vec<String>,
    seen: HashSet<String>,
    visited: HashSet<String>,
}

impl Closure {
    fn push(&mut self, iri: String) {
        if self.seen.insert(iri.clone()) {
            self.items.push(iri);
        }
    }

    fn with_parent(&mut self, iri: &str) {
        self.push(iri.to_string());
        if let Some(parent) = iri::parent(iri) {
            self.push(parent);
        }
    }

    /// The item itself, its container, the replies of everything it answers
    /// and its author's outbox. Activities recurse into their objects.
    fn object(&mut self, item: &Item) {
        let Some(id) = item.id() else {
            return;
        };
        if !self.visited.insert(id.to_string()) {
            return;
        }
        self.with_parent(id);
        for parent in item.iris("inReplyTo") {
            self.push(CollectionType::Replies.iri(&parent));
        }
        for author in item.iris("attributedTo") {
            self.push(CollectionType::Outbox.iri(&author));
        }
        if item.is_activity() {
            for object in item.items("object").iter().chain(item.items("target").iter()) {
                self.object(object);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::CacheKey;
    use serde_json::json;

    fn reply_activity() -> Item {
        Item::try_from(json!({
            "id": "https://example.com/activities/1",
            "type": "Create",
            "actor": "https://example.com/actors/a",
            "to": ["https://www.w3.org/ns/activitystreams#Public", "https://example.com/actors/a/followers"],
            "cc": ["https://remote.org/actors/b"],
            "object": {
                "id": "https://example.com/objects/3",
                "type": "Note",
                "attributedTo": "https://example.com/actors/a",
                "inReplyTo": ["https://example.com/objects/p2", "https://example.com/objects/p1"],
            },
        }))
        .unwrap()
    }

    #[test]
    fn closure_covers_reply_chain_and_audience() {
        let set = invalidation_set(&reply_activity(), Some("https://example.com/actors/a/outbox"));
        for expected in [
            "https://example.com/activities/1",
            "https://example.com/activities",
            "https://example.com/objects/3",
            "https://example.com/objects",
            "https://example.com/actors/a/followers",
            "https://remote.org/actors/b/inbox",
            "https://example.com/objects/p1/replies",
            "https://example.com/objects/p2/replies",
            "https://example.com/actors/a/outbox",
        ] {
            assert!(set.iter().any(|i| i == expected), "missing {expected}");
        }
        assert!(!set.iter().any(|i| iri::is_public(i)));
        let unique: HashSet<_> = set.iter().collect();
        assert_eq!(unique.len(), set.len());
    }

    #[test]
    fn nested_activities_are_followed() {
        let undo = Item::try_from(json!({
            "id": "https://example.com/activities/2",
            "type": "Undo",
            "object": {
                "id": "https://example.com/activities/1",
                "type": "Like",
                "object": "https://example.com/objects/9",
            },
        }))
        .unwrap();
        let set = invalidation_set(&undo, None);
        assert!(set.contains(&"https://example.com/activities/1".to_string()));
        assert!(set.contains(&"https://example.com/objects/9".to_string()));
    }

    #[test]
    fn purge_drops_affected_entries_only() {
        let cache = Cache::default();
        let followers_page = CacheKey::from_iri("https://example.com/actors/a/followers?page=1").unwrap();
        let replies = CacheKey::from_iri("https://example.com/objects/p1/replies").unwrap();
        let unrelated = CacheKey::from_iri("https://example.com/actors/c/outbox").unwrap();
        for key in [&followers_page, &replies, &unrelated] {
            cache.set(key.clone(), Item::link(key.to_string()));
        }

        assert!(activity_purge(&cache, &reply_activity(), None));
        assert!(cache.get(&followers_page).is_none());
        assert!(cache.get(&replies).is_none());
        assert!(cache.get(&unrelated).is_some());
    }

    #[test]
    fn disabled_cache_never_purges() {
        assert!(!activity_purge(&Cache::disabled(), &reply_activity(), None));
    }
}
