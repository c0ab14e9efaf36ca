//! Replacement documents for deleted items.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::item::{Item, AUDIENCE_FIELDS};
use crate::kinds::TOMBSTONE;

/// Build the Tombstone that replaces `prior` at `iri`.
///
/// The tombstone keeps the prior audience so access checks against the
/// deleted IRI behave as before, and keeps `published` so the entry holds
/// its place in collection ordering. Tombstoning a tombstone returns it
/// with its original `formerType` and `deleted` timestamp.
pub fn tombstone(iri: &str, prior: &Item, now: DateTime<Utc>) -> Item {
    if prior.is_tombstone() {
        let mut again = prior.clone();
        again.set_id(iri);
        return again;
    }

    let mut tomb = Item::new(TOMBSTONE, Some(iri));
    if let Some(kind) = prior.kind() {
        tomb.set("formerType", Value::String(kind.to_string()));
    }
    for field in AUDIENCE_FIELDS.iter().copied().chain(["published"]) {
        if let Some(value) = prior.get(field) {
            tomb.set(field, value.clone());
        }
    }
    let stamp = Value::String(now.to_rfc3339_opts(SecondsFormat::Secs, true));
    tomb.set("deleted", stamp.clone());
    tomb.set("updated", stamp);
    tomb
}
