//! Classification of ActivityStreams vocabulary type names.
//!
//! Storage only needs to know which broad class a `type` belongs to: it
//! decides the root partition an ID is generated under, and which
//! relationship collections an item owns.

/// Activity types with an `object`.
pub const ACTIVITY_TYPES: &[&str] = &[
    "Accept",
    "Add",
    "Announce",
    "Block",
    "Create",
    "Delete",
    "Dislike",
    "Flag",
    "Follow",
    "Ignore",
    "Invite",
    "Join",
    "Leave",
    "Like",
    "Listen",
    "Move",
    "Offer",
    "Read",
    "Reject",
    "Remove",
    "TentativeAccept",
    "TentativeReject",
    "Undo",
    "Update",
    "View",
];

/// Activity types without an `object`.
pub const INTRANSITIVE_ACTIVITY_TYPES: &[&str] =
    &["IntransitiveActivity", "Arrive", "Question", "Travel"];

/// Actor types.
pub const ACTOR_TYPES: &[&str] = &["Application", "Group", "Organization", "Person", "Service"];

/// Collection and collection page types.
pub const COLLECTION_TYPES: &[&str] = &[
    "Collection",
    "OrderedCollection",
    "CollectionPage",
    "OrderedCollectionPage",
];

pub const TOMBSTONE: &str = "Tombstone";
pub const ORDERED_COLLECTION: &str = "OrderedCollection";

/// True for both transitive and intransitive activity types, including the
/// bare `Activity` base type.
pub fn is_activity(kind: &str) -> bool {
    kind == "Activity" || ACTIVITY_TYPES.contains(&kind) || INTRANSITIVE_ACTIVITY_TYPES.contains(&kind)
}

pub fn is_actor(kind: &str) -> bool {
    ACTOR_TYPES.contains(&kind)
}

pub fn is_collection(kind: &str) -> bool {
    COLLECTION_TYPES.contains(&kind)
}

pub fn is_tombstone(kind: &str) -> bool {
    kind == TOMBSTONE
}
