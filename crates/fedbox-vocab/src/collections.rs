//! Well-known collection names.
//!
//! A collection IRI is recognised purely by its last path segment:
//! `{owner}/inbox`, `{owner}/replies`, `{base}/objects` and so on.

use std::fmt;
use std::str::FromStr;

use crate::iri;
use crate::kinds;

/// The collection names FedBOX knows how to store and list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CollectionType {
    Inbox,
    Outbox,
    Followers,
    Following,
    Liked,
    Likes,
    Shares,
    Replies,
    /// Root partition holding every activity.
    Activities,
    /// Root partition holding every actor.
    Actors,
    /// Root partition holding every other object.
    Objects,
}

impl CollectionType {
    pub const ALL: [CollectionType; 11] = [
        Self::Inbox,
        Self::Outbox,
        Self::Followers,
        Self::Following,
        Self::Liked,
        Self::Likes,
        Self::Shares,
        Self::Replies,
        Self::Activities,
        Self::Actors,
        Self::Objects,
    ];

    /// Relationship collections owned by an actor.
    pub const ACTOR: [CollectionType; 5] = [
        Self::Inbox,
        Self::Outbox,
        Self::Followers,
        Self::Following,
        Self::Liked,
    ];

    /// Relationship collections owned by any object.
    pub const OBJECT: [CollectionType; 3] = [Self::Likes, Self::Shares, Self::Replies];

    /// The root type partitions.
    pub const PARTITIONS: [CollectionType; 3] = [Self::Activities, Self::Actors, Self::Objects];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbox => "inbox",
            Self::Outbox => "outbox",
            Self::Followers => "followers",
            Self::Following => "following",
            Self::Liked => "liked",
            Self::Likes => "likes",
            Self::Shares => "shares",
            Self::Replies => "replies",
            Self::Activities => "activities",
            Self::Actors => "actors",
            Self::Objects => "objects",
        }
    }

    pub fn is_partition(&self) -> bool {
        Self::PARTITIONS.contains(self)
    }

    /// The collection IRI below `owner`.
    pub fn iri(&self, owner: &str) -> String {
        iri::join(owner, self.as_str())
    }

    /// The collection type named by an IRI's last path segment.
    pub fn of_iri(collection: &str) -> Option<Self> {
        iri::last_segment(collection)?.parse().ok()
    }

    /// Root partition an item of the given vocabulary type is stored under.
    pub fn partition_for(kind: &str) -> Self {
        if kinds::is_activity(kind) {
            Self::Activities
        } else if kinds::is_actor(kind) {
            Self::Actors
        } else {
            Self::Objects
        }
    }
}

/// True when the IRI's last path segment names a known collection.
pub fn is_valid_collection_iri(collection: &str) -> bool {
    CollectionType::of_iri(collection).is_some()
}

impl FromStr for CollectionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown collection: {s}"))
    }
}

impl fmt::Display for CollectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
