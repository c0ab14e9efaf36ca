//! ActivityStreams document model for FedBOX.
//!
//! FedBOX stores every social object as the JSON document it was received
//! or created as. This crate gives that document a thin typed surface
//! without committing to the full ActivityStreams vocabulary.
//!
//! # Key Types
//!
//! - [`Item`]: an ActivityStreams document (object, actor, activity) or a bare IRI link
//! - [`CollectionType`]: the well-known collection names (inbox, outbox, ..., objects)
//! - [`kinds`]: classification of vocabulary type names (activity, actor, collection)
//! - [`iri`]: IRI parsing, containment and parent helpers
//! - [`tombstone`]: construction of the replacement document for deleted items

pub mod collections;
pub mod error;
pub mod iri;
pub mod item;
pub mod kinds;
pub mod tombstone;

pub use collections::CollectionType;
pub use error::VocabError;
pub use item::Item;
pub use tombstone::tombstone;
