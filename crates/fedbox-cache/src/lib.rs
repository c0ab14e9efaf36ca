//! In-process response cache for FedBOX.
//!
//! Entries are keyed by a normalised request fingerprint ([`CacheKey`]) and
//! hold the last document or collection page rendered for it. After an
//! activity is processed, [`activity_purge`] drops every entry whose
//! representation the activity may have changed.
//!
//! Cache operations never fail. A disabled cache stores nothing and every
//! lookup misses.

pub mod cache;
pub mod config;
pub mod key;
pub mod purge;

pub use cache::Cache;
pub use config::CacheConfig;
pub use key::CacheKey;
pub use purge::{activity_purge, invalidation_set};
