//! Query model for FedBOX collections.
//!
//! A [`Filters`] value names a target IRI, a set of predicates over item
//! fields and the page to return. Predicates on different fields are
//! AND-ed together; the values given for one field are OR-ed.
//!
//! # Modules
//!
//! - [`filter`]: [`Filters`], [`CompStr`] and predicate evaluation
//! - [`query`]: decoding filters from a request IRI's query string
//! - [`page`]: ordering, truncation and the [`Page`] result type

pub mod error;
pub mod filter;
pub mod page;
pub mod query;

pub use error::{FilterError, Result};
pub use filter::{CompStr, Filters, Operator, MAX_ITEMS};
pub use page::Page;
