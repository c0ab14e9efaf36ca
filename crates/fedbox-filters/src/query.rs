//! Decoding [`Filters`] from a request IRI.
//!
//! ```text
//! https://example.com/objects?type=Note&type=Article&name=~cat&maxItems=20&page=2
//! ```
//!
//! Repeated keys add alternatives for the same field. Unknown keys are
//! ignored.

use chrono::{DateTime, Utc};
use tracing::debug;
use url::Url;

use crate::error::{FilterError, Result};
use crate::filter::{CompStr, Filters, MAX_ITEMS};

impl Filters {
    /// Build filters from an IRI carrying a query string. The target is the
    /// IRI with query and fragment removed; the page length defaults to
    /// [`MAX_ITEMS`].
    pub fn from_url(url: &Url) -> Result<Self> {
        let mut target = url.clone();
        target.set_query(None);
        target.set_fragment(None);

        let mut filters = Filters::new(target.as_str().trim_end_matches('/'));
        filters.max_items = Some(MAX_ITEMS);

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "type" => filters.types.push(CompStr::parse(&value)),
                "iri" | "id" => filters.iris.push(CompStr::parse(&value)),
                "name" => filters.names.push(CompStr::parse(&value)),
                "attributedTo" => filters.attributed_to.push(CompStr::parse(&value)),
                "inReplyTo" => filters.in_reply_to.push(CompStr::parse(&value)),
                "context" => filters.context.push(CompStr::parse(&value)),
                "url" => filters.urls.push(CompStr::parse(&value)),
                "page" => filters.page = parse_number(&key, &value)?.max(1),
                "maxItems" => filters.max_items = Some(parse_number(&key, &value)?),
                "newerThan" => filters.newer_than = Some(parse_time(&key, &value)?),
                "olderThan" => filters.older_than = Some(parse_time(&key, &value)?),
                other => debug!(key = other, "ignoring unknown filter parameter"),
            }
        }
        Ok(filters)
    }

    /// [`Filters::from_url`] for a string IRI.
    pub fn from_iri(iri: &str) -> Result<Self> {
        let url = Url::parse(iri).map_err(|_| FilterError::InvalidTarget(iri.to_string()))?;
        Self::from_url(&url)
    }
}

fn parse_number(name: &str, value: &str) -> Result<usize> {
    value.parse().map_err(|_| FilterError::InvalidParam {
        name: name.to_string(),
        value: value.to_string(),
    })
}

fn parse_time(name: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| FilterError::InvalidParam {
            name: name.to_string(),
            value: value.to_string(),
        })
}
