//! Request fingerprints.

use std::fmt;

use url::Url;

use fedbox_vocab::iri;

/// Normalised fingerprint of a request: IRI, sorted query string and the
/// requesting actor.
///
/// The fragment and any credentials are dropped. When the request is made
/// by an authenticated, non-public actor, the last path segment of that
/// actor's IRI is placed in the user-info slot, so two actors never share an
/// entry while anonymous requests do:
///
/// ```text
/// https://example.com/actors/a/inbox?page=2&maxItems=10  by .../actors/b
///   -> https://b@example.com/actors/a/inbox?maxItems=10&page=2
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey(Url);

impl CacheKey {
    pub fn from_request(url: &Url, authenticated: Option<&str>) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        // Both fail only for URLs without a host, which carry no user-info.
        let _ = url.set_password(None);
        let _ = url.set_username("");

        let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        if pairs.is_empty() {
            url.set_query(None);
        } else {
            pairs.sort();
            url.query_pairs_mut().clear().extend_pairs(pairs);
        }

        if let Some(name) = authenticated.filter(|a| !iri::is_public(a)).and_then(iri::last_segment) {
            let _ = url.set_username(&name);
        }
        Self(url)
    }

    /// Key for an anonymous request of `raw`.
    pub fn from_iri(raw: &str) -> Option<Self> {
        iri::parse(raw).map(|url| Self::from_request(&url, None))
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// True when the cached resource is `target` or lies below it, whatever
    /// the query string or requesting actor.
    pub fn covers(&self, target: &Url) -> bool {
        iri::contains(target, &self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}
