//! IRI helpers.
//!
//! IRIs are carried around as plain strings inside documents and parsed on
//! demand with [`url::Url`]. Only scheme, host, port and path take part in
//! comparisons; query strings, fragments and user-info are ignored.

use url::Url;

/// The ActivityStreams public collection.
pub const PUBLIC_NS: &str = "https://www.w3.org/ns/activitystreams#Public";

/// True for the public addressing IRI in any of its accepted spellings.
pub fn is_public(iri: &str) -> bool {
    matches!(iri, PUBLIC_NS | "as:Public" | "Public")
}

/// Parse an IRI, rejecting anything without a host.
pub fn parse(iri: &str) -> Option<Url> {
    Url::parse(iri).ok().filter(|u| u.has_host())
}

/// Non-empty path segments of a parsed IRI.
pub fn segments(url: &Url) -> Vec<&str> {
    url.path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default()
}

/// Same scheme, host and port.
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme().eq_ignore_ascii_case(b.scheme())
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
}

/// True when `inner` equals `outer` or lives below it in the path hierarchy.
///
/// Containment is by whole path segments: `/actors/a` contains
/// `/actors/a/inbox` but not `/actors/ab`.
pub fn contains(outer: &Url, inner: &Url) -> bool {
    if !same_origin(outer, inner) {
        return false;
    }
    let outer = segments(outer);
    let inner = segments(inner);
    inner.len() >= outer.len() && inner[..outer.len()] == outer[..]
}

/// String form of [`contains`]; unparseable IRIs are never contained.
pub fn contains_str(outer: &str, inner: &str) -> bool {
    match (parse(outer), parse(inner)) {
        (Some(o), Some(i)) => contains(&o, &i),
        _ => false,
    }
}

/// Append a path segment to an IRI.
pub fn join(base: &str, segment: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), segment)
}

/// The IRI one path segment up, without query or fragment.
///
/// Returns `None` for unparseable IRIs and for IRIs already at the root.
pub fn parent(iri: &str) -> Option<String> {
    let mut url = parse(iri)?;
    let mut segs: Vec<String> = segments(&url).into_iter().map(str::to_string).collect();
    segs.pop()?;
    url.set_query(None);
    url.set_fragment(None);
    url.set_path(&segs.join("/"));
    Some(url.as_str().trim_end_matches('/').to_string())
}

/// Last non-empty path segment.
pub fn last_segment(iri: &str) -> Option<String> {
    let url = parse(iri)?;
    segments(&url).last().map(|s| s.to_string())
}
