//! Mapping IRIs to physical storage locations.
//!
//! A [`Location`] is the IRI's authority (`host[:port]`) followed by its
//! non-empty path segments. Query, fragment and user-info never take part,
//! and neither does the scheme: `http://h/x` and `https://h/x` address the
//! same resource.
//!
//! An IRI that is a path-prefix of another maps to an ancestor location, so
//! "children of a collection" is a prefix relation in every backend:
//!
//! ```text
//! https://example.com/actors/a/inbox
//!   kv key:  example.com/actors/a/inbox/__raw
//!   fs path: {root}/example.com/actors/a/inbox/__raw.json
//! ```

use std::path::{Path, PathBuf};

use url::Url;

use fedbox_vocab::iri;

/// Key suffix holding an item's document.
pub const RAW: &str = "__raw";
/// Key suffix holding an item's metadata.
pub const META: &str = "__meta_data";
/// File holding an item's document in the filesystem backend.
pub const RAW_FILE: &str = "__raw.json";
/// File holding an item's metadata in the filesystem backend.
pub const META_FILE: &str = "__meta_data.json";

/// Physical location of an IRI.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    segments: Vec<String>,
}

impl Location {
    /// Map an IRI; unparseable or host-less IRIs have no location.
    pub fn from_iri(raw: &str) -> Option<Self> {
        Self::from_url(&iri::parse(raw)?)
    }

    pub fn from_url(url: &Url) -> Option<Self> {
        let host = url.host_str()?.to_ascii_lowercase();
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host,
        };
        let mut segments = vec![authority];
        segments.extend(iri::segments(url).into_iter().map(escape));
        Some(Self { segments })
    }

    /// Rebuild from a key produced by [`Location::key`].
    pub fn from_key(key: &str) -> Option<Self> {
        let segments: Vec<String> = key.split('/').filter(|s| !s.is_empty()).map(str::to_string).collect();
        (!segments.is_empty()).then_some(Self { segments })
    }

    /// Rebuild from a filesystem path below `root`, accepting either the
    /// item directory or its `__raw.json` file.
    pub fn from_path(root: &Path, path: &Path) -> Option<Self> {
        let rel = path.strip_prefix(root).ok()?;
        let mut segments: Vec<String> = rel
            .components()
            .filter_map(|c| c.as_os_str().to_str().map(str::to_string))
            .collect();
        if segments.last().map(String::as_str) == Some(RAW_FILE) {
            segments.pop();
        }
        (!segments.is_empty()).then_some(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments including the authority.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn key(&self) -> String {
        self.segments.join("/")
    }

    pub fn raw_key(&self) -> String {
        format!("{}/{RAW}", self.key())
    }

    pub fn meta_key(&self) -> String {
        format!("{}/{META}", self.key())
    }

    /// Prefix shared by the keys of every descendant.
    pub fn children_prefix(&self) -> String {
        format!("{}/", self.key())
    }

    pub fn dir(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        path.extend(&self.segments);
        path
    }

    pub fn raw_path(&self, root: &Path) -> PathBuf {
        self.dir(root).join(RAW_FILE)
    }

    pub fn meta_path(&self, root: &Path) -> PathBuf {
        self.dir(root).join(META_FILE)
    }

    pub fn child(&self, segment: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(escape(segment));
        Self { segments }
    }

    pub fn parent(&self) -> Option<Self> {
        (self.segments.len() > 1).then(|| Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// True when `other` lies strictly below this location.
    pub fn is_ancestor_of(&self, other: &Location) -> bool {
        other.segments.len() > self.segments.len() && other.segments.starts_with(&self.segments)
    }

    /// Reconstruct an IRI using the given scheme.
    pub fn to_iri(&self, scheme: &str) -> String {
        let path: Vec<String> = self.segments[1..].iter().map(|s| unescape(s)).collect();
        if path.is_empty() {
            format!("{scheme}://{}", self.segments[0])
        } else {
            format!("{scheme}://{}/{}", self.segments[0], path.join("/"))
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key())
    }
}

/// Segments beginning with `__` get one more underscore so they can never
/// collide with the reserved `__raw`/`__meta_data` names.
fn escape(segment: &str) -> String {
    if segment.starts_with("__") {
        format!("_{segment}")
    } else {
        segment.to_string()
    }
}

fn unescape(segment: &str) -> String {
    if segment.starts_with("___") {
        segment[1..].to_string()
    } else {
        segment.to_string()
    }
}
