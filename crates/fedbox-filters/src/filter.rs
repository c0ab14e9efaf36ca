use chrono::{DateTime, Utc};
use serde_json::Value;

use fedbox_vocab::{CollectionType, Item};

/// Page length used when a request does not ask for one.
pub const MAX_ITEMS: usize = 100;

/// Comparison applied by a [`CompStr`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    /// `=`: exact equality.
    Equals,
    /// `!`: inequality; an absent field satisfies it.
    Different,
    /// `~`: the candidate contains the value as a substring.
    Like,
}

impl Operator {
    pub fn symbol(&self) -> char {
        match self {
            Self::Equals => '=',
            Self::Different => '!',
            Self::Like => '~',
        }
    }
}

/// One (operator, value) pair of a field predicate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompStr {
    pub op: Operator,
    pub value: String,
}

impl CompStr {
    pub fn equals(value: impl Into<String>) -> Self {
        Self { op: Operator::Equals, value: value.into() }
    }

    pub fn different(value: impl Into<String>) -> Self {
        Self { op: Operator::Different, value: value.into() }
    }

    pub fn like(value: impl Into<String>) -> Self {
        Self { op: Operator::Like, value: value.into() }
    }

    /// Parse the query-string form: a leading `!` or `~` selects the
    /// operator, a leading `=` or no prefix means equality.
    pub fn parse(raw: &str) -> Self {
        if let Some(rest) = raw.strip_prefix('!') {
            Self::different(rest)
        } else if let Some(rest) = raw.strip_prefix('~') {
            Self::like(rest)
        } else {
            Self::equals(raw.strip_prefix('=').unwrap_or(raw))
        }
    }

    /// Evaluate against the values a candidate holds for the field.
    ///
    /// An empty value compares against field emptiness: `=` matches an
    /// absent or empty field, `!` a present non-empty one.
    pub fn matches(&self, candidates: &[&str]) -> bool {
        let has = |v: &str| candidates.iter().any(|c| *c == v);
        match self.op {
            Operator::Equals if self.value.is_empty() => candidates.iter().all(|c| c.is_empty()),
            Operator::Equals => has(&self.value),
            Operator::Different if self.value.is_empty() => candidates.iter().any(|c| !c.is_empty()),
            Operator::Different => !has(&self.value),
            Operator::Like => candidates.iter().any(|c| c.contains(self.value.as_str())),
        }
    }

    /// Evaluate against a natural-language field. Equality checks with an
    /// empty value only look at the untagged text.
    fn matches_text(&self, values: &[(Option<String>, String)]) -> bool {
        let texts: Vec<&str> = if self.value.is_empty() && self.op != Operator::Like {
            values.iter().filter(|(lang, _)| lang.is_none()).map(|(_, t)| t.as_str()).collect()
        } else {
            values.iter().map(|(_, t)| t.as_str()).collect()
        };
        self.matches(&texts)
    }
}

impl std::fmt::Display for CompStr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.op {
            Operator::Equals => f.write_str(&self.value),
            op => write!(f, "{}{}", op.symbol(), self.value),
        }
    }
}

/// A query against the store: target IRI, field predicates, time window
/// and page selection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Filters {
    /// The collection or item IRI being loaded.
    pub target: String,
    pub types: Vec<CompStr>,
    pub iris: Vec<CompStr>,
    pub names: Vec<CompStr>,
    pub attributed_to: Vec<CompStr>,
    pub in_reply_to: Vec<CompStr>,
    pub context: Vec<CompStr>,
    pub urls: Vec<CompStr>,
    /// Only items published strictly after this instant.
    pub newer_than: Option<DateTime<Utc>>,
    /// Only items published strictly before this instant.
    pub older_than: Option<DateTime<Utc>>,
    /// 1-based page number.
    pub page: usize,
    /// Page length; `None` returns every matching item.
    pub max_items: Option<usize>,
}

impl Filters {
    /// Unpaginated, predicate-free filters for `target`.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            page: 1,
            ..Self::default()
        }
    }

    pub fn with_type(mut self, cmp: CompStr) -> Self {
        self.types.push(cmp);
        self
    }

    pub fn with_iri(mut self, cmp: CompStr) -> Self {
        self.iris.push(cmp);
        self
    }

    pub fn with_name(mut self, cmp: CompStr) -> Self {
        self.names.push(cmp);
        self
    }

    pub fn with_attributed_to(mut self, cmp: CompStr) -> Self {
        self.attributed_to.push(cmp);
        self
    }

    pub fn with_in_reply_to(mut self, cmp: CompStr) -> Self {
        self.in_reply_to.push(cmp);
        self
    }

    pub fn with_context(mut self, cmp: CompStr) -> Self {
        self.context.push(cmp);
        self
    }

    pub fn with_url(mut self, cmp: CompStr) -> Self {
        self.urls.push(cmp);
        self
    }

    pub fn published_between(
        mut self,
        newer_than: Option<DateTime<Utc>>,
        older_than: Option<DateTime<Utc>>,
    ) -> Self {
        self.newer_than = newer_than;
        self.older_than = older_than;
        self
    }

    pub fn paged(mut self, page: usize, max_items: usize) -> Self {
        self.page = page;
        self.max_items = Some(max_items);
        self
    }

    /// True if any field predicate or time bound is set.
    pub fn has_predicates(&self) -> bool {
        !(self.types.is_empty()
            && self.iris.is_empty()
            && self.names.is_empty()
            && self.attributed_to.is_empty()
            && self.in_reply_to.is_empty()
            && self.context.is_empty()
            && self.urls.is_empty()
            && self.newer_than.is_none()
            && self.older_than.is_none())
    }

    /// True if the target IRI names a known collection.
    pub fn targets_known_collection(&self) -> bool {
        CollectionType::of_iri(&self.target).is_some()
    }

    /// Conjunction of every predicate present. Absent predicates do not
    /// constrain, so filters without predicates match everything.
    pub fn matches(&self, item: &Item) -> bool {
        any_of(&self.types, &type_values(item))
            && any_of(&self.iris, &item.id().into_iter().collect::<Vec<_>>())
            && any_text(&self.names, &item.language_values("name"))
            && any_of(&self.attributed_to, &as_strs(&item.iris("attributedTo")))
            && any_of(&self.in_reply_to, &as_strs(&item.iris("inReplyTo")))
            && any_of(&self.context, &as_strs(&item.iris("context")))
            && any_of(&self.urls, &as_strs(&url_values(item.get("url"))))
            && self.within_window(item)
    }

    /// Decide whether a collection member is listed.
    ///
    /// Without predicates, members are listed only when the target is a
    /// recognised collection; an unrecognised target lists nothing rather
    /// than dumping whatever the store holds below it.
    pub fn accepts_member(&self, item: &Item) -> bool {
        if self.has_predicates() {
            self.matches(item)
        } else {
            self.targets_known_collection()
        }
    }

    fn within_window(&self, item: &Item) -> bool {
        if self.newer_than.is_none() && self.older_than.is_none() {
            return true;
        }
        let Some(published) = item.published() else {
            return false;
        };
        self.newer_than.map_or(true, |t| published > t) && self.older_than.map_or(true, |t| published < t)
    }
}

fn any_of(predicates: &[CompStr], candidates: &[&str]) -> bool {
    predicates.is_empty() || predicates.iter().any(|p| p.matches(candidates))
}

fn any_text(predicates: &[CompStr], values: &[(Option<String>, String)]) -> bool {
    predicates.is_empty() || predicates.iter().any(|p| p.matches_text(values))
}

fn as_strs(values: &[String]) -> Vec<&str> {
    values.iter().map(String::as_str).collect()
}

fn type_values(item: &Item) -> Vec<&str> {
    match item.get("type") {
        Some(Value::String(kind)) => vec![kind.as_str()],
        Some(Value::Array(kinds)) => kinds.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

/// `url` holds plain IRIs or Link objects with an `href`.
fn url_values(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(url)) => vec![url.clone()],
        Some(Value::Object(link)) => link
            .get("href")
            .or_else(|| link.get("id"))
            .and_then(Value::as_str)
            .map(|href| vec![href.to_string()])
            .unwrap_or_default(),
        Some(Value::Array(values)) => values.iter().flat_map(|v| url_values(Some(v))).collect(),
        _ => Vec::new(),
    }
}
