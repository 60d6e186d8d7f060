use ahash::AHashSet as HashSet;
use std::{borrow::Cow, fmt};

/// Identifies a kind of aspect, e.g. `denials` or `metrics`.
///
/// Kinds are open: the runtime never needs to know the full set, only the
/// managers registered for them.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Kind(Cow<'static, str>);

/// The set of aspect kinds a caller is interested in.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KindSet(HashSet<Kind>);

// === impl Kind ===

impl Kind {
    pub const DENIALS: Self = Self(Cow::Borrowed("denials"));
    pub const LISTS: Self = Self(Cow::Borrowed("lists"));
    pub const METRICS: Self = Self(Cow::Borrowed("metrics"));

    pub fn new(kind: impl Into<Cow<'static, str>>) -> Self {
        Self(kind.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for Kind {
    fn from(s: &str) -> Self {
        Self(Cow::Owned(s.to_string()))
    }
}

impl From<String> for Kind {
    fn from(s: String) -> Self {
        Self(Cow::Owned(s))
    }
}

// === impl KindSet ===

impl KindSet {
    pub fn contains(&self, kind: &Kind) -> bool {
        self.0.contains(kind)
    }

    pub fn insert(&mut self, kind: Kind) -> bool {
        self.0.insert(kind)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Kind> {
        self.0.iter()
    }
}

impl FromIterator<Kind> for KindSet {
    fn from_iter<I: IntoIterator<Item = Kind>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
