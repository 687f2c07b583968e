//! Field paths as a first-class type (§9 design note).
//!
//! Internally a path is a sequence of `Key`/`Index` segments; at the
//! boundary (store calls, report fields) it serializes to a dotted
//! string like `media.0.url`. Parsing a dotted string back is lossy when
//! a mapping key is itself all-digits — `FieldPath::parse` always prefers
//! `Index` when the ancestor in hand is a sequence and the segment parses
//! as a non-negative integer, `Key` otherwise. That ambiguity is called
//! out, not resolved, in spec.md §9.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct FieldPath(pub Vec<Segment>);

impl FieldPath {
    pub fn new() -> Self {
        FieldPath(Vec::new())
    }

    pub fn push_key(&self, key: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(Segment::Key(key.into()));
        FieldPath(segments)
    }

    pub fn push_index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(Segment::Index(index));
        FieldPath(segments)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// Splits a dotted string into segments. Each segment is treated as a
    /// non-negative integer index only when `is_index_context` says the
    /// container at that depth is a sequence; otherwise it's a mapping key,
    /// even if the text happens to be all digits.
    pub fn parse(dotted: &str, is_index_context: impl Fn(usize) -> bool) -> Self {
        let mut segments = Vec::new();
        if dotted.is_empty() {
            return FieldPath(segments);
        }
        for (depth, part) in dotted.split('.').enumerate() {
            if is_index_context(depth) {
                if let Ok(i) = part.parse::<usize>() {
                    segments.push(Segment::Index(i));
                    continue;
                }
            }
            segments.push(Segment::Key(part.to_string()));
        }
        FieldPath(segments)
    }

    /// Parses without any sequence-context hints — every numeric segment
    /// is read as an index. This matches how the walker itself emits
    /// paths (it never puts an all-digit mapping key under a non-sequence
    /// parent in practice, see §4.D) and is the form used to round-trip
    /// paths the walker produced.
    pub fn parse_relaxed(dotted: &str) -> Self {
        Self::parse(dotted, |_| true)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .0
            .iter()
            .map(|seg| match seg {
                Segment::Key(k) => k.clone(),
                Segment::Index(i) => i.to_string(),
            })
            .collect();
        write!(f, "{}", rendered.join("."))
    }
}
