//! Field Walker (spec.md §4.D).
//!
//! Traverses a document value and yields stable dotted paths to
//! URL-bearing scalar strings, and resolves/writes values by path.

use crate::path::{FieldPath, Segment};
use crate::value::Value;

const MEDIA_KEY_HINTS: &[&str] = &[
    "image", "photo", "picture", "avatar", "thumbnail", "cover", "media", "video", "url",
];

fn key_has_media_hint(key: &str) -> bool {
    let lower = key.to_lowercase();
    MEDIA_KEY_HINTS.iter().any(|hint| lower.contains(hint))
}

fn path_has_media_hint(path: &FieldPath) -> bool {
    path.segments().iter().any(|seg| match seg {
        Segment::Key(k) => key_has_media_hint(k),
        Segment::Index(_) => false,
    })
}

fn under_media_sequence(path: &FieldPath) -> bool {
    // True when the immediate ancestor segment pair is `media.<index>`.
    let segments = path.segments();
    if segments.len() < 2 {
        return false;
    }
    matches!(
        (&segments[segments.len() - 2], &segments[segments.len() - 1]),
        (Segment::Key(k), Segment::Index(_)) if k.eq_ignore_ascii_case("media")
    )
}

/// Discovers every dotted path to a URL-bearing scalar string.
pub fn discover(value: &Value) -> Vec<FieldPath> {
    let mut out = Vec::new();
    walk(value, &FieldPath::new(), &mut out);
    // Two precedence rules in §4.D can both fire for the same leaf (e.g. a
    // `url` key is both a key-hint and a `media`-sequence scalar) — collapse
    // to one emission per path.
    let mut seen = std::collections::HashSet::new();
    out.retain(|p| seen.insert(p.clone()));
    out
}

fn walk(value: &Value, path: &FieldPath, out: &mut Vec<FieldPath>) {
    match value {
        Value::Mapping(map) => {
            for (key, child) in map {
                let child_path = path.push_key(key.clone());
                visit_child(key, child, &child_path, out);
            }
        }
        Value::Sequence(items) => {
            for (i, child) in items.iter().enumerate() {
                let child_path = path.push_index(i);
                // The enclosing key (if any) is the last Key segment before
                // this index — already embedded in `child_path`'s ancestry.
                visit_child("", child, &child_path, out);
            }
        }
        _ => {}
    }
}

fn visit_child(key: &str, child: &Value, child_path: &FieldPath, out: &mut Vec<FieldPath>) {
    match child {
        Value::String(s) => {
            // TODO(spec-refinement): bare top-level `url` keys not under a
            // media-hinted ancestor have ambiguous behavior upstream; this
            // always applies the precedence below rather than guessing.
            let key_hint = key_has_media_hint(key);
            let under_media = under_media_sequence(child_path);
            let self_hint = classifier_looks_like_media_with_context(s, child_path);

            if key_hint || under_media || self_hint {
                out.push(child_path.clone());
            }
        }
        Value::Mapping(map) => {
            if under_media_sequence(child_path) {
                if let Some(Value::String(_)) = map.get("url") {
                    out.push(child_path.push_key("url"));
                }
            }
            walk(child, child_path, out);
        }
        Value::Sequence(_) => {
            walk(child, child_path, out);
        }
        _ => {}
    }
}

fn classifier_looks_like_media_with_context(s: &str, path: &FieldPath) -> bool {
    crate::classifier::looks_like_media(s) && path_has_media_hint(path)
}

/// Resolves the terminal value at `path`, or `None` if the path does not
/// exist in `value` (the "missing" marker).
pub fn read<'a>(value: &'a Value, path: &FieldPath) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.segments() {
        current = match (current, segment) {
            (Value::Mapping(map), Segment::Key(k)) => map.get(k)?,
            (Value::Sequence(items), Segment::Index(i)) => items.get(*i)?,
            _ => return None,
        };
    }
    Some(current)
}

/// An update to apply to a document, produced by `write`. A sequence
/// element cannot be addressed directly by most stores, so writing into
/// one always yields a `ReplaceSequence` addressing the nearest ancestor
/// sequence in full (§4.D, §4.I).
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateSpec {
    SetPath { path: FieldPath, value: Value },
    ReplaceSequence { path: FieldPath, sequence: Value },
}

/// Computes the update needed to set `path` to `new_value` inside `root`.
/// Returns `None` if the path cannot be traversed (a non-terminal segment
/// is missing or of the wrong shape).
pub fn write(root: &Value, path: &FieldPath, new_value: Value) -> Option<UpdateSpec> {
    let segments = path.segments();
    if segments.is_empty() {
        return None;
    }

    if let Some(seq_prefix_len) = nearest_ancestor_sequence_len(segments) {
        let ancestor_path = FieldPath(segments[..seq_prefix_len].to_vec());
        let mut sequence = read(root, &ancestor_path)?.clone();
        apply_relative(&mut sequence, &segments[seq_prefix_len..], new_value)?;
        return Some(UpdateSpec::ReplaceSequence {
            path: ancestor_path,
            sequence,
        });
    }

    Some(UpdateSpec::SetPath {
        path: path.clone(),
        value: new_value,
    })
}

/// Returns the segment-count prefix that addresses the closest ancestor
/// sequence, if `path` passes through one at all.
fn nearest_ancestor_sequence_len(segments: &[Segment]) -> Option<usize> {
    for (i, segment) in segments.iter().enumerate() {
        if matches!(segment, Segment::Index(_)) {
            return Some(i);
        }
    }
    None
}

fn apply_relative(container: &mut Value, remaining: &[Segment], new_value: Value) -> Option<()> {
    if remaining.is_empty() {
        *container = new_value;
        return Some(());
    }
    let (head, rest) = (&remaining[0], &remaining[1..]);
    match (container, head) {
        (Value::Sequence(items), Segment::Index(i)) => {
            let slot = items.get_mut(*i)?;
            apply_relative(slot, rest, new_value)
        }
        (Value::Mapping(map), Segment::Key(k)) => {
            let slot = map.entry(k.clone()).or_insert(Value::Null);
            apply_relative(slot, rest, new_value)
        }
        _ => None,
    }
}

/// Applies a computed `UpdateSpec` to `root` in place — used by in-memory
/// stores and by the Postgres store's read-modify-write cycle.
pub fn apply_update(root: &mut Value, update: &UpdateSpec) {
    match update {
        UpdateSpec::SetPath { path, value } => {
            set_in_place(root, path.segments(), value.clone());
        }
        UpdateSpec::ReplaceSequence { path, sequence } => {
            set_in_place(root, path.segments(), sequence.clone());
        }
    }
}

fn set_in_place(container: &mut Value, segments: &[Segment], new_value: Value) {
    if segments.is_empty() {
        *container = new_value;
        return;
    }
    let (head, rest) = (&segments[0], &segments[1..]);
    match (container, head) {
        (Value::Mapping(map), Segment::Key(k)) => {
            let slot = map.entry(k.clone()).or_insert(Value::Null);
            set_in_place(slot, rest, new_value);
        }
        (Value::Sequence(items), Segment::Index(i)) => {
            if let Some(slot) = items.get_mut(*i) {
                set_in_place(slot, rest, new_value);
            }
        }
        _ => {}
    }
}
