//! Element-id arithmetic
//!
//! Element ids are hierarchical: `.` separates path segments and `:` names a
//! slice of the segment it follows. An id with its slice names removed is the
//! element path, which is what makes parent lookup by id suffix possible.

use once_cell::sync::Lazy;
use regex::Regex;

static ID_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.:]").expect("valid regex"));

/// Remove every `:slice` suffix from the segments of an id.
///
/// `Observation.component:systolic.code` → `Observation.component.code`
pub fn strip_slices(id: &str) -> String {
    id.split('.')
        .map(|segment| segment.split_once(':').map_or(segment, |(name, _)| name))
        .collect::<Vec<_>>()
        .join(".")
}

/// Id of the element owning `id`.
///
/// A sliced last segment is owned by its unsliced base element
/// (`X.coding:loinc` → `X.coding`). Root ids have no parent.
pub fn parent_id(id: &str) -> Option<String> {
    let (head, last) = id.rsplit_once('.')?;
    match last.split_once(':') {
        Some((base, _)) => Some(format!("{head}.{base}")),
        None => Some(head.to_string()),
    }
}

/// An element is a resource root when its path has no `.`
pub fn is_root(path: &str) -> bool {
    !path.contains('.')
}

/// Id of the slice on the lowest level that still encloses `id`.
///
/// ```text
/// Observation.component:Diastolic.code.coding:sct → Observation.component:Diastolic.code.coding:sct
/// Observation.component:Diastolic.code            → Observation.component:Diastolic
/// Observation.component                           → None
/// ```
pub fn parent_slice_id(id: &str) -> Option<String> {
    let (head, tail) = id.rsplit_once(':')?;
    let name = tail.split('.').next().unwrap_or(tail);
    Some(format!("{head}:{name}"))
}

/// Name of the lowest-level slice enclosing `id`
pub fn slice_name(id: &str) -> Option<String> {
    parent_slice_id(id).and_then(|slice| slice.rsplit(':').next().map(str::to_string))
}

/// Id of the element the lowest enclosing slice belongs to.
///
/// `Observation.component:Diastolic.code` → `Observation.component`
pub fn slice_owning_element_id(id: &str) -> String {
    match parent_slice_id(id) {
        Some(slice) => slice
            .rsplit_once(':')
            .map_or(slice.clone(), |(owner, _)| owner.to_string()),
        None => id.to_string(),
    }
}

/// True for the id of a slice itself, as opposed to an element inside a slice
pub fn is_slice_base(id: &str) -> bool {
    parent_slice_id(id).as_deref() == Some(id)
}

/// Nearest common ancestor id of two element ids
pub fn common_ancestor_id(first: &str, second: &str) -> String {
    let first_parts = split_keeping_separators(first);
    let second_parts = split_keeping_separators(second);

    let mut common: Vec<&str> = Vec::new();
    for (a, b) in first_parts.iter().zip(second_parts.iter()) {
        if a != b {
            if matches!(common.last(), Some(&".") | Some(&":")) {
                common.pop();
            }
            break;
        }
        common.push(a);
    }
    common.concat()
}

fn split_keeping_separators(id: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut last = 0;
    for sep in ID_SEPARATOR.find_iter(id) {
        parts.push(&id[last..sep.start()]);
        parts.push(sep.as_str());
        last = sep.end();
    }
    parts.push(&id[last..]);
    parts
}

/// Key naming an attribute defined by `id`.
///
/// The innermost parenthesised id wins, then the lowest slice name, then the
/// last path segment.
pub fn attribute_key(id: &str) -> Option<String> {
    let mut inner = id;
    if let (Some(open), Some(close)) = (id.rfind('('), id.find(')')) {
        if open < close {
            inner = &id[open + 1..close];
        }
    }

    let key = if inner.contains(':') {
        inner
            .rsplit(':')
            .next()
            .and_then(|tail| tail.split('.').next())
    } else {
        inner.rsplit('.').next()
    };

    key.filter(|k| !k.is_empty()).map(str::to_string)
}
