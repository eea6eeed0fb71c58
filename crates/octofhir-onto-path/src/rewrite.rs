//! String rewrite rules over FHIRPath-like expressions
//!
//! Each rule is a small pure function; the dialects in [`crate::emitter`]
//! compose them.

use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};

static CHOICE_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\[x\](?::\w+)?)").expect("valid regex"));

static EXTENSION_WHERE: Lazy<Regex> = Lazy::new(|| Regex::new(r"extension\.where\([^)]+\)").expect("valid regex"));

static LEADING_RESOURCE_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\(*(?P<prefix>[A-Z][a-zA-Z0-9]*(?P<closing>\)*)\.)").expect("valid regex")
});

static WHERE_CLAUSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.where\([^)]*\)").expect("valid regex"));

/// Rewrite the first `[x]` (or `[x]:slice`) marker into a cast:
/// `A.value[x].b` → `(A.value as T).b`
pub fn replace_x_with_cast(path: &str, type_code: &str) -> String {
    match CHOICE_MARKER.find(path) {
        Some(marker) => format!("({} as {type_code}){}", &path[..marker.start()], &path[marker.end()..]),
        None => path.to_string(),
    }
}

/// `(Resource.x as T).rest` → `x.as(T).rest`.
///
/// Everything up to the first `.` is dropped; an expression without a `.`
/// is returned unchanged.
pub fn convert_as_to_dot_as(path: &str) -> String {
    let Some((_, after_dot)) = path.split_once('.').filter(|(_, rest)| !rest.is_empty()) else {
        return path.to_string();
    };
    let Some((before_as, remainder)) = after_dot.split_once(" as ").filter(|(_, rest)| !rest.is_empty()) else {
        return after_dot.to_string();
    };
    let (type_code, rest) = remainder.split_once('.').unwrap_or((remainder, ""));
    let mut out = format!("{before_as}.as({type_code})");
    if !rest.is_empty() {
        out.push('.');
        out.push_str(rest);
    }
    out
}

/// `(Resource.x as dateTime)` → `xDateTime`, the combined name Pathling uses
/// for polymorphic elements.
pub fn convert_as_to_combined_name(path: &str) -> String {
    let body = match path.split_once('.') {
        Some((_, rest)) if !rest.is_empty() => rest,
        _ => path,
    };
    let combined = match body.split_once(" as ").filter(|(_, rest)| !rest.is_empty()) {
        Some((before_as, remainder)) => {
            let (type_code, rest) = remainder.split_once('.').unwrap_or((remainder, ""));
            let mut out = format!("{before_as}{}", capitalize(type_code));
            if !rest.is_empty() {
                out.push('.');
                out.push_str(rest);
            }
            out
        }
        None => body.to_string(),
    };
    strip_wrapping_parentheses(&clean_parentheses(&combined)).to_string()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Balance stray parentheses.
///
/// Surplus openers are dropped from the front; surplus closers after the
/// point where every opener has been matched are dropped.
pub fn clean_parentheses(path: &str) -> String {
    let opening = path.matches('(').count();
    let closing = path.matches(')').count();

    if closing < opening {
        let keep_from = opening - closing + 1;
        let parts: Vec<&str> = path.split('(').collect();
        let head = parts.iter().take(keep_from).copied().collect::<String>();
        let tail = parts.iter().skip(keep_from).copied().collect::<Vec<_>>().join("(");
        if parts.len() <= keep_from {
            head
        } else {
            format!("{head}({tail}")
        }
    } else if closing > opening {
        let keep = opening + 1;
        let parts: Vec<&str> = path.split(')').collect();
        let head = parts.iter().take(keep).copied().collect::<Vec<_>>().join(")");
        let tail = parts.iter().skip(keep).copied().collect::<String>();
        format!("{head}{tail}")
    } else {
        path.to_string()
    }
}

/// Remove parentheses wrapping the whole expression
pub fn strip_wrapping_parentheses(mut path: &str) -> &str {
    while path.starts_with('(') && path.ends_with(')') && matching_close(path, 0) == Some(path.len() - 1) {
        path = &path[1..path.len() - 1];
    }
    path
}

fn matching_close(s: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, c) in s[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Insert `.first()` after every `extension.where(...)` that is followed by
/// further path segments. Already present `.first()` calls are kept as is.
pub fn add_first_after_extension_where(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 8);
    let mut last = 0;
    for found in EXTENSION_WHERE.find_iter(path) {
        out.push_str(&path[last..found.end()]);
        let rest = &path[found.end()..];
        if !rest.is_empty() && !rest.starts_with(".first()") {
            out.push_str(".first()");
        }
        last = found.end();
    }
    out.push_str(&path[last..]);
    out
}

/// Drop a leading resource type node, keeping the parentheses that wrapped it
/// balanced: `((Condition).code)` → `(code)`.
pub fn remove_resource_type(path: &str) -> String {
    let Some(caps) = LEADING_RESOURCE_TYPE.captures(path) else {
        return path.to_string();
    };
    let (Some(capture), Some(closing)) = (caps.name("prefix"), caps.name("closing")) else {
        return path.to_string();
    };
    let closers = closing.as_str().len();
    format!("{}{}", &path[..capture.start().saturating_sub(closers)], &path[capture.end()..])
}

/// Strip the cast of a time restriction path: everything before the first
/// `.` goes, and so does everything from ` as ` on.
pub fn remove_cast(path: &str) -> String {
    match path.split_once('.') {
        Some((_, rest)) if !rest.is_empty() => rest.split(" as ").next().unwrap_or(rest).to_string(),
        _ => path.to_string(),
    }
}

/// The full CQL post-pass for one expression
pub fn cql_optimize(path: &str) -> String {
    let path = convert_as_to_dot_as(path);
    let path = clean_parentheses(&path);
    let path = add_first_after_extension_where(&path);
    remove_resource_type(&path)
}

/// Replace every `.where(...)` predicate
pub fn replace_where_clauses(path: &str, replacement: &str) -> String {
    WHERE_CLAUSE.replace_all(path, NoExpand(replacement)).into_owned()
}

/// The first `.where(...)` clause with balanced parentheses, and the path up
/// to and including it minus its leading type node.
///
/// Returns `None` when the path has no where clause.
pub fn extract_where_clause(path: &str) -> Option<(String, String)> {
    let start = path.find(".where(")?;
    let open = start + ".where".len();
    let clause = match matching_close(path, open) {
        Some(close) => &path[open..=close],
        None => "",
    };
    let upto = &path[..open + clause.len()];
    let prefix = upto.split_once('.').map_or(upto, |(_, rest)| rest);
    Some((clause.to_string(), prefix.to_string()))
}

/// Length in bytes of the longest common prefix of two strings
pub fn common_prefix_len(a: &str, b: &str) -> usize {
    a.char_indices()
        .zip(b.chars())
        .take_while(|((_, x), y)| x == y)
        .last()
        .map_or(0, |((i, c), _)| i + c.len_utf8())
}

/// True when `sub_path` equals `path` or one of its prefixes cut at a `.`
pub fn sub_path_equals(sub_path: &str, path: &str) -> bool {
    if sub_path == path {
        return true;
    }
    let segments: Vec<&str> = path.split('.').collect();
    (1..=segments.len()).rev().any(|n| segments[..n].join(".") == sub_path)
}
