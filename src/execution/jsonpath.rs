//! Minimal JsonPath evaluation
//!
//! Supported: `$`, `.key`, `['key']`, `[n]` (negative counts from the end),
//! `[*]`, `.*`, `..key` and `..*`. Filters, slices and unions are not.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid JsonPath '{path}': {reason}")]
pub struct PathError {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Child(String),
    Index(i64),
    Wildcard,
    Descendant(String),
    DescendantWildcard,
}

fn parse(path: &str) -> Result<Vec<Segment>, PathError> {
    let fail = |reason: &str| PathError {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = path.trim();
    let body = match trimmed.strip_prefix('$') {
        Some(rest) => rest.to_string(),
        None if trimmed.starts_with('.') || trimmed.starts_with('[') => trimmed.to_string(),
        None => format!(".{}", trimmed),
    };

    let chars: Vec<char> = body.chars().collect();
    let mut segments = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '.' => {
                let descendant = chars.get(i + 1) == Some(&'.');
                i += if descendant { 2 } else { 1 };
                let start = i;
                while i < chars.len() && chars[i] != '.' && chars[i] != '[' {
                    i += 1;
                }
                let name: String = chars[start..i].iter().collect();
                let segment = match (descendant, name.as_str()) {
                    (_, "") => return Err(fail("expected a name after '.'")),
                    (true, "*") => Segment::DescendantWildcard,
                    (true, _) => Segment::Descendant(name),
                    (false, "*") => Segment::Wildcard,
                    (false, _) => Segment::Child(name),
                };
                segments.push(segment);
            }
            '[' => {
                let close = chars[i..]
                    .iter()
                    .position(|&c| c == ']')
                    .ok_or_else(|| fail("unclosed '['"))?;
                let inner: String = chars[i + 1..i + close].iter().collect();
                let inner = inner.trim();
                let segment = if inner == "*" {
                    Segment::Wildcard
                } else if let Some(name) = unquote(inner) {
                    Segment::Child(name.to_string())
                } else {
                    inner
                        .parse::<i64>()
                        .map(Segment::Index)
                        .map_err(|_| fail("expected an index, '*' or a quoted name in brackets"))?
                };
                segments.push(segment);
                i += close + 1;
            }
            c => return Err(fail(&format!("unexpected '{}'", c))),
        }
    }

    Ok(segments)
}

fn unquote(text: &str) -> Option<&str> {
    ['\'', '"'].iter().find_map(|&q| {
        text.strip_prefix(q)
            .and_then(|rest| rest.strip_suffix(q))
    })
}

fn children(value: &Value) -> Vec<&Value> {
    match value {
        Value::Object(map) => map.values().collect(),
        Value::Array(items) => items.iter().collect(),
        _ => Vec::new(),
    }
}

/// `value` and everything below it, pre-order
fn walk<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    out.push(value);
    for child in children(value) {
        walk(child, out);
    }
}

/// All values selected by `path`, in document order
pub fn select<'a>(root: &'a Value, path: &str) -> Result<Vec<&'a Value>, PathError> {
    let mut current = vec![root];

    for segment in parse(path)? {
        let mut next = Vec::new();
        for value in current {
            match &segment {
                Segment::Child(key) => next.extend(value.get(key.as_str())),
                Segment::Index(index) => {
                    if let Value::Array(items) = value {
                        let len = items.len() as i64;
                        let at = if *index < 0 { len + index } else { *index };
                        if (0..len).contains(&at) {
                            next.push(&items[at as usize]);
                        }
                    }
                }
                Segment::Wildcard => next.extend(children(value)),
                Segment::Descendant(key) => {
                    let mut nodes = Vec::new();
                    walk(value, &mut nodes);
                    next.extend(nodes.into_iter().filter_map(|n| match n {
                        Value::Object(map) => map.get(key.as_str()),
                        _ => None,
                    }));
                }
                Segment::DescendantWildcard => {
                    let mut nodes = Vec::new();
                    walk(value, &mut nodes);
                    next.extend(nodes.into_iter().skip(1));
                }
            }
        }
        current = next;
    }

    Ok(current)
}

/// Text form used for comparisons and property values
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
