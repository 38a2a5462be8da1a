//! Message placeholder handling.
//!
//! Templates carry named placeholders with an `@`, `%` or `:` sigil, or
//! PSR-3 style `{name}` tokens. PSR-3 tokens are rewritten to `@name` and
//! bound to the context key `name`.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till1, take_while1},
    character::complete::char,
    combinator::map,
    multi::many0,
    sequence::delimited,
    IResult, Parser,
};
use std::collections::BTreeMap;

/// Sigils that mark a context key as a placeholder.
pub const SIGILS: [char; 3] = ['@', '%', ':'];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Psr3(&'a str),
}

fn psr3_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '.').parse(input)
}

fn segment(input: &str) -> IResult<&str, Segment<'_>> {
    alt((
        map(delimited(char('{'), psr3_name, char('}')), Segment::Psr3),
        map(take_till1(|c| c == '{'), Segment::Text),
        map(tag("{"), Segment::Text),
    ))
    .parse(input)
}

/// Rewrites PSR-3 `{name}` tokens to `@name`.
///
/// Returns the rewritten template and the names that were rewritten.
#[must_use]
pub fn normalize_psr3(template: &str) -> (String, Vec<String>) {
    let Ok((rest, segments)) = many0(segment).parse(template) else {
        return (template.to_string(), Vec::new());
    };

    let mut out = String::with_capacity(template.len());
    let mut names = Vec::new();
    for segment in segments {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Psr3(name) => {
                out.push('@');
                out.push_str(name);
                names.push(name.to_string());
            }
        }
    }
    out.push_str(rest);
    (out, names)
}

/// Renders a context value as placeholder text.
///
/// Only scalars qualify; arrays and objects yield `None`.
#[must_use]
pub fn scalar_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(if *b { "1" } else { "" }.to_string()),
        serde_json::Value::Null => Some(String::new()),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
    }
}

/// Collects the placeholder map for `template` from `context`.
///
/// Returns the normalized template (PSR-3 tokens rewritten) and the map of
/// placeholder (with sigil) to value.
///
/// # Example
///
/// ```
/// use shared::builder::placeholders::parse_placeholders;
/// use std::collections::BTreeMap;
///
/// let context = BTreeMap::from([("user".to_string(), serde_json::json!("alice"))]);
/// let (template, map) = parse_placeholders("Hello {user}", &context);
/// assert_eq!(template, "Hello @user");
/// assert_eq!(map["@user"], "alice");
/// ```
#[must_use]
pub fn parse_placeholders(
    template: &str,
    context: &BTreeMap<String, serde_json::Value>,
) -> (String, BTreeMap<String, String>) {
    let (normalized, psr3) = normalize_psr3(template);

    let mut placeholders = BTreeMap::new();
    for (key, value) in context {
        let key = if psr3.iter().any(|n| n == key) {
            format!("@{key}")
        } else {
            key.clone()
        };
        if !key.starts_with(SIGILS) {
            continue;
        }
        if let Some(text) = scalar_text(value) {
            placeholders.insert(key, text);
        }
    }
    (normalized, placeholders)
}

/// Replaces placeholders in `template`.
///
/// At each position the longest matching key wins and replaced text is
/// never scanned again.
#[must_use]
pub fn substitute(template: &str, placeholders: &BTreeMap<String, String>) -> String {
    if placeholders.is_empty() {
        return template.to_string();
    }

    let mut keys: Vec<&String> = placeholders.keys().filter(|k| !k.is_empty()).collect();
    keys.sort_by_key(|k| std::cmp::Reverse(k.len()));

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    'outer: while let Some(c) = rest.chars().next() {
        for key in &keys {
            if let Some(after) = rest.strip_prefix(key.as_str()) {
                out.push_str(&placeholders[*key]);
                rest = after;
                continue 'outer;
            }
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    out
}
