//! JSON Pointer (RFC 6901) navigation over parsed value trees.
//!
//! Pointers arrive either as plain pointers (`/a/b`) or as URI fragments
//! (`#/a/b`, possibly percent-encoded). Fragments are decoded here and
//! nowhere else.
use std::borrow::Cow;

use percent_encoding::percent_decode_str;
use serde_json::Value;

use crate::Error;

/// Parse a pointer (with or without a leading `#`) into unescaped tokens.
///
/// # Errors
///
/// Returns [`Error::InvalidPointer`] on malformed escapes, invalid
/// percent-encoding, or a pointer that does not start with `/`.
pub(crate) fn parse(pointer: &str) -> Result<Vec<String>, Error> {
    let raw = pointer.strip_prefix('#').unwrap_or(pointer);
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| Error::invalid_pointer(pointer))?;
    if !decoded.starts_with('/') {
        return Err(Error::invalid_pointer(pointer));
    }
    decoded[1..]
        .split('/')
        .map(|token| unescape(token).ok_or_else(|| Error::invalid_pointer(pointer)))
        .collect()
}

/// Escape a single token for embedding into a pointer string.
pub(crate) fn escape(token: &str) -> Cow<'_, str> {
    if token.contains('~') || token.contains('/') {
        Cow::Owned(token.replace('~', "~0").replace('/', "~1"))
    } else {
        Cow::Borrowed(token)
    }
}

/// Join unescaped tokens back into a `/`-prefixed pointer string. Empty
/// token list yields the empty pointer.
pub(crate) fn join(tokens: &[String]) -> String {
    let mut out = String::new();
    for token in tokens {
        out.push('/');
        out.push_str(&escape(token));
    }
    out
}

/// Resolve the pointer tokens within a value.
///
/// # Errors
///
/// Returns [`Error::MissingPointer`] when the path does not exist and
/// [`Error::InvalidPointer`] on a non-canonical array index.
pub(crate) fn get<'a>(
    root: &'a Value,
    tokens: &[String],
    url: &str,
    pointer: &str,
) -> Result<&'a Value, Error> {
    let mut current = root;
    for token in tokens {
        current = step(current, token, url, pointer)?;
    }
    Ok(current)
}

/// A single pointer step into an object member or array element.
pub(crate) fn step<'a>(
    value: &'a Value,
    token: &str,
    url: &str,
    pointer: &str,
) -> Result<&'a Value, Error> {
    match value {
        Value::Object(map) => map
            .get(token)
            .ok_or_else(|| Error::missing_pointer(url, pointer)),
        Value::Array(items) => {
            let idx = parse_index(token).ok_or_else(|| Error::invalid_pointer(pointer))?;
            items
                .get(idx)
                .ok_or_else(|| Error::missing_pointer(url, pointer))
        }
        _ => Err(Error::missing_pointer(url, pointer)),
    }
}

/// Graft `new_value` at the pointer, creating intermediate objects for
/// missing members. Used by the bundler to inline external targets.
///
/// # Errors
///
/// Returns [`Error::MissingPointer`] when the path traverses a scalar and
/// [`Error::InvalidPointer`] on a non-canonical array index.
pub(crate) fn set(
    root: &mut Value,
    tokens: &[String],
    new_value: Value,
    pointer: &str,
) -> Result<(), Error> {
    let Some((last, parents)) = tokens.split_last() else {
        *root = new_value;
        return Ok(());
    };
    let mut current = root;
    for token in parents {
        current = match current {
            Value::Object(map) => map
                .entry(token.clone())
                .or_insert_with(|| Value::Object(serde_json::Map::new())),
            Value::Array(items) => {
                let idx = parse_index(token).ok_or_else(|| Error::invalid_pointer(pointer))?;
                items
                    .get_mut(idx)
                    .ok_or_else(|| Error::missing_pointer("", pointer))?
            }
            _ => return Err(Error::missing_pointer("", pointer)),
        };
    }
    match current {
        Value::Object(map) => {
            map.insert(last.clone(), new_value);
            Ok(())
        }
        Value::Array(items) => {
            if last == "-" {
                items.push(new_value);
                return Ok(());
            }
            let idx = parse_index(last).ok_or_else(|| Error::invalid_pointer(pointer))?;
            match items.get_mut(idx) {
                Some(slot) => {
                    *slot = new_value;
                    Ok(())
                }
                None => Err(Error::missing_pointer("", pointer)),
            }
        }
        _ => Err(Error::missing_pointer("", pointer)),
    }
}

// Canonical decimal per RFC 6901: no leading zeros, no signs.
pub(crate) fn parse_index(token: &str) -> Option<usize> {
    if token.is_empty() || (token.len() > 1 && token.starts_with('0')) {
        return None;
    }
    if !token.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

fn unescape(token: &str) -> Option<String> {
    if !token.contains('~') {
        return Some(token.to_string());
    }
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(ch) = chars.next() {
        if ch == '~' {
            match chars.next() {
                Some('0') => out.push('~'),
                Some('1') => out.push('/'),
                _ => return None,
            }
        } else {
            out.push(ch);
        }
    }
    Some(out)
}
