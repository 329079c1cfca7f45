//! JSON pointer parsing and lookup

use std::fmt;

use serde_json::Value;

use super::PatchError;

/// Final path segment that appends to an array instead of addressing an index
pub const APPEND_MARKER: &str = "-";

/// A parsed JSON pointer with unescaped segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPointer {
    raw: String,
    tokens: Vec<String>,
}

impl JsonPointer {
    /// Parse a `/seg/seg` pointer
    ///
    /// The empty string is rejected: deltas never address the document root.
    pub fn parse(path: &str) -> Result<Self, PatchError> {
        if path.is_empty() {
            return Err(PatchError::EmptyPath);
        }
        let Some(rest) = path.strip_prefix('/') else {
            return Err(PatchError::MissingLeadingSlash {
                path: path.to_string(),
            });
        };

        let tokens = rest
            .split('/')
            .map(|segment| {
                unescape(segment).ok_or_else(|| PatchError::InvalidEscape {
                    path: path.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            raw: path.to_string(),
            tokens,
        })
    }

    /// The pointer as written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Unescaped segments, never empty
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Parent segments and the leaf segment
    pub fn split_last(&self) -> (&[String], &str) {
        match self.tokens.split_last() {
            Some((leaf, parent)) => (parent, leaf.as_str()),
            None => (&[], ""),
        }
    }

    /// True when `self` addresses `other` or something below it
    pub fn starts_with(&self, other: &JsonPointer) -> bool {
        self.tokens.len() >= other.tokens.len()
            && self.tokens.iter().zip(&other.tokens).all(|(a, b)| a == b)
    }

    /// Look up the value this pointer addresses
    pub fn get<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        self.tokens
            .iter()
            .try_fold(document, |current, token| match current {
                Value::Object(map) => map.get(token),
                Value::Array(items) => array_index(token).and_then(|i| items.get(i)),
                _ => None,
            })
    }
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Digits-only segments index arrays
pub(crate) fn array_index(token: &str) -> Option<usize> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

/// True when the segment selects an array slot (index or append marker)
pub(crate) fn is_array_token(token: &str) -> bool {
    token == APPEND_MARKER || array_index(token).is_some()
}

fn unescape(segment: &str) -> Option<String> {
    if !segment.contains('~') {
        return Some(segment.to_string());
    }
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.chars();
    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.next() {
                Some('0') => out.push('~'),
                Some('1') => out.push('/'),
                _ => return None,
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}
