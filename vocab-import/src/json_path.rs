//! JSON path extraction
//!
//! Supports the subset of JSONPath used by feed mappings:
//! - `$` root
//! - `.name` member (any characters except `.` and `[`, so `$.HERIS-ID` works)
//! - `['name']` / `["name"]` quoted member
//! - `[n]` array index
//! - `.*` / `[*]` wildcard over array elements or object values

use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Path parse errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path must start with '$'")]
    MissingRoot,

    #[error("empty member name at offset {0}")]
    EmptyMember(usize),

    #[error("unterminated bracket starting at offset {0}")]
    UnterminatedBracket(usize),

    #[error("invalid array index \"{0}\"")]
    InvalidIndex(String),

    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("recursive descent ('..') is not supported")]
    RecursiveDescent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Member(String),
    Index(usize),
    Wildcard,
}

/// Result of evaluating a path against one source object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    /// Path does not exist or evaluates to null
    Absent,
    /// Scalar rendered as string
    Scalar(String),
    /// Path resolved to an array, an object, or several nodes
    NonScalar,
}

/// Parsed JSON path expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    raw: String,
    segments: Vec<Segment>,
}

impl JsonPath {
    /// Parse a path expression
    pub fn parse(expression: &str) -> Result<Self, PathError> {
        let raw = expression.trim();
        let chars: Vec<(usize, char)> = raw.char_indices().collect();

        match chars.first() {
            Some((_, '$')) => {}
            _ => return Err(PathError::MissingRoot),
        }

        let mut segments = Vec::new();
        let mut pos = 1;

        while pos < chars.len() {
            let (offset, ch) = chars[pos];
            match ch {
                '.' => {
                    match chars.get(pos + 1) {
                        Some((_, '.')) => return Err(PathError::RecursiveDescent),
                        Some((_, '*')) => {
                            segments.push(Segment::Wildcard);
                            pos += 2;
                            continue;
                        }
                        _ => {}
                    }

                    let start = pos + 1;
                    let mut end = start;
                    while end < chars.len() && chars[end].1 != '.' && chars[end].1 != '[' {
                        end += 1;
                    }
                    if end == start {
                        return Err(PathError::EmptyMember(offset));
                    }
                    let name: String = chars[start..end].iter().map(|(_, c)| *c).collect();
                    segments.push(Segment::Member(name));
                    pos = end;
                }
                '[' => {
                    let (segment, next) = parse_bracket(&chars, pos)?;
                    segments.push(segment);
                    pos = next;
                }
                other => {
                    return Err(PathError::UnexpectedChar { ch: other, offset });
                }
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// Original expression text
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Select every node the path reaches
    pub fn select<'a>(&self, root: &'a Value) -> Vec<&'a Value> {
        let mut current = vec![root];
        for segment in &self.segments {
            let mut next = Vec::new();
            for node in current {
                match (segment, node) {
                    (Segment::Member(name), Value::Object(map)) => {
                        if let Some(child) = map.get(name) {
                            next.push(child);
                        }
                    }
                    (Segment::Index(i), Value::Array(items)) => {
                        if let Some(child) = items.get(*i) {
                            next.push(child);
                        }
                    }
                    (Segment::Wildcard, Value::Array(items)) => next.extend(items.iter()),
                    (Segment::Wildcard, Value::Object(map)) => next.extend(map.values()),
                    _ => {}
                }
            }
            if next.is_empty() {
                return next;
            }
            current = next;
        }
        current
    }

    /// Evaluate the path and reduce the result to zero-or-one scalar
    pub fn extract(&self, source: &Value) -> Extracted {
        let nodes = self.select(source);
        match nodes.as_slice() {
            [] => Extracted::Absent,
            [node] => scalar_of(node),
            _ => Extracted::NonScalar,
        }
    }
}

fn scalar_of(node: &Value) -> Extracted {
    match node {
        Value::Null => Extracted::Absent,
        Value::String(s) => Extracted::Scalar(s.clone()),
        Value::Number(n) => Extracted::Scalar(n.to_string()),
        Value::Bool(b) => Extracted::Scalar(b.to_string()),
        Value::Array(_) | Value::Object(_) => Extracted::NonScalar,
    }
}

/// Parse `[...]` starting at `pos` (the `[`); returns the segment and the position after `]`
fn parse_bracket(chars: &[(usize, char)], pos: usize) -> Result<(Segment, usize), PathError> {
    let open_offset = chars[pos].0;
    let mut i = pos + 1;

    match chars.get(i).map(|(_, c)| *c) {
        Some(quote @ ('\'' | '"')) => {
            i += 1;
            let mut name = String::new();
            loop {
                match chars.get(i).map(|(_, c)| *c) {
                    None => return Err(PathError::UnterminatedBracket(open_offset)),
                    Some('\\') => {
                        let escaped = chars
                            .get(i + 1)
                            .map(|(_, c)| *c)
                            .ok_or(PathError::UnterminatedBracket(open_offset))?;
                        name.push(escaped);
                        i += 2;
                    }
                    Some(c) if c == quote => {
                        i += 1;
                        break;
                    }
                    Some(c) => {
                        name.push(c);
                        i += 1;
                    }
                }
            }
            expect_close(chars, i, open_offset)?;
            Ok((Segment::Member(name), i + 1))
        }
        Some('*') => {
            expect_close(chars, i + 1, open_offset)?;
            Ok((Segment::Wildcard, i + 2))
        }
        Some(_) => {
            let start = i;
            while i < chars.len() && chars[i].1 != ']' {
                i += 1;
            }
            if i >= chars.len() {
                return Err(PathError::UnterminatedBracket(open_offset));
            }
            let text: String = chars[start..i].iter().map(|(_, c)| *c).collect();
            let index = text
                .trim()
                .parse::<usize>()
                .map_err(|_| PathError::InvalidIndex(text.clone()))?;
            Ok((Segment::Index(index), i + 1))
        }
        None => Err(PathError::UnterminatedBracket(open_offset)),
    }
}

fn expect_close(chars: &[(usize, char)], i: usize, open_offset: usize) -> Result<(), PathError> {
    match chars.get(i) {
        Some((_, ']')) => Ok(()),
        Some((offset, ch)) => Err(PathError::UnexpectedChar {
            ch: *ch,
            offset: *offset,
        }),
        None => Err(PathError::UnterminatedBracket(open_offset)),
    }
}

impl FromStr for JsonPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
