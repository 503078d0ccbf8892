//! Named parameter binding.
//!
//! Rewrites `:name` placeholders into the positional style of the backend and
//! resolves their values from a serialized argument. Dotted names such as
//! `:user.id` walk nested objects; numeric segments index into arrays.
//! Placeholders inside quoted text are left alone, and `::` passes through as
//! a PostgreSQL cast.

use crate::db::fields::Field;
use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, QueryParam};

/// A query rewritten to positional placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuery {
    pub query: String,
    pub params: Vec<QueryParam>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'q> {
    Text(&'q str),
    Name(&'q str),
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.'
}

/// Split `query` into literal text and placeholder names.
fn parse(query: &str) -> Vec<Segment<'_>> {
    let bytes = query.as_bytes();
    let mut segments = Vec::new();
    let mut quote: Option<u8> = None;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'\'' | b'"' | b'`' => {
                quote = Some(b);
                i += 1;
            }
            b':' if bytes.get(i + 1) == Some(&b':') => i += 2,
            b':' if bytes.get(i + 1).copied().is_some_and(is_name_start) => {
                let name_start = i + 1;
                let mut end = name_start;
                while end < bytes.len() && is_name_byte(bytes[end]) {
                    end += 1;
                }
                // Trailing dots end the sentence, not the path.
                while bytes[end - 1] == b'.' {
                    end -= 1;
                }
                if start < i {
                    segments.push(Segment::Text(&query[start..i]));
                }
                segments.push(Segment::Name(&query[name_start..end]));
                start = end;
                i = end;
            }
            _ => i += 1,
        }
    }
    if start < bytes.len() {
        segments.push(Segment::Text(&query[start..]));
    }
    segments
}

/// Byte range of the parenthesised group following the `VALUES` keyword,
/// both parentheses included.
fn values_group(query: &str) -> Option<(usize, usize)> {
    let bytes = query.as_bytes();
    let mut quote: Option<u8> = None;
    let mut seen_values = false;
    let mut open = None;
    let mut depth = 0usize;

    for (i, &b) in bytes.iter().enumerate() {
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'\'' | b'"' | b'`' => quote = Some(b),
            b'(' if seen_values => {
                if depth == 0 {
                    open = Some(i);
                }
                depth += 1;
            }
            b')' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return open.map(|start| (start, i));
                }
            }
            b'v' | b'V' if !seen_values && is_keyword_at(bytes, i, b"values") => {
                seen_values = true;
            }
            _ => {}
        }
    }
    None
}

fn is_keyword_at(bytes: &[u8], at: usize, keyword: &[u8]) -> bool {
    let end = at + keyword.len();
    let boundary = |b: Option<&u8>| b.is_none_or(|b| !(b.is_ascii_alphanumeric() || *b == b'_'));
    bytes.len() >= end
        && bytes[at..end].eq_ignore_ascii_case(keyword)
        && boundary(at.checked_sub(1).and_then(|p| bytes.get(p)))
        && boundary(bytes.get(end))
}

struct Binder {
    db_type: DatabaseType,
    query: String,
    params: Vec<QueryParam>,
}

impl Binder {
    fn new(db_type: DatabaseType, capacity: usize) -> Self {
        Self {
            db_type,
            query: String::with_capacity(capacity),
            params: Vec::new(),
        }
    }

    fn push(&mut self, segments: &[Segment<'_>], record: &Field) -> DbResult<()> {
        for segment in segments {
            match segment {
                Segment::Text(text) => self.query.push_str(text),
                Segment::Name(name) => {
                    let value = record.lookup(name).ok_or_else(|| {
                        DbError::invalid_input(format!(
                            "could not find name '{}' in argument",
                            name
                        ))
                    })?;
                    self.params.push(value.to_param());
                    let placeholder = self.db_type.placeholder(self.params.len());
                    self.query.push_str(&placeholder);
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> BoundQuery {
        BoundQuery {
            query: self.query,
            params: self.params,
        }
    }
}

/// Bind `:name` placeholders in `query` from `arg`.
///
/// A sequence argument is a bulk insert: the `VALUES (...)` group is repeated
/// once per element, and names outside the group resolve against the first
/// element.
pub(crate) fn bind_named(
    query: &str,
    arg: &Field,
    db_type: DatabaseType,
) -> DbResult<BoundQuery> {
    let mut binder = Binder::new(db_type, query.len());
    match arg {
        Field::Seq(records) => {
            let first = records.first().ok_or_else(|| {
                DbError::invalid_input("bulk named exec requires at least one record")
            })?;
            let (open, close) = values_group(query).ok_or_else(|| {
                DbError::invalid_input("bulk named exec requires a VALUES (...) group")
            })?;

            binder.push(&parse(&query[..open]), first)?;
            let group = parse(&query[open..=close]);
            for (i, record) in records.iter().enumerate() {
                if i != 0 {
                    binder.query.push(',');
                }
                binder.push(&group, record)?;
            }
            binder.push(&parse(&query[close + 1..]), first)?;
        }
        record => binder.push(&parse(query), record)?,
    }
    Ok(binder.finish())
}

/// Placeholder groups for a multi-row insert: `records` groups of `columns`
/// `?` markers, e.g. `(?, ?),(?, ?)`.
pub fn bulk_bind_vars(records: usize, columns: usize) -> String {
    if records == 0 || columns == 0 {
        return String::new();
    }
    let group = format!("({})", vec!["?"; columns].join(", "));
    vec![group.as_str(); records].join(",")
}
