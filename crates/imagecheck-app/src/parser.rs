// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{Catalog, Header, Row};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The text has no line that is non-blank after trimming.
    EmptyInput,
    /// Any other failure, carrying the underlying message.
    Failure(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyInput => f.write_str("CSV file is empty"),
            Self::Failure(message) => write!(f, "Error parsing CSV file: {message}"),
        }
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Splits one line into trimmed fields.
///
/// A `"` toggles the quoted state and is never emitted, so a comma between
/// quotes stays inside the field. A doubled `""` toggles twice instead of
/// producing a literal quote; files relying on that escape lose the quote.
pub fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(trim_field(&current).to_owned());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    fields.push(trim_field(&current).to_owned());
    fields
}

/// Strips whitespace and stray byte-order marks from both ends.
fn trim_field(field: &str) -> &str {
    field.trim_matches(|ch: char| ch.is_whitespace() || ch == '\u{FEFF}')
}

/// Parses comma-delimited text into a header and rows.
///
/// Lines are split on `\n` and blank lines are dropped before anything else,
/// so quoting never protects an embedded newline.
pub fn parse(text: &str) -> ParseResult<Catalog> {
    let mut lines = text.split('\n').filter(|line| !trim_field(line).is_empty());

    let header_line = lines.next().ok_or(ParseError::EmptyInput)?;
    let header = Header::new(split_fields(header_line));

    let rows = lines
        .map(|line| Row::from_fields(&header, split_fields(line)))
        .collect::<Vec<_>>();

    tracing::debug!(
        columns = header.len(),
        rows = rows.len(),
        "parsed catalog text"
    );
    Ok(Catalog { header, rows })
}

/// Decodes uploaded bytes as UTF-8 (dropping a leading byte-order mark) and
/// parses them.
pub fn parse_bytes(bytes: &[u8]) -> ParseResult<Catalog> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let text = std::str::from_utf8(bytes).map_err(|error| ParseError::Failure(error.to_string()))?;
    parse(text)
}
