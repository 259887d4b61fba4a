// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Placeholder escaping and substitution.
//
// Label languages such as ZPL use `_` as ordinary syntax, so a placeholder
// cannot simply be "anything between two underscores" at print time. Instead
// the raw body is scanned once, when the template is created, and every
// closed placeholder (`_name_`) is wrapped in `DELIMITER`. Rendering then
// only has to look for delimiter pairs.
//
// Raw:     ^FO_left_^FD_company_name_^FS
// Escaped: ^FO^__left_^_^FD^__company_name_^_^FS

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use labelwerk_core::error::{LabelwerkError, Result};

/// Internal delimiter around an escaped placeholder.
pub const DELIMITER: &str = "^_";

/// Unicode letters (general category `L`) and decimal digits (`Nd`).
static NAME_SYMBOL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\p{L}\p{Nd}]$").expect("placeholder symbol class must compile")
});

/// Characters that may appear inside a placeholder name: `_`, letters and
/// decimal digits. Marks, letter numbers and other numerics end a name.
pub fn is_allowed_symbol(c: char) -> bool {
    if c == '_' || c.is_ascii_alphanumeric() {
        return true;
    }
    if c.is_ascii() {
        return false;
    }
    let mut buf = [0u8; 4];
    NAME_SYMBOL.is_match(c.encode_utf8(&mut buf))
}

/// Whether `name` has the shape of a closed placeholder: `_`, one or more
/// allowed symbols, ending in `_`.
pub fn is_placeholder(name: &str) -> bool {
    name.len() >= 2
        && name.starts_with('_')
        && name.ends_with('_')
        && name.chars().all(is_allowed_symbol)
}

/// Escape a raw template body.
///
/// A candidate starts at `_` and keeps growing while the following characters
/// are allowed symbols. If the candidate is closed (ends in `_`) it is wrapped
/// in `DELIMITER`; otherwise it is copied verbatim, followed by the character
/// that ended it.
pub fn escape_body(raw: &[u8]) -> Result<Vec<u8>> {
    let text = std::str::from_utf8(raw).map_err(|e| LabelwerkError::Decoding {
        valid_up_to: e.valid_up_to(),
    })?;

    let mut escaped = String::with_capacity(text.len());
    let mut candidate = String::new();

    for c in text.chars() {
        if candidate.is_empty() {
            if c == '_' {
                candidate.push(c);
            } else {
                escaped.push(c);
            }
            continue;
        }
        if is_allowed_symbol(c) {
            candidate.push(c);
            continue;
        }
        flush_candidate(&mut escaped, &mut candidate);
        escaped.push(c);
    }
    flush_candidate(&mut escaped, &mut candidate);

    Ok(escaped.into_bytes())
}

fn flush_candidate(out: &mut String, candidate: &mut String) {
    if is_placeholder(candidate) {
        out.push_str(DELIMITER);
        out.push_str(candidate);
        out.push_str(DELIMITER);
    } else {
        out.push_str(candidate);
    }
    candidate.clear();
}

/// Substitute every escaped placeholder in `escaped` with its value.
///
/// Fails with `MissingPlaceholder` on the first placeholder that has no
/// value; nothing is returned in that case. A delimiter that does not open a
/// well-formed placeholder is kept as literal content.
pub fn render_body(escaped: &[u8], placeholders: &HashMap<String, String>) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(escaped.len());
    for segment in Segments::new(escaped) {
        match segment {
            Segment::Literal(bytes) => output.extend_from_slice(bytes),
            Segment::Placeholder(name) => {
                let value = placeholders
                    .get(name)
                    .ok_or_else(|| LabelwerkError::MissingPlaceholder(name.to_owned()))?;
                output.extend_from_slice(value.as_bytes());
            }
        }
    }
    Ok(output)
}

/// Names of all escaped placeholders, in order of appearance.
pub fn placeholder_names(escaped: &[u8]) -> Vec<String> {
    Segments::new(escaped)
        .filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name.to_owned()),
            Segment::Literal(_) => None,
        })
        .collect()
}

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a [u8]),
    Placeholder(&'a str),
}

/// Iterator over the literal and placeholder parts of an escaped body.
struct Segments<'a> {
    rest: &'a [u8],
    pending: Option<&'a str>,
}

impl<'a> Segments<'a> {
    fn new(escaped: &'a [u8]) -> Self {
        Self {
            rest: escaped,
            pending: None,
        }
    }
}

impl<'a> Iterator for Segments<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(name) = self.pending.take() {
            return Some(Segment::Placeholder(name));
        }
        if self.rest.is_empty() {
            return None;
        }

        let delim = DELIMITER.as_bytes();
        let mut scan_from = 0;
        while let Some(pos) = find(&self.rest[scan_from..], delim) {
            let start = scan_from + pos;
            let inner_start = start + delim.len();
            let enclosed = find(&self.rest[inner_start..], delim).and_then(|len| {
                let inner = &self.rest[inner_start..inner_start + len];
                std::str::from_utf8(inner)
                    .ok()
                    .filter(|name| is_placeholder(name))
                    .map(|name| (name, inner_start + len + delim.len()))
            });

            match enclosed {
                Some((name, end)) => {
                    let literal = &self.rest[..start];
                    self.rest = &self.rest[end..];
                    if literal.is_empty() {
                        return Some(Segment::Placeholder(name));
                    }
                    self.pending = Some(name);
                    return Some(Segment::Literal(literal));
                }
                // Not an escaped placeholder: keep the delimiter as content.
                None => scan_from = inner_start,
            }
        }

        let literal = self.rest;
        self.rest = &[];
        Some(Segment::Literal(literal))
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
