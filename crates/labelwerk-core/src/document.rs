// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The renderable-document capability consumed by the print queues.

use std::fmt::Debug;

use crate::error::Result;

/// Anything that can produce print-ready bytes for a printer's format type.
///
/// Implementations carry everything they need (template bodies, placeholder
/// values) so rendering depends on nothing but `format_type`. Queue workers
/// call this once per copy, so it must be deterministic.
pub trait Printable: Debug + Send + Sync {
    fn render(&self, format_type: &str) -> Result<Vec<u8>>;
}

/// Pre-rendered bytes, printed as-is regardless of format type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument(pub Vec<u8>);

impl Printable for RawDocument {
    fn render(&self, _format_type: &str) -> Result<Vec<u8>> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_document_ignores_format_type() {
        let doc = RawDocument(b"^XA^XZ".to_vec());
        assert_eq!(doc.render("ZPL").expect("render"), b"^XA^XZ");
        assert_eq!(doc.render("EPL").expect("render"), b"^XA^XZ");
    }
}
