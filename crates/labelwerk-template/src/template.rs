// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// A label template for one printer command language.

use std::collections::HashMap;

use tracing::debug;

use labelwerk_core::error::Result;
use labelwerk_core::types::{LabelId, TemplateId};

use crate::escape::{escape_body, placeholder_names, render_body};

/// Template body in escaped form, bound to a label and a format type.
///
/// The body is escaped exactly once, in [`Template::new`]. Templates loaded
/// from storage use [`Template::from_escaped`] and are never escaped again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    /// Zero until the template has been stored.
    pub id: TemplateId,
    pub label_id: LabelId,
    pub format_type: String,
    body: Vec<u8>,
}

impl Template {
    /// Create a template from a raw body, escaping its placeholders.
    pub fn new(label_id: LabelId, format_type: impl Into<String>, raw_body: &[u8]) -> Result<Self> {
        let body = escape_body(raw_body)?;
        let format_type = format_type.into();
        debug!(
            label_id = %label_id,
            format_type = %format_type,
            raw_len = raw_body.len(),
            escaped_len = body.len(),
            "template body escaped"
        );
        Ok(Self {
            id: TemplateId(0),
            label_id,
            format_type,
            body,
        })
    }

    /// Rebuild a template whose body is already escaped.
    pub fn from_escaped(
        id: TemplateId,
        label_id: LabelId,
        format_type: impl Into<String>,
        escaped_body: Vec<u8>,
    ) -> Self {
        Self {
            id,
            label_id,
            format_type: format_type.into(),
            body: escaped_body,
        }
    }

    /// The escaped body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The body as it was written. Every name maps to itself, so rendering
    /// cannot miss a value.
    pub fn raw_body(&self) -> Vec<u8> {
        let identity: HashMap<String, String> = self
            .placeholders()
            .into_iter()
            .map(|name| (name.clone(), name))
            .collect();
        render_body(&self.body, &identity).unwrap_or_else(|_| self.body.clone())
    }

    /// Placeholder names used by this template, in order of appearance.
    pub fn placeholders(&self) -> Vec<String> {
        placeholder_names(&self.body)
    }

    /// Render the template. All-or-nothing: any missing value fails the
    /// whole render.
    pub fn render(&self, placeholders: &HashMap<String, String>) -> Result<Vec<u8>> {
        render_body(&self.body, placeholders)
    }
}
