// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Labels: a named set of templates, one per printer format type.

use std::collections::HashMap;

use labelwerk_core::document::Printable;
use labelwerk_core::error::{LabelwerkError, Result};
use labelwerk_core::types::{LabelId, Placeholder};

use crate::template::Template;

/// A label with its templates.
///
/// `placeholders` is only filled in for a specific print submission; it is
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    /// Zero until the label has been stored.
    pub id: LabelId,
    pub name: String,
    pub comment: String,
    templates: HashMap<String, Template>,
    placeholders: HashMap<String, String>,
}

impl Label {
    pub fn new(name: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            id: LabelId(0),
            name: name.into(),
            comment: comment.into(),
            templates: HashMap::new(),
            placeholders: HashMap::new(),
        }
    }

    /// Attach a template, replacing any previous one for the same format type.
    pub fn add_template(&mut self, template: Template) -> Option<Template> {
        self.templates.insert(template.format_type.clone(), template)
    }

    pub fn template(&self, format_type: &str) -> Option<&Template> {
        self.templates.get(format_type)
    }

    pub fn templates(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }

    /// Bind placeholder values for one submission. Later bindings of the same
    /// name win.
    pub fn with_placeholders(mut self, placeholders: impl IntoIterator<Item = Placeholder>) -> Self {
        self.placeholders = placeholders
            .into_iter()
            .map(|p| (p.name, p.value))
            .collect();
        self
    }

    pub fn placeholders(&self) -> &HashMap<String, String> {
        &self.placeholders
    }
}

impl Printable for Label {
    fn render(&self, format_type: &str) -> Result<Vec<u8>> {
        let template = self
            .templates
            .get(format_type)
            .ok_or_else(|| LabelwerkError::NoTemplate(format_type.to_owned()))?;
        template.render(&self.placeholders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label() -> Label {
        let mut label = Label::new("shipping", "");
        label.add_template(Template::new(LabelId(0), "ZPL", b"^XA^FD_name_^FS^XZ").expect("zpl"));
        label.add_template(Template::new(LabelId(0), "EPL", b"A50,0,0,1,1,1,N,\"_name_\"").expect("epl"));
        label
    }

    #[test]
    fn renders_template_for_format_type() {
        let label = label().with_placeholders([Placeholder::new("_name_", "Acme")]);
        assert_eq!(label.render("ZPL").expect("zpl"), b"^XA^FDAcme^FS^XZ");
        assert_eq!(label.render("EPL").expect("epl"), b"A50,0,0,1,1,1,N,\"Acme\"");
    }

    #[test]
    fn unknown_format_type_fails() {
        let err = label().render("TSPL").unwrap_err();
        assert!(matches!(err, LabelwerkError::NoTemplate(t) if t == "TSPL"));
    }

    #[test]
    fn placeholders_are_required() {
        let err = label().render("ZPL").unwrap_err();
        assert!(matches!(err, LabelwerkError::MissingPlaceholder(_)));
    }

    #[test]
    fn last_binding_wins() {
        let label = label().with_placeholders([
            Placeholder::new("_name_", "first"),
            Placeholder::new("_name_", "second"),
        ]);
        assert_eq!(label.render("ZPL").expect("zpl"), b"^XA^FDsecond^FS^XZ");
    }

    #[test]
    fn add_template_replaces_same_type() {
        let mut label = label();
        let old = label.add_template(Template::new(LabelId(0), "ZPL", b"^XA^XZ").expect("zpl"));
        assert!(old.is_some());
        assert_eq!(label.templates().count(), 2);
        assert_eq!(label.render("ZPL").expect("zpl"), b"^XA^XZ");
    }
}
