// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Label and template rows.
//
// Template bodies are stored escaped, exactly as `Template::body` returns
// them, and are rebuilt with `Template::from_escaped` so they are never
// escaped twice.

use rusqlite::{ErrorCode, OptionalExtension, params};
use tracing::{debug, instrument, warn};

use labelwerk_core::error::{LabelwerkError, Result};
use labelwerk_core::types::{LabelId, TemplateId};
use labelwerk_template::{Label, Template};

use crate::integrity::{hash_bytes, verify_hash};
use crate::store::{Store, db_err};

/// A template row before its body hash has been checked.
struct TemplateRow {
    template: Template,
    body_hash: String,
}

impl TemplateRow {
    fn verified(self) -> Result<Template> {
        if let Err(e) = verify_hash(self.template.body(), &self.body_hash) {
            warn!(
                template_id = %self.template.id,
                label_id = %self.template.label_id,
                "stored template body does not match its hash"
            );
            return Err(e);
        }
        Ok(self.template)
    }
}

impl Store {
    /// Persist a new label and assign its id. Templates already attached to
    /// the label are not stored; use [`Store::insert_template`].
    #[instrument(skip(self, label), fields(name = %label.name))]
    pub fn insert_label(&self, label: &mut Label) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO labels (name, comment) VALUES (?1, ?2)",
                params![label.name, label.comment],
            )
            .map_err(db_err)?;

        label.id = LabelId(self.conn.last_insert_rowid());
        debug!(label_id = %label.id, "label stored");
        Ok(())
    }

    /// Load a label with all of its templates. The placeholder map is empty.
    pub fn get_label(&self, id: LabelId) -> Result<Label> {
        let mut label = self
            .conn
            .query_row(
                "SELECT id, name, comment FROM labels WHERE id = ?1",
                params![id.0],
                row_to_label,
            )
            .optional()
            .map_err(db_err)?
            .ok_or_else(|| LabelwerkError::NotFound(format!("label {id}")))?;

        for template in self.list_templates(id)? {
            label.add_template(template);
        }
        Ok(label)
    }

    /// All labels ordered by id, without their templates.
    pub fn list_labels(&self) -> Result<Vec<Label>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, comment FROM labels ORDER BY id ASC")
            .map_err(db_err)?;

        let rows = stmt.query_map([], row_to_label).map_err(db_err)?;

        let mut labels = Vec::new();
        for row in rows {
            labels.push(row.map_err(db_err)?);
        }
        Ok(labels)
    }

    /// Delete a label together with its templates.
    #[instrument(skip(self))]
    pub fn delete_label(&self, id: LabelId) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM labels WHERE id = ?1", params![id.0])
            .map_err(db_err)?;
        if deleted == 0 {
            return Err(LabelwerkError::NotFound(format!("label {id}")));
        }
        debug!("label deleted");
        Ok(())
    }

    /// Persist a template and assign its id.
    ///
    /// The label must exist, and it may hold only one template per format
    /// type.
    #[instrument(skip(self, template), fields(label_id = %template.label_id, format_type = %template.format_type))]
    pub fn insert_template(&self, template: &mut Template) -> Result<()> {
        let label_exists = self
            .conn
            .query_row(
                "SELECT 1 FROM labels WHERE id = ?1",
                params![template.label_id.0],
                |_| Ok(()),
            )
            .optional()
            .map_err(db_err)?
            .is_some();
        if !label_exists {
            return Err(LabelwerkError::NotFound(format!("label {}", template.label_id)));
        }

        let body_hash = hash_bytes(template.body());
        self.conn
            .execute(
                "INSERT INTO templates (label_id, format_type, body, body_hash)
                 VALUES (?1, ?2, ?3, ?4)",
                params![template.label_id.0, template.format_type, template.body(), body_hash],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(ref err, _)
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    LabelwerkError::Validation(format!(
                        "label {} already has a {} template",
                        template.label_id, template.format_type
                    ))
                }
                other => db_err(other),
            })?;

        template.id = TemplateId(self.conn.last_insert_rowid());
        debug!(template_id = %template.id, "template stored");
        Ok(())
    }

    pub fn get_template(&self, label_id: LabelId, id: TemplateId) -> Result<Template> {
        self.conn
            .query_row(
                "SELECT id, label_id, format_type, body, body_hash
                 FROM templates WHERE label_id = ?1 AND id = ?2",
                params![label_id.0, id.0],
                row_to_template,
            )
            .optional()
            .map_err(db_err)?
            .ok_or_else(|| LabelwerkError::NotFound(format!("template {id} of label {label_id}")))?
            .verified()
    }

    /// Templates of one label, ordered by id.
    pub fn list_templates(&self, label_id: LabelId) -> Result<Vec<Template>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, label_id, format_type, body, body_hash
                 FROM templates WHERE label_id = ?1 ORDER BY id ASC",
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map(params![label_id.0], row_to_template)
            .map_err(db_err)?;

        let mut templates = Vec::new();
        for row in rows {
            templates.push(row.map_err(db_err)?.verified()?);
        }
        Ok(templates)
    }

    #[instrument(skip(self))]
    pub fn delete_template(&self, label_id: LabelId, id: TemplateId) -> Result<()> {
        let deleted = self
            .conn
            .execute(
                "DELETE FROM templates WHERE label_id = ?1 AND id = ?2",
                params![label_id.0, id.0],
            )
            .map_err(db_err)?;
        if deleted == 0 {
            return Err(LabelwerkError::NotFound(format!("template {id} of label {label_id}")));
        }
        debug!("template deleted");
        Ok(())
    }
}

fn row_to_label(row: &rusqlite::Row<'_>) -> rusqlite::Result<Label> {
    let mut label = Label::new(row.get::<_, String>(1)?, row.get::<_, String>(2)?);
    label.id = LabelId(row.get(0)?);
    Ok(label)
}

fn row_to_template(row: &rusqlite::Row<'_>) -> rusqlite::Result<TemplateRow> {
    let template = Template::from_escaped(
        TemplateId(row.get(0)?),
        LabelId(row.get(1)?),
        row.get::<_, String>(2)?,
        row.get(3)?,
    );
    Ok(TemplateRow {
        template,
        body_hash: row.get(4)?,
    })
}
