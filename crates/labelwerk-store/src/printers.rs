// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer rows.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use tracing::{debug, instrument};

use labelwerk_core::error::{LabelwerkError, Result};
use labelwerk_core::types::{Printer, PrinterId};

use crate::store::{Store, db_err};

const SELECT_PRINTER: &str = "SELECT id, addr, format_type, comment, created_at FROM printers";

impl Store {
    /// Persist a new printer and assign its id.
    #[instrument(skip(self, printer), fields(addr = %printer.addr))]
    pub fn insert_printer(&self, printer: &mut Printer) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO printers (addr, format_type, comment, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    printer.addr,
                    printer.format_type,
                    printer.comment,
                    printer.created_at.to_rfc3339(),
                ],
            )
            .map_err(db_err)?;

        printer.id = PrinterId(self.conn.last_insert_rowid());
        debug!(printer_id = %printer.id, "printer stored");
        Ok(())
    }

    pub fn get_printer(&self, id: PrinterId) -> Result<Printer> {
        self.conn
            .query_row(&format!("{SELECT_PRINTER} WHERE id = ?1"), params![id.0], row_to_printer)
            .optional()
            .map_err(db_err)?
            .ok_or_else(|| LabelwerkError::NotFound(format!("printer {id}")))
    }

    /// All printers, ordered by id.
    pub fn list_printers(&self) -> Result<Vec<Printer>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_PRINTER} ORDER BY id ASC"))
            .map_err(db_err)?;

        let rows = stmt.query_map([], row_to_printer).map_err(db_err)?;

        let mut printers = Vec::new();
        for row in rows {
            printers.push(row.map_err(db_err)?);
        }
        Ok(printers)
    }

    #[instrument(skip(self))]
    pub fn delete_printer(&self, id: PrinterId) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM printers WHERE id = ?1", params![id.0])
            .map_err(db_err)?;
        if deleted == 0 {
            return Err(LabelwerkError::NotFound(format!("printer {id}")));
        }
        debug!("printer deleted");
        Ok(())
    }
}

fn row_to_printer(row: &rusqlite::Row<'_>) -> rusqlite::Result<Printer> {
    let created_at_str: String = row.get(4)?;
    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Printer {
        id: PrinterId(row.get(0)?),
        addr: row.get(1)?,
        format_type: row.get(2)?,
        comment: row.get(3)?,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store::open_in_memory().expect("open in-memory store")
    }

    #[test]
    fn insert_assigns_increasing_ids() {
        let store = store();
        let mut first = Printer::new("ZPL", "10.0.0.5:9100", "dock 1");
        let mut second = Printer::new("EPL", "10.0.0.6:9100", "");
        store.insert_printer(&mut first).unwrap();
        store.insert_printer(&mut second).unwrap();
        assert!(first.id.0 > 0);
        assert!(second.id > first.id);
    }

    #[test]
    fn get_returns_stored_fields() {
        let store = store();
        let mut printer = Printer::new("ZPL", "printer.local:9100", "warehouse");
        store.insert_printer(&mut printer).unwrap();

        let loaded = store.get_printer(printer.id).unwrap();
        assert_eq!(loaded.addr, "printer.local:9100");
        assert_eq!(loaded.format_type, "ZPL");
        assert_eq!(loaded.comment, "warehouse");
        assert_eq!(loaded.created_at.timestamp(), printer.created_at.timestamp());
    }

    #[test]
    fn list_is_ordered_by_id() {
        let store = store();
        for n in 1..=3 {
            let mut printer = Printer::new("ZPL", format!("10.0.0.{n}:9100"), "");
            store.insert_printer(&mut printer).unwrap();
        }
        let addrs: Vec<String> = store
            .list_printers()
            .unwrap()
            .into_iter()
            .map(|p| p.addr)
            .collect();
        assert_eq!(addrs, ["10.0.0.1:9100", "10.0.0.2:9100", "10.0.0.3:9100"]);
    }

    #[test]
    fn delete_missing_printer_is_not_found() {
        let store = store();
        let mut printer = Printer::new("ZPL", "10.0.0.5:9100", "");
        store.insert_printer(&mut printer).unwrap();

        store.delete_printer(printer.id).unwrap();
        assert!(matches!(store.get_printer(printer.id), Err(LabelwerkError::NotFound(_))));
        assert!(matches!(store.delete_printer(printer.id), Err(LabelwerkError::NotFound(_))));
    }
}
