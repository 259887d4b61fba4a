// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! labelwerk-store: SQLite persistence for printers, labels and their
//! templates.
//!
//! Template bodies are stored in escaped form next to a SHA-256 digest that
//! is checked whenever they are loaded.

pub mod integrity;
mod labels;
mod printers;
pub mod store;

pub use integrity::{hash_bytes, verify_hash};
pub use store::Store;
