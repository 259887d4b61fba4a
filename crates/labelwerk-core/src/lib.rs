// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Labelwerk: Core types, error definitions and configuration shared across
// all crates.

pub mod config;
pub mod document;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use document::{Printable, RawDocument};
pub use error::{LabelwerkError, Result};
pub use types::*;
