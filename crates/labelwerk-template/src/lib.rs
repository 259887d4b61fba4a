// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// labelwerk-template: Label templates for the Labelwerk print dispatcher.
//
// Escapes raw label bodies (ZPL, EPL, ...) once at creation time so that
// placeholders are unambiguous, and renders them against submitted values.

pub mod escape;
pub mod label;
pub mod template;

// Re-export the primary structs so callers can use `labelwerk_template::Label` etc.
pub use label::Label;
pub use template::Template;
