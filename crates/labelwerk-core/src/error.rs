// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Labelwerk.

use std::io::ErrorKind;

use thiserror::Error;

use crate::types::PrinterId;

/// Top-level error type for all Labelwerk operations.
#[derive(Debug, Error)]
pub enum LabelwerkError {
    // -- Rendering errors --
    #[error("missing placeholder: {0}")]
    MissingPlaceholder(String),

    #[error("template body decoding error: invalid UTF-8 after byte {valid_up_to}")]
    Decoding { valid_up_to: usize },

    #[error("label has no template with type: {0}")]
    NoTemplate(String),

    // -- Queue errors --
    #[error("cannot enqueue task for printer {0}, queue already full")]
    QueueFull(PrinterId),

    #[error("queue for printer {0} is closed")]
    QueueClosed(PrinterId),

    #[error("printing pooler is not running")]
    PoolerStopped,

    #[error("printer {printer_id}: {sent} of {requested} copies sent")]
    PrintIncomplete {
        printer_id: PrinterId,
        sent: u64,
        requested: u64,
    },

    // -- Connection errors --
    #[error("printer {0} is not connected")]
    NotConnected(PrinterId),

    #[error("cannot connect to printer at {addr}: {reason}")]
    ConnectFailed { addr: String, reason: String },

    #[error("connection to printer {0} was closed")]
    ConnectionClosed(PrinterId),

    // -- Storage / service --
    #[error("validation error: {0}")]
    Validation(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LabelwerkError {
    /// Whether this error comes from rendering a document rather than from
    /// the transport.
    pub fn is_render_error(&self) -> bool {
        matches!(
            self,
            Self::MissingPlaceholder(_) | Self::Decoding { .. } | Self::NoTemplate(_)
        )
    }
}

/// Whether an I/O error means the printer side of the socket is gone.
pub fn is_connection_closed(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::UnexpectedEof
            | ErrorKind::WriteZero
    )
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LabelwerkError>;
