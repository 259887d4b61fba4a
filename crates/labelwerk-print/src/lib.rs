// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Labelwerk Print: raw TCP printer connections, bounded per-printer queues
// and the pooler that routes print tasks to them.

pub mod connection;
pub mod pooler;
pub mod queue;

#[cfg(test)]
mod testutil;

pub use connection::{ConnectionState, PrinterConnection};
pub use pooler::{Pooler, PoolerHandle};
pub use queue::{PrintQueue, QueueState, QueueWorker, Task};
