// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pooler: owns every per-printer queue and routes commands to them.
//
// All registry mutation happens on the single task running `Pooler::run`;
// callers talk to it through a cloneable `PoolerHandle`. The command channel
// is deliberately tiny, so a producer waits until the loop has taken its
// previous command.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use labelwerk_core::document::Printable;
use labelwerk_core::error::{LabelwerkError, Result};
use labelwerk_core::types::{Printer, PrinterId};

use crate::connection::DEFAULT_CONNECT_TIMEOUT;
use crate::queue::{PrintQueue, Task};

/// Capacity of the command channel.
pub const COMMAND_BUFFER: usize = 1;

#[derive(Debug)]
enum Command {
    Add(Vec<Printer>),
    Remove {
        printer_id: PrinterId,
        reply: oneshot::Sender<Result<()>>,
    },
    Submit(Task),
}

/// Cloneable producer side of the pooler.
#[derive(Debug, Clone)]
pub struct PoolerHandle {
    tx: mpsc::Sender<Command>,
}

impl PoolerHandle {
    /// Register printers. Ids that already have a queue are ignored.
    pub async fn add(&self, printers: Vec<Printer>) -> Result<()> {
        self.send(Command::Add(printers)).await
    }

    /// Unregister a printer and close its queue. Unknown ids are not an error.
    pub async fn remove(&self, printer_id: PrinterId) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Remove { printer_id, reply }).await?;
        rx.await.map_err(|_| LabelwerkError::PoolerStopped)?
    }

    /// Submit a document for printing.
    ///
    /// Delivery is fire-and-forget: an unknown printer or a full queue is
    /// logged by the pooler and the task is dropped. Only a stopped pooler is
    /// reported back.
    pub async fn submit(
        &self,
        printer_id: PrinterId,
        document: Arc<dyn Printable>,
        quantity: u32,
        delay: Duration,
    ) -> Result<()> {
        let task = Task::new(printer_id, document, quantity, delay);
        debug!(printer_id = %printer_id, task_id = %task.id, quantity, "submitting task");
        self.send(Command::Submit(task)).await
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| LabelwerkError::PoolerStopped)
    }
}

/// Registry of per-printer queues.
#[derive(Debug)]
pub struct Pooler {
    buffer_size: usize,
    connect_timeout: Duration,
    tx: mpsc::Sender<Command>,
    rx: mpsc::Receiver<Command>,
    queues: HashMap<PrinterId, PrintQueue>,
    workers: JoinSet<u64>,
}

impl Pooler {
    /// `buffer_size` is the capacity of every per-printer queue.
    pub fn new(buffer_size: usize) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        Self {
            buffer_size,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            tx,
            rx,
            queues: HashMap::new(),
            workers: JoinSet::new(),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn handle(&self) -> PoolerHandle {
        PoolerHandle {
            tx: self.tx.clone(),
        }
    }

    /// Serve commands until `cancel` fires, then close every queue and wait
    /// for all workers to finish. Commands still pending at that point are
    /// discarded.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(buffer_size = self.buffer_size, "pooler started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                Some(command) = self.rx.recv() => self.handle_command(command, &cancel),
                Some(joined) = self.workers.join_next(), if !self.workers.is_empty() => {
                    worker_finished(joined);
                }
            }
        }

        info!(queues = self.queues.len(), "pooler stopping, closing queues");
        self.rx.close();
        for (_, mut queue) in self.queues.drain() {
            queue.close();
        }
        while let Some(joined) = self.workers.join_next().await {
            worker_finished(joined);
        }
        info!("pooler stopped");
    }

    fn handle_command(&mut self, command: Command, cancel: &CancellationToken) {
        match command {
            Command::Add(printers) => {
                for printer in printers {
                    self.add_printer(printer, cancel);
                }
            }
            Command::Remove { printer_id, reply } => {
                self.remove_printer(printer_id);
                // The caller may have given up waiting.
                let _ = reply.send(Ok(()));
            }
            Command::Submit(task) => self.submit(task),
        }
    }

    fn add_printer(&mut self, printer: Printer, cancel: &CancellationToken) {
        let printer_id = printer.id;
        if self.queues.contains_key(&printer_id) {
            warn!(printer_id = %printer_id, "printer already registered, ignored");
            return;
        }

        let mut queue = PrintQueue::new(printer, self.buffer_size, cancel.child_token())
            .with_connect_timeout(self.connect_timeout);
        match queue.start() {
            Ok(worker) => {
                self.workers.spawn(worker.run());
                info!(
                    printer_id = %printer_id,
                    addr = %queue.printer().addr,
                    format_type = %queue.printer().format_type,
                    "printer registered"
                );
                self.queues.insert(printer_id, queue);
            }
            Err(e) => error!(printer_id = %printer_id, error = %e, "cannot start queue"),
        }
    }

    fn remove_printer(&mut self, printer_id: PrinterId) {
        match self.queues.remove(&printer_id) {
            Some(mut queue) => {
                queue.close();
                info!(printer_id = %printer_id, "printer unregistered");
            }
            None => warn!(printer_id = %printer_id, "printer is not registered"),
        }
    }

    fn submit(&mut self, task: Task) {
        let Some(queue) = self.queues.get(&task.printer_id) else {
            warn!(
                printer_id = %task.printer_id,
                task_id = %task.id,
                "printer is not registered, task dropped"
            );
            return;
        };
        let task_id = task.id;
        if let Err(e) = queue.enqueue(task) {
            warn!(printer_id = %queue.printer_id(), task_id = %task_id, error = %e, "task dropped");
        }
    }
}

fn worker_finished(joined: std::result::Result<u64, JoinError>) {
    match joined {
        Ok(sent) => debug!(sent, "queue worker finished"),
        Err(e) => error!(error = %e, "queue worker failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockPrinter, refused_addr, test_printer};
    use labelwerk_core::document::RawDocument;

    fn doc(payload: &str) -> Arc<dyn Printable> {
        Arc::new(RawDocument(payload.as_bytes().to_vec()))
    }

    fn spawn_pooler(buffer: usize) -> (PoolerHandle, CancellationToken, tokio::task::JoinHandle<()>) {
        let pooler = Pooler::new(buffer).with_connect_timeout(Duration::from_secs(1));
        let handle = pooler.handle();
        let cancel = CancellationToken::new();
        let join = tokio::spawn(pooler.run(cancel.clone()));
        (handle, cancel, join)
    }

    #[tokio::test]
    async fn routes_tasks_to_printer() {
        let mock = MockPrinter::bind().await;
        let (handle, cancel, join) = spawn_pooler(4);

        handle.add(vec![test_printer(1, &mock.addr)]).await.expect("add");
        let mut peer = mock.accept().await;
        handle.submit(PrinterId(1), doc("^XA^XZ"), 2, Duration::ZERO).await.expect("submit");

        assert_eq!(peer.read_exact_bytes(12).await, b"^XA^XZ^XA^XZ");
        cancel.cancel();
        join.await.expect("pooler");
    }

    #[tokio::test]
    async fn printers_do_not_block_each_other() {
        let slow = MockPrinter::bind().await;
        let fast = MockPrinter::bind().await;
        let dead = refused_addr().await;
        let (handle, cancel, join) = spawn_pooler(4);

        handle
            .add(vec![
                test_printer(1, &slow.addr),
                test_printer(2, &fast.addr),
                test_printer(3, &dead),
            ])
            .await
            .expect("add");
        let _slow_peer = slow.accept().await;
        let mut fast_peer = fast.accept().await;

        handle
            .submit(PrinterId(1), doc("s"), 3, Duration::from_secs(2))
            .await
            .expect("submit slow");
        handle.submit(PrinterId(3), doc("d"), 1, Duration::ZERO).await.expect("submit dead");
        handle.submit(PrinterId(2), doc("fast"), 1, Duration::ZERO).await.expect("submit fast");

        let started = tokio::time::Instant::now();
        assert_eq!(fast_peer.read_exact_bytes(4).await, b"fast");
        assert!(started.elapsed() < Duration::from_secs(2));

        cancel.cancel();
        join.await.expect("pooler");
    }

    #[tokio::test]
    async fn shutdown_closes_all_connections() {
        let first = MockPrinter::bind().await;
        let second = MockPrinter::bind().await;
        let (handle, cancel, join) = spawn_pooler(4);

        handle
            .add(vec![test_printer(1, &first.addr), test_printer(2, &second.addr)])
            .await
            .expect("add");
        let mut first_peer = first.accept().await;
        let mut second_peer = second.accept().await;

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), join)
            .await
            .expect("pooler stops")
            .expect("pooler");

        assert!(first_peer.is_at_eof().await);
        assert!(second_peer.is_at_eof().await);
    }

    #[tokio::test]
    async fn tasks_keep_submission_order() {
        let mock = MockPrinter::bind().await;
        let (handle, cancel, join) = spawn_pooler(8);

        handle.add(vec![test_printer(1, &mock.addr)]).await.expect("add");
        let mut peer = mock.accept().await;
        for n in 1..=5 {
            handle
                .submit(PrinterId(1), doc(&format!("[{n}]")), 1, Duration::ZERO)
                .await
                .expect("submit");
        }

        assert_eq!(peer.read_exact_bytes(15).await, b"[1][2][3][4][5]");
        cancel.cancel();
        join.await.expect("pooler");
    }

    #[tokio::test]
    async fn full_queue_drops_tasks_without_stalling() {
        let busy = MockPrinter::bind().await;
        let idle = MockPrinter::bind().await;
        let (handle, cancel, join) = spawn_pooler(1);

        handle
            .add(vec![test_printer(1, &busy.addr), test_printer(2, &idle.addr)])
            .await
            .expect("add");
        let mut busy_peer = busy.accept().await;
        let mut idle_peer = idle.accept().await;

        // The worker is sleeping between the two copies once the first arrives.
        handle
            .submit(PrinterId(1), doc("a"), 2, Duration::from_millis(500))
            .await
            .expect("submit");
        assert_eq!(busy_peer.read_exact_bytes(1).await, b"a");

        // One task fits the buffer, the rest are dropped. No submit may wait.
        for payload in ["b", "c", "d", "e"] {
            tokio::time::timeout(
                Duration::from_millis(200),
                handle.submit(PrinterId(1), doc(payload), 1, Duration::ZERO),
            )
            .await
            .expect("submit did not block")
            .expect("submit");
        }
        let started = tokio::time::Instant::now();
        handle.submit(PrinterId(2), doc("ok"), 1, Duration::ZERO).await.expect("submit");
        assert_eq!(idle_peer.read_exact_bytes(2).await, b"ok");
        assert!(started.elapsed() < Duration::from_millis(500));

        assert_eq!(busy_peer.read_exact_bytes(2).await, b"ab");
        handle.submit(PrinterId(1), doc("z"), 1, Duration::ZERO).await.expect("submit");
        assert_eq!(busy_peer.read_exact_bytes(1).await, b"z");

        cancel.cancel();
        join.await.expect("pooler");
    }

    #[tokio::test]
    async fn connections_are_closed_once() {
        let removed = MockPrinter::bind().await;
        let kept = MockPrinter::bind().await;
        let (handle, cancel, join) = spawn_pooler(4);

        handle
            .add(vec![test_printer(1, &removed.addr), test_printer(2, &kept.addr)])
            .await
            .expect("add");
        let mut removed_peer = removed.accept().await;
        let mut kept_peer = kept.accept().await;

        handle.remove(PrinterId(1)).await.expect("remove");
        assert!(removed_peer.is_at_eof().await);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), join)
            .await
            .expect("pooler stops")
            .expect("pooler");
        assert!(kept_peer.is_at_eof().await);

        // Nothing reconnects after its queue is gone.
        assert!(removed.try_accept(Duration::from_millis(300)).await.is_none());
        assert!(kept.try_accept(Duration::from_millis(300)).await.is_none());
    }

    #[tokio::test]
    async fn duplicate_add_keeps_one_connection() {
        let mock = MockPrinter::bind().await;
        let (handle, cancel, join) = spawn_pooler(4);

        handle.add(vec![test_printer(1, &mock.addr)]).await.expect("add");
        handle.add(vec![test_printer(1, &mock.addr)]).await.expect("add again");
        let _peer = mock.accept().await;
        assert!(mock.try_accept(Duration::from_millis(300)).await.is_none());

        cancel.cancel();
        join.await.expect("pooler");
    }

    #[tokio::test]
    async fn remove_closes_queue() {
        let mock = MockPrinter::bind().await;
        let (handle, cancel, join) = spawn_pooler(4);

        handle.add(vec![test_printer(1, &mock.addr)]).await.expect("add");
        let mut peer = mock.accept().await;
        handle.remove(PrinterId(1)).await.expect("remove");
        assert!(peer.is_at_eof().await);

        // Further submissions are dropped, not delivered.
        handle.submit(PrinterId(1), doc("x"), 1, Duration::ZERO).await.expect("submit");
        assert!(mock.try_accept(Duration::from_millis(300)).await.is_none());

        cancel.cancel();
        join.await.expect("pooler");
    }

    #[tokio::test]
    async fn remove_unknown_printer_is_ok() {
        let (handle, cancel, join) = spawn_pooler(4);
        handle.remove(PrinterId(42)).await.expect("remove unknown");
        handle.submit(PrinterId(42), doc("x"), 1, Duration::ZERO).await.expect("submit unknown");
        cancel.cancel();
        join.await.expect("pooler");
    }

    #[tokio::test]
    async fn stopped_pooler_rejects_commands() {
        let (handle, cancel, join) = spawn_pooler(4);
        cancel.cancel();
        join.await.expect("pooler");

        let err = handle
            .submit(PrinterId(1), doc("x"), 1, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, LabelwerkError::PoolerStopped));
        assert!(matches!(
            handle.remove(PrinterId(1)).await,
            Err(LabelwerkError::PoolerStopped)
        ));
    }
}
