// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-printer print queue.
//
// Every printer gets a bounded FIFO of tasks and one dedicated worker that
// drains it against the printer's connection. Tasks for one printer are
// printed strictly in order; a slow or unreachable printer only ever stalls
// its own worker. Tasks are held in memory only and are lost on crash.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use labelwerk_core::document::Printable;
use labelwerk_core::error::{LabelwerkError, Result};
use labelwerk_core::types::{Printer, PrinterId, TaskId};

use crate::connection::PrinterConnection;

/// One submission: print `document` `quantity` times, `delay` apart.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub printer_id: PrinterId,
    pub quantity: u32,
    pub delay: Duration,
    pub document: Arc<dyn Printable>,
}

impl Task {
    pub fn new(
        printer_id: PrinterId,
        document: Arc<dyn Printable>,
        quantity: u32,
        delay: Duration,
    ) -> Self {
        Self {
            id: TaskId::new(),
            printer_id,
            quantity,
            delay,
            document,
        }
    }
}

/// Lifecycle of a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// Buffer exists, worker not started yet. Tasks are accepted and wait.
    Created,
    /// Worker is serving the buffer.
    Running,
    /// No further tasks are accepted.
    Closed,
}

/// Submission side of a per-printer queue.
///
/// The buffer capacity is fixed at creation. `enqueue` never waits: a full
/// buffer is reported as `QueueFull`, a closed queue as `QueueClosed`.
#[derive(Debug)]
pub struct PrintQueue {
    printer: Printer,
    capacity: usize,
    state: QueueState,
    tx: Option<mpsc::Sender<Task>>,
    cancel: CancellationToken,
    worker: Option<QueueWorker>,
}

impl PrintQueue {
    /// Create a queue for `printer`. `cancel` stops the worker; pass a child
    /// of the owner's token so both shutdown and removal reach it.
    ///
    /// Capacity is clamped to at least one task.
    pub fn new(printer: Printer, capacity: usize, cancel: CancellationToken) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let worker = QueueWorker {
            connection: PrinterConnection::new(printer.clone()),
            rx,
            cancel: cancel.clone(),
        };
        Self {
            printer,
            capacity,
            state: QueueState::Created,
            tx: Some(tx),
            cancel,
            worker: Some(worker),
        }
    }

    /// Set the printer connect timeout. Only effective before `start`.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        if let Some(mut worker) = self.worker.take() {
            worker.connection = worker.connection.with_connect_timeout(timeout);
            self.worker = Some(worker);
        }
        self
    }

    pub fn printer(&self) -> &Printer {
        &self.printer
    }

    pub fn printer_id(&self) -> PrinterId {
        self.printer.id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn state(&self) -> QueueState {
        self.state
    }

    /// Hand out the worker for spawning and move to `Running`.
    ///
    /// Fails with `QueueClosed` if the queue was already started or closed.
    pub fn start(&mut self) -> Result<QueueWorker> {
        match (self.state, self.worker.take()) {
            (QueueState::Created, Some(worker)) => {
                self.state = QueueState::Running;
                Ok(worker)
            }
            _ => Err(LabelwerkError::QueueClosed(self.printer.id)),
        }
    }

    /// Put a task into the buffer without waiting.
    pub fn enqueue(&self, task: Task) -> Result<()> {
        let printer_id = self.printer.id;
        let tx = match (self.state, &self.tx) {
            (QueueState::Closed, _) | (_, None) => {
                return Err(LabelwerkError::QueueClosed(printer_id));
            }
            (_, Some(tx)) => tx,
        };
        tx.try_send(task).map_err(|e| match e {
            TrySendError::Full(_) => LabelwerkError::QueueFull(printer_id),
            TrySendError::Closed(_) => LabelwerkError::QueueClosed(printer_id),
        })
    }

    /// Stop accepting tasks and cancel the worker, which then closes the
    /// printer connection. Buffered tasks that have not started are dropped.
    pub fn close(&mut self) {
        if self.state == QueueState::Closed {
            return;
        }
        debug!(printer_id = %self.printer.id, "closing queue");
        self.state = QueueState::Closed;
        self.tx = None;
        self.worker = None;
        self.cancel.cancel();
    }

    /// Stop accepting tasks but let the worker print everything already
    /// buffered before it closes the connection and exits.
    pub fn drain(&mut self) {
        if self.state == QueueState::Closed {
            return;
        }
        debug!(printer_id = %self.printer.id, "draining queue");
        self.state = QueueState::Closed;
        self.tx = None;
        self.worker = None;
    }
}

/// Serving side of a per-printer queue. Exclusively owns the connection.
#[derive(Debug)]
pub struct QueueWorker {
    connection: PrinterConnection,
    rx: mpsc::Receiver<Task>,
    cancel: CancellationToken,
}

impl QueueWorker {
    /// Serve the buffer until cancelled or until the queue is drained, and
    /// return the number of copies that reached the printer.
    ///
    /// Cancellation is checked between tasks only; a task that has started
    /// always runs through all of its copies.
    pub async fn run(mut self) -> u64 {
        let printer_id = self.connection.printer().id;
        let mut sent = 0;
        debug!(printer_id = %printer_id, "start queue processing for printer");

        if let Err(e) = self.connection.connect().await {
            error!(
                printer_id = %printer_id,
                addr = %self.connection.printer().addr,
                error = %e,
                "cannot connect to printer"
            );
        }

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(printer_id = %printer_id, "queue cancelled");
                    break;
                }
                task = self.rx.recv() => match task {
                    Some(task) => sent += self.process(task).await,
                    None => {
                        debug!(printer_id = %printer_id, "queue drained");
                        break;
                    }
                },
            }
        }

        if let Err(e) = self.connection.close().await {
            error!(printer_id = %printer_id, error = %e, "closing printer connection");
        }
        debug!(printer_id = %printer_id, sent, "processing queue for printer is done");
        sent
    }

    /// Print every copy of one task. Returns the copies sent.
    async fn process(&mut self, task: Task) -> u64 {
        let printer_id = self.connection.printer().id;
        debug!(
            printer_id = %printer_id,
            task_id = %task.id,
            quantity = task.quantity,
            "processing task"
        );

        if !self.connection.is_connected() {
            debug!(printer_id = %printer_id, "printer is not connected, try to connect");
            if let Err(e) = self.connection.connect().await {
                warn!(
                    printer_id = %printer_id,
                    task_id = %task.id,
                    addr = %self.connection.printer().addr,
                    error = %e,
                    "cannot connect to printer, task dropped"
                );
                return 0;
            }
        }

        let mut sent = 0;
        for copy in 1..=task.quantity {
            if copy > 1 && !task.delay.is_zero() {
                tokio::time::sleep(task.delay).await;
            }
            match self.print_copy(&task).await {
                Ok(()) => sent += 1,
                // Every copy renders the same document; the rest would fail too.
                Err(e) if e.is_render_error() => {
                    warn!(
                        printer_id = %printer_id,
                        task_id = %task.id,
                        copy,
                        error = %e,
                        "document cannot be rendered, task dropped"
                    );
                    break;
                }
                Err(e) => error!(
                    printer_id = %printer_id,
                    task_id = %task.id,
                    copy,
                    quantity = task.quantity,
                    error = %e,
                    "printing failed"
                ),
            }
        }
        sent
    }

    /// Render and send one copy. Rendering is repeated for every copy.
    async fn print_copy(&mut self, task: &Task) -> Result<()> {
        if !self.connection.is_connected() {
            return Err(LabelwerkError::NotConnected(self.connection.printer().id));
        }
        let data = task.document.render(&self.connection.printer().format_type)?;
        self.connection.send(&data).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockPrinter, refused_addr, test_printer};
    use labelwerk_core::document::RawDocument;
    use labelwerk_core::types::{LabelId, Placeholder};
    use labelwerk_template::{Label, Template};

    fn raw_task(printer_id: i64, payload: &str, quantity: u32) -> Task {
        Task::new(
            PrinterId(printer_id),
            Arc::new(RawDocument(payload.as_bytes().to_vec())),
            quantity,
            Duration::ZERO,
        )
    }

    #[test]
    fn full_buffer_rejects_next_task() {
        let queue = PrintQueue::new(test_printer(1, "127.0.0.1:9"), 2, CancellationToken::new());
        queue.enqueue(raw_task(1, "a", 1)).expect("first");
        queue.enqueue(raw_task(1, "b", 1)).expect("second");
        let err = queue.enqueue(raw_task(1, "c", 1)).unwrap_err();
        assert!(matches!(err, LabelwerkError::QueueFull(id) if id.0 == 1));
    }

    #[test]
    fn closed_queue_rejects_tasks() {
        let mut queue = PrintQueue::new(test_printer(1, "127.0.0.1:9"), 2, CancellationToken::new());
        queue.close();
        assert_eq!(queue.state(), QueueState::Closed);
        assert!(matches!(
            queue.enqueue(raw_task(1, "a", 1)),
            Err(LabelwerkError::QueueClosed(_))
        ));
        assert!(queue.start().is_err());
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let queue = PrintQueue::new(test_printer(1, "127.0.0.1:9"), 0, CancellationToken::new());
        assert_eq!(queue.capacity(), 1);
        queue.enqueue(raw_task(1, "a", 1)).expect("one task fits");
    }

    #[test]
    fn start_only_once() {
        let mut queue = PrintQueue::new(test_printer(1, "127.0.0.1:9"), 1, CancellationToken::new());
        assert_eq!(queue.state(), QueueState::Created);
        let _worker = queue.start().expect("start");
        assert_eq!(queue.state(), QueueState::Running);
        assert!(queue.start().is_err());
    }

    #[tokio::test]
    async fn tasks_are_printed_in_order() {
        let mock = MockPrinter::bind().await;
        let mut queue = PrintQueue::new(test_printer(1, &mock.addr), 8, CancellationToken::new());
        for n in 1..=5 {
            queue.enqueue(raw_task(1, &format!("[{n}]"), 1)).expect("enqueue");
        }

        let worker = tokio::spawn(queue.start().expect("start").run());
        let mut peer = mock.accept().await;
        queue.drain();

        assert_eq!(peer.read_to_eof().await, b"[1][2][3][4][5]");
        assert_eq!(worker.await.expect("worker"), 5);
    }

    #[tokio::test]
    async fn copies_are_sent_with_delay() {
        let mock = MockPrinter::bind().await;
        let mut queue = PrintQueue::new(test_printer(1, &mock.addr), 1, CancellationToken::new());
        let task = Task::new(
            PrinterId(1),
            Arc::new(RawDocument(b"^XA^XZ".to_vec())),
            3,
            Duration::from_millis(50),
        );
        queue.enqueue(task).expect("enqueue");

        let started = tokio::time::Instant::now();
        let worker = tokio::spawn(queue.start().expect("start").run());
        let mut peer = mock.accept().await;
        queue.drain();

        assert_eq!(peer.read_to_eof().await, b"^XA^XZ^XA^XZ^XA^XZ");
        assert_eq!(worker.await.expect("worker"), 3);
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn zero_quantity_prints_nothing() {
        let mock = MockPrinter::bind().await;
        let mut queue = PrintQueue::new(test_printer(1, &mock.addr), 2, CancellationToken::new());
        queue.enqueue(raw_task(1, "skipped", 0)).expect("enqueue");
        queue.enqueue(raw_task(1, "printed", 1)).expect("enqueue");

        let worker = tokio::spawn(queue.start().expect("start").run());
        let mut peer = mock.accept().await;
        queue.drain();

        assert_eq!(peer.read_to_eof().await, b"printed");
        assert_eq!(worker.await.expect("worker"), 1);
    }

    #[tokio::test]
    async fn render_failure_does_not_stop_worker() {
        let mock = MockPrinter::bind().await;
        let mut label = Label::new("badge", "");
        label.add_template(Template::new(LabelId(1), "ZPL", b"^FD_name_^FS").expect("template"));

        let mut queue = PrintQueue::new(test_printer(1, &mock.addr), 4, CancellationToken::new());
        // No placeholder values: the first copy fails to render and the task is dropped.
        queue
            .enqueue(Task::new(PrinterId(1), Arc::new(label.clone()), 2, Duration::ZERO))
            .expect("enqueue");
        let filled = label.with_placeholders([Placeholder::new("_name_", "Ada")]);
        queue
            .enqueue(Task::new(PrinterId(1), Arc::new(filled), 1, Duration::ZERO))
            .expect("enqueue");

        let worker = tokio::spawn(queue.start().expect("start").run());
        let mut peer = mock.accept().await;
        queue.drain();

        assert_eq!(peer.read_to_eof().await, b"^FDAda^FS");
        assert_eq!(worker.await.expect("worker"), 1);
    }

    #[tokio::test]
    async fn unreachable_printer_drops_tasks_and_exits() {
        let addr = refused_addr().await;
        let mut queue = PrintQueue::new(test_printer(1, &addr), 4, CancellationToken::new())
            .with_connect_timeout(Duration::from_secs(1));
        queue.enqueue(raw_task(1, "lost", 1)).expect("enqueue");
        queue.enqueue(raw_task(1, "lost too", 1)).expect("enqueue");

        let worker = tokio::spawn(queue.start().expect("start").run());
        queue.drain();
        let sent = tokio::time::timeout(Duration::from_secs(5), worker)
            .await
            .expect("worker exits")
            .expect("worker");
        assert_eq!(sent, 0);
    }

    #[tokio::test]
    async fn cancel_closes_connection() {
        let mock = MockPrinter::bind().await;
        let token = CancellationToken::new();
        let mut queue = PrintQueue::new(test_printer(1, &mock.addr), 4, token.child_token());

        let worker = tokio::spawn(queue.start().expect("start").run());
        let mut peer = mock.accept().await;

        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), worker)
            .await
            .expect("worker exits")
            .expect("worker");
        assert!(peer.is_at_eof().await);
    }

    #[tokio::test]
    async fn reconnects_on_next_task() {
        let mock = MockPrinter::bind().await;
        let mut queue = PrintQueue::new(test_printer(1, &mock.addr), 64, CancellationToken::new());
        let worker = tokio::spawn(queue.start().expect("start").run());

        // Drop the first connection from the printer side.
        drop(mock.accept().await);

        // Keep submitting until the worker notices and reconnects.
        let mut peer = None;
        for _ in 0..50 {
            queue.enqueue(raw_task(1, "x", 1)).ok();
            if let Some(p) = mock.try_accept(Duration::from_millis(50)).await {
                peer = Some(p);
                break;
            }
        }
        let mut peer = peer.expect("worker reconnected");
        queue.enqueue(raw_task(1, "after", 1)).expect("enqueue");
        queue.drain();

        let received = peer.read_to_eof().await;
        assert!(received.ends_with(b"after"));
        worker.await.expect("worker");
    }
}
