// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer: owns the label store and the printer pooler and
// exposes the operations the CLI and the HTTP API need.
//
// The rusqlite-backed `Store` is `Send` but not `Sync`, so it lives behind an
// `Arc<Mutex<>>`. Every method takes `&self` so the HTTP handlers can share
// one instance. Guards are never held across an `.await`.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use labelwerk_core::AppConfig;
use labelwerk_core::error::{LabelwerkError, Result};
use labelwerk_core::types::{LabelId, Placeholder, Printer, PrinterId, TemplateId};
use labelwerk_print::{Pooler, PoolerHandle, PrintQueue, Task};
use labelwerk_store::Store;
use labelwerk_template::{Label, Template};

/// Input for [`AppServices::register_printer`].
#[derive(Debug, Clone)]
pub struct NewPrinter {
    pub addr: String,
    pub format_type: String,
    pub comment: String,
}

/// Input for [`AppServices::create_label`].
#[derive(Debug, Clone)]
pub struct NewLabel {
    pub name: String,
    pub comment: String,
}

/// One print submission for a stored label.
#[derive(Debug, Clone)]
pub struct PrintRequest {
    pub printer_id: PrinterId,
    pub quantity: u32,
    pub delay: Duration,
    pub placeholders: Vec<Placeholder>,
}

pub struct AppServices {
    config: AppConfig,
    store: Arc<Mutex<Store>>,
    handle: PoolerHandle,
    /// Present until `start` hands it to its task.
    pooler: Mutex<Option<Pooler>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AppServices {
    pub fn new(config: AppConfig, store: Store) -> Self {
        let pooler = Pooler::new(config.queue_buffer_size)
            .with_connect_timeout(config.connect_timeout());
        Self {
            handle: pooler.handle(),
            pooler: Mutex::new(Some(pooler)),
            config,
            store: Arc::new(Mutex::new(store)),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// Open the store named by the configuration.
    pub fn open_store(config: &AppConfig) -> Result<Store> {
        match &config.database.path {
            Some(path) => Store::open(path),
            None => {
                warn!("no database path configured, using an in-memory database");
                Store::open_in_memory()
            }
        }
    }

    fn store(&self) -> Result<MutexGuard<'_, Store>> {
        self.store
            .lock()
            .map_err(|_| LabelwerkError::Database("store lock poisoned".into()))
    }

    fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && self.task.lock().is_ok_and(|task| task.is_some())
    }

    // -- Lifecycle -----------------------------------------------------------

    /// Spawn the pooler and register every stored printer with it.
    pub async fn start(&self) -> Result<()> {
        let pooler = self
            .pooler
            .lock()
            .map_err(|_| LabelwerkError::Database("pooler lock poisoned".into()))?
            .take();
        let Some(pooler) = pooler else {
            warn!("services already started");
            return Ok(());
        };
        let task = tokio::spawn(pooler.run(self.cancel.clone()));
        if let Ok(mut slot) = self.task.lock() {
            *slot = Some(task);
        }

        let printers = self.store()?.list_printers()?;
        info!(printers = printers.len(), "starting printer queues");
        self.handle.add(printers).await
    }

    /// Stop the pooler and wait, at most `graceful_timeout_secs`, for every
    /// queue to close its connection.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let task = self.task.lock().ok().and_then(|mut slot| slot.take());
        let Some(task) = task else {
            return;
        };

        let grace = self.config.graceful_timeout();
        match tokio::time::timeout(grace, task).await {
            Ok(Ok(())) => info!("printer queues stopped"),
            Ok(Err(e)) => error!(error = %e, "pooler task failed"),
            Err(_) => warn!(timeout_secs = grace.as_secs(), "printer queues did not stop in time"),
        }
    }

    // -- Printers ------------------------------------------------------------

    pub async fn register_printer(&self, new: NewPrinter) -> Result<Printer> {
        validate_addr(&new.addr)?;
        let format_type = new.format_type.trim();
        if format_type.is_empty() {
            return Err(LabelwerkError::Validation("format type is required".into()));
        }

        let mut printer = Printer::new(format_type, new.addr.trim(), new.comment);
        self.store()?.insert_printer(&mut printer)?;
        info!(printer_id = %printer.id, addr = %printer.addr, "printer registered");

        if self.is_running() {
            self.handle.add(vec![printer.clone()]).await?;
        }
        Ok(printer)
    }

    pub async fn remove_printer(&self, id: PrinterId) -> Result<()> {
        self.store()?.delete_printer(id)?;
        info!(printer_id = %id, "printer removed");
        if self.is_running() {
            self.handle.remove(id).await?;
        }
        Ok(())
    }

    pub fn printer(&self, id: PrinterId) -> Result<Printer> {
        self.store()?.get_printer(id)
    }

    pub fn printers(&self) -> Result<Vec<Printer>> {
        self.store()?.list_printers()
    }

    // -- Labels and templates ------------------------------------------------

    pub fn create_label(&self, new: NewLabel) -> Result<Label> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(LabelwerkError::Validation("label name is required".into()));
        }
        let mut label = Label::new(name, new.comment);
        self.store()?.insert_label(&mut label)?;
        Ok(label)
    }

    /// Delete a label and all of its templates.
    pub fn delete_label(&self, id: LabelId) -> Result<()> {
        self.store()?.delete_label(id)?;
        info!(label_id = %id, "label deleted");
        Ok(())
    }

    pub fn label(&self, id: LabelId) -> Result<Label> {
        self.store()?.get_label(id)
    }

    pub fn labels(&self) -> Result<Vec<Label>> {
        self.store()?.list_labels()
    }

    /// Escape and store a template body for one format type of a label.
    pub fn create_template(
        &self,
        label_id: LabelId,
        format_type: &str,
        raw_body: &[u8],
    ) -> Result<Template> {
        let format_type = format_type.trim();
        if format_type.is_empty() {
            return Err(LabelwerkError::Validation("format type is required".into()));
        }
        let mut template = Template::new(label_id, format_type, raw_body).map_err(|e| match e {
            LabelwerkError::Decoding { .. } => LabelwerkError::Validation(e.to_string()),
            other => other,
        })?;
        self.store()?.insert_template(&mut template)?;
        Ok(template)
    }

    pub fn template(&self, label_id: LabelId, id: TemplateId) -> Result<Template> {
        self.store()?.get_template(label_id, id)
    }

    pub fn templates(&self, label_id: LabelId) -> Result<Vec<Template>> {
        self.store()?.list_templates(label_id)
    }

    pub fn delete_template(&self, label_id: LabelId, id: TemplateId) -> Result<()> {
        self.store()?.delete_template(label_id, id)?;
        info!(label_id = %label_id, template_id = %id, "template deleted");
        Ok(())
    }

    // -- Printing ------------------------------------------------------------

    /// Hand a label to the pooler. Delivery is not confirmed: failures past
    /// this point are only logged.
    pub async fn enqueue_label(&self, label_id: LabelId, request: PrintRequest) -> Result<()> {
        if !self.is_running() {
            return Err(LabelwerkError::PoolerStopped);
        }
        let label = self
            .store()?
            .get_label(label_id)?
            .with_placeholders(request.placeholders);

        self.handle
            .submit(request.printer_id, Arc::new(label), request.quantity, request.delay)
            .await
    }

    /// Print a label on one printer without the pooler: open a dedicated
    /// queue, submit the task and drain it. Returns once the queue worker
    /// has finished and closed the connection.
    ///
    /// Fails with `PrintIncomplete` unless every requested copy was sent.
    pub async fn print_once(&self, label_id: LabelId, request: PrintRequest) -> Result<()> {
        let (printer, label) = {
            let store = self.store()?;
            (store.get_printer(request.printer_id)?, store.get_label(label_id)?)
        };
        let label = label.with_placeholders(request.placeholders);

        let mut queue = PrintQueue::new(printer, 1, CancellationToken::new())
            .with_connect_timeout(self.config.connect_timeout());
        let worker = tokio::spawn(queue.start()?.run());

        queue.enqueue(Task::new(
            request.printer_id,
            Arc::new(label),
            request.quantity,
            request.delay,
        ))?;
        queue.drain();

        let sent = worker
            .await
            .map_err(|e| LabelwerkError::Io(std::io::Error::other(e)))?;
        let requested = u64::from(request.quantity);
        if sent < requested {
            return Err(LabelwerkError::PrintIncomplete {
                printer_id: request.printer_id,
                sent,
                requested,
            });
        }
        info!(printer_id = %request.printer_id, label_id = %label_id, sent, "label printed");
        Ok(())
    }
}

/// `host:port` with a non-empty host and a numeric port.
fn validate_addr(addr: &str) -> Result<()> {
    let addr = addr.trim();
    let invalid = || LabelwerkError::Validation(format!("address {addr:?} is not host:port"));
    let (host, port) = addr.rsplit_once(':').ok_or_else(invalid)?;
    if host.is_empty() || port.parse::<u16>().is_err() {
        return Err(invalid());
    }
    Ok(())
}
