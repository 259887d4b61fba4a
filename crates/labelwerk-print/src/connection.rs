// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw TCP printer connection (JetDirect style, usually port 9100).
//
// Open a TCP socket and dump bytes: no framing, no length prefix, no
// acknowledgment. The printer must understand the rendered format natively.
// Unlike a one-shot client the socket is kept open between jobs and is only
// re-established after it was found to be closed.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info, instrument, warn};

use labelwerk_core::error::{LabelwerkError, Result, is_connection_closed};
use labelwerk_core::types::Printer;

/// Default timeout for establishing a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for a single write to the socket.
const SEND_TIMEOUT_SECS: u64 = 60;

/// Connection state of one printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// The single outbound socket to one physical printer.
///
/// Owned by exactly one queue worker; all methods take `&mut self`.
#[derive(Debug)]
pub struct PrinterConnection {
    printer: Printer,
    connect_timeout: Duration,
    stream: Option<TcpStream>,
}

impl PrinterConnection {
    pub fn new(printer: Printer) -> Self {
        Self {
            printer,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            stream: None,
        }
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn printer(&self) -> &Printer {
        &self.printer
    }

    pub fn state(&self) -> ConnectionState {
        if self.stream.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Open the socket. Does nothing (besides a warning) if already connected.
    #[instrument(skip(self), fields(printer_id = %self.printer.id, addr = %self.printer.addr))]
    pub async fn connect(&mut self) -> Result<()> {
        if self.stream.is_some() {
            warn!("printer already has an established connection, ignored");
            return Ok(());
        }

        let addr = self.printer.addr.clone();
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| LabelwerkError::ConnectFailed {
                addr: addr.clone(),
                reason: format!("timed out after {}ms", self.connect_timeout.as_millis()),
            })?
            .map_err(|e| LabelwerkError::ConnectFailed {
                addr: addr.clone(),
                reason: e.to_string(),
            })?;

        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "cannot disable Nagle on printer socket");
        }

        self.stream = Some(stream);
        info!("connected to printer");
        Ok(())
    }

    /// Shut the socket down. Closing a disconnected printer is a no-op.
    #[instrument(skip(self), fields(printer_id = %self.printer.id))]
    pub async fn close(&mut self) -> Result<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        stream.shutdown().await?;
        debug!("printer connection closed");
        Ok(())
    }

    /// Write `data` to the printer as-is and return the number of bytes the
    /// socket accepted.
    ///
    /// If the peer turns out to be gone the connection drops to
    /// `Disconnected` and `ConnectionClosed` is returned; later sends fail
    /// with `NotConnected` until `connect` succeeds again.
    #[instrument(skip(self, data), fields(printer_id = %self.printer.id, size = data.len()))]
    pub async fn send(&mut self, data: &[u8]) -> Result<usize> {
        let printer_id = self.printer.id;
        let Some(stream) = self.stream.as_mut() else {
            return Err(LabelwerkError::NotConnected(printer_id));
        };

        let mut sent = 0;
        let outcome = loop {
            if sent == data.len() {
                break Ok(());
            }
            let write = tokio::time::timeout(
                Duration::from_secs(SEND_TIMEOUT_SECS),
                stream.write(&data[sent..]),
            )
            .await;
            match write {
                Ok(Ok(0)) => break Err(LabelwerkError::ConnectionClosed(printer_id)),
                Ok(Ok(n)) => sent += n,
                Ok(Err(e)) if is_connection_closed(&e) => {
                    debug!(error = %e, "printer closed the connection");
                    break Err(LabelwerkError::ConnectionClosed(printer_id));
                }
                Ok(Err(e)) => break Err(LabelwerkError::Io(e)),
                Err(_) => {
                    warn!(timeout_secs = SEND_TIMEOUT_SECS, "write to printer timed out");
                    break Err(LabelwerkError::ConnectionClosed(printer_id));
                }
            }
        };

        if sent < data.len() {
            warn!(bytes_sent = sent, "document was not fully sent to printer");
        }

        match outcome {
            Ok(()) => {
                debug!(bytes_sent = sent, "document sent to printer");
                Ok(sent)
            }
            Err(e) => {
                if matches!(e, LabelwerkError::ConnectionClosed(_)) {
                    self.stream = None;
                }
                Err(e)
            }
        }
    }
}
