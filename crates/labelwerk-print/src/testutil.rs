// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Loopback stand-ins for network printers, shared by the unit tests.

use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};

use labelwerk_core::types::{Printer, PrinterId};

const IO_TIMEOUT: Duration = Duration::from_secs(5);

pub fn test_printer(id: i64, addr: &str) -> Printer {
    let mut printer = Printer::new("ZPL", addr, "test printer");
    printer.id = PrinterId(id);
    printer
}

/// An address nothing listens on: bound once, then released.
pub async fn refused_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr").to_string();
    drop(listener);
    addr
}

/// A raw TCP listener that plays the printer.
pub struct MockPrinter {
    listener: TcpListener,
    pub addr: String,
}

impl MockPrinter {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr").to_string();
        Self { listener, addr }
    }

    pub async fn accept(&self) -> MockPeer {
        self.try_accept(IO_TIMEOUT)
            .await
            .expect("printer was never connected")
    }

    pub async fn try_accept(&self, wait: Duration) -> Option<MockPeer> {
        match tokio::time::timeout(wait, self.listener.accept()).await {
            Ok(Ok((stream, _))) => Some(MockPeer { stream }),
            _ => None,
        }
    }
}

/// The printer side of one accepted connection.
pub struct MockPeer {
    stream: TcpStream,
}

impl MockPeer {
    pub async fn read_exact_bytes(&mut self, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        tokio::time::timeout(IO_TIMEOUT, self.stream.read_exact(&mut buf))
            .await
            .expect("read timed out")
            .expect("read failed");
        buf
    }

    /// Read until the other side closes and return everything received.
    pub async fn read_to_eof(&mut self) -> Vec<u8> {
        let mut buf = Vec::new();
        tokio::time::timeout(IO_TIMEOUT, self.stream.read_to_end(&mut buf))
            .await
            .expect("read timed out")
            .expect("read failed");
        buf
    }

    pub async fn is_at_eof(&mut self) -> bool {
        let mut byte = [0u8; 1];
        matches!(
            tokio::time::timeout(IO_TIMEOUT, self.stream.read(&mut byte)).await,
            Ok(Ok(0))
        )
    }
}
