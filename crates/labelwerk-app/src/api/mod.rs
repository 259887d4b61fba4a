// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP API over the service layer.
//
//   /v1/printers                          GET, POST
//   /v1/printers/{id}                     GET, DELETE
//   /v1/labels                            GET, POST
//   /v1/labels/{id}                       GET, DELETE
//   /v1/labels/{id}/templates             GET, POST
//   /v1/labels/{id}/templates/{tid}       GET, DELETE
//   /v1/labels/{id}/enqueue               POST

mod error;
mod labels;
mod printers;

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use labelwerk_core::error::{LabelwerkError, Result};

use crate::services::app_services::AppServices;

/// State shared by every handler.
pub type AppState = Arc<AppServices>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/v1/printers", printers::routes())
        .nest("/v1/labels", labels::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API on `addr` until `shutdown` resolves. Requests in flight
/// at that point are allowed to finish.
pub async fn serve(
    state: AppState,
    addr: &str,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| LabelwerkError::Config(format!("listen on {addr}: {e}")))?;
    info!(addr = %listener.local_addr()?, "http api listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("http api stopped");
    Ok(())
}
