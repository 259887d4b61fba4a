// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer API handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use labelwerk_core::types::{Printer, PrinterId};

use super::AppState;
use super::error::ApiResult;
use crate::services::app_services::NewPrinter;

#[derive(Debug, Deserialize)]
pub struct PrinterCreate {
    pub addr: String,
    pub format_type: String,
    #[serde(default)]
    pub comment: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(get_by_id).delete(delete))
}

/// GET /v1/printers
async fn list(State(svc): State<AppState>) -> ApiResult<Json<Vec<Printer>>> {
    Ok(Json(svc.printers()?))
}

/// GET /v1/printers/{id}
async fn get_by_id(State(svc): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Printer>> {
    Ok(Json(svc.printer(PrinterId(id))?))
}

/// POST /v1/printers - store the printer and open its queue
async fn create(
    State(svc): State<AppState>,
    payload: Result<Json<PrinterCreate>, JsonRejection>,
) -> ApiResult<Json<Printer>> {
    let Json(body) = payload?;
    let printer = svc
        .register_printer(NewPrinter {
            addr: body.addr,
            format_type: body.format_type,
            comment: body.comment,
        })
        .await?;
    Ok(Json(printer))
}

/// DELETE /v1/printers/{id} - forget the printer and close its queue
async fn delete(State(svc): State<AppState>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    svc.remove_printer(PrinterId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
