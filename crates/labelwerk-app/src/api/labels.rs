// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Label, template and print submission handlers.

use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use labelwerk_core::types::{LabelId, Placeholder, PrinterId, TemplateId};
use labelwerk_template::{Label, Template};

use super::AppState;
use super::error::ApiResult;
use crate::services::app_services::{NewLabel, PrintRequest};

#[derive(Debug, Deserialize)]
pub struct LabelCreate {
    pub name: String,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub struct TemplateCreate {
    pub format_type: String,
    /// Raw body; placeholders are escaped on the way in.
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct EnqueueLabel {
    pub printer_id: PrinterId,
    #[serde(default = "one")]
    pub quantity: u32,
    /// Pause between copies.
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default)]
    pub placeholders: Vec<Placeholder>,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Serialize)]
pub struct LabelView {
    pub id: LabelId,
    pub name: String,
    pub comment: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<TemplateView>,
}

#[derive(Debug, Serialize)]
pub struct TemplateView {
    pub id: TemplateId,
    pub label_id: LabelId,
    pub format_type: String,
    pub body: String,
    pub placeholders: Vec<String>,
}

impl From<&Template> for TemplateView {
    fn from(template: &Template) -> Self {
        Self {
            id: template.id,
            label_id: template.label_id,
            format_type: template.format_type.clone(),
            body: String::from_utf8_lossy(&template.raw_body()).into_owned(),
            placeholders: template.placeholders(),
        }
    }
}

impl From<&Label> for LabelView {
    fn from(label: &Label) -> Self {
        let mut templates: Vec<TemplateView> = label.templates().map(TemplateView::from).collect();
        templates.sort_by_key(|t| t.id);
        Self {
            id: label.id,
            name: label.name.clone(),
            comment: label.comment.clone(),
            templates,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(get_by_id).delete(delete))
        .route("/{id}/templates", get(list_templates).post(create_template))
        .route(
            "/{id}/templates/{template_id}",
            get(get_template).delete(delete_template),
        )
        .route("/{id}/enqueue", post(enqueue))
}

/// GET /v1/labels
async fn list(State(svc): State<AppState>) -> ApiResult<Json<Vec<LabelView>>> {
    Ok(Json(svc.labels()?.iter().map(LabelView::from).collect()))
}

/// GET /v1/labels/{id} - the label with all of its templates
async fn get_by_id(State(svc): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<LabelView>> {
    Ok(Json(LabelView::from(&svc.label(LabelId(id))?)))
}

/// POST /v1/labels
async fn create(
    State(svc): State<AppState>,
    payload: Result<Json<LabelCreate>, JsonRejection>,
) -> ApiResult<Json<LabelView>> {
    let Json(body) = payload?;
    let label = svc.create_label(NewLabel {
        name: body.name,
        comment: body.comment,
    })?;
    Ok(Json(LabelView::from(&label)))
}

/// DELETE /v1/labels/{id} - templates go with it
async fn delete(State(svc): State<AppState>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    svc.delete_label(LabelId(id))?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/labels/{id}/templates
async fn list_templates(
    State(svc): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<TemplateView>>> {
    let templates = svc.templates(LabelId(id))?;
    Ok(Json(templates.iter().map(TemplateView::from).collect()))
}

/// GET /v1/labels/{id}/templates/{template_id}
async fn get_template(
    State(svc): State<AppState>,
    Path((id, template_id)): Path<(i64, i64)>,
) -> ApiResult<Json<TemplateView>> {
    let template = svc.template(LabelId(id), TemplateId(template_id))?;
    Ok(Json(TemplateView::from(&template)))
}

/// POST /v1/labels/{id}/templates
async fn create_template(
    State(svc): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<TemplateCreate>, JsonRejection>,
) -> ApiResult<Json<TemplateView>> {
    let Json(body) = payload?;
    let template = svc.create_template(LabelId(id), &body.format_type, body.body.as_bytes())?;
    Ok(Json(TemplateView::from(&template)))
}

/// DELETE /v1/labels/{id}/templates/{template_id}
async fn delete_template(
    State(svc): State<AppState>,
    Path((id, template_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    svc.delete_template(LabelId(id), TemplateId(template_id))?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/labels/{id}/enqueue - hand the label to the printer's queue
async fn enqueue(
    State(svc): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<EnqueueLabel>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(body) = payload?;
    let request = PrintRequest {
        printer_id: body.printer_id,
        quantity: body.quantity,
        delay: Duration::from_millis(body.delay_ms),
        placeholders: body.placeholders,
    };
    svc.enqueue_label(LabelId(id), request).await?;
    Ok(StatusCode::NO_CONTENT)
}
