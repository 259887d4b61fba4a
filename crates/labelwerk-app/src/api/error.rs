// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Mapping of service errors onto HTTP responses.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{error, warn};

use labelwerk_core::error::LabelwerkError;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// A failed request. The body is `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError(LabelwerkError);

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl From<LabelwerkError> for ApiError {
    fn from(e: LabelwerkError) -> Self {
        Self(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(LabelwerkError::Validation(rejection.body_text()))
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            LabelwerkError::Validation(_) => StatusCode::BAD_REQUEST,
            e if e.is_render_error() => StatusCode::BAD_REQUEST,
            LabelwerkError::NotFound(_) => StatusCode::NOT_FOUND,
            LabelwerkError::PoolerStopped
            | LabelwerkError::QueueFull(_)
            | LabelwerkError::QueueClosed(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self.0, "request failed");
            "internal server error".to_string()
        } else {
            warn!(status = status.as_u16(), error = %self.0, "request rejected");
            self.0.to_string()
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}
