use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use rocket_multipart_form_data::MultipartFormDataError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use std::io;
use std::sync::PoisonError;

#[derive(Debug, Error)]
pub enum InternalError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    #[error("task {task_id} is already being timed")]
    AlreadyTiming { task_id: i64 },

    #[error("task {task_id} is not being timed")]
    NotTiming { task_id: i64 },

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error(
        "update abandoned after {attempts} attempts (committed: {committed:?}, not committed: {pending:?})"
    )]
    PartialUpdate {
        attempts: u32,
        committed: Vec<String>,
        pending: Vec<String>,
    },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("upload error: {0}")]
    Upload(String),

    #[error("Generic internal error: {0}")]
    Generic(String),
}

impl InternalError {
    pub fn not_found(kind: &'static str, id: i64) -> InternalError {
        InternalError::NotFound { kind, id }
    }

    pub fn invariant(what: impl Into<String>) -> InternalError {
        InternalError::InvariantViolation(what.into())
    }

    pub fn status(&self) -> Status {
        match self {
            InternalError::NotFound { .. } => Status::NotFound,
            InternalError::AlreadyTiming { .. }
            | InternalError::NotTiming { .. }
            | InternalError::Conflict(_) => Status::Conflict,
            InternalError::InvariantViolation(_) => Status::UnprocessableEntity,
            InternalError::BadRequest(_) | InternalError::Upload(_) => Status::BadRequest,
            _ => Status::InternalServerError,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            InternalError::NotFound { .. } => "not_found",
            InternalError::AlreadyTiming { .. } => "already_timing",
            InternalError::NotTiming { .. } => "not_timing",
            InternalError::InvariantViolation(_) => "invariant_violation",
            InternalError::PartialUpdate { .. } => "partial_update",
            InternalError::Conflict(_) => "conflict",
            InternalError::BadRequest(_) => "bad_request",
            InternalError::Upload(_) => "upload",
            _ => "internal",
        }
    }
}

impl<T> From<PoisonError<T>> for InternalError {
    fn from(e: PoisonError<T>) -> InternalError {
        InternalError::Generic(e.to_string())
    }
}

impl From<MultipartFormDataError> for InternalError {
    fn from(e: MultipartFormDataError) -> InternalError {
        InternalError::Upload(e.to_string())
    }
}

impl<'r> Responder<'r, 'static> for InternalError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        if status.code >= 500 {
            error!(uri = %request.uri(), "{}", self);
        } else {
            warn!(uri = %request.uri(), "{}", self);
        }

        let mut body = json!({
            "error": self.code(),
            "message": self.to_string(),
        });
        if let InternalError::PartialUpdate {
            committed, pending, ..
        } = &self
        {
            body["committed"] = json!(committed);
            body["pending"] = json!(pending);
        }

        (status, Json(body)).respond_to(request)
    }
}

pub type InternalResult<T> = Result<T, InternalError>;
