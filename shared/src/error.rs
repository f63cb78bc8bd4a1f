use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::capabilities::ApiResult;
use crate::model::ItemId;

/// Failure of a store operation, as seen by the UI.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum SyncError {
    #[error("network unavailable: {reason}")]
    NetworkUnavailable { reason: String },

    #[error("request rejected with status {status}: {message}")]
    RemoteRejected { status: u16, message: String },

    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("field '{field}' {reason}")]
    ValidationFailed { field: String, reason: String },

    #[error("could not build request: {reason}")]
    InvalidRequest { reason: String },

    #[error("unexpected response: {reason}")]
    InvalidResponse { reason: String },
}

impl SyncError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ValidationFailed {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NetworkUnavailable { .. } => "NETWORK_UNAVAILABLE",
            Self::RemoteRejected { .. } => "REMOTE_REJECTED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::ValidationFailed { .. } => "VALIDATION_FAILED",
            Self::InvalidRequest { .. } => "INVALID_REQUEST",
            Self::InvalidResponse { .. } => "INVALID_RESPONSE",
        }
    }

    /// HTTP status behind the error, when the server answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RemoteRejected { status, .. } => Some(*status),
            Self::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self {
            Self::NetworkUnavailable { .. } => {
                "Cannot reach the content server. Check your connection and try again.".into()
            }
            Self::RemoteRejected { message, .. } | Self::NotFound { message } => message.clone(),
            Self::ValidationFailed { field, reason } => format!("{field} {reason}"),
            Self::InvalidRequest { .. } => "The request could not be prepared.".into(),
            Self::InvalidResponse { .. } => "The server sent an unexpected response.".into(),
        }
    }

    /// Builds the error for a non-2xx response. A `message` field in a JSON
    /// body is surfaced verbatim.
    pub fn from_status(status: u16, body: &[u8]) -> Self {
        let message = server_message(body).unwrap_or_else(|| fallback_message(status));

        if status == 404 {
            Self::NotFound { message }
        } else {
            Self::RemoteRejected { status, message }
        }
    }
}

impl From<crux_http::Error> for SyncError {
    fn from(e: crux_http::Error) -> Self {
        match e {
            crux_http::Error::Http(e) => {
                Self::from_status(u16::from(e.code), e.body.as_deref().unwrap_or_default())
            }
            crux_http::Error::Io(reason) => Self::NetworkUnavailable { reason },
            crux_http::Error::Timeout => Self::NetworkUnavailable {
                reason: "request timed out".into(),
            },
            crux_http::Error::Url(reason) => Self::InvalidRequest { reason },
            crux_http::Error::Json(reason) => Self::InvalidResponse { reason },
        }
    }
}

fn server_message(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let message = value.get("message").or_else(|| value.get("error"))?;
    message
        .as_str()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

fn fallback_message(status: u16) -> String {
    match status {
        400 => "The server rejected the submitted data.".into(),
        404 => "The requested content no longer exists.".into(),
        409 => "The content was changed by someone else.".into(),
        500..=599 => format!("The server failed to process the request ({status})."),
        _ => format!("Request failed with status {status}."),
    }
}

/// Splits a shell result into the success body bytes or a [`SyncError`].
pub(crate) fn classify(result: ApiResult) -> Result<Vec<u8>, SyncError> {
    let mut response = result?;
    let status = response.status();
    let body = response.take_body().unwrap_or_default();
    if status.is_success() {
        Ok(body)
    } else {
        Err(SyncError::from_status(u16::from(status), &body))
    }
}

/// Parses a list body. An empty body is `None`.
pub(crate) fn parse_json(body: &[u8]) -> Result<Option<serde_json::Value>, SyncError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| SyncError::invalid_response(e.to_string()))
}

/// Body of a successful mutation. The write already happened, so a body that
/// is not JSON is reported as `Undecodable` rather than as a failure.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Reply {
    Empty,
    Json(serde_json::Value),
    Undecodable,
}

impl Reply {
    pub(crate) fn parse(body: &[u8]) -> Self {
        match parse_json(body) {
            Ok(None) => Self::Empty,
            Ok(Some(value)) => Self::Json(value),
            Err(_) => Self::Undecodable,
        }
    }

    pub(crate) fn json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Load,
    Reconcile,
    Add,
    Update,
    Remove,
    AddLevel,
    EditLevel,
    RemoveLevel,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Load => "load",
            Self::Reconcile => "reconcile",
            Self::Add => "add",
            Self::Update => "update",
            Self::Remove => "remove",
            Self::AddLevel => "add level",
            Self::EditLevel => "edit level",
            Self::RemoveLevel => "remove level",
        };
        f.write_str(name)
    }
}

/// What an operation targeted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorScope {
    Collection,
    Item { id: ItemId },
    Level { name: String },
    LevelItem { level: String, id: ItemId },
}

impl ErrorScope {
    pub fn item_id(&self) -> Option<&ItemId> {
        match self {
            Self::Item { id } | Self::LevelItem { id, .. } => Some(id),
            _ => None,
        }
    }
}

/// An error attached to one operation rather than to the whole store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopedError {
    pub operation: OperationKind,
    pub scope: ErrorScope,
    pub error: SyncError,
}

impl ScopedError {
    pub fn new(operation: OperationKind, scope: ErrorScope, error: SyncError) -> Self {
        Self {
            operation,
            scope,
            error,
        }
    }
}

impl fmt::Display for ScopedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            ErrorScope::Collection => write!(f, "{} failed: {}", self.operation, self.error),
            ErrorScope::Item { id } => {
                write!(f, "{} of '{}' failed: {}", self.operation, id, self.error)
            }
            ErrorScope::Level { name } => {
                write!(f, "{} '{}' failed: {}", self.operation, name, self.error)
            }
            ErrorScope::LevelItem { level, id } => write!(
                f,
                "{} of '{}' in level '{}' failed: {}",
                self.operation, id, level, self.error
            ),
        }
    }
}
