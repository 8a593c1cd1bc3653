use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::capabilities::{HttpError, TokenError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Timeout,
    Authentication,
    Authorization,
    Validation,
    NotFound,
    Conflict,
    UnsupportedMediaType,
    RateLimited,
    Server,
    Deserialization,
    UnexpectedShape,
    Cancelled,
    Storage,
    Configuration,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Authentication => "AUTH_ERROR",
            Self::Authorization => "FORBIDDEN",
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::UnsupportedMediaType => "UNSUPPORTED_MEDIA_TYPE",
            Self::RateLimited => "RATE_LIMITED",
            Self::Server => "SERVER_ERROR",
            Self::Deserialization => "DESERIALIZATION_ERROR",
            Self::UnexpectedShape => "UNEXPECTED_SHAPE",
            Self::Cancelled => "CANCELLED",
            Self::Storage => "STORAGE_ERROR",
            Self::Configuration => "CONFIG_ERROR",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    /// 401 and 403 both send the user back to the login screen.
    #[must_use]
    pub const fn requires_login(self) -> bool {
        matches!(self, Self::Authentication | Self::Authorization)
    }

    #[must_use]
    pub const fn http_status_hint(self) -> Option<u16> {
        match self {
            Self::Authentication => Some(401),
            Self::Authorization => Some(403),
            Self::NotFound => Some(404),
            Self::Conflict => Some(409),
            Self::UnsupportedMediaType => Some(415),
            Self::RateLimited => Some(429),
            Self::Validation => Some(400),
            Self::Server => Some(500),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    /// Diagnostic message for logs.
    pub message: String,
    /// Human readable detail sent by the server, shown verbatim when present.
    pub detail: Option<String>,
    pub status: Option<u16>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
            status: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn requires_login(&self) -> bool {
        self.kind.requires_login()
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        if let Some(detail) = &self.detail {
            return detail.clone();
        }
        match self.kind {
            ErrorKind::Network => {
                "Unable to reach the server. Please check your connection and try again.".into()
            }
            ErrorKind::Timeout => "The request timed out. Please try again.".into(),
            ErrorKind::Authentication => "Your session has expired. Please sign in again.".into(),
            ErrorKind::Authorization => {
                "You don't have permission to perform this action.".into()
            }
            ErrorKind::Validation => "Some of the submitted values were rejected.".into(),
            ErrorKind::NotFound => "The requested item could not be found.".into(),
            ErrorKind::Conflict => {
                "This item was changed by someone else. Please refresh and try again.".into()
            }
            ErrorKind::UnsupportedMediaType => {
                "The server did not accept the submitted data format.".into()
            }
            ErrorKind::RateLimited => "Too many requests. Please wait a moment and try again.".into(),
            ErrorKind::Deserialization | ErrorKind::UnexpectedShape => {
                "The server sent a response we could not read.".into()
            }
            ErrorKind::Cancelled => "The request was cancelled.".into(),
            ErrorKind::Storage => "Unable to read saved session data.".into(),
            ErrorKind::Configuration => "The application is misconfigured.".into(),
            ErrorKind::Server | ErrorKind::Internal => {
                "Something went wrong. Please try again.".into()
            }
        }
    }

    #[must_use]
    pub fn from_http_status(status: u16, body: Option<&[u8]>) -> Self {
        let kind = match status {
            400 | 422 => ErrorKind::Validation,
            401 => ErrorKind::Authentication,
            403 => ErrorKind::Authorization,
            404 => ErrorKind::NotFound,
            408 => ErrorKind::Timeout,
            409 => ErrorKind::Conflict,
            415 => ErrorKind::UnsupportedMediaType,
            429 => ErrorKind::RateLimited,
            _ => ErrorKind::Server,
        };

        let mut error = Self::new(kind, format!("HTTP error: {status}"))
            .with_context("http_status", status.to_string());
        error.status = Some(status);
        if let Some(detail) = body.and_then(extract_detail) {
            error.detail = Some(detail);
        }
        error
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(detail) = &self.detail {
            write!(f, " (detail: {detail})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<HttpError> for AppError {
    fn from(e: HttpError) -> Self {
        let kind = match &e {
            HttpError::Timeout { .. } => ErrorKind::Timeout,
            HttpError::ConnectionError { .. } => ErrorKind::Network,
            HttpError::Cancelled { .. } => ErrorKind::Cancelled,
            HttpError::InvalidResponse { .. } | HttpError::ResponseTooLarge { .. } => {
                ErrorKind::Deserialization
            }
            HttpError::InvalidUrl { .. }
            | HttpError::PrivateNetworkBlocked { .. }
            | HttpError::InvalidHeader { .. }
            | HttpError::TooManyHeaders { .. }
            | HttpError::BodyTooLarge { .. }
            | HttpError::InvalidRequest { .. }
            | HttpError::SerializationError { .. } => ErrorKind::Internal,
        };
        let mut error = Self::new(kind, e.to_string());
        if let Some(request_id) = e.request_id() {
            error = error.with_context("request_id", request_id);
        }
        error
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        Self::new(ErrorKind::Storage, e.to_string())
    }
}

/// Error bodies come in a handful of shapes: `{"detail": ..}`, `{"message": ..}`,
/// `{"error": ..}` or a field map like `{"email": ["already taken"]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Detail { detail: String },
    Message { message: String },
    Error { error: String },
    Fields(BTreeMap<String, FieldMessages>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FieldMessages {
    Many(Vec<String>),
    One(String),
}

fn extract_detail(body: &[u8]) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_slice(body).ok()?;
    match parsed {
        ErrorBody::Detail { detail } => Some(detail),
        ErrorBody::Message { message } => Some(message),
        ErrorBody::Error { error } => Some(error),
        ErrorBody::Fields(fields) => {
            let parts: Vec<String> = fields
                .into_iter()
                .filter_map(|(field, messages)| {
                    let text = match messages {
                        FieldMessages::Many(list) => list.join(" "),
                        FieldMessages::One(one) => one,
                    };
                    if text.is_empty() {
                        None
                    } else if field == "non_field_errors" {
                        Some(text)
                    } else {
                        Some(format!("{field}: {text}"))
                    }
                })
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("; "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(AppError::from_http_status(401, None).kind, ErrorKind::Authentication);
        assert_eq!(AppError::from_http_status(403, None).kind, ErrorKind::Authorization);
        assert_eq!(AppError::from_http_status(415, None).kind, ErrorKind::UnsupportedMediaType);
        assert_eq!(AppError::from_http_status(502, None).kind, ErrorKind::Server);
        assert!(AppError::from_http_status(403, None).requires_login());
        assert!(!AppError::from_http_status(400, None).requires_login());
    }

    #[test]
    fn test_detail_body_shown_verbatim() {
        let error = AppError::from_http_status(400, Some(br#"{"detail": "Dates overlap"}"#));
        assert_eq!(error.user_facing_message(), "Dates overlap");
        assert_eq!(error.status, Some(400));
    }

    #[test]
    fn test_field_errors_flattened() {
        let body = br#"{"email": ["Enter a valid email."], "non_field_errors": ["Bad input"]}"#;
        let error = AppError::from_http_status(400, Some(body));
        assert_eq!(
            error.detail.as_deref(),
            Some("email: Enter a valid email.; Bad input")
        );
    }

    #[test]
    fn test_generic_message_without_detail() {
        let error = AppError::from_http_status(500, Some(b"<html>oops</html>"));
        assert!(error.detail.is_none());
        assert_eq!(error.user_facing_message(), "Something went wrong. Please try again.");
    }

    #[test]
    fn test_http_error_conversion() {
        let error: AppError = HttpError::Cancelled {
            request_id: "req-1".into(),
        }
        .into();
        assert!(error.is_cancelled());
        assert_eq!(error.context.get("request_id").map(String::as_str), Some("req-1"));

        let error: AppError = HttpError::ConnectionError {
            host: "api.example.com".into(),
            message: "refused".into(),
        }
        .into();
        assert_eq!(error.kind, ErrorKind::Network);

        let error: AppError = HttpError::ResponseTooLarge {
            size: 200 * 1024 * 1024,
            max: 100 * 1024 * 1024,
        }
        .into();
        assert_eq!(error.kind, ErrorKind::Deserialization);
    }
}
