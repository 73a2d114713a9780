use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::admin::{AdminCategoryError, AdminDashboardError, AdminPostError};
use crate::application::error::ErrorReport;
use crate::application::gateways::GatewayError;
use crate::application::preferences::ToggleFailure;
use crate::application::repos::RepoError;
use crate::application::session::SessionError;
use crate::domain::error::FieldErrors;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const FORBIDDEN: &str = "forbidden";
    pub const NOT_FOUND: &str = "not_found";
    pub const DUPLICATE: &str = "duplicate";
    pub const VALIDATION: &str = "validation_failed";
    pub const NOTHING_TO_UPDATE: &str = "nothing_to_update";
    pub const CONFIRMATION_REQUIRED: &str = "confirmation_required";
    pub const UPLOAD: &str = "upload_failed";
    pub const REMOTE: &str = "remote_error";
    pub const UPSTREAM_TIMEOUT: &str = "upstream_timeout";
    pub const IDENTITY: &str = "identity_error";
    pub const SESSION: &str = "session_error";
    pub const PREFERENCE_PENDING: &str = "preference_pending";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldErrors>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    hint: Option<String>,
    fields: Option<FieldErrors>,
    source: &'static str,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            hint: None,
            fields: None,
            source: "infra::http",
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Names the component that produced the error in the response log.
    pub fn from_source(mut self, source: &'static str) -> Self {
        self.source = source;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "Sign-in required",
        )
    }

    pub fn forbidden() -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            codes::FORBIDDEN,
            "Administrator role required",
        )
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message)
    }

    pub fn validation(fields: FieldErrors) -> Self {
        let mut err = Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            codes::VALIDATION,
            "Some fields are invalid",
        );
        err.fields = Some(fields);
        err
    }

    /// Body and status only; used where a handler wraps the message in its own payload.
    pub fn into_message(self) -> (StatusCode, ApiErrorMessage) {
        (
            self.status,
            ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message,
                hint: self.hint,
                fields: self.fields,
            },
        )
    }

    fn report(&self) -> ErrorReport {
        let detail = match (&self.fields, &self.hint) {
            (Some(fields), _) => format!("{}: {fields}", self.code),
            (None, Some(hint)) => format!("{}: {} ({hint})", self.code, self.message),
            (None, None) => format!("{}: {}", self.code, self.message),
        };
        ErrorReport::from_message(self.source, self.status, detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report = self.report();
        let (status, error) = self.into_message();
        let mut response = (status, Json(ApiErrorBody { error })).into_response();
        report.attach(&mut response);
        response
    }
}

/// Remote messages are passed through verbatim; only the status is translated.
impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        let source = "infra::http::repo";
        match err {
            RepoError::Remote { status, message } => {
                let status = match status {
                    404 => StatusCode::NOT_FOUND,
                    409 => StatusCode::CONFLICT,
                    _ => StatusCode::BAD_GATEWAY,
                };
                Self::new(status, codes::REMOTE, message)
            }
            RepoError::Duplicate { message } => {
                Self::new(StatusCode::CONFLICT, codes::DUPLICATE, message)
            }
            RepoError::NotFound => Self::not_found("Resource not found"),
            RepoError::Timeout => Self::new(
                StatusCode::GATEWAY_TIMEOUT,
                codes::UPSTREAM_TIMEOUT,
                "Data API request timed out",
            ),
            err @ (RepoError::Transport(_) | RepoError::Decode(_)) => {
                Self::new(StatusCode::BAD_GATEWAY, codes::REMOTE, err.to_string())
            }
        }
        .from_source(source)
    }
}

impl From<ToggleFailure> for ApiError {
    fn from(err: ToggleFailure) -> Self {
        match err {
            ToggleFailure::Busy(busy) => {
                Self::new(StatusCode::CONFLICT, codes::PREFERENCE_PENDING, busy.to_string())
                    .from_source("infra::http::preferences")
            }
            ToggleFailure::Remote(err) => err.into(),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Unauthorized => Self::unauthorized(),
            GatewayError::Remote { message, .. } => {
                Self::new(StatusCode::BAD_GATEWAY, codes::REMOTE, message)
            }
            err @ (GatewayError::Transport(_) | GatewayError::Invalid(_)) => {
                Self::new(StatusCode::BAD_GATEWAY, codes::REMOTE, err.to_string())
            }
        }
        .from_source("infra::http::gateway")
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Identity(GatewayError::Unauthorized) => Self::unauthorized(),
            SessionError::Identity(inner) => Self::new(
                StatusCode::BAD_GATEWAY,
                codes::IDENTITY,
                inner.to_string(),
            ),
            SessionError::Profile(inner) => ApiError::from(inner),
        }
        .from_source("infra::http::session")
    }
}

impl From<AdminPostError> for ApiError {
    fn from(err: AdminPostError) -> Self {
        let source = "infra::http::admin::posts";
        match err {
            AdminPostError::Validation(fields) => Self::validation(fields),
            AdminPostError::NothingToUpdate => Self::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                codes::NOTHING_TO_UPDATE,
                "No changes supplied",
            ),
            AdminPostError::ConfirmationRequired => Self::new(
                StatusCode::BAD_REQUEST,
                codes::CONFIRMATION_REQUIRED,
                "Deleting a post requires confirmation",
            )
            .with_hint("repeat the request with confirm=true"),
            AdminPostError::Forbidden(_) => Self::forbidden(),
            AdminPostError::Upload(inner) => Self::new(
                StatusCode::BAD_GATEWAY,
                codes::UPLOAD,
                format!("Image upload failed: {inner}"),
            ),
            AdminPostError::Repo(inner) => Self::from(inner),
        }
        .from_source(source)
    }
}

impl From<AdminCategoryError> for ApiError {
    fn from(err: AdminCategoryError) -> Self {
        match err {
            AdminCategoryError::Validation(fields) => Self::validation(fields),
            AdminCategoryError::Forbidden(_) => Self::forbidden(),
            AdminCategoryError::Repo(inner) => Self::from(inner),
        }
        .from_source("infra::http::admin::categories")
    }
}

impl From<AdminDashboardError> for ApiError {
    fn from(err: AdminDashboardError) -> Self {
        match err {
            AdminDashboardError::Forbidden(_) => Self::forbidden(),
            AdminDashboardError::Repo(inner) => Self::from(inner),
        }
        .from_source("infra::http::admin::dashboard")
    }
}
