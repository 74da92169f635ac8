use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{FormRejection, QueryRejection};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;

use serde::Serialize;

pub async fn handler404(path: Uri) -> Error {
    Error::NotFound {
        message: format!("Invalid path: {}", path),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Success<V> {
    success: bool,
    #[serde(flatten)]
    value: V,
}

impl<V: Serialize> Success<V> {
    pub fn of(value: V) -> Self {
        Self {
            success: true,
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "error")]
pub enum Error {
    Unauthenticated { message: String },
    Forbidden { message: String },
    NotFound { message: String },
    Conflict { message: String },
    Full { message: String },
    InvalidCredentials { message: String },
    InvalidPayload { message: String },
    DirectoryUnavailable { message: String },
    InternalError { kind: &'static str, message: String },
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } | Error::InvalidCredentials { .. } => {
                StatusCode::UNAUTHORIZED
            }
            Error::Forbidden { .. } => StatusCode::FORBIDDEN,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Conflict { .. } | Error::Full { .. } | Error::InvalidPayload { .. } => {
                StatusCode::BAD_REQUEST
            }
            Error::DirectoryUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Error::Unauthenticated { message }
            | Error::Forbidden { message }
            | Error::NotFound { message }
            | Error::Conflict { message }
            | Error::Full { message }
            | Error::InvalidCredentials { message }
            | Error::InvalidPayload { message }
            | Error::DirectoryUnavailable { message }
            | Error::InternalError { message, .. } => message,
        }
    }

    pub fn unauthenticated<S: Into<String>>(msg: S) -> Error {
        Error::Unauthenticated {
            message: msg.into(),
        }
    }

    pub fn forbidden<S: Into<String>>(msg: S) -> Error {
        Error::Forbidden {
            message: msg.into(),
        }
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Error {
        Error::NotFound {
            message: msg.into(),
        }
    }

    pub fn conflict<S: Into<String>>(msg: S) -> Error {
        Error::Conflict {
            message: msg.into(),
        }
    }

    pub fn full<S: Into<String>>(msg: S) -> Error {
        Error::Full {
            message: msg.into(),
        }
    }

    pub fn invalid_payload<S: Into<String>>(msg: S) -> Error {
        Error::InvalidPayload {
            message: msg.into(),
        }
    }

    pub fn directory<S: Into<String>>(msg: S) -> Error {
        Error::DirectoryUnavailable {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for Error {}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<QueryRejection> for Error {
    fn from(err: QueryRejection) -> Self {
        Self::InvalidPayload {
            message: err.body_text(),
        }
    }
}

impl From<FormRejection> for Error {
    fn from(err: FormRejection) -> Self {
        Self::InvalidPayload {
            message: err.body_text(),
        }
    }
}

impl From<MultipartRejection> for Error {
    fn from(err: MultipartRejection) -> Self {
        Self::InvalidPayload {
            message: err.body_text(),
        }
    }
}

impl From<MultipartError> for Error {
    fn from(err: MultipartError) -> Self {
        Self::InvalidPayload {
            message: err.body_text(),
        }
    }
}
