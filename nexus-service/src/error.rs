//! The three-layer error taxonomy from spec.md §7: protocol errors carry a
//! bank technical code, application errors are ordinary not-found/conflict/
//! validation, and anything else is logged and surfaced as a neutral 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use nexus_ebics::error::TechnicalCode;
use serde::Serialize;
use tracing::error;

/// Bank-protocol-level failures: signature verification, malformed XML, or
/// a non-success EBICS technical code.
#[derive(Debug)]
pub struct ProtocolError {
    /// HTTP status this maps to.
    pub http_status: StatusCode,
    /// Human-readable reason, often the technical code's name.
    pub reason: String,
    /// The EBICS technical code, when the failure came from the bank.
    pub technical_code: Option<TechnicalCode>,
}

/// Ordinary application-level failures.
#[derive(Debug)]
pub struct AppError {
    /// HTTP status this maps to.
    pub http_status: StatusCode,
    /// Human-readable reason.
    pub reason: String,
}

impl AppError {
    /// 404.
    pub fn not_found(reason: impl Into<String>) -> Self {
        AppError { http_status: StatusCode::NOT_FOUND, reason: reason.into() }
    }

    /// 409.
    pub fn conflict(reason: impl Into<String>) -> Self {
        AppError { http_status: StatusCode::CONFLICT, reason: reason.into() }
    }

    /// 400.
    pub fn bad_request(reason: impl Into<String>) -> Self {
        AppError { http_status: StatusCode::BAD_REQUEST, reason: reason.into() }
    }

    /// 401.
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        AppError { http_status: StatusCode::UNAUTHORIZED, reason: reason.into() }
    }

    /// 403.
    pub fn forbidden(reason: impl Into<String>) -> Self {
        AppError { http_status: StatusCode::FORBIDDEN, reason: reason.into() }
    }
}

/// The single error type every route handler returns; covers all three
/// layers of spec.md §7.
#[derive(Debug)]
pub enum ServiceError {
    /// Bank-protocol-level failure.
    Protocol(ProtocolError),
    /// Application-level failure.
    App(AppError),
    /// Anything else: logged with full context, surfaced as a neutral 500.
    Internal(anyhow::Error),
}

impl From<ProtocolError> for ServiceError {
    fn from(e: ProtocolError) -> Self {
        ServiceError::Protocol(e)
    }
}

impl From<AppError> for ServiceError {
    fn from(e: AppError) -> Self {
        ServiceError::App(e)
    }
}

impl From<nexus_ledger::Error> for ServiceError {
    fn from(e: nexus_ledger::Error) -> Self {
        match e {
            nexus_ledger::Error::NotFound { kind, id } => {
                AppError::not_found(format!("{kind} not found: {id}")).into()
            }
            nexus_ledger::Error::AlreadyExists(reason) => AppError::conflict(reason).into(),
            nexus_ledger::Error::InvalidInput(reason) => AppError::bad_request(reason).into(),
            other => ServiceError::Internal(other.into()),
        }
    }
}

impl From<nexus_ebics::Error> for ServiceError {
    fn from(e: nexus_ebics::Error) -> Self {
        match e {
            nexus_ebics::Error::BankTechnical { ref code, .. } => {
                let technical_code = TechnicalCode::from_wire(code);
                ProtocolError {
                    http_status: StatusCode::BAD_GATEWAY,
                    reason: technical_code.as_str().to_string(),
                    technical_code: Some(technical_code),
                }
                .into()
            }
            nexus_ebics::Error::NoDownloadDataAvailable => ProtocolError {
                http_status: StatusCode::OK,
                reason: "EBICS_NO_DOWNLOAD_DATA_AVAILABLE".to_string(),
                technical_code: Some(TechnicalCode::NoDownloadDataAvailable),
            }
            .into(),
            nexus_ebics::Error::Crypto(_) | nexus_ebics::Error::Framing(_) => ProtocolError {
                http_status: StatusCode::BAD_GATEWAY,
                reason: e.to_string(),
                technical_code: None,
            }
            .into(),
            other => ServiceError::Internal(other.into()),
        }
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(e: anyhow::Error) -> Self {
        ServiceError::Internal(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorBodyInner,
}

#[derive(Serialize)]
struct ErrorBodyInner {
    #[serde(rename = "type")]
    kind: &'static str,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    technical_code: Option<String>,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match self {
            ServiceError::Protocol(e) => (
                e.http_status,
                Json(ErrorBody {
                    error: ErrorBodyInner {
                        kind: "protocol-error",
                        description: e.reason,
                        technical_code: e.technical_code.map(|c| c.as_str().to_string()),
                    },
                }),
            )
                .into_response(),
            ServiceError::App(e) => (
                e.http_status,
                Json(ErrorBody {
                    error: ErrorBodyInner { kind: "application-error", description: e.reason, technical_code: None },
                }),
            )
                .into_response(),
            ServiceError::Internal(e) => {
                error!("internal error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody {
                        error: ErrorBodyInner {
                            kind: "nexus-error",
                            description: "Internal server error".to_string(),
                            technical_code: None,
                        },
                    }),
                )
                    .into_response()
            }
        }
    }
}
