//! Crate-wide error type.
//!
//! Unifies the error kinds from the component design: `NotFound`,
//! `Malformed`, `DimensionMismatch`, `Overloaded`, `SolverDegenerate`,
//! `RenderFailure`, `Internal`. `AppError` is the only error type that
//! crosses the HTTP boundary (via `IntoResponse`); everything upstream of
//! that boundary either already speaks `AppError` or gets wrapped into one
//! at the call site closest to the handler.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("arquivo não encontrado: {0}")]
    NotFound(String),

    #[error("dados malformados: {0}")]
    Malformed(String),

    #[error("dimensões incompatíveis: {0}")]
    DimensionMismatch(String),

    #[error("servidor sobrecarregado")]
    Overloaded,

    /// Never surfaced to a client. The solver recovers from this locally by
    /// terminating early with the current `f` (§4.4); the variant exists so
    /// internal helpers can express the same failure mode uniformly.
    #[error("solver degenerou: {0}")]
    SolverDegenerate(String),

    #[error("falha ao renderizar imagem: {0}")]
    RenderFailure(String),

    #[error("erro interno: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::BAD_REQUEST,
            AppError::Malformed(_) => StatusCode::BAD_REQUEST,
            AppError::DimensionMismatch(_) => StatusCode::BAD_REQUEST,
            AppError::Overloaded => StatusCode::SERVICE_UNAVAILABLE,
            AppError::SolverDegenerate(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::RenderFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    status: &'static str,
    mensagem: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        tracing::error!(error = %self, %status, "request failed");
        let body = ErrorEnvelope {
            status: "erro",
            mensagem: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => AppError::NotFound(e.to_string()),
            _ => AppError::Internal(e.to_string()),
        }
    }
}
