//! HTTP error mapping: every failure leaves the façade as a structured
//! envelope `{error: {kind, message, retriable}}` with an appropriate
//! status code and no internal detail beyond the error message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use kestrel_core::KestrelError;

/// Standard API result.
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub struct ApiError(pub KestrelError);

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorEnvelope,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    kind: &'static str,
    message: String,
    retriable: bool,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self.0 {
            KestrelError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            KestrelError::GoldenSetInvalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            KestrelError::InvalidOutput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            KestrelError::Overloaded(_) => StatusCode::TOO_MANY_REQUESTS,
            KestrelError::GeneratorUnavailable(_) | KestrelError::RetrievalUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            KestrelError::GeneratorTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            KestrelError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorBody {
            error: ErrorEnvelope {
                kind: self.0.kind(),
                message: self.0.to_string(),
                retriable: self.0.retriable(),
            },
        });
        (status, body).into_response()
    }
}

impl From<KestrelError> for ApiError {
    fn from(err: KestrelError) -> Self {
        ApiError(err)
    }
}

impl From<kestrel_retrieval::RetrievalError> for ApiError {
    fn from(err: kestrel_retrieval::RetrievalError) -> Self {
        ApiError(err.into())
    }
}

impl From<kestrel_evolve::EvolveError> for ApiError {
    fn from(err: kestrel_evolve::EvolveError) -> Self {
        ApiError(err.into())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError(KestrelError::Internal(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kinds() {
        let cases = [
            (KestrelError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (KestrelError::Overloaded("x".into()), StatusCode::TOO_MANY_REQUESTS),
            (
                KestrelError::GeneratorUnavailable("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (KestrelError::GeneratorTimeout(30_000), StatusCode::GATEWAY_TIMEOUT),
            (
                KestrelError::RetrievalUnavailable("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (KestrelError::InvalidOutput("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (KestrelError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status_code(), status);
        }
    }
}
