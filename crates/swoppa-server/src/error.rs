use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use swoppa_shared::DomainError;
use swoppa_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Authentication required: {0}")]
    Unauthorized(String),

    /// Operator endpoints only; domain authorization goes through `Domain`.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Too many requests")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        match err.to_domain() {
            Some(domain) => ServerError::Domain(domain),
            None => ServerError::Internal(err.to_string()),
        }
    }
}

impl ServerError {
    pub fn code(&self) -> &'static str {
        match self {
            ServerError::Domain(err) => err.code(),
            ServerError::Unauthorized(_) => "unauthorized",
            ServerError::Forbidden(_) => "forbidden",
            ServerError::RateLimited => "rate_limited",
            ServerError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Domain(err) => match err {
                DomainError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
                DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
                DomainError::Conflict(_) | DomainError::ListingUnderReview(_) => {
                    StatusCode::CONFLICT
                }
                DomainError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            ServerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServerError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServerError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let message = match &self {
            ServerError::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed");
                "Internal server error".to_string()
            }
            ServerError::Domain(DomainError::Unavailable(detail)) => {
                tracing::warn!(error = %detail, "Storage unavailable");
                self.to_string()
            }
            _ => self.to_string(),
        };

        let mut body = serde_json::json!({
            "error": message,
            "code": self.code(),
        });
        if let ServerError::Domain(err) = &self {
            if let Some(field) = err.field() {
                body["field"] = field.into();
            }
        }

        (self.status(), axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swoppa_shared::ListingId;

    #[test]
    fn domain_errors_map_to_status() {
        let cases = [
            (DomainError::validation("price", "negative"), 422),
            (DomainError::not_found("listing", ListingId::new()), 404),
            (DomainError::forbidden("nope"), 403),
            (DomainError::conflict("sold"), 409),
            (DomainError::ListingUnderReview(ListingId::new()), 409),
            (DomainError::Unavailable("busy".into()), 503),
        ];
        for (err, status) in cases {
            assert_eq!(ServerError::from(err).status().as_u16(), status);
        }
    }

    #[test]
    fn internal_store_errors_are_hidden() {
        let err = ServerError::from(StoreError::Migration("v9 missing".into()));
        assert_eq!(err.code(), "internal");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = ServerError::from(StoreError::Domain(DomainError::forbidden("not yours")));
        assert_eq!(err.code(), "forbidden");
    }
}
