//! Shared-secret check for protected routes.
//!
//! Runs before any extractor, so a bad secret is rejected regardless of the
//! request body.

use crate::error::HttpAppError;
use axum::{
    extract::{Request, State},
    http::HeaderName,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tubedrop_core::AppError;

#[derive(Clone)]
pub struct AuthState {
    secret: String,
    header: HeaderName,
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

impl AuthState {
    pub fn new(secret: &str, header: &str) -> Result<Self, anyhow::Error> {
        let header = HeaderName::from_bytes(header.as_bytes())
            .map_err(|e| anyhow::anyhow!("Invalid API_SECRET_HEADER '{}': {}", header, e))?;
        Ok(Self {
            secret: secret.to_string(),
            header,
        })
    }
}

fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

pub async fn auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    request: Request,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get(&auth_state.header)
        .and_then(|h| h.to_str().ok());

    match provided {
        Some(value) if secure_compare(value, &auth_state.secret) => next.run(request).await,
        Some(_) => {
            tracing::warn!(header = %auth_state.header, "Rejected request with invalid secret");
            HttpAppError::from(AppError::Unauthorized("Invalid API secret".to_string()))
                .into_response()
        }
        None => {
            tracing::warn!(header = %auth_state.header, "Rejected request without secret");
            HttpAppError::from(AppError::Unauthorized(format!(
                "Missing {} header",
                auth_state.header
            )))
            .into_response()
        }
    }
}
