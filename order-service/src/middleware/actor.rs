//! Acting party extracted from request headers.
//!
//! The gateway in front of this service authenticates the caller and sets
//! `X-Actor-Role` and `X-Actor-ID`. Requests without both are rejected.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;

use crate::models::{ActorContext, ActorRole};

pub const ACTOR_ROLE_HEADER: &str = "X-Actor-Role";
pub const ACTOR_ID_HEADER: &str = "X-Actor-ID";

#[async_trait]
impl<S> FromRequestParts<S> for ActorContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let role = parts
            .headers
            .get(ACTOR_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Unauthorized(anyhow::anyhow!("Missing {} header", ACTOR_ROLE_HEADER))
            })?;
        let role = ActorRole::parse(role).ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Unknown actor role: {}", role))
        })?;

        let id = parts
            .headers
            .get(ACTOR_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                AppError::Unauthorized(anyhow::anyhow!("Missing {} header", ACTOR_ID_HEADER))
            })?;

        let span = tracing::Span::current();
        span.record("actor_role", role.as_str());
        span.record("actor_id", id);

        Ok(ActorContext::new(role, id))
    }
}
