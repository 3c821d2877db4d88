use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::errors::AppError;

/// The already-authenticated principal for a request.
///
/// Authentication happens upstream (API gateway); the gateway injects
/// `x-user-id` and `x-admin-role` headers. This service only authorizes:
/// ownership checks and admin-only mutation gates.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: Uuid,
    pub is_admin: bool,
}

impl Actor {
    /// Gate for platform-owned (admin-writable) resources.
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .ok_or(AppError::Unauthorized)?;

        let is_admin = parts
            .headers
            .get("x-admin-role")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("admin"))
            .unwrap_or(false);

        Ok(Actor { user_id, is_admin })
    }
}
