pub mod cart;
pub mod checkout;
pub mod orders;
pub mod promos;

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts, Router};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::AppState;

/// Header carrying the acting user's id, injected by the upstream auth
/// layer. Token issuance and validation live outside this service.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Acting user, resolved from the `x-user-id` request header.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ServiceError::Unauthorized("missing user identity".to_string()))?;
        let user_id = Uuid::parse_str(raw)
            .map_err(|_| ServiceError::Unauthorized("malformed user identity".to_string()))?;
        Ok(AuthenticatedUser(user_id))
    }
}

/// All HTTP routes of the checkout core.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(cart::routes())
        .merge(checkout::routes())
        .merge(orders::routes())
        .merge(promos::routes())
}
