use axum::{
    extract::{FromRequestParts, Query, Request, State},
    http::{HeaderMap, Method, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use services::services::auth::AuthenticatedUser;
use tracing::warn;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Download links opened by the browser cannot set headers, so GET requests
/// may pass the token as `?token=`.
fn query_token(request: &Request) -> Option<String> {
    if request.method() != Method::GET {
        return None;
    }
    Query::<TokenQuery>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(query)| query.token)
        .filter(|token| !token.is_empty())
}

/// Resolves the caller and stores an [`AuthenticatedUser`] extension for
/// [`CurrentUser`]. Anything without a valid token stops here with 401.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = match bearer(request.headers()) {
        Some(token) => token.to_string(),
        None => query_token(&request).ok_or(ApiError::Unauthorized)?,
    };
    let user = state.auth().authenticate(&token).await?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// The authenticated caller of a protected route
#[derive(Debug, Clone)]
pub struct CurrentUser(pub AuthenticatedUser);

impl CurrentUser {
    pub fn id(&self) -> Uuid {
        self.0.id()
    }

    /// 403 unless the caller's role grants `permission`
    pub fn ensure(&self, permission: &str) -> Result<(), ApiError> {
        if self.0.can(permission) {
            return Ok(());
        }
        warn!(user_id = %self.id(), permission, "Permission denied");
        Err(ApiError::Forbidden)
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or(ApiError::Unauthorized)
    }
}
