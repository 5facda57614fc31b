//! Bearer token extraction and policy-based route guards

use crate::{error::ApiError, AppState};
use axum::{
    extract::{FromRef, FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use keyward_core::{PolicyError, TokenClaims};
use tracing::warn;

/// Claims extracted from a verified `Authorization: Bearer` header
#[derive(Debug, Clone)]
pub struct Bearer(pub TokenClaims);

impl<S> FromRequestParts<S> for Bearer
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let auth_header = parts
            .headers
            .get("authorization")
            .ok_or(ApiError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| ApiError::InvalidToken)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::InvalidToken)?;

        let claims = app_state.tokens.verify(token)?;
        Ok(Bearer(claims))
    }
}

/// Route guard evaluating a named policy against the caller's token claims
///
/// On success the verified claims are stored as a request extension for the
/// downstream handler.
pub async fn authorize(
    state: AppState,
    policy: &'static str,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (mut parts, body) = request.into_parts();
    let Bearer(claims) = Bearer::from_request_parts(&mut parts, &state).await?;

    match state.policies.evaluate(policy, &claims) {
        Ok(true) => {}
        Ok(false) => {
            warn!("policy '{}' denied request for subject {}", policy, claims.sub);
            return Err(ApiError::Forbidden(policy.to_string()));
        }
        Err(PolicyError::UnknownPolicy(name)) => {
            return Err(ApiError::Internal(format!(
                "policy '{}' is not registered",
                name
            )));
        }
    }

    let mut request = Request::from_parts(parts, body);
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
