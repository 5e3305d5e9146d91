use axum::{
    extract::Request,
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use crate::models::vote_models::VoterIdentity;
use crate::utils::{error::AppError, session::verify_token};

const GUEST_ID_HEADER: &str = "x-guest-id";
const MAX_GUEST_ID_LEN: usize = 128;

/// Attaches a `VoterIdentity` extension when one can be derived: a session
/// cookie or bearer token gives an authenticated user, else an `X-Guest-Id`
/// header gives a guest. A present-but-invalid token is rejected outright
/// rather than downgraded to a guest.
pub async fn attach_identity(
    cookie_jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = cookie_jar
        .get("token")
        .map(|cookie| cookie.value().to_string())
        .or_else(|| {
            req.headers()
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(str::to_string)
        });

    if let Some(token) = token {
        let claims = verify_token(&token)
            .map_err(|_| AppError::AuthenticationError("Invalid or expired token".to_string()))?;
        req.extensions_mut().insert(VoterIdentity::User(claims.sub));
        return Ok(next.run(req).await);
    }

    if let Some(guest_id) = req
        .headers()
        .get(GUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_GUEST_ID_LEN)
    {
        let identity = VoterIdentity::Guest(guest_id.to_string());
        req.extensions_mut().insert(identity);
    }

    Ok(next.run(req).await)
}

/// Any identity at all, user or guest.
pub fn require_identity(identity: Option<&VoterIdentity>) -> Result<&VoterIdentity, AppError> {
    identity.ok_or_else(|| {
        AppError::AuthenticationError(
            "Sign in or supply an X-Guest-Id header to vote".to_string(),
        )
    })
}

/// An authenticated user; guests are rejected.
pub fn require_user(identity: Option<&VoterIdentity>) -> Result<&str, AppError> {
    match identity {
        Some(VoterIdentity::User(id)) => Ok(id),
        _ => Err(AppError::AuthenticationError(
            "This action requires a signed-in user".to_string(),
        )),
    }
}
