use axum::{
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, models::CurrentUser, AppState};

/// Session claims issued by the auth provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    // provider user id
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    // expiry (unix timestamp seconds)
    pub exp: usize,
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = raw.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(cookie_name)
        .map(|c| c.value().to_string())
        .or_else(|| bearer_token(headers))
}

pub fn verify_session(token: &str, secret: &str) -> Option<CurrentUser> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .inspect_err(|e| tracing::debug!(error = %e, "rejected session token"))
        .ok()?;

    let Claims { sub, email, name, .. } = data.claims;
    if sub.is_empty() {
        return None;
    }

    Some(CurrentUser { id: sub, email, name })
}

pub async fn inject_current_user(
    State(state): State<AppState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let cookie_name = state.settings.jwt_cookie_name.as_str();

    if let Some(token) = session_token(req.headers(), cookie_name) {
        if let Some(user) = verify_session(&token, &state.settings.jwt_secret) {
            // handlers read it back with Extension<CurrentUser>
            req.extensions_mut().insert(user);
        }
    }

    next.run(req).await
}

fn requires_session(path: &str) -> bool {
    path.starts_with("/api/")
}

pub async fn require_auth(
    State(_state): State<AppState>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if !requires_session(req.uri().path()) {
        return next.run(req).await;
    }

    if req.extensions().get::<CurrentUser>().is_some() {
        return next.run(req).await;
    }

    ApiError::Unauthorized.into_response()
}
