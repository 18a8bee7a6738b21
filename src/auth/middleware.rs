//! Authentication extractors
//!
//! A single token resolver backs both extractors: `CurrentUser` rejects with
//! 401 when resolution fails, `MaybeUser` degrades to `None`. Handlers never
//! parse credentials themselves.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use axum_extra::extract::CookieJar;

use super::token::verify_access_token;
use crate::AppState;
use crate::data::User;
use crate::error::AppError;

/// Cookie holding the access token for browser clients.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Cookie holding the refresh token.
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

fn extract_token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(ToOwned::to_owned)
        .or_else(|| {
            let jar = CookieJar::from_headers(headers);
            jar.get(ACCESS_TOKEN_COOKIE)
                .map(|cookie| cookie.value().to_owned())
        })
}

/// Resolve an access token to its user.
///
/// Verifies the signature and expiry, then loads the user row so that a
/// deleted account is rejected even while its token is still fresh.
async fn authenticate_token(token: &str, state: &AppState) -> Result<User, AppError> {
    let claims = verify_access_token(token, &state.config.auth)?;

    state
        .db
        .get_user(&claims.sub)
        .await?
        .ok_or(AppError::Unauthorized)
}

/// Extractor for the authenticated user; rejects with 401 otherwise.
///
/// # Usage
/// ```ignore
/// async fn handler(CurrentUser(user): CurrentUser) -> impl IntoResponse {
///     format!("Hello, {}", user.username)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<User>().cloned() {
            return Ok(CurrentUser(user));
        }

        let state = AppState::from_ref(state);
        let token = extract_token_from_headers(&parts.headers).ok_or(AppError::Unauthorized)?;
        let user = authenticate_token(&token, &state).await?;
        parts.extensions.insert(user.clone());

        Ok(CurrentUser(user))
    }
}

/// Optional variant for endpoints that personalize but do not require login.
///
/// Invalid or missing credentials yield `None`, never an error.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<User>().cloned() {
            return Ok(MaybeUser(Some(user)));
        }

        let app_state = AppState::from_ref(state);
        let user = match extract_token_from_headers(&parts.headers) {
            Some(token) => authenticate_token(&token, &app_state).await.ok(),
            None => None,
        };

        if let Some(user) = &user {
            parts.extensions.insert(user.clone());
        }

        Ok(MaybeUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Authorization",
            HeaderValue::from_static("Bearer header-token"),
        );
        headers.insert(
            "Cookie",
            HeaderValue::from_static("access_token=cookie-token"),
        );
        assert_eq!(
            extract_token_from_headers(&headers).as_deref(),
            Some("header-token")
        );
    }

    #[test]
    fn cookie_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Cookie",
            HeaderValue::from_static("other=1; access_token=cookie-token"),
        );
        assert_eq!(
            extract_token_from_headers(&headers).as_deref(),
            Some("cookie-token")
        );
    }

    #[test]
    fn no_credentials() {
        assert!(extract_token_from_headers(&HeaderMap::new()).is_none());
    }

    #[test]
    fn malformed_authorization_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Basic abc"));
        assert!(extract_token_from_headers(&headers).is_none());
    }
}
