//! Session credential extraction

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum_extra::extract::cookie::CookieJar;
use onshape_auth::{AuthError, SessionClaims};

use crate::error::GatewayError;
use crate::routes::AppState;

/// Cookie holding the signed session envelope.
pub const AUTH_COOKIE: &str = "auth_token";

/// Verified session identity for a request.
///
/// Looks for the `auth_token` cookie first, then the second chunk of an
/// `Authorization` header (`Bearer <envelope>`), and verifies the envelope
/// against the configured signing secret. Handlers taking this extractor
/// never run for unauthenticated requests.
pub struct SessionUser(pub SessionClaims);

impl FromRequestParts<AppState> for SessionUser {
    type Rejection = GatewayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let envelope = jar
            .get(AUTH_COOKIE)
            .map(|cookie| cookie.value().to_owned())
            .or_else(|| bearer_token(parts));
        let Some(envelope) = envelope else {
            return Err(GatewayError::Auth(AuthError::Missing));
        };

        let claims = onshape_auth::verify(&envelope, state.session_secret.expose().as_bytes())
            .map_err(|err| {
                tracing::debug!(%err, "session verification failed");
                GatewayError::Auth(err)
            })?;
        Ok(SessionUser(claims))
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let header = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    header.split_whitespace().nth(1).map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_auth(value: &str) -> Parts {
        Request::builder()
            .header(AUTHORIZATION, value)
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    #[test]
    fn bearer_token_takes_second_chunk() {
        let parts = parts_with_auth("Bearer abc.def.ghi");
        assert_eq!(bearer_token(&parts), Some(String::from("abc.def.ghi")));
    }

    #[test]
    fn bearer_token_without_scheme_is_ignored() {
        // A bare envelope with no scheme word has no second chunk.
        let parts = parts_with_auth("abc.def.ghi");
        assert_eq!(bearer_token(&parts), None);
    }

    #[test]
    fn bearer_token_absent_header() {
        let parts = Request::builder().body(()).unwrap().into_parts().0;
        assert_eq!(bearer_token(&parts), None);
    }
}
