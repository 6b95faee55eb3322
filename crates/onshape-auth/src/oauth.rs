//! Three-legged OAuth flow against the CAD provider
//!
//! Two interactions with the provider's OAuth host plus one with its REST
//! API:
//! 1. `build_authorization_url` constructs the consent-page URL the browser
//!    is redirected to, with the panel's document context packed into
//!    `state`
//! 2. `exchange_code` POSTs the returned grant code to the token endpoint
//!    (confidential client: id + secret, no PKCE)
//! 3. `fetch_user` retrieves the authenticated user's profile with the
//!    fresh access token
//!
//! `complete_authorization` strings 2 and 3 together and recovers the
//! correlation data from `state`, which is the shape the gateway's callback
//! route wants.

use common::Secret;
use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};
use crate::profile::UserProfile;
use crate::session::SessionClaims;
use crate::state::RedirectState;

/// OAuth client configuration for the provider.
///
/// `oauth_base_url` is the provider's OAuth host (authorize and token
/// endpoints); `api_base_url` is its REST API root including the `/api`
/// prefix, shared with the export client. Both without a trailing slash.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: Secret<String>,
    /// Redirect URI registered with the provider, sent verbatim
    pub callback_url: String,
    pub oauth_base_url: String,
    pub api_base_url: String,
    pub scope: String,
}

/// Response from the token endpoint.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,

    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Seconds until the access token expires (delta, not absolute). The
    /// session envelope has its own fixed lifetime, so this is informational.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Build the consent-page URL the sign-in route redirects to.
///
/// The provider echoes `state` back unchanged in the callback, which is how
/// the document context survives the round trip.
pub fn build_authorization_url(config: &OAuthConfig, state: &RedirectState) -> Result<String> {
    let mut url = Url::parse(&format!("{}/oauth/authorize", config.oauth_base_url))
        .map_err(|e| Error::InvalidUrl(format!("authorize endpoint: {e}")))?;

    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &config.client_id)
        .append_pair("redirect_uri", &config.callback_url)
        .append_pair("scope", &config.scope)
        .append_pair("state", &state.encode());

    Ok(url.into())
}

/// Exchange a one-time grant code for an access/refresh token pair.
///
/// Server-to-server call; the client secret never reaches the browser. A
/// non-success response surfaces the provider's status and body in the
/// error so operators can see what the provider actually said.
pub async fn exchange_code(
    client: &reqwest::Client,
    config: &OAuthConfig,
    code: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(format!("{}/oauth/token", config.oauth_base_url))
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.expose().as_str()),
            ("redirect_uri", config.callback_url.as_str()),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("token exchange request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::TokenExchange {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::InvalidResponse(format!("invalid token response: {e}")))
}

/// Fetch the authenticated user's profile from the session-info endpoint.
pub async fn fetch_user(
    client: &reqwest::Client,
    config: &OAuthConfig,
    access_token: &str,
) -> Result<UserProfile> {
    let response = client
        .get(format!("{}/users/sessioninfo", config.api_base_url))
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| Error::Http(format!("user info request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::UserInfo {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<UserProfile>()
        .await
        .map_err(|e| Error::InvalidResponse(format!("invalid session info response: {e}")))
}

/// Complete the flow after the provider's callback: exchange the code,
/// fetch the profile, and recover the correlation data.
///
/// Identity resolution happens here, once: the returned claims carry the
/// derived display name and subject so later requests never re-query the
/// provider. Returns unsigned claims; the caller signs them via
/// [`crate::session::issue`].
///
/// `state` fails open: a missing or undecodable value yields empty
/// correlation data, never an error. Losing the document context degrades
/// the redirect target, not the sign-in.
pub async fn complete_authorization(
    client: &reqwest::Client,
    config: &OAuthConfig,
    code: &str,
    state: Option<&str>,
) -> Result<(SessionClaims, RedirectState)> {
    tracing::debug!("exchanging authorization grant code");
    let tokens = exchange_code(client, config, code).await?;
    let profile = fetch_user(client, config, &tokens.access_token).await?;

    let claims = SessionClaims {
        sub: profile.subject().map(str::to_owned),
        name: profile.resolve_name().map(str::to_owned),
        email: profile.email().map(str::to_owned),
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
    };
    tracing::info!(sub = claims.sub.as_deref().unwrap_or("<none>"), "authorization complete");

    let correlation = state.and_then(RedirectState::decode).unwrap_or_default();
    Ok((claims, correlation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::{get, post};
    use axum::{Form, Json, Router};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    fn test_config(base: &str) -> OAuthConfig {
        OAuthConfig {
            client_id: "client-abc".into(),
            client_secret: Secret::new("shh-secret".to_string()),
            callback_url: "https://gateway.example.com/oauth/callback".into(),
            oauth_base_url: base.trim_end_matches('/').into(),
            api_base_url: format!("{}/api", base.trim_end_matches('/')),
            scope: "OAuth2Read OAuth2ReadPII".into(),
        }
    }

    async fn spawn_provider(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn authorization_url_carries_all_oauth_params() {
        let config = test_config("https://oauth.example.com");
        let state = RedirectState::new(Some("d1".into()), Some("w1".into()), Some("e1".into()));
        let url = build_authorization_url(&config, &state).unwrap();

        let parsed = Url::parse(&url).unwrap();
        assert_eq!(parsed.path(), "/oauth/authorize");
        let pairs: HashMap<_, _> = parsed.query_pairs().into_owned().collect();
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["client_id"], "client-abc");
        assert_eq!(
            pairs["redirect_uri"],
            "https://gateway.example.com/oauth/callback"
        );
        assert_eq!(pairs["scope"], "OAuth2Read OAuth2ReadPII");
        assert!(pairs.contains_key("state"));
    }

    #[test]
    fn authorization_url_state_round_trips() {
        let config = test_config("https://oauth.example.com");
        let state = RedirectState::new(Some("doc-9".into()), None, Some("elem-2".into()));
        let url = build_authorization_url(&config, &state).unwrap();

        let parsed = Url::parse(&url).unwrap();
        let raw_state = parsed
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert_eq!(RedirectState::decode(&raw_state), Some(state));
    }

    #[tokio::test]
    async fn exchange_code_posts_expected_form() {
        let seen: Arc<Mutex<Option<HashMap<String, String>>>> = Arc::new(Mutex::new(None));
        let captured = seen.clone();

        let router = Router::new().route(
            "/oauth/token",
            post(move |Form(form): Form<HashMap<String, String>>| {
                *captured.lock().unwrap() = Some(form);
                async {
                    Json(serde_json::json!({
                        "access_token": "at_fresh",
                        "refresh_token": "rt_fresh",
                        "expires_in": 3600
                    }))
                }
            }),
        );
        let base = spawn_provider(router).await;
        let config = test_config(&base);

        let client = reqwest::Client::new();
        let tokens = exchange_code(&client, &config, "grant-code-1").await.unwrap();
        assert_eq!(tokens.access_token, "at_fresh");
        assert_eq!(tokens.refresh_token.as_deref(), Some("rt_fresh"));
        assert_eq!(tokens.expires_in, Some(3600));

        let form = seen.lock().unwrap().take().unwrap();
        assert_eq!(form["grant_type"], "authorization_code");
        assert_eq!(form["code"], "grant-code-1");
        assert_eq!(form["client_id"], "client-abc");
        assert_eq!(form["client_secret"], "shh-secret");
        assert_eq!(form["redirect_uri"], "https://gateway.example.com/oauth/callback");
    }

    #[tokio::test]
    async fn exchange_code_surfaces_provider_error_body() {
        let router = Router::new().route(
            "/oauth/token",
            post(|| async {
                (
                    axum::http::StatusCode::BAD_REQUEST,
                    r#"{"error":"invalid_grant"}"#,
                )
            }),
        );
        let base = spawn_provider(router).await;
        let config = test_config(&base);

        let client = reqwest::Client::new();
        let err = exchange_code(&client, &config, "stale-code").await.unwrap_err();
        assert!(
            matches!(
                err,
                Error::TokenExchange { status: 400, ref body } if body.contains("invalid_grant")
            ),
            "provider status and body must survive: {err}"
        );
    }

    #[tokio::test]
    async fn fetch_user_parses_profile() {
        let router = Router::new().route(
            "/api/users/sessioninfo",
            get(|| async {
                Json(serde_json::json!({
                    "id": "u-77",
                    "displayName": "Grace Tester",
                    "email": "grace@example.com"
                }))
            }),
        );
        let base = spawn_provider(router).await;
        let config = test_config(&base);

        let client = reqwest::Client::new();
        let profile = fetch_user(&client, &config, "at_token").await.unwrap();
        assert_eq!(profile.subject(), Some("u-77"));
        assert_eq!(profile.resolve_name(), Some("Grace Tester"));
    }

    #[tokio::test]
    async fn complete_authorization_recovers_correlation() {
        let router = Router::new()
            .route(
                "/oauth/token",
                post(|| async {
                    Json(serde_json::json!({
                        "access_token": "at_1",
                        "refresh_token": "rt_1",
                        "expires_in": 3600
                    }))
                }),
            )
            .route(
                "/api/users/sessioninfo",
                get(|| async {
                    Json(serde_json::json!({
                        "id": "u-1",
                        "email": "only@example.com"
                    }))
                }),
            );
        let base = spawn_provider(router).await;
        let config = test_config(&base);

        let state = RedirectState::new(Some("d5".into()), Some("w5".into()), Some("e5".into()));
        let encoded = state.encode();

        let client = reqwest::Client::new();
        let (claims, correlation) =
            complete_authorization(&client, &config, "code-5", Some(&encoded))
                .await
                .unwrap();

        assert_eq!(correlation, state);
        assert_eq!(claims.access_token, "at_1");
        assert_eq!(claims.sub.as_deref(), Some("u-1"));
        // profile had no display name: email is the resolved name
        assert_eq!(claims.name.as_deref(), Some("only@example.com"));
    }

    #[tokio::test]
    async fn complete_authorization_fails_open_on_bad_state() {
        let router = Router::new()
            .route(
                "/oauth/token",
                post(|| async {
                    Json(serde_json::json!({"access_token": "at_2"}))
                }),
            )
            .route(
                "/api/users/sessioninfo",
                get(|| async { Json(serde_json::json!({"id": "u-2"})) }),
            );
        let base = spawn_provider(router).await;
        let config = test_config(&base);

        let client = reqwest::Client::new();
        let (_, correlation) =
            complete_authorization(&client, &config, "code-2", Some("%%%garbage%%%"))
                .await
                .unwrap();
        assert_eq!(correlation, RedirectState::default());

        let (_, missing) = complete_authorization(&client, &config, "code-2", None)
            .await
            .unwrap();
        assert_eq!(missing, RedirectState::default());
    }
}
