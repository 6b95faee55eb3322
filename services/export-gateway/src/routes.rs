//! HTTP routes: OAuth flow, session endpoints, exports, passthrough

use axum::body::Body;
use axum::extract::{Path, Query, RawQuery, State};
use axum::http::StatusCode;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE, LOCATION};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use compliance::{Rule, RuleEvaluator};
use common::Secret;
use metrics_exporter_prometheus::PrometheusHandle;
use onshape_auth::{OAuthConfig, RedirectState};
use onshape_export::{ArtifactLocator, ExportClient, ExportKind, ExportTarget};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::GatewayError;
use crate::extract::{AUTH_COOKIE, SessionUser};
use crate::metrics::{record_export, record_upstream_error};

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    pub http: reqwest::Client,
    pub oauth: OAuthConfig,
    pub session_secret: Secret<String>,
    pub session_ttl: Duration,
    pub secure_cookies: bool,
    pub export: ExportClient,
    pub evaluator: Arc<dyn RuleEvaluator>,
    pub prometheus: PrometheusHandle,
}

/// Build the axum router with all routes and shared state.
///
/// Applies the request-tracking middleware and a concurrency limit layer
/// based on `max_connections`.
pub fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/oauth/signin", get(signin))
        .route("/oauth/callback", get(callback))
        .route("/user", get(current_user))
        .route("/logout", post(logout))
        .route("/export/check-model", post(check_model))
        .route("/export/download", get(download_step))
        .route("/onshape/{*path}", get(onshape_passthrough))
        .route("/health", get(health))
        .route("/metrics", get(metrics_exposition))
        .layer(axum::middleware::from_fn(crate::metrics::track_requests))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct SigninParams {
    #[serde(rename = "documentId")]
    document_id: Option<String>,
    #[serde(rename = "workspaceId")]
    workspace_id: Option<String>,
    #[serde(rename = "elementId")]
    element_id: Option<String>,
}

/// Begin the OAuth flow: 302 to the provider's authorize URL with the
/// panel's document context folded into the `state` parameter.
async fn signin(
    State(state): State<AppState>,
    Query(params): Query<SigninParams>,
) -> Result<Response, GatewayError> {
    let correlation =
        RedirectState::new(params.document_id, params.workspace_id, params.element_id);
    let authorize_url = onshape_auth::build_authorization_url(&state.oauth, &correlation)?;
    debug!("redirecting to provider authorize URL");
    Ok(found(&authorize_url))
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Complete the OAuth flow: exchange the grant code, issue the session
/// credential cookie, and send the browser back to the panel with its
/// document context restored.
///
/// A callback carrying `error` (or arriving without a code at all) means
/// the user declined the grant.
async fn callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(CookieJar, Response), GatewayError> {
    if let Some(error) = params.error {
        warn!(%error, "authorization grant denied");
        return Err(GatewayError::AccessDenied);
    }
    let Some(code) = params.code else {
        warn!("callback arrived without a grant code");
        return Err(GatewayError::AccessDenied);
    };

    let (claims, correlation) = onshape_auth::complete_authorization(
        &state.http,
        &state.oauth,
        &code,
        params.state.as_deref(),
    )
    .await
    .map_err(|err| {
        record_auth_failure(&err);
        GatewayError::from(err)
    })?;

    let ttl = state.session_ttl.min(onshape_auth::MAX_SESSION_TTL);
    let envelope = onshape_auth::issue(&claims, state.session_secret.expose().as_bytes(), ttl)?;
    let jar = jar.add(session_cookie(&state, envelope));

    let target = format!(
        "/?documentId={}&workspaceId={}&elementId={}",
        correlation.document_id.as_deref().unwrap_or(""),
        correlation.workspace_id.as_deref().unwrap_or(""),
        correlation.element_id.as_deref().unwrap_or("")
    );
    Ok((jar, found(&target)))
}

/// Current user's derived identity. The display name falls back through
/// email and subject so a sparse provider profile still yields something
/// the panel can render.
async fn current_user(SessionUser(claims): SessionUser) -> Json<serde_json::Value> {
    let name = [
        claims.name.as_deref(),
        claims.email.as_deref(),
        claims.sub.as_deref(),
    ]
    .into_iter()
    .flatten()
    .find(|value| !value.is_empty());

    Json(json!({
        "user": {
            "name": name,
            "email": claims.email,
            "id": claims.sub,
        }
    }))
}

/// Instruct the browser to discard the credential. The envelope itself
/// stays valid until it expires; there is no server-side revocation list.
async fn logout(jar: CookieJar) -> (CookieJar, Json<serde_json::Value>) {
    let jar = jar.remove(Cookie::build(AUTH_COOKIE).path("/"));
    (jar, Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
struct CheckModelRequest {
    #[serde(rename = "documentId")]
    document_id: Option<String>,
    #[serde(rename = "workspaceId")]
    workspace_id: Option<String>,
    #[serde(rename = "elementId")]
    element_id: Option<String>,
    #[serde(default)]
    rules: Vec<Rule>,
}

/// Run a part-studio STEP translation for the given element, then evaluate
/// the caller's enabled rules against the finished artifact.
async fn check_model(
    State(state): State<AppState>,
    SessionUser(claims): SessionUser,
    Json(request): Json<CheckModelRequest>,
) -> Result<Json<serde_json::Value>, GatewayError> {
    let target = export_target(
        request.document_id,
        request.workspace_id,
        request.element_id,
        "Missing required parameters (documentId, workspaceId, elementId).",
    )?;
    let enabled: Vec<Rule> = request.rules.into_iter().filter(|rule| rule.enabled).collect();

    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    info!(
        %request_id,
        document_id = %target.document_id,
        workspace_id = %target.workspace_id,
        element_id = %target.element_id,
        rules = enabled.len(),
        "check-model export requested"
    );

    let locator = run_tracked_export(&state, ExportKind::Translation, &target, &claims.access_token)
        .await
        .map_err(check_model_error)?;
    let download_url = state.export.artifact_url(&locator);

    let violations = state
        .evaluator
        .evaluate(&download_url, &enabled)
        .await
        .map_err(|err| GatewayError::Internal(format!("rule evaluation failed: {err}")))?;
    info!(
        %request_id,
        evaluator = state.evaluator.id(),
        violations = violations.len(),
        "check-model export complete"
    );

    Ok(Json(json!({
        "success": true,
        "downloadUrl": download_url,
        "violations": violations,
    })))
}

/// This route's historical parameter names differ from check-model's.
#[derive(Debug, Deserialize)]
struct DownloadParams {
    #[serde(rename = "docId")]
    doc_id: Option<String>,
    #[serde(rename = "workId")]
    work_id: Option<String>,
    #[serde(rename = "elId")]
    el_id: Option<String>,
}

/// Run an assembly STEP export and stream the finished artifact back as a
/// file attachment. The upstream's declared content type wins; absent one,
/// STEP's own media type is used.
async fn download_step(
    State(state): State<AppState>,
    SessionUser(claims): SessionUser,
    Query(params): Query<DownloadParams>,
) -> Result<Response, GatewayError> {
    let target = export_target(
        params.doc_id,
        params.work_id,
        params.el_id,
        "Missing required parameters (docId, workId, elId).",
    )?;

    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    info!(
        %request_id,
        document_id = %target.document_id,
        workspace_id = %target.workspace_id,
        element_id = %target.element_id,
        "assembly export requested"
    );

    let locator = run_tracked_export(
        &state,
        ExportKind::AssemblyStep,
        &target,
        &claims.access_token,
    )
    .await
    .map_err(download_error)?;

    let upstream = state
        .export
        .fetch_artifact(&locator, &claims.access_token)
        .await
        .map_err(|err| {
            record_export_failure(&err);
            download_error(err)
        })?;

    let content_type = upstream
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("application/step")
        .to_owned();
    debug!(%request_id, %content_type, "streaming artifact to client");

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type)
        .header(CONTENT_DISPOSITION, "attachment; filename=\"model.step\"")
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|err| GatewayError::Internal(err.to_string()))?;
    Ok(response)
}

/// Authenticated passthrough for light document-metadata reads. Forwards
/// the caller's query string and access token, relays the upstream status
/// and JSON body verbatim.
async fn onshape_passthrough(
    State(state): State<AppState>,
    SessionUser(claims): SessionUser,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Response, GatewayError> {
    let mut url = format!("{}/{}", state.oauth.api_base_url, path);
    if let Some(query) = query {
        url.push('?');
        url.push_str(&query);
    }
    debug!(%path, "document API passthrough");

    let upstream = state
        .http
        .get(&url)
        .bearer_auth(&claims.access_token)
        .send()
        .await
        .map_err(|err| passthrough_failure(&err))?;

    let status = upstream.status();
    let body = upstream
        .bytes()
        .await
        .map_err(|err| passthrough_failure(&err))?;

    let response = Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .map_err(|err| GatewayError::Internal(err.to_string()))?;
    Ok(response)
}

/// Liveness probe
async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Prometheus metrics endpoint — returns metrics in text exposition format.
async fn metrics_exposition(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.prometheus.render(),
    )
}

/// 302 with a Location header. axum's `Redirect` offers 303/307/308; the
/// provider flow and the panel both expect a plain 302.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_owned())]).into_response()
}

/// Session cookie: HTTP-only, path `/`, max-age = clamped TTL. Cross-site
/// embedding needs `SameSite=None; Secure`; without TLS the cookie falls
/// back to `Lax` so plain-HTTP development setups still work.
fn session_cookie(state: &AppState, envelope: String) -> Cookie<'static> {
    let max_age = state.session_ttl.min(onshape_auth::MAX_SESSION_TTL);
    let builder = Cookie::build((AUTH_COOKIE, envelope))
        .http_only(true)
        .path("/")
        .max_age(time::Duration::seconds(max_age.as_secs() as i64));
    if state.secure_cookies {
        builder.secure(true).same_site(SameSite::None).build()
    } else {
        builder.same_site(SameSite::Lax).build()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Collapse the three optional identifiers into a target, treating absent
/// and empty values the same way.
fn export_target(
    document_id: Option<String>,
    workspace_id: Option<String>,
    element_id: Option<String>,
    message: &str,
) -> Result<ExportTarget, GatewayError> {
    match (
        non_empty(document_id),
        non_empty(workspace_id),
        non_empty(element_id),
    ) {
        (Some(document_id), Some(workspace_id), Some(element_id)) => Ok(ExportTarget {
            document_id,
            workspace_id,
            element_id,
        }),
        _ => Err(GatewayError::Validation(message.to_owned())),
    }
}

fn flavor_label(kind: ExportKind) -> &'static str {
    match kind {
        ExportKind::Translation => "translation",
        ExportKind::AssemblyStep => "assembly_step",
    }
}

/// Run one export and record its outcome and duration metrics.
async fn run_tracked_export(
    state: &AppState,
    kind: ExportKind,
    target: &ExportTarget,
    access_token: &str,
) -> Result<ArtifactLocator, onshape_export::Error> {
    let started = Instant::now();
    let result = onshape_export::run_export(&state.export, kind, target, access_token).await;

    let outcome = match &result {
        Ok(_) => "done",
        Err(onshape_export::Error::TimedOut { .. }) => "timed_out",
        Err(_) => "failed",
    };
    record_export(flavor_label(kind), outcome, started.elapsed().as_secs_f64());
    if let Err(err) = &result {
        record_export_failure(err);
    }
    result
}

fn record_export_failure(err: &onshape_export::Error) {
    match err {
        onshape_export::Error::Submit { .. } => record_upstream_error("submit"),
        onshape_export::Error::Download { .. } => record_upstream_error("download"),
        onshape_export::Error::Http(_) | onshape_export::Error::InvalidResponse(_) => {
            record_upstream_error("http")
        }
        _ => {}
    }
}

fn record_auth_failure(err: &onshape_auth::Error) {
    match err {
        onshape_auth::Error::TokenExchange { .. } => record_upstream_error("token_exchange"),
        onshape_auth::Error::UserInfo { .. } => record_upstream_error("user_info"),
        onshape_auth::Error::Http(_) | onshape_auth::Error::InvalidResponse(_) => {
            record_upstream_error("http")
        }
        _ => {}
    }
}

fn passthrough_failure(err: &reqwest::Error) -> GatewayError {
    record_upstream_error("passthrough");
    GatewayError::Upstream {
        status: StatusCode::BAD_GATEWAY,
        message: format!("HTTP request failed: {err}"),
    }
}

/// Error rendering for the check-model route. Submission rejections keep
/// the provider's status; terminal job failures are gateway faults with the
/// panel's historical messages.
fn check_model_error(err: onshape_export::Error) -> GatewayError {
    match err {
        onshape_export::Error::Submit { status, body } => GatewayError::Upstream {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
            message: format!("Failed to start translation: {body}"),
        },
        onshape_export::Error::JobFailed(reason) => {
            GatewayError::Internal(format!("Translation failed: {reason}"))
        }
        onshape_export::Error::TimedOut { .. } => {
            GatewayError::Internal(String::from("Translation timed out"))
        }
        onshape_export::Error::MissingArtifact => GatewayError::Internal(String::from(
            "No external data ID found in translation result.",
        )),
        other => GatewayError::Upstream {
            status: StatusCode::BAD_GATEWAY,
            message: other.to_string(),
        },
    }
}

/// Error rendering for the download route: same upstream propagation, with
/// this route's own timeout message.
fn download_error(err: onshape_export::Error) -> GatewayError {
    match err {
        onshape_export::Error::Submit { status, body }
        | onshape_export::Error::Download { status, body } => GatewayError::Upstream {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
            message: body,
        },
        onshape_export::Error::JobFailed(reason) => {
            GatewayError::Internal(format!("Translation failed: {reason}"))
        }
        onshape_export::Error::TimedOut { .. } => {
            GatewayError::Internal(String::from("STEP export timed out."))
        }
        onshape_export::Error::MissingArtifact => GatewayError::Internal(String::from(
            "No external data ID found in translation result.",
        )),
        other => GatewayError::Upstream {
            status: StatusCode::BAD_GATEWAY,
            message: other.to_string(),
        },
    }
}
