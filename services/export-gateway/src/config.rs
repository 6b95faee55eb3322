//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The OAuth client secret and the session signing secret come from the
//! OAUTH_CLIENT_SECRET / SESSION_SECRET env vars or from *_file paths,
//! never from the TOML itself to avoid leaking secrets.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub onshape: OnshapeConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_secs: u64,
}

/// CAD provider endpoints and OAuth application settings
#[derive(Debug, Deserialize)]
pub struct OnshapeConfig {
    pub client_id: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// Path to a file containing the client secret (alternative to the
    /// OAUTH_CLIENT_SECRET env var)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    pub oauth_base_url: String,
    pub api_base_url: String,
    pub callback_url: String,
    #[serde(default = "default_scope")]
    pub scope: String,
}

/// Session credential settings
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(skip)]
    pub secret: Option<Secret<String>>,
    /// Path to a file containing the signing secret (alternative to the
    /// SESSION_SECRET env var)
    #[serde(default)]
    pub secret_file: Option<PathBuf>,
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,
    /// Marks the session cookie Secure and SameSite=None. Leave off for
    /// plain-HTTP local development.
    #[serde(default)]
    pub secure_cookies: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: None,
            secret_file: None,
            ttl_secs: default_session_ttl(),
            secure_cookies: false,
        }
    }
}

fn default_max_connections() -> usize {
    1000
}

fn default_upstream_timeout() -> u64 {
    30
}

fn default_session_ttl() -> u64 {
    86_400
}

fn default_scope() -> String {
    String::from("OAuth2Read OAuth2ReadPII")
}

/// Resolve a secret: non-empty env var wins, then the configured file
/// (trimmed), otherwise an error naming both sources.
fn resolve_secret(
    env_var: &'static str,
    file: Option<&Path>,
    fallback: &'static str,
) -> common::Result<Secret<String>> {
    if let Ok(value) = std::env::var(env_var) {
        if !value.is_empty() {
            return Ok(Secret::new(value));
        }
    }
    if let Some(file) = file {
        let value = std::fs::read_to_string(file).map_err(|e| {
            common::Error::Config(format!("failed to read {fallback} {}: {e}", file.display()))
        })?;
        let value = value.trim().to_owned();
        if !value.is_empty() {
            return Ok(Secret::new(value));
        }
    }
    Err(common::Error::MissingSecret {
        name: env_var,
        fallback,
    })
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Fails if either secret cannot be resolved: the gateway cannot sign
    /// sessions or exchange authorization codes without them.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if config.onshape.client_id.is_empty() {
            return Err(common::Error::Config("client_id must not be empty".into()));
        }

        for (name, value) in [
            ("oauth_base_url", &config.onshape.oauth_base_url),
            ("api_base_url", &config.onshape.api_base_url),
            ("callback_url", &config.onshape.callback_url),
        ] {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{name} must start with http:// or https://, got: {value}"
                )));
            }
        }

        if config.server.upstream_timeout_secs == 0 {
            return Err(common::Error::Config(
                "upstream_timeout_secs must be greater than 0".into(),
            ));
        }

        if config.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        if config.session.ttl_secs == 0 {
            return Err(common::Error::Config(
                "ttl_secs must be greater than 0".into(),
            ));
        }

        // Base URLs are joined with path fragments downstream; keep them
        // canonical without a trailing slash.
        let len = config.onshape.oauth_base_url.trim_end_matches('/').len();
        config.onshape.oauth_base_url.truncate(len);
        let len = config.onshape.api_base_url.trim_end_matches('/').len();
        config.onshape.api_base_url.truncate(len);

        config.onshape.client_secret = Some(resolve_secret(
            "OAUTH_CLIENT_SECRET",
            config.onshape.client_secret_file.as_deref(),
            "onshape.client_secret_file",
        )?);
        config.session.secret = Some(resolve_secret(
            "SESSION_SECRET",
            config.session.secret_file.as_deref(),
            "session.secret_file",
        )?);

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("export-gateway.toml")
    }
}
