//! Rule-evaluation seam for exported models
//!
//! Defines the `RuleEvaluator` trait that decouples the gateway's check-model
//! route from whatever engine eventually inspects exported geometry.
//! `NoopEvaluator` is the shipped implementation: it accepts every model and
//! reports no violations, which matches the current state of the rule
//! catalog (descriptive entries, no executable checks). A future
//! geometry-backed engine implements the same trait without touching the
//! gateway.

pub mod noop;

pub use noop::NoopEvaluator;

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// One entry from the panel's rule catalog.
///
/// The catalog is caller-supplied data, not behavior: the gateway forwards
/// the enabled subset to the evaluator verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: i64,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default)]
    pub enabled: bool,
}

/// Severity of a reported violation, as rendered by the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

/// One finding against an exported model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub id: i64,
    /// Name of the rule that was broken
    pub rule: String,
    pub severity: Severity,
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Errors from evaluator implementations.
#[derive(Debug, thiserror::Error)]
pub enum EvaluatorError {
    #[error("artifact fetch failed: {0}")]
    Artifact(String),

    #[error("evaluation failed: {0}")]
    Evaluation(String),
}

/// Result alias for evaluator operations.
pub type Result<T> = std::result::Result<T, EvaluatorError>;

/// Abstraction over model-compliance engines.
///
/// `artifact_url` is the download address of the completed export; an
/// implementation that needs the geometry fetches it from there with its
/// own credentials. The returned violations keep the evaluator's ordering.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn RuleEvaluator>`).
pub trait RuleEvaluator: Send + Sync {
    /// Identifier for logging (e.g. "noop")
    fn id(&self) -> &str;

    /// Evaluate the exported model at `artifact_url` against `rules`.
    ///
    /// Callers pass only enabled rules; the evaluator does not re-filter.
    fn evaluate<'a>(
        &'a self,
        artifact_url: &'a str,
        rules: &'a [Rule],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Violation>>> + Send + 'a>>;
}
