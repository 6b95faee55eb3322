//! No-op evaluator — accepts every model.
//!
//! Stands in for the unwritten compliance engine so the check-model route
//! has a complete response shape today. Reports zero violations regardless
//! of input; swapping in a real engine is a construction-time change in the
//! gateway, not an interface change.

use crate::{Rule, RuleEvaluator, Violation};
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

/// Evaluator that never reports a violation.
#[derive(Debug, Default)]
pub struct NoopEvaluator;

impl RuleEvaluator for NoopEvaluator {
    fn id(&self) -> &str {
        "noop"
    }

    fn evaluate<'a>(
        &'a self,
        artifact_url: &'a str,
        rules: &'a [Rule],
    ) -> Pin<Box<dyn Future<Output = crate::Result<Vec<Violation>>> + Send + 'a>> {
        Box::pin(async move {
            debug!(
                artifact = %artifact_url,
                rule_count = rules.len(),
                "noop evaluation, no violations reported"
            );
            Ok(Vec::new())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_no_violations_for_any_input() {
        let evaluator = NoopEvaluator;
        let rules = vec![
            Rule {
                id: 1,
                name: "Minimum Wall Thickness".into(),
                description: Some("All walls must be >= 2mm thick".into()),
                category: Some("Manufacturing".into()),
                enabled: true,
            },
            Rule {
                id: 2,
                name: "Maximum Overhang Angle".into(),
                description: None,
                category: None,
                enabled: true,
            },
        ];

        let violations = evaluator
            .evaluate("https://api.example.com/documents/d/d1/externaldata/x9", &rules)
            .await
            .unwrap();
        assert!(violations.is_empty());
    }

    #[tokio::test]
    async fn empty_rule_set_is_fine() {
        let evaluator = NoopEvaluator;
        let violations = evaluator.evaluate("https://x/artifact", &[]).await.unwrap();
        assert!(violations.is_empty());
    }

    #[test]
    fn id_is_noop() {
        assert_eq!(NoopEvaluator.id(), "noop");
    }
}
