//! HTTP client for the provider's translation API
//!
//! Thin layer over `reqwest`: each method performs one API call and maps
//! the raw response to a [`JobEvent`](crate::job::JobEvent) or an error.
//! Transition decisions live in [`job`](crate::job), not here.

use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::job::{JobEvent, StatusReport};

/// The element a job exports, addressed the way the provider's URLs are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTarget {
    pub document_id: String,
    pub workspace_id: String,
    pub element_id: String,
}

/// Which of the provider's two export entry points to use.
///
/// Both produce a STEP artifact retrievable through the external-data
/// endpoint; they differ in submit route, request body, and how fast their
/// jobs are worth re-checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    /// General translation endpoint, used for model checks
    Translation,
    /// Assembly-specific STEP export
    AssemblyStep,
}

impl ExportKind {
    /// Delay between consecutive status checks.
    pub fn poll_delay(self) -> Duration {
        match self {
            ExportKind::Translation => Duration::from_millis(500),
            ExportKind::AssemblyStep => Duration::from_millis(1000),
        }
    }

    fn submit_path(self, target: &ExportTarget) -> String {
        let ExportTarget {
            document_id,
            workspace_id,
            element_id,
        } = target;
        match self {
            ExportKind::Translation => {
                format!("/documents/d/{document_id}/w/{workspace_id}/e/{element_id}/translations")
            }
            ExportKind::AssemblyStep => {
                format!("/assemblies/d/{document_id}/w/{workspace_id}/e/{element_id}/export/step")
            }
        }
    }

    fn submit_body(self) -> serde_json::Value {
        match self {
            ExportKind::Translation => json!({
                "formatName": "STEP",
                "storeInDocument": false,
                "flattenAssemblies": false,
                "configuration": "default",
            }),
            ExportKind::AssemblyStep => json!({
                "stepUnit": "METER",
                "stepVersionString": "AP242",
                "storeInDocument": false,
                "notifyUser": false,
            }),
        }
    }
}

/// Address of a finished job's result artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocator {
    pub document_id: String,
    pub external_id: String,
}

impl ArtifactLocator {
    pub fn path(&self) -> String {
        format!(
            "/documents/d/{}/externaldata/{}",
            self.document_id, self.external_id
        )
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: Option<String>,
}

/// Client for submit, status, and artifact calls against one API base.
#[derive(Clone)]
pub struct ExportClient {
    http: reqwest::Client,
    api_base: String,
}

impl ExportClient {
    pub fn new(http: reqwest::Client, api_base: impl Into<String>) -> Self {
        let mut api_base = api_base.into();
        while api_base.ends_with('/') {
            api_base.pop();
        }
        Self { http, api_base }
    }

    /// Submit a new export job for `target`.
    ///
    /// A 2xx response must carry a job id; a 2xx without one is an invalid
    /// response, not a rejection. Non-success statuses become
    /// `SubmitRejected` so the state machine records what the provider said.
    pub async fn submit(
        &self,
        kind: ExportKind,
        target: &ExportTarget,
        access_token: &str,
    ) -> Result<JobEvent> {
        let url = format!("{}{}", self.api_base, kind.submit_path(target));
        debug!(%url, ?kind, "submitting export job");

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&kind.submit_body())
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Ok(JobEvent::SubmitRejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SubmitResponse = response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;
        match parsed.id {
            Some(job_id) => Ok(JobEvent::SubmitAccepted { job_id }),
            None => Err(Error::InvalidResponse(String::from(
                "submit response has no job id",
            ))),
        }
    }

    /// Check the status of a submitted job.
    pub async fn status(&self, job_id: &str, access_token: &str) -> Result<JobEvent> {
        let url = format!("{}/translations/{job_id}", self.api_base);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            debug!(%job_id, status = status.as_u16(), "status check unavailable");
            return Ok(JobEvent::StatusUnavailable {
                status: status.as_u16(),
            });
        }

        let report: StatusReport = response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;
        Ok(JobEvent::StatusReport(report))
    }

    /// Absolute download URL for an artifact, suitable for handing to a
    /// client that will fetch it through this gateway's credentials.
    pub fn artifact_url(&self, locator: &ArtifactLocator) -> String {
        format!("{}{}", self.api_base, locator.path())
    }

    /// Fetch a result artifact. Returns the raw response so the caller can
    /// stream the body without buffering it.
    pub async fn fetch_artifact(
        &self,
        locator: &ArtifactLocator,
        access_token: &str,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.api_base, locator.path());
        debug!(%url, "fetching artifact");

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Download {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}
