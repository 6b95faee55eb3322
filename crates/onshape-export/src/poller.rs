//! Create-then-poll driver
//!
//! Owns the I/O side of an export job: submit once, then sleep and check
//! status until the state machine reaches a terminal phase. The attempt
//! budget lives in the machine; this loop only executes what the current
//! phase calls for.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::client::{ArtifactLocator, ExportClient, ExportKind, ExportTarget};
use crate::error::{Error, Result};
use crate::job::{JobPhase, advance};

/// Status checks per job before giving up.
pub const MAX_POLL_ATTEMPTS: u32 = 20;

/// Poll cadence and budget for one job run.
#[derive(Debug, Clone, Copy)]
pub struct PollSchedule {
    pub delay: Duration,
    pub max_attempts: u32,
}

impl PollSchedule {
    pub fn for_kind(kind: ExportKind) -> Self {
        Self {
            delay: kind.poll_delay(),
            max_attempts: MAX_POLL_ATTEMPTS,
        }
    }
}

/// Run one export job to completion with the standard schedule for `kind`.
pub async fn run_export(
    client: &ExportClient,
    kind: ExportKind,
    target: &ExportTarget,
    access_token: &str,
) -> Result<ArtifactLocator> {
    run_export_with_schedule(client, kind, target, access_token, PollSchedule::for_kind(kind)).await
}

/// Same as [`run_export`] with an explicit schedule. Tests shrink the delay.
pub async fn run_export_with_schedule(
    client: &ExportClient,
    kind: ExportKind,
    target: &ExportTarget,
    access_token: &str,
    schedule: PollSchedule,
) -> Result<ArtifactLocator> {
    let event = client.submit(kind, target, access_token).await?;
    let mut phase = advance(JobPhase::Submitting, event, schedule.max_attempts);
    let mut checks: u32 = 0;

    let outcome = loop {
        match phase {
            JobPhase::Polling { job_id, attempt } => {
                tokio::time::sleep(schedule.delay).await;
                let event = client.status(&job_id, access_token).await?;
                checks += 1;
                debug!(%job_id, attempt, ?event, "status check");
                phase = advance(JobPhase::Polling { job_id, attempt }, event, schedule.max_attempts);
            }
            terminal => break terminal,
        }
    };
    metrics::histogram!("export_poll_attempts").record(f64::from(checks));

    match outcome {
        JobPhase::Done { artifact_id } => {
            info!(%artifact_id, checks, "export job completed");
            Ok(ArtifactLocator {
                document_id: target.document_id.clone(),
                external_id: artifact_id,
            })
        }
        JobPhase::Failed { failure } => {
            warn!(?failure, "export job failed");
            Err(failure.into_error())
        }
        JobPhase::TimedOut { attempts } => {
            warn!(attempts, "export job timed out");
            Err(Error::TimedOut { attempts })
        }
        JobPhase::Submitting | JobPhase::Polling { .. } => Err(Error::InvalidResponse(
            String::from("submit produced no job transition"),
        )),
    }
}
