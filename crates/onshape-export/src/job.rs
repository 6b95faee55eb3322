//! Export job state machine
//!
//! Pure state machine: `advance` receives the current phase and an observed
//! event and returns the next phase. No I/O; the poller executes the API
//! calls and feeds their outcomes in as events, so every transition can be
//! tested against canned responses.
//!
//! Phases move strictly forward: `Submitting → Polling → {Done, Failed,
//! TimedOut}`. Terminal phases absorb every further event.

use serde::Deserialize;

use crate::error::Error;

/// Where a job stands, as this orchestrator last observed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobPhase {
    /// Submit request not yet answered
    Submitting,
    /// Job accepted; `attempt` counts status checks performed so far
    Polling { job_id: String, attempt: u32 },
    /// Terminal: completed with a result artifact
    Done { artifact_id: String },
    /// Terminal: rejected at submit or reported failed by the provider
    Failed { failure: JobFailure },
    /// Terminal: attempt budget exhausted; the provider-side job may still
    /// be running, unobserved
    TimedOut { attempts: u32 },
}

impl JobPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobPhase::Done { .. } | JobPhase::Failed { .. } | JobPhase::TimedOut { .. }
        )
    }
}

/// Why a job ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobFailure {
    /// The submit call returned a non-success status
    Rejected { status: u16, body: String },
    /// The provider's status payload reported failure; `reason` is its
    /// failure reason, untouched
    Reported { reason: String },
    /// The status payload reported completion with an empty artifact list
    MissingArtifact,
}

impl JobFailure {
    /// Convert to the error the poller returns for this terminal phase.
    pub fn into_error(self) -> Error {
        match self {
            JobFailure::Rejected { status, body } => Error::Submit { status, body },
            JobFailure::Reported { reason } => Error::JobFailed(reason),
            JobFailure::MissingArtifact => Error::MissingArtifact,
        }
    }
}

/// Observations that drive transitions. Produced by `ExportClient` from raw
/// API responses.
#[derive(Debug, Clone)]
pub enum JobEvent {
    /// Submit returned 2xx with a job identifier
    SubmitAccepted { job_id: String },
    /// Submit returned a non-success status
    SubmitRejected { status: u16, body: String },
    /// A status check returned a parsed report
    StatusReport(StatusReport),
    /// A status check returned a non-success status. Counts against the
    /// attempt budget but does not end the job: a blip in the status
    /// endpoint is not a verdict about the job itself.
    StatusUnavailable { status: u16 },
}

/// Provider status payload for one job.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusReport {
    #[serde(rename = "requestState", default)]
    pub request_state: RequestState,

    /// Identifiers of the result artifacts, present once the job is done
    #[serde(rename = "resultExternalDataIds", default)]
    pub result_external_data_ids: Vec<String>,

    #[serde(rename = "failureReason", default)]
    pub failure_reason: Option<String>,
}

/// Provider-reported job state. Anything unrecognized means the job is
/// still in progress, which is also what a missing field means.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestState {
    #[default]
    Active,
    Done,
    Failed,
    #[serde(other)]
    Unknown,
}

/// Handle a state transition. Pure function: no I/O, no clock.
///
/// `max_attempts` is the poll budget; the status check that takes the
/// attempt count to the budget without a terminal report yields `TimedOut`.
pub fn advance(phase: JobPhase, event: JobEvent, max_attempts: u32) -> JobPhase {
    match (phase, event) {
        // --- Submitting ---
        (JobPhase::Submitting, JobEvent::SubmitAccepted { job_id }) => JobPhase::Polling {
            job_id,
            attempt: 0,
        },

        (JobPhase::Submitting, JobEvent::SubmitRejected { status, body }) => JobPhase::Failed {
            failure: JobFailure::Rejected { status, body },
        },

        // --- Polling ---
        (JobPhase::Polling { job_id, attempt }, JobEvent::StatusReport(report)) => {
            match report.request_state {
                RequestState::Done => match report.result_external_data_ids.into_iter().next() {
                    Some(artifact_id) => JobPhase::Done { artifact_id },
                    None => JobPhase::Failed {
                        failure: JobFailure::MissingArtifact,
                    },
                },
                RequestState::Failed => JobPhase::Failed {
                    failure: JobFailure::Reported {
                        reason: report
                            .failure_reason
                            .unwrap_or_else(|| String::from("unknown")),
                    },
                },
                RequestState::Active | RequestState::Unknown => {
                    next_poll(job_id, attempt, max_attempts)
                }
            }
        }

        (JobPhase::Polling { job_id, attempt }, JobEvent::StatusUnavailable { .. }) => {
            next_poll(job_id, attempt, max_attempts)
        }

        // --- Terminal phases absorb everything ---
        (phase @ (JobPhase::Done { .. } | JobPhase::Failed { .. } | JobPhase::TimedOut { .. }), _) => {
            phase
        }

        // --- Invalid pairing: stay in the current phase ---
        (phase, _) => phase,
    }
}

fn next_poll(job_id: String, attempt: u32, max_attempts: u32) -> JobPhase {
    let attempt = attempt + 1;
    if attempt >= max_attempts {
        JobPhase::TimedOut { attempts: attempt }
    } else {
        JobPhase::Polling { job_id, attempt }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUDGET: u32 = 20;

    fn polling(attempt: u32) -> JobPhase {
        JobPhase::Polling {
            job_id: "tr-1".into(),
            attempt,
        }
    }

    fn report(state: RequestState) -> StatusReport {
        StatusReport {
            request_state: state,
            result_external_data_ids: Vec::new(),
            failure_reason: None,
        }
    }

    #[test]
    fn submit_accepted_starts_polling_at_zero() {
        let phase = advance(
            JobPhase::Submitting,
            JobEvent::SubmitAccepted { job_id: "tr-9".into() },
            BUDGET,
        );
        assert!(matches!(
            phase,
            JobPhase::Polling { ref job_id, attempt: 0 } if job_id == "tr-9"
        ));
    }

    #[test]
    fn submit_rejection_is_terminal_failure() {
        let phase = advance(
            JobPhase::Submitting,
            JobEvent::SubmitRejected {
                status: 403,
                body: "insufficient scope".into(),
            },
            BUDGET,
        );
        assert!(matches!(
            phase,
            JobPhase::Failed {
                failure: JobFailure::Rejected { status: 403, .. }
            }
        ));
    }

    #[test]
    fn done_report_selects_first_artifact() {
        let report = StatusReport {
            request_state: RequestState::Done,
            result_external_data_ids: vec!["ext-a".into(), "ext-b".into()],
            failure_reason: None,
        };
        let phase = advance(polling(3), JobEvent::StatusReport(report), BUDGET);
        assert_eq!(
            phase,
            JobPhase::Done {
                artifact_id: "ext-a".into()
            }
        );
    }

    #[test]
    fn done_report_without_artifacts_fails() {
        let phase = advance(
            polling(0),
            JobEvent::StatusReport(report(RequestState::Done)),
            BUDGET,
        );
        assert_eq!(
            phase,
            JobPhase::Failed {
                failure: JobFailure::MissingArtifact
            }
        );
    }

    #[test]
    fn failed_report_carries_provider_reason_verbatim() {
        let report = StatusReport {
            request_state: RequestState::Failed,
            result_external_data_ids: Vec::new(),
            failure_reason: Some("Element is not exportable".into()),
        };
        let phase = advance(polling(5), JobEvent::StatusReport(report), BUDGET);
        assert_eq!(
            phase,
            JobPhase::Failed {
                failure: JobFailure::Reported {
                    reason: "Element is not exportable".into()
                }
            }
        );
    }

    #[test]
    fn failed_report_without_reason_reads_unknown() {
        let phase = advance(
            polling(0),
            JobEvent::StatusReport(report(RequestState::Failed)),
            BUDGET,
        );
        assert!(matches!(
            phase,
            JobPhase::Failed {
                failure: JobFailure::Reported { ref reason }
            } if reason == "unknown"
        ));
    }

    #[test]
    fn active_report_increments_attempt() {
        let phase = advance(
            polling(4),
            JobEvent::StatusReport(report(RequestState::Active)),
            BUDGET,
        );
        assert!(matches!(phase, JobPhase::Polling { attempt: 5, .. }));
    }

    #[test]
    fn unknown_state_keeps_polling() {
        let phase = advance(
            polling(0),
            JobEvent::StatusReport(report(RequestState::Unknown)),
            BUDGET,
        );
        assert!(matches!(phase, JobPhase::Polling { attempt: 1, .. }));
    }

    #[test]
    fn status_blip_counts_against_budget_but_does_not_fail() {
        let phase = advance(polling(7), JobEvent::StatusUnavailable { status: 502 }, BUDGET);
        assert!(matches!(phase, JobPhase::Polling { attempt: 8, .. }));
    }

    #[test]
    fn budget_exhaustion_times_out() {
        let phase = advance(
            polling(BUDGET - 1),
            JobEvent::StatusReport(report(RequestState::Active)),
            BUDGET,
        );
        assert_eq!(phase, JobPhase::TimedOut { attempts: BUDGET });
    }

    #[test]
    fn attempt_budget_is_exact() {
        // Walk the full budget: 19 non-terminal reports keep polling, the
        // 20th times out
        let mut phase = advance(
            JobPhase::Submitting,
            JobEvent::SubmitAccepted { job_id: "tr-1".into() },
            BUDGET,
        );
        for expected_attempt in 1..BUDGET {
            phase = advance(
                phase,
                JobEvent::StatusReport(report(RequestState::Active)),
                BUDGET,
            );
            assert!(
                matches!(phase, JobPhase::Polling { attempt, .. } if attempt == expected_attempt),
                "after {expected_attempt} checks: {phase:?}"
            );
        }
        phase = advance(
            phase,
            JobEvent::StatusReport(report(RequestState::Active)),
            BUDGET,
        );
        assert_eq!(phase, JobPhase::TimedOut { attempts: BUDGET });
    }

    #[test]
    fn terminal_phases_absorb_later_events() {
        let done = JobPhase::Done {
            artifact_id: "ext-1".into(),
        };
        let still_done = advance(
            done.clone(),
            JobEvent::StatusReport(report(RequestState::Failed)),
            BUDGET,
        );
        assert_eq!(still_done, done);

        let timed_out = JobPhase::TimedOut { attempts: 20 };
        let still_out = advance(
            timed_out.clone(),
            JobEvent::StatusReport(StatusReport {
                request_state: RequestState::Done,
                result_external_data_ids: vec!["late".into()],
                failure_reason: None,
            }),
            BUDGET,
        );
        assert_eq!(still_out, timed_out);
    }

    #[test]
    fn status_report_deserializes_provider_payload() {
        let json = r#"{
            "requestState": "DONE",
            "resultExternalDataIds": ["ext-123"],
            "name": "translation",
            "id": "tr-55"
        }"#;
        let report: StatusReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.request_state, RequestState::Done);
        assert_eq!(report.result_external_data_ids, vec!["ext-123".to_string()]);
    }

    #[test]
    fn missing_request_state_means_active() {
        let report: StatusReport = serde_json::from_str("{}").unwrap();
        assert_eq!(report.request_state, RequestState::Active);
    }

    #[test]
    fn novel_request_state_is_unknown() {
        let report: StatusReport =
            serde_json::from_str(r#"{"requestState": "QUEUED_MAYBE"}"#).unwrap();
        assert_eq!(report.request_state, RequestState::Unknown);
    }
}
