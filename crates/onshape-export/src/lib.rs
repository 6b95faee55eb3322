//! Asynchronous export jobs against the CAD provider's document API
//!
//! The provider's export model is create-then-poll: submitting a translation
//! returns a job identifier, and the job's status endpoint must be polled
//! until it reports a terminal state. This crate drives that workflow:
//!
//! 1. `client::ExportClient` issues the raw API calls (submit, status,
//!    artifact download) and turns responses into `job::JobEvent`s
//! 2. `job::advance` is the pure state machine: given the current phase and
//!    an observed event it returns the next phase, with no I/O — every
//!    transition is unit-testable against canned responses
//! 3. `poller::run_export` is the async driver: it sleeps the flavor's poll
//!    cadence between status checks and stops at the first terminal phase
//!
//! A job ends in exactly one of three ways: `DONE` with an artifact locator,
//! `FAILED` with the provider's reason, or `TIMED_OUT` when the 20-attempt
//! budget runs out. Nothing is tracked locally across requests; re-running
//! an export always starts a fresh provider-side job.

pub mod client;
pub mod error;
pub mod job;
pub mod poller;

pub use client::{ArtifactLocator, ExportClient, ExportKind, ExportTarget};
pub use error::{Error, Result};
pub use job::{JobEvent, JobFailure, JobPhase, RequestState, StatusReport, advance};
pub use poller::{MAX_POLL_ATTEMPTS, PollSchedule, run_export, run_export_with_schedule};
