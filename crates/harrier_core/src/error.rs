use crate::definition::LogDriver;
use crate::resources::ResourceKind;
use crate::validate::Backend;

use std::time::Duration;
use thiserror::Error;

/// Rejections raised while compiling a job definition.
///
/// These are always raised before any network call is made and are
/// recoverable by adjusting the input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A VCPU or MEMORY requirement is absent from the requirement set.
    #[error("Missing resource requirement: {0}")]
    MissingRequirement(ResourceKind),

    /// A value does not match any of the backend's discrete tiers.
    #[error("Invalid Fargate resource requirement {kind} value {value}: {constraint}")]
    InvalidTier {
        kind: ResourceKind,
        value: String,
        constraint: String,
    },

    /// The backend cannot provide the requested capability (e.g. GPUs on Fargate).
    #[error("Unsupported capability: {0}")]
    UnsupportedCapability(String),

    /// A requirement value could not be read as a number.
    #[error("Malformed {kind} value '{value}'")]
    MalformedValue { kind: ResourceKind, value: String },

    /// The log driver is not in the backend's allowed set.
    #[error("Log driver {driver} is not supported on {backend}")]
    UnsupportedLogDriver { driver: LogDriver, backend: Backend },

    /// The job definition name is empty, too long or contains invalid characters.
    #[error("Invalid job definition name '{0}'")]
    InvalidName(String),

    /// Retry attempts must lie within `1..=10`.
    #[error("Invalid retry attempts {0}, must be between 1 and 10")]
    InvalidRetryAttempts(u32),

    /// Attempt durations below 60 seconds are rejected by the backend.
    #[error("Invalid attempt duration {0}s, must be at least 60 seconds")]
    InvalidTimeout(u64),
}

/// Failures reported by a [`BatchApi`](crate::traits::BatchApi) implementation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BatchError {
    /// The service rejected the call or could not be reached.
    #[error("Batch API error: {0}")]
    Api(String),

    /// The requested job or definition does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The service answered, but the response was missing required fields.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The request could not be assembled for the service.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Failures of a single job launch.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Registering the job definition failed. Not retried.
    #[error("Failed to register job definition: {0}")]
    Registration(#[source] BatchError),

    /// Submitting the job failed. Not retried.
    #[error("Failed to submit job: {0}")]
    Submission(#[source] BatchError),

    /// Fetching the job status failed; the launch is aborted.
    #[error("Failed to describe job {job_id}: {source}")]
    Describe {
        job_id: String,
        #[source]
        source: BatchError,
    },

    /// The backend reported the job as `FAILED`. The reason is passed through verbatim.
    #[error("Job {job_id} failed: {reason}")]
    JobFailed { job_id: String, reason: String },

    /// The poll loop was stopped through its cancellation token.
    #[error("Stopped tracking job {job_id}: cancelled")]
    Cancelled { job_id: String },

    /// The configured wall-clock bound elapsed before a terminal status was seen.
    #[error("Stopped tracking job {job_id} after {elapsed:?}")]
    TimedOut { job_id: String, elapsed: Duration },
}

impl LaunchError {
    /// Returns `true` if the launch ended locally without a terminal backend status.
    pub fn is_aborted(&self) -> bool {
        matches!(
            self,
            LaunchError::Describe { .. } | LaunchError::Cancelled { .. } | LaunchError::TimedOut { .. }
        )
    }
}
