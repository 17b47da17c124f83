use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a submitted job as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Submitted,
    Pending,
    Runnable,
    Starting,
    Running,
    Succeeded,
    Failed,
    /// A status this crate does not know about. Treated as non-terminal.
    #[serde(untagged)]
    Unknown(String),
}

impl JobStatus {
    /// Returns `true` for `SUCCEEDED` and `FAILED`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Submitted => "SUBMITTED",
            JobStatus::Pending => "PENDING",
            JobStatus::Runnable => "RUNNABLE",
            JobStatus::Starting => "STARTING",
            JobStatus::Running => "RUNNING",
            JobStatus::Succeeded => "SUCCEEDED",
            JobStatus::Failed => "FAILED",
            JobStatus::Unknown(status) => status,
        }
    }
}

impl From<&str> for JobStatus {
    fn from(status: &str) -> Self {
        match status {
            "SUBMITTED" => JobStatus::Submitted,
            "PENDING" => JobStatus::Pending,
            "RUNNABLE" => JobStatus::Runnable,
            "STARTING" => JobStatus::Starting,
            "RUNNING" => JobStatus::Running,
            "SUCCEEDED" => JobStatus::Succeeded,
            "FAILED" => JobStatus::Failed,
            other => JobStatus::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of registering a job definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredDefinition {
    pub name: String,
    pub arn: String,
    pub revision: i32,
}

/// A request to run a job from a registered definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitJobRequest {
    pub job_name: String,
    pub job_queue: String,
    /// Name, `name:revision` or ARN of the definition.
    pub job_definition: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedJob {
    pub job_id: String,
    pub job_name: String,
}

/// A point in time snapshot of a job, as returned by `DescribeJobs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescription {
    pub job_id: String,
    pub job_name: String,
    pub status: JobStatus,
    pub status_reason: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub log_stream_name: Option<String>,
}

impl JobDescription {
    pub fn new(job_id: impl Into<String>, status: JobStatus) -> Self {
        Self {
            job_id: job_id.into(),
            job_name: String::new(),
            status,
            status_reason: None,
            created_at: None,
            started_at: None,
            stopped_at: None,
            log_stream_name: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.status_reason = Some(reason.into());
        self
    }
}

/// A submitted job, owned by the launcher for the duration of its polling loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRun {
    pub job_id: String,
    pub job_name: String,
    pub definition_arn: String,
    pub job_queue: String,
    pub status: JobStatus,
    pub status_reason: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub log_stream_name: Option<String>,
    /// Number of describe calls made so far.
    pub polls: u32,
}

impl JobRun {
    pub(crate) fn submitted(job: SubmittedJob, definition_arn: String, job_queue: String) -> Self {
        Self {
            job_id: job.job_id,
            job_name: job.job_name,
            definition_arn,
            job_queue,
            status: JobStatus::Submitted,
            status_reason: None,
            created_at: None,
            started_at: None,
            stopped_at: None,
            log_stream_name: None,
            polls: 0,
        }
    }

    pub(crate) fn refresh(&mut self, desc: JobDescription) {
        self.polls += 1;
        self.status = desc.status;
        self.status_reason = desc.status_reason;
        self.created_at = desc.created_at.or(self.created_at);
        self.started_at = desc.started_at.or(self.started_at);
        self.stopped_at = desc.stopped_at.or(self.stopped_at);
        self.log_stream_name = desc.log_stream_name.or(self.log_stream_name.take());
    }

    /// Wall-clock run time, if the backend reported start and stop times.
    pub fn run_time(&self) -> Option<chrono::Duration> {
        Some(self.stopped_at? - self.started_at?)
    }
}
