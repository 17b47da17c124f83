use crate::definition::{DEFAULT_TIMEOUT_SECONDS, DefinitionOptions, LogDriver, RetryStrategy};
use crate::validate::Backend;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Component level configuration, shared by every step that runs on Batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepOperatorConfig {
    /// Role the Batch agent uses to pull images and write logs.
    pub execution_role: String,
    /// Role assumed by the container itself.
    pub job_role: String,
    /// Queue used when a step does not name one.
    pub default_job_queue_name: String,
}

/// Per-step settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepSettings {
    pub backend: Backend,
    pub job_queue_name: Option<String>,
    /// Overrides the caller's environment on key collisions.
    pub environment: Vec<(String, String)>,
    pub timeout_seconds: u64,
    /// Only used on Fargate.
    pub assign_public_ip: bool,
    pub tags: BTreeMap<String, String>,
    pub log_driver: LogDriver,
}

impl Default for StepSettings {
    fn default() -> Self {
        Self {
            backend: Backend::Ec2,
            job_queue_name: None,
            environment: Vec::new(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            assign_public_ip: true,
            tags: BTreeMap::new(),
            log_driver: LogDriver::Awslogs,
        }
    }
}

/// Defaults applied to every compiled job definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobDefaults {
    pub retry_strategy: RetryStrategy,
    pub propagate_tags: bool,
    pub parameters: BTreeMap<String, String>,
}

impl JobDefaults {
    pub(crate) fn options_for(&self, settings: &StepSettings) -> DefinitionOptions {
        DefinitionOptions {
            parameters: self.parameters.clone(),
            retry_strategy: self.retry_strategy.clone(),
            propagate_tags: self.propagate_tags,
            timeout_seconds: settings.timeout_seconds,
            tags: settings.tags.clone(),
            job_queue: settings.job_queue_name.clone(),
        }
    }
}

/// Settings for the submission and polling loop.
#[derive(Debug, Clone, PartialEq)]
pub struct LauncherConfig {
    pub default_job_queue_name: String,
    pub poll_interval: Duration,
    /// Upper bound on the time spent polling. `None` polls until a terminal status.
    pub max_wait: Option<Duration>,
}

impl LauncherConfig {
    pub fn new(default_job_queue_name: impl Into<String>) -> Self {
        Self {
            default_job_queue_name: default_job_queue_name.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: None,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }
}

impl From<&StepOperatorConfig> for LauncherConfig {
    fn from(config: &StepOperatorConfig) -> Self {
        Self::new(config.default_job_queue_name.clone())
    }
}
