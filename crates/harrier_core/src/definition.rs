use crate::error::ValidationError;
use crate::resources::{KeyValuePair, ResourceRequirement};
use crate::validate::Backend;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

/// Backend limit for job definition and job names.
pub const MAX_NAME_LEN: usize = 128;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 2;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 3600;
pub const MIN_TIMEOUT_SECONDS: u64 = 60;
pub const MAX_RETRY_ATTEMPTS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogDriver {
    Awsfirelens,
    #[default]
    Awslogs,
    Fluentd,
    Gelf,
    JsonFile,
    Journald,
    Logentries,
    Syslog,
    Splunk,
}

impl LogDriver {
    pub const ALL: [LogDriver; 9] = [
        LogDriver::Awsfirelens,
        LogDriver::Awslogs,
        LogDriver::Fluentd,
        LogDriver::Gelf,
        LogDriver::JsonFile,
        LogDriver::Journald,
        LogDriver::Logentries,
        LogDriver::Syslog,
        LogDriver::Splunk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogDriver::Awsfirelens => "awsfirelens",
            LogDriver::Awslogs => "awslogs",
            LogDriver::Fluentd => "fluentd",
            LogDriver::Gelf => "gelf",
            LogDriver::JsonFile => "json-file",
            LogDriver::Journald => "journald",
            LogDriver::Logentries => "logentries",
            LogDriver::Syslog => "syslog",
            LogDriver::Splunk => "splunk",
        }
    }
}

impl fmt::Display for LogDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfiguration {
    pub log_driver: LogDriver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssignPublicIp {
    #[default]
    Enabled,
    Disabled,
}

impl From<bool> for AssignPublicIp {
    fn from(enabled: bool) -> Self {
        if enabled {
            AssignPublicIp::Enabled
        } else {
            AssignPublicIp::Disabled
        }
    }
}

/// Fargate only.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfiguration {
    pub assign_public_ip: AssignPublicIp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    pub name: String,
    pub value_from: String,
}

/// The container half of a job definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerProperties {
    pub image: String,
    pub command: Vec<String>,
    pub job_role_arn: String,
    pub execution_role_arn: String,
    pub environment: Vec<KeyValuePair>,
    pub resource_requirements: Vec<ResourceRequirement>,
    pub secrets: Vec<Secret>,
    pub log_configuration: LogConfiguration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_configuration: Option<NetworkConfiguration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RetryAction {
    Retry,
    Exit,
}

/// A condition under which a failed attempt is retried (or not).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateOnExit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_exit_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_status_reason: Option<String>,
    pub action: RetryAction,
}

impl EvaluateOnExit {
    pub fn retry_on_exit_code(code: impl Into<String>) -> Self {
        Self {
            on_exit_code: Some(code.into()),
            on_reason: None,
            on_status_reason: None,
            action: RetryAction::Retry,
        }
    }

    pub fn retry_on_reason(reason: impl Into<String>) -> Self {
        Self {
            on_exit_code: None,
            on_reason: Some(reason.into()),
            on_status_reason: None,
            action: RetryAction::Retry,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryStrategy {
    pub attempts: u32,
    pub evaluate_on_exit: Vec<EvaluateOnExit>,
}

impl Default for RetryStrategy {
    /// Two attempts, retried when the container was OOM killed (exit code 137)
    /// or its EC2 host went away.
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            evaluate_on_exit: vec![
                EvaluateOnExit::retry_on_exit_code("137"),
                EvaluateOnExit::retry_on_reason("Host EC2 terminated"),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobTimeout {
    pub attempt_duration_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobDefinitionType {
    Container,
}

/// Everything on a job definition apart from its name, backend and container.
#[derive(Debug, Clone, PartialEq)]
pub struct DefinitionOptions {
    pub parameters: BTreeMap<String, String>,
    pub retry_strategy: RetryStrategy,
    pub propagate_tags: bool,
    pub timeout_seconds: u64,
    pub tags: BTreeMap<String, String>,
    /// Queue to submit to when the launch does not name one.
    pub job_queue: Option<String>,
}

impl Default for DefinitionOptions {
    fn default() -> Self {
        Self {
            parameters: BTreeMap::new(),
            retry_strategy: RetryStrategy::default(),
            propagate_tags: false,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            tags: BTreeMap::new(),
            job_queue: None,
        }
    }
}

/// A validated, immutable job definition.
///
/// Serializes to the camelCase document accepted by `RegisterJobDefinition`.
/// The only way to obtain one is [`JobDefinition::new`], which validates the
/// container against its backend, so an instance is always valid for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDefinition {
    job_definition_name: String,
    #[serde(rename = "type")]
    kind: JobDefinitionType,
    parameters: BTreeMap<String, String>,
    retry_strategy: RetryStrategy,
    propagate_tags: bool,
    timeout: JobTimeout,
    tags: BTreeMap<String, String>,
    platform_capabilities: [Backend; 1],
    container_properties: ContainerProperties,
    #[serde(skip)]
    job_queue: Option<String>,
    #[serde(skip)]
    notes: Vec<String>,
}

impl JobDefinition {
    pub fn new(
        name: impl Into<String>,
        backend: Backend,
        mut container: ContainerProperties,
        options: DefinitionOptions,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        validate_name(&name)?;

        let attempts = options.retry_strategy.attempts;
        if !(1..=MAX_RETRY_ATTEMPTS).contains(&attempts) {
            return Err(ValidationError::InvalidRetryAttempts(attempts));
        }
        if options.timeout_seconds < MIN_TIMEOUT_SECONDS {
            return Err(ValidationError::InvalidTimeout(options.timeout_seconds));
        }

        backend.check_log_driver(container.log_configuration.log_driver)?;
        if backend == Backend::Ec2 && container.network_configuration.is_some() {
            return Err(ValidationError::UnsupportedCapability(
                "Network configuration is only available on the FARGATE platform capability".into(),
            ));
        }

        let validated = backend.validate(&container.resource_requirements)?;
        container.resource_requirements = validated.requirements;

        Ok(Self {
            job_definition_name: name,
            kind: JobDefinitionType::Container,
            parameters: options.parameters,
            retry_strategy: options.retry_strategy,
            propagate_tags: options.propagate_tags,
            timeout: JobTimeout {
                attempt_duration_seconds: options.timeout_seconds,
            },
            tags: options.tags,
            platform_capabilities: [backend],
            container_properties: container,
            job_queue: options.job_queue.filter(|q| !q.is_empty()),
            notes: validated.notes,
        })
    }

    pub fn name(&self) -> &str {
        &self.job_definition_name
    }

    pub fn backend(&self) -> Backend {
        self.platform_capabilities[0]
    }

    pub fn container(&self) -> &ContainerProperties {
        &self.container_properties
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    pub fn retry_strategy(&self) -> &RetryStrategy {
        &self.retry_strategy
    }

    pub fn propagate_tags(&self) -> bool {
        self.propagate_tags
    }

    pub fn timeout(&self) -> JobTimeout {
        self.timeout
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// Queue chosen by the step settings, if any.
    pub fn job_queue(&self) -> Option<&str> {
        self.job_queue.as_deref()
    }

    /// Adjustments the validator applied, e.g. rounded vCPUs.
    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    /// Logs the full definition document for auditing.
    pub fn log(&self) {
        info!("Job definition: {}", self.to_json());
    }
}

/// Names must be 1 to 128 letters, digits, hyphens or underscores.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{ResourceKind, first_of};

    fn container(cpu: &str, memory: &str) -> ContainerProperties {
        ContainerProperties {
            image: "test-image".into(),
            command: vec!["test".into(), "command".into()],
            job_role_arn: "test-job-role-arn".into(),
            execution_role_arn: "test-execution-role-arn".into(),
            environment: Vec::new(),
            resource_requirements: vec![
                ResourceRequirement::vcpu(cpu),
                ResourceRequirement::memory(memory),
            ],
            secrets: Vec::new(),
            log_configuration: LogConfiguration::default(),
            network_configuration: None,
        }
    }

    #[test]
    fn ec2_definition_with_gpu() {
        let mut c = container("1", "1024");
        c.resource_requirements.push(ResourceRequirement::gpu("1"));

        let def = JobDefinition::new("test", Backend::Ec2, c, DefinitionOptions::default()).unwrap();
        assert_eq!(def.backend(), Backend::Ec2);
        assert!(first_of(&def.container().resource_requirements, ResourceKind::Gpu).is_some());
    }

    #[test]
    fn fargate_definition() {
        let mut c = container("0.5", "3072");
        c.network_configuration = Some(NetworkConfiguration::default());

        let def =
            JobDefinition::new("test", Backend::Fargate, c, DefinitionOptions::default()).unwrap();
        assert_eq!(def.backend(), Backend::Fargate);
    }

    #[test]
    fn construction_normalizes_ec2_cpu() {
        let def = JobDefinition::new(
            "test",
            Backend::Ec2,
            container("1.1", "100"),
            DefinitionOptions::default(),
        )
        .unwrap();

        assert_eq!(
            def.container().resource_requirements,
            vec![
                ResourceRequirement::vcpu("2"),
                ResourceRequirement::memory("100"),
            ]
        );
        assert_eq!(def.notes().len(), 1);
    }

    #[test]
    fn serializes_register_document() {
        let mut c = container("1", "2048");
        c.network_configuration = Some(NetworkConfiguration {
            assign_public_ip: AssignPublicIp::Disabled,
        });
        c.environment.push(KeyValuePair {
            name: "A".into(),
            value: "1".into(),
        });
        let def =
            JobDefinition::new("test", Backend::Fargate, c, DefinitionOptions::default()).unwrap();

        let json = def.to_json();
        assert_eq!(json["jobDefinitionName"], "test");
        assert_eq!(json["type"], "container");
        assert_eq!(json["platformCapabilities"], serde_json::json!(["FARGATE"]));
        assert_eq!(json["timeout"]["attemptDurationSeconds"], 3600);
        assert_eq!(json["retryStrategy"]["attempts"], 2);
        assert_eq!(json["retryStrategy"]["evaluateOnExit"][0]["onExitCode"], "137");
        assert_eq!(json["retryStrategy"]["evaluateOnExit"][0]["action"], "RETRY");
        assert_eq!(
            json["retryStrategy"]["evaluateOnExit"][1]["onReason"],
            "Host EC2 terminated"
        );
        assert_eq!(json["propagateTags"], false);

        let props = &json["containerProperties"];
        assert_eq!(props["jobRoleArn"], "test-job-role-arn");
        assert_eq!(props["logConfiguration"]["logDriver"], "awslogs");
        assert_eq!(props["networkConfiguration"]["assignPublicIp"], "DISABLED");
        assert_eq!(props["resourceRequirements"][0]["type"], "VCPU");
        assert_eq!(props["environment"][0]["name"], "A");
        assert!(json.get("notes").is_none());
    }

    #[test]
    fn ec2_has_no_network_configuration() {
        let json = JobDefinition::new(
            "test",
            Backend::Ec2,
            container("1", "1024"),
            DefinitionOptions::default(),
        )
        .unwrap()
        .to_json();
        assert!(json["containerProperties"].get("networkConfiguration").is_none());

        let mut c = container("1", "1024");
        c.network_configuration = Some(NetworkConfiguration::default());
        assert!(matches!(
            JobDefinition::new("test", Backend::Ec2, c, DefinitionOptions::default()),
            Err(ValidationError::UnsupportedCapability(_))
        ));
    }

    #[test]
    fn rejects_invalid_options() {
        let options = DefinitionOptions {
            timeout_seconds: 30,
            ..Default::default()
        };
        assert_eq!(
            JobDefinition::new("test", Backend::Ec2, container("1", "1024"), options),
            Err(ValidationError::InvalidTimeout(30))
        );

        let mut options = DefinitionOptions::default();
        options.retry_strategy.attempts = 0;
        assert_eq!(
            JobDefinition::new("test", Backend::Ec2, container("1", "1024"), options),
            Err(ValidationError::InvalidRetryAttempts(0))
        );
    }

    #[test]
    fn rejects_fargate_log_driver() {
        let mut c = container("1", "2048");
        c.log_configuration.log_driver = LogDriver::Fluentd;
        assert!(matches!(
            JobDefinition::new("test", Backend::Fargate, c, DefinitionOptions::default()),
            Err(ValidationError::UnsupportedLogDriver { .. })
        ));
    }

    #[test]
    fn name_rules() {
        assert!(validate_name("valid-name_123").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("with space").is_err());
        assert!(validate_name(&"a".repeat(129)).is_err());
        assert!(validate_name(&"a".repeat(128)).is_ok());
    }

    #[test]
    fn log_driver_names() {
        for driver in LogDriver::ALL {
            let json = serde_json::to_value(driver).unwrap();
            assert_eq!(json, driver.as_str());
        }
    }
}
