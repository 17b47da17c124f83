//! # Harrier AWS Batch
//! [![Crates.io](https://img.shields.io/crates/v/harrier_compute_aws.svg)](https://crates.io/crates/harrier_compute_aws)
//! [![Docs](https://docs.rs/harrier_compute_aws/badge.svg)](https://docs.rs/harrier_compute_aws/)
//!
//! Implements [`BatchApi`] on top of `aws-sdk-batch`.
//!
//! ## Usage
//!
//! ```no_run
//! use aws_config::BehaviorVersion;
//! use harrier_compute_aws::AwsBatchClient;
//!
//! # async fn run() {
//! let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
//! let client = AwsBatchClient::new(&config);
//! # }
//! ```

use harrier_core::prelude::*;

use aws_sdk_batch::Client;
use aws_sdk_batch::error::DisplayErrorContext;
use aws_sdk_batch::types::{
    AssignPublicIp as AwsAssignPublicIp, ContainerProperties as AwsContainerProperties,
    EvaluateOnExit as AwsEvaluateOnExit, JobDefinitionType as AwsJobDefinitionType, JobDetail,
    JobTimeout as AwsJobTimeout, KeyValuePair as AwsKeyValuePair,
    LogConfiguration as AwsLogConfiguration, LogDriver as AwsLogDriver,
    NetworkConfiguration as AwsNetworkConfiguration, PlatformCapability,
    ResourceRequirement as AwsResourceRequirement, ResourceType, RetryAction as AwsRetryAction,
    RetryStrategy as AwsRetryStrategy, Secret as AwsSecret,
};

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct AwsBatchClient {
    batch: Client,
}

impl AwsBatchClient {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            batch: Client::new(config),
        }
    }

    pub fn from_client(batch: Client) -> Self {
        Self { batch }
    }

    /// Checks that the given job queue exists and is reachable with the current credentials.
    pub async fn check_queue(&self, queue: &str) -> Result<(), BatchError> {
        let resp = self
            .batch
            .describe_job_queues()
            .job_queues(queue)
            .send()
            .await
            .map_err(|e| BatchError::Api(DisplayErrorContext(&e).to_string()))?;

        if resp.job_queues().is_empty() {
            return Err(BatchError::NotFound(format!("Job queue {queue}")));
        }
        Ok(())
    }
}

impl BatchApi for AwsBatchClient {
    async fn register_job_definition(
        &self,
        definition: &JobDefinition,
    ) -> Result<RegisteredDefinition, BatchError> {
        let platform = match definition.backend() {
            Backend::Ec2 => PlatformCapability::Ec2,
            Backend::Fargate => PlatformCapability::Fargate,
        };

        let output = self
            .batch
            .register_job_definition()
            .job_definition_name(definition.name())
            .r#type(AwsJobDefinitionType::Container)
            .container_properties(container_properties(definition.container())?)
            .retry_strategy(retry_strategy(definition.retry_strategy())?)
            .timeout(
                AwsJobTimeout::builder()
                    .attempt_duration_seconds(to_i32(
                        definition.timeout().attempt_duration_seconds,
                        "attempt duration",
                    )?)
                    .build(),
            )
            .propagate_tags(definition.propagate_tags())
            .set_parameters(Some(to_map(definition.parameters())))
            .set_tags(Some(to_map(definition.tags())))
            .platform_capabilities(platform)
            .send()
            .await
            .map_err(|e| BatchError::Api(DisplayErrorContext(&e).to_string()))?;

        let arn = output.job_definition_arn.ok_or_else(|| {
            BatchError::InvalidResponse("Registered job definition has no ARN".into())
        })?;

        debug!("Registered {arn}");

        Ok(RegisteredDefinition {
            name: output
                .job_definition_name
                .unwrap_or_else(|| definition.name().to_string()),
            arn,
            revision: output.revision.unwrap_or_default(),
        })
    }

    async fn submit_job(&self, request: &SubmitJobRequest) -> Result<SubmittedJob, BatchError> {
        let output = self
            .batch
            .submit_job()
            .job_name(&request.job_name)
            .job_queue(&request.job_queue)
            .job_definition(&request.job_definition)
            .send()
            .await
            .map_err(|e| BatchError::Api(DisplayErrorContext(&e).to_string()))?;

        let job_id = output
            .job_id
            .ok_or_else(|| BatchError::InvalidResponse("Submitted job has no id".into()))?;

        Ok(SubmittedJob {
            job_id,
            job_name: output
                .job_name
                .unwrap_or_else(|| request.job_name.clone()),
        })
    }

    async fn describe_job(&self, job_id: &str) -> Result<JobDescription, BatchError> {
        let resp = self
            .batch
            .describe_jobs()
            .jobs(job_id)
            .send()
            .await
            .map_err(|e| BatchError::Api(DisplayErrorContext(&e).to_string()))?;

        resp.jobs()
            .first()
            .map(|job| job_description(job_id, job))
            .ok_or_else(|| BatchError::NotFound(format!("Job {job_id}")))
    }
}

fn to_i32(value: impl TryInto<i32> + Copy + std::fmt::Display, what: &str) -> Result<i32, BatchError> {
    value
        .try_into()
        .map_err(|_| BatchError::InvalidRequest(format!("{what} {value} is out of range")))
}

fn to_map(map: &std::collections::BTreeMap<String, String>) -> HashMap<String, String> {
    map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

fn resource_type(kind: ResourceKind) -> ResourceType {
    match kind {
        ResourceKind::Vcpu => ResourceType::Vcpu,
        ResourceKind::Memory => ResourceType::Memory,
        ResourceKind::Gpu => ResourceType::Gpu,
    }
}

fn container_properties(
    container: &ContainerProperties,
) -> Result<AwsContainerProperties, BatchError> {
    let invalid = |e: aws_sdk_batch::error::BuildError| BatchError::InvalidRequest(e.to_string());

    let requirements: Vec<AwsResourceRequirement> = container
        .resource_requirements
        .iter()
        .map(|r| {
            AwsResourceRequirement::builder()
                .r#type(resource_type(r.kind))
                .value(&r.value)
                .build()
        })
        .collect();

    let environment: Vec<AwsKeyValuePair> = container
        .environment
        .iter()
        .map(|kv| AwsKeyValuePair::builder().name(&kv.name).value(&kv.value).build())
        .collect();

    let secrets = container
        .secrets
        .iter()
        .map(|s| {
            AwsSecret::builder()
                .name(&s.name)
                .value_from(&s.value_from)
                .build()
                .map_err(invalid)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let log_configuration = AwsLogConfiguration::builder()
        .log_driver(AwsLogDriver::from(
            container.log_configuration.log_driver.as_str(),
        ))
        .build()
        .map_err(invalid)?;

    let mut builder = AwsContainerProperties::builder()
        .image(&container.image)
        .set_command(Some(container.command.clone()))
        .job_role_arn(&container.job_role_arn)
        .execution_role_arn(&container.execution_role_arn)
        .set_environment(Some(environment))
        .set_resource_requirements(Some(requirements))
        .set_secrets(Some(secrets))
        .log_configuration(log_configuration);

    if let Some(network) = &container.network_configuration {
        let assign = match network.assign_public_ip {
            AssignPublicIp::Enabled => AwsAssignPublicIp::Enabled,
            AssignPublicIp::Disabled => AwsAssignPublicIp::Disabled,
        };
        builder = builder.network_configuration(
            AwsNetworkConfiguration::builder()
                .assign_public_ip(assign)
                .build(),
        );
    }

    Ok(builder.build())
}

fn retry_strategy(strategy: &RetryStrategy) -> Result<AwsRetryStrategy, BatchError> {
    let conditions = strategy
        .evaluate_on_exit
        .iter()
        .map(|condition| {
            let action = match condition.action {
                RetryAction::Retry => AwsRetryAction::Retry,
                RetryAction::Exit => AwsRetryAction::Exit,
            };
            AwsEvaluateOnExit::builder()
                .set_on_exit_code(condition.on_exit_code.clone())
                .set_on_reason(condition.on_reason.clone())
                .set_on_status_reason(condition.on_status_reason.clone())
                .action(action)
                .build()
                .map_err(|e| BatchError::InvalidRequest(e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AwsRetryStrategy::builder()
        .attempts(to_i32(strategy.attempts, "retry attempts")?)
        .set_evaluate_on_exit(Some(conditions))
        .build())
}

fn timestamp(millis: Option<i64>) -> Option<DateTime<Utc>> {
    millis.and_then(DateTime::from_timestamp_millis)
}

fn job_description(job_id: &str, job: &JobDetail) -> JobDescription {
    let status = job
        .status()
        .map(|s| JobStatus::from(s.as_str()))
        .unwrap_or_else(|| JobStatus::Unknown(String::new()));

    JobDescription {
        job_id: job.job_id().unwrap_or(job_id).to_string(),
        job_name: job.job_name().unwrap_or_default().to_string(),
        status,
        status_reason: job.status_reason().map(str::to_string),
        created_at: timestamp(job.created_at()),
        started_at: timestamp(job.started_at()),
        stopped_at: timestamp(job.stopped_at()),
        log_stream_name: job
            .container()
            .and_then(|c| c.log_stream_name())
            .map(str::to_string),
    }
}
