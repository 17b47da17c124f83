//! Turns a step's image, command, resources and settings into a [`JobDefinition`].

use crate::config::{JobDefaults, StepOperatorConfig, StepSettings};
use crate::definition::{
    ContainerProperties, JobDefinition, LogConfiguration, NetworkConfiguration, Secret,
};
use crate::error::ValidationError;
use crate::resources::{ResourceSettings, map_environment, map_resource_settings};
use crate::validate::Backend;

use rand::Rng;
use rand::distr::Alphanumeric;

/// Prefix length left for pipeline and step names, so that the suffix still fits into 128 characters.
pub const NAME_PREFIX_LEN: usize = 115;
pub const NAME_SUFFIX_LEN: usize = 6;

/// Replaces every character outside `[A-Za-z0-9_-]` with `-`.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// `<pipeline>-<step>` capped at 115 characters, followed by `-` and a random 6 character suffix.
pub fn unique_job_name(pipeline: &str, step: &str) -> String {
    let mut name = format!("{}-{}", sanitize_name(pipeline), sanitize_name(step));
    // sanitized names are pure ASCII
    name.truncate(NAME_PREFIX_LEN);

    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(NAME_SUFFIX_LEN)
        .map(char::from)
        .collect();

    format!("{name}-{suffix}")
}

/// Applies `overrides` on top of `base`. Existing keys keep their position, new keys are appended.
pub fn merge_environment(
    mut base: Vec<(String, String)>,
    overrides: &[(String, String)],
) -> Vec<(String, String)> {
    for (key, value) in overrides {
        match base.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.clone(),
            None => base.push((key.clone(), value.clone())),
        }
    }
    base
}

/// The per-step input to [`JobDefinitionCompiler::compile`].
#[derive(Debug, Clone, Default)]
pub struct CompileRequest {
    pub pipeline_name: String,
    pub step_name: String,
    /// Fully qualified image reference.
    pub image: String,
    pub command: Vec<String>,
    pub environment: Vec<(String, String)>,
    pub resources: ResourceSettings,
    pub secrets: Vec<Secret>,
    pub settings: StepSettings,
}

#[derive(Debug, Clone, Default)]
pub struct JobDefinitionCompiler {
    config: StepOperatorConfig,
    defaults: JobDefaults,
}

impl JobDefinitionCompiler {
    pub fn new(config: StepOperatorConfig) -> Self {
        Self {
            config,
            defaults: JobDefaults::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: JobDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn config(&self) -> &StepOperatorConfig {
        &self.config
    }

    pub fn compile(&self, request: CompileRequest) -> Result<JobDefinition, ValidationError> {
        let CompileRequest {
            pipeline_name,
            step_name,
            image,
            command,
            environment,
            resources,
            secrets,
            settings,
        } = request;

        let environment = merge_environment(environment, &settings.environment);
        let backend = settings.backend;

        let network_configuration = match backend {
            Backend::Ec2 => None,
            Backend::Fargate => Some(NetworkConfiguration {
                assign_public_ip: settings.assign_public_ip.into(),
            }),
        };

        let container = ContainerProperties {
            image,
            command,
            job_role_arn: self.config.job_role.clone(),
            execution_role_arn: self.config.execution_role.clone(),
            environment: map_environment(&environment),
            resource_requirements: map_resource_settings(&resources),
            secrets,
            log_configuration: LogConfiguration {
                log_driver: settings.log_driver,
            },
            network_configuration,
        };

        JobDefinition::new(
            unique_job_name(&pipeline_name, &step_name),
            backend,
            container,
            self.defaults.options_for(&settings),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::AssignPublicIp;
    use crate::resources::{ResourceKind, ResourceRequirement};
    use proptest::prelude::*;

    fn compiler() -> JobDefinitionCompiler {
        JobDefinitionCompiler::new(StepOperatorConfig {
            execution_role: "arn:aws:iam::123456789012:role/execution".into(),
            job_role: "arn:aws:iam::123456789012:role/job".into(),
            default_job_queue_name: "default-queue".into(),
        })
    }

    fn request(backend: Backend, resources: ResourceSettings) -> CompileRequest {
        CompileRequest {
            pipeline_name: "training pipeline".into(),
            step_name: "trainer".into(),
            image: "123456789012.dkr.ecr.eu-west-1.amazonaws.com/harrier:latest".into(),
            command: vec!["python".into(), "-m".into(), "entrypoint".into()],
            resources,
            settings: StepSettings {
                backend,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn sanitizes_names() {
        assert_eq!(sanitize_name("valid-name-123abcABC_"), "valid-name-123abcABC_");
        assert_eq!(
            sanitize_name("this!is@not\"a£valid$name%123"),
            "this-is-not-a-valid-name-123"
        );
    }

    #[test]
    fn job_name_uses_pipeline_and_step() {
        let name = unique_job_name("my pipeline", "step/one");
        assert!(name.starts_with("my-pipeline-step-one-"));
        assert_eq!(name.len(), "my-pipeline-step-one-".len() + NAME_SUFFIX_LEN);
    }

    #[test]
    fn long_names_are_capped() {
        let name = unique_job_name(&"p".repeat(200), &"s".repeat(200));
        assert_eq!(name.len(), NAME_PREFIX_LEN + 1 + NAME_SUFFIX_LEN);
        assert!(name.len() <= 128);
    }

    #[test]
    fn merges_environment_with_settings_winning() {
        let merged = merge_environment(
            vec![("A".into(), "1".into()), ("B".into(), "2".into())],
            &[("B".into(), "override".into()), ("C".into(), "3".into())],
        );
        assert_eq!(
            merged,
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "override".to_string()),
                ("C".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn compiles_ec2_with_rounded_cpu() {
        let resources = ResourceSettings {
            cpu_count: Some(1.1),
            memory_mib: Some(100),
            gpu_count: None,
        };
        let def = compiler().compile(request(Backend::Ec2, resources)).unwrap();

        assert_eq!(
            def.container().resource_requirements,
            vec![
                ResourceRequirement::vcpu("2"),
                ResourceRequirement::memory("100"),
            ]
        );
        assert_eq!(def.to_json()["platformCapabilities"], serde_json::json!(["EC2"]));
        assert!(def.container().network_configuration.is_none());
        assert_eq!(def.container().job_role_arn, "arn:aws:iam::123456789012:role/job");
        assert!(def.name().starts_with("training-pipeline-trainer-"));
    }

    #[test]
    fn rejects_fargate_memory_outside_tier() {
        let resources = ResourceSettings {
            cpu_count: Some(2.0),
            memory_mib: Some(5000),
            gpu_count: None,
        };
        let err = compiler().compile(request(Backend::Fargate, resources)).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidTier {
                kind: ResourceKind::Memory,
                ref value,
                ..
            } if value == "5000"
        ));
    }

    #[test]
    fn rejects_fargate_gpu() {
        let resources = ResourceSettings {
            cpu_count: Some(2.0),
            memory_mib: Some(4096),
            gpu_count: Some(1),
        };
        assert!(matches!(
            compiler().compile(request(Backend::Fargate, resources)),
            Err(ValidationError::UnsupportedCapability(_))
        ));
    }

    #[test]
    fn fargate_gets_network_configuration() {
        let resources = ResourceSettings {
            cpu_count: Some(0.5),
            memory_mib: Some(2048),
            gpu_count: None,
        };

        let def = compiler().compile(request(Backend::Fargate, resources.clone())).unwrap();
        assert_eq!(
            def.container().network_configuration,
            Some(NetworkConfiguration {
                assign_public_ip: AssignPublicIp::Enabled
            })
        );

        let mut req = request(Backend::Fargate, resources);
        req.settings.assign_public_ip = false;
        let def = compiler().compile(req).unwrap();
        assert_eq!(
            def.container().network_configuration,
            Some(NetworkConfiguration {
                assign_public_ip: AssignPublicIp::Disabled
            })
        );
    }

    #[test]
    fn applies_settings_and_defaults() {
        let mut req = request(Backend::Ec2, ResourceSettings::default());
        req.environment = vec![("STORE".into(), "local".into())];
        req.settings.environment = vec![("STORE".into(), "remote".into())];
        req.settings.timeout_seconds = 600;
        req.settings.tags.insert("team".into(), "ml".into());

        let def = compiler().compile(req).unwrap();
        let env = &def.container().environment;
        assert_eq!(env.len(), 1);
        assert_eq!(env[0].value, "remote");
        assert_eq!(def.timeout().attempt_duration_seconds, 600);
        assert_eq!(def.tags().get("team").map(String::as_str), Some("ml"));
        assert_eq!(def.retry_strategy().attempts, 2);
    }

    #[test]
    fn carries_settings_queue_outside_the_document() {
        let def = compiler().compile(request(Backend::Ec2, ResourceSettings::default())).unwrap();
        assert_eq!(def.job_queue(), None);

        let mut req = request(Backend::Ec2, ResourceSettings::default());
        req.settings.job_queue_name = Some("step-queue".into());
        let def = compiler().compile(req).unwrap();
        assert_eq!(def.job_queue(), Some("step-queue"));
        assert!(!def.to_json().to_string().contains("step-queue"));

        let mut req = request(Backend::Ec2, ResourceSettings::default());
        req.settings.job_queue_name = Some(String::new());
        assert_eq!(compiler().compile(req).unwrap().job_queue(), None);
    }

    #[test]
    fn names_differ_between_compilations() {
        let a = compiler().compile(request(Backend::Ec2, ResourceSettings::default())).unwrap();
        let b = compiler().compile(request(Backend::Ec2, ResourceSettings::default())).unwrap();
        assert_ne!(a.name(), b.name());
    }

    proptest! {
        #[test]
        fn job_names_are_valid(pipeline in ".{0,200}", step in ".{0,200}") {
            let name = unique_job_name(&pipeline, &step);
            prop_assert!(name.len() <= 128);
            prop_assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
            prop_assert!(crate::definition::validate_name(&name).is_ok());
        }
    }
}
