//! Backend specific validation of requirement sets.
//!
//! * **EC2** needs whole vCPUs. Fractional values are rounded up rather than rejected.
//! * **Fargate** only accepts fixed (VCPU, MEMORY) tiers and has no GPU support.

use crate::definition::LogDriver;
use crate::error::ValidationError;
use crate::resources::{ResourceKind, ResourceRequirement, first_of};

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// The execution target of a job definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Backend {
    /// Host managed compute environments, integer vCPUs.
    #[default]
    Ec2,
    /// Serverless compute environments with discrete tiers.
    Fargate,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Backend::Ec2 => "EC2",
            Backend::Fargate => "FARGATE",
        })
    }
}

/// A requirement set that passed validation, with any adjustments that were made.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    pub requirements: Vec<ResourceRequirement>,
    /// Human readable notes about auto-corrections.
    pub notes: Vec<String>,
}

impl Backend {
    /// Validates (and for EC2 possibly normalizes) a requirement set.
    pub fn validate(&self, requirements: &[ResourceRequirement]) -> Result<Validated, ValidationError> {
        match self {
            Backend::Ec2 => validate_ec2(requirements),
            Backend::Fargate => validate_fargate(requirements),
        }
    }

    pub fn supports_log_driver(&self, driver: LogDriver) -> bool {
        match self {
            Backend::Ec2 => true,
            Backend::Fargate => matches!(driver, LogDriver::Awslogs | LogDriver::Splunk),
        }
    }

    pub fn check_log_driver(&self, driver: LogDriver) -> Result<(), ValidationError> {
        if self.supports_log_driver(driver) {
            Ok(())
        } else {
            Err(ValidationError::UnsupportedLogDriver {
                driver,
                backend: *self,
            })
        }
    }
}

fn required(
    requirements: &[ResourceRequirement],
    kind: ResourceKind,
) -> Result<&ResourceRequirement, ValidationError> {
    first_of(requirements, kind).ok_or(ValidationError::MissingRequirement(kind))
}

fn validate_ec2(requirements: &[ResourceRequirement]) -> Result<Validated, ValidationError> {
    let cpu = required(requirements, ResourceKind::Vcpu)?;
    let memory = required(requirements, ResourceKind::Memory)?;

    let value: f64 = cpu
        .value
        .trim()
        .parse()
        .ok()
        .filter(|v: &f64| v.is_finite())
        .ok_or_else(|| ValidationError::MalformedValue {
            kind: ResourceKind::Vcpu,
            value: cpu.value.clone(),
        })?;

    let rounded = value.ceil();
    if rounded == value {
        return Ok(Validated {
            requirements: requirements.to_vec(),
            notes: Vec::new(),
        });
    }

    let note = format!(
        "Rounded fractional EC2 VCPU value from {} to {} since AWS Batch on EC2 requires a whole vCPU count",
        cpu.value, rounded
    );
    info!("{note}");

    let mut normalized = vec![
        ResourceRequirement::vcpu(rounded.to_string()),
        memory.clone(),
    ];
    normalized.extend(
        requirements
            .iter()
            .filter(|r| r.kind == ResourceKind::Gpu)
            .cloned(),
    );

    Ok(Validated {
        requirements: normalized,
        notes: vec![note],
    })
}

/// Memory values (MiB) accepted for one Fargate VCPU tier.
#[derive(Debug, Clone, Copy)]
enum MemoryTiers {
    List(&'static [u32]),
    Step { start: u32, end: u32, step: u32 },
}

impl MemoryTiers {
    fn values(&self) -> Vec<u32> {
        match *self {
            MemoryTiers::List(values) => values.to_vec(),
            MemoryTiers::Step { start, end, step } => {
                (start..=end).step_by(step as usize).collect()
            }
        }
    }
}

const FARGATE_TIERS: &[(&str, MemoryTiers)] = &[
    ("0.25", MemoryTiers::List(&[512, 1024, 2048])),
    ("0.5", MemoryTiers::List(&[1024, 2048, 3072, 4096])),
    ("1", MemoryTiers::Step { start: 2048, end: 8192, step: 1024 }),
    ("2", MemoryTiers::Step { start: 4096, end: 16384, step: 1024 }),
    ("4", MemoryTiers::Step { start: 8192, end: 30720, step: 1024 }),
    ("8", MemoryTiers::Step { start: 16384, end: 61440, step: 4096 }),
    ("16", MemoryTiers::Step { start: 32768, end: 122880, step: 8192 }),
];

/// The VCPU values Fargate accepts, smallest first.
pub fn fargate_vcpu_tiers() -> Vec<&'static str> {
    FARGATE_TIERS.iter().map(|(vcpu, _)| *vcpu).collect()
}

/// The MEMORY values (MiB) Fargate accepts for a VCPU tier, or `None` for an unknown tier.
pub fn fargate_memory_tiers(vcpu: &str) -> Option<Vec<u32>> {
    FARGATE_TIERS
        .iter()
        .find(|(tier, _)| *tier == vcpu)
        .map(|(_, memory)| memory.values())
}

fn list(values: &[impl ToString]) -> String {
    let joined: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", joined.join(", "))
}

fn validate_fargate(requirements: &[ResourceRequirement]) -> Result<Validated, ValidationError> {
    if first_of(requirements, ResourceKind::Gpu).is_some() {
        return Err(ValidationError::UnsupportedCapability(
            "Invalid Fargate resource requirement: GPU. Use the EC2 platform capability if you need custom devices".into(),
        ));
    }

    let cpu = required(requirements, ResourceKind::Vcpu)?;
    let memory = required(requirements, ResourceKind::Memory)?;

    let allowed_memory =
        fargate_memory_tiers(&cpu.value).ok_or_else(|| ValidationError::InvalidTier {
            kind: ResourceKind::Vcpu,
            value: cpu.value.clone(),
            constraint: format!("must be one of {}", list(&fargate_vcpu_tiers())),
        })?;

    let in_tier = memory
        .value
        .parse::<u32>()
        .is_ok_and(|m| allowed_memory.contains(&m) && m.to_string() == memory.value);
    if !in_tier {
        return Err(ValidationError::InvalidTier {
            kind: ResourceKind::Memory,
            value: memory.value.clone(),
            constraint: format!(
                "for VCPU={}, MEMORY must be one of {}",
                cpu.value,
                list(&allowed_memory)
            ),
        });
    }

    Ok(Validated {
        requirements: requirements.to_vec(),
        notes: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn reqs(cpu: &str, memory: &str) -> Vec<ResourceRequirement> {
        vec![ResourceRequirement::vcpu(cpu), ResourceRequirement::memory(memory)]
    }

    #[test]
    fn ec2_rounds_fractional_cpu_up() {
        let mut input = reqs("0.4", "100");
        input.push(ResourceRequirement::gpu("1"));

        let validated = Backend::Ec2.validate(&input).unwrap();
        assert_eq!(
            validated.requirements,
            vec![
                ResourceRequirement::vcpu("1"),
                ResourceRequirement::memory("100"),
                ResourceRequirement::gpu("1"),
            ]
        );
        assert_eq!(validated.notes.len(), 1);

        let validated = Backend::Ec2.validate(&reqs("1.1", "100")).unwrap();
        assert_eq!(validated.requirements, reqs("2", "100"));
    }

    #[test]
    fn ec2_keeps_whole_cpu_untouched() {
        let input = reqs("4", "100000");
        let validated = Backend::Ec2.validate(&input).unwrap();
        assert_eq!(validated.requirements, input);
        assert!(validated.notes.is_empty());
    }

    #[test]
    fn ec2_requires_cpu_and_memory() {
        let only_memory = vec![ResourceRequirement::memory("1024")];
        assert_eq!(
            Backend::Ec2.validate(&only_memory),
            Err(ValidationError::MissingRequirement(ResourceKind::Vcpu))
        );

        let only_cpu = vec![ResourceRequirement::vcpu("1")];
        assert_eq!(
            Backend::Ec2.validate(&only_cpu),
            Err(ValidationError::MissingRequirement(ResourceKind::Memory))
        );
    }

    #[test]
    fn ec2_rejects_non_numeric_cpu() {
        assert!(matches!(
            Backend::Ec2.validate(&reqs("lots", "1024")),
            Err(ValidationError::MalformedValue { kind: ResourceKind::Vcpu, .. })
        ));
    }

    #[test]
    fn fargate_accepts_every_tier() {
        for vcpu in fargate_vcpu_tiers() {
            for memory in fargate_memory_tiers(vcpu).unwrap() {
                let input = reqs(vcpu, &memory.to_string());
                let validated = Backend::Fargate.validate(&input).unwrap();
                assert_eq!(validated.requirements, input);
            }
        }
    }

    #[test]
    fn fargate_tier_table() {
        assert_eq!(fargate_vcpu_tiers(), vec!["0.25", "0.5", "1", "2", "4", "8", "16"]);

        let two = fargate_memory_tiers("2").unwrap();
        assert_eq!(two.first(), Some(&4096));
        assert_eq!(two.last(), Some(&16384));
        assert_eq!(two.len(), 13);

        let sixteen = fargate_memory_tiers("16").unwrap();
        assert_eq!(sixteen.last(), Some(&122880));
        assert!(fargate_memory_tiers("3").is_none());
    }

    #[test]
    fn fargate_rejects_unknown_cpu() {
        let err = Backend::Fargate.validate(&reqs("invalid-value", "1024")).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidTier { kind: ResourceKind::Vcpu, .. }));
        assert!(err.to_string().contains("invalid-value"));
        assert!(err.to_string().contains("0.25"));
    }

    #[test]
    fn fargate_rejects_memory_outside_tier() {
        let err = Backend::Fargate.validate(&reqs("2", "5000")).unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, ValidationError::InvalidTier { kind: ResourceKind::Memory, .. }));
        assert!(message.contains("5000"));
        assert!(message.contains("VCPU=2"));
        assert!(message.contains("4096"));

        assert!(Backend::Fargate.validate(&reqs("16", "invalid-value")).is_err());
        assert!(Backend::Fargate.validate(&reqs("1", "02048")).is_err());
    }

    #[test]
    fn fargate_rejects_gpu_first() {
        let mut input = reqs("irrelevant-value", "irrelevant-value");
        input.push(ResourceRequirement::gpu("1"));
        assert!(matches!(
            Backend::Fargate.validate(&input),
            Err(ValidationError::UnsupportedCapability(_))
        ));
    }

    #[test]
    fn fargate_requires_cpu_and_memory() {
        let only_cpu = vec![ResourceRequirement::vcpu("1")];
        assert_eq!(
            Backend::Fargate.validate(&only_cpu),
            Err(ValidationError::MissingRequirement(ResourceKind::Memory))
        );

        let only_memory = vec![ResourceRequirement::memory("2048")];
        assert_eq!(
            Backend::Fargate.validate(&only_memory),
            Err(ValidationError::MissingRequirement(ResourceKind::Vcpu))
        );

        assert_eq!(
            Backend::Fargate.validate(&[]),
            Err(ValidationError::MissingRequirement(ResourceKind::Vcpu))
        );
    }

    #[test]
    fn fargate_rejects_gpu_before_missing_requirements() {
        let gpu_only = vec![ResourceRequirement::gpu("1")];
        assert!(matches!(
            Backend::Fargate.validate(&gpu_only),
            Err(ValidationError::UnsupportedCapability(_))
        ));

        let cpu_and_gpu = vec![ResourceRequirement::vcpu("1"), ResourceRequirement::gpu("1")];
        assert!(matches!(
            Backend::Fargate.validate(&cpu_and_gpu),
            Err(ValidationError::UnsupportedCapability(_))
        ));
    }

    #[test]
    fn fargate_does_not_round() {
        assert!(Backend::Fargate.validate(&reqs("1.0", "2048")).is_err());
    }

    #[test]
    fn log_drivers_per_backend() {
        assert!(Backend::Ec2.check_log_driver(LogDriver::Fluentd).is_ok());
        assert!(Backend::Fargate.check_log_driver(LogDriver::Splunk).is_ok());
        assert_eq!(
            Backend::Fargate.check_log_driver(LogDriver::Gelf),
            Err(ValidationError::UnsupportedLogDriver {
                driver: LogDriver::Gelf,
                backend: Backend::Fargate,
            })
        );
    }

    proptest! {
        #[test]
        fn ec2_cpu_is_ceiled(cpu in 0.01f64..512.0) {
            let value = cpu.to_string();
            let validated = Backend::Ec2.validate(&reqs(&value, "2048")).unwrap();
            let out = first_of(&validated.requirements, ResourceKind::Vcpu).unwrap();

            if cpu.fract() == 0.0 {
                prop_assert_eq!(&out.value, &value);
                prop_assert!(validated.notes.is_empty());
            } else {
                prop_assert_eq!(&out.value, &cpu.ceil().to_string());
                prop_assert_eq!(validated.notes.len(), 1);
            }
        }

        #[test]
        fn ec2_whole_cpu_is_unchanged(cpu in 1u32..1024) {
            let input = reqs(&cpu.to_string(), "2048");
            let validated = Backend::Ec2.validate(&input).unwrap();
            prop_assert_eq!(validated.requirements, input);
        }
    }
}
