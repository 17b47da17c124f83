//! Mapping of generic resource requests onto the backend's requirement records.
//!
//! Nothing in here rejects input. Whether a requirement set is acceptable is
//! decided by the [`validate`](crate::validate) module.

use crate::error::ValidationError;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_VCPU: &str = "1";
pub const DEFAULT_MEMORY_MIB: &str = "1024";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourceKind {
    Vcpu,
    Memory,
    Gpu,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::Vcpu => "VCPU",
            ResourceKind::Memory => "MEMORY",
            ResourceKind::Gpu => "GPU",
        })
    }
}

/// A single `{type, value}` resource record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequirement {
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub value: String,
}

impl ResourceRequirement {
    pub fn new(kind: ResourceKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn vcpu(value: impl Into<String>) -> Self {
        Self::new(ResourceKind::Vcpu, value)
    }

    pub fn memory(value: impl Into<String>) -> Self {
        Self::new(ResourceKind::Memory, value)
    }

    pub fn gpu(value: impl Into<String>) -> Self {
        Self::new(ResourceKind::Gpu, value)
    }
}

/// Returns the first requirement of the given kind.
///
/// Later duplicates are ignored. A set carrying two VCPU or two MEMORY entries
/// is most likely a caller bug, but the first entry stays authoritative.
pub fn first_of(requirements: &[ResourceRequirement], kind: ResourceKind) -> Option<&ResourceRequirement> {
    requirements.iter().find(|r| r.kind == kind)
}

/// Generic resource request for a single step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSettings {
    /// Number of vCPUs, fractional values allowed.
    pub cpu_count: Option<f64>,
    /// Memory, already resolved to MiB.
    pub memory_mib: Option<u64>,
    pub gpu_count: Option<u32>,
}

impl ResourceSettings {
    pub fn with_cpu(mut self, cpu: f64) -> Self {
        self.cpu_count = Some(cpu);
        self
    }

    pub fn with_memory(mut self, memory: MemorySize) -> Self {
        self.memory_mib = Some(memory.mib());
        self
    }

    pub fn with_gpus(mut self, gpus: u32) -> Self {
        self.gpu_count = Some(gpus);
        self
    }
}

/// Converts the generic settings into VCPU, MEMORY and (optionally) GPU records.
///
/// VCPU defaults to `"1"` and MEMORY to `"1024"`. A zero memory amount counts as
/// absent. GPU is only emitted for a non-zero count.
pub fn map_resource_settings(settings: &ResourceSettings) -> Vec<ResourceRequirement> {
    let mut requirements = Vec::with_capacity(3);

    let cpu = settings
        .cpu_count
        .map(|c| c.to_string())
        .unwrap_or_else(|| DEFAULT_VCPU.to_string());
    requirements.push(ResourceRequirement::vcpu(cpu));

    let memory = settings
        .memory_mib
        .filter(|m| *m != 0)
        .map(|m| m.to_string())
        .unwrap_or_else(|| DEFAULT_MEMORY_MIB.to_string());
    requirements.push(ResourceRequirement::memory(memory));

    if let Some(gpus) = settings.gpu_count.filter(|g| *g != 0) {
        requirements.push(ResourceRequirement::gpu(gpus.to_string()));
    }

    requirements
}

/// A `{name, value}` pair, as used for container environments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub name: String,
    pub value: String,
}

/// Maps an ordered environment onto `{name, value}` pairs, keeping the input order.
pub fn map_environment(environment: &[(String, String)]) -> Vec<KeyValuePair> {
    environment
        .iter()
        .map(|(name, value)| KeyValuePair {
            name: name.clone(),
            value: value.clone(),
        })
        .collect()
}

/// A memory amount such as `512`, `512MiB` or `4GB`. Bare numbers are MiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySize {
    bytes: u128,
}

impl MemorySize {
    pub fn from_mib(mib: u64) -> Self {
        Self {
            bytes: mib as u128 * MIB,
        }
    }

    /// Whole MiB, truncated.
    pub fn mib(&self) -> u64 {
        u64::try_from(self.bytes / MIB).unwrap_or(u64::MAX)
    }
}

const MIB: u128 = 1024 * 1024;

const UNITS: &[(&str, u128)] = &[
    ("KB", 1000),
    ("KiB", 1024),
    ("MB", 1000_u128.pow(2)),
    ("MiB", 1024_u128.pow(2)),
    ("GB", 1000_u128.pow(3)),
    ("GiB", 1024_u128.pow(3)),
    ("TB", 1000_u128.pow(4)),
    ("TiB", 1024_u128.pow(4)),
    ("PB", 1000_u128.pow(5)),
    ("PiB", 1024_u128.pow(5)),
];

impl FromStr for MemorySize {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ValidationError::MalformedValue {
            kind: ResourceKind::Memory,
            value: s.to_string(),
        };

        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let (amount, unit) = trimmed.split_at(split);
        let amount: u128 = amount.parse().map_err(|_| malformed())?;

        let unit = unit.trim();
        let factor = if unit.is_empty() {
            MIB
        } else {
            UNITS
                .iter()
                .find(|(name, _)| *name == unit)
                .map(|(_, factor)| *factor)
                .ok_or_else(malformed)?
        };

        amount
            .checked_mul(factor)
            .map(|bytes| Self { bytes })
            .ok_or_else(malformed)
    }
}
