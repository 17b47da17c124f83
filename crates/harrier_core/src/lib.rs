//! # Harrier Core
//! [![Crates.io](https://img.shields.io/crates/v/harrier_core.svg)](https://crates.io/crates/harrier_core)
//! [![Docs](https://docs.rs/harrier_core/badge.svg)](https://docs.rs/harrier_core/)
//!
//! Types, the job definition compiler and the launch state machine.
//!
//! - **[`map_resource_settings`](resources::map_resource_settings)**: Maps generic CPU, memory and GPU requests onto requirement records.
//! - **[`Backend`](validate::Backend)**: EC2 or Fargate, each with its own requirement validation.
//! - **[`JobDefinitionCompiler`](compiler::JobDefinitionCompiler)**: Builds a validated, immutable [`JobDefinition`](definition::JobDefinition).
//! - **[`Launcher`](launcher::Launcher)**: Registers, submits and polls a job through a [`BatchApi`](traits::BatchApi).
//!
//! ## Example
//!
//! ```no_run
//! use harrier_core::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! async fn run<C: BatchApi>(client: C) -> Result<JobRun, LaunchError> {
//!     let config = StepOperatorConfig {
//!         execution_role: "arn:aws:iam::123456789012:role/execution".into(),
//!         job_role: "arn:aws:iam::123456789012:role/job".into(),
//!         default_job_queue_name: "default-queue".into(),
//!     };
//!     let compiler = JobDefinitionCompiler::new(config.clone());
//!
//!     let definition = compiler.compile(CompileRequest {
//!         pipeline_name: "training".into(),
//!         step_name: "trainer".into(),
//!         image: "my-registry/trainer:latest".into(),
//!         command: vec!["python".into(), "train.py".into()],
//!         resources: ResourceSettings::default().with_cpu(2.0),
//!         ..Default::default()
//!     })?;
//!
//!     let launcher = Launcher::new(client, LauncherConfig::from(&config));
//!     launcher.launch(&definition, None, &CancellationToken::new()).await
//! }
//! ```

pub mod compiler;
pub mod config;
pub mod definition;
pub mod error;
pub mod job;
pub mod launcher;
pub mod resources;
pub mod traits;
pub mod validate;

pub mod prelude {
    pub use super::compiler::*;
    pub use super::config::*;
    pub use super::definition::*;
    pub use super::error::*;
    pub use super::job::*;
    pub use super::launcher::*;
    pub use super::resources::*;
    pub use super::traits::*;
    pub use super::validate::*;
}
