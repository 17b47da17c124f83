//! # Harrier
//![![License](https://img.shields.io/badge/license-MIT%2FApache-blue.svg)](https://github.com/harrier-rs/harrier?tab=readme-ov-file#license)
//![![Crates.io](https://img.shields.io/crates/v/harrier.svg)](https://crates.io/crates/harrier)
//![![Docs](https://docs.rs/harrier/badge.svg)](https://docs.rs/harrier/)
//!
//! Compiles a "run this container remotely" request into a validated AWS Batch job
//! definition, submits it and tracks it until it succeeds or fails.
//!
//! This crate serves as an entry point, re-exporting the core logic and
//! optionally including the AWS client via feature flags.
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | **`aws`** | AWS Batch client built on `aws-sdk-batch` (`harrier_compute_aws`). |
//!
//! ## Example
//!
//! ```toml
//! [dependencies]
//! harrier = { version = "0.3", features = ["aws"] }
//! ```
//!
//! ```rust,ignore
//! use harrier::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = StepOperatorConfig {
//!         execution_role: "arn:aws:iam::123456789012:role/execution".into(),
//!         job_role: "arn:aws:iam::123456789012:role/job".into(),
//!         default_job_queue_name: "fargate-queue".into(),
//!     };
//!
//!     // Compile
//!     let definition = JobDefinitionCompiler::new(config.clone()).compile(CompileRequest {
//!         pipeline_name: "training".into(),
//!         step_name: "evaluate".into(),
//!         image: "123456789012.dkr.ecr.eu-west-1.amazonaws.com/app:latest".into(),
//!         command: vec!["python".into(), "evaluate.py".into()],
//!         resources: ResourceSettings::default().with_cpu(1.0).with_memory("4GiB".parse()?),
//!         settings: StepSettings {
//!             backend: Backend::Fargate,
//!             ..Default::default()
//!         },
//!         ..Default::default()
//!     })?;
//!
//!     // Launch
//!     let aws = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
//!     let launcher = Launcher::new(AwsBatchClient::new(&aws), LauncherConfig::from(&config));
//!     let run = launcher.launch(&definition, None, &CancellationToken::new()).await?;
//!     println!("{} finished with {}", run.job_id, run.status);
//!     Ok(())
//! }
//! ```

pub use harrier_core::*;

#[cfg(feature = "aws")]
pub mod aws {
    pub use harrier_compute_aws::*;
}

pub mod prelude {
    pub use harrier_core::prelude::*;

    #[cfg(feature = "aws")]
    pub use harrier_compute_aws::AwsBatchClient;
}
