use harrier_compute_aws::AwsBatchClient;
use harrier_core::prelude::*;

use anyhow::{Context, Result, bail};
use aws_config::BehaviorVersion;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "harrier", version, about = "Run containerized steps on AWS Batch")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and print the job definition without contacting AWS
    Compile(JobArgs),
    /// Register, submit and track a job until it finishes
    Run {
        #[command(flatten)]
        job: JobArgs,

        /// Queue used when --job-queue is not given
        #[arg(long, env = "HARRIER_DEFAULT_JOB_QUEUE")]
        default_job_queue: String,

        /// Seconds between status polls
        #[arg(long, default_value_t = 10)]
        poll_interval: u64,

        /// Give up tracking after this many seconds (the job keeps running)
        #[arg(long)]
        max_wait: Option<u64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    Ec2,
    Fargate,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Ec2 => Backend::Ec2,
            BackendArg::Fargate => Backend::Fargate,
        }
    }
}

#[derive(Args)]
struct JobArgs {
    #[arg(long, env = "HARRIER_PIPELINE")]
    pipeline: String,

    #[arg(long, env = "HARRIER_STEP")]
    step: String,

    /// Image reference, e.g. 123456789012.dkr.ecr.eu-west-1.amazonaws.com/app:latest
    #[arg(long, env = "HARRIER_IMAGE")]
    image: String,

    #[arg(long, value_enum, default_value = "ec2", env = "HARRIER_BACKEND")]
    backend: BackendArg,

    #[arg(long, env = "HARRIER_JOB_ROLE")]
    job_role: String,

    #[arg(long, env = "HARRIER_EXECUTION_ROLE")]
    execution_role: String,

    #[arg(long, env = "HARRIER_JOB_QUEUE")]
    job_queue: Option<String>,

    /// Number of vCPUs, e.g. 0.5 or 2
    #[arg(long)]
    cpu: Option<f64>,

    /// Memory, e.g. 2048, 4GiB or 512MiB
    #[arg(long)]
    memory: Option<MemorySize>,

    #[arg(long)]
    gpus: Option<u32>,

    /// Environment variables as KEY=VALUE, repeatable
    #[arg(long = "env", short = 'e', value_parser = parse_key_val)]
    env: Vec<(String, String)>,

    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECONDS)]
    timeout: u64,

    #[arg(long, default_value_t = DEFAULT_RETRY_ATTEMPTS)]
    retry_attempts: u32,

    /// Do not assign a public IP (Fargate only)
    #[arg(long)]
    no_public_ip: bool,

    /// Tags as KEY=VALUE, repeatable
    #[arg(long = "tag", value_parser = parse_key_val)]
    tags: Vec<(String, String)>,

    /// Command to run in the container
    #[arg(last = true, required = true)]
    command: Vec<String>,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))
}

impl JobArgs {
    fn compile(self, default_job_queue: &str) -> Result<(JobDefinition, StepOperatorConfig)> {
        let config = StepOperatorConfig {
            execution_role: self.execution_role,
            job_role: self.job_role,
            default_job_queue_name: default_job_queue.to_string(),
        };

        let settings = StepSettings {
            backend: self.backend.into(),
            job_queue_name: self.job_queue,
            timeout_seconds: self.timeout,
            assign_public_ip: !self.no_public_ip,
            tags: self.tags.into_iter().collect(),
            ..Default::default()
        };

        let resources = ResourceSettings {
            cpu_count: self.cpu,
            memory_mib: self.memory.map(|m| m.mib()),
            gpu_count: self.gpus,
        };

        let defaults = JobDefaults {
            retry_strategy: RetryStrategy {
                attempts: self.retry_attempts,
                ..Default::default()
            },
            ..Default::default()
        };

        let definition = JobDefinitionCompiler::new(config.clone())
            .with_defaults(defaults)
            .compile(CompileRequest {
                pipeline_name: self.pipeline,
                step_name: self.step,
                image: self.image,
                command: self.command,
                environment: self.env,
                resources,
                secrets: Vec::new(),
                settings,
            })
            .context("Invalid job definition")?;

        for note in definition.notes() {
            info!("{note}");
        }

        Ok((definition, config))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compile(job) => {
            let (definition, _) = job.compile("")?;
            println!("{}", serde_json::to_string_pretty(&definition)?);
        }
        Commands::Run {
            job,
            default_job_queue,
            poll_interval,
            max_wait,
        } => {
            let (definition, config) = job.compile(&default_job_queue)?;

            let aws_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
            let client = AwsBatchClient::new(&aws_config);

            let mut launcher_config =
                LauncherConfig::from(&config).with_poll_interval(Duration::from_secs(poll_interval));
            if let Some(secs) = max_wait {
                launcher_config = launcher_config.with_max_wait(Duration::from_secs(secs));
            }
            let launcher = Launcher::new(client, launcher_config);

            let cancel = CancellationToken::new();
            tokio::spawn({
                let cancel = cancel.clone();
                async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        warn!("Interrupted, stopping the poll loop. The remote job is not cancelled.");
                        cancel.cancel();
                    }
                }
            });

            match launcher.launch(&definition, None, &cancel).await {
                Ok(run) => println!("{} {} {}", run.job_id, run.job_name, run.status),
                Err(LaunchError::JobFailed { job_id, reason }) => {
                    bail!("Job {job_id} failed: {reason}")
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}
