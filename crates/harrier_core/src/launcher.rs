//! Registration, submission and status tracking of a single job.
//!
//! A launch moves through `REGISTERED -> SUBMITTED -> (RUNNABLE | STARTING | RUNNING)* ->
//! SUCCEEDED | FAILED`. Describe errors, cancellation and an exceeded `max_wait` end the
//! launch locally (aborted) without waiting for a terminal status.

use crate::config::LauncherConfig;
use crate::definition::JobDefinition;
use crate::error::{BatchError, LaunchError};
use crate::job::{JobRun, JobStatus, RegisteredDefinition, SubmitJobRequest};
use crate::traits::BatchApi;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct Launcher<C> {
    client: C,
    config: LauncherConfig,
}

impl<C: BatchApi> Launcher<C> {
    pub fn new(client: C, config: LauncherConfig) -> Self {
        Self { client, config }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    /// Registers, submits and tracks `definition` until it reaches a terminal status.
    ///
    /// `job_queue` falls back to the queue from the step settings, then to the
    /// configured default queue. Cancelling `cancel`
    /// stops the poll loop before the next describe call; the remote job itself
    /// is left alone.
    pub async fn launch(
        &self,
        definition: &JobDefinition,
        job_queue: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<JobRun, LaunchError> {
        definition.log();

        let registered = self.register(definition).await?;
        let mut run = self.submit(definition, &registered, job_queue).await?;
        self.track(&mut run, cancel).await?;

        Ok(run)
    }

    /// Registers the definition. Failures are not retried.
    pub async fn register(
        &self,
        definition: &JobDefinition,
    ) -> Result<RegisteredDefinition, LaunchError> {
        let registered = self
            .client
            .register_job_definition(definition)
            .await
            .map_err(|e| {
                error!("Failed to register job definition {}: {e}", definition.name());
                LaunchError::Registration(e)
            })?;

        info!(
            "Registered job definition {} (revision {})",
            registered.name, registered.revision
        );
        Ok(registered)
    }

    /// Submits a job for a registered definition. Failures are not retried.
    pub async fn submit(
        &self,
        definition: &JobDefinition,
        registered: &RegisteredDefinition,
        job_queue: Option<&str>,
    ) -> Result<JobRun, LaunchError> {
        let queue = job_queue
            .filter(|q| !q.is_empty())
            .or(definition.job_queue())
            .unwrap_or(self.config.default_job_queue_name.as_str());

        if queue.is_empty() {
            return Err(LaunchError::Submission(BatchError::InvalidRequest(
                "No job queue given and no default job queue configured".into(),
            )));
        }

        let request = SubmitJobRequest {
            job_name: definition.name().to_string(),
            job_queue: queue.to_string(),
            job_definition: registered.arn.clone(),
        };

        let submitted = self.client.submit_job(&request).await.map_err(|e| {
            error!("Failed to submit job {} to {queue}: {e}", request.job_name);
            LaunchError::Submission(e)
        })?;

        info!("Submitted job {} ({}) to queue {queue}", submitted.job_name, submitted.job_id);
        Ok(JobRun::submitted(submitted, registered.arn.clone(), request.job_queue))
    }

    /// Polls the job until it succeeds, fails, or the loop is aborted.
    pub async fn track(&self, run: &mut JobRun, cancel: &CancellationToken) -> Result<(), LaunchError> {
        let started = Instant::now();
        let interval = self.config.poll_interval;

        loop {
            if cancel.is_cancelled() {
                warn!("Stopped tracking job {}: cancelled", run.job_id);
                return Err(LaunchError::Cancelled {
                    job_id: run.job_id.clone(),
                });
            }

            if let Some(max_wait) = self.config.max_wait {
                let elapsed = started.elapsed();
                if elapsed >= max_wait {
                    warn!("Stopped tracking job {} after {elapsed:?}", run.job_id);
                    return Err(LaunchError::TimedOut {
                        job_id: run.job_id.clone(),
                        elapsed,
                    });
                }
            }

            let desc = match self.client.describe_job(&run.job_id).await {
                Ok(desc) => desc,
                Err(e) => {
                    error!("Failed to describe job {}: {e}", run.job_id);
                    return Err(LaunchError::Describe {
                        job_id: run.job_id.clone(),
                        source: e,
                    });
                }
            };
            run.refresh(desc);

            match &run.status {
                JobStatus::Succeeded => {
                    match run.run_time() {
                        Some(t) => info!(
                            "Job completed successfully: {} (ran for {}s)",
                            run.job_id,
                            t.num_seconds()
                        ),
                        None => info!("Job completed successfully: {}", run.job_id),
                    }
                    return Ok(());
                }
                JobStatus::Failed => {
                    let reason = run
                        .status_reason
                        .clone()
                        .unwrap_or_else(|| "Unknown".to_string());
                    error!("Job {} failed: {reason}", run.job_id);
                    return Err(LaunchError::JobFailed {
                        job_id: run.job_id.clone(),
                        reason,
                    });
                }
                status => {
                    if let JobStatus::Unknown(s) = status {
                        warn!("Job {} reported unrecognized status {s}", run.job_id);
                    }
                    info!(
                        "Job {} neither failed nor succeeded. Status: {status}. Status reason: {}. Waiting another {}s.",
                        run.job_id,
                        run.status_reason.as_deref().unwrap_or("Unknown"),
                        interval.as_secs()
                    );
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }
}
