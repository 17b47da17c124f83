use crate::definition::JobDefinition;
use crate::error::BatchError;
use crate::job::{JobDescription, RegisteredDefinition, SubmitJobRequest, SubmittedJob};

/// A trait for injecting the batch service client into the launcher.
///
/// Implementations are shared between concurrent launches and must be safe
/// to use from several tasks at once. Any retrying of individual calls is up
/// to the implementation (e.g. the SDK's retry policy).
pub trait BatchApi: Send + Sync + 'static + Clone {
    /// Registers a job definition and returns its backend assigned identity.
    fn register_job_definition(
        &self,
        definition: &JobDefinition,
    ) -> impl Future<Output = Result<RegisteredDefinition, BatchError>> + Send;

    /// Submits a job referencing a registered definition.
    fn submit_job(
        &self,
        request: &SubmitJobRequest,
    ) -> impl Future<Output = Result<SubmittedJob, BatchError>> + Send;

    /// Fetches the current state of a job.
    fn describe_job(
        &self,
        job_id: &str,
    ) -> impl Future<Output = Result<JobDescription, BatchError>> + Send;
}
