//! kb-deploy - deployment automation and infrastructure validation for the
//! KB Engine frontend.
//!
//! The pipeline builds the frontend bundle, provisions AWS infrastructure
//! through terraform, publishes the build output to S3 with cache-safe
//! ordering, and invalidates the CloudFront distribution. A separate set
//! of probes validates the deployed infrastructure's security posture.

pub mod build;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod prereq;
pub mod probe;
pub mod process;
pub mod provision;
pub mod publish;

// Re-exports for convenience
pub use config::{
    validate_domain, validate_environment, validate_project_name, validate_var, Config,
    DeployVars, DEFAULT_PROJECT_NAME,
};
pub use context::{DeploymentContext, Environment};
pub use error::{DeployError, DeployResult, ProvisionPhase};
pub use orchestrator::{
    DeployOptions, DeploymentReport, Orchestrator, Stage, StageEvent, StageFailure,
};
pub use prereq::{check_credentials, check_prerequisites, REQUIRED_TOOLS};
pub use probe::{run_verify, BucketProbe, CheckStatus, EndpointProbe, VerifyReport};
pub use process::{CommandResult, CommandRunner, Invocation, ProcessRunner};
pub use provision::{
    planned_resources, resource_tags, PlanOutcome, Provisioner, ProvisionerOutputs,
    OUTPUT_BUCKET, OUTPUT_DISTRIBUTION, OUTPUT_LOG_GROUP, OUTPUT_URL,
};
pub use publish::{
    ArtifactPublisher, PublishSummary, UploadPlan, UploadStep, ENTRY_POINT_FILE,
    LONG_LIVED_CACHE_CONTROL, NO_CACHE_CONTROL, SERVICE_WORKER_FILE,
};
