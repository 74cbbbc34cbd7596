//! Deployment orchestration: a linear stage machine with no back-edges.
//!
//! `Prerequisites -> Dependencies -> Build -> Provision -> Outputs ->
//! Publish -> Invalidate`. Any stage failure aborts the remaining pipeline
//! immediately; only invalidation downgrades to a warning.

use std::time::{Duration, Instant};

use thiserror::Error;

use crate::build::{build_frontend, install_dependencies};
use crate::context::DeploymentContext;
use crate::error::{DeployError, DeployResult};
use crate::prereq::check_prerequisites;
use crate::process::CommandRunner;
use crate::provision::{
    Provisioner, ProvisionerOutputs, OUTPUT_BUCKET, OUTPUT_DISTRIBUTION, OUTPUT_LOG_GROUP,
    OUTPUT_URL,
};
use crate::publish::{ArtifactPublisher, PublishSummary};

/// Pipeline stage, used for progress reporting and failure attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Prerequisites,
    Dependencies,
    Build,
    Provision,
    Outputs,
    Publish,
    Invalidate,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Prerequisites => "prerequisites",
            Stage::Dependencies => "dependencies",
            Stage::Build => "build",
            Stage::Provision => "provision",
            Stage::Outputs => "outputs",
            Stage::Publish => "publish",
            Stage::Invalidate => "invalidate",
        };
        f.write_str(name)
    }
}

/// Terminal failure state: the stage that failed plus the underlying error.
#[derive(Error, Debug)]
#[error("stage '{stage}' failed: {error}")]
pub struct StageFailure {
    pub stage: Stage,
    #[source]
    pub error: DeployError,
}

/// Progress events emitted while the pipeline runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageEvent {
    Started(Stage),
    Completed(Stage),
    Skipped(Stage),
    Warning(String),
}

/// Operator switches for a deployment run.
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    /// Reuse the existing build output instead of rebuilding.
    pub skip_build: bool,
    /// Read existing provisioner outputs instead of planning and applying.
    pub skip_terraform: bool,
    /// Extra `-var=` arguments forwarded to the plan step.
    pub extra_vars: Vec<String>,
}

/// Final success report with surfaced URLs and timings.
#[derive(Debug, Clone)]
pub struct DeploymentReport {
    pub environment: crate::context::Environment,
    pub started_at: chrono::DateTime<chrono::Local>,
    pub duration: Duration,
    pub stages: Vec<(Stage, Duration)>,
    pub publish: PublishSummary,
    pub invalidation_id: Option<String>,
    pub application_url: Option<String>,
    pub log_group: Option<String>,
    pub warnings: Vec<String>,
}

/// Sequences the deployment stages over a shared command runner.
pub struct Orchestrator<'a> {
    runner: &'a dyn CommandRunner,
    ctx: DeploymentContext,
    options: DeployOptions,
}

impl<'a> Orchestrator<'a> {
    pub fn new(runner: &'a dyn CommandRunner, ctx: DeploymentContext, options: DeployOptions) -> Self {
        Self { runner, ctx, options }
    }

    /// Run the pipeline without progress callbacks.
    pub fn run(&self) -> Result<DeploymentReport, StageFailure> {
        self.run_with_callback(|_| {})
    }

    /// Run the pipeline, emitting a [`StageEvent`] per transition.
    pub fn run_with_callback<F>(&self, mut callback: F) -> Result<DeploymentReport, StageFailure>
    where
        F: FnMut(StageEvent),
    {
        let started_at = chrono::Local::now();
        let run_timer = Instant::now();
        let mut stages: Vec<(Stage, Duration)> = Vec::new();
        let mut warnings: Vec<String> = Vec::new();

        self.ctx.ensure_log_dir().map_err(|error| StageFailure {
            stage: Stage::Prerequisites,
            error,
        })?;

        self.timed(Stage::Prerequisites, &mut stages, &mut callback, || {
            check_prerequisites(self.runner)
        })?;

        self.timed(Stage::Dependencies, &mut stages, &mut callback, || {
            install_dependencies(self.runner, &self.ctx)
        })?;

        if self.options.skip_build {
            callback(StageEvent::Skipped(Stage::Build));
        } else {
            self.timed(Stage::Build, &mut stages, &mut callback, || {
                build_frontend(self.runner, &self.ctx)
            })?;
        }

        let provisioner = Provisioner::new(self.runner, &self.ctx.terraform_dir);
        let outputs: ProvisionerOutputs = if self.options.skip_terraform {
            callback(StageEvent::Skipped(Stage::Provision));
            self.timed(Stage::Outputs, &mut stages, &mut callback, || {
                provisioner.read_outputs()
            })?
        } else {
            self.timed(Stage::Provision, &mut stages, &mut callback, || {
                provisioner.plan_and_apply(&self.ctx, &self.options.extra_vars)
            })?
        };

        // Deployment cannot proceed without a destination bucket.
        let bucket = outputs
            .require_str(OUTPUT_BUCKET)
            .map_err(|error| StageFailure {
                stage: Stage::Outputs,
                error,
            })?
            .to_string();

        let publisher = ArtifactPublisher::new(self.runner);
        let publish = self.timed(Stage::Publish, &mut stages, &mut callback, || {
            publisher.publish(&bucket, &self.ctx.build_dir)
        })?;

        let invalidation_id = match outputs.get_str(OUTPUT_DISTRIBUTION) {
            Some(distribution_id) => {
                callback(StageEvent::Started(Stage::Invalidate));
                let timer = Instant::now();
                match publisher.invalidate(distribution_id) {
                    Ok(id) => {
                        stages.push((Stage::Invalidate, timer.elapsed()));
                        callback(StageEvent::Completed(Stage::Invalidate));
                        Some(id)
                    }
                    Err(err) => {
                        let warning = format!("cache invalidation failed: {}", err);
                        tracing::warn!("{}", warning);
                        callback(StageEvent::Warning(warning.clone()));
                        warnings.push(warning);
                        None
                    }
                }
            }
            None => {
                let warning =
                    "cloudfront distribution id not found, skipping cache invalidation".to_string();
                tracing::warn!("{}", warning);
                callback(StageEvent::Warning(warning.clone()));
                warnings.push(warning);
                callback(StageEvent::Skipped(Stage::Invalidate));
                None
            }
        };

        Ok(DeploymentReport {
            environment: self.ctx.environment,
            started_at,
            duration: run_timer.elapsed(),
            stages,
            publish,
            invalidation_id,
            application_url: outputs.get_str(OUTPUT_URL).map(String::from),
            log_group: outputs.get_str(OUTPUT_LOG_GROUP).map(String::from),
            warnings,
        })
    }

    fn timed<T, F, C>(
        &self,
        stage: Stage,
        stages: &mut Vec<(Stage, Duration)>,
        callback: &mut C,
        f: F,
    ) -> Result<T, StageFailure>
    where
        F: FnOnce() -> DeployResult<T>,
        C: FnMut(StageEvent),
    {
        callback(StageEvent::Started(stage));
        let timer = Instant::now();
        match f() {
            Ok(value) => {
                stages.push((stage, timer.elapsed()));
                callback(StageEvent::Completed(stage));
                Ok(value)
            }
            Err(error) => Err(StageFailure { stage, error }),
        }
    }
}
