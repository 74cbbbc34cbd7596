//! Infrastructure provisioning via the terraform CLI.
//!
//! Terraform is treated as a black box exposing init/validate/plan/apply
//! and JSON outputs. Each phase failure aborts the cycle immediately and is
//! reported with the phase name and the tool's stderr - a partial apply is
//! never retried.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::context::DeploymentContext;
use crate::error::{DeployError, DeployResult, ProvisionPhase};
use crate::process::{CommandRunner, Invocation};

/// Output carrying the target bucket name. Publishing cannot proceed
/// without it.
pub const OUTPUT_BUCKET: &str = "s3_bucket_name";

/// Output carrying the CDN distribution id. Optional - absence downgrades
/// invalidation to a warning.
pub const OUTPUT_DISTRIBUTION: &str = "cloudfront_distribution_id";

/// Output carrying the public application URL, surfaced in the report.
pub const OUTPUT_URL: &str = "cloudfront_url";

/// Output naming the application log group, surfaced in the report.
pub const OUTPUT_LOG_GROUP: &str = "cloudwatch_log_group_app";

/// Plan file name used by the plan-to-file / apply-from-file cycle.
const PLAN_FILE: &str = "tfplan";

/// Flattened terraform outputs: output name to value.
///
/// Terraform emits `{name: {value, sensitive, type}}`; only `value` is
/// kept. Read-only to downstream stages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvisionerOutputs {
    values: BTreeMap<String, Value>,
}

impl ProvisionerOutputs {
    /// Parse and flatten `terraform output -json`.
    ///
    /// An entry without a `value` key is reported by name, not guessed at.
    pub fn from_output_json(json: &str) -> DeployResult<Self> {
        let raw: BTreeMap<String, Value> = serde_json::from_str(json)?;
        let mut values = BTreeMap::new();
        for (name, entry) in raw {
            match entry.get("value") {
                Some(value) => {
                    values.insert(name, value.clone());
                }
                None => {
                    return Err(DeployError::Provision {
                        phase: ProvisionPhase::Output,
                        stderr: format!("output '{}' has no 'value' key", name),
                    })
                }
            }
        }
        Ok(Self { values })
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// String value of an output, when present and a string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    /// String value of a required output.
    pub fn require_str(&self, name: &str) -> DeployResult<&str> {
        self.get_str(name).ok_or_else(|| DeployError::Configuration {
            output: name.to_string(),
        })
    }
}

/// Outcome of a plan-only dry run.
#[derive(Debug)]
pub enum PlanOutcome {
    /// The configuration planned successfully; `plan` is the structured
    /// plan from `terraform show -json`.
    Planned { plan: Value },
    /// The configuration was rejected statically, before any cloud call.
    Rejected { stderr: String },
}

impl PlanOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, PlanOutcome::Rejected { .. })
    }
}

/// Drives the terraform CLI against an infrastructure directory.
pub struct Provisioner<'a> {
    runner: &'a dyn CommandRunner,
    terraform_dir: PathBuf,
}

impl<'a> Provisioner<'a> {
    pub fn new(runner: &'a dyn CommandRunner, terraform_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            terraform_dir: terraform_dir.into(),
        }
    }

    fn phase(
        &self,
        phase: ProvisionPhase,
        cwd: &Path,
        argv: &[&str],
    ) -> DeployResult<crate::process::CommandResult> {
        let result = self
            .runner
            .run(&Invocation::new(argv.iter().copied()).current_dir(cwd))?;
        if result.success() {
            Ok(result)
        } else {
            Err(DeployError::Provision {
                phase,
                stderr: result.stderr.trim().to_string(),
            })
        }
    }

    /// Full provisioning cycle: init, validate, plan to file, apply from
    /// file, read outputs. `extra_vars` are appended to the plan arguments
    /// after the environment variable.
    pub fn plan_and_apply(
        &self,
        ctx: &DeploymentContext,
        extra_vars: &[String],
    ) -> DeployResult<ProvisionerOutputs> {
        let dir = &self.terraform_dir;

        self.phase(ProvisionPhase::Init, dir, &["terraform", "init"])?;
        self.phase(ProvisionPhase::Validate, dir, &["terraform", "validate"])?;

        let mut plan_argv: Vec<String> = vec![
            "terraform".to_string(),
            "plan".to_string(),
            format!("-var=environment={}", ctx.environment),
        ];
        plan_argv.extend(extra_vars.iter().cloned());
        plan_argv.push(format!("-out={}", PLAN_FILE));

        let plan = self
            .runner
            .run(&Invocation::new(plan_argv).current_dir(dir))?;
        if !plan.success() {
            return Err(DeployError::Provision {
                phase: ProvisionPhase::Plan,
                stderr: plan.stderr.trim().to_string(),
            });
        }

        self.phase(ProvisionPhase::Apply, dir, &["terraform", "apply", PLAN_FILE])?;

        self.read_outputs()
    }

    /// Read outputs from existing state without planning or applying.
    /// Used when the apply step is skipped by operator flag.
    pub fn read_outputs(&self) -> DeployResult<ProvisionerOutputs> {
        let result = self.phase(
            ProvisionPhase::Output,
            &self.terraform_dir,
            &["terraform", "output", "-json"],
        )?;
        ProvisionerOutputs::from_output_json(&result.stdout)
    }

    /// Read a single output as a raw string.
    pub fn read_output_raw(&self, name: &str) -> DeployResult<String> {
        let result = self.phase(
            ProvisionPhase::Output,
            &self.terraform_dir,
            &["terraform", "output", "-raw", name],
        )?;
        Ok(result.stdout.trim().to_string())
    }

    /// Plan-only dry run with variable overrides, in a disposable copy of
    /// the infrastructure directory so concurrent examples never share
    /// `.terraform` state or plan files. Never applies.
    ///
    /// A plan rejection is a successful outcome here ([`PlanOutcome::Rejected`]);
    /// only init failures and unreadable plans are errors.
    pub fn plan_only(&self, var_args: &[String]) -> DeployResult<PlanOutcome> {
        let workspace = tempfile::tempdir()?;
        copy_tree(&self.terraform_dir, workspace.path())?;

        self.phase(ProvisionPhase::Init, workspace.path(), &["terraform", "init"])?;

        let mut plan_argv: Vec<String> = vec!["terraform".to_string(), "plan".to_string()];
        plan_argv.extend(var_args.iter().cloned());
        plan_argv.push(format!("-out={}", PLAN_FILE));

        let plan = self
            .runner
            .run(&Invocation::new(plan_argv).current_dir(workspace.path()))?;
        if !plan.success() {
            return Ok(PlanOutcome::Rejected {
                stderr: plan.stderr.trim().to_string(),
            });
        }

        let show = self.phase(
            ProvisionPhase::Plan,
            workspace.path(),
            &["terraform", "show", "-json", PLAN_FILE],
        )?;
        let plan_json: Value = serde_json::from_str(&show.stdout)?;
        Ok(PlanOutcome::Planned { plan: plan_json })
    }
}

/// Planned resources from a `terraform show -json` document.
pub fn planned_resources(plan: &Value) -> Vec<&Value> {
    plan.pointer("/planned_values/root_module/resources")
        .and_then(Value::as_array)
        .map(|resources| resources.iter().collect())
        .unwrap_or_default()
}

/// Tags of a planned resource, when it carries any.
pub fn resource_tags(resource: &Value) -> Option<&serde_json::Map<String, Value>> {
    resource
        .pointer("/values/tags")
        .and_then(Value::as_object)
        .filter(|tags| !tags.is_empty())
}

/// Copy a directory tree, skipping the `.terraform` provider cache
/// (recreated by init in the destination).
fn copy_tree(src: &Path, dst: &Path) -> DeployResult<()> {
    let walker = ignore::WalkBuilder::new(src)
        .standard_filters(false)
        .filter_entry(|entry| entry.file_name() != ".terraform")
        .build();

    for entry in walker {
        let entry = entry.map_err(|e| {
            DeployError::Io(std::io::Error::other(e.to_string()))
        })?;
        let path = entry.path();
        let relative = path.strip_prefix(src).unwrap_or(path);
        if relative.as_os_str().is_empty() {
            continue;
        }
        let target = dst.join(relative);
        if entry.file_type().is_some_and(|ft| ft.is_dir()) {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(path, &target)?;
        }
    }
    Ok(())
}
