//! Pre-flight checks: required tools and AWS credentials.
//!
//! Runs before any destructive stage so a missing tool fails fast with its
//! name instead of surfacing mid-deployment.

use crate::error::{DeployError, DeployResult};
use crate::process::{CommandRunner, Invocation};

/// Tools the pipeline shells out to, with their version-probe argv.
pub const REQUIRED_TOOLS: [(&str, &[&str]); 4] = [
    ("Node.js", &["node", "--version"]),
    ("npm", &["npm", "--version"]),
    ("AWS CLI", &["aws", "--version"]),
    ("Terraform", &["terraform", "--version"]),
];

/// Verify every required tool is invocable.
///
/// The first failing probe short-circuits with [`DeployError::MissingTool`]
/// naming the missing tool.
pub fn check_prerequisites(runner: &dyn CommandRunner) -> DeployResult<()> {
    for (name, argv) in REQUIRED_TOOLS {
        let probe = Invocation::new(argv.iter().copied());
        let ok = match runner.run(&probe) {
            Ok(result) => result.success(),
            Err(_) => false,
        };
        if !ok {
            return Err(DeployError::MissingTool {
                tool: name.to_string(),
            });
        }
        tracing::info!(tool = name, "prerequisite ok");
    }
    Ok(())
}

/// Verify AWS credentials resolve to a caller identity.
pub fn check_credentials(runner: &dyn CommandRunner) -> DeployResult<()> {
    let probe = Invocation::new(["aws", "sts", "get-caller-identity"]);
    match runner.run(&probe) {
        Ok(result) if result.success() => Ok(()),
        Ok(result) => Err(DeployError::Credentials {
            stderr: result.stderr.trim().to_string(),
        }),
        Err(err) => Err(DeployError::Credentials {
            stderr: err.to_string(),
        }),
    }
}
