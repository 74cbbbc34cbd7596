//! Frontend build stage.
//!
//! Drives `npm ci` and `npm run build` with environment overrides scoped to
//! the build subprocess only - nothing process-wide is mutated.

use crate::context::DeploymentContext;
use crate::error::{DeployError, DeployResult};
use crate::process::{CommandRunner, Invocation};

/// Install frontend dependencies from the lockfile.
pub fn install_dependencies(
    runner: &dyn CommandRunner,
    ctx: &DeploymentContext,
) -> DeployResult<()> {
    runner.run_checked(&Invocation::new(["npm", "ci"]).current_dir(&ctx.project_root))?;
    Ok(())
}

/// Build the frontend bundle.
///
/// Runs non-strict so build stderr can be surfaced verbatim, then verifies
/// the build directory actually materialized - some build tools exit zero
/// without producing output.
pub fn build_frontend(runner: &dyn CommandRunner, ctx: &DeploymentContext) -> DeployResult<()> {
    let invocation = Invocation::new(["npm", "run", "build"])
        .current_dir(&ctx.project_root)
        .env("REACT_APP_ENV", ctx.environment.as_str())
        .env("NODE_ENV", "production");

    let result = runner.run(&invocation)?;
    if !result.success() {
        return Err(DeployError::Build {
            message: result.stderr.trim().to_string(),
        });
    }

    if !ctx.build_dir.is_dir() {
        return Err(DeployError::Build {
            message: format!(
                "build directory not found after build: {}",
                ctx.build_dir.display()
            ),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Environment;
    use crate::process::RecordingRunner;
    use tempfile::tempdir;

    fn context_with_build_dir(env: Environment) -> (tempfile::TempDir, DeploymentContext) {
        let dir = tempdir().unwrap();
        let ctx = DeploymentContext::new(dir.path(), env);
        std::fs::create_dir_all(&ctx.build_dir).unwrap();
        (dir, ctx)
    }

    #[test]
    fn build_sets_scoped_environment_overrides() {
        let (_dir, ctx) = context_with_build_dir(Environment::Staging);
        let runner = RecordingRunner::new();

        build_frontend(&runner, &ctx).unwrap();

        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 1);
        let env = calls[0].env_overrides();
        assert!(env.contains(&("REACT_APP_ENV".to_string(), "staging".to_string())));
        assert!(env.contains(&("NODE_ENV".to_string(), "production".to_string())));
    }

    #[test]
    fn build_failure_surfaces_stderr() {
        let (_dir, ctx) = context_with_build_dir(Environment::Dev);
        let runner = RecordingRunner::new();
        runner.fail("npm run build", 1, "Module not found: ./App");

        let err = build_frontend(&runner, &ctx).unwrap_err();
        match err {
            DeployError::Build { message } => assert_eq!(message, "Module not found: ./App"),
            other => panic!("expected Build, got {other}"),
        }
    }

    #[test]
    fn zero_exit_without_output_dir_is_a_build_error() {
        let dir = tempdir().unwrap();
        let ctx = DeploymentContext::new(dir.path(), Environment::Dev);
        let runner = RecordingRunner::new();

        let err = build_frontend(&runner, &ctx).unwrap_err();
        match err {
            DeployError::Build { message } => {
                assert!(message.contains("build directory not found"))
            }
            other => panic!("expected Build, got {other}"),
        }
    }

    #[test]
    fn install_runs_npm_ci_in_project_root() {
        let (_dir, ctx) = context_with_build_dir(Environment::Dev);
        let runner = RecordingRunner::new();

        install_dependencies(&runner, &ctx).unwrap();

        let calls = runner.calls.borrow();
        assert_eq!(calls[0].display(), "npm ci");
        assert_eq!(calls[0].cwd(), Some(ctx.project_root.as_path()));
    }

    #[test]
    fn install_failure_propagates_as_command_failed() {
        let (_dir, ctx) = context_with_build_dir(Environment::Dev);
        let runner = RecordingRunner::new();
        runner.fail("npm ci", 1, "lockfile out of date");

        assert!(matches!(
            install_dependencies(&runner, &ctx),
            Err(DeployError::CommandFailed { .. })
        ));
    }
}
