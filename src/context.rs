//! Deployment context - immutable per-run path layout and environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DeployError, DeployResult};

/// Target deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Dev,
    Staging,
    Prod,
}

impl Environment {
    /// All recognized environments, in promotion order.
    pub const ALL: [Environment; 3] = [Environment::Dev, Environment::Staging, Environment::Prod];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Staging => "staging",
            Environment::Prod => "prod",
        }
    }

    /// Parse an environment name, rejecting anything outside the enum.
    pub fn parse(s: &str) -> DeployResult<Environment> {
        match s {
            "dev" => Ok(Environment::Dev),
            "staging" => Ok(Environment::Staging),
            "prod" => Ok(Environment::Prod),
            other => Err(DeployError::InvalidVariable {
                name: "environment".to_string(),
                reason: format!("'{}' is not one of dev, staging, prod", other),
            }),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Environment {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Environment::parse(s)
    }
}

/// Immutable per-run deployment context.
///
/// Created once at startup from the project root and target environment;
/// all stages read from it and none mutate it.
#[derive(Debug, Clone)]
pub struct DeploymentContext {
    pub environment: Environment,
    pub project_root: PathBuf,
    pub build_dir: PathBuf,
    pub terraform_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl DeploymentContext {
    /// Build a context rooted at `project_root`.
    pub fn new(project_root: impl Into<PathBuf>, environment: Environment) -> Self {
        let project_root = project_root.into();
        Self {
            environment,
            build_dir: project_root.join("build"),
            terraform_dir: project_root.join("terraform"),
            log_dir: project_root.join("deployment/logs"),
            project_root,
        }
    }

    /// Locate the project root starting from `start`.
    ///
    /// Accepts `start` itself when it contains a `terraform/` directory,
    /// otherwise probes one level down for a child that does. Mirrors how
    /// the quick-publish flow can be run from either the frontend directory
    /// or its parent.
    pub fn locate(start: &Path, environment: Environment) -> DeployResult<Self> {
        if start.join("terraform").is_dir() {
            return Ok(Self::new(start, environment));
        }

        let entries = std::fs::read_dir(start)?;
        for entry in entries.flatten() {
            let candidate = entry.path();
            if candidate.is_dir() && candidate.join("terraform").is_dir() {
                return Ok(Self::new(candidate, environment));
            }
        }

        Err(DeployError::MissingPath {
            what: "terraform directory",
            path: start.join("terraform"),
        })
    }

    /// Ensure the log directory exists before the pipeline runs.
    pub fn ensure_log_dir(&self) -> DeployResult<()> {
        std::fs::create_dir_all(&self.log_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn environment_parse_accepts_known_names() {
        assert_eq!(Environment::parse("dev").unwrap(), Environment::Dev);
        assert_eq!(Environment::parse("staging").unwrap(), Environment::Staging);
        assert_eq!(Environment::parse("prod").unwrap(), Environment::Prod);
    }

    #[test]
    fn environment_parse_rejects_unknown_names() {
        assert!(Environment::parse("production").is_err());
        assert!(Environment::parse("DEV").is_err());
        assert!(Environment::parse("").is_err());
    }

    #[test]
    fn environment_display_round_trips() {
        for env in Environment::ALL {
            assert_eq!(Environment::parse(env.as_str()).unwrap(), env);
        }
    }

    #[test]
    fn context_paths_derive_from_root() {
        let ctx = DeploymentContext::new("/srv/kb", Environment::Staging);
        assert_eq!(ctx.build_dir, PathBuf::from("/srv/kb/build"));
        assert_eq!(ctx.terraform_dir, PathBuf::from("/srv/kb/terraform"));
        assert_eq!(ctx.log_dir, PathBuf::from("/srv/kb/deployment/logs"));
    }

    #[test]
    fn locate_accepts_root_with_terraform_dir() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("terraform")).unwrap();

        let ctx = DeploymentContext::locate(dir.path(), Environment::Dev).unwrap();
        assert_eq!(ctx.project_root, dir.path());
    }

    #[test]
    fn locate_probes_one_level_down() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("frontend/terraform")).unwrap();

        let ctx = DeploymentContext::locate(dir.path(), Environment::Dev).unwrap();
        assert_eq!(ctx.project_root, dir.path().join("frontend"));
    }

    #[test]
    fn locate_fails_without_terraform_dir() {
        let dir = tempdir().unwrap();
        let result = DeploymentContext::locate(dir.path(), Environment::Dev);
        assert!(matches!(result, Err(DeployError::MissingPath { .. })));
    }
}
