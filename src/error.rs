//! Error types for kb-deploy
//!
//! Uses `thiserror` for library errors. Every fatal error aborts the
//! remaining pipeline; nothing is retried automatically, since re-running a
//! partially-applied infrastructure change or a partially-synced bucket
//! needs explicit operator intent.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for kb-deploy operations
pub type DeployResult<T> = Result<T, DeployError>;

/// Phase of the infrastructure provisioning cycle that failed.
///
/// Validation failures (`Init`, `Validate`, `Plan`) never touched cloud
/// state; `Apply` and `Output` failures may leave partially-applied state
/// behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionPhase {
    Init,
    Validate,
    Plan,
    Apply,
    Output,
}

impl std::fmt::Display for ProvisionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProvisionPhase::Init => write!(f, "init"),
            ProvisionPhase::Validate => write!(f, "validate"),
            ProvisionPhase::Plan => write!(f, "plan"),
            ProvisionPhase::Apply => write!(f, "apply"),
            ProvisionPhase::Output => write!(f, "output"),
        }
    }
}

/// Main error type for kb-deploy operations
#[derive(Error, Debug)]
pub enum DeployError {
    /// A required external tool is not invocable
    #[error("required tool '{tool}' is not installed or not in PATH")]
    MissingTool { tool: String },

    /// An external command exited non-zero in strict mode
    #[error("command `{command}` failed with exit code {code}: {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    /// AWS credentials are missing or invalid
    #[error("AWS credentials are not configured: {stderr}")]
    Credentials { stderr: String },

    /// Frontend build failed, or succeeded without producing output
    #[error("frontend build failed: {message}")]
    Build { message: String },

    /// A phase of the terraform init/validate/plan/apply/output cycle failed
    #[error("terraform {phase} failed: {stderr}")]
    Provision {
        phase: ProvisionPhase,
        stderr: String,
    },

    /// A required provisioner output is absent
    #[error("required output '{output}' not found in terraform outputs")]
    Configuration { output: String },

    /// Artifact upload to the object store failed
    #[error("upload to bucket '{bucket}' failed: {message}")]
    Upload { bucket: String, message: String },

    /// An invalid infrastructure variable value
    #[error("invalid value for variable '{name}': {reason}")]
    InvalidVariable { name: String, reason: String },

    /// An expected directory or file is missing
    #[error("{what} not found: {path}")]
    MissingPath { what: &'static str, path: PathBuf },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("config parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// HTTP probe failed
    #[error("HTTP probe failed: {0}")]
    Http(#[from] reqwest::Error),
}
