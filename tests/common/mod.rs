//! Shared test helpers for kb-deploy integration and property tests.
#![allow(dead_code)]

pub mod generators;

use std::path::PathBuf;

use tempfile::TempDir;

/// Builder for a throwaway frontend build directory.
pub struct BuildDirBuilder {
    files: Vec<(String, String)>,
}

impl BuildDirBuilder {
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    pub fn with_file(mut self, relative: &str, content: &str) -> Self {
        self.files.push((relative.to_string(), content.to_string()));
        self
    }

    pub fn build(self) -> TempDir {
        let dir = TempDir::new().expect("Failed to create build temp dir");
        for (relative, content) in &self.files {
            let path = dir.path().join(relative);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).expect("Failed to create parent dirs");
            }
            std::fs::write(&path, content).expect("Failed to write build file");
        }
        dir
    }
}

impl Default for BuildDirBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

/// Bucket of a deployed environment, when configured for live tests.
pub fn live_bucket() -> Option<String> {
    env_non_empty("TEST_S3_BUCKET_NAME")
}

/// CloudFront URL of a deployed environment, when configured.
pub fn live_cdn_url() -> Option<String> {
    env_non_empty("TEST_CLOUDFRONT_URL")
}

/// API gateway domain used by plan-only oracle runs.
pub fn test_api_domain() -> String {
    env_non_empty("TEST_API_DOMAIN").unwrap_or_else(|| "api.example.com".to_string())
}

/// Terraform configuration directory for plan-only oracle runs, when both
/// the directory and the terraform binary are available.
pub fn terraform_oracle_dir() -> Option<PathBuf> {
    let dir = PathBuf::from(env_non_empty("KB_DEPLOY_TERRAFORM_DIR")?);
    if !dir.is_dir() {
        return None;
    }
    let available = std::process::Command::new("terraform")
        .arg("--version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false);
    available.then_some(dir)
}

/// A key unique to this test process and moment, so concurrent live-test
/// runs against a shared bucket never interfere.
pub fn unique_object_key(prefix: &str) -> String {
    let nanos = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default();
    format!("{}-{:x}-{:x}", prefix, std::process::id(), nanos)
}
