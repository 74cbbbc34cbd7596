//! Configuration for kb-deploy
//!
//! Two concerns live here:
//! - the optional `deployment/config.toml` file (default environment plus
//!   infrastructure variables forwarded to terraform), and
//! - the validity predicate for the recognized infrastructure variables.
//!   Terraform carries its own validation expressions for these; this
//!   predicate mirrors them so invalid values are caught before any plan
//!   and so the property suite has a local oracle to compare against.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::context::Environment;
use crate::error::{DeployError, DeployResult};

/// Default project name baked into the infrastructure definition.
pub const DEFAULT_PROJECT_NAME: &str = "kb-engine";

/// Project name rules: 3-20 characters, lowercase letters, digits and
/// hyphens, no leading or trailing hyphen.
pub fn validate_project_name(name: &str) -> Result<(), String> {
    if name.len() < 3 {
        return Err(format!("must be at least 3 characters, got {}", name.len()));
    }
    if name.len() > 20 {
        return Err(format!("must be at most 20 characters, got {}", name.len()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("may only contain lowercase letters, digits, and hyphens".to_string());
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err("must not start or end with a hyphen".to_string());
    }
    Ok(())
}

/// Environment rule: one of dev, staging, prod.
pub fn validate_environment(value: &str) -> Result<(), String> {
    Environment::parse(value)
        .map(|_| ())
        .map_err(|_| format!("'{}' is not one of dev, staging, prod", value))
}

/// DNS name rules for the API gateway domain: at least two labels, each
/// 1-63 characters of letters, digits, and hyphens with no leading or
/// trailing hyphen, 253 characters total. A bare label without a dot is
/// rejected.
pub fn validate_domain(domain: &str) -> Result<(), String> {
    if domain.is_empty() {
        return Err("must not be empty".to_string());
    }
    if domain.len() > 253 {
        return Err(format!("must be at most 253 characters, got {}", domain.len()));
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return Err("must contain at least two dot-separated labels".to_string());
    }
    for label in labels {
        if label.is_empty() {
            return Err("must not contain empty labels".to_string());
        }
        if label.len() > 63 {
            return Err(format!("label '{}' exceeds 63 characters", label));
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(format!("label '{}' contains invalid characters", label));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(format!("label '{}' must not start or end with a hyphen", label));
        }
    }
    Ok(())
}

/// Infrastructure variables recognized by the terraform configuration.
///
/// `None` means "not provided" - terraform falls back to its own documented
/// default (`project_name = "kb-engine"`, `environment = "dev"`). The API
/// gateway domain has no default and is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct DeployVars {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_gateway_domain: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_gateway_stage: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloudfront_price_class: Option<String>,

    /// Free-form tags merged into every resource's tags.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

/// Validate a raw `name=value` pair against the rules for recognized
/// variable names. Unrecognized names pass through untouched - terraform
/// itself rejects those.
pub fn validate_var(name: &str, value: &str) -> Result<(), String> {
    match name {
        "project_name" => validate_project_name(value),
        "environment" => validate_environment(value),
        "api_gateway_domain" => validate_domain(value),
        _ => Ok(()),
    }
}

impl DeployVars {
    /// Validate the values that were provided, leaving absent ones to
    /// terraform's own defaults.
    pub fn validate_provided(&self) -> DeployResult<()> {
        if let Some(name) = &self.project_name {
            validate_project_name(name).map_err(|reason| DeployError::InvalidVariable {
                name: "project_name".to_string(),
                reason,
            })?;
        }
        if let Some(domain) = &self.api_gateway_domain {
            validate_domain(domain).map_err(|reason| DeployError::InvalidVariable {
                name: "api_gateway_domain".to_string(),
                reason,
            })?;
        }
        Ok(())
    }

    /// Full validation for a standalone variable set: everything provided
    /// must be valid, and the API gateway domain (which has no default)
    /// must be present.
    pub fn validate(&self) -> DeployResult<()> {
        self.validate_provided()?;
        if self.api_gateway_domain.is_none() {
            return Err(DeployError::InvalidVariable {
                name: "api_gateway_domain".to_string(),
                reason: "required but not provided".to_string(),
            });
        }
        Ok(())
    }

    /// Render the provided variables as `-var=<name>=<value>` arguments for
    /// terraform plan. Tags render as a JSON object.
    pub fn var_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(v) = &self.project_name {
            args.push(format!("-var=project_name={}", v));
        }
        if let Some(v) = &self.aws_region {
            args.push(format!("-var=aws_region={}", v));
        }
        if let Some(v) = &self.api_gateway_domain {
            args.push(format!("-var=api_gateway_domain={}", v));
        }
        if let Some(v) = &self.api_gateway_stage {
            args.push(format!("-var=api_gateway_stage={}", v));
        }
        if let Some(v) = &self.cloudfront_price_class {
            args.push(format!("-var=cloudfront_price_class={}", v));
        }
        if !self.tags.is_empty() {
            // serde_json::Map preserves BTreeMap ordering, keeping renders stable.
            let tags = serde_json::to_string(&self.tags).unwrap_or_else(|_| "{}".to_string());
            args.push(format!("-var=tags={}", tags));
        }
        args
    }
}

/// Deployment defaults section of `deployment/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeploySection {
    #[serde(default)]
    pub environment: Option<Environment>,
}

/// Top-level kb-deploy configuration file.
///
/// CLI flags take priority over config values; the file itself is optional
/// and absence falls back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub deploy: DeploySection,

    #[serde(default)]
    pub vars: DeployVars,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> DeployResult<Config> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
