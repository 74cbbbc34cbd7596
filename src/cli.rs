use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// kb-deploy - deployment automation for the KB Engine frontend
#[derive(Parser, Debug)]
#[command(name = "kb-deploy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format for CI
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Full deployment: build, provision, publish, invalidate
    Deploy {
        /// Deployment environment (dev, staging, prod)
        #[arg(short, long)]
        environment: Option<String>,

        /// Project root (auto-detected when omitted)
        #[arg(long)]
        project_root: Option<PathBuf>,

        /// Skip the frontend build step
        #[arg(long)]
        skip_build: bool,

        /// Skip terraform and read existing outputs
        #[arg(long)]
        skip_terraform: bool,
    },

    /// Quick publish to existing infrastructure (no provisioning)
    Publish {
        /// Deployment environment (dev, staging, prod)
        #[arg(short, long)]
        environment: Option<String>,

        /// Project root (auto-detected when omitted)
        #[arg(long)]
        project_root: Option<PathBuf>,

        /// Skip the frontend build step
        #[arg(long)]
        skip_build: bool,
    },

    /// Plan-only dry run against the infrastructure definition
    Plan {
        /// Project root (auto-detected when omitted)
        #[arg(long)]
        project_root: Option<PathBuf>,

        /// Variable override as name=value (repeatable)
        #[arg(long = "var", value_name = "NAME=VALUE")]
        vars: Vec<String>,
    },

    /// Check required tools and AWS credentials
    Check,

    /// Verify deployed infrastructure posture
    Verify {
        /// Bucket to check (falls back to TEST_S3_BUCKET_NAME, then
        /// terraform outputs)
        #[arg(long)]
        bucket: Option<String>,

        /// CDN URL to check (falls back to TEST_CLOUDFRONT_URL, then
        /// terraform outputs)
        #[arg(long)]
        url: Option<String>,

        /// Project root (auto-detected when omitted)
        #[arg(long)]
        project_root: Option<PathBuf>,
    },
}
