//! Artifact publishing: cache-safe upload to the object store and CDN
//! invalidation.
//!
//! The ordering is load-bearing: fingerprinted assets must be live before
//! the entry point that references them is overwritten, otherwise a client
//! could fetch a stale entry point pointing at assets not yet uploaded. The
//! entry point and service worker are never edge-cached so every fetch
//! re-resolves the current asset graph.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{DeployError, DeployResult};
use crate::process::{CommandRunner, Invocation};

/// Root document served for navigation requests.
pub const ENTRY_POINT_FILE: &str = "index.html";

/// Service worker script, also never cached.
pub const SERVICE_WORKER_FILE: &str = "service-worker.js";

/// Cache directive for fingerprinted immutable assets.
pub const LONG_LIVED_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Cache directive for the entry point and service worker.
pub const NO_CACHE_CONTROL: &str = "no-cache, no-store, must-revalidate";

/// One ordered step of the publish algorithm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStep {
    /// Mirrored sync of the build tree (deletes remote keys absent
    /// locally), excluding the no-cache files.
    Sync {
        source: PathBuf,
        cache_control: &'static str,
        excludes: [&'static str; 2],
    },
    /// Individual upload of a single no-cache file.
    Copy {
        source: PathBuf,
        cache_control: &'static str,
    },
}

/// Ordered publish plan for a build directory.
///
/// Invariants: exactly one leading `Sync` step excluding the entry point
/// and service worker; a `Copy` step per special file that exists, entry
/// point before service worker; nothing else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPlan {
    steps: Vec<UploadStep>,
    asset_count: usize,
}

impl UploadPlan {
    /// Compute the plan for `build_dir`.
    pub fn for_build_dir(build_dir: &Path) -> DeployResult<UploadPlan> {
        if !build_dir.is_dir() {
            return Err(DeployError::MissingPath {
                what: "build directory",
                path: build_dir.to_path_buf(),
            });
        }

        let mut steps = vec![UploadStep::Sync {
            source: build_dir.to_path_buf(),
            cache_control: LONG_LIVED_CACHE_CONTROL,
            excludes: [ENTRY_POINT_FILE, SERVICE_WORKER_FILE],
        }];

        for special in [ENTRY_POINT_FILE, SERVICE_WORKER_FILE] {
            let source = build_dir.join(special);
            if source.is_file() {
                steps.push(UploadStep::Copy {
                    source,
                    cache_control: NO_CACHE_CONTROL,
                });
            }
        }

        Ok(UploadPlan {
            steps,
            asset_count: count_assets(build_dir),
        })
    }

    pub fn steps(&self) -> &[UploadStep] {
        &self.steps
    }

    /// Files covered by the bulk sync (the exclusions only apply to the
    /// top-level entry point and service worker keys).
    pub fn asset_count(&self) -> usize {
        self.asset_count
    }

    /// Human-readable step list for the deploy log.
    pub fn describe(&self) -> String {
        let mut lines = Vec::new();
        for step in &self.steps {
            match step {
                UploadStep::Sync { cache_control, excludes, .. } => {
                    lines.push(format!(
                        "sync {} assets ({}) excluding {}",
                        self.asset_count,
                        cache_control,
                        excludes.join(", ")
                    ));
                }
                UploadStep::Copy { source, cache_control } => {
                    let name = source
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default();
                    lines.push(format!("copy {} ({})", name, cache_control));
                }
            }
        }
        lines.join("\n")
    }
}

/// Count files under the build tree, excluding the top-level entry point
/// and service worker.
fn count_assets(build_dir: &Path) -> usize {
    let walker = ignore::WalkBuilder::new(build_dir)
        .standard_filters(false)
        .build();
    walker
        .flatten()
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .filter(|entry| {
            let relative = entry.path().strip_prefix(build_dir).unwrap_or(entry.path());
            relative != Path::new(ENTRY_POINT_FILE) && relative != Path::new(SERVICE_WORKER_FILE)
        })
        .count()
}

/// Outcome of a publish run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSummary {
    pub bucket: String,
    pub synced_assets: usize,
    pub entry_point_uploaded: bool,
    pub service_worker_uploaded: bool,
}

#[derive(Debug, Deserialize)]
struct InvalidationResponse {
    #[serde(rename = "Invalidation")]
    invalidation: InvalidationBody,
}

#[derive(Debug, Deserialize)]
struct InvalidationBody {
    #[serde(rename = "Id")]
    id: String,
}

/// Executes upload plans and CDN invalidations through the AWS CLI.
pub struct ArtifactPublisher<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> ArtifactPublisher<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// Execute the publish algorithm against `bucket`, strictly in plan
    /// order.
    pub fn publish(&self, bucket: &str, build_dir: &Path) -> DeployResult<PublishSummary> {
        let plan = UploadPlan::for_build_dir(build_dir)?;
        let destination = format!("s3://{}/", bucket);

        let mut summary = PublishSummary {
            bucket: bucket.to_string(),
            synced_assets: plan.asset_count(),
            entry_point_uploaded: false,
            service_worker_uploaded: false,
        };

        for step in plan.steps() {
            let invocation = match step {
                UploadStep::Sync { source, cache_control, excludes } => {
                    let mut argv = vec![
                        "aws".to_string(),
                        "s3".to_string(),
                        "sync".to_string(),
                        source.display().to_string(),
                        destination.clone(),
                        "--delete".to_string(),
                        "--cache-control".to_string(),
                        cache_control.to_string(),
                    ];
                    for exclude in excludes {
                        argv.push("--exclude".to_string());
                        argv.push(exclude.to_string());
                    }
                    Invocation::new(argv)
                }
                UploadStep::Copy { source, cache_control } => Invocation::new([
                    "aws".to_string(),
                    "s3".to_string(),
                    "cp".to_string(),
                    source.display().to_string(),
                    destination.clone(),
                    "--cache-control".to_string(),
                    cache_control.to_string(),
                ]),
            };

            let result = self.runner.run(&invocation)?;
            if !result.success() {
                return Err(DeployError::Upload {
                    bucket: bucket.to_string(),
                    message: result.stderr.trim().to_string(),
                });
            }

            if let UploadStep::Copy { source, .. } = step {
                match source.file_name().and_then(|n| n.to_str()) {
                    Some(ENTRY_POINT_FILE) => summary.entry_point_uploaded = true,
                    Some(SERVICE_WORKER_FILE) => summary.service_worker_uploaded = true,
                    _ => {}
                }
            }
        }

        Ok(summary)
    }

    /// Issue a full-path CDN invalidation, returning the invalidation id.
    ///
    /// Callers treat failure as a warning: stale edge caches self-heal
    /// within their TTL.
    pub fn invalidate(&self, distribution_id: &str) -> DeployResult<String> {
        let result = self.runner.run_checked(&Invocation::new([
            "aws",
            "cloudfront",
            "create-invalidation",
            "--distribution-id",
            distribution_id,
            "--paths",
            "/*",
        ]))?;

        let response: InvalidationResponse = serde_json::from_str(&result.stdout)?;
        Ok(response.invalidation.id)
    }
}
