//! Live infrastructure probes.
//!
//! Read-only checks against deployed infrastructure: bucket security
//! posture through `aws s3api`, and CDN/TLS/API behavior through HTTP.
//! Results are collected into a pass/warn/fail [`VerifyReport`]; an
//! unreachable endpoint is a warning, a reachable-but-misconfigured one is
//! an error.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::DeployResult;
use crate::process::{CommandRunner, Invocation};

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Status of a single verification check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warning,
    Error,
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckStatus::Pass => write!(f, "✓"),
            CheckStatus::Warning => write!(f, "⚠"),
            CheckStatus::Error => write!(f, "✗"),
        }
    }
}

/// A single verification check result
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyCheck {
    pub area: String,
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
}

/// Verification results across all probed areas
#[derive(Debug, Clone, Default)]
pub struct VerifyReport {
    pub checks: Vec<VerifyCheck>,
}

impl VerifyReport {
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    pub fn add_pass(&mut self, area: &str, name: &str, message: &str) {
        self.add(area, name, CheckStatus::Pass, message);
    }

    pub fn add_warning(&mut self, area: &str, name: &str, message: &str) {
        self.add(area, name, CheckStatus::Warning, message);
    }

    pub fn add_error(&mut self, area: &str, name: &str, message: &str) {
        self.add(area, name, CheckStatus::Error, message);
    }

    fn add(&mut self, area: &str, name: &str, status: CheckStatus, message: &str) {
        self.checks.push(VerifyCheck {
            area: area.to_string(),
            name: name.to_string(),
            status,
            message: message.to_string(),
        });
    }

    pub fn passes(&self) -> usize {
        self.count(CheckStatus::Pass)
    }

    pub fn warnings(&self) -> usize {
        self.count(CheckStatus::Warning)
    }

    pub fn errors(&self) -> usize {
        self.count(CheckStatus::Error)
    }

    pub fn is_success(&self) -> bool {
        self.errors() == 0
    }

    fn count(&self, status: CheckStatus) -> usize {
        self.checks.iter().filter(|c| c.status == status).count()
    }
}

/// Public-access-block flags of a bucket. All four must be enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct PublicAccessBlock {
    pub block_public_acls: bool,
    pub ignore_public_acls: bool,
    pub block_public_policy: bool,
    pub restrict_public_buckets: bool,
}

impl PublicAccessBlock {
    pub fn fully_blocked(&self) -> bool {
        self.block_public_acls
            && self.ignore_public_acls
            && self.block_public_policy
            && self.restrict_public_buckets
    }
}

/// One version of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectVersion {
    pub key: String,
    pub version_id: String,
    #[serde(default)]
    pub is_latest: bool,
}

/// Read-only (plus scoped write for the versioning round-trip) bucket
/// operations through `aws s3api`.
pub struct BucketProbe<'a> {
    runner: &'a dyn CommandRunner,
    bucket: String,
}

impl<'a> BucketProbe<'a> {
    pub fn new(runner: &'a dyn CommandRunner, bucket: impl Into<String>) -> Self {
        Self {
            runner,
            bucket: bucket.into(),
        }
    }

    fn s3api(&self, args: &[&str]) -> DeployResult<String> {
        let mut argv = vec!["aws", "s3api"];
        argv.extend_from_slice(args);
        argv.extend_from_slice(&["--bucket", self.bucket.as_str()]);
        let result = self.runner.run_checked(&Invocation::new(argv))?;
        Ok(result.stdout)
    }

    pub fn public_access_block(&self) -> DeployResult<PublicAccessBlock> {
        #[derive(Deserialize)]
        #[serde(rename_all = "PascalCase")]
        struct Response {
            public_access_block_configuration: PublicAccessBlock,
        }
        let stdout = self.s3api(&["get-public-access-block"])?;
        let response: Response = serde_json::from_str(&stdout)?;
        Ok(response.public_access_block_configuration)
    }

    /// Default server-side encryption algorithm, e.g. `AES256`.
    pub fn encryption_algorithm(&self) -> DeployResult<String> {
        let stdout = self.s3api(&["get-bucket-encryption"])?;
        let value: serde_json::Value = serde_json::from_str(&stdout)?;
        Ok(value
            .pointer(
                "/ServerSideEncryptionConfiguration/Rules/0/ApplyServerSideEncryptionByDefault/SSEAlgorithm",
            )
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    /// Versioning status: `Enabled`, `Suspended`, or `Disabled` when never
    /// configured.
    pub fn versioning_status(&self) -> DeployResult<String> {
        let stdout = self.s3api(&["get-bucket-versioning"])?;
        let value: serde_json::Value = serde_json::from_str(&stdout)?;
        Ok(value
            .get("Status")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("Disabled")
            .to_string())
    }

    pub fn put_object(&self, key: &str, body: &Path) -> DeployResult<()> {
        let body = body.display().to_string();
        self.runner.run_checked(&Invocation::new([
            "aws",
            "s3api",
            "put-object",
            "--bucket",
            self.bucket.as_str(),
            "--key",
            key,
            "--body",
            body.as_str(),
        ]))?;
        Ok(())
    }

    pub fn list_object_versions(&self, prefix: &str) -> DeployResult<Vec<ObjectVersion>> {
        #[derive(Deserialize)]
        #[serde(rename_all = "PascalCase")]
        struct Response {
            #[serde(default)]
            versions: Vec<ObjectVersion>,
        }
        let result = self.runner.run_checked(&Invocation::new([
            "aws",
            "s3api",
            "list-object-versions",
            "--bucket",
            self.bucket.as_str(),
            "--prefix",
            prefix,
        ]))?;
        let response: Response = serde_json::from_str(&result.stdout)?;
        Ok(response.versions)
    }

    /// Fetch one version of an object into `outfile` and return its content.
    pub fn get_object_version(
        &self,
        key: &str,
        version_id: &str,
        outfile: &Path,
    ) -> DeployResult<String> {
        let outfile_arg = outfile.display().to_string();
        self.runner.run_checked(&Invocation::new([
            "aws",
            "s3api",
            "get-object",
            "--bucket",
            self.bucket.as_str(),
            "--key",
            key,
            "--version-id",
            version_id,
            outfile_arg.as_str(),
        ]))?;
        Ok(std::fs::read_to_string(outfile)?)
    }

    pub fn delete_object_version(&self, key: &str, version_id: &str) -> DeployResult<()> {
        self.runner.run_checked(&Invocation::new([
            "aws",
            "s3api",
            "delete-object",
            "--bucket",
            self.bucket.as_str(),
            "--key",
            key,
            "--version-id",
            version_id,
        ]))?;
        Ok(())
    }
}

/// Snapshot of an HTTP response: status plus lowercased header map.
#[derive(Debug, Clone)]
pub struct HeaderSnapshot {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
}

impl HeaderSnapshot {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// HTTP/TLS probes against the deployed CDN endpoint.
pub struct EndpointProbe {
    base_url: String,
}

impl EndpointProbe {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn snapshot(response: reqwest::blocking::Response) -> HeaderSnapshot {
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_ascii_lowercase(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        HeaderSnapshot { status, headers }
    }

    /// GET a path and capture status plus headers.
    pub fn fetch(&self, path: &str) -> DeployResult<HeaderSnapshot> {
        let client = reqwest::blocking::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()?;
        let response = client.get(self.url(path)).send()?;
        Ok(Self::snapshot(response))
    }

    /// GET over plain HTTP with redirects disabled, to observe the
    /// HTTP-to-HTTPS redirect itself.
    pub fn fetch_http_no_redirect(&self) -> DeployResult<HeaderSnapshot> {
        let http_url = self.base_url.replacen("https://", "http://", 1);
        let client = reqwest::blocking::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        let response = client.get(http_url).send()?;
        Ok(Self::snapshot(response))
    }

    /// True when a client capped at TLS 1.1 cannot negotiate a connection,
    /// i.e. the endpoint enforces TLS 1.2 or newer.
    pub fn rejects_legacy_tls(&self) -> DeployResult<bool> {
        let client = reqwest::blocking::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .max_tls_version(reqwest::tls::Version::TLS_1_1)
            .build()?;
        Ok(client.get(self.url("/")).send().is_err())
    }

    /// Probe an API path with an arbitrary method, header, and query
    /// parameter; the snapshot shows whether the CDN forwarded it to the
    /// origin (anything but a gateway error) and what cache headers came
    /// back.
    pub fn fetch_api(
        &self,
        method: &str,
        path: &str,
        query: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> DeployResult<HeaderSnapshot> {
        let client = reqwest::blocking::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()?;
        let method = reqwest::Method::from_bytes(method.as_bytes())
            .unwrap_or(reqwest::Method::GET);
        let mut request = client.request(method, self.url(path)).query(query);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = request.send()?;
        Ok(Self::snapshot(response))
    }
}

/// Run the live verification checks and collect a report.
///
/// `bucket` and `cdn_url` are each optional; skipping an unset area mirrors
/// how the checks degrade when infrastructure is not deployed.
pub fn run_verify(
    runner: &dyn CommandRunner,
    bucket: Option<&str>,
    cdn_url: Option<&str>,
) -> VerifyReport {
    let mut report = VerifyReport::new();

    match bucket {
        Some(bucket) => check_bucket(runner, bucket, &mut report),
        None => report.add_warning("S3", "bucket", "no bucket configured, skipping bucket checks"),
    }

    match cdn_url {
        Some(url) => check_cdn(url, &mut report),
        None => report.add_warning(
            "CloudFront",
            "endpoint",
            "no CDN URL configured, skipping endpoint checks",
        ),
    }

    report
}

fn check_bucket(runner: &dyn CommandRunner, bucket: &str, report: &mut VerifyReport) {
    let area = "S3";
    let probe = BucketProbe::new(runner, bucket);

    match probe.public_access_block() {
        Ok(block) if block.fully_blocked() => {
            report.add_pass(area, "public_access_block", "all four flags enabled")
        }
        Ok(block) => report.add_error(
            area,
            "public_access_block",
            &format!("not fully blocked: {:?}", block),
        ),
        Err(err) => report.add_warning(area, "public_access_block", &err.to_string()),
    }

    match probe.encryption_algorithm() {
        Ok(algorithm) if algorithm == "AES256" => {
            report.add_pass(area, "encryption", "AES256 at rest")
        }
        Ok(algorithm) => report.add_error(
            area,
            "encryption",
            &format!("expected AES256, got '{}'", algorithm),
        ),
        Err(err) => report.add_warning(area, "encryption", &err.to_string()),
    }

    match probe.versioning_status() {
        Ok(status) if status == "Enabled" => report.add_pass(area, "versioning", "enabled"),
        Ok(status) => report.add_error(
            area,
            "versioning",
            &format!("expected Enabled, got '{}'", status),
        ),
        Err(err) => report.add_warning(area, "versioning", &err.to_string()),
    }
}

fn check_cdn(url: &str, report: &mut VerifyReport) {
    let area = "CloudFront";
    let probe = EndpointProbe::new(url);

    match probe.fetch("/") {
        Ok(snapshot) => {
            if snapshot.header("cache-control").is_some() || snapshot.header("expires").is_some() {
                report.add_pass(area, "cache_headers", "cache headers present");
            } else {
                report.add_error(area, "cache_headers", "no cache headers on responses");
            }

            if snapshot.header("x-cache").is_some() {
                report.add_pass(area, "edge", "served through CloudFront");
            } else {
                report.add_warning(area, "edge", "X-Cache header missing");
            }

            check_security_headers(&snapshot, report);
        }
        Err(err) => report.add_warning(area, "endpoint", &err.to_string()),
    }

    match probe.fetch_http_no_redirect() {
        Ok(snapshot) if (301..=302).contains(&snapshot.status) => {
            match snapshot.header("location") {
                Some(location) if location.starts_with("https://") => {
                    report.add_pass(area, "https_redirect", "HTTP redirects to HTTPS")
                }
                _ => report.add_error(area, "https_redirect", "redirect does not target HTTPS"),
            }
        }
        Ok(snapshot) => report.add_error(
            area,
            "https_redirect",
            &format!("expected 301/302, got {}", snapshot.status),
        ),
        Err(err) => report.add_warning(area, "https_redirect", &err.to_string()),
    }

    match probe.rejects_legacy_tls() {
        Ok(true) => report.add_pass(area, "tls_floor", "TLS 1.1 and below rejected"),
        Ok(false) => report.add_error(area, "tls_floor", "endpoint accepted a TLS 1.1 client"),
        Err(err) => report.add_warning(area, "tls_floor", &err.to_string()),
    }

    let api_area = "API";
    match probe.fetch_api("GET", "/api/health", &[], &[]) {
        Ok(snapshot) => {
            if snapshot.status == 502 || snapshot.status == 504 {
                report.add_error(
                    api_area,
                    "forwarding",
                    &format!("gateway error {} reaching API origin", snapshot.status),
                );
            } else {
                report.add_pass(api_area, "forwarding", "requests reach the API origin");
            }

            let cache_control = snapshot
                .header("cache-control")
                .unwrap_or_default()
                .to_ascii_lowercase();
            let uncached = ["no-cache", "no-store", "max-age=0", "private"]
                .iter()
                .any(|token| cache_control.contains(token));
            let edge_miss = snapshot
                .header("x-cache")
                .is_some_and(|v| v.to_ascii_lowercase().contains("miss"));
            if uncached || edge_miss {
                report.add_pass(api_area, "no_cache", "API responses are not edge-cached");
            } else {
                report.add_error(
                    api_area,
                    "no_cache",
                    &format!("API response looks cacheable: '{}'", cache_control),
                );
            }
        }
        Err(err) => report.add_warning(api_area, "forwarding", &err.to_string()),
    }
}

fn check_security_headers(snapshot: &HeaderSnapshot, report: &mut VerifyReport) {
    let area = "CloudFront";

    match snapshot.header("x-content-type-options") {
        Some(value) if value.eq_ignore_ascii_case("nosniff") => {
            report.add_pass(area, "content_type_options", "nosniff")
        }
        _ => report.add_error(area, "content_type_options", "X-Content-Type-Options missing"),
    }

    match snapshot.header("x-frame-options") {
        Some(value)
            if value.eq_ignore_ascii_case("DENY") || value.eq_ignore_ascii_case("SAMEORIGIN") =>
        {
            report.add_pass(area, "frame_options", value)
        }
        _ => report.add_error(area, "frame_options", "X-Frame-Options missing"),
    }

    match snapshot.header("strict-transport-security") {
        Some(value) if value.contains("max-age=") => report.add_pass(area, "hsts", value),
        Some(value) => report.add_error(area, "hsts", &format!("missing max-age: '{}'", value)),
        None => report.add_error(area, "hsts", "Strict-Transport-Security missing"),
    }

    match snapshot.header("referrer-policy") {
        Some(value) => report.add_pass(area, "referrer_policy", value),
        None => report.add_error(area, "referrer_policy", "Referrer-Policy missing"),
    }
}
