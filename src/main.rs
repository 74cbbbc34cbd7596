//! kb-deploy CLI - deployment automation for the KB Engine frontend
//!
//! Usage: kb-deploy <COMMAND>
//!
//! Commands:
//!   deploy   Full pipeline: build, provision, publish, invalidate
//!   publish  Quick publish to existing infrastructure
//!   plan     Plan-only dry run with variable overrides
//!   check    Validate required tools and AWS credentials
//!   verify   Verify deployed infrastructure posture

mod cli;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use cli::{Cli, Commands};
use kb_deploy::orchestrator::StageEvent;
use kb_deploy::probe::CheckStatus;
use kb_deploy::{
    build, check_credentials, logging, prereq, process::CommandRunner, ArtifactPublisher, Config,
    DeployOptions, DeploymentContext, DeploymentReport, Environment, Invocation, Orchestrator,
    PlanOutcome, ProcessRunner, Provisioner, OUTPUT_BUCKET, OUTPUT_DISTRIBUTION, OUTPUT_URL,
};

fn main() {
    ctrlc::set_handler(|| {
        eprintln!("\nCancelled by user");
        std::process::exit(130);
    })
    .expect("Error setting Ctrl+C handler");

    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        eprintln!("✗ {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Deploy {
            environment,
            project_root,
            skip_build,
            skip_terraform,
        } => cmd_deploy(
            environment,
            project_root,
            skip_build,
            skip_terraform,
            cli.json,
            cli.verbose,
        ),
        Commands::Publish {
            environment,
            project_root,
            skip_build,
        } => cmd_publish(environment, project_root, skip_build, cli.json, cli.verbose),
        Commands::Plan { project_root, vars } => cmd_plan(project_root, vars, cli.json),
        Commands::Check => cmd_check(cli.json),
        Commands::Verify {
            bucket,
            url,
            project_root,
        } => cmd_verify(bucket, url, project_root, cli.json),
    }
}

/// Resolve the project context: explicit root, or auto-detection from the
/// working directory. Environment priority: CLI flag, then
/// `KB_DEPLOY_ENVIRONMENT`, then config file, then dev.
fn resolve_context(
    environment: Option<String>,
    project_root: Option<PathBuf>,
) -> Result<(DeploymentContext, Config)> {
    let start = match project_root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };
    // Environment is provisional until the config file has been consulted.
    let probe = DeploymentContext::locate(&start, Environment::Dev)?;
    let config = Config::load(&probe.project_root.join("deployment/config.toml"))
        .unwrap_or_default();

    let selector = environment.or_else(|| std::env::var("KB_DEPLOY_ENVIRONMENT").ok());
    let env = match selector {
        Some(name) => Environment::parse(&name)?,
        None => config.deploy.environment.unwrap_or_default(),
    };

    Ok((DeploymentContext::new(probe.project_root, env), config))
}

/// Unicode icons only when stdout is a terminal; plain ASCII markers keep
/// piped CI logs clean.
fn unicode_output() -> bool {
    use is_terminal::IsTerminal;
    std::io::stdout().is_terminal()
}

fn print_event(event: &StageEvent, json: bool) {
    if json {
        let value = match event {
            StageEvent::Started(stage) => {
                serde_json::json!({"event": "stage", "stage": stage.to_string(), "status": "started"})
            }
            StageEvent::Completed(stage) => {
                serde_json::json!({"event": "stage", "stage": stage.to_string(), "status": "completed"})
            }
            StageEvent::Skipped(stage) => {
                serde_json::json!({"event": "stage", "stage": stage.to_string(), "status": "skipped"})
            }
            StageEvent::Warning(message) => {
                serde_json::json!({"event": "warning", "message": message})
            }
        };
        println!("{}", value);
    } else if unicode_output() {
        match event {
            StageEvent::Started(stage) => println!("→ {stage}"),
            StageEvent::Completed(stage) => println!("✓ {stage}"),
            StageEvent::Skipped(stage) => println!("⏭ {stage} (skipped)"),
            StageEvent::Warning(message) => println!("⚠ {message}"),
        }
    } else {
        match event {
            StageEvent::Started(stage) => println!("-> {stage}"),
            StageEvent::Completed(stage) => println!("OK {stage}"),
            StageEvent::Skipped(stage) => println!("SKIP {stage}"),
            StageEvent::Warning(message) => println!("WARN {message}"),
        }
    }
}

fn print_report(report: &DeploymentReport, json: bool) {
    if json {
        let output = serde_json::json!({
            "event": "deploy",
            "status": "success",
            "environment": report.environment.to_string(),
            "bucket": report.publish.bucket,
            "synced_assets": report.publish.synced_assets,
            "invalidation_id": report.invalidation_id,
            "application_url": report.application_url,
            "duration_seconds": report.duration.as_secs_f64(),
            "warnings": report.warnings,
        });
        println!("{}", output);
        return;
    }

    println!();
    println!("🎉 Deployment completed successfully!");
    println!("Environment: {}", report.environment);
    println!("Bucket: {}", report.publish.bucket);
    println!("Time: {:.2} seconds", report.duration.as_secs_f64());
    if let Some(id) = &report.invalidation_id {
        println!("Invalidation: {} (may take 5-15 minutes to complete)", id);
    }
    if let Some(url) = &report.application_url {
        println!("URL: {}", url);
    }
    if let Some(log_group) = &report.log_group {
        println!("Logs: {}", log_group);
    }
    for warning in &report.warnings {
        println!("⚠ {}", warning);
    }
}

fn cmd_deploy(
    environment: Option<String>,
    project_root: Option<PathBuf>,
    skip_build: bool,
    skip_terraform: bool,
    json: bool,
    verbose: u8,
) -> Result<()> {
    let (ctx, config) = resolve_context(environment, project_root)?;
    logging::init(&ctx.log_dir, verbose)?;
    config.vars.validate_provided()?;

    if !json {
        println!("📦 KB Engine Frontend Deployment");
        println!("Environment: {}", ctx.environment);
        println!("Project root: {}", ctx.project_root.display());
        println!();
    }

    let runner = ProcessRunner;
    let options = DeployOptions {
        skip_build,
        skip_terraform,
        extra_vars: config.vars.var_args(),
    };

    let report = Orchestrator::new(&runner, ctx, options)
        .run_with_callback(|event| print_event(&event, json))?;

    print_report(&report, json);
    Ok(())
}

fn cmd_publish(
    environment: Option<String>,
    project_root: Option<PathBuf>,
    skip_build: bool,
    json: bool,
    verbose: u8,
) -> Result<()> {
    let (ctx, _config) = resolve_context(environment, project_root)?;
    logging::init(&ctx.log_dir, verbose)?;

    if !json {
        println!("📦 Quick Frontend Publish");
        println!("Project root: {}", ctx.project_root.display());
    }

    let runner = ProcessRunner;
    if runner
        .run(&Invocation::new(["aws", "--version"]))
        .map(|r| !r.success())
        .unwrap_or(true)
    {
        bail!("AWS CLI is not installed or not in PATH");
    }
    check_credentials(&runner)?;

    if skip_build {
        if !json {
            println!("⏭ build (skipped)");
        }
    } else {
        if !json {
            println!("→ build");
        }
        build::build_frontend(&runner, &ctx)?;
    }

    let provisioner = Provisioner::new(&runner, &ctx.terraform_dir);
    let bucket = provisioner
        .read_output_raw(OUTPUT_BUCKET)
        .context("make sure infrastructure is deployed first")?;

    if !json {
        println!("→ publish to s3://{}/", bucket);
    }
    let publisher = ArtifactPublisher::new(&runner);
    let summary = publisher.publish(&bucket, &ctx.build_dir)?;

    let invalidation_id = match provisioner.read_output_raw(OUTPUT_DISTRIBUTION) {
        Ok(distribution_id) if !distribution_id.is_empty() => {
            match publisher.invalidate(&distribution_id) {
                Ok(id) => Some(id),
                Err(err) => {
                    if !json {
                        println!("⚠ cache invalidation failed: {}", err);
                    }
                    None
                }
            }
        }
        _ => {
            if !json {
                println!("⚠ cloudfront distribution id not found, skipping cache invalidation");
            }
            None
        }
    };

    let application_url = provisioner.read_output_raw(OUTPUT_URL).ok();

    if json {
        let output = serde_json::json!({
            "event": "publish",
            "status": "success",
            "bucket": summary.bucket,
            "synced_assets": summary.synced_assets,
            "entry_point_uploaded": summary.entry_point_uploaded,
            "service_worker_uploaded": summary.service_worker_uploaded,
            "invalidation_id": invalidation_id,
            "application_url": application_url,
        });
        println!("{}", output);
    } else {
        println!();
        println!("🎉 Frontend published successfully!");
        println!("Bucket: {}", summary.bucket);
        if let Some(url) = application_url {
            println!("URL: {}", url);
        }
    }

    Ok(())
}

fn cmd_plan(project_root: Option<PathBuf>, vars: Vec<String>, json: bool) -> Result<()> {
    let (ctx, config) = resolve_context(None, project_root)?;
    config.vars.validate_provided()?;

    // Static rejection of recognized-but-invalid values, before terraform
    // ever runs.
    let mut var_args = config.vars.var_args();
    for var in &vars {
        let Some((name, value)) = var.split_once('=') else {
            bail!("invalid --var '{}': expected NAME=VALUE", var);
        };
        if let Err(reason) = kb_deploy::validate_var(name, value) {
            bail!("invalid value for variable '{}': {}", name, reason);
        }
        var_args.push(format!("-var={}={}", name, value));
    }

    let runner = ProcessRunner;
    let provisioner = Provisioner::new(&runner, &ctx.terraform_dir);
    let outcome = provisioner.plan_only(&var_args)?;

    match outcome {
        PlanOutcome::Planned { plan } => {
            let resources = kb_deploy::planned_resources(&plan);
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "event": "plan",
                        "status": "accepted",
                        "planned_resources": resources.len(),
                    })
                );
            } else {
                println!("✓ plan accepted: {} resources planned", resources.len());
            }
            Ok(())
        }
        PlanOutcome::Rejected { stderr } => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "event": "plan",
                        "status": "rejected",
                        "stderr": stderr,
                    })
                );
            }
            bail!("plan rejected:\n{}", stderr);
        }
    }
}

fn cmd_check(json: bool) -> Result<()> {
    let runner = ProcessRunner;
    let mut missing = Vec::new();

    if !json {
        println!("🩺 kb-deploy check");
        println!();
    }

    for (name, argv) in prereq::REQUIRED_TOOLS {
        let ok = runner
            .run(&Invocation::new(argv.iter().copied()))
            .map(|r| r.success())
            .unwrap_or(false);
        if json {
            println!(
                "{}",
                serde_json::json!({"event": "check", "tool": name, "ok": ok})
            );
        } else {
            println!("  {} {}", if ok { "✓" } else { "✗" }, name);
        }
        if !ok {
            missing.push(name);
        }
    }

    let credentials_ok = check_credentials(&runner).is_ok();
    if json {
        println!(
            "{}",
            serde_json::json!({"event": "check", "tool": "AWS credentials", "ok": credentials_ok})
        );
    } else {
        println!(
            "  {} AWS credentials",
            if credentials_ok { "✓" } else { "✗" }
        );
    }

    if !missing.is_empty() || !credentials_ok {
        if !json {
            println!();
        }
        bail!("environment is not ready for deployment");
    }

    if !json {
        println!();
        println!("🟢 All checks passed!");
    }
    Ok(())
}

fn cmd_verify(
    bucket: Option<String>,
    url: Option<String>,
    project_root: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let runner = ProcessRunner;

    // Resolution order: flag, test environment variable, terraform outputs.
    let outputs = resolve_context(None, project_root)
        .ok()
        .map(|(ctx, _)| Provisioner::new(&runner, &ctx.terraform_dir))
        .and_then(|provisioner| provisioner.read_outputs().ok());

    let bucket = bucket
        .or_else(|| std::env::var("TEST_S3_BUCKET_NAME").ok())
        .or_else(|| {
            outputs
                .as_ref()
                .and_then(|o| o.get_str(OUTPUT_BUCKET).map(String::from))
        });
    let url = url
        .or_else(|| std::env::var("TEST_CLOUDFRONT_URL").ok())
        .or_else(|| {
            outputs
                .as_ref()
                .and_then(|o| o.get_str(OUTPUT_URL).map(String::from))
        });

    let report = kb_deploy::run_verify(&runner, bucket.as_deref(), url.as_deref());

    if json {
        for check in &report.checks {
            let status = match check.status {
                CheckStatus::Pass => "pass",
                CheckStatus::Warning => "warning",
                CheckStatus::Error => "error",
            };
            println!(
                "{}",
                serde_json::json!({
                    "event": "verify",
                    "area": check.area,
                    "name": check.name,
                    "status": status,
                    "message": check.message,
                })
            );
        }
        println!(
            "{}",
            serde_json::json!({
                "event": "verify_summary",
                "passes": report.passes(),
                "warnings": report.warnings(),
                "errors": report.errors(),
                "success": report.is_success(),
            })
        );
    } else {
        println!("🔍 Infrastructure verification");
        println!();
        let mut current_area = String::new();
        for check in &report.checks {
            if check.area != current_area {
                if !current_area.is_empty() {
                    println!();
                }
                println!("{}", check.area);
                current_area = check.area.clone();
            }
            println!("  {} {} - {}", check.status, check.name, check.message);
        }
        println!();
        println!(
            "Summary: {} passed, {} warnings, {} errors",
            report.passes(),
            report.warnings(),
            report.errors()
        );
    }

    if !report.is_success() {
        bail!("infrastructure verification failed");
    }
    Ok(())
}
