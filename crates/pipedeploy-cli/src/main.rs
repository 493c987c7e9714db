use clap::Parser;
use colored::Colorize;
use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pipedeploy_core::{DeployReport, DeployTarget, ProjectConfig, DEFAULT_ENVIRONMENT};
use pipedeploy_backend::SnowflakeConnector;
use pipedeploy_engine::{Deployer, DeploymentPlan};

/// pipedeploy - Deploy the daily dbt task pipeline
#[derive(Parser)]
#[command(name = "pipedeploy")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Target environment (case-insensitive), e.g. DEV or PROD
    #[arg(default_value = DEFAULT_ENVIRONMENT)]
    environment: String,

    /// Path to config file (default: pipedeploy.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Print the statements a deploy would run, without connecting
    #[arg(long)]
    dry_run: bool,

    /// Write the deploy report (JSON) to this file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    // A missing .env is fine; a malformed one is not
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => return Err(anyhow::anyhow!("Failed to load .env: {}", e)),
    }

    let config = load_config(cli.config.as_deref(), cli.verbose)?;
    let deployer = Deployer::new(SnowflakeConnector, config);

    if cli.dry_run {
        dry_run_command(&deployer, &cli.environment, cli.output.as_deref())
    } else {
        deploy_command(&deployer, &cli.environment, cli.output.as_deref()).await
    }
}

/// Log to stderr; `RUST_LOG` wins over `--verbose`
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Load the project config from `path`, else `pipedeploy.toml` if present
fn load_config(path: Option<&Path>, verbose: bool) -> Result<ProjectConfig> {
    let config = if let Some(config_path) = path {
        ProjectConfig::from_file(config_path)?
    } else if Path::new("pipedeploy.toml").exists() {
        ProjectConfig::from_file(Path::new("pipedeploy.toml"))?
    } else {
        if verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        ProjectConfig::default()
    };

    if verbose {
        eprintln!(
            "{} {}",
            "Allowed environments:".cyan(),
            config.allowed_environments.join(", ")
        );
    }

    Ok(config)
}

/// Deploy command - register the pipeline with the backend
async fn deploy_command(deployer: &Deployer, environment: &str, output: Option<&Path>) -> Result<()> {
    let environment = DeployTarget::normalize_environment(environment)?;

    println!("{}", format!("Deploying DAG for {} environment...", environment).cyan());

    let report = deployer.deploy(&environment).await?;

    println!(
        "{}",
        format!(
            "✓ DAG '{}' deployed successfully for {}.",
            report.graph, report.environment
        )
        .green()
        .bold()
    );
    print_report_summary(&report);

    if let Some(path) = output {
        report.save_to_file(path)?;
        println!("{} {}", "Report saved to:".green(), path.display());
    }

    Ok(())
}

/// Dry-run command - show what a deploy would execute
fn dry_run_command(deployer: &Deployer, environment: &str, output: Option<&Path>) -> Result<()> {
    let plan = deployer.plan(environment)?;

    print_plan(&plan);

    if let Some(path) = output {
        plan.report().save_to_file(path)?;
        println!("{} {}", "Report saved to:".green(), path.display());
    }

    Ok(())
}

fn print_plan(plan: &DeploymentPlan) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Deployment Plan (dry run)".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("{} {}", "Graph:".bold(), plan.graph.name().green());
    println!("{} {}", "Scope:".bold(), plan.scope());
    println!("{} {}", "Schedule:".bold(), plan.graph.schedule());
    println!("{} {}", "Role:".bold(), plan.target.role);
    println!();

    for (i, statement) in plan.statements().iter().enumerate() {
        println!("{}", format!("-- {}", i + 1).dimmed());
        println!("{};", statement);
        println!();
    }

    println!("{}", "Nothing was submitted.".yellow());
    println!("{}", "=".repeat(60).bright_blue());
}

/// Print deploy summary to stdout
fn print_report_summary(report: &DeployReport) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Deploy Report".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("Graph:     {}", report.fqn());
    println!("Backend:   {}", report.backend);
    println!("Outcome:   {}", report.outcome);
    println!("Schedule:  {}", report.schedule);
    println!("Warehouse: {}", report.warehouse);
    println!("Tasks:     {}", report.tasks.join(" -> "));
    println!("Digest:    {}", &report.fingerprint[..12]);
    println!("Timestamp: {}", report.timestamp);

    println!();
    println!("{}", "=".repeat(60).bright_blue());
}
