//! Entitle - service enablement for subscribed hosts
//!
//! Usage:
//!   entitle enable <service>                            # Enable a service
//!   entitle status                                      # Show enabled services
//!   entitle api u.pro.services.enable.v1 --args k=v     # JSON API

mod progress;

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use entitle_core::api::{self, ApiOptions};
use entitle_core::commands::{EnableCommand, StatusCommand, StatusReport};
use entitle_core::context::AppContext;
use entitle_core::progress::ProgressSink;
use entitle_core::types::{EnableRequest, EnableResult};

use crate::progress::TerminalProgress;

#[derive(Parser)]
#[command(name = "entitle")]
#[command(about = "Enable subscription services on this host", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ~/.config/entitle/entitle.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the lock, host state and status cache
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enable a service
    Enable {
        /// Service name from the catalog
        service: String,

        /// Service variant
        #[arg(long)]
        variant: Option<String>,

        /// Grant access without installing anything
        #[arg(long)]
        access_only: bool,

        /// Output format
        #[arg(short = 'o', long = "output", default_value = "table")]
        format: OutputFormat,
    },

    /// Show enabled services
    Status {
        /// Output format
        #[arg(short = 'o', long = "output", default_value = "table")]
        format: OutputFormat,
    },

    /// Call an API endpoint and print its JSON response
    Api {
        /// Endpoint name, e.g. u.pro.services.enable.v1
        endpoint: String,

        /// Endpoint options as key=value pairs
        #[arg(long, num_args = 1.., conflicts_with = "data")]
        args: Vec<String>,

        /// Endpoint options as a JSON object
        #[arg(long)]
        data: Option<String>,

        /// Print progress lines to stderr
        #[arg(long)]
        show_progress: bool,
    },
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "entitle=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let ctx = AppContext::load(cli.config.as_deref(), cli.state_dir)?;

    match cli.command {
        Commands::Enable {
            service,
            variant,
            access_only,
            format,
        } => run_enable(ctx, service, variant, access_only, format),
        Commands::Status { format } => run_status(ctx, format),
        Commands::Api {
            endpoint,
            args,
            data,
            show_progress,
        } => run_api(ctx, &endpoint, args, data, show_progress),
    }
}

fn run_enable(
    ctx: AppContext,
    service: String,
    variant: Option<String>,
    access_only: bool,
    format: OutputFormat,
) -> Result<()> {
    let request = EnableRequest::new(service)?
        .with_variant(variant)
        .with_access_only(access_only);

    let cmd = EnableCommand::new(ctx);
    let mut progress = TerminalProgress::stderr();
    let result = cmd.execute(&request, Some(&mut progress))?;

    match format {
        OutputFormat::Table => print_enable_table(request.service(), &result),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
    }
    Ok(())
}

fn print_enable_table(service: &str, result: &EnableResult) {
    if result.is_unchanged() {
        println!("{} is already enabled", style(service).bold());
        return;
    }

    for name in &result.enabled {
        println!("{} {}", style("enabled ").green(), name);
    }
    for name in &result.disabled {
        println!("{} {}", style("disabled").yellow(), name);
    }
    for message in &result.messages {
        println!("{message}");
    }
    if result.reboot_required {
        println!(
            "{}",
            style("A reboot is required to complete the operation.").yellow()
        );
    }
}

fn run_status(ctx: AppContext, format: OutputFormat) -> Result<()> {
    let report = StatusCommand::new(ctx).execute()?;
    match format {
        OutputFormat::Table => print_status_table(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn print_status_table(report: &StatusReport) {
    match (&report.account, report.attached) {
        (Some(account), true) => println!("Attached to {}", style(account).bold()),
        _ => println!("{}", style("This machine is not attached").yellow()),
    }
    if let Some(holder) = &report.lock_holder {
        println!(
            "Operation in progress: {} (pid {})",
            style(&holder.holder).cyan(),
            holder.pid
        );
    }
    println!();

    if report.services.is_empty() {
        println!("No services in the catalog");
        return;
    }

    let width = report
        .services
        .iter()
        .map(|s| s.name.len())
        .max()
        .unwrap_or(0)
        .max("SERVICE".len());
    println!("{:<width$}  {:<8}  DESCRIPTION", "SERVICE", "STATUS");
    for entry in &report.services {
        let status = if entry.enabled {
            style(format!("{:<8}", "enabled")).green()
        } else {
            style(format!("{:<8}", "disabled")).dim()
        };
        let description = match (&entry.title, &entry.variant) {
            (Some(title), Some(variant)) => format!("{title} ({variant})"),
            (Some(title), None) => title.clone(),
            (None, Some(variant)) => format!("({variant})"),
            (None, None) => String::new(),
        };
        println!("{:<width$}  {}  {}", entry.name, status, description);
    }
}

fn run_api(
    ctx: AppContext,
    endpoint: &str,
    args: Vec<String>,
    data: Option<String>,
    show_progress: bool,
) -> Result<()> {
    if api::find_endpoint(endpoint).is_none() {
        bail!("Unknown API endpoint: {endpoint}");
    }

    let options = match data {
        Some(data) => ApiOptions::Data(data),
        None => ApiOptions::Args(args),
    };

    let cmd = EnableCommand::new(ctx);
    let mut progress = TerminalProgress::stderr();
    let sink: Option<&mut dyn ProgressSink> = if show_progress {
        Some(&mut progress)
    } else {
        None
    };
    let response = api::call_enable(&cmd, &options, sink);

    println!("{}", serde_json::to_string_pretty(&response)?);
    if !response.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
