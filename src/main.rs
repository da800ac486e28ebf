mod cli;

use anyhow::{Context as _, Result};
use clap::{Parser, ValueEnum};
use cli::{Command, Context};
use gcp_snippets::config::Config;
use gcp_snippets::gcp::client::format_gcp_error;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Google Cloud API snippets
#[derive(Parser, Debug)]
#[command(name = "gcp-snippets", version = gcp_snippets::VERSION, about, long_about = None)]
struct Args {
    /// GCP project to use
    #[arg(short, long, global = true)]
    project: Option<String>,

    /// GCP zone to use
    #[arg(short, long, global = true)]
    zone: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    /// Send every request to this base URL instead of the Google endpoints
    #[arg(long, global = true)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file {}: {}", log_path.display(), e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("gcp-snippets started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("gcp-snippets").join("gcp-snippets.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".gcp-snippets").join("gcp-snippets.log");
    }
    PathBuf::from("gcp-snippets.log")
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    let ctx = match build_context(&args) {
        Ok(ctx) => ctx,
        Err(err) => {
            eprintln!("Error: {}", format_gcp_error(&err));
            return ExitCode::FAILURE;
        }
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = cli::run(&mut out, &ctx, args.command).await;
    let _ = out.flush();

    match result {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{:#}", err);
            eprintln!("Error: {}", format_gcp_error(&err));
            ExitCode::FAILURE
        }
    }
}

fn build_context(args: &Args) -> Result<Context> {
    let config = Config::load();

    let project = config.effective_project(args.project.as_deref());
    if let Some(project) = &project {
        if !gcp_snippets::gcp::auth::validate_project_id(project) {
            anyhow::bail!("Invalid project ID format: {}", project);
        }
    }

    let zone = config.effective_zone(args.zone.as_deref());
    let region = config.effective_region(&zone);

    if let Some(base) = args.endpoint.as_deref() {
        let parsed = url::Url::parse(base)
            .with_context(|| format!("Invalid endpoint URL: {}", base))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("Endpoint must be an http or https URL: {}", base);
        }
    }
    let endpoints = config.effective_endpoints(args.endpoint.as_deref());

    tracing::info!(
        "Using project: {}, zone: {}",
        project.as_deref().unwrap_or("<unset>"),
        zone
    );

    Ok(Context {
        config,
        project,
        zone,
        region,
        endpoints,
        credentials: None,
    })
}
