//! MCP Server Entry Point
//!
//! Initializes logging, loads configuration, performs the initial scan of the
//! function roots and starts the server with the configured transport.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use functions_mcp_server::core::{Config, FunctionHost, McpServer, TransportService};
use functions_mcp_server::domains::handlers::BuiltinCatalog;

/// Serve functions discovered on disk as MCP tools and resources.
#[derive(Debug, Parser)]
#[command(name = "functions-mcp-server", version, about)]
struct Cli {
    /// Roots to scan for function modules, in order. Overrides MCP_FUNCTION_DIRS.
    #[arg(long = "function-dirs", value_name = "DIR", num_args = 1..)]
    function_dirs: Vec<PathBuf>,

    /// Log at debug level.
    #[arg(long)]
    debug: bool,

    /// Scan once, print the capability listing as JSON and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env().context("invalid configuration")?;
    if !cli.function_dirs.is_empty() {
        config.functions.dirs = cli.function_dirs;
    }
    if cli.debug {
        config.logging.debug = true;
    }

    init_logging(config.logging.effective_level());

    info!("Starting {} v{}", config.server.name, config.server.version);

    let host = Arc::new(FunctionHost::new(
        &config.functions,
        BuiltinCatalog::with_defaults(),
    ));
    let report = host
        .reload()
        .await
        .context("initial scan of function modules failed")?;

    if cli.check {
        println!("{}", serde_json::to_string_pretty(&host.capabilities())?);
        if !report.is_clean() {
            eprintln!("{}", serde_json::to_string_pretty(&report.summary())?);
            std::process::exit(1);
        }
        return Ok(());
    }

    #[cfg(unix)]
    reload_on_hangup(host.clone()).context("failed to install SIGHUP handler")?;

    let server = McpServer::new(config.clone(), host);

    info!("Server initialized");

    let transport = TransportService::new(config.transport);
    transport.run(server).await?;

    info!("Server shutting down");

    Ok(())
}

/// Rescan the function roots every time the process receives SIGHUP.
#[cfg(unix)]
fn reload_on_hangup(host: Arc<FunctionHost>) -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup())?;
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            info!("SIGHUP received, reloading function modules");
            // A rejected reload is logged by the host and leaves the registry as is.
            if let Ok(report) = host.reload().await
                && !report.is_clean()
            {
                warn!(summary = %report.summary(), "Reload skipped some functions");
            }
        }
    });
    Ok(())
}

/// Initialize the logging subsystem.
///
/// Logs go to stderr; stdout belongs to the STDIO transport.
fn init_logging(level: &str) {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}
