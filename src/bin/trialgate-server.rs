//! Trialgate download-gate server.
//!
//! Serves the entitlement-gated download API: entitlement info, artifact
//! streaming, payment submission, and the operator verification endpoint.
//!
//! Usage:
//!   trialgate-server --port 8080 --downloads-dir ./downloads

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use trialgate::audit::AuditLog;
use trialgate::server::{build_router, ServerState};
use trialgate::TrialgateConfig;

#[derive(Parser, Debug)]
#[command(name = "trialgate-server")]
#[command(about = "Entitlement-gated download server")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Directory holding the platform artifacts
    #[arg(long, default_value = "downloads")]
    downloads_dir: PathBuf,

    /// Append-only audit file (JSON lines); in-memory only when omitted
    #[arg(long)]
    audit_file: Option<PathBuf>,

    /// Trial window length in days
    #[arg(long, default_value = "5")]
    trial_days: i64,

    /// Deny flagged subjects instead of surfacing them for review
    #[arg(long)]
    hard_block: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let config = TrialgateConfig {
        trial_days: args.trial_days,
        suspicious_hard_block: args.hard_block,
        downloads_dir: args.downloads_dir.clone(),
        ..Default::default()
    };
    config.validate().context("invalid configuration")?;

    let audit = match &args.audit_file {
        Some(path) => AuditLog::with_file(path)
            .with_context(|| format!("open audit file {}", path.display()))?,
        None => AuditLog::in_memory(),
    };

    let state = Arc::new(ServerState::with_audit(config, audit));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port))
        .await
        .with_context(|| format!("bind port {}", args.port))?;
    info!(
        port = args.port,
        downloads = %args.downloads_dir.display(),
        hard_block = args.hard_block,
        "trialgate server listening"
    );
    axum::serve(listener, app).await.context("server failed")?;
    Ok(())
}
