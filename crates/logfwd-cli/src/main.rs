//! 🚀 logfwd: the front door. Loads config, reads one trigger event, runs one invocation.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! Thin on purpose: the library does the forwarding, this binary does argv, logging,
//! and the exit code. Like a manager. 🦆

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::AsyncReadExt;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// 📬 Forward gzip NDJSON access logs to an HTTP collector, in batches.
#[derive(Debug, Parser)]
#[command(name = "logfwd", version)]
struct Args {
    /// 🔧 TOML config file, merged over LOGFWD_* environment variables
    #[arg(short, long, env = "LOGFWD_CONFIG")]
    config: Option<PathBuf>,

    /// 📨 S3 event-notification JSON; reads stdin when omitted or "-"
    #[arg(short, long)]
    event: Option<PathBuf>,
}

/// 📨 The trigger event, from a file or from stdin. Whichever the operator felt like.
async fn read_event(event: Option<&PathBuf>) -> Result<String> {
    match event {
        Some(path) if path.as_os_str() != "-" => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("💀 couldn't read the trigger event from '{}'", path.display())),
        _ => {
            let mut the_event = String::new();
            tokio::io::stdin()
                .read_to_string(&mut the_event)
                .await
                .context("💀 couldn't read the trigger event from stdin")?;
            Ok(the_event)
        }
    }
}

async fn forward(args: &Args) -> Result<i32> {
    let the_config = logfwd::load_config(args.config.as_deref()).context(
        "💀 couldn't load the config. Check the TOML, check the LOGFWD_* env vars, check for tabs.",
    )?;

    let the_event_json = read_event(args.event.as_ref()).await?;
    let the_event = logfwd::TriggerEvent::from_s3_notification(&the_event_json)?;
    info!("📨 trigger event names {} object(s)", the_event.locations().len());

    let the_start = Instant::now();
    let the_summary = logfwd::run(&the_config, &the_event).await?;
    println!(
        "{}",
        logfwd::progress::render_summary(&the_summary, the_start.elapsed())
    );
    Ok(the_summary.status_code())
}

/// 🚀 main(): init tracing, parse args, forward, report.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match forward(&args).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            error!("💀 error: {}", err);
            // -- 🧅 peel the onion, one layer at a time
            for cause in err.chain().skip(1) {
                error!("⚠️  cause: {}", cause);
            }
            if let Some(kind) = logfwd::classify(&err) {
                error!("🏷️ failure class: {kind}");
            }
            // 🗑️ Exit with prejudice.
            std::process::exit(1);
        }
    }
}
