//! OLX Monitor service worker replay harness.
//!
//! Loads an agent config and a JSON event script, delivers the events one
//! at a time the way a browser would, and prints one JSON line per event.
//! Exits non-zero when any event fails.

mod script;

use std::time::Duration;

use anyhow::Context;
use olxmon_common::{init_logging, LogConfig, LogFormat};
use olxmon_sw::{AgentConfig, HttpNetwork};
use tracing::{error, info};

use script::{Runner, Script};

/// Parse command line arguments
struct Args {
    config: Option<String>,
    script: Option<String>,
    online: bool,
    log_format: LogFormat,
    verbose: bool,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut config = None;
        let mut script = None;
        let mut online = false;
        let mut log_format = LogFormat::Compact;
        let mut verbose = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    config = args.next();
                }
                "--script" => {
                    script = args.next();
                }
                "--online" => {
                    online = true;
                }
                "--log-format" => {
                    if let Some(val) = args.next() {
                        log_format = val.parse().unwrap_or(LogFormat::Compact);
                    }
                }
                "--verbose" | "-v" => {
                    verbose = true;
                }
                other => {
                    eprintln!("Warning: ignoring unknown argument {other}");
                }
            }
        }

        Self {
            config,
            script,
            online,
            log_format,
            verbose,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_config = if args.verbose {
        LogConfig::debug()
    } else {
        LogConfig::default()
    };
    init_logging(log_config.with_format(args.log_format))?;

    let config = match &args.config {
        Some(path) => AgentConfig::from_json_file(path)
            .with_context(|| format!("loading config {path}"))?,
        None => AgentConfig::default(),
    };
    let script = match &args.script {
        Some(path) => Script::from_json_file(path)?,
        None => anyhow::bail!("usage: olxmon-replay --script <events.json> [--config <config.json>] [--online]"),
    };

    info!(
        cache_version = %config.cache_version,
        scope = %config.scope,
        events = script.events.len(),
        online = args.online,
        "Starting replay"
    );

    let http = if args.online {
        Some(HttpNetwork::new(Duration::from_secs(30))?)
    } else {
        None
    };

    let runner = Runner::new(config, &script, http).await?;
    let reports = runner.run(&script.events).await;

    for report in &reports {
        println!("{}", report.to_json());
    }

    let failed = reports.iter().filter(|r| !r.ok).count();
    let skipped = script.events.len() - reports.len();
    if failed > 0 {
        error!(failed, skipped, "Replay failed");
        std::process::exit(1);
    }

    info!(events = reports.len(), "Replay complete");
    Ok(())
}
