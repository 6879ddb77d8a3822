//! Issue one task against a Mythic callback and print its output.
//!
//! ```text
//! mythic-task [--config FILE] [--timeout SECS] [--json] CALLBACK COMMAND [PARAMS...]
//! ```
//!
//! Connection settings come from `MYTHIC_*` environment variables, or from a
//! JSON config file when `--config` is given. With `--json`, PARAMS is parsed
//! as a JSON object and sent as structured parameters.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

use mythic_scripting::tasks::{self, TaskParams, TaskRequest};
use mythic_scripting::{Mythic, MythicConfig};

#[derive(Debug)]
struct Args {
    config: Option<PathBuf>,
    timeout: Option<Duration>,
    json: bool,
    callback_display_id: i64,
    command: String,
    params: String,
}

fn parse_args(mut raw: impl Iterator<Item = String>) -> anyhow::Result<Args> {
    let mut config = None;
    let mut timeout = None;
    let mut json = false;
    let mut positional = Vec::new();

    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--config" => {
                let path = raw.next().context("--config needs a path")?;
                config = Some(PathBuf::from(path));
            }
            "--timeout" => {
                let secs: u64 = raw
                    .next()
                    .context("--timeout needs a value")?
                    .parse()
                    .context("--timeout must be a whole number of seconds")?;
                timeout = Some(Duration::from_secs(secs));
            }
            "--json" => json = true,
            _ => positional.push(arg),
        }
    }

    if positional.len() < 2 {
        bail!("usage: mythic-task [--config FILE] [--timeout SECS] [--json] CALLBACK COMMAND [PARAMS...]");
    }
    let mut positional = positional.into_iter();
    let callback_display_id = positional
        .next()
        .unwrap_or_default()
        .parse::<i64>()
        .context("CALLBACK must be a callback display id")?;
    let command = positional.next().unwrap_or_default();
    let params = positional.collect::<Vec<_>>().join(" ");

    Ok(Args {
        config,
        timeout,
        json,
        callback_display_id,
        command,
        params,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1))?;

    let config = match &args.config {
        Some(path) => MythicConfig::load(path)?,
        None => MythicConfig::from_env()?,
    };
    let mythic = Mythic::login(config).context("Failed to set up Mythic session")?;

    let params = if args.json {
        let map: Map<String, Value> =
            serde_json::from_str(&args.params).context("PARAMS must be a JSON object")?;
        TaskParams::Structured(map)
    } else {
        TaskParams::Text(args.params.clone())
    };
    let request = TaskRequest::new(args.command.as_str(), params, args.callback_display_id);

    let output = tasks::issue_task_and_wait_for_output(&mythic, &request, args.timeout)
        .await
        .with_context(|| format!("Task '{}' failed", args.command))?;

    println!("{}", String::from_utf8_lossy(&output));
    Ok(())
}
