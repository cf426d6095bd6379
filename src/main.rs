//! CLI for the edge relay module
//!
//! Connects to the edge hub named by the runtime environment, forwards `input1`
//! traffic to `output1` and relays queued payloads until SIGTERM.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde_json::Value;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use edge_relay::client::WebSocketModuleClient;
use edge_relay::config::{LogLevel, load_config, logging_settings};
use edge_relay::relay::{ingest_json_lines, outbound_queue};
use edge_relay::runtime::{RelayModule, spawn_termination_listener};
use edge_relay::utils::{ModuleError, logging};

#[derive(Parser)]
#[command(name = "edge-relay", version, about = "IoT edge message relay module")]
struct Args {
    /// Log level, overridden by EDGE_MODULE_LOG_LEVEL
    #[arg(short = 'l', long = "loglevel", value_enum, default_value_t = LogLevel::Info, ignore_case = true)]
    log_level: LogLevel,

    /// Also write log lines to this file
    #[arg(short = 'f', long = "logfile")]
    log_file: Option<PathBuf>,

    /// Enqueue newline-delimited JSON documents read from stdin
    #[arg(long)]
    ingest_stdin: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let settings = logging_settings(args.log_level, args.log_file.clone());
    if let Err(e) = logging::init(&settings) {
        eprintln!("Unexpected error {e}");
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Unexpected error {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), ModuleError> {
    let settings = load_config()?;
    info!(?settings, "configuration loaded");

    let client = WebSocketModuleClient::create_from_environment(&settings.hub)
        .await
        .map_err(ModuleError::Setup)?;
    let module = RelayModule::attach(client).await?;

    let (producer, queue) = outbound_queue::<Value>();
    if args.ingest_stdin {
        let producer = producer.clone();
        tokio::spawn(async move {
            let stdin = BufReader::new(tokio::io::stdin());
            if let Err(e) = ingest_json_lines(stdin, producer).await {
                warn!(error = %e, "stdin ingest failed");
            }
        });
    }

    let cancel = CancellationToken::new();
    let listener = spawn_termination_listener(cancel.clone());
    info!("edge relay running");

    let result = module.run(queue, cancel.clone(), settings.relay).await;

    // Producers outlive the relay loop so it only stops on cancellation or error.
    drop(producer);
    cancel.cancel();
    let _ = listener.await;
    result
}
