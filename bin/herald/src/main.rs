//! Herald - bulk outbound message dispatcher
//!
//! Command-line trigger for the dispatch engine:
//! - `send-bulk`: personalized batch from a JSON request document
//! - `send`: one literal message to one number
//!
//! Results are written to stdout as JSON; logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use herald_config::{AppConfig, ConfigLoader, ProviderKind};
use herald_dispatch::{
    transport, BulkSendRequest, BulkSendResponse, DispatchError, Dispatcher, ErrorResponse,
    SingleSendRequest, SingleSendResponse,
};

/// Exit code for rejected input (missing or malformed parameters)
const EXIT_INVALID_INPUT: u8 = 2;
/// Exit code for a single send the provider did not accept
const EXIT_SEND_FAILED: u8 = 1;

/// Herald Bulk Message Dispatcher
#[derive(Parser, Debug)]
#[command(name = "herald")]
#[command(about = "Send personalized SMS and WhatsApp messages through Vonage or Twilio")]
struct Args {
    /// Configuration file (TOML)
    #[arg(long, global = true, env = "HERALD_CONFIG")]
    config: Option<PathBuf>,

    /// Provider override: vonage, twilio_sms, twilio_whatsapp
    #[arg(long, global = true, env = "HERALD_PROVIDER")]
    provider: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Dispatch a batch described by a JSON request (`-` reads stdin)
    SendBulk {
        #[arg(long, short, default_value = "-")]
        input: String,
    },

    /// Send one message without templating or pacing
    Send {
        #[arg(long)]
        to: String,

        #[arg(long)]
        message: String,

        /// Public URL of an image or document to attach
        #[arg(long)]
        media_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // A missing .env file is not an error
    let _ = dotenvy::dotenv();

    // Initialize logging (JSON if LOG_FORMAT=json, text otherwise)
    herald_common::logging::init_logging("herald");

    let args = Args::parse();
    let config = load_config(&args)?;

    info!(
        provider = %config.provider.kind,
        min_interval_ms = config.dispatch.min_interval_ms,
        max_in_flight = config.dispatch.max_in_flight,
        "Starting Herald"
    );

    let transport = transport::from_config(&config)?;
    let dispatcher = Dispatcher::from_config(transport, &config.dispatch);

    match args.command {
        Command::SendBulk { input } => send_bulk(&dispatcher, &input).await,
        Command::Send { to, message, media_url } => {
            let request = SingleSendRequest { to, message, media_url };
            send_single(&dispatcher, request).await
        }
    }
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let loader = match &args.config {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };

    let mut config = loader
        .load_with(|key| std::env::var(key).ok())
        .context("Failed to load configuration")?;

    if let Some(provider) = &args.provider {
        config.provider.kind = provider
            .parse::<ProviderKind>()
            .context("Invalid --provider")?;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn read_input(input: &str) -> Result<String> {
    let mut raw = String::new();
    if input == "-" {
        tokio::io::stdin()
            .read_to_string(&mut raw)
            .await
            .context("Failed to read request from stdin")?;
    } else {
        raw = tokio::fs::read_to_string(input)
            .await
            .with_context(|| format!("Failed to read request file {}", input))?;
    }
    Ok(raw)
}

async fn send_bulk(dispatcher: &Dispatcher, input: &str) -> Result<ExitCode> {
    let raw = read_input(input).await?;

    let request: BulkSendRequest = match serde_json::from_str(&raw) {
        Ok(request) => request,
        Err(e) => {
            let err = DispatchError::Validation(format!("Invalid request body: {}", e));
            return print_rejection(&err);
        }
    };

    let (recipients, template, attributes) = match request.into_parts() {
        Ok(parts) => parts,
        Err(e) => return print_rejection(&e),
    };

    let cancel = CancellationToken::new();
    let signal_task = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, abandoning in-flight calls and stopping the batch");
                cancel.cancel();
            }
        })
    };

    let result = dispatcher
        .dispatch_batch(&recipients, &template, &attributes, &cancel)
        .await;
    signal_task.abort();

    match result {
        Ok(summary) => {
            print_json(&BulkSendResponse::from(summary))?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_validation() => print_rejection(&e),
        Err(e) => Err(e.into()),
    }
}

async fn send_single(dispatcher: &Dispatcher, request: SingleSendRequest) -> Result<ExitCode> {
    let attributes = request.attributes();

    let outcome = match dispatcher
        .send_single(&request.to, &request.message, &attributes)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) if e.is_validation() => return print_rejection(&e),
        Err(e) => return Err(e.into()),
    };

    let response = SingleSendResponse::from_outcome(&outcome);
    print_json(&response)?;

    if response.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        error!(provider = dispatcher.provider(), "Message was not accepted");
        Ok(ExitCode::from(EXIT_SEND_FAILED))
    }
}

fn print_rejection(err: &DispatchError) -> Result<ExitCode> {
    warn!(error = %err, "Request rejected");
    print_json(&ErrorResponse::from(err))?;
    Ok(ExitCode::from(EXIT_INVALID_INPUT))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let body = serde_json::to_string_pretty(value).context("Failed to serialize response")?;
    println!("{}", body);
    Ok(())
}
