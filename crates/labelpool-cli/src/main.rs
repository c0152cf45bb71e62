//! labelpool command line front end.
//!
//! # Commands
//!
//! - `ingest`: upload a bulk label PDF and wait for processing
//! - `status`: processing progress of an upload
//! - `pool`: pool counts and available labels for an owner
//! - `claim`: claim the label for an order reference
//! - `release`: return the label claimed for an order to the pool
//! - `cancel`: withdraw a label from the pool
//! - `sweep`: expire labels past their retention window

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;

use labelpool::api::{CancelLabelRequest, GenerateLabelRequest, UploadBulkLabelsRequest};
use labelpool::{init_logging, load_config, App, Config};

#[derive(Parser)]
#[command(name = "labelpool")]
#[command(version)]
#[command(about = "Bulk prepaid shipping label ingestion and label pool")]
#[command(propagate_version = true)]
struct Cli {
    /// Config file (JSON). Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a bulk label PDF and wait until every page is processed
    Ingest {
        file: PathBuf,
        #[arg(long)]
        owner: String,
        #[arg(long)]
        courier: String,
    },
    /// Show processing progress of an upload
    Status { upload_id: String },
    /// Show pool counts and available labels
    Pool {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        courier: Option<String>,
    },
    /// Claim the label for an order reference
    Claim {
        reference: String,
        #[arg(long)]
        owner: String,
        #[arg(long)]
        courier: String,
        /// Order that holds the claim (defaults to the reference)
        #[arg(long)]
        consumer: Option<String>,
        /// Write the label image here instead of printing it
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Release the label claimed for an order reference or consumer order
    Release {
        order: String,
        #[arg(long)]
        owner: String,
        /// Only release a claim held by this consumer order
        #[arg(long)]
        consumer: Option<String>,
    },
    /// Withdraw a label from the pool
    Cancel { label_id: String },
    /// Expire labels past their retention window
    Sweep,
}

fn read_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    let mut config = match path {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => labelpool::config::load_config_from_str(r#"{"version": "1.0"}"#)?,
    };
    // Sweeps only run on request from the command line.
    config.pool.sweep_interval_secs = 0;
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn outcome(is_error: bool) -> ExitCode {
    if is_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = read_config(cli.config.as_ref())?;
    let app = App::init(config).context("Failed to initialise")?;

    let code = match cli.command {
        Commands::Ingest {
            file,
            owner,
            courier,
        } => {
            let document = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let receipt = app
                .service
                .upload_bulk_labels(UploadBulkLabelsRequest {
                    owner_id: owner,
                    courier_service_id: courier,
                    file_name,
                    document,
                })
                .await;
            print_json(&receipt)?;

            match receipt.bulk_upload_id {
                Some(id) => {
                    app.ingestion.shutdown().await;
                    let status = app.service.processing_status(&id);
                    print_json(&status)?;
                    outcome(status.is_error)
                }
                None => ExitCode::FAILURE,
            }
        }
        Commands::Status { upload_id } => {
            let status = app.service.processing_status(&upload_id);
            print_json(&status)?;
            outcome(status.is_error)
        }
        Commands::Pool { owner, courier } => {
            let status = app.service.pool_status(&owner, courier.as_deref());
            print_json(&status)?;
            outcome(status.is_error)
        }
        Commands::Claim {
            reference,
            owner,
            courier,
            consumer,
            out,
        } => {
            let mut request = GenerateLabelRequest::new(&reference, &courier);
            request.consumer_order_id = consumer;
            let mut response = app.service.generate_label(&owner, &request);

            if let (Some(out), Some(package)) = (out, response.packages.first_mut()) {
                use base64::Engine;
                let png = base64::engine::general_purpose::STANDARD
                    .decode(&package.png_label_data_base64)
                    .context("Label image is not valid base64")?;
                tokio::fs::write(&out, png)
                    .await
                    .with_context(|| format!("Failed to write {}", out.display()))?;
                package.png_label_data_base64 = out.display().to_string();
            }
            print_json(&response)?;
            outcome(response.is_error)
        }
        Commands::Release {
            order,
            owner,
            consumer,
        } => {
            let response = app.service.cancel_label(
                &owner,
                &CancelLabelRequest {
                    order_reference: order,
                    consumer_order_id: consumer,
                },
            );
            print_json(&response)?;
            outcome(response.is_error)
        }
        Commands::Cancel { label_id } => match app.pool.cancel(&label_id)? {
            Some(label) => {
                print_json(&label)?;
                ExitCode::SUCCESS
            }
            None => {
                eprintln!("Label {} is not available or claimed", label_id);
                ExitCode::FAILURE
            }
        },
        Commands::Sweep => {
            let expired = app.pool.expire_sweep()?;
            print_json(&serde_json::json!({ "expired": expired }))?;
            ExitCode::SUCCESS
        }
    };

    app.shutdown().await;
    Ok(code)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "labelpool=warn",
        1 => "labelpool=info",
        2 => "labelpool=debug",
        _ => "labelpool=trace",
    };
    init_logging(filter, cli.log_json);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
