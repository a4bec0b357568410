//! `netvid-record --recv host[:port] --file path`: bind to the endpoint and
//! stream received packets, timestamped, into `path` (or stdout if `-`).
//! `SIGINT` triggers a flush and clean exit.

use anyhow::{Context, Result};
use clap::Parser;
use netvid_record::{Recorder, RecordingWriter};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "netvid-record", version, about = "Capture a netvid UDP stream to a file")]
struct Args {
    /// Endpoint to bind and listen on, e.g. `0.0.0.0:12382`.
    #[arg(long)]
    recv: String,

    /// Output recording path, or `-` for stdout.
    #[arg(long)]
    file: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    netvid_cli::init_tracing();
    let args = Args::parse();

    match run(args).await {
        Ok(bytes_written) => {
            info!(bytes_written, "recording finished");
            Ok(())
        }
        Err(e) => {
            error!("Fatal error: {:#}", e);
            Err(e)
        }
    }
}

async fn run(args: Args) -> Result<u64> {
    let socket = netvid_net::bind(&args.recv).await.context("binding receive endpoint")?;

    if args.file == "-" {
        let writer = RecordingWriter::new(tokio::io::stdout());
        Recorder::new(socket, writer).run(shutdown_signal()).await.context("recording loop")
    } else {
        let file = tokio::fs::File::create(&args.file)
            .await
            .with_context(|| format!("creating recording file {}", args.file))?;
        let writer = RecordingWriter::new(file);
        Recorder::new(socket, writer).run(shutdown_signal()).await.context("recording loop")
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {e}");
    }
}
