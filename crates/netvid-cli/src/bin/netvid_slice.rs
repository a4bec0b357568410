//! `netvid-slice --input-file in --output-file out [--seek F] [--stop F]`:
//! a verbatim copy of the recording between frame bounds, with no pacing and
//! no socket.

use anyhow::{Context, Result};
use clap::Parser;
use netvid_record::{RecordingReader, RecordingWriter, Slicer};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "netvid-slice", version, about = "Cut a netvid recording between frame bounds")]
struct Args {
    #[arg(long = "input-file")]
    input_file: String,

    #[arg(long = "output-file")]
    output_file: String,

    /// Fast-forward until `frame_id >= seek`.
    #[arg(long, default_value_t = 0)]
    seek: u32,

    /// Stop once `frame_id >= stop`; negative means slice to end-of-file.
    #[arg(long, default_value_t = -1)]
    stop: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    netvid_cli::init_tracing();
    let args = Args::parse();

    match run(args).await {
        Ok(count) => {
            info!(count, "slice finished");
            Ok(())
        }
        Err(e) => {
            error!("Fatal error: {:#}", e);
            Err(e)
        }
    }
}

async fn run(args: Args) -> Result<u64> {
    let input = tokio::fs::File::open(&args.input_file)
        .await
        .with_context(|| format!("opening {}", args.input_file))?;
    let output = tokio::fs::File::create(&args.output_file)
        .await
        .with_context(|| format!("creating {}", args.output_file))?;

    let reader = RecordingReader::new(input);
    let writer = RecordingWriter::new(output);
    let stop = (args.stop >= 0).then_some(args.stop as u32);

    Slicer::new(reader, writer, args.seek, stop).run().await.context("slicing")
}
