//! `netvid-play --send host[:port] --file path [--speed f=1] [--seek F=0]
//! [--stop F=-1]`: replay a recording to `host:port`. `--seek`/`--stop`
//! bound playback by `frame_id`; `--speed` is a wall-clock multiplier.

use anyhow::{Context, Result};
use clap::Parser;
use netvid_net::UnlimitedSender;
use netvid_record::{Player, RecordingReader};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "netvid-play", version, about = "Replay a netvid recording over UDP")]
struct Args {
    /// Destination endpoint, e.g. `192.168.1.20:12382`.
    #[arg(long)]
    send: String,

    /// Recording to replay.
    #[arg(long)]
    file: String,

    /// Wall-clock speed multiplier (2.0 plays twice as fast).
    #[arg(long, default_value_t = 1.0)]
    speed: f64,

    /// Fast-forward until `frame_id >= seek`.
    #[arg(long, default_value_t = 0)]
    seek: u32,

    /// Stop once `frame_id >= stop`; negative means play to end-of-file.
    #[arg(long, default_value_t = -1)]
    stop: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    netvid_cli::init_tracing();
    let args = Args::parse();

    match run(args).await {
        Ok(bytes_sent) => {
            info!(bytes_sent, "playback finished");
            Ok(())
        }
        Err(e) => {
            error!("Fatal error: {:#}", e);
            Err(e)
        }
    }
}

async fn run(args: Args) -> Result<u64> {
    let remote = netvid_net::parse_endpoint(&args.send).await.context("resolving send endpoint")?;
    let local_socket = netvid_net::bind("0.0.0.0:0").await.context("binding send socket")?;
    let sink = UnlimitedSender::new(local_socket);

    let file = tokio::fs::File::open(&args.file)
        .await
        .with_context(|| format!("opening recording {}", args.file))?;
    let reader = RecordingReader::new(file);

    let stop = (args.stop >= 0).then_some(args.stop as u32);
    let mut player = Player::new(reader, sink, remote, args.speed, args.seek, stop);
    player.play().await.context("playback loop")
}
