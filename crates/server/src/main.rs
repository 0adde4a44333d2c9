use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use camera_streamer::error::Result;
use camera_streamer::handler::StreamerHandler;
use camera_streamer::params::extract_h264_parameters;
use camera_streamer::streamer::Streamer;
use camera_streamer::tls;

use rtsp::{H264Format, Media, Server, ServerConfig, ServerStream, SessionDescription};

/// How long startup waits for SPS/PPS to appear on the camera pipe.
const EXTRACT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(name = "camera-streamer", version, about = "Serve an MPEG-TS camera pipe over RTSP/TLS")]
struct Args {
    /// TLS certificate path
    #[arg(short, long, default_value = "scripts/server.crt")]
    cert: PathBuf,

    /// TLS private key path
    #[arg(short, long, default_value = "scripts/server.key")]
    key: PathBuf,

    /// Camera pipe path
    #[arg(short, long, default_value = "./camera_stream")]
    pipe: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        tracing::error!(error = %e, "fatal");
        std::process::exit(1);
    }
}

/// Fixed startup sequence; never returns `Ok` because a healthy server
/// blocks in `wait` until a fatal error arrives.
fn run(args: &Args) -> Result<()> {
    let tls_config = tls::load_tls_config(&args.cert, &args.key)?;

    let handler = Arc::new(StreamerHandler::new());
    let config = ServerConfig {
        tls: Some(Arc::new(tls_config)),
        ..ServerConfig::default()
    };
    let server = Server::new(config, handler.clone())?;

    // Clients can connect from here on, but the handler holds them at
    // the readiness gate until the stream exists.
    server.start()?;

    let params = extract_h264_parameters(&args.pipe, EXTRACT_TIMEOUT)?;
    tracing::info!(
        sps_len = params.sps.len(),
        pps_len = params.pps.len(),
        "extracted H.264 parameters"
    );

    let format = H264Format::new(params.sps, params.pps)?;
    let description = SessionDescription::new(vec![Media::video(format)])?;

    let stream = Arc::new(ServerStream::new(&server, description));
    stream.initialize()?;
    handler.set_stream(stream.clone());

    let streamer = Streamer::new(stream.clone(), &args.pipe);
    streamer.initialize()?;

    handler.ready();
    tracing::info!(addr = server.rtsp_address(), "serving clients");

    let err = server.wait();
    streamer.close();
    stream.close();
    Err(err.into())
}
