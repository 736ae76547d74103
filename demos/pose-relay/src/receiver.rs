//! PoseLink pose receiver
//!
//! Listens for pose messages, smooths them, and prints the applied pose as
//! one JSON line per output period.
//!
//! Usage: pose-receiver [PORT] [--blend R] [--smooth-ms N] [--json-logs]
//!
//! PORT defaults to `receive_port` from `poselink_config.txt`. Point the
//! sender's `send_port` at the same value.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

use poselink_config::{ConfigResolver, ResolverOptions};
use poselink_core::{FrameClock, PoseTransform};
use poselink_runtime::{init_logging, LogFormat, PoseReceiver, SessionOptions};
use poselink_visual::{PoseReconstructor, ReconstructorConfig};

const FRAME: Duration = Duration::from_millis(16);
const REPORT_EVERY: u32 = 30;

#[derive(Serialize)]
struct Report<'a> {
    elapsed_ms: u128,
    applied: &'a PoseTransform,
    received: u64,
    dropped: u64,
    blend_ratio: f32,
}

fn flag_value<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let format = if args.iter().any(|a| a == "--json-logs") {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    init_logging("info", format).map_err(|e| e as Box<dyn std::error::Error>)?;

    let port: u16 = match args.first().and_then(|a| a.parse().ok()) {
        Some(port) => port,
        None => ConfigResolver::new(ResolverOptions::for_current_platform())
            .resolve()
            .receive_port,
    };
    let config = ReconstructorConfig {
        blend_ratio: flag_value(&args, "--blend").unwrap_or(1.0),
        smooth_time: flag_value(&args, "--smooth-ms")
            .map(Duration::from_millis)
            .unwrap_or(ReconstructorConfig::default().smooth_time),
        ..ReconstructorConfig::default()
    };

    let reconstructor = Arc::new(Mutex::new(PoseReconstructor::new(
        PoseTransform::default(),
        config,
    )));
    let receiver = PoseReceiver::spawn(
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
        SessionOptions::default().pose_topic(),
        reconstructor,
    )
    .await?;

    let mut clock = FrameClock::new();
    let mut ticker = tokio::time::interval(FRAME);
    let mut frame: u32 = 0;
    loop {
        ticker.tick().await;
        let applied = receiver.tick(&mut clock);

        frame += 1;
        if frame % REPORT_EVERY == 0 {
            let shared = receiver.reconstructor();
            let r = shared.lock();
            let report = Report {
                elapsed_ms: clock.elapsed().as_millis(),
                applied: &applied,
                received: r.received_count(),
                dropped: r.dropped_messages(),
                blend_ratio: r.blend_ratio(),
            };
            println!("{}", serde_json::to_string(&report)?);
        }
    }
}
