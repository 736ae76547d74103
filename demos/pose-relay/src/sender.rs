//! PoseLink pose sender
//!
//! Walks a synthetic participant around a circle and streams the pose to the
//! configured target at the configured cadence.
//!
//! Usage: pose-sender [TARGET_IP] [--seconds N] [--emergency] [--trigger] [--json]

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use poselink_config::{ConfigResolver, ResolverOptions};
use poselink_core::{Position3D, ReferenceFrame, Rotation3D};
use poselink_runtime::{
    init_logging, AuxiliaryStream, LogFormat, SessionOptions, TelemetrySession, TickOutcome,
    Trigger,
};
use poselink_test::{Trajectory, TrajectoryConfig};

const FRAME: Duration = Duration::from_millis(16);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let json = args.iter().any(|a| a == "--json");
    init_logging(
        "info",
        if json { LogFormat::Json } else { LogFormat::Pretty },
    )
    .map_err(|e| e as Box<dyn std::error::Error>)?;

    let target: Option<Ipv4Addr> = args.first().and_then(|a| a.parse().ok());
    let seconds: u64 = args
        .iter()
        .position(|a| a == "--seconds")
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(30);

    let resolver = ConfigResolver::new(ResolverOptions::for_current_platform());
    let session = TelemetrySession::new(Arc::new(resolver), SessionOptions::default());
    session.start().await?;
    if let Some(target) = target {
        session.set_target(target)?;
    }

    if args.iter().any(|a| a == "--trigger") {
        if let Err(e) = session.trigger(Trigger::Windows).await {
            tracing::warn!("trigger not sent: {}", e);
        }
    }

    let mut emergency = AuxiliaryStream::emergency();
    emergency.set_auto_send(args.iter().any(|a| a == "--emergency"));

    // Poses are streamed relative to a play-area anchor a meter ahead
    let anchor = ReferenceFrame::new(Position3D::new(0.0, 0.0, 1.0), Rotation3D::identity());
    let mut walk = Trajectory::new(TrajectoryConfig::default());

    let start = Instant::now();
    let mut ticker = tokio::time::interval(FRAME);
    while start.elapsed() < Duration::from_secs(seconds) {
        ticker.tick().await;
        let now = Instant::now();
        let world = walk.sample(now - start);

        if session.tick(now, &anchor.to_local_pose(&world)).await == TickOutcome::Failed {
            tracing::debug!("pose send failed");
        }
        emergency.tick(&session, now, &world).await;
    }

    let stats = session.stats();
    println!("{}", serde_json::to_string(&stats)?);
    session.shutdown();
    Ok(())
}
