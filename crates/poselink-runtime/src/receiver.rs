//! Receive path - OSC datagrams into a shared reconstructor

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use poselink_core::{FrameClock, PoseLinkResult, PoseTransform};
use poselink_transport::{start_receive_loop, OscReceiver};
use poselink_visual::PoseReconstructor;

/// Reconstructor shared between the receive task and the render loop
pub type SharedReconstructor = Arc<Mutex<PoseReconstructor>>;

/// Depth of the parsed-message queue
pub const RECEIVE_QUEUE: usize = 64;

const ANNOUNCE_PREFIX: &str = "/setAddress/";

/// A sender that announced itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub device_tag: String,
    pub payload: String,
    pub from: SocketAddr,
}

/// Background task feeding pose messages on one topic into a reconstructor.
///
/// Announcements are remembered, other topics are ignored. Dropping the
/// receiver stops both tasks and releases the socket.
pub struct PoseReceiver {
    local_addr: SocketAddr,
    topic: String,
    reconstructor: SharedReconstructor,
    last_announce: Arc<Mutex<Option<Announcement>>>,
    recv_task: JoinHandle<()>,
    task: JoinHandle<()>,
}

impl PoseReceiver {
    pub async fn spawn(
        bind: SocketAddr,
        topic: impl Into<String>,
        reconstructor: SharedReconstructor,
    ) -> PoseLinkResult<Self> {
        let receiver = OscReceiver::bind(bind).await?;
        let local_addr = receiver.local_addr();
        let topic = topic.into();
        let last_announce = Arc::new(Mutex::new(None));

        let (mut rx, recv_task) = start_receive_loop(receiver.socket(), RECEIVE_QUEUE);
        let task = {
            let topic = topic.clone();
            let reconstructor = Arc::clone(&reconstructor);
            let last_announce = Arc::clone(&last_announce);
            tokio::spawn(async move {
                while let Some((message, from)) = rx.recv().await {
                    if message.address == topic {
                        // Malformed bodies are counted and logged by the reconstructor
                        let _ = reconstructor.lock().on_osc(&message);
                    } else if let Some(tag) = message.address.strip_prefix(ANNOUNCE_PREFIX) {
                        let payload = message.first_string().unwrap_or_default().to_string();
                        tracing::info!(%from, device = %payload, "sender announced");
                        *last_announce.lock() = Some(Announcement {
                            device_tag: tag.to_string(),
                            payload,
                            from,
                        });
                    } else {
                        tracing::trace!(address = %message.address, "ignoring message");
                    }
                }
            })
        };

        tracing::info!(%local_addr, topic = %topic, "pose receiver listening");
        Ok(PoseReceiver {
            local_addr,
            topic,
            reconstructor,
            last_announce,
            recv_task,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn reconstructor(&self) -> SharedReconstructor {
        Arc::clone(&self.reconstructor)
    }

    /// Most recent `/setAddress/...` announcement
    pub fn last_announce(&self) -> Option<Announcement> {
        self.last_announce.lock().clone()
    }

    /// Advance the reconstructor by one clamped clock step
    pub fn tick(&self, clock: &mut FrameClock) -> PoseTransform {
        self.tick_at(clock, Instant::now())
    }

    /// Like [`PoseReceiver::tick`], with the frame time supplied
    pub fn tick_at(&self, clock: &mut FrameClock, now: Instant) -> PoseTransform {
        let dt = clock.tick_at(now);
        self.reconstructor.lock().tick(dt)
    }
}

impl Drop for PoseReceiver {
    fn drop(&mut self) {
        self.recv_task.abort();
        self.task.abort();
    }
}
