//! Host lifecycle signals

use crate::TelemetrySession;

/// Environment transitions reported by the host application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Suspended,
    Resumed,
    FocusLost,
    FocusGained,
}

impl LifecycleEvent {
    /// Map a pause callback (`true` = paused)
    pub fn from_pause(paused: bool) -> Self {
        if paused {
            LifecycleEvent::Suspended
        } else {
            LifecycleEvent::Resumed
        }
    }

    /// Map a focus callback (`true` = focus gained)
    pub fn from_focus(has_focus: bool) -> Self {
        if has_focus {
            LifecycleEvent::FocusGained
        } else {
            LifecycleEvent::FocusLost
        }
    }

    /// Sockets may have gone stale while away
    pub fn requires_reconnect(&self) -> bool {
        matches!(self, LifecycleEvent::Resumed | LifecycleEvent::FocusGained)
    }
}

/// Receives lifecycle events from the host
pub trait LifecycleObserver {
    fn on_lifecycle(&self, event: LifecycleEvent);
}

impl LifecycleObserver for TelemetrySession {
    fn on_lifecycle(&self, event: LifecycleEvent) {
        tracing::info!(?event, "lifecycle event");
        if event.requires_reconnect() {
            self.reconnect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::sync::Arc;
    use std::time::Duration;

    use poselink_config::{FixedConfig, SessionConfig};

    use crate::SessionOptions;

    #[test]
    fn test_event_mapping() {
        assert_eq!(LifecycleEvent::from_pause(true), LifecycleEvent::Suspended);
        assert_eq!(LifecycleEvent::from_pause(false), LifecycleEvent::Resumed);
        assert_eq!(LifecycleEvent::from_focus(false), LifecycleEvent::FocusLost);
        assert!(LifecycleEvent::FocusGained.requires_reconnect());
        assert!(!LifecycleEvent::Suspended.requires_reconnect());
        assert!(!LifecycleEvent::FocusLost.requires_reconnect());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_reconnects_session() {
        let session = TelemetrySession::new(
            Arc::new(FixedConfig(SessionConfig::default())),
            SessionOptions {
                broadcast_address: Ipv4Addr::LOCALHOST,
                ..SessionOptions::default()
            },
        );
        session.init(SessionConfig::default()).await.unwrap();

        session.on_lifecycle(LifecycleEvent::Suspended);
        assert!(session.has_transport());

        session.on_lifecycle(LifecycleEvent::Resumed);
        assert!(!session.has_transport());
        assert_eq!(session.stats().reconnects, 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(session.has_transport());
        assert_eq!(session.stats().inits, 2);
    }
}
