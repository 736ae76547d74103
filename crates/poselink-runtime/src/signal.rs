//! Named cross-process trigger broadcasts

use poselink_core::PoseLinkResult;

use crate::TelemetrySession;

/// Payload carried by every trigger
pub const TRIGGER_PAYLOAD: &str = "Trigger";

/// A trigger listened for by a companion process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Frame capture on the headset side
    VrFrame,
    /// Desktop companion
    Windows,
}

impl Trigger {
    pub fn topic(&self) -> &'static str {
        match self {
            // Spelling is part of the protocol
            Trigger::VrFrame => "/Direct/VRrame",
            Trigger::Windows => "/Direct/Windows",
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            Trigger::VrFrame => 20005,
            Trigger::Windows => 20002,
        }
    }
}

impl TelemetrySession {
    /// Broadcast `trigger` on its fixed topic and port
    pub async fn trigger(&self, trigger: Trigger) -> PoseLinkResult<()> {
        tracing::debug!(?trigger, "broadcasting trigger");
        self.broadcast_signal(trigger.topic(), TRIGGER_PAYLOAD, trigger.port())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_routes() {
        assert_eq!(Trigger::VrFrame.topic(), "/Direct/VRrame");
        assert_eq!(Trigger::VrFrame.port(), 20005);
        assert_eq!(Trigger::Windows.topic(), "/Direct/Windows");
        assert_eq!(Trigger::Windows.port(), 20002);
    }
}
