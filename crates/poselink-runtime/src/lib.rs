//! PoseLink Runtime - telemetry session orchestration
//!
//! This crate ties the lower layers together:
//! - [`TelemetrySession`]: one outbound transport, throttled pose sends,
//!   runtime retargeting and supersedable reconnects
//! - Lifecycle events from the host mapped onto reconnects
//! - Named trigger broadcasts and auxiliary pose streams
//! - [`PoseReceiver`]: the receive loop feeding a reconstructor
//! - Logging setup

pub mod lifecycle;
pub mod logging;
pub mod receiver;
pub mod session;
pub mod signal;
pub mod stream;

pub use lifecycle::*;
pub use logging::*;
pub use receiver::*;
pub use session::*;
pub use signal::*;
pub use stream::*;
