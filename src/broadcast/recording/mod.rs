//! Local and cloud recording for a broadcast session.

mod coordinator;
pub mod naming;
mod watch;

pub use coordinator::RecordingCoordinator;
pub use watch::{ForcedStopCallback, SessionWatch};
