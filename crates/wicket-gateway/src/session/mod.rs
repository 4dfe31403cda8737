//! Session lifecycle: coordinated creation, per-session routing, and the
//! client-facing control servant.

mod control;
mod coordinator;
mod router;

pub use control::SessionControl;
pub use coordinator::{RoutedTarget, SessionCoordinator};
pub use router::{SessionRouter, SessionState};
