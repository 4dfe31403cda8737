//! Request forwarding between a session's two directions.

pub mod forwarder;
pub mod mode;

pub use forwarder::{ForwardOutcome, RequestForwarder};
pub use mode::{ForwardSpec, FORWARD_KEY};
