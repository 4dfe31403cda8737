//! Declarative address/port filtering for back-end proxies.

pub mod pattern;
pub mod verifier;

pub use pattern::AddressRule;
pub use verifier::ProxyVerifier;
