//! Property subsystem (§4.5): Common Rules for Property Exchange, the host
//! facade serving local properties, and the per-connection client facade
//! consuming a remote peer's properties.

pub mod client;
pub mod host;
pub mod metadata;
pub mod rules;
