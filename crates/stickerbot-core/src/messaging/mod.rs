//! Transport-neutral messaging: the port, its message types and the send throttle.

pub mod port;
pub mod throttled;
pub mod types;
