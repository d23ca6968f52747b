//! Health monitoring
//!
//! Turns protocol symptoms into the single error code shown to the user.

pub mod monitor;

pub use monitor::{classify, ErrorCode, HealthInputs, HealthMonitor};
