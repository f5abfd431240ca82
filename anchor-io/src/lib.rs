//! anchor-io - FMCOMMS5 anchor daemon
//!
//! Continuously acquires multi-channel I/Q batches from a dual-AD9361 radio,
//! keeps only the batches that carry signal, and streams them over UDP to a
//! host that steers the anchor over a small TCP token protocol.
//!
//! ## Features
//!
//! - `fmcomms5`: Real hardware backend over libiio/libad9361. Without it only
//!   the simulated `mock` radio is available.

pub mod acquisition;
pub mod config;
pub mod core;
pub mod devices;
pub mod error;
pub mod streaming;
pub mod supervisor;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{Error, Result};
pub use supervisor::{Anchor, ShutdownReport};
