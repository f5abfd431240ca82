//! Integration tests for anchor-io using the mock radio
//!
//! Each test starts a complete anchor on loopback (acquisition, stream
//! sender and command server threads) and drives it like a host would.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p anchor-io --test integration -- --nocapture
//! ```

mod control;
mod harness;
mod lifecycle;
mod streaming;
