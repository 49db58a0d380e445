//! Core domain + application logic for the OneBot message bridge.
//!
//! Message identity (short handles, long ids, the resolve cascade) and forward-bundle
//! composition. The messaging backend, media store and filesystem fetching live behind
//! ports (traits) implemented in adapter crates.

pub mod config;
pub mod domain;
pub mod errors;
pub mod forward;
pub mod identity;
pub mod ids;
pub mod logging;
pub mod ports;

pub use errors::{Error, Result};
