//! # wikifuse Common Library
//!
//! Shared code for the wikifuse workspace:
//! - Error type used outside the fusion core (I/O, parsing, configuration)
//! - TOML configuration loading and config file resolution
//! - Clock abstraction and lenient timestamp parsing

pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
pub use time::{Clock, FixedClock, SystemClock};
