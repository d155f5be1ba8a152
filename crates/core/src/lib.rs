//! Run-control core for the NGU Idle automation: window discovery, gated
//! input, the worker state machine, progress events and lifetime stats.

pub mod error;
pub mod format;
pub mod gate;
pub mod input;
pub mod logger;
pub mod lua_rt;
pub mod platform;
pub mod progress;
pub mod runner;
pub mod settings;
pub mod sleep;
pub mod stats;
pub mod types;
pub mod window;

pub use error::{Result, RunError};
