//! Falcon Probe - Sensor report capture
//!
//! Runs the sensor's status command and turns its report into metrics:
//! - `falconctl stats` invocation with a bounded wait
//! - Report sources (live command, saved report file)
//! - One collection cycle: capture + extraction

pub mod command;
pub mod source;
pub mod collector;

pub use command::*;
pub use source::*;
pub use collector::*;
