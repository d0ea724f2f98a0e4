//! Protocol module for the feeder's ASCII line protocol.
//!
//! This module contains:
//! - byte/text conversion of payloads
//! - command construction
//! - parsing of incoming report lines

pub mod codec;
pub mod commands;
pub mod messages;

pub use codec::{decode, encode};
pub use commands::Command;
pub use messages::{parse_incoming, ClockReport, Incoming};
