// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command-line interface for junit-listener.
//!
//! Replays a recorded stream of test run lifecycle events (JSON Lines) and writes a JUnit XML
//! report. See `junit-listener --help` for usage.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod exit_codes;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
pub use exit_codes::ListenerExitCode;
#[doc(hidden)]
pub use output::{OutputContext, OutputWriter};
