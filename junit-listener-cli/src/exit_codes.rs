// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `junit-listener` failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum ListenerExitCode {}

impl ListenerExitCode {
    /// No errors occurred and a report was written.
    pub const OK: i32 = 0;

    /// A user issue happened while setting up a `junit-listener` invocation, e.g. an invalid
    /// config file or a missing events file.
    pub const SETUP_ERROR: i32 = 96;

    /// The event stream couldn't be read, contained an invalid event, or contained events in an
    /// invalid order.
    pub const EVENT_STREAM_ERROR: i32 = 104;

    /// The event stream ended before the run finished, so no report was written.
    pub const INCOMPLETE_RUN: i32 = 106;

    /// No destination for the report could be opened, or writing data to it or to stdout
    /// produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}
