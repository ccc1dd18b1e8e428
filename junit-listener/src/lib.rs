// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Collect test run lifecycle events and write them out as a JUnit XML report.
//!
//! The basic flow is:
//!
//! 1. A host test runner calls into a [`RunListener`](collector::RunListener) as the run
//!    progresses: run started, test started/finished/failed/ignored, run finished.
//! 2. A [`RunCollector`](collector::RunCollector) accumulates those events into a
//!    [`RunRecord`](record::RunRecord).
//! 3. Once the run has finished, an [`XmlReporter`](reporter::XmlReporter) serializes the record
//!    to a writer, exactly once.
//!
//! [`XmlRunListener`](listener::XmlRunListener) wires all of this together, including picking a
//! destination file for the report.

pub mod collector;
pub mod config;
pub mod errors;
pub mod events;
pub mod listener;
pub mod output;
pub mod properties;
pub mod record;
pub mod reporter;
pub mod time;
