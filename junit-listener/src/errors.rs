// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by junit-listener.

use camino::Utf8PathBuf;
use config::ConfigError;
use itertools::Itertools;
use std::{error, fmt, io};
use thiserror::Error;

/// A lifecycle callback was made out of order.
///
/// The host runner is expected to call `run_started`, then any number of test events, then
/// `run_finished`, then report generation. Anything else is reported with this error rather than
/// silently corrupting the run record.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum LifecycleError {
    /// An event was received before `run_started`.
    #[error("`{event}` called before `run_started`")]
    RunNotStarted {
        /// The event that was received.
        event: &'static str,
    },

    /// `run_started` was called more than once.
    #[error("`run_started` called more than once")]
    RunAlreadyStarted,

    /// An event was received after `run_finished`.
    #[error("`{event}` called after `run_finished`")]
    RunAlreadyFinished {
        /// The event that was received.
        event: &'static str,
    },

    /// The run record was requested before `run_finished`.
    #[error("run record requested before `run_finished`")]
    RunNotFinished,
}

/// An error that occurred while writing a JUnit report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteReportError {
    /// The run this report is for hasn't finished yet.
    #[error("cannot write a report for a run that hasn't finished")]
    NotFinished,

    /// An error occurred while writing to the output.
    #[error("error writing JUnit report")]
    Io(#[from] io::Error),
}

/// A candidate destination for the report that could not be used.
#[derive(Debug)]
pub struct OutputAttempt {
    /// The path that was tried.
    pub path: Utf8PathBuf,

    /// The reason it was rejected.
    pub error: io::Error,
}

/// No destination for the report could be opened for writing.
#[derive(Debug, Error)]
#[error(
    "no writable destination for the JUnit report (tried: {})",
    .attempts.iter().map(|attempt| format!("{} ({})", attempt.path, attempt.error)).join(", ")
)]
pub struct ResolveOutputError {
    attempts: Vec<OutputAttempt>,
}

impl ResolveOutputError {
    pub(crate) fn new(attempts: Vec<OutputAttempt>) -> Self {
        Self { attempts }
    }

    /// Returns the destinations that were tried, in order.
    pub fn attempts(&self) -> &[OutputAttempt] {
        &self.attempts
    }
}

/// An error that occurred while parsing the listener config.
#[derive(Debug, Error)]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Option<Utf8PathBuf>,
    #[source]
    err: ConfigError,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: Option<Utf8PathBuf>, err: ConfigError) -> Self {
        Self { config_file, err }
    }

    /// Returns the config file that failed to parse, if the error is specific to one.
    pub fn config_file(&self) -> Option<&Utf8PathBuf> {
        self.config_file.as_ref()
    }
}

impl fmt::Display for ConfigParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.config_file {
            Some(config_file) => write!(f, "failed to parse junit-listener config at `{config_file}`"),
            None => write!(f, "failed to parse junit-listener config"),
        }
    }
}

/// An error that occurred while replaying a recorded event stream.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReplayError {
    /// The event stream could not be read.
    #[error("error reading event stream at line {line}")]
    Read {
        /// The 1-based line number.
        line: usize,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// A line of the event stream wasn't a valid event.
    #[error("invalid event at line {line}")]
    Parse {
        /// The 1-based line number.
        line: usize,

        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },

    /// The listener rejected an event.
    #[error("listener rejected event at line {line}")]
    Listener {
        /// The 1-based line number.
        line: usize,

        /// The underlying error.
        #[source]
        error: Box<dyn error::Error + Send + Sync>,
    },
}

/// An error returned by [`XmlRunListener`](crate::listener::XmlRunListener).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ListenerError {
    /// A lifecycle callback was made out of order.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// No destination for the report could be found.
    #[error(transparent)]
    ResolveOutput(#[from] ResolveOutputError),

    /// The report could not be written.
    #[error("error writing JUnit report to {path}")]
    Write {
        /// The destination file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: WriteReportError,
    },
}

/// Displays an error along with its chain of sources on one line each.
#[derive(Debug)]
pub struct DisplayErrorChain<E>(E);

impl<E: error::Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self(error)
    }
}

impl<E: error::Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut current = self.0.source();
        while let Some(source) = current {
            write!(f, "\n  caused by: {source}")?;
            current = source.source();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_output_error_lists_attempts() {
        let error = ResolveOutputError::new(vec![
            OutputAttempt {
                path: "/nope/results.xml".into(),
                error: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
            },
            OutputAttempt {
                path: "/also-nope/results.xml".into(),
                error: io::Error::new(io::ErrorKind::NotFound, "not found"),
            },
        ]);
        assert_eq!(
            error.to_string(),
            "no writable destination for the JUnit report \
             (tried: /nope/results.xml (denied), /also-nope/results.xml (not found))"
        );
        assert_eq!(error.attempts().len(), 2);
    }

    #[test]
    fn display_error_chain() {
        let error = ListenerError::Write {
            path: "out/report.xml".into(),
            error: WriteReportError::Io(io::Error::other("disk full")),
        };
        assert_eq!(
            DisplayErrorChain::new(&error).to_string(),
            "error writing JUnit report to out/report.xml\n  \
             caused by: error writing JUnit report\n  \
             caused by: disk full"
        );
    }
}
