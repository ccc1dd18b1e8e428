// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    exit_codes::ListenerExitCode,
    output::{NO_HEADING_TARGET, StderrStyles},
};
use camino::Utf8PathBuf;
use junit_listener::errors::{ConfigParseError, DisplayErrorChain, ListenerError, ReplayError};
use owo_colors::OwoColorize;
use std::error::Error;
use thiserror::Error;
use tracing::error;

/// An error that occurred in a way that's expected, mapped to a documented exit code.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("error opening events file")]
    EventsOpenError {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("error serializing config")]
    ShowConfigError {
        #[source]
        err: toml::ser::Error,
    },
    #[error("error reading event stream")]
    EventStreamError {
        #[source]
        err: ReplayError,
    },
    #[error("event stream ended before the run finished")]
    IncompleteRun { events: usize },
    #[error("error writing JUnit report")]
    ReportError {
        line: usize,
        #[source]
        err: ListenerError,
    },
    #[error("error writing to stdout")]
    WriteOutputError {
        #[source]
        err: std::io::Error,
    },
}

impl ExpectedError {
    /// Classifies a replay error: failures to produce the report are reported separately from
    /// problems with the event stream itself.
    pub(crate) fn replay_error(err: ReplayError) -> Self {
        match err {
            ReplayError::Listener { line, error } => match error.downcast::<ListenerError>() {
                Ok(listener_error) => match *listener_error {
                    ListenerError::Lifecycle(lifecycle) => Self::EventStreamError {
                        err: ReplayError::Listener {
                            line,
                            error: Box::new(lifecycle),
                        },
                    },
                    other => Self::ReportError { line, err: other },
                },
                Err(error) => Self::EventStreamError {
                    err: ReplayError::Listener { line, error },
                },
            },
            other => Self::EventStreamError { err: other },
        }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::ConfigParseError { .. }
            | Self::EventsOpenError { .. }
            | Self::ShowConfigError { .. } => ListenerExitCode::SETUP_ERROR,
            Self::EventStreamError { .. } => ListenerExitCode::EVENT_STREAM_ERROR,
            Self::IncompleteRun { .. } => ListenerExitCode::INCOMPLETE_RUN,
            Self::ReportError { .. } | Self::WriteOutputError { .. } => {
                ListenerExitCode::WRITE_OUTPUT_ERROR
            }
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        match self {
            Self::ConfigParseError { .. } => error!("failed to load junit-listener config"),
            Self::EventsOpenError { path, .. } => {
                error!("failed to open events file `{}`", path.style(styles.bold));
            }
            Self::ShowConfigError { .. } => error!("failed to serialize config"),
            Self::EventStreamError { .. } => error!("failed to replay event stream"),
            Self::IncompleteRun { events } => {
                error!(
                    "event stream ended after {} events without a {} event, so no report was written",
                    events.style(styles.bold),
                    "run-finished".style(styles.bold),
                );
            }
            Self::ReportError { line, .. } => {
                error!("failed to write JUnit report (at event stream line {line})");
            }
            Self::WriteOutputError { .. } => error!("failed to write to stdout"),
        }

        if let Some(chain) = self.caused_by() {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {chain}");
        }
    }

    fn caused_by(&self) -> Option<DisplayErrorChain<&dyn Error>> {
        let err: &dyn Error = match self {
            Self::ConfigParseError { err } => err,
            Self::EventsOpenError { err, .. } => err,
            Self::ShowConfigError { err } => err,
            Self::EventStreamError { err } => err,
            Self::IncompleteRun { .. } => return None,
            Self::ReportError { err, .. } => err,
            Self::WriteOutputError { err } => err,
        };
        Some(DisplayErrorChain::new(err))
    }
}
