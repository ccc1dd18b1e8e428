// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::ExpectedError,
    exit_codes::ListenerExitCode,
    output::{OutputContext, OutputOpts, OutputWriter, clap_styles},
};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use junit_listener::{
    config::ListenerConfig,
    events::{ReplaySummary, replay},
    listener::XmlRunListener,
    time::ManualClock,
};
use std::io::{self, BufRead, BufReader, Write};
use tracing::{debug, info};

/// Writes JUnit XML reports from recorded test run events.
///
/// Test runners that can't call into the listener directly record lifecycle events as JSON Lines
/// (one event per line), which this tool replays to produce the report.
#[derive(Debug, Parser)]
#[command(version, name = "junit-listener", styles = clap_styles())]
pub struct JunitListenerApp {
    #[command(flatten)]
    output: OutputOpts,

    #[command(flatten)]
    config_opts: ConfigOpts,

    #[command(subcommand)]
    command: Command,
}

impl JunitListenerApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the process exit code.
    pub fn exec(
        self,
        output: OutputContext,
        output_writer: &mut OutputWriter,
    ) -> Result<i32, ExpectedError> {
        let config = self.config_opts.make_config()?;
        match self.command {
            Command::Replay {
                events,
                result_file,
                suite_name,
            } => {
                let mut config = config;
                if let Some(result_file) = result_file {
                    config.set_result_file(result_file);
                }
                if let Some(suite_name) = suite_name {
                    config.report.suite_name = Some(suite_name);
                }
                exec_replay(&config, &events, output, output_writer)
            }
            Command::ShowConfig => {
                let toml = config
                    .to_toml()
                    .map_err(|err| ExpectedError::ShowConfigError { err })?;
                let mut writer = output_writer.stdout_writer();
                writer
                    .write_all(toml.as_bytes())
                    .and_then(|()| writer.flush())
                    .map_err(|err| ExpectedError::WriteOutputError { err })?;
                Ok(ListenerExitCode::OK)
            }
        }
    }
}

#[derive(Debug, Args)]
struct ConfigOpts {
    /// Config file [default: .config/junit-listener.toml]
    #[arg(long, global = true, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,
}

impl ConfigOpts {
    fn make_config(&self) -> Result<ListenerConfig, ExpectedError> {
        Ok(ListenerConfig::from_sources(
            Utf8Path::new("."),
            self.config_file.as_deref(),
        )?)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Replay a recorded event stream and write a JUnit report
    ///
    /// Prints the path of the report to stdout once it's been written.
    Replay {
        /// Events file, or - for standard input
        #[arg(long, value_name = "FILE", default_value = "-")]
        events: Utf8PathBuf,

        /// Preferred report destination, overriding the config
        #[arg(long, value_name = "PATH")]
        result_file: Option<Utf8PathBuf>,

        /// Suite name, overriding the one in the event stream
        #[arg(long, value_name = "NAME")]
        suite_name: Option<String>,
    },

    /// Print the resolved configuration as TOML
    ShowConfig,
}

fn exec_replay(
    config: &ListenerConfig,
    events: &Utf8Path,
    output: OutputContext,
    output_writer: &mut OutputWriter,
) -> Result<i32, ExpectedError> {
    let reader: Box<dyn BufRead> = if events.as_str() == "-" {
        debug!("reading events from standard input");
        Box::new(io::stdin().lock())
    } else {
        let file = fs_err::File::open(events).map_err(|err| ExpectedError::EventsOpenError {
            path: events.to_owned(),
            err,
        })?;
        Box::new(BufReader::new(file))
    };

    // Events without an `at` time are stamped with the time replay started.
    let clock = ManualClock::new(Local::now().fixed_offset());
    let mut listener = XmlRunListener::from_config(config).with_clock(clock.clone());

    let ReplaySummary {
        events,
        run_finished,
    } = replay(reader, &mut listener, &clock).map_err(ExpectedError::replay_error)?;
    if !run_finished {
        return Err(ExpectedError::IncompleteRun { events });
    }

    if output.verbose {
        if let Some(run) = listener.record() {
            let counts = run.counts();
            info!(
                "replayed {events} events: {} tests, {} failures, {} skipped",
                counts.tests, counts.failures, counts.skipped
            );
        }
    }

    if let Some(report_path) = listener.report_path() {
        let mut writer = output_writer.stdout_writer();
        writeln!(writer, "{report_path}")
            .and_then(|()| writer.flush())
            .map_err(|err| ExpectedError::WriteOutputError { err })?;
    }

    Ok(ListenerExitCode::OK)
}
