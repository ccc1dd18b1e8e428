// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A [`RunListener`] that writes a JUnit XML report when the run finishes.

use crate::{
    collector::{RunCollector, RunListener},
    config::ListenerConfig,
    errors::{ListenerError, WriteReportError},
    output::OutputResolver,
    properties::{HostProperties, PropertyProvider},
    record::{RunRecord, TestFailure, TestIdentity},
    reporter::XmlReporter,
    time::Clock,
};
use camino::{Utf8Path, Utf8PathBuf};
use std::io::BufWriter;
use tracing::info;

/// Collects lifecycle events, then writes a JUnit XML report once the run finishes.
#[derive(Debug)]
pub struct XmlRunListener<P = HostProperties> {
    collector: RunCollector,
    resolver: OutputResolver,
    properties: P,
    suite_name: Option<String>,
    report_path: Option<Utf8PathBuf>,
}

impl XmlRunListener<HostProperties> {
    /// Creates a new listener from config, using the system clock.
    pub fn from_config(config: &ListenerConfig) -> Self {
        let mut listener = Self::new(
            RunCollector::new(),
            OutputResolver::from_config(&config.report),
            HostProperties::from_config(&config.properties),
        );
        listener.suite_name = config.report.suite_name.clone();
        listener
    }
}

impl<P: PropertyProvider> XmlRunListener<P> {
    /// Creates a new listener.
    pub fn new(collector: RunCollector, resolver: OutputResolver, properties: P) -> Self {
        Self {
            collector,
            resolver,
            properties,
            suite_name: None,
            report_path: None,
        }
    }

    /// Replaces the clock used to stamp events.
    ///
    /// Must be called before the run starts.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.collector = RunCollector::with_clock(clock);
        self
    }

    /// Uses `suite_name` in place of the name the runner passes to `run_started`.
    pub fn set_suite_name(&mut self, suite_name: impl Into<String>) -> &mut Self {
        self.suite_name = Some(suite_name.into());
        self
    }

    /// Returns the run record, if the run has started.
    pub fn record(&self) -> Option<&RunRecord> {
        self.collector.record()
    }

    /// Returns the path the report was written to, once the run has finished.
    pub fn report_path(&self) -> Option<&Utf8Path> {
        self.report_path.as_deref()
    }

    fn write_report(&mut self) -> Result<Utf8PathBuf, ListenerError> {
        let run = self.collector.finished_record()?;
        let mut report_file = self.resolver.resolve()?;
        write_report_to(run, report_file.writer()).map_err(|error| ListenerError::Write {
            path: report_file.path().to_owned(),
            error,
        })?;
        Ok(report_file.into_path())
    }
}

fn write_report_to(run: &RunRecord, file: &mut fs_err::File) -> Result<(), WriteReportError> {
    // XmlReporter flushes the BufWriter once the document is complete.
    XmlReporter::new(run)?.write(BufWriter::new(file))
}

impl<P: PropertyProvider> RunListener for XmlRunListener<P> {
    type Error = ListenerError;

    fn run_started(&mut self, suite_name: Option<&str>) -> Result<(), ListenerError> {
        let suite_name = self.suite_name.as_deref().or(suite_name);
        Ok(self.collector.run_started(suite_name)?)
    }

    fn test_started(&mut self, test: &TestIdentity) -> Result<(), ListenerError> {
        Ok(self.collector.test_started(test)?)
    }

    fn test_finished(&mut self, test: &TestIdentity) -> Result<(), ListenerError> {
        Ok(self.collector.test_finished(test)?)
    }

    fn test_failure(
        &mut self,
        test: &TestIdentity,
        failure: TestFailure,
    ) -> Result<(), ListenerError> {
        Ok(self.collector.test_failure(test, failure)?)
    }

    fn test_assumption_failure(&mut self, test: &TestIdentity) -> Result<(), ListenerError> {
        Ok(self.collector.test_assumption_failure(test)?)
    }

    fn test_ignored(&mut self, test: &TestIdentity) -> Result<(), ListenerError> {
        Ok(self.collector.test_ignored(test)?)
    }

    fn run_finished(&mut self) -> Result<(), ListenerError> {
        // The collector rejects a second run_finished, so the report is written at most once.
        self.collector.run_finished()?;
        self.collector
            .attach_properties(self.properties.properties())?;
        let path = self.write_report()?;
        info!("wrote JUnit report to {path}");
        self.report_path = Some(path);
        Ok(())
    }
}
