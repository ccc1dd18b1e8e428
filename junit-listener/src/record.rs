// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The data model for a single test run.

use crate::{properties::EnvironmentProperties, time::Timestamp};
use chrono::SecondsFormat;
use indexmap::IndexMap;
use std::{fmt, time::Duration};

/// Identifies a single test case within a run: the fully-qualified class name, plus the method
/// or display name.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TestIdentity {
    class_name: String,
    method_name: String,
}

impl TestIdentity {
    /// Creates a new `TestIdentity`.
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
        }
    }

    /// Returns the fully-qualified class name.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Returns the method or display name.
    pub fn method_name(&self) -> &str {
        &self.method_name
    }
}

impl fmt::Display for TestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.class_name, self.method_name)
    }
}

/// The final disposition of a test case.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum TestOutcome {
    /// The test passed. This is the outcome until another event says otherwise.
    #[default]
    Passed,

    /// The test failed.
    Failed(TestFailure),

    /// An assumption made by the test did not hold.
    AssumptionFailed,

    /// The test was not run.
    Ignored,
}

impl TestOutcome {
    /// Returns true if this outcome counts towards the `failures` total.
    pub fn is_failure(&self) -> bool {
        matches!(self, TestOutcome::Failed(_) | TestOutcome::AssumptionFailed)
    }

    /// Returns a short, human-readable name for this outcome.
    pub fn name(&self) -> &'static str {
        match self {
            TestOutcome::Passed => "passed",
            TestOutcome::Failed(_) => "failed",
            TestOutcome::AssumptionFailed => "assumption-failed",
            TestOutcome::Ignored => "ignored",
        }
    }
}

/// Details about a failed test.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestFailure {
    /// The type of the exception or panic that caused the failure.
    pub exception_type: String,

    /// The failure message, if any.
    pub message: Option<String>,

    /// The stack trace.
    pub stack_trace: String,
}

impl TestFailure {
    /// Creates a new `TestFailure`.
    pub fn new(
        exception_type: impl Into<String>,
        message: Option<String>,
        stack_trace: impl Into<String>,
    ) -> Self {
        Self {
            exception_type: exception_type.into(),
            message,
            stack_trace: stack_trace.into(),
        }
    }
}

/// The result of a single test case.
#[derive(Clone, Debug)]
pub struct TestRecord {
    identity: TestIdentity,
    outcome: TestOutcome,
    started_at: Timestamp,
    elapsed: Duration,
}

impl TestRecord {
    pub(crate) fn new(identity: TestIdentity, started_at: Timestamp) -> Self {
        Self {
            identity,
            outcome: TestOutcome::Passed,
            started_at,
            elapsed: Duration::ZERO,
        }
    }

    /// Returns the identity of this test.
    pub fn identity(&self) -> &TestIdentity {
        &self.identity
    }

    /// Returns the outcome of this test.
    pub fn outcome(&self) -> &TestOutcome {
        &self.outcome
    }

    /// Returns the time at which this test started.
    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    /// Returns the time this test took, in whole milliseconds.
    ///
    /// Tests that were never started (e.g. ignored tests) report zero.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub(crate) fn set_outcome(&mut self, outcome: TestOutcome) {
        self.outcome = outcome;
    }

    pub(crate) fn finish(&mut self, now: &Timestamp) {
        self.elapsed = now.millis_since(&self.started_at);
    }
}

/// Counts derived from a [`RunRecord`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RunCounts {
    /// The total number of tests recorded.
    pub tests: usize,

    /// The number of tests that failed, including assumption failures.
    pub failures: usize,

    /// The number of tests that were ignored.
    pub skipped: usize,
}

/// Everything recorded about one test run.
#[derive(Clone, Debug)]
pub struct RunRecord {
    suite_name: Option<String>,
    started_at: Timestamp,
    finished_at: Option<Timestamp>,
    // Insertion order is the order in which tests were first seen.
    records: IndexMap<TestIdentity, TestRecord>,
    properties: EnvironmentProperties,
}

impl RunRecord {
    pub(crate) fn new(suite_name: Option<&str>, started_at: Timestamp) -> Self {
        Self {
            suite_name: suite_name
                .filter(|name| !name.is_empty())
                .map(|name| name.to_owned()),
            started_at,
            finished_at: None,
            records: IndexMap::new(),
            properties: EnvironmentProperties::default(),
        }
    }

    /// Returns the name of the suite, if one was provided.
    pub fn suite_name(&self) -> Option<&str> {
        self.suite_name.as_deref()
    }

    /// Returns the time at which the run started.
    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    /// Returns the run's start time in ISO-8601 format, with millisecond precision.
    pub fn started_at_iso(&self) -> String {
        self.started_at
            .wall()
            .to_rfc3339_opts(SecondsFormat::Millis, false)
    }

    /// Returns the time at which the run finished, or `None` if it's still in progress.
    pub fn finished_at(&self) -> Option<Timestamp> {
        self.finished_at
    }

    /// Returns true if the run has finished.
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    /// Returns the time the whole run took, or `None` if it's still in progress.
    pub fn elapsed(&self) -> Option<Duration> {
        self.finished_at
            .map(|finished_at| finished_at.millis_since(&self.started_at))
    }

    /// Returns all test records, in the order they were first seen.
    pub fn records(&self) -> impl ExactSizeIterator<Item = &TestRecord> + '_ {
        self.records.values()
    }

    /// Returns the record for the given test, if any.
    pub fn get(&self, identity: &TestIdentity) -> Option<&TestRecord> {
        self.records.get(identity)
    }

    /// Returns the tests that failed, excluding assumption failures.
    pub fn failed(&self) -> impl Iterator<Item = &TestRecord> + '_ {
        self.records()
            .filter(|record| matches!(record.outcome, TestOutcome::Failed(_)))
    }

    /// Returns the tests whose assumptions failed.
    pub fn assumption_failed(&self) -> impl Iterator<Item = &TestRecord> + '_ {
        self.records()
            .filter(|record| record.outcome == TestOutcome::AssumptionFailed)
    }

    /// Returns the tests that were ignored.
    pub fn ignored(&self) -> impl Iterator<Item = &TestRecord> + '_ {
        self.records()
            .filter(|record| record.outcome == TestOutcome::Ignored)
    }

    /// Returns counts of tests by outcome.
    pub fn counts(&self) -> RunCounts {
        let mut counts = RunCounts {
            tests: self.records.len(),
            ..RunCounts::default()
        };
        for record in self.records.values() {
            match record.outcome {
                TestOutcome::Passed => {}
                TestOutcome::Failed(_) | TestOutcome::AssumptionFailed => counts.failures += 1,
                TestOutcome::Ignored => counts.skipped += 1,
            }
        }
        counts
    }

    /// Returns the environment properties attached to this run.
    pub fn properties(&self) -> &EnvironmentProperties {
        &self.properties
    }

    pub(crate) fn set_properties(&mut self, properties: EnvironmentProperties) {
        self.properties = properties;
    }

    pub(crate) fn get_mut(&mut self, identity: &TestIdentity) -> Option<&mut TestRecord> {
        self.records.get_mut(identity)
    }

    /// Inserts a new record, or replaces an existing one in place.
    ///
    /// Returns true if a record for this identity already existed.
    pub(crate) fn insert(&mut self, record: TestRecord) -> bool {
        // IndexMap::insert keeps the original position for existing keys.
        self.records
            .insert(record.identity.clone(), record)
            .is_some()
    }

    pub(crate) fn finish(&mut self, finished_at: Timestamp) {
        self.finished_at = Some(finished_at);
    }
}
