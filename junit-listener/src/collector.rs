// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Accumulates lifecycle events for one test run.

use crate::{
    errors::LifecycleError,
    properties::EnvironmentProperties,
    record::{RunRecord, TestFailure, TestIdentity, TestOutcome, TestRecord},
    time::{Clock, SystemClock},
};
use std::{
    mem,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tracing::{debug, warn};

/// Lifecycle callbacks made by a host test runner over the course of one run.
///
/// Calls are expected in the order `run_started`, then any number of test events, then
/// `run_finished`.
pub trait RunListener {
    /// The error returned when a callback is rejected.
    type Error;

    /// The run started.
    ///
    /// `suite_name` may be absent or empty if the runner doesn't name its suites.
    fn run_started(&mut self, suite_name: Option<&str>) -> Result<(), Self::Error>;

    /// A test started.
    fn test_started(&mut self, test: &TestIdentity) -> Result<(), Self::Error>;

    /// A test finished, whatever its outcome.
    fn test_finished(&mut self, test: &TestIdentity) -> Result<(), Self::Error>;

    /// A test failed.
    fn test_failure(&mut self, test: &TestIdentity, failure: TestFailure)
    -> Result<(), Self::Error>;

    /// An assumption made by a test did not hold.
    fn test_assumption_failure(&mut self, test: &TestIdentity) -> Result<(), Self::Error>;

    /// A test was ignored.
    ///
    /// Runners may or may not call `test_started` and `test_finished` for ignored tests.
    fn test_ignored(&mut self, test: &TestIdentity) -> Result<(), Self::Error>;

    /// The run finished.
    fn run_finished(&mut self) -> Result<(), Self::Error>;
}

#[derive(Debug, Default)]
enum CollectorState {
    #[default]
    NotStarted,
    Running(RunRecord),
    Finished(RunRecord),
}

/// Collects lifecycle events into a [`RunRecord`].
///
/// One collector is used for exactly one run.
#[derive(Debug)]
pub struct RunCollector {
    clock: Box<dyn Clock>,
    state: CollectorState,
}

impl RunCollector {
    /// Creates a new collector that uses the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock::new())
    }

    /// Creates a new collector that uses the given clock.
    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            clock: Box::new(clock),
            state: CollectorState::NotStarted,
        }
    }

    /// Returns the run record while the run is in progress or after it has finished.
    pub fn record(&self) -> Option<&RunRecord> {
        match &self.state {
            CollectorState::NotStarted => None,
            CollectorState::Running(run) | CollectorState::Finished(run) => Some(run),
        }
    }

    /// Returns the run record, which must be finalized.
    pub fn finished_record(&self) -> Result<&RunRecord, LifecycleError> {
        match &self.state {
            CollectorState::Finished(run) => Ok(run),
            CollectorState::NotStarted | CollectorState::Running(_) => {
                Err(LifecycleError::RunNotFinished)
            }
        }
    }

    /// Consumes the collector, returning the finalized run record.
    pub fn into_record(self) -> Result<RunRecord, LifecycleError> {
        match self.state {
            CollectorState::Finished(run) => Ok(run),
            CollectorState::NotStarted | CollectorState::Running(_) => {
                Err(LifecycleError::RunNotFinished)
            }
        }
    }

    /// Attaches environment properties to the run.
    ///
    /// Properties may be attached at any point after the run starts, including after it has
    /// finished.
    pub fn attach_properties(
        &mut self,
        properties: EnvironmentProperties,
    ) -> Result<(), LifecycleError> {
        match &mut self.state {
            CollectorState::NotStarted => Err(LifecycleError::RunNotStarted {
                event: "attach_properties",
            }),
            CollectorState::Running(run) | CollectorState::Finished(run) => {
                run.set_properties(properties);
                Ok(())
            }
        }
    }

    fn running(&mut self, event: &'static str) -> Result<&mut RunRecord, LifecycleError> {
        match &mut self.state {
            CollectorState::Running(run) => Ok(run),
            CollectorState::NotStarted => Err(LifecycleError::RunNotStarted { event }),
            CollectorState::Finished(_) => Err(LifecycleError::RunAlreadyFinished { event }),
        }
    }

    /// Replaces the outcome for `test`, creating a record if the runner never started it.
    fn set_outcome(
        &mut self,
        event: &'static str,
        test: &TestIdentity,
        outcome: TestOutcome,
    ) -> Result<(), LifecycleError> {
        let now = self.clock.now();
        let run = self.running(event)?;
        match run.get_mut(test) {
            Some(record) => record.set_outcome(outcome),
            None => {
                // Ignored tests are commonly reported without a start event, so that case is
                // expected. Anything else is worth mentioning.
                if !matches!(outcome, TestOutcome::Ignored) {
                    warn!("{event} for `{test}`, which was never started");
                }
                let mut record = TestRecord::new(test.clone(), now);
                record.set_outcome(outcome);
                run.insert(record);
            }
        }
        Ok(())
    }
}

impl Default for RunCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl RunListener for RunCollector {
    type Error = LifecycleError;

    fn run_started(&mut self, suite_name: Option<&str>) -> Result<(), LifecycleError> {
        match self.state {
            CollectorState::NotStarted => {
                debug!("run started: suite {:?}", suite_name.unwrap_or_default());
                self.state = CollectorState::Running(RunRecord::new(suite_name, self.clock.now()));
                Ok(())
            }
            CollectorState::Running(_) | CollectorState::Finished(_) => {
                Err(LifecycleError::RunAlreadyStarted)
            }
        }
    }

    fn test_started(&mut self, test: &TestIdentity) -> Result<(), LifecycleError> {
        let now = self.clock.now();
        let run = self.running("test_started")?;
        if run.insert(TestRecord::new(test.clone(), now)) {
            warn!("`{test}` started more than once, discarding its earlier result");
        }
        Ok(())
    }

    fn test_finished(&mut self, test: &TestIdentity) -> Result<(), LifecycleError> {
        let now = self.clock.now();
        let run = self.running("test_finished")?;
        match run.get_mut(test) {
            Some(record) => record.finish(&now),
            None => warn!("test_finished for `{test}`, which was never started"),
        }
        Ok(())
    }

    fn test_failure(
        &mut self,
        test: &TestIdentity,
        failure: TestFailure,
    ) -> Result<(), LifecycleError> {
        self.set_outcome("test_failure", test, TestOutcome::Failed(failure))
    }

    fn test_assumption_failure(&mut self, test: &TestIdentity) -> Result<(), LifecycleError> {
        self.set_outcome(
            "test_assumption_failure",
            test,
            TestOutcome::AssumptionFailed,
        )
    }

    fn test_ignored(&mut self, test: &TestIdentity) -> Result<(), LifecycleError> {
        self.set_outcome("test_ignored", test, TestOutcome::Ignored)
    }

    fn run_finished(&mut self) -> Result<(), LifecycleError> {
        let now = self.clock.now();
        match mem::take(&mut self.state) {
            CollectorState::Running(mut run) => {
                run.finish(now);
                let counts = run.counts();
                debug!(
                    "run finished: {} tests, {} failures, {} skipped",
                    counts.tests, counts.failures, counts.skipped
                );
                self.state = CollectorState::Finished(run);
                Ok(())
            }
            CollectorState::NotStarted => Err(LifecycleError::RunNotStarted {
                event: "run_finished",
            }),
            finished @ CollectorState::Finished(_) => {
                self.state = finished;
                Err(LifecycleError::RunAlreadyFinished {
                    event: "run_finished",
                })
            }
        }
    }
}

/// A [`RunCollector`] that can be shared across threads.
///
/// Hosts that dispatch lifecycle callbacks from more than one thread should hand each thread a
/// clone of this. Every callback holds a single lock for its whole duration.
#[derive(Clone, Debug, Default)]
pub struct SharedCollector {
    inner: Arc<Mutex<RunCollector>>,
}

impl SharedCollector {
    /// Wraps `collector` so it can be shared.
    pub fn new(collector: RunCollector) -> Self {
        Self {
            inner: Arc::new(Mutex::new(collector)),
        }
    }

    /// Runs `f` with exclusive access to the underlying collector.
    pub fn with<T>(&self, f: impl FnOnce(&mut RunCollector) -> T) -> T {
        f(&mut self.lock())
    }

    /// Returns the finalized run record, once every clone has finished with the collector.
    ///
    /// Returns `Err(self)` if other clones are still alive.
    pub fn try_into_inner(self) -> Result<RunCollector, Self> {
        match Arc::try_unwrap(self.inner) {
            Ok(mutex) => Ok(mutex.into_inner().unwrap_or_else(PoisonError::into_inner)),
            Err(inner) => Err(Self { inner }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RunCollector> {
        // Each callback leaves the collector in a consistent state before returning, so a panic
        // elsewhere while the lock was held doesn't invalidate it.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RunListener for SharedCollector {
    type Error = LifecycleError;

    fn run_started(&mut self, suite_name: Option<&str>) -> Result<(), LifecycleError> {
        self.lock().run_started(suite_name)
    }

    fn test_started(&mut self, test: &TestIdentity) -> Result<(), LifecycleError> {
        self.lock().test_started(test)
    }

    fn test_finished(&mut self, test: &TestIdentity) -> Result<(), LifecycleError> {
        self.lock().test_finished(test)
    }

    fn test_failure(
        &mut self,
        test: &TestIdentity,
        failure: TestFailure,
    ) -> Result<(), LifecycleError> {
        self.lock().test_failure(test, failure)
    }

    fn test_assumption_failure(&mut self, test: &TestIdentity) -> Result<(), LifecycleError> {
        self.lock().test_assumption_failure(test)
    }

    fn test_ignored(&mut self, test: &TestIdentity) -> Result<(), LifecycleError> {
        self.lock().test_ignored(test)
    }

    fn run_finished(&mut self) -> Result<(), LifecycleError> {
        self.lock().run_finished()
    }
}
