// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A serialized form of lifecycle events, for runners that can't call into a [`RunListener`]
//! directly.
//!
//! An event stream is a sequence of JSON objects, one per line:
//!
//! ```text
//! {"event": "run-started", "at": "2024-05-01T10:00:00+00:00", "suite": "com.example.AllTests"}
//! {"event": "test-started", "class": "com.example.FooTest", "method": "bar"}
//! {"event": "test-finished", "class": "com.example.FooTest", "method": "bar"}
//! {"event": "run-finished", "at": "2024-05-01T10:00:01.5+00:00"}
//! ```
//!
//! `at` is optional. If present, it's used as the time of the event, so replaying a recorded
//! stream reproduces the original timestamps and durations.

use crate::{
    collector::RunListener,
    errors::ReplayError,
    record::{TestFailure, TestIdentity},
    time::ManualClock,
};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::{error, io::BufRead};
use tracing::trace;

/// A lifecycle event, along with the time it happened at.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TimedEvent {
    /// The time of the event, if recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<DateTime<FixedOffset>>,

    /// The event.
    #[serde(flatten)]
    pub event: ListenerEvent,
}

/// A single lifecycle event.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case", rename_all_fields = "kebab-case")]
pub enum ListenerEvent {
    /// See [`RunListener::run_started`].
    RunStarted {
        /// The name of the suite.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        suite: Option<String>,
    },

    /// See [`RunListener::test_started`].
    TestStarted {
        /// The fully-qualified class name.
        class: String,
        /// The method or display name.
        method: String,
    },

    /// See [`RunListener::test_finished`].
    TestFinished {
        /// The fully-qualified class name.
        class: String,
        /// The method or display name.
        method: String,
    },

    /// See [`RunListener::test_failure`].
    TestFailure {
        /// The fully-qualified class name.
        class: String,
        /// The method or display name.
        method: String,
        /// The type of the exception that caused the failure.
        #[serde(default)]
        exception_type: String,
        /// The failure message.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        /// The stack trace.
        #[serde(default)]
        stack_trace: String,
    },

    /// See [`RunListener::test_assumption_failure`].
    TestAssumptionFailure {
        /// The fully-qualified class name.
        class: String,
        /// The method or display name.
        method: String,
    },

    /// See [`RunListener::test_ignored`].
    TestIgnored {
        /// The fully-qualified class name.
        class: String,
        /// The method or display name.
        method: String,
    },

    /// See [`RunListener::run_finished`].
    RunFinished,
}

impl ListenerEvent {
    /// Makes the corresponding call on `listener`.
    pub fn dispatch<L: RunListener>(self, listener: &mut L) -> Result<(), L::Error> {
        match self {
            ListenerEvent::RunStarted { suite } => listener.run_started(suite.as_deref()),
            ListenerEvent::TestStarted { class, method } => {
                listener.test_started(&TestIdentity::new(class, method))
            }
            ListenerEvent::TestFinished { class, method } => {
                listener.test_finished(&TestIdentity::new(class, method))
            }
            ListenerEvent::TestFailure {
                class,
                method,
                exception_type,
                message,
                stack_trace,
            } => listener.test_failure(
                &TestIdentity::new(class, method),
                TestFailure::new(exception_type, message, stack_trace),
            ),
            ListenerEvent::TestAssumptionFailure { class, method } => {
                listener.test_assumption_failure(&TestIdentity::new(class, method))
            }
            ListenerEvent::TestIgnored { class, method } => {
                listener.test_ignored(&TestIdentity::new(class, method))
            }
            ListenerEvent::RunFinished => listener.run_finished(),
        }
    }
}

/// A summary of a replayed event stream.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ReplaySummary {
    /// The number of events dispatched.
    pub events: usize,

    /// Whether a `run-finished` event was seen.
    pub run_finished: bool,
}

/// Reads events from `reader` and dispatches them to `listener`, in order.
///
/// `clock` should be the clock `listener` uses. The clock is restarted at the first `at` time in
/// the stream, whichever event carries it; after that, it's moved forward to each event's `at`
/// time before the event is dispatched. Blank lines are skipped. Stops at the first error.
pub fn replay<L>(
    reader: impl BufRead,
    listener: &mut L,
    clock: &ManualClock,
) -> Result<ReplaySummary, ReplayError>
where
    L: RunListener,
    L::Error: error::Error + Send + Sync + 'static,
{
    let mut summary = ReplaySummary::default();
    let mut anchored = false;

    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line.map_err(|error| ReplayError::Read {
            line: line_number,
            error,
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let TimedEvent { at, event } =
            serde_json::from_str(&line).map_err(|error| ReplayError::Parse {
                line: line_number,
                error,
            })?;
        trace!("line {line_number}: {event:?}");

        match at {
            Some(at) if anchored => clock.set_wall(at),
            Some(at) => {
                clock.rebase(at);
                anchored = true;
            }
            None => {}
        }
        let is_run_finished = matches!(event, ListenerEvent::RunFinished);
        event
            .dispatch(listener)
            .map_err(|error| ReplayError::Listener {
                line: line_number,
                error: Box::new(error),
            })?;

        summary.events += 1;
        summary.run_finished |= is_run_finished;
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collector::RunCollector,
        errors::LifecycleError,
        record::TestOutcome,
    };
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use test_case::test_case;

    fn clock() -> ManualClock {
        ManualClock::new(DateTime::parse_from_rfc3339("2024-05-01T10:00:00+00:00").unwrap())
    }

    #[test_case(
        r#"{"event": "run-started"}"#,
        ListenerEvent::RunStarted { suite: None }
        ; "run started without suite"
    )]
    #[test_case(
        r#"{"event": "test-ignored", "class": "com.example.T", "method": "skip"}"#,
        ListenerEvent::TestIgnored { class: "com.example.T".to_owned(), method: "skip".to_owned() }
        ; "test ignored"
    )]
    #[test_case(
        r#"{"event": "test-failure", "class": "C", "method": "m", "exception-type": "E", "stack-trace": "at C.m"}"#,
        ListenerEvent::TestFailure {
            class: "C".to_owned(),
            method: "m".to_owned(),
            exception_type: "E".to_owned(),
            message: None,
            stack_trace: "at C.m".to_owned(),
        }
        ; "test failure without message"
    )]
    #[test_case(
        r#"{"event": "run-finished"}"#,
        ListenerEvent::RunFinished
        ; "run finished"
    )]
    fn parse_event(input: &str, expected: ListenerEvent) {
        let event: TimedEvent = serde_json::from_str(input).unwrap();
        assert_eq!(event.at, None);
        assert_eq!(event.event, expected);
    }

    #[test]
    fn replay_reproduces_durations() {
        let input = indoc! {r#"
            {"event": "run-started", "at": "2024-05-01T10:00:00+00:00", "suite": "com.example.AllTests"}
            {"event": "test-started", "at": "2024-05-01T10:00:00.010+00:00", "class": "com.example.T", "method": "passes"}
            {"event": "test-finished", "at": "2024-05-01T10:00:00.130+00:00", "class": "com.example.T", "method": "passes"}

            {"event": "test-ignored", "class": "com.example.T", "method": "skipped"}
            {"event": "run-finished", "at": "2024-05-01T10:00:01.500+00:00"}
        "#};

        let clock = clock();
        let mut collector = RunCollector::with_clock(clock.clone());
        let summary = replay(input.as_bytes(), &mut collector, &clock).unwrap();
        assert_eq!(
            summary,
            ReplaySummary {
                events: 5,
                run_finished: true,
            }
        );

        let run = collector.into_record().unwrap();
        assert_eq!(run.suite_name(), Some("com.example.AllTests"));
        assert_eq!(run.elapsed(), Some(Duration::from_millis(1500)));

        let records: Vec<_> = run
            .records()
            .map(|record| {
                (
                    record.identity().method_name().to_owned(),
                    record.outcome().clone(),
                    record.elapsed(),
                )
            })
            .collect();
        assert_eq!(
            records,
            vec![
                (
                    "passes".to_owned(),
                    TestOutcome::Passed,
                    Duration::from_millis(120)
                ),
                ("skipped".to_owned(), TestOutcome::Ignored, Duration::ZERO),
            ]
        );
    }

    #[test]
    fn first_event_anchors_clock() {
        let input = indoc! {r#"
            {"event": "run-started", "at": "2019-12-31T23:59:59+00:00"}
            {"event": "run-finished", "at": "2020-01-01T00:00:01+00:00"}
        "#};
        // The clock starts later than the recorded events.
        let clock = clock();
        let mut collector = RunCollector::with_clock(clock.clone());
        replay(input.as_bytes(), &mut collector, &clock).unwrap();

        let run = collector.into_record().unwrap();
        assert_eq!(run.started_at_iso(), "2019-12-31T23:59:59.000+00:00");
        assert_eq!(run.elapsed(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn first_timed_event_anchors_clock() {
        let input = indoc! {r#"
            {"event": "run-started", "suite": "com.example.AllTests"}
            {"event": "test-started", "at": "2019-12-31T10:00:00+00:00", "class": "com.example.T", "method": "passes"}
            {"event": "test-finished", "at": "2019-12-31T10:00:00.500+00:00", "class": "com.example.T", "method": "passes"}
            {"event": "run-finished", "at": "2019-12-31T10:00:01+00:00"}
        "#};
        let clock = clock();
        let mut collector = RunCollector::with_clock(clock.clone());
        replay(input.as_bytes(), &mut collector, &clock).unwrap();

        let run = collector.into_record().unwrap();
        let passes = TestIdentity::new("com.example.T", "passes");
        assert_eq!(
            run.get(&passes).map(|record| record.elapsed()),
            Some(Duration::from_millis(500))
        );
        // `run-started` carries no time: the timestamp is the clock's, and the run is measured
        // from the first recorded time.
        assert_eq!(run.started_at_iso(), "2024-05-01T10:00:00.000+00:00");
        assert_eq!(run.elapsed(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn replay_reports_parse_errors_with_line() {
        let input = indoc! {r#"
            {"event": "run-started"}
            {"event": "test-exploded"}
        "#};
        let clock = clock();
        let mut collector = RunCollector::with_clock(clock.clone());
        let error = replay(input.as_bytes(), &mut collector, &clock).unwrap_err();
        assert!(
            matches!(error, ReplayError::Parse { line: 2, .. }),
            "{error:?}"
        );
    }

    #[test]
    fn replay_reports_listener_errors_with_line() {
        let input = indoc! {r#"
            {"event": "test-started", "class": "C", "method": "m"}
        "#};
        let clock = clock();
        let mut collector = RunCollector::with_clock(clock.clone());
        let error = replay(input.as_bytes(), &mut collector, &clock).unwrap_err();
        match error {
            ReplayError::Listener { line, error } => {
                assert_eq!(line, 1);
                assert_eq!(
                    error.downcast_ref::<LifecycleError>(),
                    Some(&LifecycleError::RunNotStarted {
                        event: "test_started"
                    })
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn incomplete_stream() {
        let input = indoc! {r#"
            {"event": "run-started"}
            {"event": "test-started", "class": "C", "method": "m"}
        "#};
        let clock = clock();
        let mut collector = RunCollector::with_clock(clock.clone());
        let summary = replay(input.as_bytes(), &mut collector, &clock).unwrap();
        assert_eq!(
            summary,
            ReplaySummary {
                events: 2,
                run_finished: false,
            }
        );
    }

    #[test]
    fn serialize_round_trips() {
        let event = TimedEvent {
            at: Some(DateTime::parse_from_rfc3339("2024-05-01T10:00:00.250+02:00").unwrap()),
            event: ListenerEvent::TestAssumptionFailure {
                class: "com.example.T".to_owned(),
                method: "assumes".to_owned(),
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"at":"2024-05-01T10:00:00.250+02:00","event":"test-assumption-failure","class":"com.example.T","method":"assumes"}"#
        );
        let parsed: TimedEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }
}
