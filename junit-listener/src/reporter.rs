// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serialize a finished [`RunRecord`] as JUnit XML.
//!
//! The output follows the de-facto JUnit schema understood by CI dashboards:
//!
//! ```text
//! <testsuite name? tests failures errors="0" skipped time timestamp>
//!     <properties>
//!         <property name value/>   (x3)
//!     </properties>
//!     <testcase name classname time/>                  (passed)
//!     <testcase name classname time>
//!         <failure type? message?>STACK TRACE</failure> | <skipped/>
//!     </testcase>
//! </testsuite>
//! ```

use crate::{
    errors::WriteReportError,
    record::{RunRecord, TestFailure, TestOutcome, TestRecord},
};
use quick_xml::{
    Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};
use std::{borrow::Cow, io, time::Duration};

static TESTSUITE_TAG: &str = "testsuite";
static TESTCASE_TAG: &str = "testcase";
static PROPERTIES_TAG: &str = "properties";
static PROPERTY_TAG: &str = "property";
static FAILURE_TAG: &str = "failure";
static SKIPPED_TAG: &str = "skipped";

// JUnit 4 and later have no notion of errors as distinct from failures.
static ERRORS_VALUE: &str = "0";

/// Writes a JUnit XML report for a finished run.
///
/// A reporter is consumed by [`write`](Self::write) or [`to_string`](Self::to_string).
#[derive(Debug)]
pub struct XmlReporter<'a> {
    run: &'a RunRecord,
}

impl<'a> XmlReporter<'a> {
    /// Creates a new reporter for `run`, which must have finished.
    pub fn new(run: &'a RunRecord) -> Result<Self, WriteReportError> {
        if !run.is_finished() {
            return Err(WriteReportError::NotFinished);
        }
        Ok(Self { run })
    }

    /// Serializes the report to `writer`, then flushes it.
    ///
    /// The writer is not closed. On error, a partial document may have been written.
    pub fn write(self, writer: impl io::Write) -> Result<(), WriteReportError> {
        let mut writer = Writer::new_with_indent(writer, b' ', 4);

        let decl = BytesDecl::new("1.0", Some("UTF-8"), None);
        writer.write_event(Event::Decl(decl))?;

        serialize_testsuite(self.run, &mut writer)?;

        // Add a trailing newline.
        let mut inner = writer.into_inner();
        inner.write_all(b"\n")?;
        inner.flush()?;
        Ok(())
    }

    /// Serializes the report to a string.
    pub fn to_string(self) -> Result<String, WriteReportError> {
        let mut buf: Vec<u8> = vec![];
        self.write(&mut buf)?;
        String::from_utf8(buf)
            .map_err(|error| WriteReportError::Io(io::Error::new(io::ErrorKind::InvalidData, error)))
    }
}

fn serialize_testsuite(run: &RunRecord, writer: &mut Writer<impl io::Write>) -> io::Result<()> {
    let counts = run.counts();
    let elapsed = run.elapsed().unwrap_or_default();

    let mut testsuite_tag = BytesStart::new(TESTSUITE_TAG);
    if let Some(name) = run.suite_name() {
        testsuite_tag.push_attribute(("name", &*sanitize(name)));
    }
    testsuite_tag.extend_attributes([
        ("tests", counts.tests.to_string().as_str()),
        ("failures", counts.failures.to_string().as_str()),
        ("errors", ERRORS_VALUE),
        ("skipped", counts.skipped.to_string().as_str()),
        ("time", serialize_time(elapsed).as_str()),
        ("timestamp", run.started_at_iso().as_str()),
    ]);
    writer.write_event(Event::Start(testsuite_tag))?;

    serialize_start_tag(PROPERTIES_TAG, writer)?;
    for (name, value) in run.properties().entries() {
        let mut property_tag = BytesStart::new(PROPERTY_TAG);
        property_tag.extend_attributes([("name", name), ("value", &*sanitize(value))]);
        writer.write_event(Event::Empty(property_tag))?;
    }
    serialize_end_tag(PROPERTIES_TAG, writer)?;

    for record in run.records() {
        serialize_testcase(record, writer)?;
    }

    serialize_end_tag(TESTSUITE_TAG, writer)
}

fn serialize_testcase(record: &TestRecord, writer: &mut Writer<impl io::Write>) -> io::Result<()> {
    let identity = record.identity();

    let mut testcase_tag = BytesStart::new(TESTCASE_TAG);
    testcase_tag.extend_attributes([
        ("name", &*sanitize(identity.method_name())),
        ("classname", &*sanitize(identity.class_name())),
        ("time", serialize_time(record.elapsed()).as_str()),
    ]);

    match record.outcome() {
        // A passed test has no children.
        TestOutcome::Passed => return writer.write_event(Event::Empty(testcase_tag)),
        TestOutcome::Failed(failure) => {
            writer.write_event(Event::Start(testcase_tag))?;
            serialize_failure(failure, writer)?;
        }
        TestOutcome::AssumptionFailed | TestOutcome::Ignored => {
            writer.write_event(Event::Start(testcase_tag))?;
            writer.write_event(Event::Empty(BytesStart::new(SKIPPED_TAG)))?;
        }
    }

    serialize_end_tag(TESTCASE_TAG, writer)
}

fn serialize_failure(failure: &TestFailure, writer: &mut Writer<impl io::Write>) -> io::Result<()> {
    let mut failure_tag = BytesStart::new(FAILURE_TAG);
    if !failure.exception_type.is_empty() {
        failure_tag.push_attribute(("type", &*sanitize(&failure.exception_type)));
    }
    if let Some(message) = failure.message.as_deref().filter(|message| !message.is_empty()) {
        failure_tag.push_attribute(("message", &*sanitize(message)));
    }
    writer.write_event(Event::Start(failure_tag))?;

    let stack_trace = sanitize(&failure.stack_trace);
    writer.write_event(Event::Text(BytesText::new(&stack_trace)))?;

    serialize_end_tag(FAILURE_TAG, writer)
}

fn serialize_start_tag(tag_name: &'static str, writer: &mut Writer<impl io::Write>) -> io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag_name)))
}

fn serialize_end_tag(tag_name: &'static str, writer: &mut Writer<impl io::Write>) -> io::Result<()> {
    writer.write_event(Event::End(BytesEnd::new(tag_name)))
}

// Serialize time as seconds with 3 decimal points.
fn serialize_time(time: Duration) -> String {
    format!("{:.3}", time.as_secs_f64())
}

/// Replaces characters that can never appear in an XML document.
///
/// NUL is written out as the literal `<\0>`; the usual XML escaping then applies on top.
fn sanitize(text: &str) -> Cow<'_, str> {
    if text.contains('\0') {
        Cow::Owned(text.replace('\0', "<\\0>"))
    } else {
        Cow::Borrowed(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collector::{RunCollector, RunListener},
        properties::EnvironmentProperties,
        record::{TestFailure, TestIdentity},
        time::ManualClock,
    };
    use chrono::DateTime;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn collector() -> (RunCollector, ManualClock) {
        let clock =
            ManualClock::new(DateTime::parse_from_rfc3339("2024-05-01T10:00:00+00:00").unwrap());
        (RunCollector::with_clock(clock.clone()), clock)
    }

    #[test]
    fn sanitize_nul() {
        assert_eq!(sanitize("no nul here"), Cow::Borrowed("no nul here"));
        assert_eq!(sanitize("a\0b\0"), "a<\\0>b<\\0>");
    }

    #[test_case(Duration::ZERO, "0.000" ; "zero")]
    #[test_case(Duration::from_millis(120), "0.120" ; "sub-second")]
    #[test_case(Duration::from_millis(61_005), "61.005" ; "over a minute")]
    fn time_format(time: Duration, expected: &str) {
        assert_eq!(serialize_time(time), expected);
    }

    #[test]
    fn unfinished_run_is_rejected() {
        let (mut collector, _clock) = collector();
        collector.run_started(None).unwrap();
        let run = collector.record().unwrap();
        assert!(matches!(
            XmlReporter::new(run),
            Err(WriteReportError::NotFinished)
        ));
    }

    #[test]
    fn empty_run() {
        let (mut collector, clock) = collector();
        collector.run_started(None).unwrap();
        clock.advance(Duration::from_millis(7));
        collector.run_finished().unwrap();
        collector
            .attach_properties(EnvironmentProperties::new("Acme", "Rocket", "33"))
            .unwrap();

        let run = collector.finished_record().unwrap();
        let xml = XmlReporter::new(run).unwrap().to_string().unwrap();
        assert_eq!(
            xml,
            indoc! {r#"
                <?xml version="1.0" encoding="UTF-8"?>
                <testsuite tests="0" failures="0" errors="0" skipped="0" time="0.007" timestamp="2024-05-01T10:00:00.000+00:00">
                    <properties>
                        <property name="device.manufacturer" value="Acme"/>
                        <property name="device.model" value="Rocket"/>
                        <property name="device.apiLevel" value="33"/>
                    </properties>
                </testsuite>
            "#}
        );
    }

    #[test]
    fn failure_attributes_omitted_when_empty() {
        let (mut collector, _clock) = collector();
        collector.run_started(Some("suite")).unwrap();
        let test = TestIdentity::new("com.example.T", "bare");
        collector.test_started(&test).unwrap();
        collector
            .test_failure(&test, TestFailure::new("", Some(String::new()), "trace"))
            .unwrap();
        collector.test_finished(&test).unwrap();
        collector.run_finished().unwrap();

        let xml = XmlReporter::new(collector.finished_record().unwrap())
            .unwrap()
            .to_string()
            .unwrap();
        assert!(
            xml.contains("<failure>trace</failure>"),
            "failure has no attributes: {xml}"
        );
        assert!(!xml.contains("type="), "no type attribute: {xml}");
        assert!(!xml.contains("message="), "no message attribute: {xml}");
    }

    #[test]
    fn special_characters_are_escaped() {
        let (mut collector, _clock) = collector();
        collector.run_started(Some("a <suite> & \"more\"")).unwrap();
        let test = TestIdentity::new("com.example.T", "name with <angle> & \0 nul");
        collector
            .test_failure(
                &test,
                TestFailure::new("Error", Some("x < y".to_owned()), "line\0two & </failure>"),
            )
            .unwrap();
        collector.run_finished().unwrap();

        let xml = XmlReporter::new(collector.finished_record().unwrap())
            .unwrap()
            .to_string()
            .unwrap();
        assert!(!xml.contains('\0'), "no raw NUL in output");
        assert!(xml.contains("line&lt;\\0&gt;two &amp; &lt;/failure&gt;</failure>"));
        assert!(xml.contains(r#"message="x &lt; y""#));
        assert!(xml.contains(r#"name="name with &lt;angle&gt; &amp; &lt;\0&gt; nul""#));
    }

    #[test]
    fn passed_testcase_is_empty_element() {
        let (mut collector, clock) = collector();
        collector.run_started(Some("suite")).unwrap();
        let test = TestIdentity::new("com.example.T", "passes");
        collector.test_started(&test).unwrap();
        clock.advance(Duration::from_millis(5));
        collector.test_finished(&test).unwrap();
        collector.run_finished().unwrap();

        let xml = XmlReporter::new(collector.finished_record().unwrap())
            .unwrap()
            .to_string()
            .unwrap();
        assert!(
            xml.contains(r#"    <testcase name="passes" classname="com.example.T" time="0.005"/>"#),
            "{xml}"
        );
        assert!(!xml.contains("</testcase>"), "{xml}");
    }

    #[test]
    fn io_error_is_surfaced() {
        struct FailingWriter;

        impl io::Write for FailingWriter {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::other("sink is gone"))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let (mut collector, _clock) = collector();
        collector.run_started(None).unwrap();
        collector.run_finished().unwrap();
        let error = XmlReporter::new(collector.finished_record().unwrap())
            .unwrap()
            .write(FailingWriter)
            .unwrap_err();
        assert!(matches!(error, WriteReportError::Io(_)), "{error:?}");
    }
}
