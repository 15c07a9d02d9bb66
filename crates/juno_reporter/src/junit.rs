use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use juno_types::{ErrorInfo, Outcome, TestId};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

static TESTSUITE_TAG: &str = "testsuite";
static TESTCASE_TAG: &str = "testcase";
static FAILURE_TAG: &str = "failure";
static ERROR_TAG: &str = "error";
static SKIPPED_TAG: &str = "skipped";

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to create structured report {path}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize structured report {path}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: quick_xml::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseStatus {
    Passed,
    Failure(ErrorInfo),
    Error(ErrorInfo),
    Skipped(String),
}

impl From<&Outcome> for CaseStatus {
    fn from(outcome: &Outcome) -> Self {
        match outcome {
            // informational outcomes are not failures in the interchange format
            Outcome::Success | Outcome::ExpectedFailure(_) | Outcome::UnexpectedSuccess => {
                CaseStatus::Passed
            }
            Outcome::Failure(error) => CaseStatus::Failure(error.clone()),
            Outcome::Error(error) => CaseStatus::Error(error.clone()),
            Outcome::Skipped { reason } => CaseStatus::Skipped(reason.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub classname: String,
    pub name: String,
    pub time: Duration,
    pub status: CaseStatus,
}

/// JUnit-style report tree: one `<testsuite>` root with a `<testcase>` leaf
/// per test.
#[derive(Debug, Clone)]
pub struct JUnitReport {
    name: String,
    timestamp: Option<DateTime<Local>>,
    time: Duration,
    cases: Vec<TestCase>,
}

impl JUnitReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timestamp: None,
            time: Duration::ZERO,
            cases: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Local>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn push(&mut self, test: &TestId, outcome: &Outcome) {
        self.cases.push(TestCase {
            classname: test.classname(),
            name: test.name().to_owned(),
            time: Duration::ZERO,
            status: outcome.into(),
        });
    }

    /// Sets the duration of the most recently pushed case.
    pub fn set_latest_time(&mut self, time: Duration) {
        if let Some(case) = self.cases.last_mut() {
            case.time = time;
        }
    }

    pub fn finish(&mut self, time: Duration) {
        self.time = time;
    }

    #[must_use]
    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    #[must_use]
    pub fn tests(&self) -> usize {
        self.cases.len()
    }

    #[must_use]
    pub fn failures(&self) -> usize {
        self.count(|s| matches!(s, CaseStatus::Failure(_)))
    }

    #[must_use]
    pub fn errors(&self) -> usize {
        self.count(|s| matches!(s, CaseStatus::Error(_)))
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, CaseStatus::Skipped(_)))
    }

    fn count(&self, pred: impl Fn(&CaseStatus) -> bool) -> usize {
        self.cases.iter().filter(|c| pred(&c.status)).count()
    }

    pub fn write_to_path(&self, path: &Path) -> Result<(), ReportError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ReportError::Create {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let file = File::create(path).map_err(|source| ReportError::Create {
            path: path.to_path_buf(),
            source,
        })?;
        self.write_to(BufWriter::new(file))
            .map_err(|source| ReportError::Serialize {
                path: path.to_path_buf(),
                source,
            })
    }

    pub fn write_to(&self, writer: impl Write) -> quick_xml::Result<()> {
        let mut writer = Writer::new_with_indent(writer, b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut suite = BytesStart::new(TESTSUITE_TAG);
        suite.push_attribute(("name", &*xml_chars(&self.name)));
        suite.push_attribute(("tests", self.tests().to_string().as_str()));
        suite.push_attribute(("errors", self.errors().to_string().as_str()));
        suite.push_attribute(("failures", self.failures().to_string().as_str()));
        suite.push_attribute(("skipped", self.skipped().to_string().as_str()));
        suite.push_attribute(("time", format!("{:.3}", self.time.as_secs_f64()).as_str()));
        if let Some(timestamp) = &self.timestamp {
            suite.push_attribute((
                "timestamp",
                timestamp.format("%Y-%m-%dT%H:%M:%S").to_string().as_str(),
            ));
        }
        writer.write_event(Event::Start(suite))?;

        for case in &self.cases {
            write_case(case, &mut writer)?;
        }

        writer.write_event(Event::End(BytesEnd::new(TESTSUITE_TAG)))?;
        let inner = writer.get_mut();
        inner.write_all(b"\n")?;
        inner.flush()?;
        Ok(())
    }
}

fn write_case(case: &TestCase, writer: &mut Writer<impl Write>) -> quick_xml::Result<()> {
    let mut tag = BytesStart::new(TESTCASE_TAG);
    tag.push_attribute(("classname", &*xml_chars(&case.classname)));
    tag.push_attribute(("name", &*xml_chars(&case.name)));
    tag.push_attribute(("time", format!("{:.6}", case.time.as_secs_f64()).as_str()));

    match &case.status {
        CaseStatus::Passed => {
            writer.write_event(Event::Empty(tag))?;
            return Ok(());
        }
        CaseStatus::Failure(error) => {
            writer.write_event(Event::Start(tag))?;
            write_problem(FAILURE_TAG, error, writer)?;
        }
        CaseStatus::Error(error) => {
            writer.write_event(Event::Start(tag))?;
            write_problem(ERROR_TAG, error, writer)?;
        }
        CaseStatus::Skipped(reason) => {
            writer.write_event(Event::Start(tag))?;
            let mut skipped = BytesStart::new(SKIPPED_TAG);
            skipped.push_attribute(("message", &*xml_chars(reason)));
            writer.write_event(Event::Empty(skipped))?;
        }
    }

    writer.write_event(Event::End(BytesEnd::new(TESTCASE_TAG)))?;
    Ok(())
}

fn write_problem(
    kind: &str,
    error: &ErrorInfo,
    writer: &mut Writer<impl Write>,
) -> quick_xml::Result<()> {
    let mut tag = BytesStart::new(kind);
    tag.push_attribute(("type", &*xml_chars(&error.type_name)));
    tag.push_attribute(("message", &*xml_chars(&error.message)));
    writer.write_event(Event::Start(tag))?;
    let body = error.formatted();
    writer.write_event(Event::Text(BytesText::new(&xml_chars(&body))))?;
    writer.write_event(Event::End(BytesEnd::new(kind)))?;
    Ok(())
}

/// Replaces characters outside the XML 1.0 `Char` production with U+FFFD.
/// Markup escaping is left to the writer.
fn xml_chars(text: &str) -> Cow<'_, str> {
    fn allowed(c: char) -> bool {
        matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}')
    }

    if text.chars().all(allowed) {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(
            text.chars()
                .map(|c| if allowed(c) { c } else { '\u{FFFD}' })
                .collect(),
        )
    }
}
