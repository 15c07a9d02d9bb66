use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a single test as reported by the execution engine.
///
/// `method` is absent when the engine failed before a test method could be
/// resolved, e.g. a module that could not be imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestId {
    pub module_path: String,
    #[serde(default)]
    pub class_name: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub doc: Option<String>,
}

impl TestId {
    pub fn new(
        module_path: impl Into<String>,
        class_name: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            module_path: module_path.into(),
            class_name: class_name.into(),
            method: Some(method.into()),
            doc: None,
        }
    }

    pub fn load_failure(module_path: impl Into<String>) -> Self {
        Self {
            module_path: module_path.into(),
            class_name: String::new(),
            method: None,
            doc: None,
        }
    }

    #[must_use]
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// `module.Class`, or just the module when there is no class.
    #[must_use]
    pub fn classname(&self) -> String {
        if self.class_name.is_empty() {
            self.module_path.clone()
        } else {
            format!("{}.{}", self.module_path, self.class_name)
        }
    }

    /// Fully dotted `module.Class.method`, usable as a re-invocation argument.
    #[must_use]
    pub fn dotted(&self) -> Option<String> {
        self.method
            .as_ref()
            .map(|method| format!("{}.{method}", self.classname()))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.method.as_deref().unwrap_or(&self.module_path)
    }

    /// First non-blank line of the docstring.
    #[must_use]
    pub fn short_description(&self) -> Option<&str> {
        self.doc
            .as_deref()?
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.method {
            Some(method) => write!(f, "{method} ({})", self.classname()),
            None => write!(f, "{} (failed to load)", self.module_path),
        }
    }
}

/// Captured exception information for a failing or erroring test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub type_name: String,
    pub message: String,
    #[serde(default)]
    pub traceback: String,
}

impl ErrorInfo {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            traceback: String::new(),
        }
    }

    #[must_use]
    pub fn with_traceback(mut self, traceback: impl Into<String>) -> Self {
        self.traceback = traceback.into();
        self
    }

    /// Full human-readable text: traceback followed by `Type: message`.
    ///
    /// Built fresh on every call so each sink renders from the captured data.
    #[must_use]
    pub fn formatted(&self) -> String {
        let mut out = String::with_capacity(
            self.traceback.len() + self.type_name.len() + self.message.len() + 3,
        );
        if !self.traceback.is_empty() {
            out.push_str(&self.traceback);
            if !self.traceback.ends_with('\n') {
                out.push('\n');
            }
        }
        out.push_str(&self.type_name);
        if !self.message.is_empty() {
            out.push_str(": ");
            out.push_str(&self.message);
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Success,
    Failure,
    Error,
    Skipped,
    ExpectedFailure,
    UnexpectedSuccess,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum Outcome {
    Success,
    Failure(ErrorInfo),
    Error(ErrorInfo),
    Skipped { reason: String },
    ExpectedFailure(ErrorInfo),
    UnexpectedSuccess,
}

impl Outcome {
    #[must_use]
    pub fn category(&self) -> Category {
        match self {
            Outcome::Success => Category::Success,
            Outcome::Failure(_) => Category::Failure,
            Outcome::Error(_) => Category::Error,
            Outcome::Skipped { .. } => Category::Skipped,
            Outcome::ExpectedFailure(_) => Category::ExpectedFailure,
            Outcome::UnexpectedSuccess => Category::UnexpectedSuccess,
        }
    }
}

/// Per-category tallies for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    pub success: usize,
    pub failure: usize,
    pub error: usize,
    pub skipped: usize,
    pub expected_failure: usize,
    pub unexpected_success: usize,
}

impl CategoryCounts {
    pub fn record(&mut self, category: Category) {
        *self.slot(category) += 1;
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.success
            + self.failure
            + self.error
            + self.skipped
            + self.expected_failure
            + self.unexpected_success
    }

    #[must_use]
    pub fn is_successful(&self) -> bool {
        self.failure == 0 && self.error == 0
    }

    fn slot(&mut self, category: Category) -> &mut usize {
        match category {
            Category::Success => &mut self.success,
            Category::Failure => &mut self.failure,
            Category::Error => &mut self.error,
            Category::Skipped => &mut self.skipped,
            Category::ExpectedFailure => &mut self.expected_failure,
            Category::UnexpectedSuccess => &mut self.unexpected_success,
        }
    }
}

/// Shape of a collected suite. Groups nest arbitrarily, e.g. one group per
/// parallel sub-suite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuiteNode {
    Test(TestId),
    Group(Vec<SuiteNode>),
}

impl SuiteNode {
    #[must_use]
    pub fn count_tests(&self) -> usize {
        match self {
            SuiteNode::Test(_) => 1,
            SuiteNode::Group(children) => children.iter().map(SuiteNode::count_tests).sum(),
        }
    }
}

/// Wire form of the engine's lifecycle callbacks, one JSON object per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum TestEvent {
    RunStart {
        #[serde(default)]
        total: Option<usize>,
        #[serde(default)]
        suite: Vec<SuiteNode>,
    },
    TestStart {
        test: TestId,
    },
    Success {
        test: TestId,
    },
    Failure {
        test: TestId,
        error: ErrorInfo,
    },
    Error {
        test: TestId,
        error: ErrorInfo,
    },
    Skip {
        test: TestId,
        #[serde(default)]
        reason: String,
    },
    ExpectedFailure {
        test: TestId,
        error: ErrorInfo,
    },
    UnexpectedSuccess {
        test: TestId,
    },
    TestComplete {
        test: TestId,
    },
    RunComplete,
}

impl TestEvent {
    /// Expected test count carried by a `run_start` event. An explicit
    /// `total` wins over counting the suite tree.
    #[must_use]
    pub fn expected_total(&self) -> Option<usize> {
        match self {
            TestEvent::RunStart { total, suite } => {
                Some(total.unwrap_or_else(|| suite.iter().map(SuiteNode::count_tests).sum()))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_unittest_style() {
        let id = TestId::new("app.tests", "MathTests", "test_add");
        assert_eq!(id.to_string(), "test_add (app.tests.MathTests)");
        assert_eq!(id.dotted().as_deref(), Some("app.tests.MathTests.test_add"));
        assert_eq!(id.classname(), "app.tests.MathTests");
    }

    #[test]
    fn load_failure_has_no_rerun_target() {
        let id = TestId::load_failure("app.broken");
        assert_eq!(id.dotted(), None);
        assert_eq!(id.name(), "app.broken");
        assert_eq!(id.classname(), "app.broken");
        assert_eq!(id.to_string(), "app.broken (failed to load)");
    }

    #[test]
    fn short_description_skips_blank_lines() {
        let id = TestId::new("m", "C", "t").with_doc("\n   Adds numbers.\n  More.");
        assert_eq!(id.short_description(), Some("Adds numbers."));
        assert_eq!(TestId::new("m", "C", "t").short_description(), None);
    }

    #[test]
    fn formatted_error_appends_exception_line() {
        let err = ErrorInfo::new("AssertionError", "boom")
            .with_traceback("Traceback (most recent call last):\n  File \"t.py\", line 3");
        assert_eq!(
            err.formatted(),
            "Traceback (most recent call last):\n  File \"t.py\", line 3\nAssertionError: boom"
        );
        assert_eq!(ErrorInfo::new("KeyError", "").formatted(), "KeyError");
    }

    #[test]
    fn counts_record_and_total() {
        let mut counts = CategoryCounts::default();
        counts.record(Category::Success);
        counts.record(Category::Success);
        counts.record(Category::ExpectedFailure);
        assert_eq!(counts.success, 2);
        assert_eq!(counts.expected_failure, 1);
        assert_eq!(counts.total(), 3);
        assert!(counts.is_successful());

        counts.record(Category::Error);
        assert!(!counts.is_successful());
    }

    #[test]
    fn suite_count_sums_nested_groups() {
        let t = |name: &str| SuiteNode::Test(TestId::new("m", "C", name));
        let suite = SuiteNode::Group(vec![
            SuiteNode::Group(vec![t("a"), t("b")]),
            SuiteNode::Group(vec![t("c"), SuiteNode::Group(vec![t("d")])]),
            t("e"),
        ]);
        assert_eq!(suite.count_tests(), 5);
    }

    #[test]
    fn outcome_category() {
        let err = ErrorInfo::new("E", "m");
        assert_eq!(Outcome::Failure(err.clone()).category(), Category::Failure);
        assert_eq!(Outcome::Error(err).category(), Category::Error);
        assert_eq!(
            Outcome::Skipped {
                reason: "later".into()
            }
            .category(),
            Category::Skipped
        );
    }

    #[test]
    fn deserializes_event_lines() {
        let line = r#"{"event":"failure","test":{"module_path":"app.tests","class_name":"T","method":"test_b"},"error":{"type_name":"AssertionError","message":"boom"}}"#;
        let event: TestEvent = serde_json::from_str(line).expect("valid event");
        match event {
            TestEvent::Failure { test, error } => {
                assert_eq!(test.method.as_deref(), Some("test_b"));
                assert_eq!(error.message, "boom");
                assert!(error.traceback.is_empty());
            }
            other => panic!("unexpected event {other:?}"),
        }

        let end: TestEvent = serde_json::from_str(r#"{"event":"run_complete"}"#).expect("valid");
        assert_eq!(end, TestEvent::RunComplete);
    }

    #[test]
    fn run_start_total_prefers_explicit_count() {
        let explicit: TestEvent =
            serde_json::from_str(r#"{"event":"run_start","total":7}"#).expect("valid");
        assert_eq!(explicit.expected_total(), Some(7));

        let line = r#"{"event":"run_start","suite":[{"group":[{"test":{"module_path":"m","method":"a"}},{"test":{"module_path":"m","method":"b"}}]},{"test":{"module_path":"n","method":"c"}}]}"#;
        let counted: TestEvent = serde_json::from_str(line).expect("valid");
        assert_eq!(counted.expected_total(), Some(3));

        assert_eq!(TestEvent::RunComplete.expected_total(), None);
    }
}
