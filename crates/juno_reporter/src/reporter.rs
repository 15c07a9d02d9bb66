use juno_types::{CategoryCounts, ErrorInfo, TestEvent, TestId};

/// Lifecycle callbacks driven by the test-execution engine.
///
/// The engine calls `on_run_start` once, then for every test `on_test_start`,
/// exactly one terminal callback, and `on_test_complete`, and finally
/// `on_run_complete`.
pub trait Reporter {
    fn on_run_start(&mut self);
    fn on_test_start(&mut self, test: &TestId);

    fn on_success(&mut self, test: &TestId);
    fn on_failure(&mut self, test: &TestId, error: &ErrorInfo);
    fn on_error(&mut self, test: &TestId, error: &ErrorInfo);
    fn on_skip(&mut self, test: &TestId, reason: &str);
    fn on_expected_failure(&mut self, test: &TestId, error: &ErrorInfo);
    fn on_unexpected_success(&mut self, test: &TestId);

    fn on_test_complete(&mut self, test: &TestId);
    fn on_run_complete(&mut self);

    fn counts(&self) -> CategoryCounts;
    fn tests_run(&self) -> usize;

    fn was_successful(&self) -> bool {
        self.counts().is_successful()
    }
}

/// Routes one wire event to the matching callback.
pub fn dispatch<R: Reporter + ?Sized>(reporter: &mut R, event: &TestEvent) {
    match event {
        TestEvent::RunStart { .. } => reporter.on_run_start(),
        TestEvent::TestStart { test } => reporter.on_test_start(test),
        TestEvent::Success { test } => reporter.on_success(test),
        TestEvent::Failure { test, error } => reporter.on_failure(test, error),
        TestEvent::Error { test, error } => reporter.on_error(test, error),
        TestEvent::Skip { test, reason } => reporter.on_skip(test, reason),
        TestEvent::ExpectedFailure { test, error } => reporter.on_expected_failure(test, error),
        TestEvent::UnexpectedSuccess { test } => reporter.on_unexpected_success(test),
        TestEvent::TestComplete { test } => reporter.on_test_complete(test),
        TestEvent::RunComplete => reporter.on_run_complete(),
    }
}
