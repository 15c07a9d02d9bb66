use std::fs;
use std::path::Path;

use juno_config::{ReporterConfig, Verbosity};
use juno_reporter::{Reporter, RunReporter, dispatch, read_rerun_manifest};
use juno_types::{ErrorInfo, TestEvent, TestId};

fn config(dir: &Path, verbosity: Verbosity) -> ReporterConfig {
    ReporterConfig {
        rerun_log: dir.join("test_rerun.txt"),
        failure_log: dir.join("test_failures.txt"),
        verbosity,
        color: false,
        ..ReporterConfig::default()
    }
}

fn id(class: &str, method: &str) -> TestId {
    TestId::new("app.tests", class, method)
}

fn run_test(reporter: &mut impl Reporter, test: &TestId, terminal: TestEvent) {
    reporter.on_test_start(test);
    dispatch(reporter, &terminal);
    reporter.on_test_complete(test);
}

fn output(reporter: RunReporter<Vec<u8>>) -> String {
    String::from_utf8(reporter.into_writer()).expect("utf8 output")
}

#[test]
fn one_pass_one_fail_scenario() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config(dir.path(), Verbosity::Verbose);
    let mut reporter = RunReporter::with_writer(&config, 2, Vec::new());

    let a = id("MathTests", "test_a");
    let b = id("MathTests", "test_b");
    reporter.on_run_start();
    run_test(&mut reporter, &a, TestEvent::Success { test: a.clone() });
    run_test(
        &mut reporter,
        &b,
        TestEvent::Failure {
            test: b.clone(),
            error: ErrorInfo::new("AssertionError", "boom"),
        },
    );
    reporter.on_run_complete();

    let counts = reporter.counts();
    assert_eq!(counts.success, 1);
    assert_eq!(counts.failure, 1);
    assert_eq!(counts.total(), 2);
    assert_eq!(reporter.state().current_sequence() - 1, counts.total());
    assert!(!reporter.was_successful());

    assert_eq!(
        read_rerun_manifest(&config.rerun_log).expect("manifest"),
        vec!["app.tests.MathTests.test_b"]
    );
    let log = fs::read_to_string(&config.failure_log).expect("error log");
    assert_eq!(log.matches("test_b (app.tests.MathTests)").count(), 1);
    assert!(log.contains("boom"));
    assert!(!log.contains("test_a"));

    let out = output(reporter);
    assert_eq!(out.matches(" FAILED ").count(), 1);
    assert!(out.contains(" FAILED  (failures=1)"));
    assert!(out.contains("Ran 2 tests in "));
}

#[test]
fn sequence_matches_category_total_for_mixed_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config(dir.path(), Verbosity::Dots);
    let mut reporter = RunReporter::with_writer(&config, 4, Vec::new());
    let err = ErrorInfo::new("ValueError", "bad");

    reporter.on_run_start();
    let events: Vec<TestEvent> = vec![
        TestEvent::Success { test: id("T", "a") },
        TestEvent::Error {
            test: id("T", "b"),
            error: err.clone(),
        },
        TestEvent::Skip {
            test: id("T", "c"),
            reason: "no db".into(),
        },
        TestEvent::ExpectedFailure {
            test: id("T", "d"),
            error: err.clone(),
        },
        TestEvent::UnexpectedSuccess { test: id("T", "e") },
        TestEvent::Failure {
            test: id("T", "f"),
            error: err,
        },
    ];
    for event in events {
        let test = match &event {
            TestEvent::Success { test }
            | TestEvent::Error { test, .. }
            | TestEvent::Skip { test, .. }
            | TestEvent::ExpectedFailure { test, .. }
            | TestEvent::UnexpectedSuccess { test }
            | TestEvent::Failure { test, .. } => test.clone(),
            _ => unreachable!(),
        };
        run_test(&mut reporter, &test, event);
        assert_eq!(reporter.tests_run(), reporter.counts().total());
    }
    reporter.on_run_complete();

    // six tests against four expected: the estimate clamps instead of going negative
    assert_eq!(
        reporter.state().estimated_remaining(),
        std::time::Duration::ZERO
    );
    assert_eq!(
        read_rerun_manifest(&config.rerun_log).expect("manifest"),
        vec!["app.tests.T.b", "app.tests.T.f"]
    );
}

#[test]
fn later_shard_appends_to_first_shard_logs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config(dir.path(), Verbosity::Quiet);
    fs::write(&config.rerun_log, "stale.Tests.test_from_yesterday\n").expect("seed");

    let first = id("ShardOne", "test_x");
    let mut shard_one = RunReporter::for_shard(&config, 4, 0, Vec::new());
    shard_one.on_run_start();
    run_test(
        &mut shard_one,
        &first,
        TestEvent::Failure {
            test: first.clone(),
            error: ErrorInfo::new("AssertionError", "one"),
        },
    );
    shard_one.on_run_complete();

    let second = id("ShardTwo", "test_y");
    let mut shard_two = RunReporter::for_shard(&config, 4, 2, Vec::new());
    shard_two.on_run_start();
    run_test(
        &mut shard_two,
        &second,
        TestEvent::Error {
            test: second.clone(),
            error: ErrorInfo::new("RuntimeError", "two"),
        },
    );
    shard_two.on_run_complete();

    assert_eq!(
        read_rerun_manifest(&config.rerun_log).expect("manifest"),
        vec!["app.tests.ShardOne.test_x", "app.tests.ShardTwo.test_y"]
    );
    let log = fs::read_to_string(&config.failure_log).expect("error log");
    assert!(log.contains("one"));
    assert!(log.contains("two"));
}

#[test]
fn duplicate_failures_are_recorded_per_occurrence() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config(dir.path(), Verbosity::Quiet);
    let mut reporter = RunReporter::with_writer(&config, 2, Vec::new());
    let flaky = id("FlakyTests", "test_retry");

    reporter.on_run_start();
    for _ in 0..2 {
        run_test(
            &mut reporter,
            &flaky,
            TestEvent::Failure {
                test: flaky.clone(),
                error: ErrorInfo::new("AssertionError", "again"),
            },
        );
    }
    reporter.on_run_complete();

    assert_eq!(
        read_rerun_manifest(&config.rerun_log).expect("manifest"),
        vec![
            "app.tests.FlakyTests.test_retry",
            "app.tests.FlakyTests.test_retry"
        ]
    );
}

#[test]
fn load_failure_is_reported_without_rerun_line() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config(dir.path(), Verbosity::Dots);
    let mut reporter = RunReporter::with_writer(&config, 1, Vec::new());
    let broken = TestId::load_failure("app.broken_tests");

    reporter.on_run_start();
    run_test(
        &mut reporter,
        &broken,
        TestEvent::Error {
            test: broken.clone(),
            error: ErrorInfo::new("ImportError", "No module named 'missing'"),
        },
    );
    reporter.on_run_complete();

    assert!(
        read_rerun_manifest(&config.rerun_log)
            .expect("manifest")
            .is_empty()
    );
    let log = fs::read_to_string(&config.failure_log).expect("error log");
    assert!(log.contains("app.broken_tests could not be loaded"));
    assert!(log.contains("ImportError: No module named 'missing'"));

    let out = output(reporter);
    assert!(out.contains("ERROR: app.broken_tests (failed to load)"));
    assert!(out.contains("errors=1"));
}

#[test]
fn structured_report_for_three_pass_one_fail_one_skip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = config(dir.path(), Verbosity::Quiet);
    let report_path = dir.path().join("reports").join("junit.xml");
    config.junit_path = Some(report_path.clone());

    let mut reporter = RunReporter::with_writer(&config, 5, Vec::new());
    reporter.on_run_start();
    for name in ["test_1", "test_2", "test_3"] {
        let t = id("ReportTests", name);
        run_test(&mut reporter, &t, TestEvent::Success { test: t.clone() });
    }
    let failing = id("ReportTests", "test_4");
    run_test(
        &mut reporter,
        &failing,
        TestEvent::Failure {
            test: failing.clone(),
            error: ErrorInfo::new("AssertionError", "boom")
                .with_traceback("Traceback (most recent call last):\n"),
        },
    );
    let skipped = id("ReportTests", "test_5");
    run_test(
        &mut reporter,
        &skipped,
        TestEvent::Skip {
            test: skipped.clone(),
            reason: "not today".into(),
        },
    );
    reporter.on_run_complete();

    let xml = fs::read_to_string(&report_path).expect("report");
    assert!(xml.contains(r#"tests="5""#));
    assert!(xml.contains(r#"failures="1""#));
    assert!(xml.contains(r#"skipped="1""#));
    assert_eq!(xml.matches("<testcase ").count(), 5);
    assert!(xml.contains(r#"classname="app.tests.ReportTests" name="test_4""#));
    assert!(xml.contains(r#"<skipped message="not today"/>"#));
}

#[test]
fn manifest_survives_unopenable_error_log() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = config(dir.path(), Verbosity::Quiet);
    config.failure_log = dir.path().join("missing").join("test_failures.txt");
    let mut reporter = RunReporter::with_writer(&config, 2, Vec::new());

    let a = id("T", "test_a");
    let b = id("T", "test_b");
    reporter.on_run_start();
    run_test(&mut reporter, &a, TestEvent::Success { test: a.clone() });
    run_test(
        &mut reporter,
        &b,
        TestEvent::Failure {
            test: b.clone(),
            error: ErrorInfo::new("AssertionError", "boom"),
        },
    );
    reporter.on_run_complete();

    assert_eq!(
        read_rerun_manifest(&config.rerun_log).expect("manifest"),
        vec!["app.tests.T.test_b"]
    );
    assert!(!config.failure_log.exists());
    assert_eq!(reporter.counts().failure, 1);
}
