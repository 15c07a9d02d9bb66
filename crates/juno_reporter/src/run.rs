use std::io;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use juno_config::{ReporterConfig, Verbosity};
use juno_types::{CategoryCounts, ErrorInfo, Outcome, TestId};
use owo_colors::OwoColorize;

use crate::Reporter;
use crate::junit::JUnitReport;
use crate::log_sink::{LogSink, THIN_RULE};
use crate::state::{RunState, format_clock};
use crate::styles::Styles;

pub const THICK_RULE: &str = "======================================================================";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavour {
    Failure,
    Error,
}

impl Flavour {
    fn label(self) -> &'static str {
        match self {
            Flavour::Failure => "FAIL",
            Flavour::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone)]
struct RecordedProblem {
    flavour: Flavour,
    test: TestId,
    error: ErrorInfo,
}

/// Renders one run to an interactive stream, the log files and, when
/// configured, a JUnit report.
pub struct RunReporter<W: io::Write = io::Stderr> {
    writer: W,
    styles: Styles,
    verbosity: Verbosity,
    descriptions: bool,
    immediately_show_fails: bool,
    junit_path: Option<PathBuf>,
    junit_suite_name: String,
    state: RunState,
    sink: LogSink,
    junit: Option<JUnitReport>,
    problems: Vec<RecordedProblem>,
    finished: bool,
}

impl RunReporter {
    #[must_use]
    pub fn new(config: &ReporterConfig, total_expected: usize) -> Self {
        Self::with_writer(config, total_expected, io::stderr())
    }
}

impl<W: io::Write> RunReporter<W> {
    pub fn with_writer(config: &ReporterConfig, total_expected: usize, writer: W) -> Self {
        Self::for_shard(config, total_expected, 0, writer)
    }

    /// A reporter for one shard of a run. `prior_tests` is how many tests
    /// earlier reporters in this process have already observed; only the
    /// reporter whose first test is test number 1 truncates the log files.
    pub fn for_shard(
        config: &ReporterConfig,
        total_expected: usize,
        prior_tests: usize,
        writer: W,
    ) -> Self {
        let first_test_number = prior_tests + 1;
        let sink = LogSink::open(
            &config.rerun_log,
            &config.failure_log,
            first_test_number == 1,
        );

        Self {
            writer,
            styles: Styles::new(config.color),
            verbosity: config.verbosity,
            descriptions: config.descriptions,
            immediately_show_fails: config.immediately_show_fails,
            junit_path: config.junit_path.clone(),
            junit_suite_name: config.junit_suite_name.clone(),
            state: RunState::new(total_expected, config.slow_test_count),
            sink,
            junit: None,
            problems: Vec::new(),
            finished: false,
        }
    }

    #[must_use]
    pub fn state(&self) -> &RunState {
        &self.state
    }

    #[must_use]
    pub fn junit(&self) -> Option<&JUnitReport> {
        self.junit.as_ref()
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    fn description(&self, test: &TestId) -> String {
        match test.short_description() {
            Some(doc) if self.descriptions => format!("{test}\n{doc}"),
            _ => test.to_string(),
        }
    }

    fn write_glyph(&mut self, glyph: &str) {
        let _ = write!(self.writer, "{glyph}");
        let _ = self.writer.flush();
    }

    /// Counts the outcome and adds its leaf to the structured report.
    fn settle(&mut self, test: &TestId, outcome: &Outcome) {
        self.state.record(outcome.category());
        if let Some(report) = &mut self.junit {
            report.push(test, outcome);
        }
    }

    fn record_problem(&mut self, flavour: Flavour, test: &TestId, error: &ErrorInfo) {
        let style = match flavour {
            Flavour::Failure => self.styles.fail,
            Flavour::Error => self.styles.error,
        };
        match self.verbosity {
            Verbosity::Verbose => {
                let marker = format!(" {} ", flavour.label()).style(style).to_string();
                let _ = writeln!(self.writer, "{marker}");
                if self.immediately_show_fails {
                    let flavour_line = format!("{marker} Immediate details");
                    self.write_single_problem(&flavour_line, test, error);
                }
            }
            Verbosity::Dots => {
                let glyph = match flavour {
                    Flavour::Failure => "F",
                    Flavour::Error => "E",
                };
                let glyph = glyph.style(style).to_string();
                self.write_glyph(&glyph);
            }
            Verbosity::Quiet => {}
        }

        let description = self.description(test);
        if let Err(err) = self.sink.append_failure_detail(&description, &error.formatted()) {
            err.warn();
        }
        if let Err(err) = self.sink.append_rerun_entry(test) {
            err.warn();
        }

        let outcome = match flavour {
            Flavour::Failure => Outcome::Failure(error.clone()),
            Flavour::Error => Outcome::Error(error.clone()),
        };
        self.settle(test, &outcome);
        self.problems.push(RecordedProblem {
            flavour,
            test: test.clone(),
            error: error.clone(),
        });
    }

    fn write_single_problem(&mut self, flavour: &str, test: &TestId, error: &ErrorInfo) {
        let description = self.description(test);
        let _ = writeln!(self.writer, "{THICK_RULE}");
        let _ = writeln!(self.writer, "{flavour}: {description}");
        let _ = writeln!(self.writer, "{THIN_RULE}");
        let _ = writeln!(self.writer, "{}", error.formatted());
        let _ = self.writer.flush();
    }

    fn breakdown(&self) -> String {
        let counts = self.state.counts();
        format!(
            "{}, {}, Skipped: {}, {}",
            format!("Errors: {}", counts.error).style(self.styles.error_text),
            format!("Failures: {}", counts.failure).style(self.styles.fail_text),
            counts.skipped,
            format!("Passed: {}", self.state.passed_for_breakdown()).style(self.styles.pass_text),
        )
    }

    fn write_summary(&mut self, elapsed: Duration) {
        let run = self.state.tests_run();
        let counts = self.state.counts();

        let _ = writeln!(self.writer, "{THIN_RULE}");
        let _ = writeln!(
            self.writer,
            "Ran {run} test{} in {:.3}s",
            if run == 1 { "" } else { "s" },
            elapsed.as_secs_f64()
        );
        let _ = writeln!(self.writer);

        let mut infos = Vec::new();
        if counts.is_successful() {
            let _ = write!(self.writer, "{}", " OK ".style(self.styles.ok));
        } else {
            let _ = write!(self.writer, "{}", " FAILED ".style(self.styles.fail));
            if counts.failure > 0 {
                infos.push(
                    format!("failures={}", counts.failure)
                        .style(self.styles.fail_text)
                        .to_string(),
                );
            }
            if counts.error > 0 {
                infos.push(
                    format!("errors={}", counts.error)
                        .style(self.styles.error_text)
                        .to_string(),
                );
            }
        }
        if counts.skipped > 0 {
            infos.push(format!("skipped={}", counts.skipped));
        }
        if counts.expected_failure > 0 {
            infos.push(format!("expected failures={}", counts.expected_failure));
        }
        if counts.unexpected_success > 0 {
            infos.push(format!("unexpected successes={}", counts.unexpected_success));
        }
        if infos.is_empty() {
            let _ = writeln!(self.writer);
        } else {
            let _ = writeln!(self.writer, " ({})", infos.join(", "));
        }

        let slow = self.state.slow_tests().entries();
        if !slow.is_empty() {
            let _ = writeln!(self.writer);
            let _ = writeln!(self.writer, "Slowest {} tests:", slow.len());
            for entry in slow {
                let _ = writeln!(
                    self.writer,
                    "  {:.3}s  {}",
                    entry.duration.as_secs_f64(),
                    entry.id
                );
            }
        }
        let _ = self.writer.flush();
    }

    fn write_structured_report(&mut self, elapsed: Duration) {
        let (Some(report), Some(path)) = (&mut self.junit, &self.junit_path) else {
            return;
        };
        report.finish(elapsed);
        match report.write_to_path(path) {
            Ok(()) => log::debug!("wrote structured report to {}", path.display()),
            Err(err) => match std::error::Error::source(&err) {
                Some(source) => log::error!("{err}: {source}"),
                None => log::error!("{err}"),
            },
        }
    }
}

impl<W: io::Write> Reporter for RunReporter<W> {
    fn on_run_start(&mut self) {
        self.state.mark_started();
        if self.junit_path.is_some() {
            self.junit =
                Some(JUnitReport::new(self.junit_suite_name.clone()).with_timestamp(Local::now()));
        }
    }

    fn on_test_start(&mut self, test: &TestId) {
        let sequence = self.state.begin_test();
        if self.verbosity == Verbosity::Verbose {
            let counter = format!("[{sequence:04}.. -> {:04}]", self.state.total_expected());
            let description = self.description(test);
            let _ = write!(
                self.writer,
                "{} {description} ... ",
                counter.style(self.styles.counter)
            );
            let _ = self.writer.flush();
        }
    }

    fn on_success(&mut self, test: &TestId) {
        match self.verbosity {
            Verbosity::Verbose => {
                let _ = writeln!(self.writer, "{}", " OK ".style(self.styles.ok));
            }
            Verbosity::Dots => {
                let glyph = ".".style(self.styles.ok).to_string();
                self.write_glyph(&glyph);
            }
            Verbosity::Quiet => {}
        }
        self.settle(test, &Outcome::Success);
    }

    fn on_failure(&mut self, test: &TestId, error: &ErrorInfo) {
        self.record_problem(Flavour::Failure, test, error);
    }

    fn on_error(&mut self, test: &TestId, error: &ErrorInfo) {
        self.record_problem(Flavour::Error, test, error);
    }

    fn on_skip(&mut self, test: &TestId, reason: &str) {
        match self.verbosity {
            Verbosity::Verbose => {
                let _ = writeln!(self.writer, "skipped '{reason}'");
            }
            Verbosity::Dots => self.write_glyph("s"),
            Verbosity::Quiet => {}
        }
        self.settle(
            test,
            &Outcome::Skipped {
                reason: reason.to_owned(),
            },
        );
    }

    fn on_expected_failure(&mut self, test: &TestId, error: &ErrorInfo) {
        match self.verbosity {
            Verbosity::Verbose => {
                let _ = writeln!(self.writer, "expected failure");
            }
            Verbosity::Dots => self.write_glyph("x"),
            Verbosity::Quiet => {}
        }
        self.settle(test, &Outcome::ExpectedFailure(error.clone()));
    }

    fn on_unexpected_success(&mut self, test: &TestId) {
        match self.verbosity {
            Verbosity::Verbose => {
                let _ = writeln!(self.writer, "unexpected success");
            }
            Verbosity::Dots => self.write_glyph("u"),
            Verbosity::Quiet => {}
        }
        self.settle(test, &Outcome::UnexpectedSuccess);
    }

    fn on_test_complete(&mut self, test: &TestId) {
        let duration = self.state.finish_test(test);
        if let Some(report) = &mut self.junit {
            report.set_latest_time(duration);
        }

        if self.verbosity == Verbosity::Verbose {
            let line = format!(
                "[..{:04} <- {:04}] Elapsed: {}; Remaining: {}; {}] ",
                self.state.tests_run(),
                self.state.total_expected(),
                format_clock(self.state.elapsed()),
                format_clock(self.state.estimated_remaining()),
                self.breakdown(),
            );
            let _ = writeln!(self.writer, "{line}");
            let _ = self.writer.flush();
        }
    }

    fn on_run_complete(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        let elapsed = self.state.elapsed();

        if self.verbosity != Verbosity::Quiet {
            let _ = writeln!(self.writer);
        }
        let problems = std::mem::take(&mut self.problems);
        for problem in &problems {
            self.write_single_problem(problem.flavour.label(), &problem.test, &problem.error);
        }
        self.problems = problems;

        self.write_summary(elapsed);
        self.write_structured_report(elapsed);
        self.sink.close();
    }

    fn counts(&self) -> CategoryCounts {
        self.state.counts()
    }

    fn tests_run(&self) -> usize {
        self.state.tests_run()
    }
}
