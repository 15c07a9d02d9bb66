use std::time::{Duration, Instant};

use juno_types::{Category, CategoryCounts, TestId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlowTest {
    pub id: String,
    pub duration: Duration,
}

/// The slowest tests seen so far, longest first, bounded to `limit` entries.
/// A limit of zero disables tracking.
#[derive(Debug, Clone, Default)]
pub struct SlowTestRanking {
    limit: usize,
    entries: Vec<SlowTest>,
}

impl SlowTestRanking {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            entries: Vec::with_capacity(limit.saturating_add(1).min(64)),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.limit > 0
    }

    pub fn insert(&mut self, id: impl Into<String>, duration: Duration) {
        if !self.is_enabled() {
            return;
        }
        self.entries.push(SlowTest {
            id: id.into(),
            duration,
        });
        // stable: ties keep occurrence order
        self.entries.sort_by(|a, b| b.duration.cmp(&a.duration));
        self.entries.truncate(self.limit);
    }

    #[must_use]
    pub fn entries(&self) -> &[SlowTest] {
        &self.entries
    }
}

/// Aggregate state for exactly one run.
#[derive(Debug, Clone)]
pub struct RunState {
    started_at: Option<Instant>,
    total_expected: usize,
    current_sequence: usize,
    counts: CategoryCounts,
    slow_tests: SlowTestRanking,
    test_started_at: Option<Instant>,
}

impl RunState {
    #[must_use]
    pub fn new(total_expected: usize, slow_test_limit: usize) -> Self {
        Self {
            started_at: None,
            total_expected,
            current_sequence: 1,
            counts: CategoryCounts::default(),
            slow_tests: SlowTestRanking::new(slow_test_limit),
            test_started_at: None,
        }
    }

    pub fn mark_started(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
    }

    /// Starts the per-test clock and returns the sequence number of this test.
    pub fn begin_test(&mut self) -> usize {
        self.test_started_at = Some(Instant::now());
        let sequence = self.current_sequence;
        self.current_sequence += 1;
        sequence
    }

    pub fn record(&mut self, category: Category) {
        self.counts.record(category);
    }

    /// Stops the per-test clock and feeds the slow-test ranking.
    pub fn finish_test(&mut self, test: &TestId) -> Duration {
        let duration = self
            .test_started_at
            .take()
            .map_or(Duration::ZERO, |started| started.elapsed());
        if self.slow_tests.is_enabled() {
            let id = test.dotted().unwrap_or_else(|| test.to_string());
            self.slow_tests.insert(id, duration);
        }
        duration
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at
            .map_or(Duration::ZERO, |started| started.elapsed())
    }

    #[must_use]
    pub fn estimated_remaining(&self) -> Duration {
        estimate_remaining(self.elapsed(), self.total_expected, self.current_sequence)
    }

    #[must_use]
    pub fn total_expected(&self) -> usize {
        self.total_expected
    }

    #[must_use]
    pub fn current_sequence(&self) -> usize {
        self.current_sequence
    }

    /// Number of tests started so far.
    #[must_use]
    pub fn tests_run(&self) -> usize {
        self.current_sequence - 1
    }

    #[must_use]
    pub fn counts(&self) -> CategoryCounts {
        self.counts
    }

    #[must_use]
    pub fn slow_tests(&self) -> &SlowTestRanking {
        &self.slow_tests
    }

    /// Passed count as shown in the progress breakdown: every started test
    /// that did not error, fail or skip.
    #[must_use]
    pub fn passed_for_breakdown(&self) -> usize {
        self.tests_run()
            .saturating_sub(self.counts.error)
            .saturating_sub(self.counts.failure)
            .saturating_sub(self.counts.skipped)
    }
}

/// `elapsed * (total / current) - elapsed`, clamped to zero once more tests
/// have run than were expected.
#[must_use]
pub fn estimate_remaining(elapsed: Duration, total_expected: usize, current: usize) -> Duration {
    if current == 0 || total_expected == 0 || current > total_expected {
        return Duration::ZERO;
    }
    #[allow(clippy::cast_precision_loss)]
    let factor = total_expected as f64 / current as f64;
    elapsed.mul_f64(factor).saturating_sub(elapsed)
}

/// `HH:MM:SS`; hours are not wrapped.
#[must_use]
pub fn format_clock(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
