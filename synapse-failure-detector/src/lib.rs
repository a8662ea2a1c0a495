#![deny(missing_docs)]
//! Sliding-window failure detector: stops the loop when tool execution
//! quality degrades, without being tripped by normal alternating
//! success/failure.

/// A ring buffer of the last `window_size` countable tool-call outcomes.
///
/// `failure_count` is maintained incrementally rather than recomputed on
/// every check: an overwritten slot decrements the count if it held a
/// failure, a newly written failing slot increments it.
#[derive(Debug, Clone)]
pub struct SlidingWindowFailureDetector {
    window: Vec<bool>,
    cursor: usize,
    filled: usize,
    failure_count: usize,
    failure_threshold: usize,
}

impl SlidingWindowFailureDetector {
    /// Default window size.
    pub const DEFAULT_WINDOW_SIZE: usize = 10;
    /// Default failure threshold.
    pub const DEFAULT_FAILURE_THRESHOLD: usize = 3;

    /// Create a detector with the given window size and failure threshold.
    ///
    /// # Panics
    ///
    /// Panics if `window_size` is 0.
    #[must_use]
    pub fn new(window_size: usize, failure_threshold: usize) -> Self {
        assert!(window_size > 0, "window_size must be positive");
        Self {
            window: vec![false; window_size],
            cursor: 0,
            filled: 0,
            failure_count: 0,
            failure_threshold,
        }
    }

    /// A detector with the documented defaults: window 10, threshold 3.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(Self::DEFAULT_WINDOW_SIZE, Self::DEFAULT_FAILURE_THRESHOLD)
    }

    /// Record one turn's outcome. Only called when a tool call actually
    /// occurred in the turn and its failure was classified as countable —
    /// non-countable failures (permission denials, user interrupts) must
    /// bypass the window entirely and never call this.
    pub fn record(&mut self, failed: bool) {
        let overwritten = self.window[self.cursor];
        if self.filled == self.window.len() && overwritten {
            self.failure_count -= 1;
        }
        self.window[self.cursor] = failed;
        if failed {
            self.failure_count += 1;
        }
        self.cursor = (self.cursor + 1) % self.window.len();
        self.filled = (self.filled + 1).min(self.window.len());
    }

    /// Whether the loop should stop: accumulated failures in the window
    /// meet or exceed the threshold.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.failure_count >= self.failure_threshold
    }

    /// Current count of failures in the window, for observability.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failure_count
    }
}
