pub const MIN_BOUND_SECS: f64 = 0.02;
pub const MAX_BOUND_SECS: f64 = 5.0;
pub const DEFAULT_BUFFER_LIMIT_SECS: f64 = 0.5;
pub const DEFAULT_BUFFER_THRESHOLD_SECS: f64 = 0.1;

/// Virtual playout clock. `next_play_time` is a point on the output device's
/// clock; each scheduled buffer either advances it by the buffer duration, or
/// snaps it back inside the `[threshold, limit]` latency band after an
/// underrun or overrun.
#[derive(Debug, Clone)]
pub struct PlayoutClock {
    next_play_time: f64,
    buffer_limit: f64,
    buffer_threshold: f64,
    jitter_hint: f64,
}

impl PlayoutClock {
    pub fn new(limit: f64, threshold: f64) -> Self {
        let mut clock = Self {
            next_play_time: 0.0,
            buffer_limit: DEFAULT_BUFFER_LIMIT_SECS,
            buffer_threshold: DEFAULT_BUFFER_THRESHOLD_SECS,
            jitter_hint: 0.0,
        };
        clock.set_bounds(limit, threshold);
        clock
    }

    /// Starts a session: the first buffer plays one threshold from now.
    pub fn start(&mut self, now: f64) {
        self.next_play_time = now + self.buffer_threshold;
    }

    /// Applies the buffer bounds, auto-correcting an inverted pair.
    ///
    /// On `threshold >= limit` the larger value is kept as the limit and the
    /// threshold becomes half of it; both are then clamped to
    /// `[MIN_BOUND_SECS, MAX_BOUND_SECS]`.
    pub fn set_bounds(&mut self, limit: f64, threshold: f64) {
        if !limit.is_finite() || !threshold.is_finite() {
            tracing::warn!(limit, threshold, "ignoring non-finite buffer bounds");
            return;
        }
        let mut limit = limit;
        let mut threshold = threshold;
        if threshold >= limit {
            limit = limit.max(threshold);
            threshold = limit * 0.5;
            tracing::warn!(
                limit,
                threshold,
                "buffer threshold was not below limit, auto-adjusted"
            );
        }
        self.buffer_limit = limit.clamp(MIN_BOUND_SECS, MAX_BOUND_SECS);
        self.buffer_threshold = threshold
            .clamp(MIN_BOUND_SECS, MAX_BOUND_SECS)
            .min(self.buffer_limit);
    }

    /// Advisory hint from the jitter estimator. Raises the effective
    /// threshold, never past half the limit and never below the configured
    /// threshold.
    pub fn set_jitter_hint(&mut self, hint_secs: f64) {
        if hint_secs.is_finite() && hint_secs >= 0.0 {
            self.jitter_hint = hint_secs;
        }
    }

    fn effective_threshold(&self) -> f64 {
        self.buffer_threshold
            .max(self.jitter_hint.min(self.buffer_limit * 0.5))
    }

    /// Schedules a buffer of `duration` seconds and returns its start time.
    pub fn schedule(&mut self, now: f64, duration: f64) -> f64 {
        let start = self.next_play_time.max(now);
        let threshold = self.effective_threshold();
        let lead = self.next_play_time - now;

        if lead <= threshold {
            // Underrun risk: rebuild the safety buffer.
            self.next_play_time = now + threshold + duration;
        } else if lead > self.buffer_limit {
            // Excess latency: snap back to the threshold.
            self.next_play_time = now + threshold;
        } else {
            self.next_play_time += duration;
        }

        start
    }

    /// Current scheduling lead relative to `now`.
    pub fn lead(&self, now: f64) -> f64 {
        self.next_play_time - now
    }

    pub fn buffer_limit(&self) -> f64 {
        self.buffer_limit
    }

    pub fn buffer_threshold(&self) -> f64 {
        self.buffer_threshold
    }
}
