/// Deviation beyond `2|v| +` this many ms counts as a delay spike.
const SPIKE_TRIGGER_MS: f32 = 800.0;
/// Spike recovery ends once the variance accumulator drops to this value.
const SPIKE_EXIT_VAR: f32 = 63.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JitterMode {
    Stable,
    SpikeRecovery,
}

/// Inter-arrival jitter estimator, a two-state variant of the RFC 3550
/// playout-delay adaptation. `d` is the smoothed delay estimate and `v` the
/// smoothed deviation, both in milliseconds. A delay far outside the expected
/// band flips the estimator into spike recovery, where `d` follows the raw
/// delays until the spike variance accumulator settles.
///
/// The estimator never gates audio; its only consumer-facing output is an
/// advisory buffer-depth suggestion for the playout scheduler.
#[derive(Debug, Clone)]
pub struct JitterEstimator {
    d: f32,
    v: f32,
    n1: f32,
    n2: f32,
    var: f32,
    mode: JitterMode,
}

impl Default for JitterEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl JitterEstimator {
    pub fn new() -> Self {
        Self {
            d: 10.0,
            v: 10.0,
            n1: 10.0,
            n2: 10.0,
            var: 10.0,
            mode: JitterMode::Stable,
        }
    }

    /// Feeds one inter-arrival delay, in milliseconds.
    pub fn update(&mut self, delay_ms: f32) {
        if !delay_ms.is_finite() || delay_ms < 0.0 {
            return;
        }

        let mut update_dv = true;
        match self.mode {
            JitterMode::Stable => {
                if (delay_ms - self.d).abs() > self.v.abs() * 2.0 + SPIKE_TRIGGER_MS {
                    self.var = 0.0;
                    self.mode = JitterMode::SpikeRecovery;
                }
            }
            JitterMode::SpikeRecovery => {
                self.var = self.var / 2.0 + ((2.0 * delay_ms - self.n1 - self.n2) / 8.0).abs();
                if self.var <= SPIKE_EXIT_VAR {
                    self.mode = JitterMode::Stable;
                    update_dv = false;
                }
            }
        }

        if update_dv {
            match self.mode {
                JitterMode::Stable => self.d = 0.125 * delay_ms + 0.875 * self.d,
                JitterMode::SpikeRecovery => self.d = self.d + delay_ms - self.n1,
            }
            self.v = 0.125 * (delay_ms - self.d).abs() + 0.875 * self.v;
        }

        self.n2 = self.n1;
        self.n1 = delay_ms;
    }

    pub fn mode(&self) -> JitterMode {
        self.mode
    }

    pub fn delay_ms(&self) -> f32 {
        self.d
    }

    pub fn deviation_ms(&self) -> f32 {
        self.v
    }

    /// RFC 3550 playout rule: hold `d + 4v` of audio against jitter.
    pub fn suggested_buffer_ms(&self) -> f32 {
        self.d + 4.0 * self.v.abs()
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
