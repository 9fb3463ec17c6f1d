use std::collections::VecDeque;

const PEAK_ATTACK: f32 = 0.5;
const RMS_COEFF: f32 = 0.01;
const DETECTOR_EPS: f32 = 1e-6;
const CLIP_LEVEL: f32 = 0.95;
/// The lookahead FIFO never grows past this, whatever the preset asks for.
const MAX_LOOKAHEAD_SECS: f32 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgcMode {
    Auto,
    Fast,
    Medium,
    Slow,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgcParams {
    pub attack_time: f32,
    pub release_time: f32,
    pub lookahead_time: f32,
    pub target_level: f32,
    pub max_gain: f32,
}

impl AgcMode {
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Auto),
            1 => Some(Self::Fast),
            2 => Some(Self::Medium),
            3 => Some(Self::Slow),
            4 => Some(Self::Off),
            _ => None,
        }
    }

    pub fn index(self) -> u8 {
        match self {
            Self::Auto => 0,
            Self::Fast => 1,
            Self::Medium => 2,
            Self::Slow => 3,
            Self::Off => 4,
        }
    }

    /// `None` means AGC is disabled (fixed unity gain pass-through).
    pub fn params(self) -> Option<AgcParams> {
        match self {
            Self::Auto => Some(AgcParams {
                attack_time: 0.03,
                release_time: 0.5,
                lookahead_time: 0.05,
                target_level: 0.9,
                max_gain: 6.0,
            }),
            Self::Fast => Some(AgcParams {
                attack_time: 0.005,
                release_time: 0.2,
                lookahead_time: 0.02,
                target_level: 0.75,
                max_gain: 6.0,
            }),
            Self::Medium => Some(AgcParams {
                attack_time: 0.02,
                release_time: 1.5,
                lookahead_time: 0.08,
                target_level: 1.0,
                max_gain: 6.0,
            }),
            Self::Slow => Some(AgcParams {
                attack_time: 0.1,
                release_time: 2.5,
                lookahead_time: 0.12,
                target_level: 1.1,
                max_gain: 6.0,
            }),
            Self::Off => None,
        }
    }
}

/// Look-ahead AGC with a hybrid peak/RMS detector. Incoming samples feed the
/// detector immediately while the audible signal is delayed through a FIFO,
/// so the gain has already moved by the time a peak reaches the output.
#[derive(Debug)]
pub struct LookaheadAgc {
    sample_rate: f32,
    mode: AgcMode,
    params: Option<AgcParams>,
    attack_coeff: f32,
    release_coeff: f32,
    lookahead_samples: usize,
    fifo: VecDeque<f32>,
    gain: f32,
    peak: f32,
    rms: f32,
}

impl LookaheadAgc {
    pub fn new(mode: AgcMode, sample_rate: u32) -> Self {
        let mut agc = Self {
            sample_rate: sample_rate as f32,
            mode,
            params: None,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            lookahead_samples: 0,
            fifo: VecDeque::new(),
            gain: 1.0,
            peak: 0.0,
            rms: 0.0,
        };
        agc.set_mode(mode);
        agc
    }

    pub fn set_mode(&mut self, mode: AgcMode) {
        self.mode = mode;
        self.params = mode.params();
        if let Some(p) = self.params {
            // One-pole step fractions: gain moves (1 - e^(-1/t*sr)) of the
            // remaining distance per sample.
            self.attack_coeff = 1.0 - (-1.0 / (p.attack_time * self.sample_rate)).exp();
            self.release_coeff = 1.0 - (-1.0 / (p.release_time * self.sample_rate)).exp();
            let lookahead = p.lookahead_time.min(MAX_LOOKAHEAD_SECS);
            self.lookahead_samples = (lookahead * self.sample_rate) as usize;
            // Shrinking drops the oldest queued samples; growth pads with
            // silence at processing time.
            while self.fifo.len() > self.lookahead_samples {
                self.fifo.pop_front();
            }
        }
    }

    pub fn mode(&self) -> AgcMode {
        self.mode
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn reset(&mut self) {
        self.fifo.clear();
        self.gain = 1.0;
        self.peak = 0.0;
        self.rms = 0.0;
    }

    pub fn process(&mut self, samples: &mut [f32]) {
        let Some(p) = self.params else {
            return;
        };

        while self.fifo.len() < self.lookahead_samples {
            self.fifo.push_back(0.0);
        }

        for s in samples.iter_mut() {
            let input = *s;
            self.fifo.push_back(input);
            let delayed = self.fifo.pop_front().unwrap_or(0.0);

            // Detector runs on the incoming sample so the gain leads the
            // delayed audio by the lookahead interval.
            let abs = input.abs();
            self.peak = abs.max(self.peak + (abs - self.peak) * PEAK_ATTACK);
            let rms_sq = self.rms * self.rms + (input * input - self.rms * self.rms) * RMS_COEFF;
            self.rms = rms_sq.max(0.0).sqrt();
            let detector = 0.7 * self.peak + 0.3 * self.rms;

            let desired = (p.target_level / (detector + DETECTOR_EPS)).min(p.max_gain);
            let coeff = if desired > self.gain {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.gain += (desired - self.gain) * coeff;
            self.gain = self.gain.clamp(0.0, p.max_gain);

            *s = (delayed * self.gain).clamp(-CLIP_LEVEL, CLIP_LEVEL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 12_000;

    #[test]
    fn off_mode_is_pass_through() {
        let mut agc = LookaheadAgc::new(AgcMode::Off, SR);
        let mut buf: Vec<f32> = (0..1024).map(|i| (i as f32 * 0.01).sin()).collect();
        let input = buf.clone();
        agc.process(&mut buf);
        assert_eq!(buf, input);
    }

    #[test]
    fn output_is_always_within_clip_level() {
        for index in 0..4u8 {
            let mode = AgcMode::from_index(index).unwrap();
            let mut agc = LookaheadAgc::new(mode, SR);
            let mut buf: Vec<f32> = (0..SR as usize)
                .map(|i| if i % 3 == 0 { 4.0 } else { -3.0 })
                .collect();
            agc.process(&mut buf);
            for v in &buf {
                assert!(
                    v.abs() <= CLIP_LEVEL,
                    "mode {mode:?} produced {v} outside the limiter"
                );
            }
        }
    }

    #[test]
    fn gain_converges_to_target_over_amplitude() {
        // A square wave has constant instantaneous amplitude, so both the peak
        // and RMS envelopes settle to it exactly.
        let amplitude = 0.5f32;
        let mut agc = LookaheadAgc::new(AgcMode::Fast, SR);
        let p = AgcMode::Fast.params().unwrap();
        let mut buf: Vec<f32> = (0..SR as usize)
            .map(|i| if i % 2 == 0 { amplitude } else { -amplitude })
            .collect();
        agc.process(&mut buf);

        let expected = (p.target_level / amplitude).min(p.max_gain);
        let gain = agc.gain();
        assert!(
            (gain - expected).abs() / expected < 0.01,
            "gain {gain} should converge within 1% of {expected}"
        );
    }

    #[test]
    fn gain_clamps_at_max_for_weak_signals() {
        let mut agc = LookaheadAgc::new(AgcMode::Auto, SR);
        let p = AgcMode::Auto.params().unwrap();
        let mut buf: Vec<f32> = (0..2 * SR as usize)
            .map(|i| if i % 2 == 0 { 0.01 } else { -0.01 })
            .collect();
        agc.process(&mut buf);
        let gain = agc.gain();
        assert!(
            (gain - p.max_gain).abs() / p.max_gain < 0.01,
            "weak input should drive gain to max_gain, got {gain}"
        );
    }

    #[test]
    fn lookahead_delays_the_audible_signal() {
        let mut agc = LookaheadAgc::new(AgcMode::Fast, SR);
        let lookahead = (AgcMode::Fast.params().unwrap().lookahead_time * SR as f32) as usize;
        let mut buf = vec![0.25f32; lookahead + 64];
        agc.process(&mut buf);
        // The first lookahead samples come from the silence padding.
        for (i, v) in buf[..lookahead].iter().enumerate() {
            assert_eq!(*v, 0.0, "sample {i} should still be in the delay line");
        }
        assert!(buf[lookahead] != 0.0, "delayed signal should appear after the FIFO fills");
    }

    #[test]
    fn unknown_mode_index_is_rejected() {
        assert_eq!(AgcMode::from_index(5), None);
        assert_eq!(AgcMode::from_index(4), Some(AgcMode::Off));
    }
}
