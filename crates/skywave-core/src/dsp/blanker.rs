use num_complex::Complex32;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use std::sync::Arc;

const BLANKER_EPS: f32 = 1e-12;

#[derive(Debug, Clone, Copy)]
pub struct BlankerConfig {
    pub fft_size: usize,
    pub overlap: usize,
    pub average_windows: usize,
    pub threshold_factor: f32,
}

impl Default for BlankerConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            overlap: 1536,
            average_windows: 32,
            threshold_factor: 0.140,
        }
    }
}

/// Fixed-depth ring of magnitude spectra. The per-bin average across all
/// slots approximates the running noise floor.
#[derive(Debug)]
pub struct SpectralHistory {
    slots: Vec<Vec<f32>>,
    index: usize,
}

impl SpectralHistory {
    pub fn new(depth: usize, bins: usize) -> Self {
        Self {
            slots: vec![vec![0.0; bins]; depth.max(1)],
            index: 0,
        }
    }

    /// Overwrites the oldest slot and advances the ring index.
    pub fn push(&mut self, spectrum: &[f32]) {
        let slot = &mut self.slots[self.index];
        let n = slot.len().min(spectrum.len());
        slot[..n].copy_from_slice(&spectrum[..n]);
        self.index = (self.index + 1) % self.slots.len();
    }

    /// Per-bin average across all slots.
    pub fn average_into(&self, out: &mut [f32]) {
        let depth = self.slots.len() as f32;
        for (bin, dst) in out.iter_mut().enumerate() {
            let mut sum = 0.0f32;
            for slot in &self.slots {
                sum += slot[bin];
            }
            *dst = sum / depth;
        }
    }

    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.fill(0.0);
        }
        self.index = 0;
    }
}

/// Impulsive noise blanker and soft spectral reducer over an overlapped
/// short-time FFT. The magnitude spectra of the last `average_windows` blocks
/// form a running noise-floor estimate; bins rising above it are softly
/// attenuated (`1/sqrt(ratio)`, never zeroed), and time-domain excursions
/// above a dynamic threshold derived from the average floor level are blanked
/// by scaling the original sample back down to the threshold.
pub struct NoiseBlanker {
    fft_size: usize,
    hop: usize,
    threshold_factor: f32,
    blanker_enabled: bool,
    reduction_enabled: bool,
    r2c: Arc<dyn RealToComplex<f32>>,
    c2r: Arc<dyn ComplexToReal<f32>>,
    fwd_scratch: Vec<Complex32>,
    inv_scratch: Vec<Complex32>,
    block: Vec<f32>,
    spectrum: Vec<Complex32>,
    magnitude: Vec<f32>,
    floor_avg: Vec<f32>,
    time: Vec<f32>,
    history: SpectralHistory,
}

impl NoiseBlanker {
    pub fn new(cfg: BlankerConfig) -> anyhow::Result<Self> {
        if cfg.fft_size < 8 || cfg.fft_size % 2 != 0 {
            anyhow::bail!("blanker fft_size must be even and >= 8, got {}", cfg.fft_size);
        }
        if cfg.overlap >= cfg.fft_size {
            anyhow::bail!(
                "blanker overlap {} must be smaller than fft_size {}",
                cfg.overlap,
                cfg.fft_size
            );
        }
        if cfg.average_windows == 0 {
            anyhow::bail!("blanker average_windows must be nonzero");
        }
        if !(cfg.threshold_factor.is_finite() && cfg.threshold_factor > 0.0) {
            anyhow::bail!("blanker threshold_factor must be positive");
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let r2c = planner.plan_fft_forward(cfg.fft_size);
        let c2r = planner.plan_fft_inverse(cfg.fft_size);
        let fwd_scratch = r2c.make_scratch_vec();
        let inv_scratch = c2r.make_scratch_vec();
        let half = cfg.fft_size / 2;

        Ok(Self {
            fft_size: cfg.fft_size,
            hop: cfg.fft_size - cfg.overlap,
            threshold_factor: cfg.threshold_factor,
            blanker_enabled: false,
            reduction_enabled: false,
            r2c,
            c2r,
            fwd_scratch,
            inv_scratch,
            block: vec![0.0; cfg.fft_size],
            spectrum: vec![Complex32::new(0.0, 0.0); half + 1],
            magnitude: vec![0.0; half],
            floor_avg: vec![0.0; half],
            time: vec![0.0; cfg.fft_size],
            history: SpectralHistory::new(cfg.average_windows, half),
        })
    }

    pub fn set_blanker_enabled(&mut self, enabled: bool) {
        self.blanker_enabled = enabled;
    }

    pub fn set_reduction_enabled(&mut self, enabled: bool) {
        self.reduction_enabled = enabled;
    }

    pub fn blanker_enabled(&self) -> bool {
        self.blanker_enabled
    }

    pub fn reduction_enabled(&self) -> bool {
        self.reduction_enabled
    }

    pub fn reset(&mut self) {
        self.history.reset();
    }

    /// Runs one channel's samples through the analysis chain and returns the
    /// conditioned buffer. Pass-through when both sub-features are off.
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if !self.blanker_enabled && !self.reduction_enabled {
            return input.to_vec();
        }

        let mut out = input.to_vec();
        let half = self.fft_size / 2;
        let inv_n = 1.0 / self.fft_size as f32;

        let mut start = 0usize;
        while start < input.len() {
            // Trailing partial block: zero-pad instead of reading past the end.
            let take = (input.len() - start).min(self.fft_size);
            self.block[..take].copy_from_slice(&input[start..start + take]);
            self.block[take..].fill(0.0);

            let _ = self.r2c.process_with_scratch(
                &mut self.block,
                &mut self.spectrum,
                &mut self.fwd_scratch,
            );

            for j in 0..half {
                self.magnitude[j] = self.spectrum[j].norm();
            }
            self.history.push(&self.magnitude);
            self.history.average_into(&mut self.floor_avg);

            let avg_signal_level = self.floor_avg.iter().sum::<f32>() / half as f32;
            let dynamic_threshold = self.threshold_factor * avg_signal_level;

            if self.reduction_enabled {
                // Half-spectrum layout: scaling a bin scales its mirror too.
                for j in 0..half {
                    let floor = self.floor_avg[j];
                    if floor > 0.0 {
                        let ratio = self.magnitude[j] / floor;
                        if ratio > 1.0 {
                            self.spectrum[j] *= 1.0 / ratio.sqrt();
                        }
                    }
                }
            }

            let _ = self.c2r.process_with_scratch(
                &mut self.spectrum,
                &mut self.time,
                &mut self.inv_scratch,
            );

            // The inverse transform is unnormalized (FFTW backward convention).
            for j in 0..take {
                let resynth = self.time[j] * inv_n;
                let magnitude = resynth.abs();
                let idx = start + j;
                out[idx] = if self.blanker_enabled && magnitude > dynamic_threshold {
                    input[idx] * (dynamic_threshold / (magnitude + BLANKER_EPS))
                } else if self.reduction_enabled {
                    resynth
                } else {
                    input[idx]
                };
            }

            start += self.hop;
        }

        out
    }
}
