/// Noise floor is clamped here to keep the envelope ratio finite.
const MIN_NOISE_FLOOR: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePreset {
    Balanced,
    Aggressive,
    WeakSignal,
    Smooth,
    Maximum,
    Cw,
    AmFm,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateParams {
    /// Envelope follower rate per sample.
    pub envelope_rate: f32,
    /// Noise-floor tracking rate per sample.
    pub floor_rate: f32,
    /// Gate opens when envelope/floor exceeds this ratio.
    pub open_ratio: f32,
    /// Gate closes when envelope/floor falls below this ratio.
    pub close_ratio: f32,
    /// Attenuation applied while closed. Never zero.
    pub floor_gain: f32,
}

impl GatePreset {
    pub const ALL: [GatePreset; 7] = [
        GatePreset::Balanced,
        GatePreset::Aggressive,
        GatePreset::WeakSignal,
        GatePreset::Smooth,
        GatePreset::Maximum,
        GatePreset::Cw,
        GatePreset::AmFm,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "balanced" => Some(Self::Balanced),
            "aggressive" => Some(Self::Aggressive),
            "weak-signal" => Some(Self::WeakSignal),
            "smooth" => Some(Self::Smooth),
            "maximum" => Some(Self::Maximum),
            "cw" => Some(Self::Cw),
            "am-fm" => Some(Self::AmFm),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Balanced => "balanced",
            Self::Aggressive => "aggressive",
            Self::WeakSignal => "weak-signal",
            Self::Smooth => "smooth",
            Self::Maximum => "maximum",
            Self::Cw => "cw",
            Self::AmFm => "am-fm",
        }
    }

    pub fn params(self) -> GateParams {
        match self {
            Self::Balanced => GateParams {
                envelope_rate: 0.0024,
                floor_rate: 0.000_08,
                open_ratio: 1.70,
                close_ratio: 3.50,
                floor_gain: 0.45,
            },
            Self::Aggressive => GateParams {
                envelope_rate: 0.0025,
                floor_rate: 0.000_08,
                open_ratio: 1.70,
                close_ratio: 3.50,
                floor_gain: 0.38,
            },
            Self::WeakSignal => GateParams {
                envelope_rate: 0.0022,
                floor_rate: 0.000_07,
                open_ratio: 1.60,
                close_ratio: 3.40,
                floor_gain: 0.52,
            },
            Self::Smooth => GateParams {
                envelope_rate: 0.0020,
                floor_rate: 0.000_06,
                open_ratio: 1.75,
                close_ratio: 3.60,
                floor_gain: 0.55,
            },
            Self::Maximum => GateParams {
                envelope_rate: 0.0028,
                floor_rate: 0.000_08,
                open_ratio: 1.65,
                close_ratio: 3.45,
                floor_gain: 0.32,
            },
            Self::Cw => GateParams {
                envelope_rate: 0.0035,
                floor_rate: 0.000_10,
                open_ratio: 1.65,
                close_ratio: 3.30,
                floor_gain: 0.35,
            },
            Self::AmFm => GateParams {
                envelope_rate: 0.0020,
                floor_rate: 0.000_06,
                open_ratio: 2.00,
                close_ratio: 3.80,
                floor_gain: 0.62,
            },
        }
    }
}

/// Adaptive hysteretic gate. An envelope follower is compared against a
/// slowly tracked noise floor; open and close use different envelope/floor
/// ratios, and a closed gate attenuates by the preset floor gain instead of
/// muting so the transition never clicks.
#[derive(Debug)]
pub struct NoiseGate {
    preset: GatePreset,
    params: GateParams,
    enabled: bool,
    envelope: f32,
    noise_floor: f32,
    open: bool,
}

impl NoiseGate {
    pub fn new(preset: GatePreset) -> Self {
        Self {
            preset,
            params: preset.params(),
            enabled: true,
            envelope: 0.0,
            noise_floor: 0.001,
            open: true,
        }
    }

    pub fn set_preset(&mut self, preset: GatePreset) {
        self.preset = preset;
        self.params = preset.params();
    }

    pub fn preset(&self) -> GatePreset {
        self.preset
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn reset(&mut self) {
        self.envelope = 0.0;
        self.noise_floor = 0.001;
        self.open = true;
    }

    pub fn process(&mut self, samples: &mut [f32]) {
        if !self.enabled {
            return;
        }
        let p = self.params;
        for s in samples.iter_mut() {
            let x = s.abs();
            self.envelope += p.envelope_rate * (x - self.envelope);

            // Track the floor only while the envelope sits near the noise region.
            if self.envelope < self.noise_floor * 1.5 {
                self.noise_floor += p.floor_rate * (self.envelope - self.noise_floor);
            }
            if self.noise_floor < MIN_NOISE_FLOOR {
                self.noise_floor = MIN_NOISE_FLOOR;
            }

            let ratio = self.envelope / self.noise_floor;
            if self.open {
                if ratio < p.close_ratio {
                    self.open = false;
                }
            } else if ratio > p.open_ratio {
                self.open = true;
            }

            if !self.open {
                *s *= p.floor_gain;
            }
        }
    }
}
