use crate::dsp::blanker::BlankerConfig;
use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_channels")]
    pub channels: u8,
    #[serde(default)]
    pub blanker: BlankerSettings,
    #[serde(default)]
    pub gate: GateSettings,
    #[serde(default)]
    pub agc: AgcSettings,
    #[serde(default)]
    pub playout: PlayoutSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlankerSettings {
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    #[serde(default = "default_average_windows")]
    pub average_windows: usize,
    #[serde(default = "default_threshold_factor")]
    pub threshold_factor: f32,
    #[serde(default)]
    pub blanker_enabled: bool,
    #[serde(default)]
    pub reduction_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GateSettings {
    #[serde(default = "default_gate_enabled")]
    pub enabled: bool,
    #[serde(default = "default_gate_preset")]
    pub preset: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgcSettings {
    /// Preset index 0..=4; 4 disables AGC.
    #[serde(default)]
    pub mode: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayoutSettings {
    #[serde(default = "default_buffer_limit")]
    pub buffer_limit: f64,
    #[serde(default = "default_buffer_threshold")]
    pub buffer_threshold: f64,
}

fn default_sample_rate() -> u32 {
    12_000
}
fn default_channels() -> u8 {
    1
}
fn default_fft_size() -> usize {
    2048
}
fn default_overlap() -> usize {
    1536
}
fn default_average_windows() -> usize {
    32
}
fn default_threshold_factor() -> f32 {
    0.140
}
fn default_gate_enabled() -> bool {
    true
}
fn default_gate_preset() -> String {
    "balanced".to_string()
}
fn default_buffer_limit() -> f64 {
    0.5
}
fn default_buffer_threshold() -> f64 {
    0.1
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            blanker: BlankerSettings::default(),
            gate: GateSettings::default(),
            agc: AgcSettings::default(),
            playout: PlayoutSettings::default(),
        }
    }
}

impl Default for BlankerSettings {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
            overlap: default_overlap(),
            average_windows: default_average_windows(),
            threshold_factor: default_threshold_factor(),
            blanker_enabled: false,
            reduction_enabled: false,
        }
    }
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            enabled: default_gate_enabled(),
            preset: default_gate_preset(),
        }
    }
}

impl Default for AgcSettings {
    fn default() -> Self {
        Self { mode: 0 }
    }
}

impl Default for PlayoutSettings {
    fn default() -> Self {
        Self {
            buffer_limit: default_buffer_limit(),
            buffer_threshold: default_buffer_threshold(),
        }
    }
}

impl BlankerSettings {
    pub fn to_blanker_config(&self) -> BlankerConfig {
        BlankerConfig {
            fft_size: self.fft_size,
            overlap: self.overlap,
            average_windows: self.average_windows,
            threshold_factor: self.threshold_factor,
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let cfg: PipelineConfig = serde_json::from_str(&raw)
            .with_context(|| format!("parse config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.sample_rate == 0 {
            anyhow::bail!("sample_rate must be positive");
        }
        if !(1..=2).contains(&self.channels) {
            anyhow::bail!("channels must be 1 or 2, got {}", self.channels);
        }
        if self.blanker.overlap >= self.blanker.fft_size {
            anyhow::bail!(
                "blanker overlap {} must be smaller than fft_size {}",
                self.blanker.overlap,
                self.blanker.fft_size
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_parses_to_defaults() {
        let cfg: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.sample_rate, 12_000);
        assert_eq!(cfg.channels, 1);
        assert_eq!(cfg.blanker.fft_size, 2048);
        assert_eq!(cfg.blanker.overlap, 1536);
        assert_eq!(cfg.blanker.average_windows, 32);
        assert!((cfg.blanker.threshold_factor - 0.140).abs() < 1e-9);
        assert!(cfg.gate.enabled);
        assert_eq!(cfg.gate.preset, "balanced");
        assert_eq!(cfg.agc.mode, 0);
        assert_eq!(cfg.playout.buffer_limit, 0.5);
        assert_eq!(cfg.playout.buffer_threshold, 0.1);
        cfg.validate().unwrap();
    }

    #[test]
    fn invalid_settings_fail_validation() {
        let mut cfg = PipelineConfig::default();
        cfg.channels = 3;
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.sample_rate = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.blanker.overlap = cfg.blanker.fft_size;
        assert!(cfg.validate().is_err());
    }
}
