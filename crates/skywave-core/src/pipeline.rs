use crate::config::PipelineConfig;
use crate::dsp::agc::{AgcMode, LookaheadAgc};
use crate::dsp::blanker::NoiseBlanker;
use crate::dsp::gate::{GatePreset, NoiseGate};
use crate::dsp::jitter::{JitterEstimator, JitterMode};
use crate::dsp::playout::PlayoutClock;
use crate::frame::{deinterleave, interleave, AudioFrame};
use crate::protocol::ClientCommand;
use crate::util::generate_session_id;
use std::time::Instant;

/// A conditioned buffer with its playout start time on the output clock.
#[derive(Debug, Clone)]
pub struct ScheduledBuffer {
    pub samples: Vec<f32>,
    pub channels: u8,
    pub sample_rate: u32,
    pub start_time: f64,
}

impl ScheduledBuffer {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        let frames = self.samples.len() / self.channels.max(1) as usize;
        frames as f64 / self.sample_rate as f64
    }
}

/// Per-channel processing chain. Gate and AGC state must never be shared
/// between channels or survive a channel-count switch.
struct ChannelChain {
    blanker: NoiseBlanker,
    gate: NoiseGate,
    agc: LookaheadAgc,
}

impl ChannelChain {
    fn new(cfg: &PipelineConfig, gate_preset: GatePreset, agc_mode: AgcMode) -> anyhow::Result<Self> {
        let mut blanker = NoiseBlanker::new(cfg.blanker.to_blanker_config())?;
        blanker.set_blanker_enabled(cfg.blanker.blanker_enabled);
        blanker.set_reduction_enabled(cfg.blanker.reduction_enabled);
        let mut gate = NoiseGate::new(gate_preset);
        gate.set_enabled(cfg.gate.enabled);
        Ok(Self {
            blanker,
            gate,
            agc: LookaheadAgc::new(agc_mode, cfg.sample_rate),
        })
    }
}

/// The streaming audio conditioner: blanker/NR, gate, AGC, channel routing,
/// jitter tracking, and playout scheduling for one session.
///
/// Frames are pushed strictly in arrival order; each push runs one complete
/// synchronous pass. Dropping the pipeline drops all session state.
pub struct Pipeline {
    session_id: String,
    cfg: PipelineConfig,
    channels: u8,
    chains: Vec<ChannelChain>,
    gate_preset: GatePreset,
    agc_mode: AgcMode,
    jitter: JitterEstimator,
    playout: PlayoutClock,
    started: bool,
    last_arrival: Option<Instant>,
    frames_in: u64,
    frames_skipped: u64,
}

impl Pipeline {
    pub fn new(cfg: PipelineConfig) -> anyhow::Result<Self> {
        cfg.validate()?;

        let gate_preset = match GatePreset::from_name(&cfg.gate.preset) {
            Some(p) => p,
            None => {
                tracing::warn!(
                    preset = %cfg.gate.preset,
                    "unknown noise gate preset in config, using balanced"
                );
                GatePreset::Balanced
            }
        };
        let agc_mode = match AgcMode::from_index(cfg.agc.mode) {
            Some(m) => m,
            None => {
                tracing::warn!(mode = cfg.agc.mode, "unknown AGC mode in config, using auto");
                AgcMode::Auto
            }
        };

        let channels = cfg.channels;
        let mut chains = Vec::with_capacity(channels as usize);
        for _ in 0..channels {
            chains.push(ChannelChain::new(&cfg, gate_preset, agc_mode)?);
        }

        let playout = PlayoutClock::new(cfg.playout.buffer_limit, cfg.playout.buffer_threshold);
        let session_id = generate_session_id();
        tracing::info!(
            session_id = %session_id,
            sample_rate = cfg.sample_rate,
            channels,
            gate_preset = gate_preset.name(),
            agc_mode = agc_mode.index(),
            "audio pipeline ready"
        );

        Ok(Self {
            session_id,
            cfg,
            channels,
            chains,
            gate_preset,
            agc_mode,
            jitter: JitterEstimator::new(),
            playout,
            started: false,
            last_arrival: None,
            frames_in: 0,
            frames_skipped: 0,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn jitter_mode(&self) -> JitterMode {
        self.jitter.mode()
    }

    pub fn jitter(&self) -> &JitterEstimator {
        &self.jitter
    }

    pub fn playout(&self) -> &PlayoutClock {
        &self.playout
    }

    pub fn frames_in(&self) -> u64 {
        self.frames_in
    }

    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped
    }

    /// Runs one decoded frame through the full pipeline and schedules the
    /// result. Returns `None` for empty frames (decode failures are delivered
    /// as zero-length buffers and mean "nothing to process").
    ///
    /// `now` is the current time on the output clock, in seconds.
    pub fn push_frame(&mut self, frame: AudioFrame, now: f64) -> Option<ScheduledBuffer> {
        if frame.is_empty() {
            self.frames_skipped += 1;
            tracing::trace!(session_id = %self.session_id, "empty decoded frame, skipping");
            return None;
        }
        self.frames_in += 1;

        if frame.channels != self.channels {
            self.set_channel_count(frame.channels);
            if frame.channels != self.channels {
                // Switch was rejected; drop the frame rather than misroute it.
                self.frames_skipped += 1;
                return None;
            }
        }

        if !self.started {
            self.playout.start(now);
            self.started = true;
        }

        if let Some(prev) = self.last_arrival {
            let delay_ms = frame.arrived.duration_since(prev).as_secs_f32() * 1000.0;
            self.jitter.update(delay_ms);
            self.playout
                .set_jitter_hint(self.jitter.suggested_buffer_ms() as f64 / 1000.0);
        }
        self.last_arrival = Some(frame.arrived);

        let sample_rate = if frame.sample_rate > 0 {
            frame.sample_rate
        } else {
            self.cfg.sample_rate
        };

        let samples = if self.channels == 2 {
            // Stereo: blanker/NR per channel; gate and AGC stay bypassed so
            // the per-channel envelopes cannot interact audibly.
            let (left, right) = deinterleave(&frame.samples);
            let left = self.chains[0].blanker.process(&left);
            let right = self.chains[1].blanker.process(&right);
            interleave(&left, &right)
        } else {
            let chain = &mut self.chains[0];
            let mut buf = chain.blanker.process(&frame.samples);
            chain.gate.process(&mut buf);
            chain.agc.process(&mut buf);
            buf
        };

        let frames = samples.len() / self.channels as usize;
        let duration = frames as f64 / sample_rate as f64;
        let start_time = self.playout.schedule(now, duration);

        Some(ScheduledBuffer {
            samples,
            channels: self.channels,
            sample_rate,
            start_time,
        })
    }

    pub fn apply_command(&mut self, cmd: ClientCommand) {
        match cmd {
            ClientCommand::Agc { mode } => self.set_agc_mode(mode),
            ClientCommand::NoiseGatePreset { preset } => self.set_noise_gate_preset(&preset),
            ClientCommand::NoiseGate { enabled } => self.set_noise_gate_enabled(enabled),
            ClientCommand::NoiseBlanker { enabled } => self.set_noise_blanker_enabled(enabled),
            ClientCommand::NoiseReduction { enabled } => self.set_noise_reduction_enabled(enabled),
            ClientCommand::BufferDelay { limit, threshold } => {
                self.set_buffer_delay(limit, threshold)
            }
            ClientCommand::Channels { channels } => self.set_channel_count(channels),
        }
    }

    pub fn set_agc_mode(&mut self, mode: u8) {
        let Some(mode) = AgcMode::from_index(mode) else {
            tracing::warn!(
                session_id = %self.session_id,
                mode,
                current = self.agc_mode.index(),
                "unknown AGC mode, keeping current"
            );
            return;
        };
        self.agc_mode = mode;
        for chain in &mut self.chains {
            chain.agc.set_mode(mode);
        }
        tracing::debug!(session_id = %self.session_id, mode = mode.index(), "AGC mode set");
    }

    pub fn set_noise_gate_preset(&mut self, name: &str) {
        let Some(preset) = GatePreset::from_name(name) else {
            tracing::warn!(
                session_id = %self.session_id,
                preset = name,
                current = self.gate_preset.name(),
                "unknown noise gate preset, keeping current"
            );
            return;
        };
        self.gate_preset = preset;
        for chain in &mut self.chains {
            chain.gate.set_preset(preset);
        }
        tracing::debug!(session_id = %self.session_id, preset = preset.name(), "gate preset set");
    }

    pub fn set_noise_gate_enabled(&mut self, enabled: bool) {
        for chain in &mut self.chains {
            chain.gate.set_enabled(enabled);
        }
    }

    pub fn set_noise_blanker_enabled(&mut self, enabled: bool) {
        for chain in &mut self.chains {
            chain.blanker.set_blanker_enabled(enabled);
        }
    }

    pub fn set_noise_reduction_enabled(&mut self, enabled: bool) {
        for chain in &mut self.chains {
            chain.blanker.set_reduction_enabled(enabled);
        }
    }

    pub fn set_buffer_delay(&mut self, limit: f64, threshold: f64) {
        self.playout.set_bounds(limit, threshold);
    }

    /// Switches between mono and stereo. All per-channel state is rebuilt;
    /// envelopes and delay lines never carry across a channel-count change.
    pub fn set_channel_count(&mut self, channels: u8) {
        if !(1..=2).contains(&channels) {
            tracing::warn!(
                session_id = %self.session_id,
                channels,
                "invalid channel count, keeping current"
            );
            return;
        }
        if channels == self.channels {
            return;
        }

        let mut chains = Vec::with_capacity(channels as usize);
        for _ in 0..channels {
            match ChannelChain::new(&self.cfg, self.gate_preset, self.agc_mode) {
                Ok(chain) => chains.push(chain),
                Err(e) => {
                    tracing::warn!(
                        session_id = %self.session_id,
                        error = ?e,
                        "channel chain rebuild failed, keeping current routing"
                    );
                    return;
                }
            }
        }
        // Rebuilt chains start from config state; re-apply runtime toggles.
        let reference = &self.chains[0];
        let (blanker_on, reduction_on, gate_on) = (
            reference.blanker.blanker_enabled(),
            reference.blanker.reduction_enabled(),
            reference.gate.enabled(),
        );
        for chain in &mut chains {
            chain.blanker.set_blanker_enabled(blanker_on);
            chain.blanker.set_reduction_enabled(reduction_on);
            chain.gate.set_enabled(gate_on);
        }

        self.chains = chains;
        self.channels = channels;
        tracing::debug!(session_id = %self.session_id, channels, "channel count switched");
    }
}
