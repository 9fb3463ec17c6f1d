mod logging;

use anyhow::Context;
use clap::Parser;
use skywave_core::config::PipelineConfig;
use skywave_core::frame::AudioFrame;
use skywave_core::pipeline::Pipeline;
use skywave_core::protocol::ClientCommand;
use skywave_core::queue::FrameQueue;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

const QUEUE_DEPTH: usize = 8;

#[derive(Debug, Parser)]
#[command(
    name = "skywave",
    version,
    about = "Condition a raw f32le PCM stream: noise blanking, gating, AGC and playout scheduling."
)]
struct Args {
    /// JSON pipeline configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Input sample rate in Hz (overrides the config file)
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Channel count: 1 (mono) or 2 (interleaved stereo)
    #[arg(long)]
    channels: Option<u8>,

    /// Frames (samples per channel) read from stdin per buffer
    #[arg(long, default_value_t = 1200)]
    frame_samples: usize,

    /// AGC mode 0..=3; 4 disables AGC
    #[arg(long)]
    agc_mode: Option<u8>,

    /// Noise gate preset name (balanced, aggressive, weak-signal, smooth,
    /// maximum, cw, am-fm)
    #[arg(long)]
    gate_preset: Option<String>,

    /// Enable the impulsive noise blanker
    #[arg(long, default_value_t = false)]
    noise_blanker: bool,

    /// Enable spectral noise reduction
    #[arg(long, default_value_t = false)]
    noise_reduction: bool,

    /// Control commands applied at startup, one JSON object each
    /// (example: {"cmd":"agc","mode":2})
    #[arg(long = "command")]
    commands: Vec<String>,

    /// Write daily-rolling log files into this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Enable debug logging for the pipeline crates
    #[arg(long, default_value_t = false)]
    debug: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _guards = logging::init(&logging::LoggingConfig {
        debug: args.debug,
        log_dir: args.log_dir.clone(),
        ..Default::default()
    })?;

    let mut cfg = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(rate) = args.sample_rate {
        cfg.sample_rate = rate;
    }
    if let Some(channels) = args.channels {
        cfg.channels = channels;
    }
    if args.frame_samples == 0 {
        anyhow::bail!("frame_samples must be positive");
    }

    let sample_rate = cfg.sample_rate;
    let channels = cfg.channels;
    let mut pipeline = Pipeline::new(cfg)?;
    if let Some(mode) = args.agc_mode {
        pipeline.apply_command(ClientCommand::Agc { mode });
    }
    if let Some(preset) = args.gate_preset.clone() {
        pipeline.apply_command(ClientCommand::NoiseGatePreset { preset });
    }
    if args.noise_blanker {
        pipeline.apply_command(ClientCommand::NoiseBlanker { enabled: true });
    }
    if args.noise_reduction {
        pipeline.apply_command(ClientCommand::NoiseReduction { enabled: true });
    }
    for raw in &args.commands {
        let cmd: ClientCommand = serde_json::from_str(raw)
            .with_context(|| format!("parse startup command {raw}"))?;
        pipeline.apply_command(cmd);
    }

    let queue = Arc::new(FrameQueue::new(QUEUE_DEPTH));
    let reader = {
        let queue = queue.clone();
        let frame_bytes = args.frame_samples * channels as usize * 4;
        std::thread::Builder::new()
            .name("pcm-reader".to_string())
            .spawn(move || read_frames(queue, frame_bytes, channels, sample_rate))
            .context("spawn reader thread")?
    };

    run_driver(&mut pipeline, &queue)?;

    if let Err(e) = reader.join().unwrap_or(Ok(())) {
        tracing::warn!(error = ?e, "stdin reader ended with an error");
    }
    tracing::info!(
        session_id = %pipeline.session_id(),
        frames_in = pipeline.frames_in(),
        frames_skipped = pipeline.frames_skipped(),
        frames_dropped = queue.dropped(),
        "session finished"
    );
    Ok(())
}

/// Reads fixed-size f32le buffers from stdin into the hand-off queue until
/// EOF. A short trailing read still becomes a (shorter) frame.
fn read_frames(
    queue: Arc<FrameQueue>,
    frame_bytes: usize,
    channels: u8,
    sample_rate: u32,
) -> anyhow::Result<()> {
    let mut stdin = std::io::stdin().lock();
    let mut buf = vec![0u8; frame_bytes];
    let result = loop {
        let filled = match fill(&mut stdin, &mut buf) {
            Ok(n) => n,
            Err(e) => break Err(e).context("read stdin"),
        };
        if filled == 0 {
            break Ok(());
        }
        // Truncate a ragged tail to whole samples.
        let samples: Vec<f32> = buf[..filled - filled % 4]
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        queue.push(AudioFrame::new(samples, channels, sample_rate));
        if filled < buf.len() {
            break Ok(());
        }
    };
    queue.close();
    result
}

/// Reads until `buf` is full or the stream ends. Returns the byte count.
fn fill(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0usize;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Drains the queue through the pipeline, writing conditioned samples to
/// stdout as f32le. Buffer timestamps use a monotonic session clock.
fn run_driver(pipeline: &mut Pipeline, queue: &FrameQueue) -> anyhow::Result<()> {
    let epoch = Instant::now();
    let mut stdout = std::io::stdout().lock();
    let mut out_bytes: Vec<u8> = Vec::new();

    while let Some(frame) = queue.pop() {
        let now = epoch.elapsed().as_secs_f64();
        let Some(buffer) = pipeline.push_frame(frame, now) else {
            continue;
        };
        tracing::trace!(
            start_time = buffer.start_time,
            duration = buffer.duration_secs(),
            lead = pipeline.playout().lead(now),
            "scheduled buffer"
        );

        out_bytes.clear();
        out_bytes.reserve(buffer.samples.len() * 4);
        for s in &buffer.samples {
            out_bytes.extend_from_slice(&s.to_le_bytes());
        }
        stdout.write_all(&out_bytes).context("write stdout")?;
    }
    stdout.flush().context("flush stdout")?;
    Ok(())
}
