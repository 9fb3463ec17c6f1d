use proptest::prelude::*;
use skywave_core::config::PipelineConfig;
use skywave_core::frame::{deinterleave, interleave, AudioFrame};
use skywave_core::pipeline::Pipeline;
use skywave_core::protocol::ClientCommand;

fn config_from_json(raw: &str) -> PipelineConfig {
    let cfg: PipelineConfig = serde_json::from_str(raw).expect("parse test config");
    cfg.validate().expect("validate test config");
    cfg
}

#[test]
fn json_configured_pipeline_with_everything_off_is_identity() {
    let cfg = config_from_json(r#"{"gate":{"enabled":false},"agc":{"mode":4}}"#);
    let mut pipeline = Pipeline::new(cfg).expect("build pipeline");

    let samples: Vec<f32> = (0..6000).map(|i| ((i as f32) * 0.011).sin() * 0.4).collect();
    let mut now = 0.0;
    for chunk in samples.chunks(1200) {
        let out = pipeline
            .push_frame(AudioFrame::new(chunk.to_vec(), 1, 12_000), now)
            .expect("non-empty frame");
        assert_eq!(out.samples, chunk, "disabled stages must not alter audio");
        now += 0.1;
    }
}

#[test]
fn full_chain_output_stays_finite_and_bounded() {
    let cfg = config_from_json(
        r#"{
            "blanker": {"blanker_enabled": true, "reduction_enabled": true},
            "gate": {"enabled": true, "preset": "aggressive"},
            "agc": {"mode": 1}
        }"#,
    );
    let mut pipeline = Pipeline::new(cfg).expect("build pipeline");

    let mut now = 0.0;
    for block in 0..20 {
        let samples: Vec<f32> = (0..1200)
            .map(|i| {
                let t = (block * 1200 + i) as f32;
                // Tone plus a periodic impulse to exercise the blanker.
                let mut s = 0.3 * (t * 0.05).sin();
                if i % 400 == 0 {
                    s += 2.0;
                }
                s
            })
            .collect();
        let out = pipeline
            .push_frame(AudioFrame::new(samples, 1, 12_000), now)
            .expect("non-empty frame");
        for v in &out.samples {
            assert!(v.is_finite(), "pipeline produced a non-finite sample");
            assert!(v.abs() <= 0.95, "AGC limiter must bound the output, got {v}");
        }
        now += 0.1;
    }
}

#[test]
fn stereo_stream_round_trips_through_the_pipeline() {
    let cfg = config_from_json(r#"{"channels": 2}"#);
    let mut pipeline = Pipeline::new(cfg).expect("build pipeline");

    let left: Vec<f32> = (0..600).map(|i| (i as f32 * 0.02).sin() * 0.2).collect();
    let right: Vec<f32> = (0..600).map(|i| (i as f32 * 0.03).cos() * 0.2).collect();
    let out = pipeline
        .push_frame(AudioFrame::new(interleave(&left, &right), 2, 12_000), 0.0)
        .expect("non-empty frame");

    // Blanker off by default, gate and AGC bypassed for stereo.
    let (out_left, out_right) = deinterleave(&out.samples);
    assert_eq!(out_left, left);
    assert_eq!(out_right, right);
}

#[test]
fn commands_reconfigure_a_running_session() {
    let cfg = config_from_json("{}");
    let mut pipeline = Pipeline::new(cfg).expect("build pipeline");

    for raw in [
        r#"{"cmd":"noise_gate_preset","preset":"cw"}"#,
        r#"{"cmd":"agc","mode":4}"#,
        r#"{"cmd":"noise_gate","enabled":false}"#,
        r#"{"cmd":"buffer_delay","limit":1.0,"threshold":0.3}"#,
        r#"{"cmd":"channels","channels":2}"#,
    ] {
        let cmd: ClientCommand = serde_json::from_str(raw).expect("parse command");
        pipeline.apply_command(cmd);
    }

    assert_eq!(pipeline.channels(), 2);
    assert_eq!(pipeline.playout().buffer_limit(), 1.0);
    assert_eq!(pipeline.playout().buffer_threshold(), 0.3);

    // Gate and AGC now disabled: stereo audio passes bit-exact.
    let samples: Vec<f32> = (0..2400).map(|i| (i as f32 * 0.04).sin() * 0.1).collect();
    let out = pipeline
        .push_frame(AudioFrame::new(samples.clone(), 2, 12_000), 0.0)
        .expect("non-empty frame");
    assert_eq!(out.samples, samples);
}

proptest! {
    #[test]
    fn deinterleave_interleave_round_trips(raw in prop::collection::vec(-1.0f32..1.0, 0..512)) {
        let even = &raw[..raw.len() - raw.len() % 2];
        let (left, right) = deinterleave(even);
        prop_assert_eq!(interleave(&left, &right), even);
    }

    #[test]
    fn arbitrary_audio_never_breaks_the_default_pipeline(
        samples in prop::collection::vec(-4.0f32..4.0, 1..4096),
    ) {
        let mut pipeline = Pipeline::new(PipelineConfig::default()).expect("build pipeline");
        let out = pipeline
            .push_frame(AudioFrame::new(samples, 1, 12_000), 0.0)
            .expect("non-empty frame");
        for v in &out.samples {
            prop_assert!(v.is_finite());
            prop_assert!(v.abs() <= 0.95);
        }
    }
}
