use std::time::Instant;

/// One decoded PCM frame as handed over by the decoder collaborator.
///
/// Stereo frames are interleaved `L0,R0,L1,R1,...`. A zero-length sample
/// buffer means "decoder produced nothing yet" and is skipped downstream.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub samples: Vec<f32>,
    pub channels: u8,
    pub sample_rate: u32,
    pub arrived: Instant,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, channels: u8, sample_rate: u32) -> Self {
        Self {
            samples,
            channels,
            sample_rate,
            arrived: Instant::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of per-channel sample frames represented by this buffer.
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / self.sample_rate as f64
    }
}

/// Splits an interleaved stereo buffer into left/right channel sequences.
/// A trailing odd sample is dropped.
pub fn deinterleave(interleaved: &[f32]) -> (Vec<f32>, Vec<f32>) {
    let frames = interleaved.len() / 2;
    let mut left = Vec::with_capacity(frames);
    let mut right = Vec::with_capacity(frames);
    for pair in interleaved.chunks_exact(2) {
        left.push(pair[0]);
        right.push(pair[1]);
    }
    (left, right)
}

/// Merges two channel sequences back into interleaved stereo, truncating to
/// the shorter channel.
pub fn interleave(left: &[f32], right: &[f32]) -> Vec<f32> {
    let frames = left.len().min(right.len());
    let mut out = Vec::with_capacity(frames * 2);
    for i in 0..frames {
        out.push(left[i]);
        out.push(right[i]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stereo_round_trip_is_exact() {
        let l = [1.0f32, 2.0, 3.0];
        let r = [4.0f32, 5.0, 6.0];
        let inter = interleave(&l, &r);
        assert_eq!(inter, [1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
        let (l2, r2) = deinterleave(&inter);
        assert_eq!(l2, l);
        assert_eq!(r2, r);
    }

    #[test]
    fn deinterleave_drops_trailing_odd_sample() {
        let (l, r) = deinterleave(&[1.0, 2.0, 3.0]);
        assert_eq!(l, [1.0]);
        assert_eq!(r, [2.0]);
    }

    #[test]
    fn interleave_truncates_to_shorter_channel() {
        let out = interleave(&[1.0, 2.0], &[3.0]);
        assert_eq!(out, [1.0, 3.0]);
    }

    #[test]
    fn frame_duration_counts_per_channel_frames() {
        let f = AudioFrame::new(vec![0.0; 2400], 2, 12_000);
        assert_eq!(f.frame_count(), 1200);
        assert!((f.duration_secs() - 0.1).abs() < 1e-9);
    }
}
