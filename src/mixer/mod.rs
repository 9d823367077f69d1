//! Stereo Output Mixer
//!
//! Sums the per-channel left/right contributions of one output frame,
//! applies the anti-clip scale `0.6 / sqrt(channels)` and clamps the result
//! into the signed 16-bit range.

/// Accumulates one stereo frame at a time
#[derive(Debug, Clone)]
pub struct StereoMixer {
    channels: usize,
    gain: f64,
    left: f64,
    right: f64,
}

impl StereoMixer {
    /// Headroom factor shared by all channels before the `sqrt` spread
    const HEADROOM: f64 = 0.6;

    /// Create a mixer for `channels` voices
    pub fn new(channels: usize) -> Self {
        let voices = channels.max(1) as f64;
        StereoMixer {
            channels,
            gain: Self::HEADROOM / voices.sqrt(),
            left: 0.0,
            right: 0.0,
        }
    }

    /// Number of voices the gain was computed for
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Global scale applied to the summed frame
    pub fn gain(&self) -> f64 {
        self.gain
    }

    /// Add one channel's contribution to the current frame
    #[inline]
    pub fn add(&mut self, left: f64, right: f64) {
        self.left += left;
        self.right += right;
    }

    /// Scale, clamp and emit the current frame, then start a new one
    #[inline]
    pub fn finish(&mut self) -> (i16, i16) {
        let frame = (
            Self::to_pcm(self.left * self.gain),
            Self::to_pcm(self.right * self.gain),
        );
        self.left = 0.0;
        self.right = 0.0;
        frame
    }

    /// Round and clamp a scaled value to 16-bit PCM
    #[inline]
    pub fn to_pcm(value: f64) -> i16 {
        value
            .round()
            .clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gain_formula() {
        assert_relative_eq!(StereoMixer::new(4).gain(), 0.3);
        assert_relative_eq!(StereoMixer::new(1).gain(), 0.6);
        assert_relative_eq!(StereoMixer::new(32).gain(), 0.6 / 32f64.sqrt());
        assert_relative_eq!(StereoMixer::new(0).gain(), 0.6);
    }

    #[test]
    fn test_sum_and_reset() {
        let mut mixer = StereoMixer::new(4);
        mixer.add(1000.0, 0.0);
        mixer.add(1000.0, 500.0);
        assert_eq!(mixer.finish(), (600, 150));
        assert_eq!(mixer.finish(), (0, 0));
    }

    #[test]
    fn test_clamping() {
        let mut mixer = StereoMixer::new(1);
        for _ in 0..8 {
            mixer.add(32767.0, -32768.0);
        }
        assert_eq!(mixer.finish(), (i16::MAX, i16::MIN));
        assert_eq!(StereoMixer::to_pcm(f64::NAN), 0);
    }
}
