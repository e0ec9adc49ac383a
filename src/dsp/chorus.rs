//! Chorus voices — short delay lines swept by their own sine LFO.
//!
//! A voice outputs only the delayed copy; the dry signal and the chorus level
//! are handled by the gain stages around it.

use std::f64::consts::PI;

use super::delay::DelayBuffer;
use crate::config::ChorusQuality;

/// Longest delay a chorus voice can reach (base + depth).
pub const CHORUS_MAX_DELAY_SECONDS: f64 = 0.05;

/// Static settings of one voice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceParams {
    /// Center delay in seconds.
    pub delay: f64,
    /// LFO rate in Hz.
    pub rate: f64,
    /// Modulation depth in seconds.
    pub depth: f64,
}

const ENSEMBLE: [VoiceParams; 3] = [
    VoiceParams {
        delay: 0.015,
        rate: 0.3,
        depth: 0.003,
    },
    VoiceParams {
        delay: 0.025,
        rate: 0.7,
        depth: 0.004,
    },
    VoiceParams {
        delay: 0.035,
        rate: 1.1,
        depth: 0.002,
    },
];

const SINGLE: [VoiceParams; 1] = [VoiceParams {
    delay: 0.02,
    rate: 0.5,
    depth: 0.005,
}];

impl ChorusQuality {
    pub fn voices(self) -> &'static [VoiceParams] {
        match self {
            ChorusQuality::Single => &SINGLE,
            ChorusQuality::Ensemble => &ENSEMBLE,
        }
    }
}

/// One stereo chorus voice with a free-running LFO.
///
/// The LFO starts at construction and keeps advancing on every processed
/// sample, whatever the chorus level downstream.
#[derive(Debug, Clone)]
pub struct ChorusVoice {
    left: DelayBuffer,
    right: DelayBuffer,
    sample_rate: f64,
    phase: f64,
    pub params: VoiceParams,
}

impl ChorusVoice {
    pub fn new(sample_rate: f64, params: VoiceParams) -> Self {
        let capacity = (sample_rate * CHORUS_MAX_DELAY_SECONDS).ceil() as usize;
        Self {
            left: DelayBuffer::new(capacity),
            right: DelayBuffer::new(capacity),
            sample_rate,
            phase: 0.0,
            params,
        }
    }

    /// Current LFO phase in cycles, [0, 1).
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Replace a stereo block with its modulated, delayed copy.
    pub fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        let phase_inc = self.params.rate / self.sample_rate;
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let lfo = (2.0 * PI * self.phase).sin();
            let delay = (self.params.delay + self.params.depth * lfo)
                .clamp(0.0, CHORUS_MAX_DELAY_SECONDS)
                * self.sample_rate;

            *l = self.left.tick(*l, delay);
            *r = self.right.tick(*r, delay);

            self.phase = (self.phase + phase_inc) % 1.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_match_voice_tables() {
        assert_eq!(ChorusQuality::Ensemble.voices().len(), 3);
        assert_eq!(ChorusQuality::Single.voices().len(), 1);
        let rates: Vec<f64> = ChorusQuality::Ensemble.voices().iter().map(|v| v.rate).collect();
        assert_eq!(rates, vec![0.3, 0.7, 1.1]);
        for v in ChorusQuality::Ensemble
            .voices()
            .iter()
            .chain(ChorusQuality::Single.voices())
        {
            assert!(v.delay + v.depth <= CHORUS_MAX_DELAY_SECONDS);
        }
    }

    #[test]
    fn output_is_delayed_copy() {
        let sr = 8000.0;
        let mut voice = ChorusVoice::new(sr, ENSEMBLE[0]);
        let mut left = vec![0.0f32; 400];
        left[0] = 1.0;
        let mut right = left.clone();
        voice.process_block(&mut left, &mut right);

        // Impulse lands near the 15 ms base delay (120 samples), within depth.
        let peak = left
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(i, _)| i)
            .unwrap();
        assert!((96..=144).contains(&peak), "peak at {peak}");
        assert!(left[..90].iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn lfo_free_runs() {
        let sr = 1000.0;
        let mut voice = ChorusVoice::new(sr, SINGLE[0]);
        let mut left = vec![0.0f32; 500];
        let mut right = left.clone();
        voice.process_block(&mut left, &mut right);
        // 0.5 Hz for 0.5 s = a quarter cycle
        assert!((voice.phase() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn output_bounded() {
        let mut voice = ChorusVoice::new(44100.0, ENSEMBLE[1]);
        let mut left: Vec<f32> = (0..4096).map(|i| (i as f32 * 0.05).sin()).collect();
        let mut right = left.clone();
        voice.process_block(&mut left, &mut right);
        assert!(left.iter().all(|s| s.abs() <= 1.0 + 1e-6));
    }
}
