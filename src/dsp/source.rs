//! Buffer source — plays a decoded [`Track`] at a variable rate.
//!
//! Works like WebAudio's `AudioBufferSourceNode` with a mutable
//! `playbackRate`: speed and pitch share one rate, so pitching up also
//! speeds up. Reads between samples are linearly interpolated.

use std::sync::Arc;

use crate::track::Track;

#[derive(Debug, Clone)]
pub struct BufferSource {
    track: Arc<Track>,
    /// Read position in source frames.
    position: f64,
    rate: f64,
    /// Source frames advanced per output frame at rate 1.
    sample_rate_ratio: f64,
    gain: f32,
    playing: bool,
    looping: bool,
    ended: bool,
}

impl BufferSource {
    /// A stopped source at position zero, rendering at `output_sample_rate`.
    pub fn new(track: Arc<Track>, output_sample_rate: f64) -> Self {
        let sample_rate_ratio = if output_sample_rate > 0.0 {
            track.sample_rate() as f64 / output_sample_rate
        } else {
            1.0
        };
        Self {
            track,
            position: 0.0,
            rate: 1.0,
            sample_rate_ratio,
            gain: 1.0,
            playing: false,
            looping: false,
            ended: false,
        }
    }

    pub fn track(&self) -> &Arc<Track> {
        &self.track
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn set_rate(&mut self, rate: f64) {
        if rate.is_finite() && rate > 0.0 {
            self.rate = rate;
        }
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain.max(0.0);
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn play(&mut self) {
        if self.position >= self.track.frames() as f64 {
            self.position = 0.0;
        }
        self.playing = true;
        self.ended = false;
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Position in source seconds.
    pub fn position_seconds(&self) -> f64 {
        self.position / self.track.sample_rate() as f64
    }

    /// Jump to a source time, clamped to the track.
    pub fn seek_seconds(&mut self, seconds: f64) {
        let seconds = if seconds.is_finite() { seconds } else { 0.0 };
        let frame = seconds * self.track.sample_rate() as f64;
        self.position = frame.clamp(0.0, self.track.frames() as f64);
    }

    /// True once after playback runs off the end without looping.
    pub fn take_ended(&mut self) -> bool {
        std::mem::take(&mut self.ended)
    }

    /// Render a block. Frames after the end (or while paused) are silent.
    pub fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        left.fill(0.0);
        right.fill(0.0);
        if !self.playing {
            return;
        }

        let (src_l, src_r) = self.track.stereo();
        let frames = src_l.len() as f64;
        let step = self.rate * self.sample_rate_ratio;

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            if self.position >= frames {
                if self.looping && frames > 0.0 {
                    self.position %= frames;
                } else {
                    self.position = frames;
                    self.playing = false;
                    self.ended = true;
                    return;
                }
            }
            *l = read_interpolated(src_l, self.position) * self.gain;
            *r = read_interpolated(src_r, self.position) * self.gain;
            self.position += step;
        }
    }
}

fn read_interpolated(data: &[f32], position: f64) -> f32 {
    if data.is_empty() || position < 0.0 {
        return 0.0;
    }

    let idx = position as usize;
    if idx >= data.len() - 1 {
        return data.get(idx).copied().unwrap_or(0.0);
    }

    let frac = (position - idx as f64) as f32;
    data[idx] * (1.0 - frac) + data[idx + 1] * frac
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_track(frames: usize, sample_rate: u32) -> Arc<Track> {
        let data: Vec<f32> = (0..frames).map(|i| i as f32 / frames as f32).collect();
        Arc::new(Track::from_channels(sample_rate, vec![data]).unwrap())
    }

    #[test]
    fn paused_source_is_silent() {
        let mut src = BufferSource::new(ramp_track(100, 1000), 1000.0);
        let mut l = vec![1.0f32; 16];
        let mut r = vec![1.0f32; 16];
        src.process_block(&mut l, &mut r);
        assert!(l.iter().chain(&r).all(|&s| s == 0.0));
        assert_eq!(src.position_seconds(), 0.0);
    }

    #[test]
    fn half_rate_interpolates() {
        let mut src = BufferSource::new(ramp_track(100, 1000), 1000.0);
        src.set_rate(0.5);
        src.play();
        let mut l = vec![0.0f32; 4];
        let mut r = vec![0.0f32; 4];
        src.process_block(&mut l, &mut r);
        assert!((l[1] - 0.005).abs() < 1e-6);
        assert!((l[2] - 0.01).abs() < 1e-6);
        assert_eq!(l, r, "mono tracks play on both channels");
        assert!((src.position_seconds() - 0.002).abs() < 1e-9);
    }

    #[test]
    fn stops_and_flags_end() {
        let mut src = BufferSource::new(ramp_track(10, 1000), 1000.0);
        src.play();
        let mut l = vec![0.0f32; 16];
        let mut r = vec![0.0f32; 16];
        src.process_block(&mut l, &mut r);
        assert!(!src.is_playing());
        assert!(src.take_ended());
        assert!(!src.take_ended());
        assert!(l[10..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn looping_wraps() {
        let mut src = BufferSource::new(ramp_track(10, 1000), 1000.0);
        src.set_looping(true);
        src.play();
        let mut l = vec![0.0f32; 15];
        let mut r = vec![0.0f32; 15];
        src.process_block(&mut l, &mut r);
        assert!(src.is_playing());
        assert_eq!(l[10], l[0]);
        assert!((src.position_seconds() - 0.005).abs() < 1e-9);
    }

    #[test]
    fn seek_clamps_and_replays_from_start_after_end() {
        let mut src = BufferSource::new(ramp_track(1000, 1000), 1000.0);
        src.seek_seconds(5.0);
        assert_eq!(src.position_seconds(), 1.0);
        src.seek_seconds(-1.0);
        assert_eq!(src.position_seconds(), 0.0);
        src.seek_seconds(1.0);
        src.play();
        assert_eq!(src.position_seconds(), 0.0);
    }

    #[test]
    fn resamples_to_output_rate() {
        let mut src = BufferSource::new(ramp_track(1000, 2000), 1000.0);
        src.play();
        let mut l = vec![0.0f32; 10];
        let mut r = vec![0.0f32; 10];
        src.process_block(&mut l, &mut r);
        // Ten output frames at half the source rate cover 20 source frames.
        assert!((src.position_seconds() - 0.01).abs() < 1e-9);
    }
}
