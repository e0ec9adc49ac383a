//! Delay lines — a ring buffer with fractional reads, and the echo send.

/// Fixed echo time of the delay send.
pub const ECHO_SECONDS: f64 = 0.3;
/// Longest delay the echo line can hold.
pub const ECHO_MAX_SECONDS: f64 = 1.0;

/// A mono circular buffer read at fractional delays.
#[derive(Debug, Clone)]
pub struct DelayBuffer {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl DelayBuffer {
    /// Buffer able to hold `max_delay_samples` of history.
    pub fn new(max_delay_samples: usize) -> Self {
        Self {
            buffer: vec![0.0; max_delay_samples + 2],
            write_pos: 0,
        }
    }

    pub fn max_delay(&self) -> f64 {
        (self.buffer.len() - 2) as f64
    }

    /// Push a sample, then return the sample written `delay_samples` ago.
    ///
    /// A delay of zero returns the input itself.
    #[inline]
    pub fn tick(&mut self, input: f32, delay_samples: f64) -> f32 {
        self.buffer[self.write_pos] = input;
        let out = self.read_interpolated(delay_samples);
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
        out
    }

    #[inline]
    fn read_interpolated(&self, delay_samples: f64) -> f32 {
        let buffer_len = self.buffer.len();
        let delay_samples = delay_samples.clamp(0.0, self.max_delay());
        let delay_int = delay_samples as usize;
        let frac = (delay_samples - delay_int as f64) as f32;

        let read_pos_0 = (self.write_pos + buffer_len - delay_int) % buffer_len;
        let read_pos_1 = (read_pos_0 + buffer_len - 1) % buffer_len;

        let s0 = self.buffer[read_pos_0];
        let s1 = self.buffer[read_pos_1];

        // Linear interpolation toward the older sample
        s0 + frac * (s1 - s0)
    }
}

/// A stereo, feedback-free delay: output is the input `delay_time` ago.
///
/// The echo send's level lives in the gain stage after it, so this node is
/// a pure delay.
#[derive(Debug, Clone)]
pub struct Delay {
    left: DelayBuffer,
    right: DelayBuffer,
    sample_rate: f64,
    /// Delay time in seconds.
    pub delay_time: f64,
}

impl Delay {
    /// Create a delay line.
    ///
    /// # Arguments
    /// - `sample_rate`: Audio sample rate in Hz.
    /// - `max_delay_seconds`: Maximum supported delay time.
    /// - `delay_time`: Initial delay in seconds, clamped to the maximum.
    pub fn new(sample_rate: f64, max_delay_seconds: f64, delay_time: f64) -> Self {
        let capacity = (sample_rate * max_delay_seconds).ceil() as usize;
        Self {
            left: DelayBuffer::new(capacity),
            right: DelayBuffer::new(capacity),
            sample_rate,
            delay_time: delay_time.clamp(0.0, max_delay_seconds),
        }
    }

    /// Delay a block of stereo audio in place.
    pub fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        let delay_samples = self.delay_time * self.sample_rate;
        for s in left.iter_mut() {
            *s = self.left.tick(*s, delay_samples);
        }
        for s in right.iter_mut() {
            *s = self.right.tick(*s, delay_samples);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_delay_passes_through() {
        let mut buf = DelayBuffer::new(16);
        assert_eq!(buf.tick(0.5, 0.0), 0.5);
        assert_eq!(buf.tick(-0.25, 0.0), -0.25);
    }

    #[test]
    fn fractional_read_interpolates() {
        let mut buf = DelayBuffer::new(16);
        buf.tick(1.0, 0.0);
        buf.tick(0.0, 0.0);
        // Delay 1.5 samples: halfway between the 0.0 written at t-1 and
        // the 1.0 written at t-2.
        let out = buf.tick(0.0, 1.5);
        assert!((out - 0.5).abs() < 1e-6);
    }

    #[test]
    fn impulse_appears_after_delay_time() {
        let sample_rate = 1000.0;
        let mut delay = Delay::new(sample_rate, ECHO_MAX_SECONDS, ECHO_SECONDS);
        let n = 400;
        let mut left = vec![0.0f32; n];
        left[0] = 1.0;
        let mut right = left.clone();
        delay.process_block(&mut left, &mut right);

        let delay_samples = (ECHO_SECONDS * sample_rate) as usize;
        for (i, &s) in left.iter().enumerate() {
            let expected = if i == delay_samples { 1.0 } else { 0.0 };
            assert!((s - expected).abs() < 1e-6, "sample {i}: {s}");
        }
        assert_eq!(left, right);
    }

    #[test]
    fn no_feedback_single_echo() {
        let mut delay = Delay::new(1000.0, 1.0, 0.01);
        let mut left = vec![0.0f32; 100];
        left[0] = 1.0;
        let mut right = left.clone();
        delay.process_block(&mut left, &mut right);
        let echoes = left.iter().filter(|s| s.abs() > 1e-6).count();
        assert_eq!(echoes, 1);
    }

    #[test]
    fn delay_time_is_clamped() {
        let delay = Delay::new(1000.0, 1.0, 5.0);
        assert_eq!(delay.delay_time, 1.0);
    }
}
