//! Impulse response generator — synthetic reverb tails from decaying noise.

use rand::Rng;

/// A multi-channel impulse response at a fixed sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpulseResponse {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl ImpulseResponse {
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Generate white noise under a `(n / L)^decay` envelope, where `n` counts
/// down from `L` to 1.
///
/// Each channel draws its own noise, so the channels are uncorrelated. A
/// higher `decay` makes the tail die away faster.
pub fn generate_impulse<R: Rng>(
    duration_seconds: f64,
    decay: f64,
    sample_rate: u32,
    channel_count: usize,
    rng: &mut R,
) -> ImpulseResponse {
    let length = (sample_rate as f64 * duration_seconds).round().max(0.0) as usize;
    let channels = (0..channel_count)
        .map(|_| {
            (0..length)
                .map(|i| {
                    let n = (length - i) as f64;
                    let envelope = (n / length as f64).powf(decay);
                    (rng.gen_range(-1.0..1.0) * envelope) as f32
                })
                .collect()
        })
        .collect();

    ImpulseResponse {
        sample_rate,
        channels,
    }
}
