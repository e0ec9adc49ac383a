//! Visualizer feed — one spectrum frame per animation tick.
//!
//! With a live graph the frame is the analyser's byte spectrum. With no
//! track loaded an idle pattern keeps the bars moving: two slow sinusoids
//! swept across the bins plus a little jitter.

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;

use crate::graph::EffectGraph;

/// Per-bin magnitudes, 0..=255.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpectrumFrame {
    pub bins: Vec<u8>,
    /// False when the frame is the idle pattern.
    pub live: bool,
}

/// Synthetic frame for time `now_ms`.
pub fn idle_frame<R: Rng>(now_ms: f64, bins: usize, rng: &mut R) -> Vec<u8> {
    let t = now_ms * 0.002;
    (0..bins)
        .map(|i| {
            let n = i as f64 / bins as f64;
            let base = ((t + n * 6.0).sin() + 1.0) / 2.0;
            let modulation = ((t * 0.3 + n * 20.0).sin() + 1.0) / 2.0;
            let jitter: f64 = rng.gen_range(0.0..1.0);
            let value = 0.7 * base + 0.3 * modulation + 0.15 * jitter;
            (value * 255.0).clamp(0.0, 255.0) as u8
        })
        .collect()
}

pub struct SpectrumFeed {
    idle_bins: usize,
    rng: StdRng,
}

impl SpectrumFeed {
    pub fn new(idle_bins: usize) -> Self {
        Self {
            idle_bins,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(idle_bins: usize, seed: u64) -> Self {
        Self {
            idle_bins,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Next frame: the live spectrum if a graph is running, else the idle
    /// pattern.
    pub fn next_frame(&mut self, now_ms: f64, graph: Option<&mut EffectGraph>) -> SpectrumFrame {
        match graph {
            Some(graph) => SpectrumFrame {
                bins: graph.byte_frequency_data(),
                live: true,
            },
            None => SpectrumFrame {
                bins: idle_frame(now_ms, self.idle_bins, &mut self.rng),
                live: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_frame_has_configured_bins() {
        let mut feed = SpectrumFeed::with_seed(64, 1);
        let frame = feed.next_frame(0.0, None);
        assert_eq!(frame.bins.len(), 64);
        assert!(!frame.live);
    }

    #[test]
    fn idle_pattern_moves_over_time() {
        let mut rng = StdRng::seed_from_u64(8);
        let a = idle_frame(0.0, 64, &mut rng);
        let b = idle_frame(500.0, 64, &mut rng);
        assert_ne!(a, b);
        // Never silent: base and modulation can't both be zero at every bin.
        assert!(a.iter().any(|&v| v > 0));
    }

    #[test]
    fn idle_pattern_follows_the_formula() {
        struct Zero;
        impl rand::RngCore for Zero {
            fn next_u32(&mut self) -> u32 {
                0
            }
            fn next_u64(&mut self) -> u64 {
                0
            }
            fn fill_bytes(&mut self, dest: &mut [u8]) {
                dest.fill(0);
            }
            fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
                dest.fill(0);
                Ok(())
            }
        }

        let frame = idle_frame(0.0, 4, &mut Zero);
        // t = 0, bin 0: base = 0.5, mod = 0.5, jitter = 0
        assert_eq!(frame[0], 127);
        let n = 0.25f64;
        let base = ((n * 6.0).sin() + 1.0) / 2.0;
        let modulation = ((n * 20.0).sin() + 1.0) / 2.0;
        assert_eq!(frame[1], ((0.7 * base + 0.3 * modulation) * 255.0) as u8);
    }

    #[test]
    fn saturates_instead_of_wrapping() {
        // With maximal jitter the sum can exceed 1.0; it must clamp at 255.
        struct Max;
        impl rand::RngCore for Max {
            fn next_u32(&mut self) -> u32 {
                u32::MAX
            }
            fn next_u64(&mut self) -> u64 {
                u64::MAX
            }
            fn fill_bytes(&mut self, dest: &mut [u8]) {
                dest.fill(0xFF);
            }
            fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
                dest.fill(0xFF);
                Ok(())
            }
        }
        // At t where both sinusoids peak near bin 0, value > 1.
        let now_ms = std::f64::consts::FRAC_PI_2 / 0.002;
        let frame = idle_frame(now_ms, 64, &mut Max);
        assert!(frame.iter().any(|&b| b == 255));
    }
}
