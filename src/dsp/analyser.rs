//! Analyser tap — matches WebAudio `AnalyserNode::getByteFrequencyData`.
//!
//! A pass-through node that keeps the last `fft_size` mono samples. Reading
//! the spectrum windows them (Blackman), transforms, scales by 1/N, smooths
//! against the previous reading and maps decibels onto 0..255.

use std::f64::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

pub struct Analyser {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    ring: Vec<f32>,
    write_pos: usize,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    smoothing: f32,
    min_decibels: f64,
    max_decibels: f64,
    /// New samples arrived since the last analysis.
    fresh: bool,
}

impl Analyser {
    pub fn new(fft_size: usize, smoothing: f64, min_decibels: f64, max_decibels: f64) -> Self {
        let fft_size = fft_size.max(2);
        let fft = FftPlanner::<f32>::new().plan_fft_forward(fft_size);

        // Blackman window, alpha = 0.16
        let window = (0..fft_size)
            .map(|i| {
                let x = i as f64 / fft_size as f64;
                (0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()) as f32
            })
            .collect();

        Self {
            fft,
            fft_size,
            ring: vec![0.0; fft_size],
            write_pos: 0,
            window,
            smoothed: vec![0.0; fft_size / 2],
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
            smoothing: smoothing.clamp(0.0, 1.0) as f32,
            min_decibels,
            max_decibels,
            fresh: false,
        }
    }

    /// Number of spectrum bins (half the transform size).
    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Record a stereo block. The block itself passes through untouched.
    pub fn push_block(&mut self, left: &[f32], right: &[f32]) {
        for (&l, &r) in left.iter().zip(right) {
            self.ring[self.write_pos] = 0.5 * (l + r);
            self.write_pos = (self.write_pos + 1) % self.fft_size;
        }
        self.fresh = true;
    }

    /// Current spectrum as bytes, one per bin.
    ///
    /// Reading twice without new audio in between returns the same frame
    /// instead of smoothing it again.
    pub fn byte_frequency_data(&mut self) -> Vec<u8> {
        if self.fresh {
            self.analyse();
            self.fresh = false;
        }

        let range = self.max_decibels - self.min_decibels;
        self.smoothed
            .iter()
            .map(|&m| {
                let db = if m > 0.0 {
                    20.0 * (m as f64).log10()
                } else {
                    f64::NEG_INFINITY
                };
                let scaled = 255.0 * (db - self.min_decibels) / range;
                scaled.clamp(0.0, 255.0) as u8
            })
            .collect()
    }

    fn analyse(&mut self) {
        // Oldest sample first.
        for i in 0..self.fft_size {
            let sample = self.ring[(self.write_pos + i) % self.fft_size];
            self.scratch[i] = Complex::new(sample * self.window[i], 0.0);
        }
        self.fft.process(&mut self.scratch);

        let scale = 1.0 / self.fft_size as f32;
        let k = self.smoothing;
        for (smoothed, bin) in self.smoothed.iter_mut().zip(&self.scratch) {
            let magnitude = bin.norm() * scale;
            let next = k * *smoothed + (1.0 - k) * magnitude;
            *smoothed = if next.is_finite() { next } else { 0.0 };
        }
    }
}
