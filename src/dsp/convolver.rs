//! Convolution reverb — partitioned FFT convolution in two segments.
//!
//! The impulse response is split into partitions, each kept as a spectrum.
//! Every incoming block is transformed once and multiplied against the
//! history of previous input spectra (overlap-save). The head of the response
//! uses the render block size so there is no added latency; the long tail
//! uses blocks sixteen times larger, which cuts the per-sample cost of a
//! multi-second reverb by roughly the same factor.
//!
//! The response is normalized the way WebAudio's `ConvolverNode` does with
//! `normalize = true`, so the wet level does not depend on how loud the
//! generated noise happens to be.

use std::sync::Arc;

use realfft::num_complex::Complex32;
use realfft::{ComplexToReal, FftError, RealFftPlanner, RealToComplex};
use tracing::error;

use super::impulse::ImpulseResponse;

const GAIN_CALIBRATION: f32 = 0.00125;
const GAIN_CALIBRATION_SAMPLE_RATE: f32 = 44100.0;
const MIN_POWER: f32 = 0.000125;

/// Tail partitions are this many head blocks long.
const TAIL_BLOCKS: usize = 16;

/// Scale applied to an impulse response before loading it.
pub fn normalization_scale(ir: &ImpulseResponse) -> f32 {
    let channels = ir.channels.len();
    let length = ir.len();
    if channels == 0 || length == 0 {
        return 1.0;
    }

    let sum_sq: f64 = ir
        .channels
        .iter()
        .flat_map(|c| c.iter())
        .map(|&s| (s as f64) * (s as f64))
        .sum();
    let mut power = (sum_sq / (channels * length) as f64).sqrt() as f32;
    if !power.is_finite() || power < MIN_POWER {
        power = MIN_POWER;
    }

    let mut scale = GAIN_CALIBRATION / power;
    if ir.sample_rate > 0 {
        scale *= GAIN_CALIBRATION_SAMPLE_RATE / ir.sample_rate as f32;
    }
    if channels == 4 {
        scale *= 0.5;
    }
    scale
}

/// Uniformly partitioned overlap-save convolution at one block size.
struct Segment {
    block: usize,
    forward: Arc<dyn RealToComplex<f32>>,
    inverse: Arc<dyn ComplexToReal<f32>>,
    /// Spectra of the impulse partitions.
    partitions: Vec<Vec<Complex32>>,
    /// Ring of recent input spectra, newest at `head`.
    history: Vec<Vec<Complex32>>,
    head: usize,
    /// Sliding window: previous block followed by current block.
    window: Vec<f32>,
    fft_in: Vec<f32>,
    fft_out: Vec<f32>,
    accumulator: Vec<Complex32>,
}

impl Segment {
    fn new(planner: &mut RealFftPlanner<f32>, taps: &[f32], scale: f32, block: usize) -> Self {
        let fft_size = block * 2;
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);
        let bins = fft_size / 2 + 1;
        let mut fft_in = forward.make_input_vec();

        let partitions: Vec<Vec<Complex32>> = taps
            .chunks(block)
            .map(|chunk| {
                fft_in.fill(0.0);
                for (dst, &src) in fft_in.iter_mut().zip(chunk) {
                    *dst = src * scale;
                }
                let mut spectrum = forward.make_output_vec();
                if let Err(e) = forward.process(&mut fft_in, &mut spectrum) {
                    error!(error = %e, block, "impulse partition transform failed");
                    spectrum.fill(Complex32::new(0.0, 0.0));
                }
                spectrum
            })
            .collect();

        Self {
            block,
            history: vec![vec![Complex32::new(0.0, 0.0); bins]; partitions.len().max(1)],
            partitions,
            head: 0,
            window: vec![0.0; fft_size],
            fft_out: inverse.make_output_vec(),
            accumulator: vec![Complex32::new(0.0, 0.0); bins],
            forward,
            inverse,
            fft_in,
        }
    }

    /// Convolve exactly `block` samples in place.
    fn process(&mut self, samples: &mut [f32]) -> Result<(), FftError> {
        let block = self.block;
        if self.partitions.is_empty() {
            samples.fill(0.0);
            return Ok(());
        }

        self.window.copy_within(block.., 0);
        let n = samples.len().min(block);
        self.window[block..block + n].copy_from_slice(&samples[..n]);
        self.window[block + n..].fill(0.0);

        self.fft_in.copy_from_slice(&self.window);
        self.forward
            .process(&mut self.fft_in, &mut self.history[self.head])?;

        self.accumulator.fill(Complex32::new(0.0, 0.0));
        let count = self.partitions.len();
        for (p, partition) in self.partitions.iter().enumerate() {
            let x = &self.history[(self.head + count - p) % count];
            for ((acc, &a), &b) in self.accumulator.iter_mut().zip(x).zip(partition) {
                *acc += a * b;
            }
        }
        self.head = (self.head + 1) % count;

        // DC and Nyquist bins of a real signal carry no imaginary part.
        if let Some(first) = self.accumulator.first_mut() {
            first.im = 0.0;
        }
        if let Some(last) = self.accumulator.last_mut() {
            last.im = 0.0;
        }
        self.inverse.process(&mut self.accumulator, &mut self.fft_out)?;

        let norm = 1.0 / (2 * block) as f32;
        for (dst, &src) in samples.iter_mut().zip(&self.fft_out[block..]) {
            *dst = src * norm;
        }
        Ok(())
    }
}

/// The late part of the response, run at a larger block size.
///
/// Input is collected for a whole tail block; the result covers the next
/// tail block of output and is read out one small block at a time.
struct Tail {
    segment: Segment,
    input: Vec<f32>,
    output: Vec<f32>,
    fill: usize,
}

struct ChannelConvolver {
    head: Segment,
    tail: Option<Tail>,
}

/// A stereo convolver fed in fixed-size blocks.
pub struct Convolver {
    block: usize,
    channels: Vec<ChannelConvolver>,
}

impl Convolver {
    /// Load a normalized impulse response for blocks of `block` frames.
    ///
    /// A mono response is used for both channels; otherwise channel 0 feeds
    /// left and channel 1 feeds right. The first `block * TAIL_BLOCKS` taps
    /// are convolved block by block, the rest in tail-sized blocks.
    pub fn new(ir: &ImpulseResponse, block: usize) -> Self {
        let block = block.max(1);
        let tail_block = block * TAIL_BLOCKS;
        let scale = normalization_scale(ir);
        let mut planner = RealFftPlanner::<f32>::new();

        let channels = (0..2)
            .map(|ch| {
                let taps: &[f32] = ir
                    .channels
                    .get(ch)
                    .or_else(|| ir.channels.first())
                    .map_or(&[], Vec::as_slice);
                let split = taps.len().min(tail_block);

                let head = Segment::new(&mut planner, &taps[..split], scale, block);
                let tail = (taps.len() > split).then(|| Tail {
                    segment: Segment::new(&mut planner, &taps[split..], scale, tail_block),
                    input: vec![0.0; tail_block],
                    output: vec![0.0; tail_block],
                    fill: 0,
                });
                ChannelConvolver { head, tail }
            })
            .collect();

        Self { block, channels }
    }

    pub fn block_size(&self) -> usize {
        self.block
    }

    /// Number of impulse partitions per channel, head and tail together.
    pub fn partition_count(&self) -> usize {
        let channel = &self.channels[0];
        channel.head.partitions.len()
            + channel.tail.as_ref().map_or(0, |t| t.segment.partitions.len())
    }

    /// Convolve one stereo block in place. Both slices must hold exactly
    /// [`Self::block_size`] frames.
    pub fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        debug_assert_eq!(left.len(), self.block);
        debug_assert_eq!(right.len(), self.block);
        for (channel, samples) in self.channels.iter_mut().zip([left, right]) {
            if let Err(e) = channel.process(samples) {
                error!(error = %e, "convolution failed; block silenced");
                samples.fill(0.0);
            }
        }
    }
}

impl ChannelConvolver {
    fn process(&mut self, samples: &mut [f32]) -> Result<(), FftError> {
        let Some(tail) = self.tail.as_mut() else {
            return self.head.process(samples);
        };

        let n = samples.len();
        let range = tail.fill..tail.fill + n;
        tail.input[range.clone()].copy_from_slice(samples);
        self.head.process(samples)?;
        for (dst, &late) in samples.iter_mut().zip(&tail.output[range]) {
            *dst += late;
        }

        tail.fill += n;
        if tail.fill >= tail.input.len() {
            tail.output.copy_from_slice(&tail.input);
            tail.segment.process(&mut tail.output)?;
            tail.fill = 0;
        }
        Ok(())
    }
}
