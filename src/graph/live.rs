//! Live effect graph — the running preview pulled by the audio callback.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::PlayerConfig;
use crate::controls::{ControlState, NodeWrite, Param, writes_for};
use crate::dsp::impulse::generate_impulse;
use crate::dsp::source::BufferSource;
use crate::error::PlayerError;
use crate::track::Track;

use super::builder::{BuildOptions, GraphHandles, build_description};
use super::processor::{Processor, ProcessorSettings};

/// The stateful graph bound to the loaded track.
///
/// Renders in fixed quanta internally; [`EffectGraph::process`] serves any
/// host buffer length from the leftover of the last quantum.
pub struct EffectGraph {
    processor: Processor,
    handles: GraphHandles,
    /// Frames of the current quantum already handed out.
    read_pos: usize,
}

impl EffectGraph {
    /// Build the full live topology for `track`, rendering at
    /// `output_sample_rate`, with gains taken from `controls`.
    pub fn build(
        track: Arc<Track>,
        controls: &ControlState,
        config: &PlayerConfig,
        output_sample_rate: f64,
    ) -> Result<Self, PlayerError> {
        let mut rng = match config.impulse_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::build_with_rng(track, controls, config, output_sample_rate, &mut rng)
    }

    pub fn build_with_rng<R: Rng>(
        track: Arc<Track>,
        controls: &ControlState,
        config: &PlayerConfig,
        output_sample_rate: f64,
        rng: &mut R,
    ) -> Result<Self, PlayerError> {
        let impulse = generate_impulse(
            config.impulse_seconds,
            config.impulse_decay,
            output_sample_rate.round() as u32,
            2,
            rng,
        );
        let options = BuildOptions {
            chorus: config.live_chorus,
            impulse: Some(Arc::new(impulse)),
            analysis_tap: true,
        };
        let (description, handles) = build_description(&controls.levels(), &options);
        let settings = ProcessorSettings {
            sample_rate: output_sample_rate,
            block_size: config.block_size,
            fft_size: config.fft_size,
            smoothing: config.smoothing_time_constant,
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
        };
        let mut processor = Processor::new(&description, track, &settings)?;
        processor.apply(NodeWrite::PlaybackRate(controls.effective_rate()));

        debug!(
            chorus = ?config.live_chorus,
            sample_rate = output_sample_rate,
            "live graph built"
        );

        Ok(Self {
            read_pos: processor.block_size(),
            processor,
            handles,
        })
    }

    pub fn handles(&self) -> &GraphHandles {
        &self.handles
    }

    pub fn sample_rate(&self) -> f64 {
        self.processor.sample_rate()
    }

    /// Push a control change into the running nodes.
    pub fn set_param(&mut self, param: Param, controls: &ControlState) {
        for write in writes_for(param, controls) {
            debug!(?write, "param write");
            self.processor.apply(write);
        }
    }

    pub fn apply(&mut self, write: NodeWrite) {
        self.processor.apply(write);
    }

    pub fn source(&self) -> &BufferSource {
        self.processor.source()
    }

    pub fn source_mut(&mut self) -> &mut BufferSource {
        self.processor.source_mut()
    }

    pub fn processor(&self) -> &Processor {
        &self.processor
    }

    /// Current spectrum from the analysis tap.
    pub fn byte_frequency_data(&mut self) -> Vec<u8> {
        self.processor
            .analyser_mut()
            .map(|a| a.byte_frequency_data())
            .unwrap_or_default()
    }

    /// Fill host output buffers. The graph keeps running while paused so
    /// reverb and echo tails ring out.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        let frames = left.len().min(right.len());
        let block = self.processor.block_size();
        let mut written = 0;

        while written < frames {
            if self.read_pos >= block {
                self.processor.render_quantum();
                self.read_pos = 0;
            }
            let n = (block - self.read_pos).min(frames - written);
            let (out_l, out_r) = self.processor.output();
            left[written..written + n].copy_from_slice(&out_l[self.read_pos..self.read_pos + n]);
            right[written..written + n].copy_from_slice(&out_r[self.read_pos..self.read_pos + n]);
            self.read_pos += n;
            written += n;
        }
    }
}
