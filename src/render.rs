//! Offline renderer — runs the effect graph over a whole track for export.
//!
//! Each job builds its own graph from a snapshot of the controls, so an
//! export never disturbs the live preview and the sliders can keep moving
//! while it runs.

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info};

use crate::config::{ChorusQuality, PlayerConfig};
use crate::controls::{ControlState, NodeWrite};
use crate::dsp::impulse::generate_impulse;
use crate::error::PlayerError;
use crate::graph::{BuildOptions, Processor, ProcessorSettings, build_description};
use crate::track::Track;

/// Rendered stereo PCM.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    pub sample_rate: u32,
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

impl PcmBuffer {
    pub fn frames(&self) -> usize {
        self.left.len()
    }

    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn channels(&self) -> [&[f32]; 2] {
        [&self.left, &self.right]
    }
}

/// Frames an export of `track` produces under `controls`.
///
/// The track length divided by the effective rate, plus the reverb tail
/// when reverb is on.
pub fn output_frames(track: &Track, controls: &ControlState, tail_seconds: f64) -> usize {
    let base = (track.frames() as f64 / controls.effective_rate()).ceil() as usize;
    if controls.reverb > 0.0 {
        base + (track.sample_rate() as f64 * tail_seconds).ceil() as usize
    } else {
        base
    }
}

/// A self-contained export request.
#[derive(Debug, Clone)]
pub struct RenderJob {
    track: Arc<Track>,
    controls: ControlState,
    frames: usize,
    chorus: ChorusQuality,
    generation: u64,
    settings: ProcessorSettings,
    impulse_seconds: f64,
    impulse_decay: f64,
    impulse_seed: Option<u64>,
}

impl RenderJob {
    pub fn new(
        track: Arc<Track>,
        controls: &ControlState,
        config: &PlayerConfig,
        generation: u64,
    ) -> Self {
        let frames = output_frames(&track, controls, config.reverb_tail_seconds);
        let settings = ProcessorSettings {
            sample_rate: track.sample_rate() as f64,
            block_size: config.block_size,
            fft_size: config.fft_size,
            smoothing: config.smoothing_time_constant,
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
        };
        Self {
            track,
            controls: *controls,
            frames,
            chorus: config.export_chorus,
            generation,
            settings,
            impulse_seconds: config.impulse_seconds,
            impulse_decay: config.impulse_decay,
            impulse_seed: config.impulse_seed,
        }
    }

    /// Output length in frames.
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn controls(&self) -> &ControlState {
        &self.controls
    }

    /// Render the whole track.
    pub fn run(self) -> Result<PcmBuffer, PlayerError> {
        let sample_rate = self.track.sample_rate();
        let impulse = if self.controls.reverb > 0.0 {
            let mut rng = match self.impulse_seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            Some(Arc::new(generate_impulse(
                self.impulse_seconds,
                self.impulse_decay,
                sample_rate,
                2,
                &mut rng,
            )))
        } else {
            None
        };

        let options = BuildOptions {
            chorus: self.chorus,
            impulse,
            analysis_tap: false,
        };
        let (description, _) = build_description(&self.controls.levels(), &options);
        let mut processor = Processor::new(&description, Arc::clone(&self.track), &self.settings)?;

        let rate = self.controls.effective_rate();
        processor.apply(NodeWrite::PlaybackRate(rate));
        processor.source_mut().play();

        debug!(
            frames = self.frames,
            rate,
            reverb = self.controls.reverb,
            chorus = ?self.chorus,
            "offline render started"
        );

        let mut left = Vec::with_capacity(self.frames);
        let mut right = Vec::with_capacity(self.frames);
        while left.len() < self.frames {
            processor.render_quantum();
            let n = (self.frames - left.len()).min(processor.block_size());
            let (out_l, out_r) = processor.output();
            left.extend_from_slice(&out_l[..n]);
            right.extend_from_slice(&out_r[..n]);
        }

        let pcm = PcmBuffer {
            sample_rate,
            left,
            right,
        };
        info!(
            frames = pcm.frames(),
            seconds = pcm.duration(),
            "offline render finished"
        );
        Ok(pcm)
    }
}

/// Render `track` under `controls` in one call.
pub fn render(
    track: Arc<Track>,
    controls: &ControlState,
    config: &PlayerConfig,
) -> Result<PcmBuffer, PlayerError> {
    RenderJob::new(track, controls, config, 0).run()
}
