//! Player configuration — tunables for the graph, analyser, and exporter.
//!
//! Every field has a default matching the browser player, so an empty JSON
//! object (or no config at all) gives the stock behavior.

use serde::{Deserialize, Serialize};

use crate::error::PlayerError;

/// Chorus implementation used by a graph.
///
/// The live preview runs a three-voice ensemble; the export path has always
/// used a single modulated voice. Both are kept and selectable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChorusQuality {
    /// One voice: 20 ms base delay, 0.5 Hz LFO, 5 ms depth.
    Single,
    /// Three voices: 15/25/35 ms, 0.3/0.7/1.1 Hz, 3/4/2 ms.
    Ensemble,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerConfig {
    /// Frames per render quantum.
    pub block_size: usize,
    /// Analyser transform size; the spectrum has half as many bins.
    pub fft_size: usize,
    pub smoothing_time_constant: f64,
    pub min_decibels: f64,
    pub max_decibels: f64,
    /// Bin count of the synthetic idle spectrum.
    pub idle_bins: usize,
    pub impulse_seconds: f64,
    pub impulse_decay: f64,
    /// Extra render time appended to exports when reverb is on.
    pub reverb_tail_seconds: f64,
    pub live_chorus: ChorusQuality,
    pub export_chorus: ChorusQuality,
    pub mp3_bitrate_kbps: u32,
    pub export_base_name: String,
    pub skip_step_seconds: f64,
    /// Seed for the reverb impulse. `None` draws from entropy.
    pub impulse_seed: Option<u64>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            block_size: 128,
            fft_size: 256,
            smoothing_time_constant: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
            idle_bins: 64,
            impulse_seconds: 2.0,
            impulse_decay: 2.0,
            reverb_tail_seconds: 2.0,
            live_chorus: ChorusQuality::Ensemble,
            export_chorus: ChorusQuality::Single,
            mp3_bitrate_kbps: 128,
            export_base_name: "processed_audio".to_string(),
            skip_step_seconds: 10.0,
            impulse_seed: None,
        }
    }
}

impl PlayerConfig {
    /// Parse a JSON config, filling omitted fields with defaults.
    pub fn from_json(json: &str) -> Result<Self, PlayerError> {
        let config: PlayerConfig =
            serde_json::from_str(json).map_err(|e| PlayerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PlayerError> {
        if self.block_size == 0 {
            return Err(PlayerError::Config("blockSize must be positive".into()));
        }
        if self.fft_size < 32 || !self.fft_size.is_power_of_two() {
            return Err(PlayerError::Config(format!(
                "fftSize must be a power of two >= 32, got {}",
                self.fft_size
            )));
        }
        if !(0.0..1.0).contains(&self.smoothing_time_constant) {
            return Err(PlayerError::Config(
                "smoothingTimeConstant must be in [0, 1)".into(),
            ));
        }
        if self.min_decibels >= self.max_decibels {
            return Err(PlayerError::Config(
                "minDecibels must be below maxDecibels".into(),
            ));
        }
        if self.impulse_seconds <= 0.0 || self.reverb_tail_seconds < 0.0 {
            return Err(PlayerError::Config("impulse and tail lengths must be positive".into()));
        }
        Ok(())
    }
}
