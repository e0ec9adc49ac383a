//! Control state — the six effect sliders and the gains derived from them.
//!
//! Every slider maps to graph writes through [`writes_for`], a pure function
//! over the closed [`Param`] set. The live controller, the graph builder and
//! the offline renderer all derive node values from here, which keeps the two
//! paths numerically identical.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PlayerError;

/// Effective playback rate for a speed multiplier and a pitch in semitones.
///
/// Pitch is applied by resampling, so it also changes tempo.
pub fn effective_rate(speed: f64, pitch_semitones: f64) -> f64 {
    speed * 2.0_f64.powf(pitch_semitones / 12.0)
}

/// One of the six effect sliders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Param {
    Speed,
    Pitch,
    Bass,
    Reverb,
    Delay,
    Chorus,
}

impl Param {
    pub const ALL: [Param; 6] = [
        Param::Speed,
        Param::Pitch,
        Param::Bass,
        Param::Reverb,
        Param::Delay,
        Param::Chorus,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Param::Speed => "speed",
            Param::Pitch => "pitch",
            Param::Bass => "bass",
            Param::Reverb => "reverb",
            Param::Delay => "delay",
            Param::Chorus => "chorus",
        }
    }

    /// Inclusive slider range. Speed's lower bound keeps the rate positive.
    pub fn range(self) -> (f64, f64) {
        match self {
            Param::Speed => (SPEED_MIN, 3.0),
            Param::Pitch => (-12.0, 12.0),
            Param::Bass => (-40.0, 40.0),
            Param::Reverb | Param::Delay | Param::Chorus => (0.0, 100.0),
        }
    }

    pub fn default_value(self) -> f64 {
        match self {
            Param::Speed => 1.0,
            _ => 0.0,
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Param {
    type Err = PlayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Param::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| PlayerError::UnknownParam(s.to_string()))
    }
}

const SPEED_MIN: f64 = 0.01;

/// Current slider values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ControlState {
    pub speed: f64,
    /// Semitones.
    pub pitch: f64,
    /// Shelf gain in dB.
    pub bass: f64,
    /// Percent.
    pub reverb: f64,
    /// Percent.
    pub delay: f64,
    /// Percent.
    pub chorus: f64,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            speed: Param::Speed.default_value(),
            pitch: Param::Pitch.default_value(),
            bass: Param::Bass.default_value(),
            reverb: Param::Reverb.default_value(),
            delay: Param::Delay.default_value(),
            chorus: Param::Chorus.default_value(),
        }
    }
}

impl ControlState {
    pub fn get(&self, param: Param) -> f64 {
        match param {
            Param::Speed => self.speed,
            Param::Pitch => self.pitch,
            Param::Bass => self.bass,
            Param::Reverb => self.reverb,
            Param::Delay => self.delay,
            Param::Chorus => self.chorus,
        }
    }

    /// Store a slider value, clamped into the param's range.
    ///
    /// Returns the value actually stored.
    pub fn set(&mut self, param: Param, value: f64) -> Result<f64, PlayerError> {
        if !value.is_finite() {
            return Err(PlayerError::InvalidValue {
                param: param.name(),
                value,
            });
        }
        let (lo, hi) = param.range();
        let value = value.clamp(lo, hi);
        let slot = match param {
            Param::Speed => &mut self.speed,
            Param::Pitch => &mut self.pitch,
            Param::Bass => &mut self.bass,
            Param::Reverb => &mut self.reverb,
            Param::Delay => &mut self.delay,
            Param::Chorus => &mut self.chorus,
        };
        *slot = value;
        Ok(value)
    }

    pub fn reset(&mut self) {
        *self = ControlState::default();
    }

    pub fn effective_rate(&self) -> f64 {
        effective_rate(self.speed, self.pitch)
    }

    pub fn levels(&self) -> MixLevels {
        MixLevels::from_controls(self)
    }
}

/// Node values derived from a [`ControlState`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixLevels {
    pub rate: f64,
    pub bass_db: f64,
    pub dry: f64,
    pub wet: f64,
    pub delay: f64,
    pub chorus: f64,
}

impl MixLevels {
    pub fn from_controls(controls: &ControlState) -> Self {
        let (dry, wet) = reverb_gains(controls.reverb);
        Self {
            rate: controls.effective_rate(),
            bass_db: controls.bass,
            dry,
            wet,
            delay: percent(controls.delay),
            chorus: percent(controls.chorus),
        }
    }
}

/// Reverb dry/wet law: wet = pct/100, dry = 1 - wet/2.
///
/// The pair does not sum to one; at 100% the dry path still sits at 0.5.
pub fn reverb_gains(reverb_percent: f64) -> (f64, f64) {
    let wet = percent(reverb_percent);
    (1.0 - wet * 0.5, wet)
}

fn percent(value: f64) -> f64 {
    value / 100.0
}

/// A gain stage the controller can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GainSlot {
    Dry,
    Wet,
    DelayMix,
    ChorusMix,
}

/// A single parameter write against a running graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeWrite {
    PlaybackRate(f64),
    BassGain(f64),
    Gain(GainSlot, f64),
}

/// The node writes a change of `param` requires, given the new controls.
pub fn writes_for(param: Param, controls: &ControlState) -> Vec<NodeWrite> {
    let levels = controls.levels();
    match param {
        Param::Speed | Param::Pitch => vec![NodeWrite::PlaybackRate(levels.rate)],
        Param::Bass => vec![NodeWrite::BassGain(levels.bass_db)],
        Param::Reverb => vec![
            NodeWrite::Gain(GainSlot::Wet, levels.wet),
            NodeWrite::Gain(GainSlot::Dry, levels.dry),
        ],
        Param::Delay => vec![NodeWrite::Gain(GainSlot::DelayMix, levels.delay)],
        Param::Chorus => vec![NodeWrite::Gain(GainSlot::ChorusMix, levels.chorus)],
    }
}

/// Every write needed to bring a graph in line with `controls`.
pub fn writes_for_all(controls: &ControlState) -> Vec<NodeWrite> {
    [Param::Speed, Param::Bass, Param::Reverb, Param::Delay, Param::Chorus]
        .into_iter()
        .flat_map(|p| writes_for(p, controls))
        .collect()
}

/// One-click slider settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    SlowedReverb,
    Nightcore,
}

impl Preset {
    /// Slider values this preset drives, in the order they are applied.
    pub fn values(self) -> [(Param, f64); 3] {
        match self {
            Preset::SlowedReverb => [
                (Param::Speed, 0.85),
                (Param::Pitch, -1.5),
                (Param::Reverb, 80.0),
            ],
            Preset::Nightcore => [
                (Param::Speed, 1.15),
                (Param::Pitch, 1.5),
                (Param::Reverb, 0.0),
            ],
        }
    }
}

impl FromStr for Preset {
    type Err = PlayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "slowed-reverb" | "slowedreverb" | "slowed_reverb" | "slowed" => {
                Ok(Preset::SlowedReverb)
            }
            "nightcore" => Ok(Preset::Nightcore),
            _ => Err(PlayerError::UnknownPreset(s.to_string())),
        }
    }
}
