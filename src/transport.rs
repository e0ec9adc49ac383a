//! Transport — loop, mute and volume preferences, and time display.

use serde::{Deserialize, Serialize};

/// Volume restored by unmuting when no volume was ever set.
const DEFAULT_PRE_MUTE_VOLUME: f64 = 50.0;

/// Player preferences that outlive a single track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transport {
    pub looping: bool,
    pub muted: bool,
    /// 0..=100
    pub volume: f64,
    pre_mute_volume: f64,
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            looping: false,
            muted: false,
            volume: 100.0,
            pre_mute_volume: DEFAULT_PRE_MUTE_VOLUME,
        }
    }
}

impl Transport {
    pub fn toggle_loop(&mut self) -> bool {
        self.looping = !self.looping;
        self.looping
    }

    /// Muting parks the volume at zero; unmuting brings the old value back.
    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        if self.muted {
            self.pre_mute_volume = self.volume;
            self.volume = 0.0;
        } else {
            self.volume = self.pre_mute_volume;
        }
        self.muted
    }

    pub fn set_volume(&mut self, volume: f64) -> f64 {
        if volume.is_finite() {
            self.volume = volume.clamp(0.0, 100.0);
        }
        self.volume
    }

    /// Linear gain for the source.
    pub fn gain(&self) -> f32 {
        (self.volume / 100.0) as f32
    }

    /// Drop loop and mute, as the clear button does.
    pub fn clear(&mut self) {
        if self.muted {
            self.volume = self.pre_mute_volume;
        }
        self.looping = false;
        self.muted = false;
    }
}

/// Position after skipping `delta` seconds, kept inside the track.
pub fn skip(position: f64, delta: f64, duration: f64) -> f64 {
    (position + delta).clamp(0.0, duration.max(0.0))
}

/// `m:ss`, flooring to whole seconds.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}
