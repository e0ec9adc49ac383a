pub mod config;
pub mod controls;
pub mod dsp;
pub mod encoder;
pub mod error;
pub mod graph;
pub mod render;
pub mod session;
pub mod spectrum;
pub mod track;
pub mod transport;

pub use config::{ChorusQuality, PlayerConfig};
pub use controls::{ControlState, Param, Preset};
pub use encoder::EncodedAudio;
pub use error::PlayerError;
pub use render::{PcmBuffer, RenderJob, render};
pub use session::{PlayerView, Session};
pub use track::Track;

use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the slowchik-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// WASM-exposed: whether a picked or dropped file's MIME type is accepted.
#[wasm_bindgen(js_name = isAudioMime)]
pub fn is_audio_mime(mime: &str) -> bool {
    track::is_audio_mime(mime)
}

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{e}"))
}

/// An encoded export handed to the page for download.
#[wasm_bindgen]
pub struct ExportedFile {
    bytes: Vec<u8>,
    file_name: String,
    mime_type: String,
}

#[wasm_bindgen]
impl ExportedFile {
    #[wasm_bindgen(getter)]
    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    #[wasm_bindgen(getter, js_name = fileName)]
    pub fn file_name(&self) -> String {
        self.file_name.clone()
    }

    #[wasm_bindgen(getter, js_name = mimeType)]
    pub fn mime_type(&self) -> String {
        self.mime_type.clone()
    }
}

impl From<EncodedAudio> for ExportedFile {
    fn from(encoded: EncodedAudio) -> Self {
        Self {
            file_name: encoded.file_name(),
            mime_type: encoded.mime_type.to_string(),
            bytes: encoded.bytes,
        }
    }
}

/// WASM-exposed player: one [`Session`] driven by the page.
///
/// The page's AudioWorklet calls [`Player::process`] for every output
/// buffer and the visualizer calls [`Player::spectrum_frame`] once per
/// animation frame.
#[wasm_bindgen]
pub struct Player {
    session: Session,
}

#[wasm_bindgen]
impl Player {
    /// Create a player. `config` is an optional object of `PlayerConfig`
    /// fields; omitted fields take their defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<Player, JsValue> {
        let config = if config.is_undefined() || config.is_null() {
            PlayerConfig::default()
        } else {
            let config: PlayerConfig = serde_wasm_bindgen::from_value(config).map_err(js_error)?;
            config.validate().map_err(js_error)?;
            config
        };
        Ok(Player {
            session: Session::new(config),
        })
    }

    /// Sample rate of the page's AudioContext.
    #[wasm_bindgen(js_name = setOutputSampleRate)]
    pub fn set_output_sample_rate(&mut self, sample_rate: f64) {
        self.session.set_output_sample_rate(sample_rate);
    }

    pub fn load(&mut self, bytes: &[u8], mime: &str) -> Result<(), JsValue> {
        self.session.load(bytes, mime).map_err(js_error)
    }

    pub fn clear(&mut self) {
        self.session.clear();
    }

    /// Move a slider by name (`speed`, `pitch`, `bass`, `reverb`, `delay`,
    /// `chorus`). Returns the value actually stored.
    #[wasm_bindgen(js_name = setParam)]
    pub fn set_param(&mut self, name: &str, value: f64) -> Result<f64, JsValue> {
        self.session.set_param_by_name(name, value).map_err(js_error)
    }

    #[wasm_bindgen(js_name = applyPreset)]
    pub fn apply_preset(&mut self, name: &str) -> Result<(), JsValue> {
        let preset: Preset = name.parse().map_err(js_error)?;
        self.session.apply_preset(preset).map_err(js_error)
    }

    pub fn reset(&mut self) {
        self.session.reset();
    }

    #[wasm_bindgen(js_name = togglePlay)]
    pub fn toggle_play(&mut self) -> bool {
        self.session.toggle_play()
    }

    pub fn rewind(&mut self) {
        self.session.rewind();
    }

    pub fn forward(&mut self) {
        self.session.forward();
    }

    /// Seek to a progress-bar position (effective seconds).
    pub fn seek(&mut self, effective_seconds: f64) {
        self.session.seek(effective_seconds);
    }

    #[wasm_bindgen(js_name = toggleLoop)]
    pub fn toggle_loop(&mut self) -> bool {
        self.session.toggle_loop()
    }

    #[wasm_bindgen(js_name = toggleMute)]
    pub fn toggle_mute(&mut self) -> bool {
        self.session.toggle_mute()
    }

    #[wasm_bindgen(js_name = setVolume)]
    pub fn set_volume(&mut self, volume: f64) -> f64 {
        self.session.set_volume(volume)
    }

    /// Fill one pair of AudioWorklet output buffers.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.session.process(left, right);
    }

    #[wasm_bindgen(js_name = spectrumFrame)]
    pub fn spectrum_frame(&mut self, now_ms: f64) -> Vec<u8> {
        self.session.next_spectrum_frame(now_ms).bins
    }

    /// The current `PlayerView` as a plain object.
    pub fn view(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.session.view()).map_err(js_error)
    }

    /// The current sliders as a plain object.
    pub fn controls(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(self.session.controls()).map_err(js_error)
    }

    /// Render and encode the processed track.
    pub fn export(&mut self) -> Result<ExportedFile, JsValue> {
        self.session
            .export()
            .map(ExportedFile::from)
            .map_err(js_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_matches_manifest() {
        assert_eq!(core_version(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn exported_file_carries_name_and_type() {
        let pcm = PcmBuffer {
            sample_rate: 8000,
            left: vec![0.0; 4],
            right: vec![0.0; 4],
        };
        let encoded = encoder::encode(&pcm, None, "processed_audio").unwrap();
        let file = ExportedFile::from(encoded);
        assert_eq!(file.file_name(), "processed_audio.wav");
        assert_eq!(file.mime_type(), "audio/wav");
        assert_eq!(file.bytes().len(), 44 + 16);
    }

    #[test]
    fn mime_gate() {
        assert!(is_audio_mime("audio/mpeg"));
        assert!(!is_audio_mime("video/mp4"));
    }
}
