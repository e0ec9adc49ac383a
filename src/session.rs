//! Session — everything the player knows about the loaded track.
//!
//! One session owns the track, the live graph, the sliders, the transport
//! preferences and the export latch. The UI drives it with intents and
//! reads back a [`PlayerView`].

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::PlayerConfig;
use crate::controls::{ControlState, Param, Preset, writes_for_all};
use crate::encoder::{EncodedAudio, encode_with_config};
use crate::error::PlayerError;
use crate::graph::EffectGraph;
use crate::render::{PcmBuffer, RenderJob};
use crate::spectrum::{SpectrumFeed, SpectrumFrame};
use crate::track::Track;
use crate::transport::{Transport, format_time, skip};

/// What the UI shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    /// Sliders, transport and export are enabled only with a track.
    pub controls_enabled: bool,
    pub playing: bool,
    pub looping: bool,
    pub muted: bool,
    pub volume: f64,
    /// Elapsed time in effective (rate-adjusted) seconds.
    pub elapsed_seconds: f64,
    pub total_seconds: f64,
    pub elapsed: String,
    pub total: String,
    pub export_in_progress: bool,
    pub controls: ControlState,
}

pub struct Session {
    config: PlayerConfig,
    track: Option<Arc<Track>>,
    graph: Option<EffectGraph>,
    controls: ControlState,
    transport: Transport,
    spectrum: SpectrumFeed,
    /// Host output rate; `None` renders at the track's own rate.
    output_sample_rate: Option<f64>,
    export_in_progress: bool,
    generation: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(PlayerConfig::default())
    }
}

impl Session {
    pub fn new(config: PlayerConfig) -> Self {
        let spectrum = match config.impulse_seed {
            Some(seed) => SpectrumFeed::with_seed(config.idle_bins, seed),
            None => SpectrumFeed::new(config.idle_bins),
        };
        Self {
            config,
            track: None,
            graph: None,
            controls: ControlState::default(),
            transport: Transport::default(),
            spectrum,
            output_sample_rate: None,
            export_in_progress: false,
            generation: 0,
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn controls(&self) -> &ControlState {
        &self.controls
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn track(&self) -> Option<&Arc<Track>> {
        self.track.as_ref()
    }

    pub fn graph(&self) -> Option<&EffectGraph> {
        self.graph.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_export_in_progress(&self) -> bool {
        self.export_in_progress
    }

    /// Rate the host pulls audio at. Applies from the next load.
    pub fn set_output_sample_rate(&mut self, sample_rate: f64) {
        if sample_rate.is_finite() && sample_rate > 0.0 {
            self.output_sample_rate = Some(sample_rate);
        }
    }

    // ── Loading ─────────────────────────────────────────────

    /// Decode and load a file. Rejected or undecodable input leaves the
    /// session untouched.
    pub fn load(&mut self, bytes: &[u8], mime: &str) -> Result<(), PlayerError> {
        let track = Track::decode(bytes, mime)?;
        self.load_track(track)
    }

    /// Replace the current track and rebuild the live graph for it.
    pub fn load_track(&mut self, track: Track) -> Result<(), PlayerError> {
        let track = Arc::new(track);
        let sample_rate = self
            .output_sample_rate
            .unwrap_or(track.sample_rate() as f64);

        // The old graph goes before the new one is built.
        self.graph = None;
        self.track = None;
        self.generation += 1;

        let mut graph = EffectGraph::build(Arc::clone(&track), &self.controls, &self.config, sample_rate)?;
        let source = graph.source_mut();
        source.set_looping(self.transport.looping);
        source.set_gain(self.transport.gain());

        info!(
            generation = self.generation,
            seconds = track.duration(),
            sample_rate = track.sample_rate(),
            channels = track.channel_count(),
            "track loaded"
        );
        self.track = Some(track);
        self.graph = Some(graph);
        Ok(())
    }

    /// Drop the track and graph.
    pub fn clear(&mut self) {
        self.graph = None;
        self.track = None;
        self.generation += 1;
        self.transport.clear();
        info!("track cleared");
    }

    // ── Controls ────────────────────────────────────────────

    /// Move a slider. Returns the stored (clamped) value.
    pub fn set_param(&mut self, param: Param, value: f64) -> Result<f64, PlayerError> {
        let stored = self.controls.set(param, value)?;
        if let Some(graph) = &mut self.graph {
            graph.set_param(param, &self.controls);
        }
        debug!(%param, value = stored, "control changed");
        Ok(stored)
    }

    pub fn set_param_by_name(&mut self, name: &str, value: f64) -> Result<f64, PlayerError> {
        let param: Param = name.parse()?;
        self.set_param(param, value)
    }

    /// Drive the preset's sliders through the normal control path.
    pub fn apply_preset(&mut self, preset: Preset) -> Result<(), PlayerError> {
        for (param, value) in preset.values() {
            self.set_param(param, value)?;
        }
        Ok(())
    }

    /// All sliders back to defaults and the graph back to dry routing.
    pub fn reset(&mut self) {
        self.controls.reset();
        if let Some(graph) = &mut self.graph {
            for write in writes_for_all(&self.controls) {
                graph.apply(write);
            }
        }
        debug!("controls reset");
    }

    // ── Transport ───────────────────────────────────────────

    pub fn is_playing(&self) -> bool {
        self.graph.as_ref().is_some_and(|g| g.source().is_playing())
    }

    /// Toggle playback. Returns whether the track is now playing.
    pub fn toggle_play(&mut self) -> bool {
        let Some(graph) = &mut self.graph else {
            return false;
        };
        let source = graph.source_mut();
        if source.is_playing() {
            source.pause();
        } else {
            source.play();
        }
        source.is_playing()
    }

    pub fn play(&mut self) {
        if let Some(graph) = &mut self.graph {
            graph.source_mut().play();
        }
    }

    pub fn pause(&mut self) {
        if let Some(graph) = &mut self.graph {
            graph.source_mut().pause();
        }
    }

    pub fn rewind(&mut self) {
        self.skip_by(-self.config.skip_step_seconds);
    }

    pub fn forward(&mut self) {
        self.skip_by(self.config.skip_step_seconds);
    }

    fn skip_by(&mut self, delta: f64) {
        let (Some(graph), Some(track)) = (&mut self.graph, &self.track) else {
            return;
        };
        let source = graph.source_mut();
        let target = skip(source.position_seconds(), delta, track.duration());
        source.seek_seconds(target);
    }

    /// Seek to a position given in effective seconds, as shown on the
    /// progress bar.
    pub fn seek(&mut self, effective_seconds: f64) {
        let rate = self.controls.effective_rate();
        if let Some(graph) = &mut self.graph {
            graph.source_mut().seek_seconds(effective_seconds * rate);
        }
    }

    pub fn toggle_loop(&mut self) -> bool {
        let looping = self.transport.toggle_loop();
        if let Some(graph) = &mut self.graph {
            graph.source_mut().set_looping(looping);
        }
        looping
    }

    pub fn toggle_mute(&mut self) -> bool {
        let muted = self.transport.toggle_mute();
        self.sync_gain();
        muted
    }

    pub fn set_volume(&mut self, volume: f64) -> f64 {
        let volume = self.transport.set_volume(volume);
        self.sync_gain();
        volume
    }

    fn sync_gain(&mut self) {
        let gain = self.transport.gain();
        if let Some(graph) = &mut self.graph {
            graph.source_mut().set_gain(gain);
        }
    }

    // ── Audio and display ───────────────────────────────────

    /// Fill host output buffers from the live graph; silence without one.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        match &mut self.graph {
            Some(graph) => {
                graph.process(left, right);
                if graph.source_mut().take_ended() {
                    debug!("playback ended");
                }
            }
            None => {
                left.fill(0.0);
                right.fill(0.0);
            }
        }
    }

    pub fn next_spectrum_frame(&mut self, now_ms: f64) -> SpectrumFrame {
        self.spectrum.next_frame(now_ms, self.graph.as_mut())
    }

    pub fn view(&self) -> PlayerView {
        let rate = self.controls.effective_rate();
        let (elapsed_seconds, total_seconds) = match (&self.graph, &self.track) {
            (Some(graph), Some(track)) => (
                graph.source().position_seconds() / rate,
                track.duration() / rate,
            ),
            _ => (0.0, 0.0),
        };
        PlayerView {
            controls_enabled: self.track.is_some(),
            playing: self.is_playing(),
            looping: self.transport.looping,
            muted: self.transport.muted,
            volume: self.transport.volume,
            elapsed_seconds,
            total_seconds,
            elapsed: format_time(elapsed_seconds),
            total: format_time(total_seconds),
            export_in_progress: self.export_in_progress,
            controls: self.controls,
        }
    }

    // ── Export ──────────────────────────────────────────────

    /// Snapshot the sliders and track into a render job and set the latch.
    pub fn start_export(&mut self) -> Result<RenderJob, PlayerError> {
        if self.export_in_progress {
            return Err(PlayerError::ExportInProgress);
        }
        let track = self.track.as_ref().ok_or(PlayerError::NoTrackLoaded)?;
        let job = RenderJob::new(Arc::clone(track), &self.controls, &self.config, self.generation);
        self.export_in_progress = true;
        info!(frames = job.frames(), generation = self.generation, "export started");
        Ok(job)
    }

    /// Finish an export started by [`Self::start_export`]. Always clears
    /// the latch.
    pub fn complete_export(
        &mut self,
        job_generation: u64,
        rendered: Result<PcmBuffer, PlayerError>,
    ) -> Result<EncodedAudio, PlayerError> {
        self.export_in_progress = false;

        let pcm = match rendered {
            Ok(pcm) => pcm,
            Err(e) => {
                error!(error = %e, "export render failed");
                return Err(e);
            }
        };
        if job_generation != self.generation {
            warn!(
                job = job_generation,
                current = self.generation,
                "discarding export for a replaced track"
            );
            return Err(PlayerError::ExportOrphaned);
        }

        encode_with_config(&pcm, &self.config).inspect_err(|e| {
            error!(error = %e, "export encode failed");
        })
    }

    /// Render and encode in one go.
    pub fn export(&mut self) -> Result<EncodedAudio, PlayerError> {
        let job = self.start_export()?;
        let generation = job.generation();
        let rendered = job.run();
        self.complete_export(generation, rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::GainSlot;

    fn config() -> PlayerConfig {
        PlayerConfig {
            impulse_seed: Some(5),
            impulse_seconds: 0.2,
            reverb_tail_seconds: 0.5,
            ..PlayerConfig::default()
        }
    }

    fn track(seconds: f64) -> Track {
        let sr = 8000;
        let frames = (seconds * sr as f64) as usize;
        let data = (0..frames).map(|i| (i as f32 * 0.02).sin() * 0.3).collect();
        Track::from_channels(sr, vec![data]).unwrap()
    }

    fn wav_bytes(seconds: f64) -> Vec<u8> {
        let pcm = PcmBuffer {
            sample_rate: 8000,
            left: vec![0.25; (seconds * 8000.0) as usize],
            right: vec![-0.25; (seconds * 8000.0) as usize],
        };
        crate::encoder::encode_wav(&pcm).unwrap()
    }

    #[test]
    fn rejects_non_audio_without_side_effects() {
        let mut s = Session::new(config());
        s.load_track(track(1.0)).unwrap();
        let generation = s.generation();
        let err = s.load(b"hello", "text/plain").unwrap_err();
        assert!(matches!(err, PlayerError::InputRejected { .. }));
        assert_eq!(s.generation(), generation);
        assert!(s.track().is_some());
    }

    #[test]
    fn loads_wav_bytes() {
        let mut s = Session::new(config());
        s.load(&wav_bytes(0.5), "audio/wav").unwrap();
        let view = s.view();
        assert!(view.controls_enabled);
        assert_eq!(view.total, "0:00");
        assert!((view.total_seconds - 0.5).abs() < 1e-9);
        assert_eq!(s.track().unwrap().channel_count(), 2);
    }

    #[test]
    fn nightcore_then_reset_restores_defaults() {
        let mut s = Session::new(config());
        s.load_track(track(1.0)).unwrap();
        s.apply_preset(Preset::Nightcore).unwrap();
        assert_eq!(s.controls().speed, 1.15);
        assert_eq!(s.controls().pitch, 1.5);

        s.reset();
        assert_eq!(*s.controls(), ControlState::default());
        let graph = s.graph().unwrap();
        assert_eq!(graph.source().rate(), 1.0);
        let p = graph.processor();
        assert_eq!(p.slot_gain(GainSlot::Dry), Some(1.0));
        assert_eq!(p.slot_gain(GainSlot::Wet), Some(0.0));
        assert_eq!(p.bass_gain_db(), Some(0.0));

        s.reset();
        assert_eq!(*s.controls(), ControlState::default());
    }

    #[test]
    fn controls_survive_a_reload() {
        let mut s = Session::new(config());
        s.set_param(Param::Reverb, 40.0).unwrap();
        s.load_track(track(0.5)).unwrap();
        let p = s.graph().unwrap().processor();
        assert_eq!(p.slot_gain(GainSlot::Wet), Some(0.4));
        assert_eq!(p.slot_gain(GainSlot::Dry), Some(0.8));
    }

    #[test]
    fn export_without_track_fails_and_keeps_latch_clear() {
        let mut s = Session::new(config());
        assert!(matches!(s.export(), Err(PlayerError::NoTrackLoaded)));
        assert!(!s.is_export_in_progress());
    }

    #[test]
    fn concurrent_export_is_rejected() {
        let mut s = Session::new(config());
        s.load_track(track(0.5)).unwrap();
        let job = s.start_export().unwrap();
        assert!(s.view().export_in_progress);
        assert!(matches!(s.start_export(), Err(PlayerError::ExportInProgress)));

        let generation = job.generation();
        let encoded = s.complete_export(generation, job.run()).unwrap();
        assert!(!s.is_export_in_progress());
        assert!(encoded.file_name().starts_with("processed_audio."));
    }

    #[test]
    fn failed_render_clears_latch() {
        let mut s = Session::new(config());
        s.load_track(track(0.5)).unwrap();
        let job = s.start_export().unwrap();
        let result = s.complete_export(job.generation(), Err(PlayerError::Encode("x".into())));
        assert!(result.is_err());
        assert!(!s.is_export_in_progress());
        assert!(s.start_export().is_ok());
    }

    #[test]
    fn reload_orphans_running_export() {
        let mut s = Session::new(config());
        s.load_track(track(0.5)).unwrap();
        let job = s.start_export().unwrap();
        s.load_track(track(0.25)).unwrap();
        let generation = job.generation();
        let err = s.complete_export(generation, job.run()).unwrap_err();
        assert!(matches!(err, PlayerError::ExportOrphaned));
        assert!(!s.is_export_in_progress());
    }

    #[cfg(not(feature = "codecs"))]
    #[test]
    fn export_falls_back_to_wav() {
        let mut s = Session::new(config());
        s.load_track(track(1.0)).unwrap();
        s.set_param(Param::Speed, 2.0).unwrap();
        let encoded = s.export().unwrap();
        assert_eq!(encoded.file_name(), "processed_audio.wav");
        // 1 s at double speed: 4000 stereo frames of 16-bit audio.
        assert_eq!(encoded.bytes.len(), 44 + 4000 * 4);
    }

    #[test]
    fn transport_commands_without_track_are_noops() {
        let mut s = Session::new(config());
        assert!(!s.toggle_play());
        s.rewind();
        s.forward();
        s.seek(3.0);
        let view = s.view();
        assert!(!view.playing);
        assert_eq!(view.elapsed, "0:00");
        assert!(!view.controls_enabled);
    }

    #[test]
    fn seek_and_skip_use_effective_time() {
        let mut s = Session::new(config());
        s.load_track(track(30.0)).unwrap();
        s.set_param(Param::Speed, 2.0).unwrap();
        s.seek(5.0);
        let view = s.view();
        assert!((view.elapsed_seconds - 5.0).abs() < 1e-9);
        assert_eq!(view.total, "0:15");

        s.forward();
        assert!((s.graph().unwrap().source().position_seconds() - 20.0).abs() < 1e-9);
        s.forward();
        assert!((s.graph().unwrap().source().position_seconds() - 30.0).abs() < 1e-9);
        s.rewind();
        s.rewind();
        s.rewind();
        assert_eq!(s.graph().unwrap().source().position_seconds(), 0.0);
    }

    #[test]
    fn playback_stops_at_end_unless_looping() {
        let mut s = Session::new(config());
        s.load_track(track(0.01)).unwrap();
        assert!(s.toggle_play());
        let mut l = vec![0.0f32; 256];
        let mut r = vec![0.0f32; 256];
        s.process(&mut l, &mut r);
        assert!(!s.is_playing());

        s.toggle_loop();
        s.play();
        s.process(&mut l, &mut r);
        assert!(s.is_playing());
    }

    #[test]
    fn mute_silences_the_source() {
        let mut s = Session::new(config());
        s.load_track(track(1.0)).unwrap();
        s.toggle_mute();
        s.play();
        let mut l = vec![1.0f32; 256];
        let mut r = vec![1.0f32; 256];
        s.process(&mut l, &mut r);
        assert!(l.iter().chain(&r).all(|&x| x == 0.0));
        assert!(s.view().muted);
    }

    #[test]
    fn idle_and_live_spectrum() {
        let mut s = Session::new(config());
        let idle = s.next_spectrum_frame(100.0);
        assert!(!idle.live);
        assert_eq!(idle.bins.len(), 64);

        s.load_track(track(1.0)).unwrap();
        let live = s.next_spectrum_frame(116.0);
        assert!(live.live);
        assert_eq!(live.bins.len(), 128);
    }

    #[test]
    fn clear_resets_loop_and_disables_controls() {
        let mut s = Session::new(config());
        s.load_track(track(1.0)).unwrap();
        s.toggle_loop();
        s.clear();
        let view = s.view();
        assert!(!view.looping);
        assert!(!view.controls_enabled);
        assert!(s.graph().is_none());
    }
}
