//! Effect topology — the one graph layout shared by preview and export.
//!
//! ```text
//! source → bass ─┬→ dry ─────────────────────────┐
//!                ├→ convolver → wet ─────────────┤
//!                ├→ delay → delayMix ────────────┼→ mix → analyser → sink
//!                └→ voice₁..ₙ → chorusBus → chorusMix ┘
//! ```

use std::sync::Arc;

use crate::config::ChorusQuality;
use crate::controls::{GainSlot, MixLevels};
use crate::dsp::delay::{ECHO_MAX_SECONDS, ECHO_SECONDS};
use crate::dsp::filter::BASS_SHELF_HZ;
use crate::dsp::impulse::ImpulseResponse;

use super::description::{GraphDescription, NodeId, NodeSpec};

/// Shape choices for one build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub chorus: ChorusQuality,
    /// Impulse for the reverb branch. `None` leaves the branch out.
    pub impulse: Option<Arc<ImpulseResponse>>,
    /// Insert the analyser before the sink.
    pub analysis_tap: bool,
}

/// Ids of the nodes callers address after the build.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphHandles {
    pub source: NodeId,
    pub bass: NodeId,
    pub dry: NodeId,
    pub wet: Option<NodeId>,
    pub delay_mix: NodeId,
    pub chorus_mix: NodeId,
    pub analyser: Option<NodeId>,
    pub sink: NodeId,
}

/// Lay out the effect graph with gains taken from `levels`.
pub fn build_description(
    levels: &MixLevels,
    options: &BuildOptions,
) -> (GraphDescription, GraphHandles) {
    let mut g = GraphDescription::new();
    let gain = |slot: Option<GainSlot>, gain: f64| NodeSpec::Gain { slot, gain };

    let source = g.add_node(NodeSpec::Source);
    let bass = g.add_node(NodeSpec::LowShelf {
        frequency: BASS_SHELF_HZ,
        gain_db: levels.bass_db,
    });
    g.connect(source, bass);

    let mix = g.add_node(gain(None, 1.0));

    let dry = g.add_node(gain(Some(GainSlot::Dry), levels.dry));
    g.connect(bass, dry);
    g.connect(dry, mix);

    let wet = options.impulse.as_ref().map(|impulse| {
        let convolver = g.add_node(NodeSpec::Convolver {
            impulse: Arc::clone(impulse),
        });
        let wet = g.add_node(gain(Some(GainSlot::Wet), levels.wet));
        g.connect(bass, convolver);
        g.connect(convolver, wet);
        g.connect(wet, mix);
        wet
    });

    let delay = g.add_node(NodeSpec::Delay {
        delay_seconds: ECHO_SECONDS,
        max_delay_seconds: ECHO_MAX_SECONDS,
    });
    let delay_mix = g.add_node(gain(Some(GainSlot::DelayMix), levels.delay));
    g.connect(bass, delay);
    g.connect(delay, delay_mix);
    g.connect(delay_mix, mix);

    let chorus_bus = g.add_node(gain(None, 1.0));
    for &params in options.chorus.voices() {
        let voice = g.add_node(NodeSpec::ChorusVoice(params));
        g.connect(bass, voice);
        g.connect(voice, chorus_bus);
    }
    let chorus_mix = g.add_node(gain(Some(GainSlot::ChorusMix), levels.chorus));
    g.connect(chorus_bus, chorus_mix);
    g.connect(chorus_mix, mix);

    let sink = g.add_node(NodeSpec::Sink);
    let analyser = if options.analysis_tap {
        let tap = g.add_node(NodeSpec::Analyser);
        g.connect(mix, tap);
        g.connect(tap, sink);
        Some(tap)
    } else {
        g.connect(mix, sink);
        None
    };

    let handles = GraphHandles {
        source,
        bass,
        dry,
        wet,
        delay_mix,
        chorus_mix,
        analyser,
        sink,
    };
    (g, handles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::ControlState;

    fn impulse() -> Arc<ImpulseResponse> {
        Arc::new(ImpulseResponse {
            sample_rate: 8000,
            channels: vec![vec![1.0, 0.5], vec![1.0, 0.5]],
        })
    }

    fn count(g: &GraphDescription, kind: &str) -> usize {
        g.nodes().iter().filter(|n| n.kind() == kind).count()
    }

    #[test]
    fn live_layout_is_valid() {
        let levels = ControlState::default().levels();
        let (g, h) = build_description(
            &levels,
            &BuildOptions {
                chorus: ChorusQuality::Ensemble,
                impulse: Some(impulse()),
                analysis_tap: true,
            },
        );
        let order = g.validate().unwrap();
        assert_eq!(order.first(), Some(&h.source));
        assert_eq!(order.last(), Some(&h.sink));
        assert_eq!(count(&g, "chorus"), 3);
        assert_eq!(count(&g, "convolver"), 1);
        assert!(h.analyser.is_some());
        assert!(h.wet.is_some());
    }

    #[test]
    fn default_controls_leave_only_dry_open() {
        let levels = ControlState::default().levels();
        let (g, _) = build_description(
            &levels,
            &BuildOptions {
                chorus: ChorusQuality::Ensemble,
                impulse: Some(impulse()),
                analysis_tap: false,
            },
        );
        for node in g.nodes() {
            if let NodeSpec::Gain {
                slot: Some(slot),
                gain,
            } = node
            {
                let expected = if *slot == GainSlot::Dry { 1.0 } else { 0.0 };
                assert_eq!(*gain, expected, "{slot:?}");
            }
        }
    }

    #[test]
    fn export_layout_without_reverb() {
        let levels = ControlState::default().levels();
        let (g, h) = build_description(
            &levels,
            &BuildOptions {
                chorus: ChorusQuality::Single,
                impulse: None,
                analysis_tap: false,
            },
        );
        g.validate().unwrap();
        assert_eq!(count(&g, "convolver"), 0);
        assert_eq!(count(&g, "chorus"), 1);
        assert_eq!(count(&g, "analyser"), 0);
        assert!(h.wet.is_none());
        assert!(g.inputs_of(h.sink).count() == 1);
    }
}
