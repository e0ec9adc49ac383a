//! Block processor — runs a validated [`GraphDescription`] one quantum at a
//! time. The live graph and the offline renderer both drive this.

use std::sync::Arc;

use tracing::debug;

use crate::controls::{GainSlot, NodeWrite};
use crate::dsp::analyser::Analyser;
use crate::dsp::chorus::ChorusVoice;
use crate::dsp::convolver::Convolver;
use crate::dsp::delay::Delay;
use crate::dsp::filter::LowShelf;
use crate::dsp::source::BufferSource;
use crate::error::GraphError;
use crate::track::Track;

use super::description::{GraphDescription, NodeId, NodeSpec};

/// Settings shared by every node of a processor.
#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    pub sample_rate: f64,
    pub block_size: usize,
    pub fft_size: usize,
    pub smoothing: f64,
    pub min_decibels: f64,
    pub max_decibels: f64,
}

enum Node {
    Source(BufferSource),
    LowShelf(LowShelf),
    Convolver(Box<Convolver>),
    Delay(Delay),
    Chorus(ChorusVoice),
    Gain {
        slot: Option<GainSlot>,
        gain: f32,
    },
    Analyser(Box<Analyser>),
    Sink,
}

impl Node {
    fn realize(spec: &NodeSpec, track: &Arc<Track>, settings: &ProcessorSettings) -> Self {
        let sr = settings.sample_rate;
        match spec {
            NodeSpec::Source => Node::Source(BufferSource::new(Arc::clone(track), sr)),
            NodeSpec::LowShelf { frequency, gain_db } => {
                Node::LowShelf(LowShelf::new(sr, *frequency, *gain_db))
            }
            NodeSpec::Convolver { impulse } => {
                Node::Convolver(Box::new(Convolver::new(impulse, settings.block_size)))
            }
            NodeSpec::Delay {
                delay_seconds,
                max_delay_seconds,
            } => Node::Delay(Delay::new(sr, *max_delay_seconds, *delay_seconds)),
            NodeSpec::ChorusVoice(params) => Node::Chorus(ChorusVoice::new(sr, *params)),
            NodeSpec::Gain { slot, gain } => Node::Gain {
                slot: *slot,
                gain: *gain as f32,
            },
            NodeSpec::Analyser => Node::Analyser(Box::new(Analyser::new(
                settings.fft_size,
                settings.smoothing,
                settings.min_decibels,
                settings.max_decibels,
            ))),
            NodeSpec::Sink => Node::Sink,
        }
    }

    /// Turn the summed input block into this node's output, in place.
    fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        match self {
            Node::Source(src) => src.process_block(left, right),
            Node::LowShelf(f) => f.process_block(left, right),
            Node::Convolver(c) => c.process_block(left, right),
            Node::Delay(d) => d.process_block(left, right),
            Node::Chorus(v) => v.process_block(left, right),
            Node::Gain { gain, .. } => {
                for s in left.iter_mut().chain(right.iter_mut()) {
                    *s *= *gain;
                }
            }
            Node::Analyser(a) => a.push_block(left, right),
            Node::Sink => {}
        }
    }
}

/// A realized graph: node state, wiring and one output buffer per node.
pub struct Processor {
    nodes: Vec<Node>,
    order: Vec<NodeId>,
    inputs: Vec<Vec<NodeId>>,
    outputs: Vec<[Vec<f32>; 2]>,
    scratch: [Vec<f32>; 2],
    source: NodeId,
    sink: NodeId,
    analyser: Option<NodeId>,
    block_size: usize,
    sample_rate: f64,
}

impl Processor {
    /// Validate `description` and instantiate its nodes over `track`.
    pub fn new(
        description: &GraphDescription,
        track: Arc<Track>,
        settings: &ProcessorSettings,
    ) -> Result<Self, GraphError> {
        let order = description.validate()?;
        let block = settings.block_size.max(1);
        let settings = ProcessorSettings {
            block_size: block,
            ..settings.clone()
        };

        let nodes: Vec<Node> = description
            .nodes()
            .iter()
            .map(|spec| Node::realize(spec, &track, &settings))
            .collect();
        let inputs = (0..nodes.len())
            .map(|id| description.inputs_of(id).collect())
            .collect();
        let find = |kind: fn(&NodeSpec) -> bool| description.nodes().iter().position(kind);
        // validate() guarantees exactly one of each.
        let source = find(|s| matches!(s, NodeSpec::Source)).unwrap_or(0);
        let sink = find(|s| matches!(s, NodeSpec::Sink)).unwrap_or(0);
        let analyser = find(|s| matches!(s, NodeSpec::Analyser));

        debug!(
            nodes = nodes.len(),
            edges = description.edges().len(),
            sample_rate = settings.sample_rate,
            "graph realized"
        );

        Ok(Self {
            outputs: vec![[vec![0.0; block], vec![0.0; block]]; nodes.len()],
            scratch: [vec![0.0; block], vec![0.0; block]],
            nodes,
            order,
            inputs,
            source,
            sink,
            analyser,
            block_size: block,
            sample_rate: settings.sample_rate,
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Run every node once, in dependency order.
    pub fn render_quantum(&mut self) {
        let [scratch_l, scratch_r] = &mut self.scratch;
        for &id in &self.order {
            scratch_l.fill(0.0);
            scratch_r.fill(0.0);
            for &input in &self.inputs[id] {
                let [in_l, in_r] = &self.outputs[input];
                for (dst, src) in scratch_l.iter_mut().zip(in_l) {
                    *dst += src;
                }
                for (dst, src) in scratch_r.iter_mut().zip(in_r) {
                    *dst += src;
                }
            }

            self.nodes[id].process(scratch_l, scratch_r);

            let [out_l, out_r] = &mut self.outputs[id];
            out_l.copy_from_slice(scratch_l);
            out_r.copy_from_slice(scratch_r);
        }
    }

    /// The sink's block from the last [`Self::render_quantum`].
    pub fn output(&self) -> (&[f32], &[f32]) {
        let [l, r] = &self.outputs[self.sink];
        (l.as_slice(), r.as_slice())
    }

    /// Apply a parameter write to every node it addresses.
    pub fn apply(&mut self, write: NodeWrite) {
        for node in &mut self.nodes {
            match (write, node) {
                (NodeWrite::PlaybackRate(rate), Node::Source(src)) => src.set_rate(rate),
                (NodeWrite::BassGain(db), Node::LowShelf(f)) => f.set_gain(db),
                (NodeWrite::Gain(target, value), Node::Gain { slot, gain })
                    if *slot == Some(target) =>
                {
                    *gain = value as f32;
                }
                _ => {}
            }
        }
    }

    pub fn source(&self) -> &BufferSource {
        match &self.nodes[self.source] {
            Node::Source(src) => src,
            _ => unreachable!("source id always points at the source node"),
        }
    }

    pub fn source_mut(&mut self) -> &mut BufferSource {
        match &mut self.nodes[self.source] {
            Node::Source(src) => src,
            _ => unreachable!("source id always points at the source node"),
        }
    }

    pub fn analyser_mut(&mut self) -> Option<&mut Analyser> {
        match self.analyser.map(|id| &mut self.nodes[id]) {
            Some(Node::Analyser(a)) => Some(a.as_mut()),
            _ => None,
        }
    }

    /// Current gain of the controller slot, if the graph has one.
    pub fn slot_gain(&self, target: GainSlot) -> Option<f32> {
        self.nodes.iter().find_map(|node| match node {
            Node::Gain { slot, gain } if *slot == Some(target) => Some(*gain),
            _ => None,
        })
    }

    /// Current bass shelf gain in dB.
    pub fn bass_gain_db(&self) -> Option<f64> {
        self.nodes.iter().find_map(|node| match node {
            Node::LowShelf(f) => Some(f.gain_db),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(sample_rate: f64, block_size: usize) -> ProcessorSettings {
        ProcessorSettings {
            sample_rate,
            block_size,
            fft_size: 256,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }

    fn dc_track(frames: usize) -> Arc<Track> {
        Arc::new(Track::from_channels(1000, vec![vec![0.5; frames]]).unwrap())
    }

    #[test]
    fn parallel_gains_sum_at_the_sink() {
        let mut g = GraphDescription::new();
        let src = g.add_node(NodeSpec::Source);
        let a = g.add_node(NodeSpec::Gain {
            slot: Some(GainSlot::Dry),
            gain: 1.0,
        });
        let b = g.add_node(NodeSpec::Gain {
            slot: Some(GainSlot::Wet),
            gain: 0.5,
        });
        let sink = g.add_node(NodeSpec::Sink);
        g.connect(src, a);
        g.connect(src, b);
        g.connect(a, sink);
        g.connect(b, sink);

        let mut p = Processor::new(&g, dc_track(64), &settings(1000.0, 16)).unwrap();
        p.source_mut().play();
        p.render_quantum();
        let (l, r) = p.output();
        assert!(l.iter().chain(r).all(|&s| (s - 0.75).abs() < 1e-6));

        p.apply(NodeWrite::Gain(GainSlot::Wet, 0.0));
        p.render_quantum();
        assert!(p.output().0.iter().all(|&s| (s - 0.5).abs() < 1e-6));
        assert_eq!(p.slot_gain(GainSlot::Wet), Some(0.0));
        assert_eq!(p.slot_gain(GainSlot::ChorusMix), None);
    }

    #[test]
    fn rejects_invalid_description() {
        let mut g = GraphDescription::new();
        g.add_node(NodeSpec::Source);
        assert!(matches!(
            Processor::new(&g, dc_track(8), &settings(1000.0, 8)),
            Err(GraphError::SinkCount(0))
        ));
    }

    #[test]
    fn rate_write_reaches_source() {
        let mut g = GraphDescription::new();
        let src = g.add_node(NodeSpec::Source);
        let sink = g.add_node(NodeSpec::Sink);
        g.connect(src, sink);
        let mut p = Processor::new(&g, dc_track(64), &settings(1000.0, 8)).unwrap();
        p.apply(NodeWrite::PlaybackRate(2.0));
        p.source_mut().play();
        p.render_quantum();
        assert_eq!(p.source().rate(), 2.0);
        assert!((p.source().position_seconds() - 0.016).abs() < 1e-9);
    }

    #[test]
    fn analyser_sees_the_signal() {
        let mut g = GraphDescription::new();
        let src = g.add_node(NodeSpec::Source);
        let tap = g.add_node(NodeSpec::Analyser);
        let sink = g.add_node(NodeSpec::Sink);
        g.connect(src, tap);
        g.connect(tap, sink);
        let mut p = Processor::new(&g, dc_track(512), &settings(1000.0, 128)).unwrap();
        p.source_mut().play();
        p.render_quantum();
        p.render_quantum();
        let bytes = p.analyser_mut().unwrap().byte_frequency_data();
        assert_eq!(bytes.len(), 128);
        assert!(bytes[0] > 0, "DC should register in bin 0");
        assert!(p.output().0.iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }
}
