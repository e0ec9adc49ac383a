//! Graph description — nodes and edges as plain data.
//!
//! A description says what the graph contains, not how it runs. It is
//! validated once and then realized by a [`Processor`](super::Processor).

use std::collections::VecDeque;
use std::sync::Arc;

use crate::controls::GainSlot;
use crate::dsp::chorus::VoiceParams;
use crate::dsp::impulse::ImpulseResponse;
use crate::error::GraphError;

/// Index of a node in its description.
pub type NodeId = usize;

/// What a node does.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeSpec {
    /// Plays the track. Takes no inputs.
    Source,
    LowShelf { frequency: f64, gain_db: f64 },
    Convolver { impulse: Arc<ImpulseResponse> },
    Delay { delay_seconds: f64, max_delay_seconds: f64 },
    ChorusVoice(VoiceParams),
    /// Scales its summed inputs. `slot` makes it addressable by the
    /// parameter controller.
    Gain { slot: Option<GainSlot>, gain: f64 },
    /// Pass-through that records what flows by for the spectrum.
    Analyser,
    /// The graph output.
    Sink,
}

impl NodeSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            NodeSpec::Source => "source",
            NodeSpec::LowShelf { .. } => "lowshelf",
            NodeSpec::Convolver { .. } => "convolver",
            NodeSpec::Delay { .. } => "delay",
            NodeSpec::ChorusVoice(_) => "chorus",
            NodeSpec::Gain { .. } => "gain",
            NodeSpec::Analyser => "analyser",
            NodeSpec::Sink => "sink",
        }
    }
}

/// A directed signal graph. Edges carry audio from `.0` into `.1`; a node
/// with several inputs sums them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphDescription {
    nodes: Vec<NodeSpec>,
    edges: Vec<(NodeId, NodeId)>,
}

impl GraphDescription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, spec: NodeSpec) -> NodeId {
        self.nodes.push(spec);
        self.nodes.len() - 1
    }

    pub fn connect(&mut self, from: NodeId, to: NodeId) {
        self.edges.push((from, to));
    }

    pub fn nodes(&self) -> &[NodeSpec] {
        &self.nodes
    }

    pub fn edges(&self) -> &[(NodeId, NodeId)] {
        &self.edges
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeSpec> {
        self.nodes.get(id)
    }

    /// Upstream nodes of `id`, in edge order.
    pub fn inputs_of(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.edges
            .iter()
            .filter(move |(_, to)| *to == id)
            .map(|(from, _)| *from)
    }

    /// Check the graph and return a processing order (sources first).
    ///
    /// Rejects edges to missing nodes, anything other than exactly one
    /// source and one sink, and cycles.
    pub fn validate(&self) -> Result<Vec<NodeId>, GraphError> {
        let n = self.nodes.len();
        for &(from, to) in &self.edges {
            if from >= n || to >= n {
                return Err(GraphError::DanglingEdge { from, to });
            }
        }

        let sources = self
            .nodes
            .iter()
            .filter(|s| matches!(s, NodeSpec::Source))
            .count();
        if sources != 1 {
            return Err(GraphError::SourceCount(sources));
        }
        let sinks = self
            .nodes
            .iter()
            .filter(|s| matches!(s, NodeSpec::Sink))
            .count();
        if sinks != 1 {
            return Err(GraphError::SinkCount(sinks));
        }

        self.topological_order()
    }

    /// Kahn's algorithm.
    fn topological_order(&self) -> Result<Vec<NodeId>, GraphError> {
        let n = self.nodes.len();
        let mut in_degree = vec![0usize; n];
        for &(_, to) in &self.edges {
            in_degree[to] += 1;
        }

        let mut queue: VecDeque<NodeId> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);

        while let Some(id) = queue.pop_front() {
            order.push(id);
            for &(from, to) in &self.edges {
                if from == id {
                    in_degree[to] -= 1;
                    if in_degree[to] == 0 {
                        queue.push_back(to);
                    }
                }
            }
        }

        if order.len() != n {
            return Err(GraphError::Cycle {
                visited: order.len(),
                total: n,
            });
        }
        Ok(order)
    }
}
