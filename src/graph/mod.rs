//! Effect graph — topology, validation, and block execution.
//!
//! The topology is described once as data ([`GraphDescription`]), built by
//! [`build_description`], and executed by a [`Processor`]. The live preview
//! wraps a processor in an [`EffectGraph`]; the offline renderer drives a
//! fresh one of its own.

pub mod builder;
pub mod description;
pub mod live;
pub mod processor;

pub use builder::{BuildOptions, GraphHandles, build_description};
pub use description::{GraphDescription, NodeId, NodeSpec};
pub use live::EffectGraph;
pub use processor::{Processor, ProcessorSettings};
