//! DSP nodes — the signal-processing stages of the effect graph.
//!
//! Every stage processes stereo blocks in place. The same nodes serve the
//! live preview (pulled by an AudioWorklet through WASM) and the offline
//! export render, so both paths produce matching audio.

pub mod analyser;
pub mod chorus;
pub mod convolver;
pub mod delay;
pub mod filter;
pub mod impulse;
pub mod source;
