//! DSP stages of the hall reverb renderer.
//!
//! Every stage works on whole [`buffer::SampleBuffer`]s offline. The same
//! code runs natively (CLI) and in the browser through the WASM bindings.

pub mod buffer;
pub mod convolver;
pub mod filter;
pub mod impulse;
pub mod mixer;
pub mod normalize;
pub mod wav;
pub mod widener;
