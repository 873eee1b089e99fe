//! DSP primitives for the echowash pipeline.
//!
//! Contains planar frame storage, sample format conversion, band-splitting
//! filter banks, and frame-exact sample rate conversion.

pub mod band_split;
pub mod channel_frame;
pub mod frame_resampler;
pub mod sample_convert;

mod three_band;

pub use band_split::{num_bands_for_rate, BandSplitter};
pub use channel_frame::ChannelFrame;
pub use frame_resampler::{FrameResampler, ResampleError};
