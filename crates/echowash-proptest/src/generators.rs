//! Stream and frame generators for property-based testing.
//!
//! Provides both strategy functions (for use with `#[strategy(...)]`) and
//! `Arbitrary`-deriving structs describing pipeline inputs.

use echowash::descriptor::StreamDescriptor;
use echowash_audio::ChannelFrame;
use proptest::prelude::*;
use test_strategy::Arbitrary;

/// A working rate the pipeline accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum WorkingRate {
    #[weight(1)]
    Hz8000,
    #[weight(1)]
    Hz16000,
    #[weight(1)]
    Hz32000,
    #[weight(1)]
    Hz48000,
}

impl WorkingRate {
    pub fn hz(self) -> u32 {
        match self {
            Self::Hz8000 => 8000,
            Self::Hz16000 => 16000,
            Self::Hz32000 => 32000,
            Self::Hz48000 => 48000,
        }
    }

    /// Samples per channel in a 10 ms frame at this rate.
    pub fn frame_len(self) -> usize {
        (self.hz() / 100) as usize
    }
}

/// A native stream rate that forms whole 10 ms frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum NativeRate {
    #[weight(1)]
    Hz8000,
    #[weight(1)]
    Hz16000,
    #[weight(1)]
    Hz32000,
    #[weight(1)]
    Hz44100,
    #[weight(1)]
    Hz48000,
}

impl NativeRate {
    pub fn hz(self) -> u32 {
        match self {
            Self::Hz8000 => 8000,
            Self::Hz16000 => 16000,
            Self::Hz32000 => 32000,
            Self::Hz44100 => 44100,
            Self::Hz48000 => 48000,
        }
    }

    /// Samples per channel in a 10 ms frame at this rate.
    pub fn frame_len(self) -> usize {
        (self.hz() / 100) as usize
    }
}

/// A channel count the pipeline can map to and from mono.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum ChannelCount {
    #[weight(1)]
    Mono,
    #[weight(1)]
    Stereo,
}

impl ChannelCount {
    pub fn count(self) -> usize {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
        }
    }
}

/// One interleaved 10 ms frame of samples in [-1, 1].
pub fn frame_f32(sample_rate: u32, num_channels: usize) -> impl Strategy<Value = Vec<f32>> {
    let len = (sample_rate / 100) as usize * num_channels;
    proptest::collection::vec(-1.0f32..=1.0f32, len..=len)
}

/// One 10 ms frame of i16 samples.
pub fn frame_i16(sample_rate: u32) -> impl Strategy<Value = Vec<i16>> {
    let len = (sample_rate / 100) as usize;
    proptest::collection::vec(i16::MIN..=i16::MAX, len..=len)
}

/// A whole number of interleaved 10 ms frames, up to `max_frames`.
pub fn stream_f32(
    sample_rate: u32,
    num_channels: usize,
    max_frames: usize,
) -> impl Strategy<Value = Vec<f32>> {
    let frame = (sample_rate / 100) as usize * num_channels;
    (0..=max_frames).prop_flat_map(move |n| {
        proptest::collection::vec(-1.0f32..=1.0f32, n * frame..=n * frame)
    })
}

/// One planar 10 ms frame.
pub fn channel_frame(sample_rate: u32, num_channels: usize) -> impl Strategy<Value = ChannelFrame> {
    let len = (sample_rate / 100) as usize;
    proptest::collection::vec(-1.0f32..=1.0f32, len * num_channels).prop_map(move |flat| {
        let mut frame = ChannelFrame::new(num_channels, len);
        for (ch, chunk) in frame.channels_mut().zip(flat.chunks_exact(len)) {
            ch.copy_from_slice(chunk);
        }
        frame
    })
}

/// An interleaved stream together with its format, holding a whole number
/// of 10 ms frames.
#[derive(Debug, Clone, Arbitrary)]
pub struct StreamInput {
    pub rate: NativeRate,
    pub channels: ChannelCount,
    #[strategy(stream_f32(#rate.hz(), #channels.count(), 6))]
    pub samples: Vec<f32>,
}

impl StreamInput {
    /// Descriptor matching the generated data exactly.
    pub fn descriptor(&self) -> StreamDescriptor {
        StreamDescriptor::new(
            self.rate.hz(),
            self.channels.count(),
            self.samples.len() as u64,
        )
    }

    /// Whole 10 ms frames in the stream.
    pub fn frame_count(&self) -> u64 {
        self.descriptor().frame_count(10)
    }
}
