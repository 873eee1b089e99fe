//! Planar per-channel storage for one audio frame.
//!
//! Samples live in a single contiguous allocation, one channel after another:
//!
//! ```text
//! [ ch0 samples | ch1 samples | ... ]
//! ```
//!
//! A `ChannelFrame` holds exactly one frame's worth of samples for every
//! channel at one rate; banded content is represented as one `ChannelFrame`
//! per band by the pipeline layer.

use derive_more::Debug;

/// One frame of planar (non-interleaved) f32 audio.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelFrame {
    #[debug(skip)]
    data: Vec<f32>,
    num_channels: usize,
    samples_per_channel: usize,
}

impl ChannelFrame {
    /// Create a zero-initialized frame.
    pub fn new(num_channels: usize, samples_per_channel: usize) -> Self {
        assert!(num_channels > 0, "num_channels must be > 0");
        Self {
            data: vec![0.0; num_channels * samples_per_channel],
            num_channels,
            samples_per_channel,
        }
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    pub fn samples_per_channel(&self) -> usize {
        self.samples_per_channel
    }

    /// One channel's samples.
    pub fn channel(&self, ch: usize) -> &[f32] {
        assert!(
            ch < self.num_channels,
            "channel {ch} out of range ({} channels)",
            self.num_channels
        );
        let start = ch * self.samples_per_channel;
        &self.data[start..start + self.samples_per_channel]
    }

    /// One channel's samples, mutable.
    pub fn channel_mut(&mut self, ch: usize) -> &mut [f32] {
        assert!(
            ch < self.num_channels,
            "channel {ch} out of range ({} channels)",
            self.num_channels
        );
        let start = ch * self.samples_per_channel;
        &mut self.data[start..start + self.samples_per_channel]
    }

    /// Iterate over channels in order.
    pub fn channels(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.samples_per_channel)
    }

    /// Iterate over channels in order, mutable.
    pub fn channels_mut(&mut self) -> impl Iterator<Item = &mut [f32]> {
        self.data.chunks_exact_mut(self.samples_per_channel)
    }

    /// The whole backing store, channel-major.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Copy sample data from a frame of identical shape.
    ///
    /// # Panics
    ///
    /// Panics if the shapes differ.
    pub fn copy_from(&mut self, other: &ChannelFrame) {
        assert_eq!(self.num_channels, other.num_channels, "channel count mismatch");
        assert_eq!(
            self.samples_per_channel, other.samples_per_channel,
            "frame length mismatch"
        );
        self.data.copy_from_slice(&other.data);
    }

    /// Zero all samples.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }
}

impl Default for ChannelFrame {
    /// An empty placeholder frame, useful for `std::mem::take` swaps.
    fn default() -> Self {
        Self {
            data: Vec::new(),
            num_channels: 1,
            samples_per_channel: 0,
        }
    }
}
