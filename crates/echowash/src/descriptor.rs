//! Stream descriptors.
//!
//! A [`StreamDescriptor`] captures the immutable properties of an opened
//! stream: its rate, channel layout, and declared length. Frame arithmetic
//! derives from it; a trailing partial frame never counts.

/// Properties of an audio stream, fixed once the stream is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamDescriptor {
    sample_rate_hz: u32,
    num_channels: usize,
    /// Declared number of interleaved samples across all channels. Comes
    /// from container metadata and may overstate the data actually present.
    total_samples: u64,
}

impl StreamDescriptor {
    /// Create a new descriptor.
    pub fn new(sample_rate_hz: u32, num_channels: usize, total_samples: u64) -> Self {
        assert!(sample_rate_hz > 0, "sample rate must be positive");
        assert!(num_channels > 0, "channel count must be positive");
        Self {
            sample_rate_hz,
            num_channels,
            total_samples,
        }
    }

    /// The sampling rate in Hz.
    #[inline]
    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    /// The number of channels.
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Declared interleaved sample count across all channels.
    #[inline]
    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    /// Samples per channel in one frame of the given duration.
    #[inline]
    pub fn frame_length_samples(&self, frame_duration_ms: u32) -> usize {
        (self.sample_rate_hz as u64 * frame_duration_ms as u64 / 1000) as usize
    }

    /// Interleaved samples in one frame across all channels.
    #[inline]
    pub fn samples_per_frame(&self, frame_duration_ms: u32) -> usize {
        self.frame_length_samples(frame_duration_ms) * self.num_channels
    }

    /// Whole frames the declared length holds. Integer division: a trailing
    /// partial frame is dropped.
    pub fn frame_count(&self, frame_duration_ms: u32) -> u64 {
        let per_frame = self.samples_per_frame(frame_duration_ms) as u64;
        if per_frame == 0 {
            return 0;
        }
        self.total_samples / per_frame
    }
}
