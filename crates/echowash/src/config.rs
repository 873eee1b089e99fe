//! Pipeline configuration.
//!
//! Options are collected through [`PipelineConfigBuilder`] and frozen into
//! an immutable [`PipelineConfig`] before the driver starts. All
//! rate/channel inconsistencies are rejected here, before any stream is
//! opened.

use std::fmt;

use echowash_audio::num_bands_for_rate;

/// Working rates the band-split filter bank has a layout for.
pub const SUPPORTED_WORKING_RATES: [u32; 4] = [8000, 16000, 32000, 48000];

// ─── Error ───────────────────────────────────────────────────────────

/// Configuration inconsistencies, rejected before the run starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The working rate has no band layout.
    UnsupportedWorkingRate(u32),
    /// A channel count was zero.
    BadChannelCount { stream: &'static str },
    /// The frame duration was zero.
    BadFrameDuration,
    /// A stream rate cannot form whole frames of the configured duration.
    FractionalFrame {
        sample_rate_hz: u32,
        frame_duration_ms: u32,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedWorkingRate(rate) => write!(
                f,
                "working rate {rate} Hz is unsupported (expected one of {SUPPORTED_WORKING_RATES:?})"
            ),
            Self::BadChannelCount { stream } => {
                write!(f, "{stream} channel count must be positive")
            }
            Self::BadFrameDuration => write!(f, "frame duration must be positive"),
            Self::FractionalFrame {
                sample_rate_hz,
                frame_duration_ms,
            } => write!(
                f,
                "{sample_rate_hz} Hz does not divide into whole {frame_duration_ms} ms frames"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

// ─── PipelineConfig ──────────────────────────────────────────────────

/// Immutable pipeline configuration, consumed at driver init.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    working_rate_hz: u32,
    working_channels: usize,
    output_rate_hz: u32,
    output_channels: usize,
    frame_duration_ms: u32,
    linear_aec_only: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            working_rate_hz: 16000,
            working_channels: 1,
            output_rate_hz: 16000,
            output_channels: 1,
            frame_duration_ms: 10,
            linear_aec_only: false,
        }
    }
}

impl PipelineConfig {
    /// Returns a builder initialized with the defaults (16 kHz mono working
    /// and output, 10 ms frames).
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::new()
    }

    /// Rate both stream buffers run at internally.
    #[inline]
    pub fn working_rate_hz(&self) -> u32 {
        self.working_rate_hz
    }

    /// Channel count both stream buffers run at internally.
    #[inline]
    pub fn working_channels(&self) -> usize {
        self.working_channels
    }

    /// Rate of the emitted output stream.
    #[inline]
    pub fn output_rate_hz(&self) -> u32 {
        self.output_rate_hz
    }

    /// Channel count of the emitted output stream.
    #[inline]
    pub fn output_channels(&self) -> usize {
        self.output_channels
    }

    /// Frame duration in milliseconds, uniform across all streams.
    #[inline]
    pub fn frame_duration_ms(&self) -> u32 {
        self.frame_duration_ms
    }

    /// Restrict the engine to its linear stage output.
    #[inline]
    pub fn linear_aec_only(&self) -> bool {
        self.linear_aec_only
    }

    /// Samples per channel in one working-rate frame.
    #[inline]
    pub fn working_frame_len(&self) -> usize {
        (self.working_rate_hz as u64 * self.frame_duration_ms as u64 / 1000) as usize
    }

    /// Samples per channel in one output-rate frame.
    #[inline]
    pub fn output_frame_len(&self) -> usize {
        (self.output_rate_hz as u64 * self.frame_duration_ms as u64 / 1000) as usize
    }

    /// Bands the working frame decomposes into (1 means no split).
    #[inline]
    pub fn num_bands(&self) -> usize {
        num_bands_for_rate(self.working_rate_hz)
    }

    /// Whether frames are band-split before processing.
    #[inline]
    pub fn split_enabled(&self) -> bool {
        self.num_bands() > 1
    }

    /// Check that a stream's native rate forms whole frames of the
    /// configured duration.
    pub fn check_stream_rate(&self, sample_rate_hz: u32) -> Result<(), ConfigError> {
        if sample_rate_hz == 0
            || (sample_rate_hz as u64 * self.frame_duration_ms as u64) % 1000 != 0
        {
            return Err(ConfigError::FractionalFrame {
                sample_rate_hz,
                frame_duration_ms: self.frame_duration_ms,
            });
        }
        Ok(())
    }
}

// ─── PipelineConfigBuilder ───────────────────────────────────────────

/// Builder for [`PipelineConfig`].
///
/// Output rate and channels default to the working values when unset.
#[derive(Debug, Clone)]
pub struct PipelineConfigBuilder {
    working_rate_hz: u32,
    working_channels: usize,
    output_rate_hz: Option<u32>,
    output_channels: Option<usize>,
    frame_duration_ms: u32,
    linear_aec_only: bool,
}

impl PipelineConfigBuilder {
    fn new() -> Self {
        Self {
            working_rate_hz: 16000,
            working_channels: 1,
            output_rate_hz: None,
            output_channels: None,
            frame_duration_ms: 10,
            linear_aec_only: false,
        }
    }

    /// Set the internal working rate.
    pub fn working_rate_hz(mut self, rate: u32) -> Self {
        self.working_rate_hz = rate;
        self
    }

    /// Set the internal working channel count.
    pub fn working_channels(mut self, channels: usize) -> Self {
        self.working_channels = channels;
        self
    }

    /// Set the output rate.
    pub fn output_rate_hz(mut self, rate: u32) -> Self {
        self.output_rate_hz = Some(rate);
        self
    }

    /// Set the output channel count.
    pub fn output_channels(mut self, channels: usize) -> Self {
        self.output_channels = Some(channels);
        self
    }

    /// Set the frame duration in milliseconds.
    pub fn frame_duration_ms(mut self, ms: u32) -> Self {
        self.frame_duration_ms = ms;
        self
    }

    /// Restrict the engine to its linear stage output.
    pub fn linear_aec_only(mut self, enabled: bool) -> Self {
        self.linear_aec_only = enabled;
        self
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<PipelineConfig, ConfigError> {
        if self.frame_duration_ms == 0 {
            return Err(ConfigError::BadFrameDuration);
        }
        if !SUPPORTED_WORKING_RATES.contains(&self.working_rate_hz) {
            return Err(ConfigError::UnsupportedWorkingRate(self.working_rate_hz));
        }
        if self.working_channels == 0 {
            return Err(ConfigError::BadChannelCount { stream: "working" });
        }
        let output_rate_hz = self.output_rate_hz.unwrap_or(self.working_rate_hz);
        let output_channels = self.output_channels.unwrap_or(self.working_channels);
        if output_channels == 0 {
            return Err(ConfigError::BadChannelCount { stream: "output" });
        }

        let config = PipelineConfig {
            working_rate_hz: self.working_rate_hz,
            working_channels: self.working_channels,
            output_rate_hz,
            output_channels,
            frame_duration_ms: self.frame_duration_ms,
            linear_aec_only: self.linear_aec_only,
        };
        // The supported working rates are all frame-exact for any whole
        // millisecond duration; the output rate may not be.
        config.check_stream_rate(output_rate_hz)?;
        Ok(config)
    }
}
