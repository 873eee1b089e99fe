//! Stream buffers.
//!
//! One [`StreamBuffer`] per stream normalizes source-rate interleaved
//! samples into the working representation (channel map, then resample),
//! holds the current working frame, band-splits it on demand, and
//! reassembles/converts it for emission. Frame storage is recycled across
//! cycles; after the first frame the steady state allocates nothing.
//!
//! Band-split filter state lives inside the buffer's splitter and persists
//! across frames for the whole run.

use std::fmt;
use std::mem;

use echowash_audio::sample_convert::{deinterleave, downmix_to_mono, interleave};
use echowash_audio::{BandSplitter, ChannelFrame, FrameResampler, ResampleError};

use crate::config::PipelineConfig;
use crate::frame::{Frame, FrameContent, StreamRole};

// ─── Error ───────────────────────────────────────────────────────────

/// Transcoding failures between native, working, and output formats.
/// Fatal to the run; there are no retries.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionError {
    /// No supported mapping between the two channel counts.
    ChannelMapping { from: usize, to: usize },
    /// The rate converter rejected the rate pair or failed on a frame.
    Resample(ResampleError),
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChannelMapping { from, to } => {
                write!(f, "no supported mapping from {from} to {to} channels")
            }
            Self::Resample(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ConversionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Resample(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ResampleError> for ConversionError {
    fn from(e: ResampleError) -> Self {
        Self::Resample(e)
    }
}

// ─── Channel mapping ─────────────────────────────────────────────────

fn check_channel_mapping(from: usize, to: usize) -> Result<(), ConversionError> {
    // Supported mappings: identity, any -> mono, mono -> any.
    if from == to || from == 1 || to == 1 {
        Ok(())
    } else {
        Err(ConversionError::ChannelMapping { from, to })
    }
}

fn map_channels(src: &ChannelFrame, dst: &mut ChannelFrame) {
    debug_assert_eq!(src.samples_per_channel(), dst.samples_per_channel());
    let (from, to) = (src.num_channels(), dst.num_channels());
    if from == to {
        dst.copy_from(src);
    } else if to == 1 {
        let channels: Vec<&[f32]> = src.channels().collect();
        downmix_to_mono(&channels, dst.channel_mut(0));
    } else if from == 1 {
        let mono = src.channel(0);
        for ch in dst.channels_mut() {
            ch.copy_from_slice(mono);
        }
    } else {
        unreachable!("channel mapping checked at construction");
    }
}

// ─── StreamBuffer ────────────────────────────────────────────────────

/// Normalizes one stream between its native format and the shared working
/// representation.
#[derive(derive_more::Debug)]
pub struct StreamBuffer {
    role: StreamRole,
    /// Interleaved samples in one native-rate frame.
    native_samples: usize,
    /// Interleaved samples in one output-rate frame.
    output_samples: usize,

    // Ingest path: deinterleave, channel map, resample.
    #[debug(skip)]
    native_planar: ChannelFrame,
    #[debug(skip)]
    ingest_mapped: ChannelFrame,
    ingest_resampler: FrameResampler,

    /// The current working frame, full-band or split.
    frame: Frame,
    #[debug(skip)]
    splitter: Option<BandSplitter>,

    // Recycled storage. Exactly one full-band frame and one band vector
    // circulate between `frame` and these spares.
    #[debug(skip)]
    spare_full: ChannelFrame,
    #[debug(skip)]
    spare_bands: Vec<ChannelFrame>,

    // Emit path: merge, resample, channel map, interleave.
    emit_resampler: FrameResampler,
    #[debug(skip)]
    emit_resampled: ChannelFrame,
    #[debug(skip)]
    emit_mapped: ChannelFrame,
}

impl StreamBuffer {
    /// Create a buffer converting between the stream's native format and
    /// the configured working/output formats. Unsupported channel mappings
    /// and rate pairs are rejected here, before any cycle runs.
    pub fn new(
        role: StreamRole,
        native_rate_hz: u32,
        native_channels: usize,
        config: &PipelineConfig,
    ) -> Result<Self, ConversionError> {
        assert!(native_rate_hz > 0, "native rate must be positive");
        assert!(native_channels > 0, "native channel count must be positive");

        let working_channels = config.working_channels();
        check_channel_mapping(native_channels, working_channels)?;
        check_channel_mapping(working_channels, config.output_channels())?;

        let frame_ms = config.frame_duration_ms();
        let native_len = (native_rate_hz as u64 * frame_ms as u64 / 1000) as usize;
        let working_len = config.working_frame_len();
        let output_len = config.output_frame_len();

        let ingest_resampler = FrameResampler::new(
            native_rate_hz,
            config.working_rate_hz(),
            native_len,
            working_channels,
        )?;
        let emit_resampler = FrameResampler::new(
            config.working_rate_hz(),
            config.output_rate_hz(),
            working_len,
            working_channels,
        )?;

        let num_bands = config.num_bands();
        let splitter = if num_bands > 1 {
            Some(BandSplitter::new(num_bands, working_channels))
        } else {
            None
        };
        let spare_bands = if num_bands > 1 {
            (0..num_bands)
                .map(|_| ChannelFrame::new(working_channels, working_len / num_bands))
                .collect()
        } else {
            Vec::new()
        };

        Ok(Self {
            role,
            native_samples: native_len * native_channels,
            output_samples: output_len * config.output_channels(),
            native_planar: ChannelFrame::new(native_channels, native_len),
            ingest_mapped: ChannelFrame::new(working_channels, native_len),
            ingest_resampler,
            frame: Frame::full(role, ChannelFrame::new(working_channels, working_len)),
            splitter,
            spare_full: ChannelFrame::default(),
            spare_bands,
            emit_resampler,
            emit_resampled: ChannelFrame::new(working_channels, output_len),
            emit_mapped: ChannelFrame::new(config.output_channels(), output_len),
        })
    }

    #[inline]
    pub fn role(&self) -> StreamRole {
        self.role
    }

    /// Interleaved samples one call to [`ingest`](Self::ingest) consumes.
    #[inline]
    pub fn native_samples_per_frame(&self) -> usize {
        self.native_samples
    }

    /// Interleaved samples one call to [`emit`](Self::emit) produces.
    #[inline]
    pub fn output_samples_per_frame(&self) -> usize {
        self.output_samples
    }

    /// The current working frame.
    #[inline]
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Mutable access to the current working frame.
    #[inline]
    pub fn frame_mut(&mut self) -> &mut Frame {
        &mut self.frame
    }

    /// Consume one native-rate frame of interleaved samples into the
    /// working frame.
    ///
    /// Returns `Ok(false)` without touching the buffer when `raw_samples`
    /// holds fewer samples than one native frame (a short read at stream
    /// end); the previous frame is retained.
    pub fn ingest(&mut self, raw_samples: &[f32]) -> Result<bool, ConversionError> {
        if raw_samples.len() < self.native_samples {
            return Ok(false);
        }
        debug_assert_eq!(
            raw_samples.len(),
            self.native_samples,
            "ingest takes exactly one native frame"
        );

        let native_len = self.native_planar.samples_per_channel();
        let native_channels = self.native_planar.num_channels();
        {
            let mut channels: Vec<&mut [f32]> = self.native_planar.channels_mut().collect();
            deinterleave(
                &raw_samples[..self.native_samples],
                &mut channels,
                native_len,
                native_channels,
            );
        }
        map_channels(&self.native_planar, &mut self.ingest_mapped);

        self.reclaim_frame();
        self.ingest_resampler
            .resample(&self.ingest_mapped, &mut self.spare_full)?;
        let segment = mem::take(&mut self.spare_full);
        self.frame.replace_content(FrameContent::Full(segment));
        Ok(true)
    }

    /// Decompose the working frame into sub-bands, lowest first. A no-op
    /// when the working rate needs no split.
    pub fn split_bands(&mut self) {
        let Some(splitter) = &mut self.splitter else {
            return;
        };
        if self.frame.is_banded() {
            debug_assert!(false, "split_bands called twice in one cycle");
            return;
        }

        let content = self
            .frame
            .replace_content(FrameContent::Full(ChannelFrame::default()));
        let FrameContent::Full(full) = content else {
            unreachable!("checked above")
        };
        splitter.analyze(&full, &mut self.spare_bands);
        self.spare_full = full;
        let bands = mem::take(&mut self.spare_bands);
        self.frame.replace_content(FrameContent::Banded(bands));
    }

    /// Reassemble sub-bands (if present), convert to the output format,
    /// and write one output-rate frame of interleaved samples into `out`.
    pub fn emit(&mut self, out: &mut [f32]) -> Result<(), ConversionError> {
        assert_eq!(
            out.len(),
            self.output_samples,
            "emit fills exactly one output frame"
        );

        self.merge_bands();
        let Some(segment) = self.frame.as_full() else {
            unreachable!("bands were merged")
        };
        self.emit_resampler
            .resample(segment, &mut self.emit_resampled)?;
        map_channels(&self.emit_resampled, &mut self.emit_mapped);

        let out_len = self.emit_mapped.samples_per_channel();
        let out_channels = self.emit_mapped.num_channels();
        let channels: Vec<&[f32]> = self.emit_mapped.channels().collect();
        interleave(&channels, out, out_len, out_channels);
        Ok(())
    }

    fn merge_bands(&mut self) {
        if !self.frame.is_banded() {
            return;
        }
        let Some(splitter) = &mut self.splitter else {
            unreachable!("banded frames only exist with a splitter")
        };

        let content = self
            .frame
            .replace_content(FrameContent::Full(ChannelFrame::default()));
        let FrameContent::Banded(bands) = content else {
            unreachable!("checked above")
        };
        splitter.synthesize(&bands, &mut self.spare_full);
        self.spare_bands = bands;
        let full = mem::take(&mut self.spare_full);
        self.frame.replace_content(FrameContent::Full(full));
    }

    /// Pull the previous cycle's frame storage back into the spares.
    fn reclaim_frame(&mut self) {
        let content = self
            .frame
            .replace_content(FrameContent::Full(ChannelFrame::default()));
        match content {
            FrameContent::Full(segment) => self.spare_full = segment,
            FrameContent::Banded(bands) => self.spare_bands = bands,
        }
    }
}
