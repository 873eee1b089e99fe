//! Working frames.
//!
//! A [`Frame`] is one fixed-duration block of working-rate audio, tagged
//! with the stream it belongs to and its band-split state. The stream
//! buffer that produced a frame owns it; the engine only ever borrows it
//! for the duration of one call.

use std::fmt;
use std::slice;

use echowash_audio::ChannelFrame;

/// Logical role of a stream within the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamRole {
    /// Near end: microphone signal carrying the acoustic echo.
    Capture,
    /// Far end: loudspeaker reference signal.
    Render,
}

impl fmt::Display for StreamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamRole::Capture => write!(f, "capture"),
            StreamRole::Render => write!(f, "render"),
        }
    }
}

/// Band-split state of a frame's samples.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameContent {
    /// One full-band segment.
    Full(ChannelFrame),
    /// Sub-band segments, lowest band first.
    Banded(Vec<ChannelFrame>),
}

/// One working-rate frame of a single stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    role: StreamRole,
    content: FrameContent,
}

impl Frame {
    /// Create a full-band frame.
    pub fn full(role: StreamRole, segment: ChannelFrame) -> Self {
        Self {
            role,
            content: FrameContent::Full(segment),
        }
    }

    /// Create a band-split frame. `segments` is ordered lowest band first
    /// and must contain at least one band.
    pub fn banded(role: StreamRole, segments: Vec<ChannelFrame>) -> Self {
        assert!(!segments.is_empty(), "a banded frame needs at least one band");
        Self {
            role,
            content: FrameContent::Banded(segments),
        }
    }

    #[inline]
    pub fn role(&self) -> StreamRole {
        self.role
    }

    #[inline]
    pub fn is_banded(&self) -> bool {
        matches!(self.content, FrameContent::Banded(_))
    }

    /// Number of band segments; 1 for a full-band frame.
    #[inline]
    pub fn num_bands(&self) -> usize {
        match &self.content {
            FrameContent::Full(_) => 1,
            FrameContent::Banded(segments) => segments.len(),
        }
    }

    /// The full-band segment, if this frame has not been split.
    pub fn as_full(&self) -> Option<&ChannelFrame> {
        match &self.content {
            FrameContent::Full(segment) => Some(segment),
            FrameContent::Banded(_) => None,
        }
    }

    /// All segments in band order. A full-band frame yields one segment.
    pub fn segments(&self) -> &[ChannelFrame] {
        match &self.content {
            FrameContent::Full(segment) => slice::from_ref(segment),
            FrameContent::Banded(segments) => segments,
        }
    }

    /// Mutable view of all segments in band order.
    pub fn segments_mut(&mut self) -> &mut [ChannelFrame] {
        match &mut self.content {
            FrameContent::Full(segment) => slice::from_mut(segment),
            FrameContent::Banded(segments) => segments,
        }
    }

    /// The lowest band, or the whole frame when unsplit.
    #[inline]
    pub fn lowest_band(&self) -> &ChannelFrame {
        &self.segments()[0]
    }

    /// Mutable access to the lowest band.
    #[inline]
    pub fn lowest_band_mut(&mut self) -> &mut ChannelFrame {
        &mut self.segments_mut()[0]
    }

    /// Replace this frame's content, handing back the previous content so
    /// its storage can be reused.
    pub(crate) fn replace_content(&mut self, content: FrameContent) -> FrameContent {
        std::mem::replace(&mut self.content, content)
    }
}
