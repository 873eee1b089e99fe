//! Echo-cancellation engine contract and the AEC3-backed implementation.
//!
//! The driver talks to the engine through [`EchoEngine`], one narrow trait
//! with the three per-cycle calls. The engine is stateful across a run and
//! is never reset mid-run; a fresh instance is built for every run.

use std::fmt;

use aec3::voip::VoipAec3;

use crate::config::PipelineConfig;
use crate::frame::{Frame, StreamRole};

/// Rate of the band the inner canceller runs at.
const CANCELLER_BAND_RATE: u32 = 16000;

// ─── Error ───────────────────────────────────────────────────────────

/// Engine failures. All of them abort the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The working format violates the engine's contract.
    Unsupported(String),
    /// The underlying canceller could not be constructed.
    Setup(String),
    /// The underlying canceller failed on a frame.
    Process(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported(detail) => {
                write!(f, "engine cannot run with this configuration: {detail}")
            }
            Self::Setup(detail) => write!(f, "engine setup failed: {detail}"),
            Self::Process(detail) => write!(f, "engine processing failed: {detail}"),
        }
    }
}

impl std::error::Error for EngineError {}

// ─── EchoEngine ──────────────────────────────────────────────────────

/// Per-cycle engine operations, in the order the driver issues them.
///
/// Within one cycle the driver calls [`analyze_capture`] on the full-band
/// capture frame, then [`analyze_render`] on the (possibly band-split)
/// render frame, then [`process_capture`] on the capture frame in the same
/// split state. Frames are borrowed for one call only; implementations must
/// copy anything they need beyond it.
///
/// [`analyze_capture`]: EchoEngine::analyze_capture
/// [`analyze_render`]: EchoEngine::analyze_render
/// [`process_capture`]: EchoEngine::process_capture
pub trait EchoEngine {
    /// Observe the capture frame before any band split.
    fn analyze_capture(&mut self, frame: &Frame) -> Result<(), EngineError>;

    /// Observe the render frame for this cycle.
    fn analyze_render(&mut self, frame: &Frame) -> Result<(), EngineError>;

    /// Clean the capture frame in place.
    ///
    /// `linear_aec_only` asks for the linear-stage output without the
    /// non-linear suppressor; engines without a separable linear stage may
    /// ignore it.
    fn process_capture(
        &mut self,
        frame: &mut Frame,
        linear_aec_only: bool,
    ) -> Result<(), EngineError>;
}

// ─── Aec3Engine ──────────────────────────────────────────────────────

/// [`EchoEngine`] backed by the AEC3 port's VoIP wrapper.
///
/// The inner canceller consumes 10 ms mono blocks at 16 kHz, so it operates
/// on the lowest band of the working frame: the whole frame at a 16 kHz
/// working rate, sub-band 0 at 32 or 48 kHz. Upper bands pass through
/// unchanged.
#[derive(derive_more::Debug)]
pub struct Aec3Engine {
    #[debug(skip)]
    inner: VoipAec3,
    /// Samples per channel in the band the canceller sees.
    band_frame_len: usize,
    /// Render band stashed by `analyze_render` for the cycle's process call.
    #[debug(skip)]
    render_band: Vec<f32>,
    /// Cleaned capture block written back into the frame.
    #[debug(skip)]
    processed: Vec<f32>,
    render_primed: bool,
}

impl Aec3Engine {
    /// Build a fresh engine for one run.
    pub fn new(config: &PipelineConfig) -> Result<Self, EngineError> {
        if config.working_channels() != 1 {
            return Err(EngineError::Unsupported(format!(
                "the canceller is mono, got {} working channels",
                config.working_channels()
            )));
        }
        if config.frame_duration_ms() != 10 {
            return Err(EngineError::Unsupported(format!(
                "the canceller consumes 10 ms frames, got {} ms",
                config.frame_duration_ms()
            )));
        }
        if config.working_rate_hz() < CANCELLER_BAND_RATE {
            return Err(EngineError::Unsupported(format!(
                "working rate {} Hz is below the canceller's {CANCELLER_BAND_RATE} Hz band rate",
                config.working_rate_hz()
            )));
        }
        if config.linear_aec_only() {
            tracing::warn!("linear AEC output requested; this engine always emits its full output");
        }

        let inner = VoipAec3::builder(CANCELLER_BAND_RATE as usize, 1, 1)
            .build()
            .map_err(|e| EngineError::Setup(format!("{e:?}")))?;

        let band_frame_len = config.working_frame_len() / config.num_bands();
        debug_assert_eq!(band_frame_len, CANCELLER_BAND_RATE as usize / 100);

        Ok(Self {
            inner,
            band_frame_len,
            render_band: vec![0.0; band_frame_len],
            processed: vec![0.0; band_frame_len],
            render_primed: false,
        })
    }
}

impl EchoEngine for Aec3Engine {
    fn analyze_capture(&mut self, frame: &Frame) -> Result<(), EngineError> {
        // The VoIP wrapper has no pre-split analysis entry; the capture
        // samples reach the canceller in process_capture.
        debug_assert_eq!(frame.role(), StreamRole::Capture);
        debug_assert!(!frame.is_banded(), "capture analysis sees the full-band frame");
        Ok(())
    }

    fn analyze_render(&mut self, frame: &Frame) -> Result<(), EngineError> {
        debug_assert_eq!(frame.role(), StreamRole::Render);
        let band = frame.lowest_band();
        debug_assert_eq!(band.num_channels(), 1);
        debug_assert_eq!(band.samples_per_channel(), self.band_frame_len);
        self.render_band.copy_from_slice(band.channel(0));
        self.render_primed = true;
        Ok(())
    }

    fn process_capture(
        &mut self,
        frame: &mut Frame,
        _linear_aec_only: bool,
    ) -> Result<(), EngineError> {
        debug_assert_eq!(frame.role(), StreamRole::Capture);
        debug_assert!(self.render_primed, "render frame not analyzed this cycle");

        let band = frame.lowest_band_mut();
        debug_assert_eq!(band.num_channels(), 1);
        debug_assert_eq!(band.samples_per_channel(), self.band_frame_len);

        self.inner
            .process(band.channel(0), Some(&self.render_band), false, &mut self.processed)
            .map_err(|e| EngineError::Process(format!("{e:?}")))?;
        band.channel_mut(0).copy_from_slice(&self.processed);
        Ok(())
    }
}
