//! Pipeline driver.
//!
//! The driver owns both stream buffers, the engine, and the output sink
//! for exactly one run. It moves through `Init -> Running -> Drained` and
//! executes one cycle per frame:
//!
//! read capture, read render, convert both into the working format,
//! analyze capture (full band), split bands on both buffers, analyze
//! render, process capture, emit, write to the sink.
//!
//! Mismatched stream lengths truncate silently to the shorter stream; the
//! longer stream's excess frames are never read. A source that ends before
//! its descriptor said it would stops the run with a warning, before the
//! half-read cycle reaches the engine.

use std::fmt;

use crate::config::{ConfigError, PipelineConfig};
use crate::engine::{EchoEngine, EngineError};
use crate::frame::StreamRole;
use crate::stream_buffer::{ConversionError, StreamBuffer};
use crate::wav_io::{SinkError, SourceError, StreamSink, StreamSource};

// ─── Error ───────────────────────────────────────────────────────────

/// Fatal run failures. There are no retries; frames already written to
/// the sink are retained.
#[derive(Debug)]
pub enum PipelineError {
    Config(ConfigError),
    Conversion(ConversionError),
    Source(SourceError),
    Sink(SinkError),
    Engine(EngineError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "configuration: {e}"),
            Self::Conversion(e) => write!(f, "conversion: {e}"),
            Self::Source(e) => write!(f, "source: {e}"),
            Self::Sink(e) => write!(f, "sink: {e}"),
            Self::Engine(e) => write!(f, "engine: {e}"),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Conversion(e) => Some(e),
            Self::Source(e) => Some(e),
            Self::Sink(e) => Some(e),
            Self::Engine(e) => Some(e),
        }
    }
}

impl From<ConfigError> for PipelineError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<ConversionError> for PipelineError {
    fn from(e: ConversionError) -> Self {
        Self::Conversion(e)
    }
}

impl From<SourceError> for PipelineError {
    fn from(e: SourceError) -> Self {
        Self::Source(e)
    }
}

impl From<SinkError> for PipelineError {
    fn from(e: SinkError) -> Self {
        Self::Sink(e)
    }
}

impl From<EngineError> for PipelineError {
    fn from(e: EngineError) -> Self {
        Self::Engine(e)
    }
}

// ─── RunReport ───────────────────────────────────────────────────────

/// Outcome of a drained run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Cycles the descriptors predicted: the smaller stream's frame count.
    pub frames_expected: u64,
    /// Frames actually processed and written.
    pub frames_processed: u64,
    /// Stream whose data ran out before its descriptor said it would.
    pub short_read: Option<StreamRole>,
}

impl RunReport {
    /// Whether every predicted frame was processed.
    pub fn is_complete(&self) -> bool {
        self.frames_processed == self.frames_expected && self.short_read.is_none()
    }
}

// ─── PipelineDriver ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriverState {
    Init,
    Running,
    Drained,
}

/// Drives one batch run over a capture source, a render source, an
/// engine, and an output sink, all exclusively owned for the run.
#[derive(derive_more::Debug)]
pub struct PipelineDriver<C, R, S, E> {
    config: PipelineConfig,
    #[debug(skip)]
    capture_source: C,
    #[debug(skip)]
    render_source: R,
    #[debug(skip)]
    sink: S,
    #[debug(skip)]
    engine: E,
    #[debug(skip)]
    capture: StreamBuffer,
    #[debug(skip)]
    render: StreamBuffer,
    state: DriverState,
    frames_expected: u64,
    frames_processed: u64,
    short_read: Option<StreamRole>,
    #[debug(skip)]
    raw_capture: Vec<f32>,
    #[debug(skip)]
    raw_render: Vec<f32>,
    #[debug(skip)]
    out_frame: Vec<f32>,
}

impl<C, R, S, E> PipelineDriver<C, R, S, E>
where
    C: StreamSource,
    R: StreamSource,
    S: StreamSink,
    E: EchoEngine,
{
    /// Open the pipeline: validate the stream formats against the
    /// configuration, build both buffers, and fix the cycle count from
    /// the descriptors. No samples are read yet.
    pub fn new(
        config: PipelineConfig,
        capture_source: C,
        render_source: R,
        sink: S,
        engine: E,
    ) -> Result<Self, PipelineError> {
        let capture_desc = capture_source.descriptor();
        let render_desc = render_source.descriptor();
        config.check_stream_rate(capture_desc.sample_rate_hz())?;
        config.check_stream_rate(render_desc.sample_rate_hz())?;

        let capture = StreamBuffer::new(
            StreamRole::Capture,
            capture_desc.sample_rate_hz(),
            capture_desc.num_channels(),
            &config,
        )?;
        let render = StreamBuffer::new(
            StreamRole::Render,
            render_desc.sample_rate_hz(),
            render_desc.num_channels(),
            &config,
        )?;

        let frame_ms = config.frame_duration_ms();
        let capture_frames = capture_desc.frame_count(frame_ms);
        let render_frames = render_desc.frame_count(frame_ms);
        let frames_expected = capture_frames.min(render_frames);
        tracing::debug!(
            capture_frames,
            render_frames,
            frames_expected,
            working_rate_hz = config.working_rate_hz(),
            num_bands = config.num_bands(),
            "pipeline initialized"
        );

        let raw_capture = vec![0.0; capture.native_samples_per_frame()];
        let raw_render = vec![0.0; render.native_samples_per_frame()];
        let out_frame = vec![0.0; capture.output_samples_per_frame()];
        Ok(Self {
            config,
            capture_source,
            render_source,
            sink,
            engine,
            capture,
            render,
            state: DriverState::Init,
            frames_expected,
            frames_processed: 0,
            short_read: None,
            raw_capture,
            raw_render,
            out_frame,
        })
    }

    /// Cycles the descriptors predict for this run.
    pub fn frames_expected(&self) -> u64 {
        self.frames_expected
    }

    /// Execute the run to completion. Consumes the driver; every stream
    /// handle is released on return, on success and on abort alike.
    pub fn run(mut self) -> Result<RunReport, PipelineError> {
        let result = self.run_cycles();
        if let Err(e) = &result {
            tracing::error!("run aborted after {} frames: {e}", self.frames_processed);
        }
        result
    }

    fn run_cycles(&mut self) -> Result<RunReport, PipelineError> {
        debug_assert_eq!(self.state, DriverState::Init);
        self.state = if self.frames_expected == 0 {
            DriverState::Drained
        } else {
            DriverState::Running
        };

        while self.frames_processed < self.frames_expected {
            if !self.read_both()? {
                break;
            }
            self.cycle()?;
            self.frames_processed += 1;
        }

        self.state = DriverState::Drained;
        self.sink.finalize()?;
        let report = RunReport {
            frames_expected: self.frames_expected,
            frames_processed: self.frames_processed,
            short_read: self.short_read,
        };
        tracing::debug!(frames = report.frames_processed, "run drained");
        Ok(report)
    }

    /// Read one frame from each source. Returns `Ok(false)` when either
    /// stream ends early; the cycle must not run in that case.
    fn read_both(&mut self) -> Result<bool, PipelineError> {
        let got = self.capture_source.read_frame(&mut self.raw_capture)?;
        if got < self.raw_capture.len() {
            self.note_short_read(StreamRole::Capture, got, self.raw_capture.len());
            return Ok(false);
        }
        let got = self.render_source.read_frame(&mut self.raw_render)?;
        if got < self.raw_render.len() {
            self.note_short_read(StreamRole::Render, got, self.raw_render.len());
            return Ok(false);
        }
        Ok(true)
    }

    fn note_short_read(&mut self, role: StreamRole, got: usize, wanted: usize) {
        // The descriptor promised more data than the stream holds.
        tracing::warn!(
            "{role} stream ended early at frame {}/{}: got {got} of {wanted} samples",
            self.frames_processed + 1,
            self.frames_expected,
        );
        self.short_read = Some(role);
    }

    fn cycle(&mut self) -> Result<(), PipelineError> {
        debug_assert_eq!(self.state, DriverState::Running);

        let consumed = self.capture.ingest(&self.raw_capture)?;
        debug_assert!(consumed, "reads are full frames by the time they reach ingest");
        let consumed = self.render.ingest(&self.raw_render)?;
        debug_assert!(consumed, "reads are full frames by the time they reach ingest");

        self.engine.analyze_capture(self.capture.frame())?;
        self.capture.split_bands();
        self.render.split_bands();
        self.engine.analyze_render(self.render.frame())?;
        self.engine
            .process_capture(self.capture.frame_mut(), self.config.linear_aec_only())?;

        self.capture.emit(&mut self.out_frame)?;
        self.sink.write_frame(&self.out_frame)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;
    use crate::descriptor::StreamDescriptor;
    use crate::engine::Aec3Engine;
    use crate::frame::Frame;

    // ── Test doubles ────────────────────────────────────────────────

    struct MemorySource {
        descriptor: StreamDescriptor,
        samples: Vec<f32>,
        pos: usize,
        reads: Rc<Cell<u64>>,
    }

    impl MemorySource {
        /// Descriptor matches the data exactly.
        fn new(sample_rate_hz: u32, num_channels: usize, samples: Vec<f32>) -> Self {
            let total = samples.len() as u64;
            Self::with_declared_total(sample_rate_hz, num_channels, samples, total)
        }

        /// Descriptor declares `declared_total` samples regardless of how
        /// many are actually present.
        fn with_declared_total(
            sample_rate_hz: u32,
            num_channels: usize,
            samples: Vec<f32>,
            declared_total: u64,
        ) -> Self {
            Self {
                descriptor: StreamDescriptor::new(sample_rate_hz, num_channels, declared_total),
                samples,
                pos: 0,
                reads: Rc::new(Cell::new(0)),
            }
        }

        fn read_counter(&self) -> Rc<Cell<u64>> {
            Rc::clone(&self.reads)
        }
    }

    impl StreamSource for MemorySource {
        fn descriptor(&self) -> StreamDescriptor {
            self.descriptor
        }

        fn read_frame(&mut self, out: &mut [f32]) -> Result<usize, SourceError> {
            self.reads.set(self.reads.get() + 1);
            let available = self.samples.len() - self.pos;
            let n = available.min(out.len());
            out[..n].copy_from_slice(&self.samples[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[derive(Clone, Default)]
    struct MemorySink {
        data: Rc<RefCell<Vec<f32>>>,
        finalized: Rc<Cell<bool>>,
    }

    impl StreamSink for MemorySink {
        fn write_frame(&mut self, samples: &[f32]) -> Result<(), SinkError> {
            if self.finalized.get() {
                return Err(SinkError::Closed);
            }
            self.data.borrow_mut().extend_from_slice(samples);
            Ok(())
        }

        fn finalize(&mut self) -> Result<(), SinkError> {
            self.finalized.set(true);
            Ok(())
        }
    }

    /// Engine that does nothing to the signal.
    struct PassthroughEngine;

    impl EchoEngine for PassthroughEngine {
        fn analyze_capture(&mut self, _frame: &Frame) -> Result<(), EngineError> {
            Ok(())
        }
        fn analyze_render(&mut self, _frame: &Frame) -> Result<(), EngineError> {
            Ok(())
        }
        fn process_capture(
            &mut self,
            _frame: &mut Frame,
            _linear_aec_only: bool,
        ) -> Result<(), EngineError> {
            Ok(())
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum EngineCall {
        AnalyzeCapture { bands: usize, banded: bool },
        AnalyzeRender { bands: usize, banded: bool },
        ProcessCapture { bands: usize, banded: bool, linear: bool },
    }

    /// Engine that records every call and its band state.
    struct RecordingEngine {
        calls: Rc<RefCell<Vec<EngineCall>>>,
    }

    impl RecordingEngine {
        fn new() -> (Self, Rc<RefCell<Vec<EngineCall>>>) {
            let calls = Rc::new(RefCell::new(Vec::new()));
            (
                Self {
                    calls: Rc::clone(&calls),
                },
                calls,
            )
        }
    }

    impl EchoEngine for RecordingEngine {
        fn analyze_capture(&mut self, frame: &Frame) -> Result<(), EngineError> {
            self.calls.borrow_mut().push(EngineCall::AnalyzeCapture {
                bands: frame.num_bands(),
                banded: frame.is_banded(),
            });
            Ok(())
        }

        fn analyze_render(&mut self, frame: &Frame) -> Result<(), EngineError> {
            self.calls.borrow_mut().push(EngineCall::AnalyzeRender {
                bands: frame.num_bands(),
                banded: frame.is_banded(),
            });
            Ok(())
        }

        fn process_capture(
            &mut self,
            frame: &mut Frame,
            linear_aec_only: bool,
        ) -> Result<(), EngineError> {
            self.calls.borrow_mut().push(EngineCall::ProcessCapture {
                bands: frame.num_bands(),
                banded: frame.is_banded(),
                linear: linear_aec_only,
            });
            Ok(())
        }
    }

    /// Engine that scales every band, so its effect is visible at the sink.
    struct GainEngine {
        gain: f32,
    }

    impl EchoEngine for GainEngine {
        fn analyze_capture(&mut self, _frame: &Frame) -> Result<(), EngineError> {
            Ok(())
        }
        fn analyze_render(&mut self, _frame: &Frame) -> Result<(), EngineError> {
            Ok(())
        }
        fn process_capture(
            &mut self,
            frame: &mut Frame,
            _linear_aec_only: bool,
        ) -> Result<(), EngineError> {
            for segment in frame.segments_mut() {
                for ch in segment.channels_mut() {
                    for s in ch {
                        *s *= self.gain;
                    }
                }
            }
            Ok(())
        }
    }

    /// Engine that fails on the n-th process call.
    struct FailingEngine {
        fail_on_frame: u64,
        processed: u64,
    }

    impl EchoEngine for FailingEngine {
        fn analyze_capture(&mut self, _frame: &Frame) -> Result<(), EngineError> {
            Ok(())
        }
        fn analyze_render(&mut self, _frame: &Frame) -> Result<(), EngineError> {
            Ok(())
        }
        fn process_capture(
            &mut self,
            _frame: &mut Frame,
            _linear_aec_only: bool,
        ) -> Result<(), EngineError> {
            self.processed += 1;
            if self.processed == self.fail_on_frame {
                return Err(EngineError::Process("injected failure".into()));
            }
            Ok(())
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn config_16k() -> PipelineConfig {
        PipelineConfig::builder().build().expect("valid")
    }

    fn tone(num_samples: usize, step: f32, amplitude: f32) -> Vec<f32> {
        (0..num_samples)
            .map(|i| (i as f32 * step).sin() * amplitude)
            .collect()
    }

    // ── Frame accounting ────────────────────────────────────────────

    #[test]
    fn output_length_is_the_minimum_frame_count() {
        // Capture declares 500 frames, render 450; exactly 450 come out
        // and capture frames 451..=500 are never read.
        let capture = MemorySource::new(16000, 1, tone(160 * 500, 0.01, 0.5));
        let render = MemorySource::new(16000, 1, tone(160 * 450, 0.013, 0.5));
        let capture_reads = capture.read_counter();
        let render_reads = render.read_counter();
        let sink = MemorySink::default();
        let data = Rc::clone(&sink.data);

        let driver = PipelineDriver::new(
            config_16k(),
            capture,
            render,
            sink,
            PassthroughEngine,
        )
        .expect("init");
        assert_eq!(driver.frames_expected(), 450);

        let report = driver.run().expect("run");
        assert_eq!(report.frames_expected, 450);
        assert_eq!(report.frames_processed, 450);
        assert_eq!(report.short_read, None);
        assert!(report.is_complete());

        assert_eq!(data.borrow().len(), 160 * 450);
        assert_eq!(capture_reads.get(), 450, "no capture frame past the minimum is read");
        assert_eq!(render_reads.get(), 450);
    }

    #[test]
    fn zero_frames_drains_immediately_with_success() {
        let capture = MemorySource::new(16000, 1, tone(160 * 5, 0.01, 0.5));
        let render = MemorySource::new(16000, 1, Vec::new());
        let capture_reads = capture.read_counter();
        let sink = MemorySink::default();
        let finalized = Rc::clone(&sink.finalized);
        let data = Rc::clone(&sink.data);
        let (engine, calls) = RecordingEngine::new();

        let report = PipelineDriver::new(config_16k(), capture, render, sink, engine)
            .expect("init")
            .run()
            .expect("zero-frame run succeeds");

        assert_eq!(report.frames_expected, 0);
        assert_eq!(report.frames_processed, 0);
        assert!(report.is_complete());
        assert!(data.borrow().is_empty());
        assert!(finalized.get(), "the sink is still finalized");
        assert!(calls.borrow().is_empty(), "the engine is never called");
        assert_eq!(capture_reads.get(), 0, "no read happens at all");
    }

    // ── Cycle ordering and band state ───────────────────────────────

    #[test]
    fn analyze_capture_precedes_analyze_render_every_cycle() {
        let frames = 4;
        let capture = MemorySource::new(16000, 1, tone(160 * frames, 0.01, 0.5));
        let render = MemorySource::new(16000, 1, tone(160 * frames, 0.02, 0.5));
        let (engine, calls) = RecordingEngine::new();

        PipelineDriver::new(config_16k(), capture, render, MemorySink::default(), engine)
            .expect("init")
            .run()
            .expect("run");

        let calls = calls.borrow();
        assert_eq!(calls.len(), 3 * frames);
        for cycle in 0..frames {
            assert!(
                matches!(calls[3 * cycle], EngineCall::AnalyzeCapture { .. }),
                "cycle {cycle} starts with capture analysis"
            );
            assert!(
                matches!(calls[3 * cycle + 1], EngineCall::AnalyzeRender { .. }),
                "cycle {cycle} analyzes render second"
            );
            assert!(
                matches!(calls[3 * cycle + 2], EngineCall::ProcessCapture { .. }),
                "cycle {cycle} processes capture last"
            );
        }
    }

    #[test]
    fn sixteen_k_run_never_splits() {
        let capture = MemorySource::new(16000, 1, tone(160 * 3, 0.01, 0.5));
        let render = MemorySource::new(16000, 1, tone(160 * 3, 0.02, 0.5));
        let (engine, calls) = RecordingEngine::new();

        PipelineDriver::new(config_16k(), capture, render, MemorySink::default(), engine)
            .expect("init")
            .run()
            .expect("run");

        for call in calls.borrow().iter() {
            let (bands, banded) = match *call {
                EngineCall::AnalyzeCapture { bands, banded }
                | EngineCall::AnalyzeRender { bands, banded }
                | EngineCall::ProcessCapture { bands, banded, .. } => (bands, banded),
            };
            assert_eq!(bands, 1, "no sub-band segments anywhere at 16 kHz");
            assert!(!banded);
        }
    }

    #[test]
    fn wideband_runs_split_before_processing() {
        for (rate, expected_bands) in [(32000_u32, 2_usize), (48000, 3)] {
            let frame_len = (rate / 100) as usize;
            let config = PipelineConfig::builder()
                .working_rate_hz(rate)
                .build()
                .expect("valid");
            let capture = MemorySource::new(rate, 1, tone(frame_len * 3, 0.01, 0.5));
            let render = MemorySource::new(rate, 1, tone(frame_len * 3, 0.02, 0.5));
            let (engine, calls) = RecordingEngine::new();

            PipelineDriver::new(config, capture, render, MemorySink::default(), engine)
                .expect("init")
                .run()
                .expect("run");

            let calls = calls.borrow();
            assert_eq!(calls.len(), 9, "rate {rate}");
            for cycle in 0..3 {
                assert_eq!(
                    calls[3 * cycle],
                    EngineCall::AnalyzeCapture {
                        bands: 1,
                        banded: false
                    },
                    "capture analysis sees the pre-split frame at {rate} Hz"
                );
                assert_eq!(
                    calls[3 * cycle + 1],
                    EngineCall::AnalyzeRender {
                        bands: expected_bands,
                        banded: true
                    },
                    "render analysis sees {expected_bands} bands at {rate} Hz"
                );
                assert_eq!(
                    calls[3 * cycle + 2],
                    EngineCall::ProcessCapture {
                        bands: expected_bands,
                        banded: true,
                        linear: false
                    },
                    "processing sees {expected_bands} bands at {rate} Hz"
                );
            }
        }
    }

    #[test]
    fn linear_aec_flag_reaches_the_engine() {
        let config = PipelineConfig::builder()
            .linear_aec_only(true)
            .build()
            .expect("valid");
        let capture = MemorySource::new(16000, 1, tone(160, 0.01, 0.5));
        let render = MemorySource::new(16000, 1, tone(160, 0.02, 0.5));
        let (engine, calls) = RecordingEngine::new();

        PipelineDriver::new(config, capture, render, MemorySink::default(), engine)
            .expect("init")
            .run()
            .expect("run");

        assert!(calls.borrow().iter().any(|call| matches!(
            call,
            EngineCall::ProcessCapture { linear: true, .. }
        )));
    }

    // ── Signal paths ────────────────────────────────────────────────

    #[test]
    fn matching_formats_are_lossless_end_to_end() {
        let input = tone(160 * 3, 0.05, 0.5);
        let capture = MemorySource::new(16000, 1, input.clone());
        let render = MemorySource::new(16000, 1, tone(160 * 3, 0.02, 0.5));
        let sink = MemorySink::default();
        let data = Rc::clone(&sink.data);

        PipelineDriver::new(config_16k(), capture, render, sink, PassthroughEngine)
            .expect("init")
            .run()
            .expect("run");

        assert_eq!(*data.borrow(), input, "identity conversion must be exact");
    }

    #[test]
    fn engine_edits_reach_the_sink() {
        let input = tone(160 * 2, 0.05, 0.5);
        let capture = MemorySource::new(16000, 1, input.clone());
        let render = MemorySource::new(16000, 1, tone(160 * 2, 0.02, 0.5));
        let sink = MemorySink::default();
        let data = Rc::clone(&sink.data);

        PipelineDriver::new(config_16k(), capture, render, sink, GainEngine { gain: 0.5 })
            .expect("init")
            .run()
            .expect("run");

        let data = data.borrow();
        assert_eq!(data.len(), input.len());
        for (i, (raw, cleaned)) in input.iter().zip(data.iter()).enumerate() {
            assert_eq!(raw * 0.5, *cleaned, "sample {i}");
        }
    }

    #[test]
    fn heterogeneous_sources_normalize_to_the_working_format() {
        // Stereo 48 kHz capture against mono 16 kHz render, mono 16 kHz out.
        let capture = MemorySource::new(48000, 2, tone(480 * 2 * 10, 0.01, 0.5));
        let render = MemorySource::new(16000, 1, tone(160 * 10, 0.02, 0.5));
        let sink = MemorySink::default();
        let data = Rc::clone(&sink.data);

        let report =
            PipelineDriver::new(config_16k(), capture, render, sink, PassthroughEngine)
                .expect("init")
                .run()
                .expect("run");

        assert_eq!(report.frames_processed, 10);
        assert_eq!(data.borrow().len(), 160 * 10);
        let energy: f32 = data.borrow().iter().map(|s| s * s).sum();
        assert!(energy > 0.1, "signal survives the conversion");
    }

    #[test]
    fn identical_runs_produce_identical_output() {
        let capture_samples = tone(160 * 20, 0.037, 0.4);
        let render_samples = tone(160 * 20, 0.051, 0.6);
        let config = config_16k();

        let mut outputs = Vec::new();
        for _ in 0..2 {
            let capture = MemorySource::new(16000, 1, capture_samples.clone());
            let render = MemorySource::new(16000, 1, render_samples.clone());
            let sink = MemorySink::default();
            let data = Rc::clone(&sink.data);
            let engine = Aec3Engine::new(&config).expect("fresh engine");

            PipelineDriver::new(config, capture, render, sink, engine)
                .expect("init")
                .run()
                .expect("run");
            outputs.push(data.borrow().clone());
        }

        assert_eq!(outputs[0], outputs[1], "fresh engine state per run");
    }

    // ── Short reads ─────────────────────────────────────────────────

    #[test]
    fn lying_capture_metadata_stops_the_run_early() {
        // The descriptor declares 5 frames but only 2.5 frames of data
        // exist. The run stops at 2 whole frames, successfully.
        let samples = tone(160 * 2 + 80, 0.01, 0.5);
        let capture = MemorySource::with_declared_total(16000, 1, samples, 160 * 5);
        let render = MemorySource::new(16000, 1, tone(160 * 5, 0.02, 0.5));
        let sink = MemorySink::default();
        let data = Rc::clone(&sink.data);
        let finalized = Rc::clone(&sink.finalized);
        let (engine, calls) = RecordingEngine::new();

        let report = PipelineDriver::new(config_16k(), capture, render, sink, engine)
            .expect("init")
            .run()
            .expect("a short read is an outcome, not an error");

        assert_eq!(report.frames_expected, 5);
        assert_eq!(report.frames_processed, 2);
        assert_eq!(report.short_read, Some(StreamRole::Capture));
        assert!(!report.is_complete());
        assert_eq!(data.borrow().len(), 160 * 2);
        assert!(finalized.get());
        assert_eq!(
            calls.borrow().len(),
            3 * 2,
            "the half-read frame never reaches the engine"
        );
    }

    #[test]
    fn lying_render_metadata_reports_the_render_stream() {
        let capture = MemorySource::new(16000, 1, tone(160 * 4, 0.01, 0.5));
        let render =
            MemorySource::with_declared_total(16000, 1, tone(160 * 3, 0.02, 0.5), 160 * 4);

        let report = PipelineDriver::new(
            config_16k(),
            capture,
            render,
            MemorySink::default(),
            PassthroughEngine,
        )
        .expect("init")
        .run()
        .expect("run");

        assert_eq!(report.frames_expected, 4);
        assert_eq!(report.frames_processed, 3);
        assert_eq!(report.short_read, Some(StreamRole::Render));
    }

    // ── Fatal aborts ────────────────────────────────────────────────

    #[test]
    fn engine_failure_aborts_but_keeps_written_frames() {
        let capture = MemorySource::new(16000, 1, tone(160 * 5, 0.01, 0.5));
        let render = MemorySource::new(16000, 1, tone(160 * 5, 0.02, 0.5));
        let sink = MemorySink::default();
        let data = Rc::clone(&sink.data);

        let err = PipelineDriver::new(
            config_16k(),
            capture,
            render,
            sink,
            FailingEngine {
                fail_on_frame: 3,
                processed: 0,
            },
        )
        .expect("init")
        .run()
        .expect_err("the injected failure is fatal");

        assert!(matches!(err, PipelineError::Engine(_)), "{err}");
        assert_eq!(data.borrow().len(), 160 * 2, "frames before the abort stay");
    }

    #[test]
    fn fractional_native_rate_fails_at_init() {
        let capture = MemorySource::new(44149, 1, vec![0.0; 1000]);
        let render = MemorySource::new(16000, 1, vec![0.0; 1000]);

        let err = PipelineDriver::new(
            config_16k(),
            capture,
            render,
            MemorySink::default(),
            PassthroughEngine,
        )
        .expect_err("init must fail");
        assert!(matches!(err, PipelineError::Config(_)), "{err}");
    }

    #[test]
    fn unmappable_channel_layout_fails_at_init() {
        let config = PipelineConfig::builder()
            .working_channels(2)
            .build()
            .expect("valid");
        let capture = MemorySource::new(16000, 3, vec![0.0; 480 * 4]);
        let render = MemorySource::new(16000, 2, vec![0.0; 320 * 4]);

        let err = PipelineDriver::new(
            config,
            capture,
            render,
            MemorySink::default(),
            PassthroughEngine,
        )
        .expect_err("init must fail");
        assert!(matches!(
            err,
            PipelineError::Conversion(ConversionError::ChannelMapping { from: 3, to: 2 })
        ));
    }
}
