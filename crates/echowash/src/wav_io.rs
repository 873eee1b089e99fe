//! WAV stream source and sink.
//!
//! The driver reads and writes through the [`StreamSource`] / [`StreamSink`]
//! traits; [`WavSource`] and [`WavSink`] implement them over `hound`. Test
//! doubles implement the same traits to fake metadata and capture output.
//!
//! Sources hand out samples as `f32` in \[-1.0, 1.0\] regardless of the
//! container format; the sink writes 16-bit PCM with saturating conversion.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use echowash_audio::sample_convert::{float_to_s16_slice, int_to_float, s16_to_float};

use crate::descriptor::StreamDescriptor;

// ─── Errors ──────────────────────────────────────────────────────────

/// Failures opening or decoding an input stream.
#[derive(Debug)]
pub enum SourceError {
    /// The container could not be opened or its header is invalid.
    Open { path: PathBuf, source: hound::Error },
    /// A sample could not be decoded mid-stream.
    Decode(hound::Error),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { path, source } => {
                write!(f, "cannot open {}: {source}", path.display())
            }
            Self::Decode(e) => write!(f, "cannot decode samples: {e}"),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Open { source, .. } => Some(source),
            Self::Decode(e) => Some(e),
        }
    }
}

/// Failures creating or writing the output stream.
#[derive(Debug)]
pub enum SinkError {
    /// The output container could not be created.
    Create { path: PathBuf, source: hound::Error },
    /// A sample could not be written.
    Write(hound::Error),
    /// The container header could not be finalized.
    Finalize(hound::Error),
    /// The sink was written to after finalization.
    Closed,
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create { path, source } => {
                write!(f, "cannot create {}: {source}", path.display())
            }
            Self::Write(e) => write!(f, "cannot write samples: {e}"),
            Self::Finalize(e) => write!(f, "cannot finalize output: {e}"),
            Self::Closed => write!(f, "sink already finalized"),
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Create { source, .. } => Some(source),
            Self::Write(e) | Self::Finalize(e) => Some(e),
            Self::Closed => None,
        }
    }
}

// ─── Traits ──────────────────────────────────────────────────────────

/// A frame-oriented sample source.
pub trait StreamSource {
    /// The stream's declared properties. The declared length comes from
    /// container metadata and may overstate the data actually present.
    fn descriptor(&self) -> StreamDescriptor;

    /// Read up to `out.len()` interleaved samples. Returns the number
    /// actually read; fewer than requested means the stream has ended.
    fn read_frame(&mut self, out: &mut [f32]) -> Result<usize, SourceError>;
}

/// A frame-oriented sample sink.
pub trait StreamSink {
    /// Append one frame of interleaved samples.
    fn write_frame(&mut self, samples: &[f32]) -> Result<(), SinkError>;

    /// Flush and close the stream. Idempotent.
    fn finalize(&mut self) -> Result<(), SinkError>;
}

// ─── WavSource ───────────────────────────────────────────────────────

/// [`StreamSource`] reading a WAV file.
#[derive(derive_more::Debug)]
pub struct WavSource {
    #[debug(skip)]
    reader: WavReader<BufReader<File>>,
    descriptor: StreamDescriptor,
}

impl WavSource {
    /// Open a WAV file and derive its descriptor from the header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let reader = WavReader::open(path).map_err(|e| SourceError::Open {
            path: path.to_path_buf(),
            source: e,
        })?;
        let spec = reader.spec();
        let descriptor = StreamDescriptor::new(
            spec.sample_rate,
            spec.channels as usize,
            u64::from(reader.len()),
        );
        Ok(Self { reader, descriptor })
    }
}

impl StreamSource for WavSource {
    fn descriptor(&self) -> StreamDescriptor {
        self.descriptor
    }

    fn read_frame(&mut self, out: &mut [f32]) -> Result<usize, SourceError> {
        let spec = self.reader.spec();
        let mut count = 0;
        match spec.sample_format {
            SampleFormat::Float => {
                let mut samples = self.reader.samples::<f32>();
                for slot in out.iter_mut() {
                    let Some(sample) = samples.next() else { break };
                    *slot = sample.map_err(SourceError::Decode)?;
                    count += 1;
                }
            }
            SampleFormat::Int if spec.bits_per_sample == 16 => {
                let mut samples = self.reader.samples::<i16>();
                for slot in out.iter_mut() {
                    let Some(sample) = samples.next() else { break };
                    *slot = s16_to_float(sample.map_err(SourceError::Decode)?);
                    count += 1;
                }
            }
            SampleFormat::Int => {
                let bits = spec.bits_per_sample;
                let mut samples = self.reader.samples::<i32>();
                for slot in out.iter_mut() {
                    let Some(sample) = samples.next() else { break };
                    *slot = int_to_float(sample.map_err(SourceError::Decode)?, bits);
                    count += 1;
                }
            }
        }
        Ok(count)
    }
}

// ─── WavSink ─────────────────────────────────────────────────────────

/// [`StreamSink`] writing 16-bit PCM WAV.
///
/// Dropping an unfinalized sink finalizes it best-effort, so an aborted
/// run still leaves a valid file holding the frames written so far.
#[derive(derive_more::Debug)]
pub struct WavSink {
    #[debug(skip)]
    writer: Option<WavWriter<BufWriter<File>>>,
    #[debug(skip)]
    scratch: Vec<i16>,
}

impl WavSink {
    /// Create the output file with the given rate and channel count.
    pub fn create<P: AsRef<Path>>(
        path: P,
        sample_rate_hz: u32,
        num_channels: usize,
    ) -> Result<Self, SinkError> {
        let path = path.as_ref();
        let spec = WavSpec {
            channels: num_channels as u16,
            sample_rate: sample_rate_hz,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let writer = WavWriter::create(path, spec).map_err(|e| SinkError::Create {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self {
            writer: Some(writer),
            scratch: Vec::new(),
        })
    }
}

impl StreamSink for WavSink {
    fn write_frame(&mut self, samples: &[f32]) -> Result<(), SinkError> {
        let Some(writer) = &mut self.writer else {
            return Err(SinkError::Closed);
        };
        self.scratch.resize(samples.len(), 0);
        float_to_s16_slice(samples, &mut self.scratch);
        for &sample in &self.scratch {
            writer.write_sample(sample).map_err(SinkError::Write)?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), SinkError> {
        match self.writer.take() {
            Some(writer) => writer.finalize().map_err(SinkError::Finalize),
            None => Ok(()),
        }
    }
}

impl Drop for WavSink {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                tracing::warn!("output not finalized cleanly: {e}");
            }
        }
    }
}
