//! Offline acoustic echo cancellation pipeline.
//!
//! Feeds two possibly differently-clocked streams, a capture stream
//! (microphone signal carrying echo) and a render stream (loudspeaker
//! reference), frame by frame through an adaptive canceller and emits one
//! cleaned stream.
//!
//! The driver in [`pipeline`] owns a whole run: per 10 ms cycle it pulls
//! one frame from each source, normalizes both into a shared working
//! format, hands them to the engine in a fixed order, and writes the
//! processed capture frame to the sink. [`wav_io`] adapts WAV files to
//! the stream traits the driver consumes.

pub mod config;
pub mod descriptor;
pub mod engine;
pub mod frame;
pub mod pipeline;
pub mod stream_buffer;
pub mod wav_io;

pub use config::{ConfigError, PipelineConfig, PipelineConfigBuilder};
pub use descriptor::StreamDescriptor;
pub use engine::{Aec3Engine, EchoEngine, EngineError};
pub use frame::{Frame, StreamRole};
pub use pipeline::{PipelineDriver, PipelineError, RunReport};
pub use stream_buffer::{ConversionError, StreamBuffer};
pub use wav_io::{SinkError, SourceError, StreamSink, StreamSource, WavSink, WavSource};
