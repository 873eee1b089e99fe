//! Frame-exact sample rate conversion.
//!
//! Wraps rubato's `FftFixedInOut` so that every call consumes exactly one
//! frame at the input rate and yields exactly one frame at the output rate;
//! the driver's per-cycle cadence depends on that in/out exactness. Rate
//! pairs that cannot satisfy it are rejected at construction. Equal rates
//! bypass the resampler entirely, which keeps same-rate paths bit-exact.

use std::fmt;

use rubato::{FftFixedInOut, Resampler};

use crate::channel_frame::ChannelFrame;

/// Rate conversion failure.
#[derive(Debug, Clone, PartialEq)]
pub enum ResampleError {
    /// No frame-exact conversion exists between the two rates for this
    /// frame length, or the converter rejected the configuration.
    Unsupported {
        input_rate: u32,
        output_rate: u32,
        detail: String,
    },
    /// The converter failed mid-stream.
    Failed(String),
}

impl fmt::Display for ResampleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResampleError::Unsupported {
                input_rate,
                output_rate,
                detail,
            } => write!(
                f,
                "unsupported rate conversion {input_rate} Hz -> {output_rate} Hz: {detail}"
            ),
            ResampleError::Failed(detail) => write!(f, "resampling failed: {detail}"),
        }
    }
}

impl std::error::Error for ResampleError {}

/// Converts one planar frame per call between two fixed rates.
pub struct FrameResampler {
    /// `None` when input and output rates are equal.
    inner: Option<FftFixedInOut<f32>>,
    input_rate: u32,
    output_rate: u32,
    frames_in: usize,
    frames_out: usize,
    num_channels: usize,
    in_buf: Vec<Vec<f32>>,
    out_buf: Vec<Vec<f32>>,
}

impl fmt::Debug for FrameResampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameResampler")
            .field("input_rate", &self.input_rate)
            .field("output_rate", &self.output_rate)
            .field("frames_in", &self.frames_in)
            .field("frames_out", &self.frames_out)
            .field("num_channels", &self.num_channels)
            .finish()
    }
}

impl FrameResampler {
    /// Create a converter taking `frames_in` samples per channel per call.
    pub fn new(
        input_rate: u32,
        output_rate: u32,
        frames_in: usize,
        num_channels: usize,
    ) -> Result<Self, ResampleError> {
        assert!(input_rate > 0 && output_rate > 0, "rates must be positive");
        assert!(frames_in > 0, "frames_in must be > 0");
        assert!(num_channels > 0, "num_channels must be > 0");

        let unsupported = |detail: String| ResampleError::Unsupported {
            input_rate,
            output_rate,
            detail,
        };

        if input_rate == output_rate {
            return Ok(Self {
                inner: None,
                input_rate,
                output_rate,
                frames_in,
                frames_out: frames_in,
                num_channels,
                in_buf: Vec::new(),
                out_buf: Vec::new(),
            });
        }

        let out_exact = frames_in as u64 * output_rate as u64;
        if out_exact % input_rate as u64 != 0 {
            return Err(unsupported(format!(
                "{frames_in} input frames do not map to a whole output frame"
            )));
        }
        let frames_out = (out_exact / input_rate as u64) as usize;

        let inner = FftFixedInOut::<f32>::new(
            input_rate as usize,
            output_rate as usize,
            frames_in,
            num_channels,
        )
        .map_err(|e| unsupported(e.to_string()))?;

        // The converter may round the chunk size; a rounded size would break
        // the one-frame-per-call contract.
        if inner.input_frames_next() != frames_in || inner.output_frames_next() != frames_out {
            return Err(unsupported(format!(
                "converter wants {} in / {} out per call, need {frames_in} / {frames_out}",
                inner.input_frames_next(),
                inner.output_frames_next()
            )));
        }

        let max_out = inner.output_frames_max();
        Ok(Self {
            inner: Some(inner),
            input_rate,
            output_rate,
            frames_in,
            frames_out,
            num_channels,
            in_buf: vec![vec![0.0; frames_in]; num_channels],
            out_buf: vec![vec![0.0; max_out]; num_channels],
        })
    }

    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    pub fn frames_in(&self) -> usize {
        self.frames_in
    }

    pub fn frames_out(&self) -> usize {
        self.frames_out
    }

    /// Latency introduced by the converter, in samples at the output rate.
    pub fn output_delay(&self) -> usize {
        match &self.inner {
            Some(inner) => inner.output_delay(),
            None => 0,
        }
    }

    /// Convert one frame. `input` must hold `frames_in` samples per channel,
    /// `output` receives `frames_out` samples per channel.
    pub fn resample(
        &mut self,
        input: &ChannelFrame,
        output: &mut ChannelFrame,
    ) -> Result<(), ResampleError> {
        assert_eq!(input.num_channels(), self.num_channels, "channel count mismatch");
        assert_eq!(output.num_channels(), self.num_channels, "channel count mismatch");
        assert_eq!(
            input.samples_per_channel(),
            self.frames_in,
            "input frame length mismatch"
        );
        assert_eq!(
            output.samples_per_channel(),
            self.frames_out,
            "output frame length mismatch"
        );

        let Some(inner) = &mut self.inner else {
            output.copy_from(input);
            return Ok(());
        };

        for (buf, ch) in self.in_buf.iter_mut().zip(input.channels()) {
            buf.copy_from_slice(ch);
        }

        let (_, produced) = inner
            .process_into_buffer(&self.in_buf, &mut self.out_buf, None)
            .map_err(|e| ResampleError::Failed(e.to_string()))?;
        debug_assert_eq!(produced, self.frames_out);

        for (ch, buf) in output.channels_mut().zip(self.out_buf.iter()) {
            ch.copy_from_slice(&buf[..self.frames_out]);
        }
        Ok(())
    }
}
