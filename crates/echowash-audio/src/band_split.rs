//! Frequency band decomposition for wideband frames.
//!
//! A [`BandSplitter`] turns one full-band frame into `N` equally long
//! sub-band frames (lowest band first) and merges them back:
//! - **2 bands** (32 kHz working rate): all-pass QMF pair
//! - **3 bands** (48 kHz working rate): sparse FIR bank with DCT modulation
//!
//! Filter state is per channel and persists across frames, so one splitter
//! must stay attached to one stream for the whole run.

use crate::channel_frame::ChannelFrame;
use crate::three_band::ThreeBandBank;

/// Number of sub-bands a working rate decomposes into.
///
/// Only 32 kHz and 48 kHz have band designs; everything at or below 16 kHz
/// stays full-band.
pub fn num_bands_for_rate(rate_hz: u32) -> usize {
    match rate_hz {
        32000 => 2,
        48000 => 3,
        _ => 1,
    }
}

// ---------------------------------------------------------------------------
// All-pass QMF (2-band)
// ---------------------------------------------------------------------------

const ALLPASS_A: [f32; 3] = [0.097_930_908_2, 0.564_300_537_1, 0.873_733_520_5];
const ALLPASS_B: [f32; 3] = [0.325_515_747_07, 0.748_626_708_98, 0.961_456_298_82];

/// One first-order all-pass section:
///
///   y[n] = x[n-1] + a * (x[n] - y[n-1])
///
/// `state` carries x[-1] and y[-1] across calls.
fn allpass_section(input: &[f32], output: &mut [f32], coeff: f32, state: &mut [f32; 2]) {
    debug_assert_eq!(input.len(), output.len());
    debug_assert!(!input.is_empty());

    output[0] = state[0] + coeff * (input[0] - state[1]);
    for n in 1..input.len() {
        output[n] = input[n - 1] + coeff * (input[n] - output[n - 1]);
    }
    state[0] = input[input.len() - 1];
    state[1] = output[output.len() - 1];
}

/// Three cascaded all-pass sections with persistent state.
struct AllpassChain {
    coeffs: [f32; 3],
    state: [[f32; 2]; 3],
}

impl AllpassChain {
    fn new(coeffs: [f32; 3]) -> Self {
        Self {
            coeffs,
            state: [[0.0; 2]; 3],
        }
    }

    /// Run the cascade. `scratch` holds the input on entry and is clobbered.
    fn process(&mut self, scratch: &mut [f32], output: &mut [f32]) {
        allpass_section(scratch, output, self.coeffs[0], &mut self.state[0]);
        allpass_section(output, scratch, self.coeffs[1], &mut self.state[1]);
        allpass_section(scratch, output, self.coeffs[2], &mut self.state[2]);
    }
}

/// Per-channel QMF state: two analysis chains, two synthesis chains.
struct QmfChannel {
    analysis_odd: AllpassChain,
    analysis_even: AllpassChain,
    synthesis_sum: AllpassChain,
    synthesis_diff: AllpassChain,
}

impl QmfChannel {
    fn new() -> Self {
        Self {
            analysis_odd: AllpassChain::new(ALLPASS_A),
            analysis_even: AllpassChain::new(ALLPASS_B),
            synthesis_sum: AllpassChain::new(ALLPASS_B),
            synthesis_diff: AllpassChain::new(ALLPASS_A),
        }
    }

    /// Split one channel into its low and high band halves.
    fn analyze(&mut self, full: &[f32], low: &mut [f32], high: &mut [f32]) {
        let half = full.len() / 2;
        debug_assert_eq!(full.len() % 2, 0);
        debug_assert_eq!(low.len(), half);
        debug_assert_eq!(high.len(), half);

        let mut even: Vec<f32> = (0..half).map(|i| full[2 * i]).collect();
        let mut odd: Vec<f32> = (0..half).map(|i| full[2 * i + 1]).collect();
        let mut filtered_odd = vec![0.0f32; half];
        let mut filtered_even = vec![0.0f32; half];
        self.analysis_odd.process(&mut odd, &mut filtered_odd);
        self.analysis_even.process(&mut even, &mut filtered_even);

        for i in 0..half {
            low[i] = 0.5 * (filtered_odd[i] + filtered_even[i]);
            high[i] = 0.5 * (filtered_odd[i] - filtered_even[i]);
        }
    }

    /// Merge low and high band halves back into one channel.
    fn synthesize(&mut self, low: &[f32], high: &[f32], full: &mut [f32]) {
        let half = low.len();
        debug_assert_eq!(high.len(), half);
        debug_assert_eq!(full.len(), half * 2);

        let mut sum: Vec<f32> = low.iter().zip(high).map(|(l, h)| l + h).collect();
        let mut diff: Vec<f32> = low.iter().zip(high).map(|(l, h)| l - h).collect();
        let mut filtered_sum = vec![0.0f32; half];
        let mut filtered_diff = vec![0.0f32; half];
        self.synthesis_sum.process(&mut sum, &mut filtered_sum);
        self.synthesis_diff.process(&mut diff, &mut filtered_diff);

        for i in 0..half {
            full[2 * i] = filtered_diff[i];
            full[2 * i + 1] = filtered_sum[i];
        }
    }
}

// ---------------------------------------------------------------------------
// BandSplitter
// ---------------------------------------------------------------------------

enum SplitterState {
    Two(Vec<QmfChannel>),
    Three(Vec<ThreeBandBank>),
}

/// Stateful band analysis/synthesis over [`ChannelFrame`]s.
pub struct BandSplitter {
    num_bands: usize,
    state: SplitterState,
}

impl BandSplitter {
    /// Create a splitter for `num_bands` (2 or 3) and `num_channels`.
    ///
    /// # Panics
    ///
    /// Panics if `num_bands` is not 2 or 3 or `num_channels` is 0.
    pub fn new(num_bands: usize, num_channels: usize) -> Self {
        assert!(num_bands == 2 || num_bands == 3, "num_bands must be 2 or 3");
        assert!(num_channels > 0, "num_channels must be > 0");
        let state = match num_bands {
            2 => SplitterState::Two((0..num_channels).map(|_| QmfChannel::new()).collect()),
            3 => SplitterState::Three((0..num_channels).map(|_| ThreeBandBank::new()).collect()),
            _ => unreachable!(),
        };
        Self { num_bands, state }
    }

    pub fn num_bands(&self) -> usize {
        self.num_bands
    }

    /// Decompose `full` into `bands` (lowest band first).
    ///
    /// Every band frame must have the same channel count as `full` and
    /// `full.samples_per_channel() / num_bands` samples per channel.
    pub fn analyze(&mut self, full: &ChannelFrame, bands: &mut [ChannelFrame]) {
        self.check_shapes(full, bands);
        match &mut self.state {
            SplitterState::Two(channels) => {
                let [low, high] = bands else { unreachable!() };
                for (ch, qmf) in channels.iter_mut().enumerate() {
                    qmf.analyze(full.channel(ch), low.channel_mut(ch), high.channel_mut(ch));
                }
            }
            SplitterState::Three(banks) => {
                let [b0, b1, b2] = bands else { unreachable!() };
                for (ch, bank) in banks.iter_mut().enumerate() {
                    bank.analyze(
                        full.channel(ch),
                        [b0.channel_mut(ch), b1.channel_mut(ch), b2.channel_mut(ch)],
                    );
                }
            }
        }
    }

    /// Reassemble `bands` (lowest band first) into `full`.
    pub fn synthesize(&mut self, bands: &[ChannelFrame], full: &mut ChannelFrame) {
        self.check_shapes(full, bands);
        match &mut self.state {
            SplitterState::Two(channels) => {
                let [low, high] = bands else { unreachable!() };
                for (ch, qmf) in channels.iter_mut().enumerate() {
                    qmf.synthesize(low.channel(ch), high.channel(ch), full.channel_mut(ch));
                }
            }
            SplitterState::Three(banks) => {
                let [b0, b1, b2] = bands else { unreachable!() };
                for (ch, bank) in banks.iter_mut().enumerate() {
                    bank.synthesize(
                        [b0.channel(ch), b1.channel(ch), b2.channel(ch)],
                        full.channel_mut(ch),
                    );
                }
            }
        }
    }

    fn check_shapes(&self, full: &ChannelFrame, bands: &[ChannelFrame]) {
        assert_eq!(bands.len(), self.num_bands, "band count mismatch");
        assert_eq!(
            full.samples_per_channel() % self.num_bands,
            0,
            "frame length {} not divisible into {} bands",
            full.samples_per_channel(),
            self.num_bands
        );
        let band_len = full.samples_per_channel() / self.num_bands;
        for (i, band) in bands.iter().enumerate() {
            assert_eq!(
                band.num_channels(),
                full.num_channels(),
                "band {i} channel count mismatch"
            );
            assert_eq!(
                band.samples_per_channel(),
                band_len,
                "band {i} length mismatch"
            );
        }
        match &self.state {
            SplitterState::Two(channels) => {
                assert_eq!(channels.len(), full.num_channels(), "channel state mismatch")
            }
            SplitterState::Three(banks) => {
                assert_eq!(banks.len(), full.num_channels(), "channel state mismatch")
            }
        }
    }
}
