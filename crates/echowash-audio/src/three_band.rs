//! 3-band filter bank for 48 kHz frames.
//!
//! Decomposes a full-band frame into three equal sub-bands (0-8, 8-16 and
//! 16-24 kHz at 48 kHz) through a sparse FIR prototype filter whose
//! polyphase branches are DCT-modulated onto the bands, and merges them
//! back. Analysis and synthesis keep separate per-branch state, so one bank
//! serves one channel for a whole stream.

const SQRT_3: f32 = 1.732_050_8;

const NUM_BANDS: usize = 3;
const SPARSITY: usize = 4;
const STRIDE_LOG2: usize = 2;
const STRIDE: usize = 1 << STRIDE_LOG2;
const FILTER_SIZE: usize = 4;
const MEMORY_SIZE: usize = FILTER_SIZE * STRIDE - 1;
const NUM_POSITIONS: usize = SPARSITY * NUM_BANDS;

/// Polyphase positions whose prototype branch is identically zero.
const ZERO_POSITION_1: usize = 3;
const ZERO_POSITION_2: usize = 9;
const NUM_COEFF_ROWS: usize = NUM_POSITIONS - 2;

#[rustfmt::skip]
const FILTER_COEFFS: [[f32; FILTER_SIZE]; NUM_COEFF_ROWS] = [
    [-0.00047749, -0.00496888, 0.16547118,  0.00425496],
    [-0.00173287, -0.01585778, 0.14989004,  0.00994113],
    [-0.00304815, -0.02536082, 0.12154542,  0.01157993],
    [-0.00346946, -0.02587886, 0.04760441,  0.00607594],
    [-0.00154717, -0.01136076, 0.01387458,  0.00186353],
    [ 0.00186353,  0.01387458,-0.01136076, -0.00154717],
    [ 0.00607594,  0.04760441,-0.02587886, -0.00346946],
    [ 0.00983212,  0.08543175,-0.02982767, -0.00383509],
    [ 0.00994113,  0.14989004,-0.01585778, -0.00173287],
    [ 0.00425496,  0.16547118,-0.00496888, -0.00047749],
];

#[rustfmt::skip]
const DCT_MODULATION: [[f32; NUM_BANDS]; NUM_COEFF_ROWS] = [
    [ 2.0,     2.0,    2.0],
    [ SQRT_3,  0.0,   -SQRT_3],
    [ 1.0,    -2.0,    1.0],
    [-1.0,     2.0,   -1.0],
    [-SQRT_3,  0.0,    SQRT_3],
    [-2.0,    -2.0,   -2.0],
    [-SQRT_3,  0.0,    SQRT_3],
    [-1.0,     2.0,   -1.0],
    [ 1.0,    -2.0,    1.0],
    [ SQRT_3,  0.0,   -SQRT_3],
];

/// Coefficient row for a polyphase position, `None` for the zero branches.
fn coeff_row(position: usize) -> Option<usize> {
    debug_assert!(position < NUM_POSITIONS);
    if position == ZERO_POSITION_1 || position == ZERO_POSITION_2 {
        None
    } else if position < ZERO_POSITION_1 {
        Some(position)
    } else if position < ZERO_POSITION_2 {
        Some(position - 1)
    } else {
        Some(position - 2)
    }
}

/// Run one sparse FIR branch over a sub-sampled block.
///
/// `in_shift` selects the branch's phase offset within the stride. The head
/// of the output draws on `state` (the tail of the previous block), the body
/// on `input` alone; `state` is refreshed from the end of `input`.
fn filter_branch(
    filter: &[f32; FILTER_SIZE],
    input: &[f32],
    in_shift: usize,
    output: &mut [f32],
    state: &mut [f32; MEMORY_SIZE],
) {
    let len = input.len();
    debug_assert_eq!(len, output.len());
    debug_assert!(len >= FILTER_SIZE * STRIDE, "block too short for the filter");
    debug_assert!(in_shift < STRIDE);
    output.fill(0.0);

    // Head: taps reach entirely into state.
    for k in 0..in_shift {
        let mut j = MEMORY_SIZE + k - in_shift;
        for &coeff in filter.iter() {
            output[k] += state[j] * coeff;
            j = j.wrapping_sub(STRIDE);
        }
    }

    // Transition: taps straddle state and input.
    let mut shift = 0usize;
    for k in in_shift..(FILTER_SIZE * STRIDE) {
        let within_input = (1 + (shift >> STRIDE_LOG2)).min(FILTER_SIZE);
        for i in 0..within_input {
            output[k] += input[shift - i * STRIDE] * filter[i];
        }
        for i in within_input..FILTER_SIZE {
            output[k] += state[MEMORY_SIZE + shift - i * STRIDE] * filter[i];
        }
        shift += 1;
    }

    // Body: taps fully within input.
    let mut shift = FILTER_SIZE * STRIDE - in_shift;
    for k in (FILTER_SIZE * STRIDE)..len {
        for i in 0..FILTER_SIZE {
            output[k] += input[shift - i * STRIDE] * filter[i];
        }
        shift += 1;
    }

    state.copy_from_slice(&input[len - MEMORY_SIZE..]);
}

/// 3-band analysis/synthesis state for one channel.
pub(crate) struct ThreeBandBank {
    analysis_state: [[f32; MEMORY_SIZE]; NUM_COEFF_ROWS],
    synthesis_state: [[f32; MEMORY_SIZE]; NUM_COEFF_ROWS],
}

impl ThreeBandBank {
    pub(crate) fn new() -> Self {
        Self {
            analysis_state: [[0.0; MEMORY_SIZE]; NUM_COEFF_ROWS],
            synthesis_state: [[0.0; MEMORY_SIZE]; NUM_COEFF_ROWS],
        }
    }

    /// Split a full-band block into three sub-band blocks of a third the length.
    pub(crate) fn analyze(&mut self, input: &[f32], mut bands: [&mut [f32]; NUM_BANDS]) {
        let split_len = input.len() / NUM_BANDS;
        debug_assert_eq!(input.len() % NUM_BANDS, 0);
        for band in bands.iter() {
            debug_assert_eq!(band.len(), split_len);
        }
        for band in bands.iter_mut() {
            band.fill(0.0);
        }

        let mut sub_sampled = vec![0.0f32; split_len];
        let mut filtered = vec![0.0f32; split_len];
        for phase in 0..NUM_BANDS {
            // Down-sample with this phase offset, newest-first within the stride.
            for (k, slot) in sub_sampled.iter_mut().enumerate() {
                *slot = input[(NUM_BANDS - 1) - phase + NUM_BANDS * k];
            }

            for in_shift in 0..STRIDE {
                let Some(row) = coeff_row(phase + in_shift * NUM_BANDS) else {
                    continue;
                };
                filter_branch(
                    &FILTER_COEFFS[row],
                    &sub_sampled,
                    in_shift,
                    &mut filtered,
                    &mut self.analysis_state[row],
                );

                // Modulate the branch onto each band and accumulate.
                for (band, out) in bands.iter_mut().enumerate() {
                    let modulation = DCT_MODULATION[row][band];
                    for (o, &f) in out.iter_mut().zip(filtered.iter()) {
                        *o += modulation * f;
                    }
                }
            }
        }
    }

    /// Merge three sub-band blocks back into one full-band block.
    pub(crate) fn synthesize(&mut self, bands: [&[f32]; NUM_BANDS], output: &mut [f32]) {
        let split_len = output.len() / NUM_BANDS;
        debug_assert_eq!(output.len() % NUM_BANDS, 0);
        for band in bands.iter() {
            debug_assert_eq!(band.len(), split_len);
        }
        output.fill(0.0);

        let mut modulated = vec![0.0f32; split_len];
        let mut filtered = vec![0.0f32; split_len];
        for phase in 0..NUM_BANDS {
            for in_shift in 0..STRIDE {
                let Some(row) = coeff_row(phase + in_shift * NUM_BANDS) else {
                    continue;
                };

                // Collapse the bands through this branch's modulation.
                modulated.fill(0.0);
                for (band, band_data) in bands.iter().enumerate() {
                    let modulation = DCT_MODULATION[row][band];
                    for (m, &b) in modulated.iter_mut().zip(band_data.iter()) {
                        *m += modulation * b;
                    }
                }

                filter_branch(
                    &FILTER_COEFFS[row],
                    &modulated,
                    in_shift,
                    &mut filtered,
                    &mut self.synthesis_state[row],
                );

                // Up-sample back onto this phase's output slots.
                for (k, &f) in filtered.iter().enumerate() {
                    output[phase + NUM_BANDS * k] += NUM_BANDS as f32 * f;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn impulse_excites_the_bank() {
        let mut bank = ThreeBandBank::new();
        let mut input = vec![0.0f32; 480];
        input[0] = 1.0;
        let mut b0 = vec![0.0f32; 160];
        let mut b1 = vec![0.0f32; 160];
        let mut b2 = vec![0.0f32; 160];
        bank.analyze(&input, [&mut b0, &mut b1, &mut b2]);

        let total: f32 = [&b0, &b1, &b2]
            .iter()
            .flat_map(|b| b.iter())
            .map(|x| x * x)
            .sum();
        assert!(total > 0.0, "impulse must produce output");
    }

    #[test]
    fn zero_input_gives_zero_bands() {
        let mut bank = ThreeBandBank::new();
        let input = vec![0.0f32; 480];
        let mut b0 = vec![1.0f32; 160];
        let mut b1 = vec![1.0f32; 160];
        let mut b2 = vec![1.0f32; 160];
        bank.analyze(&input, [&mut b0, &mut b1, &mut b2]);

        for band in [&b0, &b1, &b2] {
            assert!(band.iter().all(|&s| s == 0.0));
        }
    }

    #[test]
    fn roundtrip_preserves_a_low_tone() {
        let mut bank = ThreeBandBank::new();
        let frame_len = 480;
        let mut last_in = Vec::new();
        let mut output = vec![0.0f32; frame_len];

        for frame in 0..20 {
            let input: Vec<f32> = (0..frame_len)
                .map(|i| {
                    let t = (frame * frame_len + i) as f32 / 48000.0;
                    (2.0 * std::f32::consts::PI * 1000.0 * t).sin()
                })
                .collect();

            let mut b0 = vec![0.0f32; 160];
            let mut b1 = vec![0.0f32; 160];
            let mut b2 = vec![0.0f32; 160];
            bank.analyze(&input, [&mut b0, &mut b1, &mut b2]);
            bank.synthesize([&b0, &b1, &b2], &mut output);
            last_in = input;
        }

        let in_energy: f32 = last_in.iter().map(|x| x * x).sum();
        let out_energy: f32 = output.iter().map(|x| x * x).sum();
        assert!(
            out_energy > in_energy * 0.05,
            "roundtrip lost the signal: in={in_energy}, out={out_energy}"
        );
    }

    #[test]
    fn double_length_blocks_are_accepted() {
        // 20 ms at 48 kHz: 960 full-band samples, 320 per band.
        let mut bank = ThreeBandBank::new();
        let input = vec![0.5f32; 960];
        let mut b0 = vec![0.0f32; 320];
        let mut b1 = vec![0.0f32; 320];
        let mut b2 = vec![0.0f32; 320];
        bank.analyze(&input, [&mut b0, &mut b1, &mut b2]);

        let total: f32 = [&b0, &b1, &b2]
            .iter()
            .flat_map(|b| b.iter())
            .map(|x| x * x)
            .sum();
        assert!(total > 0.0);
    }

    #[test]
    fn zero_positions_are_skipped() {
        assert_eq!(coeff_row(0), Some(0));
        assert_eq!(coeff_row(2), Some(2));
        assert_eq!(coeff_row(3), None);
        assert_eq!(coeff_row(4), Some(3));
        assert_eq!(coeff_row(8), Some(7));
        assert_eq!(coeff_row(9), None);
        assert_eq!(coeff_row(10), Some(8));
        assert_eq!(coeff_row(11), Some(9));
    }
}
