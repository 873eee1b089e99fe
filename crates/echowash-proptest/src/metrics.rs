//! Signal metrics for judging pipeline output.

/// Root mean square level of a sample block.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

/// Largest absolute sample in a block.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
}

/// Level drop from `reference` to `processed` in dB. Positive when the
/// processed signal is quieter.
pub fn attenuation_db(reference: &[f32], processed: &[f32]) -> f32 {
    let reference_rms = rms(reference).max(f32::EPSILON);
    let processed_rms = rms(processed).max(f32::EPSILON);
    20.0 * (reference_rms / processed_rms).log10()
}

/// Largest absolute difference between two equal-length blocks and the
/// index where it occurs.
pub fn max_abs_diff(a: &[f32], b: &[f32]) -> (f32, usize) {
    assert_eq!(a.len(), b.len(), "length mismatch");
    let mut max = 0.0f32;
    let mut at = 0;
    for (i, (x, y)) in a.iter().zip(b).enumerate() {
        let diff = (x - y).abs();
        if diff > max {
            max = diff;
            at = i;
        }
    }
    (max, at)
}

/// Assert two sample blocks match within an absolute tolerance.
pub fn assert_near(actual: &[f32], expected: &[f32], tolerance: f32) {
    let (diff, at) = max_abs_diff(actual, expected);
    assert!(
        diff <= tolerance,
        "samples differ at index {at}: actual={}, expected={}, diff={diff}, tolerance={tolerance}",
        actual[at],
        expected[at],
    );
}
