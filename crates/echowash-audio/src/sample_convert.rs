//! Sample format conversions and channel layout helpers.
//!
//! The pipeline runs on `f32` samples in \[-1.0, 1.0\]; these functions
//! convert between that representation and the integer PCM formats found in
//! WAV containers, and rearrange samples between interleaved and planar
//! layouts.

const S16_TO_FLOAT_SCALING: f32 = 1.0 / 32768.0;

// ── Scalar conversions ──────────────────────────────────────────────

/// Convert a 16-bit PCM sample to float \[-1.0, 1.0\].
#[inline]
pub fn s16_to_float(v: i16) -> f32 {
    f32::from(v) * S16_TO_FLOAT_SCALING
}

/// Convert a float \[-1.0, 1.0\] sample to 16-bit PCM, rounding to nearest
/// and saturating out-of-range values.
#[inline]
pub fn float_to_s16(v: f32) -> i16 {
    let v = (v * 32768.0).clamp(-32768.0, 32767.0);
    (v + f32::copysign(0.5, v)) as i16
}

/// Convert an integer PCM sample of the given bit width to float \[-1.0, 1.0\].
///
/// Covers the 8/16/24/32-bit widths a WAV container can carry.
#[inline]
pub fn int_to_float(v: i32, bits: u16) -> f32 {
    debug_assert!((1..=32).contains(&bits));
    v as f32 / (1u64 << (bits - 1)) as f32
}

// ── Slice conversions ───────────────────────────────────────────────

/// Convert a slice of 16-bit PCM samples to float into `dest`.
///
/// # Panics
///
/// Panics if `src` and `dest` have different lengths.
pub fn s16_to_float_slice(src: &[i16], dest: &mut [f32]) {
    assert_eq!(src.len(), dest.len(), "slice length mismatch");
    for (d, &s) in dest.iter_mut().zip(src) {
        *d = s16_to_float(s);
    }
}

/// Convert a slice of float samples to 16-bit PCM into `dest`.
///
/// # Panics
///
/// Panics if `src` and `dest` have different lengths.
pub fn float_to_s16_slice(src: &[f32], dest: &mut [i16]) {
    assert_eq!(src.len(), dest.len(), "slice length mismatch");
    for (d, &s) in dest.iter_mut().zip(src) {
        *d = float_to_s16(s);
    }
}

// ── Interleave / deinterleave ───────────────────────────────────────

/// Deinterleave multi-channel audio into per-channel buffers.
///
/// `interleaved` holds `samples_per_channel` frames of `num_channels`
/// samples each; `deinterleaved[ch]` receives channel `ch`.
pub fn deinterleave<T: Copy>(
    interleaved: &[T],
    deinterleaved: &mut [&mut [T]],
    samples_per_channel: usize,
    num_channels: usize,
) {
    assert_eq!(
        interleaved.len(),
        samples_per_channel * num_channels,
        "interleaved length mismatch"
    );
    assert_eq!(deinterleaved.len(), num_channels, "channel count mismatch");

    for (ch, channel_buf) in deinterleaved.iter_mut().enumerate() {
        assert!(
            channel_buf.len() >= samples_per_channel,
            "channel {ch} buffer too short"
        );
        let mut idx = ch;
        for slot in channel_buf.iter_mut().take(samples_per_channel) {
            *slot = interleaved[idx];
            idx += num_channels;
        }
    }
}

/// Interleave per-channel buffers into a single interleaved buffer.
pub fn interleave<T: Copy>(
    deinterleaved: &[&[T]],
    interleaved: &mut [T],
    samples_per_channel: usize,
    num_channels: usize,
) {
    assert_eq!(
        interleaved.len(),
        samples_per_channel * num_channels,
        "interleaved length mismatch"
    );
    assert_eq!(deinterleaved.len(), num_channels, "channel count mismatch");

    for (ch, channel_buf) in deinterleaved.iter().enumerate() {
        assert!(
            channel_buf.len() >= samples_per_channel,
            "channel {ch} buffer too short"
        );
        let mut idx = ch;
        for j in 0..samples_per_channel {
            interleaved[idx] = channel_buf[j];
            idx += num_channels;
        }
    }
}

// ── Channel mixdown ─────────────────────────────────────────────────

/// Mix planar channels down to mono by averaging.
///
/// # Panics
///
/// Panics if `channels` is empty or the lengths disagree with `mono`.
pub fn downmix_to_mono(channels: &[&[f32]], mono: &mut [f32]) {
    assert!(!channels.is_empty(), "need at least one channel");
    let len = mono.len();
    for (ch, samples) in channels.iter().enumerate() {
        assert_eq!(samples.len(), len, "channel {ch} length mismatch");
    }

    let scale = 1.0 / channels.len() as f32;
    for (i, slot) in mono.iter_mut().enumerate() {
        let acc: f32 = channels.iter().map(|c| c[i]).sum();
        *slot = acc * scale;
    }
}
