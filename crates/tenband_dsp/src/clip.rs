//! Hard Clipping
//!
//! The last stage of the bank: every sample is limited to `[-1.0, 1.0]`.
//! Several overlapping boosts can push the cascade well past full scale,
//! and downstream devices expect samples in range.

/// Lowest output sample
pub const CLIP_MIN: f32 = -1.0;

/// Highest output sample
pub const CLIP_MAX: f32 = 1.0;

/// Limit a sample to `[-1.0, 1.0]`
///
/// NaN maps to silence so the output range holds for every input.
#[inline]
pub fn hard_clip(sample: f32) -> f32 {
    if sample.is_nan() {
        0.0
    } else {
        sample.clamp(CLIP_MIN, CLIP_MAX)
    }
}

/// Clip a buffer in-place
///
/// # Real-time Safety
/// No allocations, O(n) time.
#[inline]
pub fn hard_clip_buffer(buffer: &mut [f32]) {
    for sample in buffer.iter_mut() {
        *sample = hard_clip(*sample);
    }
}
