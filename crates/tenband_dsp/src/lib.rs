//! Tenband DSP - Digital Signal Processing Module
//!
//! This crate provides the equalizer core for Tenband:
//! - Peaking biquad coefficient synthesis from {center frequency, gain, Q}
//! - A fixed 10-band filter bank applying the cascade to multi-channel audio
//! - Hard clipping of the cascade output to [-1.0, 1.0]
//! - Lock-free gain updates from a control thread
//! - Zero-allocation processing path
//!
//! # Architecture
//!
//! The processing path follows a strict "no allocation in audio callback" rule.
//! Gains are read once per block from atomics; coefficients are rebuilt only
//! for bands whose gain changed.
//!
//! The crate does no I/O and no logging. Every error is returned to the caller.

mod band;
mod bank;
mod clip;
pub mod coeffs;
mod error;
mod gains;
mod processor;

pub use band::{Band, EQ_BANDS, NUM_BANDS};
pub use bank::{BankConfig, FilterBank, SKIP_THRESHOLD_DB};
pub use biquad::Coefficients;
pub use clip::{hard_clip, hard_clip_buffer};
pub use error::DspError;
pub use gains::{BankControl, GainTable, MAX_GAIN_DB};
pub use processor::{AudioProcessor, ProcessContext};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_exports() {
        // Verify all public types are accessible
        let _config = BankConfig::default();
        let bank = FilterBank::new(BankConfig::default()).unwrap();
        let _control: BankControl = bank.control();
        let _coeffs: Coefficients<f64> = coeffs::identity();
    }
}
