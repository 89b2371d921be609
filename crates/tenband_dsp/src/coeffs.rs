//! Peaking Biquad Coefficient Synthesis
//!
//! Derives normalized second-order peaking (boost/cut) sections from
//! `{center frequency, gain in dB, Q, sample rate}`:
//!
//! ```text
//! A  = 10^(G_dB / 20)
//! w0 = 2π · f0 / fs          alpha = sin(w0) / (2Q)
//!
//! b0 = 1 + alpha·A    b1 = -2·cos(w0)    b2 = 1 - alpha·A
//! a0 = 1 + alpha/A    a1 = -2·cos(w0)    a2 = 1 - alpha/A
//! ```
//!
//! Every coefficient is divided by `a0`. Inside the supported domain
//! `sin(w0) > 0` and `A > 0`, so `a0 > 1` and normalization is always safe.
//!
//! All math is `f64`; low-frequency sections lose precision quickly in `f32`.

use std::f64::consts::PI;

use biquad::Coefficients;

use crate::error::DspError;

/// Convert dB gain to linear amplitude
/// Formula: amplitude = 10^(dB/20)
#[inline]
pub fn db_to_amplitude(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Coefficients of the pass-through section
pub fn identity() -> Coefficients<f64> {
    Coefficients {
        a1: 0.0,
        a2: 0.0,
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
    }
}

/// Validate a sample rate
pub fn check_sample_rate(sample_rate: f64) -> Result<(), DspError> {
    if !(sample_rate.is_finite() && sample_rate > 0.0) {
        return Err(DspError::invalid("sample rate", sample_rate, "positive and finite"));
    }
    Ok(())
}

/// Validate a Q factor
pub fn check_q(q: f64) -> Result<(), DspError> {
    if !(q.is_finite() && q > 0.0) {
        return Err(DspError::invalid("Q factor", q, "positive and finite"));
    }
    Ok(())
}

/// Validate a center frequency against the Nyquist limit of `sample_rate`
pub fn check_frequency(frequency: f64, sample_rate: f64) -> Result<(), DspError> {
    check_sample_rate(sample_rate)?;
    let nyquist = sample_rate / 2.0;
    if !(frequency > 0.0 && frequency < nyquist) {
        return Err(DspError::invalid(
            "center frequency",
            frequency,
            format!("between 0 and {nyquist} Hz (exclusive)"),
        ));
    }
    Ok(())
}

/// Synthesize a normalized peaking-EQ section
///
/// A gain of exactly 0 dB yields [`identity`]: with `A = 1` numerator and
/// denominator are equal, so the canonical form is returned instead of the
/// algebraically equal pair.
pub fn peaking(
    frequency: f64,
    gain_db: f64,
    q: f64,
    sample_rate: f64,
) -> Result<Coefficients<f64>, DspError> {
    check_frequency(frequency, sample_rate)?;
    check_q(q)?;
    if !gain_db.is_finite() {
        return Err(DspError::invalid("gain", gain_db, "finite"));
    }

    section(frequency, gain_db, q, sample_rate).ok_or_else(|| {
        DspError::invalid(
            "gain",
            gain_db,
            "small enough to yield finite coefficients",
        )
    })
}

/// Peaking section without parameter checks
///
/// Returns `None` when the coefficients are not finite. Never allocates, so
/// the audio thread may call it with parameters validated up front.
pub(crate) fn section(
    frequency: f64,
    gain_db: f64,
    q: f64,
    sample_rate: f64,
) -> Option<Coefficients<f64>> {
    if gain_db == 0.0 {
        return Some(identity());
    }

    let a = db_to_amplitude(gain_db);
    let w0 = 2.0 * PI * frequency / sample_rate;
    let alpha = w0.sin() / (2.0 * q);
    let cos_w0 = w0.cos();

    let b0 = 1.0 + alpha * a;
    let b1 = -2.0 * cos_w0;
    let b2 = 1.0 - alpha * a;
    let a0 = 1.0 + alpha / a;
    let a1 = -2.0 * cos_w0;
    let a2 = 1.0 - alpha / a;

    let coeffs = Coefficients {
        a1: a1 / a0,
        a2: a2 / a0,
        b0: b0 / a0,
        b1: b1 / a0,
        b2: b2 / a0,
    };

    // Gains in the thousands of dB overflow A (or underflow it to zero)
    [coeffs.a1, coeffs.a2, coeffs.b0, coeffs.b1, coeffs.b2]
        .iter()
        .all(|c| c.is_finite())
        .then_some(coeffs)
}

/// Linear magnitude of a section's response at `frequency`
///
/// Evaluates `|H(e^jw)|` with `H(z) = (b0 + b1 z^-1 + b2 z^-2) / (1 + a1 z^-1 + a2 z^-2)`.
pub fn magnitude_at(coeffs: &Coefficients<f64>, frequency: f64, sample_rate: f64) -> f64 {
    let w = 2.0 * PI * frequency / sample_rate;
    let (sin_w, cos_w) = w.sin_cos();
    let (sin_2w, cos_2w) = (2.0 * w).sin_cos();

    let num_re = coeffs.b0 + coeffs.b1 * cos_w + coeffs.b2 * cos_2w;
    let num_im = -coeffs.b1 * sin_w - coeffs.b2 * sin_2w;
    let den_re = 1.0 + coeffs.a1 * cos_w + coeffs.a2 * cos_2w;
    let den_im = -coeffs.a1 * sin_w - coeffs.a2 * sin_2w;

    let num = (num_re * num_re + num_im * num_im).sqrt();
    let den = (den_re * den_re + den_im * den_im).sqrt();
    num / den
}
