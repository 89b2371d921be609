//! Shared Gain Table
//!
//! The control thread writes gains while the audio thread reads them.
//! Each band's gain is a single atomic word, so a reader sees either the
//! old or the new value, never a torn one. There is no cross-band ordering.
//!
//! Rust pattern: AtomicF64 doesn't exist, so gains are stored as `f64` bits
//! in an `AtomicU64`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::band::{Band, NUM_BANDS};
use crate::error::DspError;

/// Largest boost or cut a band accepts, in dB
///
/// Well past the ±12 dB of a typical slider, and far below the gains whose
/// coefficients stop being finite.
pub const MAX_GAIN_DB: f64 = 48.0;

/// Per-band gains in dB, shared between control and audio threads
#[derive(Debug)]
pub struct GainTable {
    gain_bits: [AtomicU64; NUM_BANDS],
    /// Bumped by every `reset_all`; the bank clears its history when it
    /// observes a new value.
    reset_epoch: AtomicU64,
}

impl GainTable {
    /// Create a flat (all 0 dB) table
    pub fn new() -> Self {
        Self {
            gain_bits: core::array::from_fn(|_| AtomicU64::new(0.0_f64.to_bits())),
            reset_epoch: AtomicU64::new(0),
        }
    }

    /// Set a band's gain
    ///
    /// Gains outside ±[`MAX_GAIN_DB`] (or not finite) are rejected and leave
    /// the table unchanged.
    pub fn set(&self, band: Band, gain_db: f64) -> Result<(), DspError> {
        if !(gain_db.is_finite() && gain_db.abs() <= MAX_GAIN_DB) {
            return Err(DspError::invalid(
                "gain",
                gain_db,
                format!("within ±{MAX_GAIN_DB} dB"),
            ));
        }
        self.gain_bits[band.index()].store(gain_db.to_bits(), Ordering::Relaxed);
        Ok(())
    }

    /// Set a band's gain by display label
    pub fn set_by_label(&self, label: &str, gain_db: f64) -> Result<(), DspError> {
        let band: Band = label.parse()?;
        self.set(band, gain_db)
    }

    /// Current gain of one band
    #[inline]
    pub fn get(&self, band: Band) -> f64 {
        f64::from_bits(self.gain_bits[band.index()].load(Ordering::Relaxed))
    }

    /// Read every band once
    #[inline]
    pub fn snapshot(&self) -> [f64; NUM_BANDS] {
        core::array::from_fn(|i| f64::from_bits(self.gain_bits[i].load(Ordering::Relaxed)))
    }

    /// Zero every gain and request a history reset
    pub fn reset_all(&self) {
        for bits in &self.gain_bits {
            bits.store(0.0_f64.to_bits(), Ordering::Relaxed);
        }
        self.reset_epoch.fetch_add(1, Ordering::Release);
    }

    #[inline]
    pub(crate) fn reset_epoch(&self) -> u64 {
        self.reset_epoch.load(Ordering::Acquire)
    }
}

impl Default for GainTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Control-side handle to a filter bank
///
/// Cheap to clone and `Send + Sync`. Gain writes are visible to the bank on
/// its next processing pass; a `reset_all` clears the bank's history at the
/// start of that pass.
#[derive(Debug, Clone)]
pub struct BankControl {
    table: Arc<GainTable>,
}

impl BankControl {
    pub fn new(table: Arc<GainTable>) -> Self {
        Self { table }
    }

    /// Set a band's gain by display label (e.g. `"1 kHz"`)
    ///
    /// Fails with [`DspError::UnknownBand`] for labels outside the band table.
    pub fn set_gain(&self, label: &str, gain_db: f64) -> Result<(), DspError> {
        self.table.set_by_label(label, gain_db)
    }

    /// Set a band's gain
    pub fn set_band_gain(&self, band: Band, gain_db: f64) -> Result<(), DspError> {
        self.table.set(band, gain_db)
    }

    pub fn gain(&self, band: Band) -> f64 {
        self.table.get(band)
    }

    /// All gains in band order (useful for UI serialization)
    pub fn gains(&self) -> [f64; NUM_BANDS] {
        self.table.snapshot()
    }

    /// Zero every gain and clear the bank's history before its next pass
    pub fn reset_all(&self) {
        self.table.reset_all();
    }

    /// The shared table this handle writes to
    pub fn table(&self) -> &Arc<GainTable> {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_default_table_is_flat() {
        let table = GainTable::new();
        assert_eq!(table.snapshot(), [0.0; NUM_BANDS]);
    }

    #[test]
    fn test_set_and_get() {
        let table = GainTable::new();
        table.set(Band::Khz1, 6.0).unwrap();
        table.set(Band::Hz60, -3.5).unwrap();

        assert_eq!(table.get(Band::Khz1), 6.0);
        assert_eq!(table.get(Band::Hz60), -3.5);
        assert_eq!(table.get(Band::Khz16), 0.0);
    }

    #[test]
    fn test_set_by_label() {
        let table = GainTable::new();
        table.set_by_label("3 kHz", 4.5).unwrap();
        assert_eq!(table.get(Band::Khz3), 4.5);
    }

    #[test]
    fn test_unknown_label_leaves_table_unchanged() {
        let table = GainTable::new();
        table.set(Band::Hz170, 2.0).unwrap();
        let before = table.snapshot();

        let err = table.set_by_label("not-a-band", 3.0).unwrap_err();
        assert_eq!(err, DspError::UnknownBand("not-a-band".into()));
        assert_eq!(table.snapshot(), before);
    }

    #[test]
    fn test_non_finite_gain_rejected() {
        let table = GainTable::new();
        table.set(Band::Khz6, 1.0).unwrap();

        assert!(table.set(Band::Khz6, f64::NAN).is_err());
        assert!(table.set(Band::Khz6, f64::NEG_INFINITY).is_err());
        assert_eq!(table.get(Band::Khz6), 1.0);
    }

    #[test]
    fn test_gain_range() {
        let table = GainTable::new();
        table.set(Band::Khz1, MAX_GAIN_DB).unwrap();
        table.set(Band::Khz3, -MAX_GAIN_DB).unwrap();

        let err = table.set_by_label("1 kHz", 1.0e6).unwrap_err();
        assert!(err.is_invalid_parameter());
        assert!(table.set(Band::Khz3, -(MAX_GAIN_DB + 0.1)).is_err());

        assert_eq!(table.get(Band::Khz1), MAX_GAIN_DB);
        assert_eq!(table.get(Band::Khz3), -MAX_GAIN_DB);
    }

    #[test]
    fn test_reset_all_zeroes_and_bumps_epoch() {
        let table = GainTable::new();
        table.set(Band::Hz310, 9.0).unwrap();
        let epoch = table.reset_epoch();

        table.reset_all();
        assert_eq!(table.snapshot(), [0.0; NUM_BANDS]);
        assert_eq!(table.reset_epoch(), epoch + 1);
    }

    #[test]
    fn test_control_handles_share_table() {
        let control = BankControl::new(Arc::new(GainTable::new()));
        let other = control.clone();

        other.set_gain("600 Hz", -7.0).unwrap();
        assert_eq!(control.gain(Band::Hz600), -7.0);

        control.reset_all();
        assert_eq!(other.gains(), [0.0; NUM_BANDS]);
    }

    #[test]
    fn test_concurrent_writes_are_never_torn() {
        let table = Arc::new(GainTable::new());
        let writer_table = Arc::clone(&table);

        let writer = thread::spawn(move || {
            for i in 0..10_000 {
                let gain = if i % 2 == 0 { 12.25 } else { -3.125 };
                writer_table.set(Band::Khz1, gain).unwrap();
            }
        });

        for _ in 0..10_000 {
            let gain = table.get(Band::Khz1);
            assert!(gain == 0.0 || gain == 12.25 || gain == -3.125, "torn read: {gain}");
        }

        writer.join().unwrap();
    }
}
