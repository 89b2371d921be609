//! 10-Band Filter Bank
//!
//! Applies a cascade of peaking biquads, one per band in ascending-frequency
//! order, to multi-channel audio and hard-clips the result.
//!
//! # Gain snapshots
//!
//! Gains live in a shared [`GainTable`] written by the control thread. At the
//! top of every processing call the bank reads all ten gains once and uses
//! that snapshot for the whole block, so every channel of a block is filtered
//! with the same coefficients.
//!
//! # Filter history
//!
//! Each (band, channel) pair owns a `DirectForm2Transposed` section whose two
//! state words carry across blocks. History is cleared when:
//! - a band goes from skipped (|gain| <= 0.1 dB) to active,
//! - `reset_all` is called,
//! - a new bank is built (a new session).
//!
//! Gain changes on an active band update coefficients in place and keep
//! history.

use std::sync::Arc;

use biquad::{Biquad, Coefficients, DirectForm2Transposed};

use crate::band::{Band, NUM_BANDS};
use crate::clip::hard_clip;
use crate::coeffs::{self, check_frequency, check_q, check_sample_rate, magnitude_at};
use crate::error::DspError;
use crate::gains::{BankControl, GainTable};

/// Bands whose |gain| is at or below this many dB are skipped
pub const SKIP_THRESHOLD_DB: f64 = 0.1;

/// Gain synthesized for every band while validating a configuration
const CHECK_GAIN_DB: f64 = 6.0;

/// Construction-time configuration of a bank
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BankConfig {
    /// Sample rate in Hz
    pub sample_rate: f64,
    /// Q factor shared by every band
    pub q: f64,
    /// Channel count to preallocate filter state for
    pub channels: usize,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            q: 1.0,
            channels: 2,
        }
    }
}

impl BankConfig {
    /// Check every band can be synthesized at this sample rate and Q
    pub fn validate(&self) -> Result<(), DspError> {
        check_sample_rate(self.sample_rate)?;
        check_q(self.q)?;
        if self.channels == 0 {
            return Err(DspError::invalid("channel count", 0.0, "at least 1"));
        }
        for band in Band::ALL {
            check_frequency(band.frequency(), self.sample_rate)?;
            coeffs::peaking(band.frequency(), CHECK_GAIN_DB, self.q, self.sample_rate)?;
        }
        Ok(())
    }
}

/// One band's cascade section across all channels
#[derive(Debug)]
struct Section {
    band: Band,
    coeffs: Coefficients<f64>,
    /// Gain the current coefficients were built for; `None` while skipped
    applied_gain: Option<f64>,
    /// Last gain that failed to synthesize, so it is not retried every block
    rejected_gain: Option<f64>,
    filters: Vec<DirectForm2Transposed<f64>>,
}

impl Section {
    fn new(band: Band, channels: usize) -> Self {
        let coeffs = coeffs::identity();
        Self {
            band,
            coeffs,
            applied_gain: None,
            rejected_gain: None,
            filters: (0..channels)
                .map(|_| DirectForm2Transposed::<f64>::new(coeffs))
                .collect(),
        }
    }

    #[inline]
    fn is_active(&self) -> bool {
        self.applied_gain.is_some()
    }

    /// Bring the section in line with a gain from the current snapshot
    fn sync(&mut self, gain_db: f64, sample_rate: f64, q: f64) {
        if gain_db.abs() <= SKIP_THRESHOLD_DB {
            self.applied_gain = None;
            return;
        }
        if self.applied_gain == Some(gain_db) || self.rejected_gain == Some(gain_db) {
            return;
        }

        // Frequency, Q and rate were validated at construction and the gain
        // table bounds the gain, so this only fails for a table written past
        // those bounds. Such a band passes through until its gain changes.
        let Some(coeffs) = coeffs::section(self.band.frequency(), gain_db, q, sample_rate) else {
            self.applied_gain = None;
            self.rejected_gain = Some(gain_db);
            return;
        };
        self.rejected_gain = None;

        let was_active = self.is_active();
        self.coeffs = coeffs;
        self.applied_gain = Some(gain_db);
        for filter in &mut self.filters {
            filter.update_coefficients(coeffs);
            if !was_active {
                filter.reset_state();
            }
        }
    }

    fn ensure_channels(&mut self, channels: usize) {
        let coeffs = self.coeffs;
        while self.filters.len() < channels {
            self.filters.push(DirectForm2Transposed::<f64>::new(coeffs));
        }
    }

    fn reset_state(&mut self) {
        for filter in &mut self.filters {
            filter.reset_state();
        }
    }
}

/// The equalizer's filter bank
///
/// Owned by the processing thread. Gains can be changed through `&self`
/// (or a [`BankControl`] handle from another thread) while blocks are
/// processed; history is only touched by the processing methods.
#[derive(Debug)]
pub struct FilterBank {
    sections: [Section; NUM_BANDS],
    table: Arc<GainTable>,
    seen_epoch: u64,
    config: BankConfig,
}

impl FilterBank {
    /// Build a bank with its own flat gain table
    ///
    /// Fails fast with [`DspError::InvalidParameter`] if any band cannot be
    /// synthesized at the configured sample rate and Q.
    pub fn new(config: BankConfig) -> Result<Self, DspError> {
        Self::with_gains(config, Arc::new(GainTable::new()))
    }

    /// Build a bank reading gains from an existing table
    ///
    /// History starts cleared; gains already in the table are picked up on
    /// the first processing pass.
    pub fn with_gains(config: BankConfig, table: Arc<GainTable>) -> Result<Self, DspError> {
        config.validate()?;
        let seen_epoch = table.reset_epoch();
        Ok(Self {
            sections: core::array::from_fn(|i| Section::new(Band::ALL[i], config.channels)),
            table,
            seen_epoch,
            config,
        })
    }

    /// Handle for changing gains from another thread
    pub fn control(&self) -> BankControl {
        BankControl::new(Arc::clone(&self.table))
    }

    /// Set a band's gain by display label (e.g. `"1 kHz"`)
    ///
    /// Fails with [`DspError::UnknownBand`] for labels outside the band table;
    /// the gain table is left unchanged.
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

    /// All gains in band order
    pub fn gains(&self) -> [f64; NUM_BANDS] {
        self.table.snapshot()
    }

    /// Zero every gain and clear all filter history
    pub fn reset_all(&mut self) {
        self.table.reset_all();
        self.seen_epoch = self.table.reset_epoch();
        for section in &mut self.sections {
            section.applied_gain = None;
            section.reset_state();
        }
    }

    /// Clear filter history, keeping gains
    ///
    /// Call when switching audio sources to prevent filter ringing
    pub fn reset_history(&mut self) {
        for section in &mut self.sections {
            section.reset_state();
        }
    }

    pub fn config(&self) -> &BankConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f64 {
        self.config.sample_rate
    }

    /// Bands that were active in the most recent processing pass
    pub fn active_bands(&self) -> impl Iterator<Item = Band> + '_ {
        self.sections
            .iter()
            .filter(|section| section.is_active())
            .map(|section| section.band)
    }

    /// Combined magnitude response of the current gains at `frequency`, in dB
    ///
    /// Reads the gain table directly, so it reflects changes that have not
    /// been processed yet.
    pub fn response_db(&self, frequency: f64) -> f64 {
        let gains = self.table.snapshot();
        let magnitude: f64 = Band::ALL
            .iter()
            .zip(gains)
            .filter(|(_, gain_db)| gain_db.abs() > SKIP_THRESHOLD_DB)
            .map(|(band, gain_db)| {
                coeffs::peaking(band.frequency(), gain_db, self.config.q, self.config.sample_rate)
                    .map(|c| magnitude_at(&c, frequency, self.config.sample_rate))
                    .unwrap_or(1.0)
            })
            .product();
        20.0 * magnitude.log10()
    }

    /// Read the gain snapshot for one block and get filters ready
    fn prepare(&mut self, channels: usize) {
        let epoch = self.table.reset_epoch();
        if epoch != self.seen_epoch {
            self.seen_epoch = epoch;
            self.reset_history();
        }

        let gains = self.table.snapshot();
        let (sample_rate, q) = (self.config.sample_rate, self.config.q);
        for (section, gain_db) in self.sections.iter_mut().zip(gains) {
            section.sync(gain_db, sample_rate, q);
            // Allocates only the first time a wider block shows up
            section.ensure_channels(channels);
        }
    }

    /// Process separate channel buffers in-place
    ///
    /// Channels may have different lengths; each is processed as given.
    ///
    /// # Real-time Safety
    /// No allocations once this channel count has been seen. O(n) where
    /// n = total samples.
    pub fn process_planar<C: AsMut<[f32]>>(&mut self, channels: &mut [C]) {
        self.prepare(channels.len());

        for (channel, data) in channels.iter_mut().enumerate() {
            for sample in data.as_mut().iter_mut() {
                *sample = run_cascade(&mut self.sections, channel, *sample);
            }
        }
    }

    /// Process an interleaved buffer in-place
    ///
    /// Buffer format: [C0, C1, .., C0, C1, ..]. Samples of a trailing
    /// partial frame are clipped but not filtered.
    ///
    /// # Real-time Safety
    /// No allocations once this channel count has been seen.
    pub fn process_interleaved(&mut self, buffer: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        self.prepare(channels);

        let mut frames = buffer.chunks_exact_mut(channels);
        for frame in &mut frames {
            for (channel, sample) in frame.iter_mut().enumerate() {
                *sample = run_cascade(&mut self.sections, channel, *sample);
            }
        }
        for sample in frames.into_remainder() {
            *sample = hard_clip(*sample);
        }
    }

    /// Process a block and return the equalized copy
    ///
    /// The output has the same channel count and per-channel lengths as the
    /// input. Allocates the output; use [`process_planar`](Self::process_planar)
    /// from an audio callback.
    pub fn process<C: AsRef<[f32]>>(&mut self, block: &[C]) -> Vec<Vec<f32>> {
        let mut output: Vec<Vec<f32>> = block.iter().map(|ch| ch.as_ref().to_vec()).collect();
        self.process_planar(&mut output);
        output
    }
}

/// Run one sample of one channel through every active section, then clip
#[inline]
fn run_cascade(sections: &mut [Section; NUM_BANDS], channel: usize, input: f32) -> f32 {
    let mut y = f64::from(input);
    for section in sections.iter_mut() {
        if section.is_active() {
            y = section.filters[channel].run(y);
        }
    }

    if !y.is_finite() {
        // A runaway section would otherwise stay NaN forever
        for section in sections.iter_mut() {
            section.filters[channel].reset_state();
        }
        return 0.0;
    }

    hard_clip(y as f32)
}
