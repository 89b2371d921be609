//! Fixed Band Table
//!
//! The equalizer has ten bands, known at compile time and ordered by
//! ascending center frequency. Labels are only a lookup convenience for
//! control surfaces; everything inside the bank works with [`Band`].

use std::fmt;
use std::str::FromStr;

use crate::error::DspError;

/// Number of bands in the equalizer
pub const NUM_BANDS: usize = 10;

/// Center frequencies (Hz), in cascade order
pub const EQ_BANDS: [f64; NUM_BANDS] = [
    60.0,    // Sub-bass
    170.0,   // Bass
    310.0,   // Low-mid
    600.0,   // Mid
    1000.0,  // Upper-mid
    3000.0,  // Presence
    6000.0,  // Treble
    12000.0, // Brilliance
    14000.0, // High
    16000.0, // Air
];

/// One of the ten fixed equalizer bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Band {
    Hz60,
    Hz170,
    Hz310,
    Hz600,
    Khz1,
    Khz3,
    Khz6,
    Khz12,
    Khz14,
    Khz16,
}

impl Band {
    /// All bands in ascending-frequency (cascade) order
    pub const ALL: [Band; NUM_BANDS] = [
        Band::Hz60,
        Band::Hz170,
        Band::Hz310,
        Band::Hz600,
        Band::Khz1,
        Band::Khz3,
        Band::Khz6,
        Band::Khz12,
        Band::Khz14,
        Band::Khz16,
    ];

    /// Position in the band table (0-9)
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Band at a table position
    pub fn from_index(index: usize) -> Option<Band> {
        Band::ALL.get(index).copied()
    }

    /// Center frequency in Hz
    #[inline]
    pub const fn frequency(self) -> f64 {
        EQ_BANDS[self as usize]
    }

    /// Display label, as shown next to a slider
    pub const fn label(self) -> &'static str {
        match self {
            Band::Hz60 => "60 Hz",
            Band::Hz170 => "170 Hz",
            Band::Hz310 => "310 Hz",
            Band::Hz600 => "600 Hz",
            Band::Khz1 => "1 kHz",
            Band::Khz3 => "3 kHz",
            Band::Khz6 => "6 kHz",
            Band::Khz12 => "12 kHz",
            Band::Khz14 => "14 kHz",
            Band::Khz16 => "16 kHz",
        }
    }

    /// Look a band up by its exact display label
    pub fn from_label(label: &str) -> Option<Band> {
        Band::ALL.into_iter().find(|band| band.label() == label)
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Band {
    type Err = DspError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Band::from_label(s).ok_or_else(|| DspError::UnknownBand(s.to_string()))
    }
}
