//! Engine Configuration

use serde::{Deserialize, Serialize};
use tenband_dsp::BankConfig;

/// Equalizer session configuration
///
/// Fixed for the lifetime of a processing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqualizerConfig {
    /// Sample rate in Hz (e.g., 44100, 48000, 96000)
    pub sample_rate: u32,

    /// Block size in frames (lower = less latency, higher = more stability)
    pub block_size: u32,

    /// Number of audio channels (1 = mono, 2 = stereo)
    pub channels: u16,

    /// Q factor shared by every band
    pub q_factor: f64,
}

impl Default for EqualizerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            block_size: 2048,
            channels: 2,
            q_factor: 1.0,
        }
    }
}

impl EqualizerConfig {
    /// Block duration in milliseconds, the deadline for one `process` call
    pub fn latency_ms(&self) -> f32 {
        (self.block_size as f32 / self.sample_rate as f32) * 1000.0
    }

    /// Samples in one interleaved block
    pub fn samples_per_block(&self) -> usize {
        self.block_size as usize * self.channels as usize
    }

    /// Configuration for the filter bank
    pub fn bank_config(&self) -> BankConfig {
        BankConfig {
            sample_rate: f64::from(self.sample_rate),
            q: self.q_factor,
            channels: usize::from(self.channels),
        }
    }

    /// Validate configuration
    ///
    /// Range checks only; whether every band fits below Nyquist is checked
    /// when the filter bank is built.
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate < 8000 || self.sample_rate > 192000 {
            return Err(format!("Invalid sample rate: {}", self.sample_rate));
        }
        if self.channels == 0 || self.channels > 8 {
            return Err(format!("Invalid channel count: {}", self.channels));
        }
        if self.block_size < 32 || self.block_size > 8192 {
            return Err(format!("Invalid block size: {}", self.block_size));
        }
        if !(self.q_factor.is_finite() && self.q_factor > 0.0) {
            return Err(format!("Invalid Q factor: {}", self.q_factor));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EqualizerConfig::default();
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.block_size, 2048);
        assert_eq!(config.channels, 2);
        assert_eq!(config.q_factor, 1.0);
    }

    #[test]
    fn test_latency_calculation() {
        let config = EqualizerConfig {
            sample_rate: 48000,
            block_size: 480, // Exactly 10ms at 48kHz
            ..Default::default()
        };
        assert!((config.latency_ms() - 10.0).abs() < 0.01);

        // Default block: 2048 / 44100 ≈ 46.4ms
        assert!((EqualizerConfig::default().latency_ms() - 46.44).abs() < 0.01);
    }

    #[test]
    fn test_samples_per_block() {
        let config = EqualizerConfig::default();
        assert_eq!(config.samples_per_block(), 4096);
    }

    #[test]
    fn test_bank_config() {
        let config = EqualizerConfig {
            sample_rate: 48000,
            channels: 1,
            q_factor: 2.0,
            ..Default::default()
        };
        let bank = config.bank_config();
        assert_eq!(bank.sample_rate, 48000.0);
        assert_eq!(bank.channels, 1);
        assert_eq!(bank.q, 2.0);
    }

    #[test]
    fn test_validation() {
        assert!(EqualizerConfig::default().validate().is_ok());

        let invalid_rate = EqualizerConfig {
            sample_rate: 100,
            ..Default::default()
        };
        assert!(invalid_rate.validate().is_err());

        let invalid_channels = EqualizerConfig {
            channels: 0,
            ..Default::default()
        };
        assert!(invalid_channels.validate().is_err());

        let invalid_block = EqualizerConfig {
            block_size: 10,
            ..Default::default()
        };
        assert!(invalid_block.validate().is_err());

        let invalid_q = EqualizerConfig {
            q_factor: -1.0,
            ..Default::default()
        };
        assert!(invalid_q.validate().is_err());

        let nan_q = EqualizerConfig {
            q_factor: f64::NAN,
            ..Default::default()
        };
        assert!(nan_q.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = EqualizerConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: EqualizerConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config, deserialized);
    }
}
