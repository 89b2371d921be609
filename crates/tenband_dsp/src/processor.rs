//! Audio Processor Trait
//!
//! Defines the interface a host audio callback drives. The device stream in
//! `tenband_core` is generic over this trait rather than tied to the bank.

use crate::bank::FilterBank;

/// Context passed to processors containing stream metadata
#[derive(Debug, Clone, Copy)]
pub struct ProcessContext {
    pub sample_rate: f32,
    pub channels: usize,
    pub buffer_size: usize,
}

impl ProcessContext {
    pub fn new(sample_rate: f32, channels: usize, buffer_size: usize) -> Self {
        Self {
            sample_rate,
            channels,
            buffer_size,
        }
    }
}

/// Trait for audio processors driven by a device callback
///
/// # Real-time Safety Contract
///
/// Implementors MUST follow these rules in `process()`:
/// - NO heap allocations (no Vec::push, no Box::new, no String)
/// - NO syscalls (no file I/O, no network, no mutex locks)
/// - NO unbounded loops
/// - Constant or O(n) time complexity where n = buffer size
///
/// Violating these rules causes audio dropouts ("glitches").
pub trait AudioProcessor: Send {
    /// Process audio buffer in-place
    ///
    /// Buffer format is interleaved with `context.channels` channels.
    fn process(&mut self, buffer: &mut [f32], context: &ProcessContext);

    /// Reset internal state (delay lines, envelopes, etc.)
    fn reset(&mut self);

    /// Human-readable name for debugging/UI
    fn name(&self) -> &'static str;
}

impl AudioProcessor for FilterBank {
    fn process(&mut self, buffer: &mut [f32], context: &ProcessContext) {
        self.process_interleaved(buffer, context.channels);
    }

    fn reset(&mut self) {
        self.reset_history();
    }

    fn name(&self) -> &'static str {
        "10-Band Equalizer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::BankConfig;

    #[test]
    fn test_process_context() {
        let ctx = ProcessContext::new(44100.0, 2, 2048);
        assert_eq!(ctx.sample_rate, 44100.0);
        assert_eq!(ctx.channels, 2);
        assert_eq!(ctx.buffer_size, 2048);
    }

    #[test]
    fn test_bank_as_processor() {
        let mut bank = FilterBank::new(BankConfig::default()).unwrap();
        bank.set_gain("60 Hz", 4.0).unwrap();

        let processor: &mut dyn AudioProcessor = &mut bank;
        assert_eq!(processor.name(), "10-Band Equalizer");

        let ctx = ProcessContext::new(44100.0, 2, 4);
        let mut buffer = vec![0.5_f32, -0.5, 0.3, -0.3, 1.5, -1.5, 0.0, 0.0];
        processor.process(&mut buffer, &ctx);

        for sample in &buffer {
            assert!(sample.is_finite());
            assert!((-1.0..=1.0).contains(sample));
        }

        processor.reset();
    }

    #[test]
    fn test_processor_uses_context_channels() {
        let mut via_trait = FilterBank::new(BankConfig::default()).unwrap();
        let mut direct = FilterBank::new(BankConfig::default()).unwrap();
        via_trait.set_gain("1 kHz", 5.0).unwrap();
        direct.set_gain("1 kHz", 5.0).unwrap();

        let input: Vec<f32> = (0..24).map(|i| ((i as f32) * 0.37).sin() * 0.5).collect();

        let mut a = input.clone();
        AudioProcessor::process(&mut via_trait, &mut a, &ProcessContext::new(44100.0, 3, 8));

        let mut b = input;
        direct.process_interleaved(&mut b, 3);

        assert_eq!(a, b);
    }
}
