//! Audio Stream Management
//!
//! Handles the low-level CPAL stream setup and real-time audio callbacks.
//!
//! # Audio Flow
//!
//! ```text
//! Default input device → capture callback → ring buffer
//!     → output callback → FilterBank → peak meters → default output device
//! ```
//!
//! The capture callback only copies samples. All equalization happens in the
//! output callback so the filter state lives on a single thread.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig as CpalStreamConfig};
use crossbeam_channel::Sender;
use rtrb::{Consumer, Producer, RingBuffer};

use crate::config::EqualizerConfig;
use crate::error::{EngineError, EngineResult};
use crate::message::Event;
use tenband_dsp::{AudioProcessor, FilterBank, GainTable, ProcessContext};

/// Blocks of headroom in the capture -> output ring buffer
const RING_BLOCKS: usize = 4;

/// Shared state between audio callbacks and the engine thread
pub struct SharedState {
    /// Per-channel output peaks (stored as u32, interpreted as f32 bits)
    /// Rust pattern: AtomicF32 doesn't exist, so we use bit-casting
    peak_bits: Box<[AtomicU32]>,

    /// Set by a callback on underrun/overflow, cleared by the engine thread
    glitch_pending: AtomicBool,

    /// Total underruns and overflows since the stream opened
    glitch_count: AtomicU64,
}

impl SharedState {
    pub fn new(channels: usize) -> Self {
        Self {
            peak_bits: (0..channels)
                .map(|_| AtomicU32::new(0.0_f32.to_bits()))
                .collect(),
            glitch_pending: AtomicBool::new(false),
            glitch_count: AtomicU64::new(0),
        }
    }

    pub fn channels(&self) -> usize {
        self.peak_bits.len()
    }

    /// Store one peak per channel; extra values are ignored
    pub fn set_peaks(&self, peaks: &[f32]) {
        // Relaxed ordering is fine: meters tolerate a stale block
        for (slot, peak) in self.peak_bits.iter().zip(peaks) {
            slot.store(peak.to_bits(), Ordering::Relaxed);
        }
    }

    pub fn peak(&self, channel: usize) -> f32 {
        self.peak_bits
            .get(channel)
            .map_or(0.0, |bits| f32::from_bits(bits.load(Ordering::Relaxed)))
    }

    /// Copy of the current peaks (allocates; not for the audio callback)
    pub fn peaks(&self) -> Vec<f32> {
        self.peak_bits
            .iter()
            .map(|bits| f32::from_bits(bits.load(Ordering::Relaxed)))
            .collect()
    }

    /// Record an audio glitch from a callback
    pub fn mark_glitch(&self) {
        self.glitch_count.fetch_add(1, Ordering::Relaxed);
        self.glitch_pending.store(true, Ordering::Release);
    }

    /// Consume the pending glitch flag
    ///
    /// Returns true at most once per burst of glitches, so the engine emits a
    /// single `BufferUnderrun` event instead of one per callback.
    pub fn take_glitch(&self) -> bool {
        self.glitch_pending.swap(false, Ordering::Acquire)
    }

    pub fn glitch_count(&self) -> u64 {
        self.glitch_count.load(Ordering::Relaxed)
    }
}

/// Manages an active duplex stream pair
pub struct AudioStream {
    /// The underlying CPAL streams (kept alive to maintain audio flow)
    /// Rust pattern: `#[allow(dead_code)]` because we need to hold the stream
    /// even though we don't call methods on it directly
    #[allow(dead_code)]
    capture_stream: Stream,

    #[allow(dead_code)]
    output_stream: Stream,

    /// Shared state read by the engine thread
    pub shared: Arc<SharedState>,

    /// Configuration the streams were opened with
    pub config: EqualizerConfig,
}

impl AudioStream {
    /// Open the default input and output devices and start equalizing
    ///
    /// A fresh `FilterBank` is built for every stream, so filter history
    /// never carries over from a previous session. Gains come from `table`
    /// and keep whatever values the control side last wrote.
    pub fn open(
        config: EqualizerConfig,
        table: Arc<GainTable>,
        event_sender: Sender<Event>,
    ) -> EngineResult<Self> {
        config.validate().map_err(EngineError::ConfigError)?;

        let host = cpal::default_host();
        let capture_device = host
            .default_input_device()
            .ok_or(EngineError::NoDevice("input"))?;
        let output_device = host
            .default_output_device()
            .ok_or(EngineError::NoDevice("output"))?;

        let bank = FilterBank::with_gains(config.bank_config(), table)?;

        Self::with_devices(config, &capture_device, &output_device, bank, event_sender)
    }

    /// Start a stream pair on explicit devices with any processor
    pub fn with_devices<P: AudioProcessor + 'static>(
        config: EqualizerConfig,
        capture_device: &Device,
        output_device: &Device,
        processor: P,
        event_sender: Sender<Event>,
    ) -> EngineResult<Self> {
        config.validate().map_err(EngineError::ConfigError)?;

        let shared = Arc::new(SharedState::new(usize::from(config.channels)));

        let ring_size = config.samples_per_block() * RING_BLOCKS;
        let (producer, consumer) = RingBuffer::<f32>::new(ring_size);

        let cpal_config = CpalStreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(config.block_size),
        };

        let capture_stream = Self::build_capture_stream(
            capture_device,
            &cpal_config,
            producer,
            Arc::clone(&shared),
            event_sender.clone(),
        )?;

        let output_stream = Self::build_output_stream(
            output_device,
            &cpal_config,
            consumer,
            processor,
            Arc::clone(&shared),
            event_sender,
        )?;

        capture_stream
            .play()
            .map_err(|e| EngineError::StreamPlayError(e.to_string()))?;
        output_stream
            .play()
            .map_err(|e| EngineError::StreamPlayError(e.to_string()))?;

        Ok(Self {
            capture_stream,
            output_stream,
            shared,
            config,
        })
    }

    fn build_capture_stream(
        device: &Device,
        config: &CpalStreamConfig,
        mut producer: Producer<f32>,
        shared: Arc<SharedState>,
        event_sender: Sender<Event>,
    ) -> EngineResult<Stream> {
        let stream = device
            .build_input_stream(
                config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    // Real-time audio callback - NO allocations allowed here
                    let written = write_to_ring(&mut producer, data);
                    if written < data.len() {
                        // Output side is not keeping up
                        shared.mark_glitch();
                    }
                },
                move |err| {
                    let _ = event_sender.try_send(Event::error(err));
                },
                None, // No timeout
            )
            .map_err(|e| EngineError::StreamBuildError(e.to_string()))?;

        Ok(stream)
    }

    fn build_output_stream<P: AudioProcessor + 'static>(
        device: &Device,
        config: &CpalStreamConfig,
        mut consumer: Consumer<f32>,
        mut processor: P,
        shared: Arc<SharedState>,
        event_sender: Sender<Event>,
    ) -> EngineResult<Stream> {
        let channels = usize::from(config.channels);
        let sample_rate = config.sample_rate.0 as f32;
        let mut peaks = vec![0.0_f32; channels];

        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    // Real-time audio callback - NO allocations allowed here
                    let read = read_from_ring(&mut consumer, data);
                    if read < data.len() {
                        // Underrun - the rest is silence
                        data[read..].fill(0.0);
                        shared.mark_glitch();
                    }

                    let context = ProcessContext::new(sample_rate, channels, data.len() / channels);
                    processor.process(data, &context);

                    measure_peaks(data, &mut peaks);
                    shared.set_peaks(&peaks);
                },
                move |err| {
                    let _ = event_sender.try_send(Event::error(err));
                },
                None,
            )
            .map_err(|e| EngineError::StreamBuildError(e.to_string()))?;

        Ok(stream)
    }

    /// Get current peak levels (for meters)
    pub fn peaks(&self) -> Vec<f32> {
        self.shared.peaks()
    }
}

/// Push as many samples as fit; returns the number written
fn write_to_ring(producer: &mut Producer<f32>, data: &[f32]) -> usize {
    let len = data.len().min(producer.slots());
    let Ok(mut chunk) = producer.write_chunk_uninit(len) else {
        return 0;
    };
    let (first, second) = chunk.as_mut_slices();
    let split = first.len();
    for (slot, sample) in first.iter_mut().zip(data) {
        slot.write(*sample);
    }
    for (slot, sample) in second.iter_mut().zip(&data[split..]) {
        slot.write(*sample);
    }
    // SAFETY: every slot in both halves was initialized above
    unsafe { chunk.commit_all() };
    len
}

/// Pop as many samples as are available; returns the number read
fn read_from_ring(consumer: &mut Consumer<f32>, data: &mut [f32]) -> usize {
    let len = data.len().min(consumer.slots());
    let Ok(chunk) = consumer.read_chunk(len) else {
        return 0;
    };
    let (first, second) = chunk.as_slices();
    data[..first.len()].copy_from_slice(first);
    data[first.len()..first.len() + second.len()].copy_from_slice(second);
    chunk.commit_all();
    len
}

/// Per-channel absolute peak of an interleaved block
fn measure_peaks(data: &[f32], peaks: &mut [f32]) {
    peaks.fill(0.0);
    let channels = peaks.len();
    if channels == 0 {
        return;
    }
    for frame in data.chunks(channels) {
        for (peak, sample) in peaks.iter_mut().zip(frame) {
            *peak = peak.max(sample.abs());
        }
    }
}
