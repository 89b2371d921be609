//! Tenband Core - Audio Engine
//!
//! This crate hosts the equalizer from `tenband_dsp` on real audio devices:
//! - Default input/output stream management (via CPAL)
//! - A control thread that opens and closes the stream on command
//! - Lock-free gain updates and metering between control and audio threads
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Control Thread                         │
//! │   (CLI) ──commands──▶ Engine ◀──events── (CLI)              │
//! │     └──────set_gain──▶ GainTable (atomics)                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ crossbeam-channel
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Audio Callbacks                        │
//! │   Capture ──rtrb──▶ FilterBank ──▶ Peaks ──▶ Output         │
//! │              (Zero allocation in this path)                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod engine;
mod error;
mod message;
mod stream;

pub use config::EqualizerConfig;
pub use engine::{EqualizerEngine, StreamState};
pub use error::{EngineError, EngineResult};
pub use message::{BandGain, Command, Event};
pub use stream::{AudioStream, SharedState};

// Re-export DSP types for convenience
pub use tenband_dsp::{
    AudioProcessor, Band, BankConfig, BankControl, DspError, FilterBank, GainTable,
    ProcessContext, EQ_BANDS, NUM_BANDS,
};
