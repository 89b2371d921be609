//! Message Types for Thread Communication
//!
//! Commands flow from the control side -> engine thread.
//! Events flow from the engine thread -> control side.
//!
//! Gain changes are not commands: they go straight to the shared gain table
//! so the caller gets `UnknownBand` back synchronously.

use serde::{Deserialize, Serialize};
use tenband_dsp::{Band, NUM_BANDS};

/// Commands sent to the engine thread
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Open the device stream (Idle -> Streaming)
    Start,

    /// Close the device stream (Streaming -> Idle)
    Stop,

    /// Request current state (triggers StateUpdate event)
    RequestState,

    /// Shutdown the engine thread
    Shutdown,
}

/// One band's gain, as reported to a control surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandGain {
    pub label: String,
    pub frequency: f64,
    pub gain_db: f64,
}

impl BandGain {
    /// Pair every band with its gain from a table snapshot
    pub fn from_snapshot(gains: &[f64; NUM_BANDS]) -> Vec<BandGain> {
        Band::ALL
            .iter()
            .zip(gains)
            .map(|(band, gain_db)| BandGain {
                label: band.label().to_string(),
                frequency: band.frequency(),
                gain_db: *gain_db,
            })
            .collect()
    }
}

/// Events sent from the engine thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    /// Stream started successfully
    Started,

    /// Stream stopped
    Stopped,

    /// Error occurred
    Error { message: String },

    /// Output peak levels (for meters), one per channel in range 0.0 - 1.0
    LevelUpdate { peaks: Vec<f32> },

    /// Current state snapshot
    StateUpdate { is_running: bool, gains: Vec<BandGain> },

    /// Buffer underrun or overflow detected (audio glitch)
    BufferUnderrun,
}

impl Event {
    /// Create an error event from any error type
    pub fn error<E: std::fmt::Display>(err: E) -> Self {
        Event::Error {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = Event::LevelUpdate {
            peaks: vec![0.5, 0.7],
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("LevelUpdate"));

        let deserialized: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
    }

    #[test]
    fn test_error_event() {
        let event = Event::error("Test error message");
        if let Event::Error { message } = event {
            assert_eq!(message, "Test error message");
        } else {
            panic!("Should be Error variant");
        }
    }

    #[test]
    fn test_state_update_serialization() {
        let mut gains = [0.0; NUM_BANDS];
        gains[Band::Khz1.index()] = 6.0;

        let event = Event::StateUpdate {
            is_running: true,
            gains: BandGain::from_snapshot(&gains),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"1 kHz\""));

        let deserialized: Event = serde_json::from_str(&json).unwrap();
        if let Event::StateUpdate { is_running, gains } = deserialized {
            assert!(is_running);
            assert_eq!(gains.len(), NUM_BANDS);
            assert_eq!(gains[4].label, "1 kHz");
            assert_eq!(gains[4].gain_db, 6.0);
            assert_eq!(gains[0].frequency, 60.0);
        } else {
            panic!("Wrong variant");
        }
    }

    #[test]
    fn test_unit_variant_serialization() {
        let json = serde_json::to_string(&Event::Started).unwrap();
        assert_eq!(json, r#"{"type":"Started"}"#);
    }
}
