//! Audio Engine - Main Entry Point
//!
//! The EqualizerEngine manages the lifecycle of the device stream and
//! coordinates communication between the control side and audio threads.
//!
//! # Architecture
//!
//! ```text
//! control thread ──Command──▶ tenband-audio thread ──owns──▶ AudioStream
//!       │                            │                          │
//!       │◀──────────Event────────────┘                          │
//!       │                                                       │
//!       └──BankControl──▶ GainTable (atomics) ◀──per block── FilterBank
//! ```
//!
//! Gains never travel through the command channel. They are written to the
//! shared table and picked up by the output callback at the next block.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::EqualizerConfig;
use crate::error::{EngineError, EngineResult};
use crate::message::{BandGain, Command, Event};
use crate::stream::AudioStream;
use tenband_dsp::{Band, BankControl, FilterBank, GainTable, NUM_BANDS};

/// Meter refresh period (~60fps)
const LEVEL_INTERVAL: Duration = Duration::from_millis(16);

/// Peaks below this are not worth a meter update
const LEVEL_FLOOR: f32 = 0.001;

/// Events queued for a host that has not polled yet
const EVENT_CAPACITY: usize = 256;

/// Host-side stream lifecycle
///
/// `Starting` and `Stopping` cover the time between a request and the
/// audio thread acting on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum StreamState {
    /// No device stream; the bank is not being driven
    Idle = 0,
    /// Start requested, stream not open yet
    Starting = 1,
    /// The output callback is running the bank on a real-time cadence
    Streaming = 2,
    /// Stop requested, stream not closed yet
    Stopping = 3,
}

impl StreamState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => StreamState::Starting,
            2 => StreamState::Streaming,
            3 => StreamState::Stopping,
            _ => StreamState::Idle,
        }
    }
}

/// Lifecycle shared by the control side and the audio thread
///
/// Requests move the state from the control side; completions from the audio
/// thread only apply if no newer request has replaced the one they answer.
#[derive(Debug)]
struct SharedStreamState(AtomicU8);

impl SharedStreamState {
    fn new() -> Self {
        Self(AtomicU8::new(StreamState::Idle as u8))
    }

    fn load(&self) -> StreamState {
        StreamState::from_u8(self.0.load(Ordering::SeqCst))
    }

    fn transition(&self, from: StreamState, to: StreamState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Idle or Stopping -> Starting; false if a start is already pending or done
    fn request_start(&self) -> bool {
        self.transition(StreamState::Idle, StreamState::Starting)
            || self.transition(StreamState::Stopping, StreamState::Starting)
    }

    /// Starting or Streaming -> Stopping; false if nothing is open or opening
    fn request_stop(&self) -> bool {
        self.transition(StreamState::Streaming, StreamState::Stopping)
            || self.transition(StreamState::Starting, StreamState::Stopping)
    }

    fn opened(&self) {
        self.transition(StreamState::Starting, StreamState::Streaming);
    }

    fn open_failed(&self) {
        self.transition(StreamState::Starting, StreamState::Idle);
    }

    fn closed(&self) {
        self.transition(StreamState::Stopping, StreamState::Idle);
    }

    fn reset(&self) {
        self.0.store(StreamState::Idle as u8, Ordering::SeqCst);
    }
}

/// Bounded event queue with two delivery classes
///
/// Meter and glitch events are dropped when the host falls behind. Lifecycle
/// events evict the oldest queued event instead, so the engine thread never
/// blocks and the queue never grows past its capacity.
struct EventPublisher {
    sender: Sender<Event>,
    /// Receiver clone used only to evict
    backlog: Receiver<Event>,
}

impl EventPublisher {
    fn new(sender: Sender<Event>, backlog: Receiver<Event>) -> Self {
        Self { sender, backlog }
    }

    fn sender(&self) -> Sender<Event> {
        self.sender.clone()
    }

    /// Send if there is room
    fn offer(&self, event: Event) {
        let _ = self.sender.try_send(event);
    }

    /// Send, evicting the oldest queued events if needed
    fn publish(&self, mut event: Event) {
        loop {
            match self.sender.try_send(event) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => return,
                Err(TrySendError::Full(rejected)) => {
                    let _ = self.backlog.try_recv();
                    event = rejected;
                }
            }
        }
    }
}

/// The main equalizer controller
///
/// This struct lives on the control thread and communicates with the
/// audio thread via channels.
pub struct EqualizerEngine {
    /// Channel for sending commands to audio thread
    command_sender: Sender<Command>,

    /// Channel for receiving events from audio thread
    event_receiver: Receiver<Event>,

    /// Handle to the audio thread
    audio_thread: Option<JoinHandle<()>>,

    /// Flag to signal shutdown
    shutdown_flag: Arc<AtomicBool>,

    /// Lock-free gain writes, shared with every stream's filter bank
    control: BankControl,

    /// Session configuration
    config: EqualizerConfig,

    /// Stream lifecycle, shared with the audio thread
    state: Arc<SharedStreamState>,
}

impl EqualizerEngine {
    /// Create a new engine with default configuration
    pub fn new() -> EngineResult<Self> {
        Self::with_config(EqualizerConfig::default())
    }

    /// Create a new engine with custom configuration
    ///
    /// Fails fast: the configuration is validated and a filter bank is built
    /// here, so a band above Nyquist is reported now rather than at `start`.
    pub fn with_config(config: EqualizerConfig) -> EngineResult<Self> {
        config.validate().map_err(EngineError::ConfigError)?;
        let validated = FilterBank::new(config.bank_config())?;
        let control = validated.control();

        let (command_sender, command_receiver) = bounded::<Command>(32);
        let (event_sender, event_receiver) = bounded::<Event>(EVENT_CAPACITY);
        let events = EventPublisher::new(event_sender, event_receiver.clone());

        let shutdown_flag = Arc::new(AtomicBool::new(false));
        let state = Arc::new(SharedStreamState::new());

        // Clone for audio thread
        let shutdown_clone = Arc::clone(&shutdown_flag);
        let state_clone = Arc::clone(&state);
        let table = Arc::clone(control.table());
        let config_clone = config.clone();

        let audio_thread = thread::Builder::new()
            .name("tenband-audio".into())
            .spawn(move || {
                Self::audio_thread_main(
                    command_receiver,
                    events,
                    shutdown_clone,
                    state_clone,
                    table,
                    config_clone,
                );
            })
            .map_err(|e| EngineError::StreamBuildError(e.to_string()))?;

        info!(
            "Equalizer ready: {} Hz, {} channels, block {} ({:.1} ms), Q {}",
            config.sample_rate,
            config.channels,
            config.block_size,
            config.latency_ms(),
            config.q_factor
        );

        Ok(Self {
            command_sender,
            event_receiver,
            audio_thread: Some(audio_thread),
            shutdown_flag,
            control,
            config,
            state,
        })
    }

    /// Open the device stream (Idle -> Starting -> Streaming)
    ///
    /// The stream opens asynchronously; watch for `Event::Started` or
    /// `Event::Error`. Fails with `AlreadyRunning` while a stream is open or
    /// a start is pending.
    pub fn start(&self) -> EngineResult<()> {
        if !self.state.request_start() {
            return Err(EngineError::AlreadyRunning);
        }
        self.send_command(Command::Start)
    }

    /// Close the device stream (Streaming -> Stopping -> Idle)
    ///
    /// Also cancels a start that is still pending. Fails with `NotRunning`
    /// when nothing is open or opening.
    pub fn stop(&self) -> EngineResult<()> {
        if !self.state.request_stop() {
            return Err(EngineError::NotRunning);
        }
        self.send_command(Command::Stop)
    }

    /// Stop if a stream is open or opening, start otherwise
    pub fn toggle(&self) -> EngineResult<()> {
        match self.state() {
            StreamState::Starting | StreamState::Streaming => self.stop(),
            StreamState::Idle | StreamState::Stopping => self.start(),
        }
    }

    /// Set a band's gain by display label ("1 kHz")
    ///
    /// Takes effect at the next audio block, streaming or not.
    pub fn set_gain(&self, label: &str, gain_db: f64) -> EngineResult<()> {
        self.control.set_gain(label, gain_db)?;
        debug!("Set {} gain to {}dB", label, gain_db);
        Ok(())
    }

    /// Set a band's gain
    pub fn set_band_gain(&self, band: Band, gain_db: f64) -> EngineResult<()> {
        self.control.set_band_gain(band, gain_db)?;
        debug!("Set {} gain to {}dB", band, gain_db);
        Ok(())
    }

    /// Return every band to 0 dB and clear filter history
    pub fn reset_all(&self) {
        self.control.reset_all();
        debug!("Reset all bands");
    }

    /// Current gains in cascade order
    pub fn gains(&self) -> [f64; NUM_BANDS] {
        self.control.gains()
    }

    /// Current gains paired with their bands
    pub fn band_gains(&self) -> Vec<BandGain> {
        BandGain::from_snapshot(&self.gains())
    }

    /// Lock-free gain handle for other control threads
    pub fn control(&self) -> BankControl {
        self.control.clone()
    }

    /// Request state update
    pub fn request_state(&self) -> EngineResult<()> {
        self.send_command(Command::RequestState)
    }

    /// Check if a device stream is currently open
    pub fn is_running(&self) -> bool {
        self.state() == StreamState::Streaming
    }

    pub fn state(&self) -> StreamState {
        self.state.load()
    }

    /// Get next event (non-blocking)
    pub fn poll_event(&self) -> Option<Event> {
        self.event_receiver.try_recv().ok()
    }

    /// Get next event (blocking)
    pub fn wait_event(&self) -> Option<Event> {
        self.event_receiver.recv().ok()
    }

    /// Get next event, giving up after `timeout`
    pub fn wait_event_timeout(&self, timeout: Duration) -> Option<Event> {
        self.event_receiver.recv_timeout(timeout).ok()
    }

    /// Get current configuration
    pub fn config(&self) -> &EqualizerConfig {
        &self.config
    }

    /// Send command to audio thread
    fn send_command(&self, command: Command) -> EngineResult<()> {
        self.command_sender
            .send(command)
            .map_err(|_| EngineError::ChannelSendError)
    }

    /// Audio thread main loop
    fn audio_thread_main(
        command_receiver: Receiver<Command>,
        events: EventPublisher,
        shutdown_flag: Arc<AtomicBool>,
        state: Arc<SharedStreamState>,
        table: Arc<GainTable>,
        config: EqualizerConfig,
    ) {
        info!("Audio thread started");

        let mut stream: Option<AudioStream> = None;

        while !shutdown_flag.load(Ordering::SeqCst) {
            // Timeout doubles as the meter refresh tick
            match command_receiver.recv_timeout(LEVEL_INTERVAL) {
                Ok(command) => match command {
                    Command::Start => {
                        if stream.is_some() {
                            warn!("Engine already running");
                            events.publish(Event::error(EngineError::AlreadyRunning));
                            continue;
                        }

                        info!("Starting audio stream");
                        match AudioStream::open(config.clone(), Arc::clone(&table), events.sender()) {
                            Ok(s) => {
                                stream = Some(s);
                                state.opened();
                                info!("Audio stream started");
                                events.publish(Event::Started);
                            }
                            Err(e) => {
                                state.open_failed();
                                error!("Failed to start stream: {}", e);
                                events.publish(Event::error(e));
                            }
                        }
                    }

                    Command::Stop => {
                        let Some(active) = stream.take() else {
                            // The start this cancels never opened a stream
                            debug!("Engine not running");
                            state.closed();
                            continue;
                        };

                        info!("Stopping audio stream");
                        let glitches = active.shared.glitch_count();
                        drop(active);
                        if glitches > 0 {
                            warn!("Stream closed after {} buffer underruns/overflows", glitches);
                        }
                        state.closed();
                        events.publish(Event::Stopped);
                    }

                    Command::RequestState => {
                        events.publish(Event::StateUpdate {
                            is_running: stream.is_some(),
                            gains: BandGain::from_snapshot(&table.snapshot()),
                        });
                    }

                    Command::Shutdown => {
                        info!("Shutdown command received");
                        shutdown_flag.store(true, Ordering::SeqCst);
                    }
                },
                Err(RecvTimeoutError::Timeout) => {
                    // Normal timeout, publish meters and glitches
                    if let Some(ref active) = stream {
                        let peaks = active.peaks();
                        if peaks.iter().any(|p| *p > LEVEL_FLOOR) {
                            events.offer(Event::LevelUpdate { peaks });
                        }
                        if active.shared.take_glitch() {
                            events.offer(Event::BufferUnderrun);
                        }
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("Command channel disconnected");
                    break;
                }
            }
        }

        // Cleanup
        if stream.take().is_some() {
            events.publish(Event::Stopped);
        }
        state.reset();
        info!("Audio thread shutting down");
    }
}

impl Drop for EqualizerEngine {
    fn drop(&mut self) {
        // Signal shutdown
        self.shutdown_flag.store(true, Ordering::SeqCst);

        // Send shutdown command
        let _ = self.command_sender.send(Command::Shutdown);

        // Wait for audio thread to finish
        if let Some(handle) = self.audio_thread.take() {
            let _ = handle.join();
        }
    }
}
