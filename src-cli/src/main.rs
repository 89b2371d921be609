//! Tenband console controller
//!
//! Usage:
//!   tenband [--sample-rate N] [--block-size N] [--channels N] [--q Q] [--start]
//!
//! Then type commands on stdin (`help` lists them). Logging follows
//! `RUST_LOG`, defaulting to `tenband=info`.

mod console;

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::EnvFilter;

use console::ConsoleCommand;
use tenband_core::{EqualizerConfig, EqualizerEngine, Event};
use tenband_dsp::Band;

#[derive(Parser)]
#[command(name = "tenband", about = "Real-time 10-band peaking equalizer")]
struct Cli {
    /// Sample rate in Hz
    #[arg(long, default_value_t = 44100)]
    sample_rate: u32,

    /// Frames per audio block
    #[arg(long, default_value_t = 2048)]
    block_size: u32,

    /// Number of audio channels
    #[arg(long, default_value_t = 2)]
    channels: u16,

    /// Q factor shared by every band
    #[arg(long = "q", default_value_t = 1.0)]
    q_factor: f64,

    /// Open the audio stream immediately
    #[arg(short, long)]
    start: bool,
}

impl Cli {
    fn config(&self) -> EqualizerConfig {
        EqualizerConfig {
            sample_rate: self.sample_rate,
            block_size: self.block_size,
            channels: self.channels,
            q_factor: self.q_factor,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing for logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tenband=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Tenband");

    let engine = EqualizerEngine::with_config(cli.config()).context("failed to create equalizer")?;
    if cli.start {
        engine.start().context("failed to start audio stream")?;
    }

    let done = AtomicBool::new(false);
    thread::scope(|scope| {
        scope.spawn(|| report_events(&engine, &done));
        let result = run_console(&engine);
        done.store(true, Ordering::SeqCst);
        result
    })?;

    // Dropping the engine stops the stream and joins the audio thread
    drop(engine);
    info!("Tenband stopped");
    Ok(())
}

/// Log engine events until `done` is set
fn report_events(engine: &EqualizerEngine, done: &AtomicBool) {
    while !done.load(Ordering::SeqCst) {
        let Some(event) = engine.wait_event_timeout(Duration::from_millis(100)) else {
            continue;
        };
        match event {
            Event::Started => info!("Audio stream started"),
            Event::Stopped => info!("Audio stream stopped"),
            Event::Error { message } => error!("{}", message),
            Event::BufferUnderrun => warn!("Buffer underrun (audio glitch)"),
            Event::LevelUpdate { peaks } => trace!("Peaks: {:?}", peaks),
            Event::StateUpdate { is_running, gains } => {
                let state = if is_running { "running" } else { "stopped" };
                let active = gains.iter().filter(|g| g.gain_db != 0.0).count();
                debug!("State: {}, {} bands adjusted", state, active);
            }
        }
    }
}

/// Read commands from stdin until `quit` or end of input
fn run_console(engine: &EqualizerEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    println!("{}", console::HELP);
    prompt(&mut stdout)?;

    for line in stdin.lock().lines() {
        let line = line.context("failed to read stdin")?;
        match console::parse(&line) {
            Ok(Some(ConsoleCommand::Quit)) => break,
            Ok(Some(command)) => {
                if let Err(e) = execute(engine, command) {
                    println!("error: {}", e);
                }
            }
            Ok(None) => {}
            Err(e) => println!("error: {:#}", e),
        }
        prompt(&mut stdout)?;
    }

    Ok(())
}

fn prompt(stdout: &mut io::Stdout) -> Result<()> {
    print!("> ");
    stdout.flush().context("failed to flush stdout")
}

fn execute(engine: &EqualizerEngine, command: ConsoleCommand) -> Result<()> {
    match command {
        ConsoleCommand::SetGain { label, gain_db } => {
            engine.set_gain(&label, gain_db)?;
            println!("{} = {:+.1} dB", label, gain_db);
        }
        ConsoleCommand::Reset => {
            engine.reset_all();
            println!("all bands reset to 0 dB");
        }
        ConsoleCommand::Start => engine.start()?,
        ConsoleCommand::Stop => engine.stop()?,
        ConsoleCommand::Toggle => engine.toggle()?,
        ConsoleCommand::Gains => {
            for band in engine.band_gains() {
                println!("{:>7}  {:+6.1} dB", band.label, band.gain_db);
            }
        }
        ConsoleCommand::Status => {
            let config = engine.config();
            println!(
                "{:?}: {} Hz, {} ch, block {} ({:.1} ms), Q {}",
                engine.state(),
                config.sample_rate,
                config.channels,
                config.block_size,
                config.latency_ms(),
                config.q_factor
            );
            engine.request_state()?;
        }
        ConsoleCommand::Bands => {
            let labels: Vec<&str> = Band::ALL.iter().map(|band| band.label()).collect();
            println!("{}", labels.join(", "));
        }
        ConsoleCommand::Help => println!("{}", console::HELP),
        ConsoleCommand::Quit => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["tenband"]).unwrap();
        assert_eq!(cli.config(), EqualizerConfig::default());
        assert!(!cli.start);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::try_parse_from([
            "tenband",
            "--sample-rate",
            "48000",
            "--block-size",
            "512",
            "--channels",
            "1",
            "--q",
            "0.7",
            "--start",
        ])
        .unwrap();

        let config = cli.config();
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.block_size, 512);
        assert_eq!(config.channels, 1);
        assert_eq!(config.q_factor, 0.7);
        assert!(cli.start);
    }

    #[test]
    fn test_execute_without_hardware() {
        let engine = EqualizerEngine::new().unwrap();

        execute(
            &engine,
            ConsoleCommand::SetGain {
                label: "1 kHz".into(),
                gain_db: 6.0,
            },
        )
        .unwrap();
        assert_eq!(engine.gains()[Band::Khz1.index()], 6.0);

        assert!(execute(
            &engine,
            ConsoleCommand::SetGain {
                label: "2 kHz".into(),
                gain_db: 6.0,
            },
        )
        .is_err());

        execute(&engine, ConsoleCommand::Reset).unwrap();
        assert_eq!(engine.gains()[Band::Khz1.index()], 0.0);

        // Stopping an idle engine is reported, not fatal
        assert!(execute(&engine, ConsoleCommand::Stop).is_err());
    }
}
