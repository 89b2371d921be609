//! Console command parsing
//!
//! One command per line. Band labels may be typed with or without the space
//! before the unit, and the unit is case-insensitive ("1kHz", "1 khz").

use anyhow::{bail, Context, Result};

/// A parsed console line
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    /// `set <label> <db>`
    SetGain { label: String, gain_db: f64 },
    /// `reset`
    Reset,
    /// `start`
    Start,
    /// `stop`
    Stop,
    /// `toggle`
    Toggle,
    /// `gains`
    Gains,
    /// `status`
    Status,
    /// `bands`
    Bands,
    /// `help`
    Help,
    /// `quit` / `exit`
    Quit,
}

pub const HELP: &str = "\
commands:
  set <band> <db>   set a band's gain, e.g. `set 1 kHz 6` or `set 1kHz -3.5`
  reset             all bands to 0 dB
  start | stop      open or close the audio stream
  toggle            start if stopped, stop if running
  gains             print the current gains
  status            print stream state and configuration
  bands             list band labels
  quit              stop and exit";

/// Parse one input line; blank lines yield `None`
pub fn parse(line: &str) -> Result<Option<ConsoleCommand>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();

    let command = match verb.to_ascii_lowercase().as_str() {
        "set" => {
            let Some((gain, label)) = rest.split_last() else {
                bail!("usage: set <band> <db>");
            };
            if label.is_empty() {
                bail!("usage: set <band> <db>");
            }
            let gain_db: f64 = gain
                .parse()
                .with_context(|| format!("invalid gain '{}'", gain))?;
            ConsoleCommand::SetGain {
                label: normalize_label(&label.join(" ")),
                gain_db,
            }
        }
        "reset" => ConsoleCommand::Reset,
        "start" => ConsoleCommand::Start,
        "stop" => ConsoleCommand::Stop,
        "toggle" => ConsoleCommand::Toggle,
        "gains" => ConsoleCommand::Gains,
        "status" => ConsoleCommand::Status,
        "bands" => ConsoleCommand::Bands,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        other => bail!("unknown command '{}' (try `help`)", other),
    };

    Ok(Some(command))
}

/// Bring a typed label into display form ("1khz" -> "1 kHz")
///
/// Anything that is not `<number><Hz|kHz>` is returned trimmed but otherwise
/// untouched, so the engine reports it as an unknown band.
pub fn normalize_label(raw: &str) -> String {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let split = compact
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(compact.len());
    let (number, unit) = compact.split_at(split);

    let unit = match unit.to_ascii_lowercase().as_str() {
        "hz" => "Hz",
        "khz" => "kHz",
        _ => return raw.trim().to_string(),
    };
    if number.is_empty() {
        return raw.trim().to_string();
    }
    format!("{} {}", number, unit)
}
