//! Valve manifold protocol.
//!
//! Each flow channel has one solenoid valve driven either `high` (pressure
//! applied, channel closed) or `low` (suction or static, channel open).
//! The controller only ever issues the named command sets below.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SortError};
use crate::record::Direction;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowChannel {
    /// Specimen input.
    Push,
    /// Waste line that carries specimens through the imaging window.
    Sewer,
    Up,
    Straight,
    Down,
    /// Pressure relief.
    Relief,
}

impl FlowChannel {
    pub const ALL: [FlowChannel; 6] = [
        Self::Push,
        Self::Sewer,
        Self::Up,
        Self::Straight,
        Self::Down,
        Self::Relief,
    ];

    pub fn outlet(direction: Direction) -> Self {
        match direction {
            Direction::Up => Self::Up,
            Direction::Straight => Self::Straight,
            Direction::Down => Self::Down,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValveState {
    High,
    Low,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValveCommand {
    pub channel: FlowChannel,
    pub state: ValveState,
}

impl ValveCommand {
    pub const fn high(channel: FlowChannel) -> Self {
        Self {
            channel,
            state: ValveState::High,
        }
    }

    pub const fn low(channel: FlowChannel) -> Self {
        Self {
            channel,
            state: ValveState::Low,
        }
    }
}

/// Every channel pressurised. The state the rig is left in on shutdown.
pub fn safe() -> Vec<ValveCommand> {
    FlowChannel::ALL.iter().map(|&c| ValveCommand::high(c)).collect()
}

/// Open the input and waste lines so the next specimen flows into view.
pub fn start_load() -> Vec<ValveCommand> {
    vec![
        ValveCommand::low(FlowChannel::Push),
        ValveCommand::low(FlowChannel::Sewer),
        ValveCommand::high(FlowChannel::Up),
        ValveCommand::high(FlowChannel::Straight),
        ValveCommand::high(FlowChannel::Down),
        ValveCommand::low(FlowChannel::Relief),
    ]
}

/// Pressurise the relief line so a queued specimen is driven into the
/// viewing window. Every other channel keeps its loading state.
pub fn push_queue() -> Vec<ValveCommand> {
    vec![ValveCommand::high(FlowChannel::Relief)]
}

/// Close the input behind a detected specimen so it can settle.
pub fn hold() -> Vec<ValveCommand> {
    vec![
        ValveCommand::high(FlowChannel::Push),
        ValveCommand::low(FlowChannel::Relief),
    ]
}

/// Push the specimen out through the outlet for `direction`.
pub fn sort(direction: Direction) -> Vec<ValveCommand> {
    let open = FlowChannel::outlet(direction);
    let mut commands = vec![ValveCommand::high(FlowChannel::Sewer)];
    for outlet in [FlowChannel::Up, FlowChannel::Straight, FlowChannel::Down] {
        commands.push(if outlet == open {
            ValveCommand::low(outlet)
        } else {
            ValveCommand::high(outlet)
        });
    }
    commands.push(ValveCommand::low(FlowChannel::Relief));
    commands
}

/// First half of a flutter pulse: briefly close the open outlet. The second
/// half is the `sort` command set for the same direction.
pub fn flutter(direction: Direction) -> Vec<ValveCommand> {
    vec![ValveCommand::high(FlowChannel::outlet(direction))]
}

/// Bubble clearing, blow half: pressure on the waste, input and relief lines
/// with every outlet open.
pub fn bubble_blow() -> Vec<ValveCommand> {
    vec![
        ValveCommand::high(FlowChannel::Sewer),
        ValveCommand::low(FlowChannel::Straight),
        ValveCommand::low(FlowChannel::Up),
        ValveCommand::low(FlowChannel::Down),
        ValveCommand::high(FlowChannel::Push),
        ValveCommand::high(FlowChannel::Relief),
    ]
}

/// Bubble clearing, suck half: the loading state, drawing back through the
/// waste line.
pub fn bubble_suck() -> Vec<ValveCommand> {
    vec![
        ValveCommand::low(FlowChannel::Sewer),
        ValveCommand::low(FlowChannel::Push),
        ValveCommand::high(FlowChannel::Straight),
        ValveCommand::high(FlowChannel::Up),
        ValveCommand::high(FlowChannel::Down),
        ValveCommand::low(FlowChannel::Relief),
    ]
}

/// Push water down every line at once to flush debris from the tubing.
pub fn clear_tubes() -> Vec<ValveCommand> {
    vec![
        ValveCommand::high(FlowChannel::Sewer),
        ValveCommand::high(FlowChannel::Straight),
        ValveCommand::high(FlowChannel::Up),
        ValveCommand::high(FlowChannel::Down),
        ValveCommand::high(FlowChannel::Push),
        ValveCommand::high(FlowChannel::Relief),
    ]
}

/// Flow channel to controller pin mapping for the line protocol.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValveMap {
    #[serde(default = "default_push")]
    pub push: String,
    #[serde(default = "default_sewer")]
    pub sewer: String,
    #[serde(default = "default_up")]
    pub up: String,
    #[serde(default = "default_straight")]
    pub straight: String,
    #[serde(default = "default_down")]
    pub down: String,
    #[serde(default = "default_relief")]
    pub relief: String,
}

fn default_push() -> String {
    "D6".into()
}
fn default_sewer() -> String {
    "D7".into()
}
fn default_up() -> String {
    "D3".into()
}
fn default_straight() -> String {
    "D4".into()
}
fn default_down() -> String {
    "D5".into()
}
fn default_relief() -> String {
    "D2".into()
}

impl Default for ValveMap {
    fn default() -> Self {
        Self {
            push: default_push(),
            sewer: default_sewer(),
            up: default_up(),
            straight: default_straight(),
            down: default_down(),
            relief: default_relief(),
        }
    }
}

impl ValveMap {
    pub fn pin(&self, channel: FlowChannel) -> &str {
        match channel {
            FlowChannel::Push => &self.push,
            FlowChannel::Sewer => &self.sewer,
            FlowChannel::Up => &self.up,
            FlowChannel::Straight => &self.straight,
            FlowChannel::Down => &self.down,
            FlowChannel::Relief => &self.relief,
        }
    }

    /// Render a command set as space-separated `sh <pin>` / `sl <pin>` tokens.
    pub fn render(&self, commands: &[ValveCommand]) -> String {
        commands
            .iter()
            .map(|cmd| {
                let op = match cmd.state {
                    ValveState::High => "sh",
                    ValveState::Low => "sl",
                };
                format!("{op} {}", self.pin(cmd.channel))
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let pins: Vec<&str> = FlowChannel::ALL.iter().map(|&c| self.pin(c)).collect();
        for (i, pin) in pins.iter().enumerate() {
            if pin.trim().is_empty() || pin.contains(char::is_whitespace) {
                return Err(SortError::InvalidConfig(format!(
                    "valve pin for {:?} must be a single non-empty token",
                    FlowChannel::ALL[i]
                )));
            }
            if pins[..i].contains(pin) {
                return Err(SortError::InvalidConfig(format!(
                    "valve pin {pin} is assigned to more than one channel"
                )));
            }
        }
        Ok(())
    }
}
