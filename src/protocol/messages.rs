//! Message types for the light controller command topic

use crate::audio::LedState;
use serde::{Deserialize, Serialize};

/// Command verb understood by the light controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Set,
    Off,
}

/// Light command payload, e.g. `{"command":"set","red":true,"yellow":false,"green":false}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedCommand {
    pub command: CommandKind,
    pub red: bool,
    pub yellow: bool,
    pub green: bool,
}

impl LedCommand {
    pub fn set(state: LedState) -> Self {
        Self {
            command: CommandKind::Set,
            red: state.red,
            yellow: state.yellow,
            green: state.green,
        }
    }

    pub fn off() -> Self {
        Self {
            command: CommandKind::Off,
            red: false,
            yellow: false,
            green: false,
        }
    }

    pub fn state(&self) -> LedState {
        LedState::new(self.red, self.yellow, self.green)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
