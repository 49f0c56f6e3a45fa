// src/types.rs
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::link::ConnectionState;
use crate::stream::{FilterSettings, Sample};

// Where samples come from
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    #[default]
    Live,
    Simulation,
}

impl ConnectionMode {
    pub fn label(self) -> &'static str {
        match self {
            ConnectionMode::Live => "LIVE",
            ConnectionMode::Simulation => "SIM",
        }
    }
}

// GUI -> engine
#[derive(Clone, Debug)]
pub enum GuiCommand {
    Connect(ConnectionMode),
    Disconnect,
    ApplyFilter(FilterSettings),
    Shutdown,
}

/// Outcome of an apply, as shown in the sync-status line.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterOutcome {
    Sent(FilterSettings),
    NotConnected,
    Rejected(String),
}

// engine -> GUI
#[derive(Clone, Debug)]
pub enum EngineMessage {
    Log(String),
    State(ConnectionState),
    PeerDevice(bool),
    Sample(Sample),
    ReconnectScheduled { attempt: u32, delay: Duration },
    Filter(FilterOutcome),
}
