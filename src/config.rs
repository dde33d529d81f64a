//! Configuration management for Mixer GW
//!
//! Loads and saves the YAML configuration file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

use crate::boards::BoardOptions;
use crate::events::DEFAULT_EVENT_QUEUE_CAPACITY;
use crate::midi::nrpn::DEFAULT_NRPN_TIMEOUT_MS;
use crate::session::SessionOptions;
use crate::state::DEFAULT_ECHO_WINDOW_MS;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    pub device: DeviceConfig,
    #[serde(default)]
    pub timing: TimingConfig,
}

/// Which console to drive and how to reach it
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// Registry identifier: xair-midi, xair-osc, qu24, gld80, command8
    pub board: String,
    /// MIDI port name (or "out|in") or OSC host:port
    #[serde(default)]
    pub connection: String,
    /// Base MIDI channel, 1-16 as printed on the console
    #[serde(default = "default_midi_channel")]
    pub midi_channel: u8,
    #[serde(default = "default_client_name")]
    pub client_name: String,
}

/// Reconciliation and transport timing
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TimingConfig {
    #[serde(default = "default_echo_window_ms")]
    pub echo_window_ms: u64,
    #[serde(default = "default_nrpn_timeout_ms")]
    pub nrpn_timeout_ms: u64,
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,
}

fn default_midi_channel() -> u8 {
    1
}

fn default_client_name() -> String {
    "Mixer-GW".to_string()
}

fn default_echo_window_ms() -> u64 {
    DEFAULT_ECHO_WINDOW_MS
}

fn default_nrpn_timeout_ms() -> u64 {
    DEFAULT_NRPN_TIMEOUT_MS
}

fn default_event_queue_capacity() -> usize {
    DEFAULT_EVENT_QUEUE_CAPACITY
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            board: "xair-midi".to_string(),
            connection: String::new(),
            midi_channel: default_midi_channel(),
            client_name: default_client_name(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            echo_window_ms: default_echo_window_ms(),
            nrpn_timeout_ms: default_nrpn_timeout_ms(),
            event_queue_capacity: default_event_queue_capacity(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.device.board.trim().is_empty() {
            anyhow::bail!("device.board cannot be empty");
        }
        if !(1..=16).contains(&self.device.midi_channel) {
            anyhow::bail!("device.midi_channel must be 1-16, got {}", self.device.midi_channel);
        }
        if self.timing.echo_window_ms == 0 {
            anyhow::bail!("timing.echo_window_ms must be positive");
        }
        if self.timing.nrpn_timeout_ms == 0 {
            anyhow::bail!("timing.nrpn_timeout_ms must be positive");
        }
        if self.timing.event_queue_capacity == 0 {
            anyhow::bail!("timing.event_queue_capacity must be positive");
        }
        Ok(())
    }

    /// Session tunables derived from this configuration
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            board: BoardOptions {
                midi_channel: self.device.midi_channel.saturating_sub(1),
                nrpn_timeout: Duration::from_millis(self.timing.nrpn_timeout_ms),
                client_name: self.device.client_name.clone(),
            },
            echo_window: Duration::from_millis(self.timing.echo_window_ms),
            queue_capacity: self.timing.event_queue_capacity,
        }
    }
}
