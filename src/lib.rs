//! Mixer GW - keeps mixing-console state in sync between hardware and clients
//!
//! Commands enter through a [`session::Session`], are applied optimistically to
//! the [`state::StateManager`] and forwarded to a board plugin, which
//! translates them to MIDI or OSC. Hardware reports travel back through the
//! board's receive loop and event queue, are reconciled against the state and
//! delivered to subscribers.

pub mod boards;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod midi;
pub mod protocol;
pub mod session;
pub mod state;
pub mod translate;
pub mod types;

pub use error::{MixerError, Result};
pub use session::{Session, SessionOptions};
