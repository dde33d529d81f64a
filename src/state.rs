//! State management - authoritative mixer state per device
//!
//! The [`StateManager`] is the only writer of channel fields. It orders changes
//! with sequence numbers from a shared [`SequenceClock`] and uses an
//! [`EchoShadow`] so the console's echo of our own commands is not broadcast
//! back to clients as a new change.

mod manager;
mod sequence;
mod shadow;

pub use manager::{Applied, StateManager};
pub use sequence::SequenceClock;
pub use shadow::{EchoShadow, DEFAULT_ECHO_WINDOW_MS};
