//! Echo shadow: what we last sent to the console, and when
//!
//! Most consoles report every value they receive straight back. A hardware
//! change that equals a value we sent within the echo window is that echo,
//! not a new event.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::trace;

use crate::types::{ChannelId, ParamValue, Parameter};

/// Default echo-suppression window
pub const DEFAULT_ECHO_WINDOW_MS: u64 = 250;

#[derive(Debug, Clone)]
struct ShadowEntry {
    value: ParamValue,
    sent_at: Instant,
}

#[derive(Debug)]
pub struct EchoShadow {
    window: Duration,
    entries: HashMap<(ChannelId, Parameter), ShadowEntry>,
}

impl EchoShadow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: HashMap::new(),
        }
    }

    /// Remember a value about to be sent; replaces any older expectation
    pub fn record(&mut self, channel: ChannelId, parameter: Parameter, value: ParamValue, now: Instant) {
        self.entries.insert((channel, parameter), ShadowEntry { value, sent_at: now });
    }

    /// Check a hardware value against the shadow
    ///
    /// Returns true if it is the echo of a recent send. The entry is consumed
    /// either way: a matching echo confirms it, a different value supersedes it.
    pub fn confirm(&mut self, channel: ChannelId, parameter: Parameter, value: &ParamValue, now: Instant) -> bool {
        let Some(entry) = self.entries.remove(&(channel, parameter)) else {
            return false;
        };
        let elapsed = now.saturating_duration_since(entry.sent_at);
        let is_echo = elapsed <= self.window && entry.value.matches(value);
        trace!(
            "Echo check {}.{}: sent {} got {} after {:?} -> {}",
            channel,
            parameter,
            entry.value,
            value,
            elapsed,
            if is_echo { "echo" } else { "new" }
        );
        is_echo
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for EchoShadow {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_ECHO_WINDOW_MS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_value_within_window_is_echo() {
        let mut shadow = EchoShadow::default();
        let t0 = Instant::now();
        shadow.record(ChannelId::input(1), Parameter::Fader, ParamValue::Level(0.5), t0);
        assert!(shadow.confirm(
            ChannelId::input(1),
            Parameter::Fader,
            &ParamValue::Level(0.5),
            t0 + Duration::from_millis(20)
        ));
        // Consumed: a second identical report is a real change
        assert!(!shadow.confirm(ChannelId::input(1), Parameter::Fader, &ParamValue::Level(0.5), t0));
    }

    #[test]
    fn test_expired_or_different_value_is_not_echo() {
        let mut shadow = EchoShadow::new(Duration::from_millis(100));
        let t0 = Instant::now();
        shadow.record(ChannelId::MAIN, Parameter::Mute, ParamValue::Toggle(true), t0);
        assert!(!shadow.confirm(
            ChannelId::MAIN,
            Parameter::Mute,
            &ParamValue::Toggle(true),
            t0 + Duration::from_millis(150)
        ));

        shadow.record(ChannelId::MAIN, Parameter::Pan, ParamValue::Level(0.0), t0);
        assert!(!shadow.confirm(ChannelId::MAIN, Parameter::Pan, &ParamValue::Level(0.25), t0));
    }

    #[test]
    fn test_entries_are_per_parameter() {
        let mut shadow = EchoShadow::default();
        let t0 = Instant::now();
        shadow.record(ChannelId::aux(2), Parameter::Fader, ParamValue::Level(0.7), t0);
        assert!(!shadow.confirm(ChannelId::aux(2), Parameter::Pan, &ParamValue::Level(0.7), t0));
        assert!(shadow.confirm(ChannelId::aux(2), Parameter::Fader, &ParamValue::Level(0.7), t0));
    }
}
