//! Authoritative mixer state for one device

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

use super::shadow::EchoShadow;
use crate::error::{MixerError, Result};
use crate::types::{
    Channel, ChannelId, ConnectionStatus, DeviceCapabilities, DeviceInfo, MeterUpdate, MixerState, ParamValue,
    Parameter, ParameterChange, Source, COLOR_COUNT, MAX_NAME_LEN,
};

/// Outcome of a successful [`StateManager::apply_change`]
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    /// Channel after the change
    pub channel: Channel,
    /// False when the change was a hardware echo of our own command
    pub broadcast: bool,
}

struct Inner {
    state: Option<MixerState>,
    last_applied: HashMap<(ChannelId, Parameter), u64>,
    shadow: EchoShadow,
}

/// Single writer of channel state, reconciling client and hardware changes
pub struct StateManager {
    inner: Mutex<Inner>,
    meters: Mutex<HashMap<ChannelId, f64>>,
}

fn wrong_shape(parameter: Parameter, value: &ParamValue) -> MixerError {
    MixerError::Translation(format!("{} cannot be set to {}", parameter, value))
}

/// Check a value against the parameter's normalized domain
fn validate_value(parameter: Parameter, value: &ParamValue) -> Result<()> {
    let (min, max) = match (parameter, value) {
        (Parameter::Fader, _) => (0.0, 1.0),
        (Parameter::Pan, _) => (-1.0, 1.0),
        (Parameter::Mute, ParamValue::Toggle(_)) => return Ok(()),
        (Parameter::Name, ParamValue::Text(name)) if name.chars().count() <= MAX_NAME_LEN => return Ok(()),
        (Parameter::Name, ParamValue::Text(_)) => {
            return Err(MixerError::Translation(format!(
                "channel names are at most {} characters",
                MAX_NAME_LEN
            )))
        }
        (Parameter::Color, ParamValue::Color(c)) if *c < COLOR_COUNT => return Ok(()),
        (Parameter::Color, ParamValue::Color(c)) => {
            return Err(MixerError::OutOfRange {
                parameter,
                value: *c as f64,
                min: 0.0,
                max: (COLOR_COUNT - 1) as f64,
            })
        }
        _ => return Err(wrong_shape(parameter, value)),
    };
    match *value {
        ParamValue::Level(v) if (min..=max).contains(&v) => Ok(()),
        ParamValue::Level(v) => Err(MixerError::OutOfRange {
            parameter,
            value: v,
            min,
            max,
        }),
        _ => Err(wrong_shape(parameter, value)),
    }
}

/// Capability, channel and value checks shared by commands and reports
fn validate_change(state: &MixerState, channel: &ChannelId, parameter: Parameter, value: &ParamValue) -> Result<()> {
    if !state.capabilities.contains(channel) {
        return Err(MixerError::InvalidChannel(channel.to_string()));
    }
    if !state.capabilities.supports(parameter) {
        return Err(MixerError::Unsupported(format!(
            "{} cannot set channel {}",
            state.device.model, parameter
        )));
    }
    validate_value(parameter, value)
}

fn write_field(channel: &mut Channel, parameter: Parameter, value: &ParamValue) {
    match (parameter, value) {
        (Parameter::Fader, ParamValue::Level(v)) => channel.fader = *v,
        (Parameter::Pan, ParamValue::Level(v)) => channel.pan = *v,
        (Parameter::Mute, ParamValue::Toggle(b)) => channel.mute = *b,
        (Parameter::Name, ParamValue::Text(name)) => channel.name = name.clone(),
        (Parameter::Color, ParamValue::Color(c)) => channel.color = *c,
        // Shapes are checked by validate_value before any write
        _ => {}
    }
}

impl StateManager {
    pub fn new(echo_window: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: None,
                last_applied: HashMap::new(),
                shadow: EchoShadow::new(echo_window),
            }),
            meters: Mutex::new(HashMap::new()),
        }
    }

    /// Build a fresh channel map for a (re)connected device
    ///
    /// Every strip the capabilities describe exists afterwards, indexed 1..N per
    /// kind, plus `main`. Sequence history and echo expectations are cleared.
    pub fn reset_for_device(&self, device: DeviceInfo, capabilities: DeviceCapabilities) {
        let mut inner = self.inner.lock();
        let status = inner
            .state
            .as_ref()
            .map(|s| s.status.clone())
            .unwrap_or_else(ConnectionStatus::disconnected);
        let channels: BTreeMap<ChannelId, Channel> = capabilities
            .channel_ids()
            .into_iter()
            .map(|id| (id, Channel::new(id)))
            .collect();

        info!(
            "State reset for {} {} ({} channels)",
            device.manufacturer,
            device.model,
            channels.len()
        );
        inner.state = Some(MixerState {
            device,
            capabilities,
            status,
            channels,
            meters: HashMap::new(),
        });
        inner.last_applied.clear();
        inner.shadow.clear();
        drop(inner);
        self.meters.lock().clear();
    }

    /// Drop all state (device disconnected)
    pub fn discard(&self) {
        let mut inner = self.inner.lock();
        if inner.state.take().is_some() {
            debug!("State discarded");
        }
        inner.last_applied.clear();
        inner.shadow.clear();
        drop(inner);
        self.meters.lock().clear();
    }

    /// Snapshot of the whole state, meters included
    pub fn get_state(&self) -> Option<MixerState> {
        let mut snapshot = self.inner.lock().state.clone()?;
        snapshot.meters = self.meters.lock().clone();
        Some(snapshot)
    }

    pub fn capabilities(&self) -> Option<DeviceCapabilities> {
        self.inner.lock().state.as_ref().map(|s| s.capabilities)
    }

    pub fn channel(&self, id: &ChannelId) -> Option<Channel> {
        self.inner.lock().state.as_ref()?.channels.get(id).cloned()
    }

    /// Validate a command without touching state
    pub fn validate(&self, channel: &ChannelId, parameter: Parameter, value: &ParamValue) -> Result<()> {
        let inner = self.inner.lock();
        let state = inner
            .state
            .as_ref()
            .ok_or_else(|| MixerError::Connection("no device connected".into()))?;
        validate_change(state, channel, parameter, value)
    }

    /// Apply one change under the reconciliation rules
    ///
    /// Client changes are written immediately and marked unconfirmed. Hardware
    /// changes always win and clear the mark; if they match a value recorded
    /// with [`expect_echo`](Self::expect_echo) within the echo window they are
    /// not broadcast. A sequence at or below the last applied one for the same
    /// channel parameter fails with `StaleChange` and changes nothing.
    pub fn apply_change(&self, change: &ParameterChange) -> Result<Applied> {
        let now = Instant::now();
        let mut guard = self.inner.lock();
        let Inner {
            state,
            last_applied,
            shadow,
        } = &mut *guard;

        let state = state
            .as_mut()
            .ok_or_else(|| MixerError::Connection("no device connected".into()))?;
        let id = change.channel_id;
        validate_change(state, &id, change.parameter, &change.value)?;

        let key = (id, change.parameter);
        if let Some(&last) = last_applied.get(&key) {
            if change.sequence <= last {
                trace!(
                    "Dropping stale {}.{} seq {} (last {})",
                    id,
                    change.parameter,
                    change.sequence,
                    last
                );
                return Err(MixerError::StaleChange {
                    channel: id,
                    parameter: change.parameter,
                    sequence: change.sequence,
                    last_applied: last,
                });
            }
        }

        let channel = state
            .channels
            .get_mut(&id)
            .ok_or_else(|| MixerError::InvalidChannel(id.to_string()))?;
        last_applied.insert(key, change.sequence);
        write_field(channel, change.parameter, &change.value);

        let broadcast = match change.source {
            Source::Client => {
                channel.unconfirmed.insert(change.parameter);
                true
            }
            Source::Hardware => {
                channel.unconfirmed.remove(&change.parameter);
                let echo = shadow.confirm(id, change.parameter, &change.value, now);
                if echo {
                    trace!("Confirmed {}.{} = {}", id, change.parameter, change.value);
                }
                !echo
            }
        };

        Ok(Applied {
            channel: channel.clone(),
            broadcast,
        })
    }

    /// Record the value hardware will echo for a command about to be sent
    pub fn expect_echo(&self, channel: ChannelId, parameter: Parameter, value: ParamValue) {
        self.inner.lock().shadow.record(channel, parameter, value, Instant::now());
    }

    /// Returns false when no device state exists
    pub fn set_connection_status(&self, status: ConnectionStatus) -> bool {
        match self.inner.lock().state.as_mut() {
            Some(state) => {
                state.status = status;
                true
            }
            None => false,
        }
    }

    /// Merge a meter frame; newer values replace older ones per channel
    pub fn record_meters(&self, update: &MeterUpdate) {
        self.meters
            .lock()
            .extend(update.levels.iter().map(|(id, level)| (*id, level.clamp(0.0, 1.0))));
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new(Duration::from_millis(super::DEFAULT_ECHO_WINDOW_MS))
    }
}
