//! Per-device session: command intake, event drain and state reconciliation
//!
//! A [`Session`] owns one board, one [`StateManager`] and one
//! [`EventDispatcher`]. Client commands are validated, applied optimistically
//! and then forwarded to the board. A background task drains the board's event
//! queue into the state manager and hands broadcastable events to subscribers.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::boards::{BoardContext, BoardOptions, BoardPlugin, BoardRegistry};
use crate::error::{MixerError, Result};
use crate::events::{
    event_queue, EventDispatcher, EventKind, EventReceiver, MixerEvent, QueuedEvent, Received, Subscriber,
    SubscriptionId, DEFAULT_EVENT_QUEUE_CAPACITY,
};
use crate::state::{SequenceClock, StateManager, DEFAULT_ECHO_WINDOW_MS};
use crate::types::{
    Channel, ChannelId, ConnectionStatus, DeviceCapabilities, DeviceInfo, MixerState, ParamValue, Parameter,
    ParameterChange, Source,
};

/// Tunables for one session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub board: BoardOptions,
    /// How long a sent value waits for its hardware echo
    pub echo_window: Duration,
    pub queue_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            board: BoardOptions::default(),
            echo_window: Duration::from_millis(DEFAULT_ECHO_WINDOW_MS),
            queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
        }
    }
}

/// Coordinator for one connected (or connectable) console
pub struct Session {
    board: Arc<dyn BoardPlugin>,
    state: Arc<StateManager>,
    dispatcher: Arc<EventDispatcher>,
    sequence: Arc<SequenceClock>,
    drain: JoinHandle<()>,
}

impl Session {
    /// Build the board registered as `board_id` and start draining its events
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(registry: &BoardRegistry, board_id: &str, options: SessionOptions) -> Result<Self> {
        let (events, rx) = event_queue(options.queue_capacity);
        let sequence = Arc::new(SequenceClock::new());
        let ctx = BoardContext {
            events,
            sequence: sequence.clone(),
            options: options.board,
        };
        let board = registry.create(board_id, ctx)?;

        let state = Arc::new(StateManager::new(options.echo_window));
        let dispatcher = Arc::new(EventDispatcher::new());
        let drain = tokio::spawn(drain_events(rx, state.clone(), dispatcher.clone()));

        info!("Session started for board '{}'", board_id);
        Ok(Self {
            board,
            state,
            dispatcher,
            sequence,
            drain,
        })
    }

    pub fn device_info(&self) -> DeviceInfo {
        self.board.device_info()
    }

    pub fn capabilities(&self) -> DeviceCapabilities {
        self.board.capabilities()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.board.status()
    }

    /// Snapshot of the mixer; `None` while no device is connected
    pub fn state(&self) -> Option<MixerState> {
        self.state.get_state()
    }

    pub fn subscribe(&self, kind: EventKind, subscriber: Subscriber) -> SubscriptionId {
        self.dispatcher.subscribe(kind, subscriber)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.dispatcher.unsubscribe(id)
    }

    /// Connect the board and build a fresh channel map
    ///
    /// Already connected is a no-op. On failure the state is dropped and the
    /// board reports `Error`.
    pub async fn connect(&self, connection: &str) -> Result<()> {
        if self.board.status().connected {
            debug!("Already connected, ignoring connect");
            return Ok(());
        }

        // State must exist before the first hardware report arrives
        let mut device = self.board.device_info();
        device.connection = connection.to_string();
        self.state.reset_for_device(device, self.board.capabilities());

        match self.board.connect(connection).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.state.discard();
                Err(e)
            }
        }
    }

    pub async fn disconnect(&self) {
        self.board.disconnect().await;
        self.state.discard();
    }

    pub async fn request_full_state(&self) -> Result<()> {
        self.board.request_full_state().await
    }

    /// Set a fader in [0,1]; returns the channel as optimistically applied
    pub async fn set_fader(&self, channel: &str, value: f64) -> Result<Channel> {
        self.set_param(channel, Parameter::Fader, ParamValue::Level(value)).await
    }

    pub async fn set_mute(&self, channel: &str, muted: bool) -> Result<Channel> {
        self.set_param(channel, Parameter::Mute, ParamValue::Toggle(muted)).await
    }

    /// Set a pan position in [-1,1]
    pub async fn set_pan(&self, channel: &str, value: f64) -> Result<Channel> {
        self.set_param(channel, Parameter::Pan, ParamValue::Level(value)).await
    }

    /// Rename a channel (at most 12 characters) on consoles with scribble strips
    pub async fn set_channel_name(&self, channel: &str, name: &str) -> Result<Channel> {
        self.set_param(channel, Parameter::Name, ParamValue::Text(name.to_string())).await
    }

    /// Set a channel's palette color (0-7)
    pub async fn set_channel_color(&self, channel: &str, color: u8) -> Result<Channel> {
        self.set_param(channel, Parameter::Color, ParamValue::Color(color)).await
    }

    /// Recall a stored scene, numbered from 1
    ///
    /// The console reports the recalled values back; they reach the state as
    /// hardware changes.
    pub async fn recall_scene(&self, scene: u16) -> Result<()> {
        self.board.recall_scene(scene).await
    }

    async fn set_param(&self, channel: &str, parameter: Parameter, value: ParamValue) -> Result<Channel> {
        let id: ChannelId = channel.parse()?;
        self.state.validate(&id, parameter, &value)?;
        if !self.board.status().connected {
            return Err(MixerError::Connection("device is not connected".into()));
        }
        let echo = self.board.quantize(&id, parameter, value.clone())?;

        let change = ParameterChange {
            source: Source::Client,
            channel_id: id,
            parameter,
            value: value.clone(),
            sequence: self.sequence.next(),
        };
        let applied = match self.state.apply_change(&change) {
            Ok(applied) => applied,
            // A newer hardware report already landed; it stands
            Err(MixerError::StaleChange { sequence, last_applied, .. }) => {
                trace!("{}.{} seq {} superseded by {}, not sent", id, parameter, sequence, last_applied);
                return self
                    .state
                    .channel(&id)
                    .ok_or_else(|| MixerError::Connection("no device connected".into()));
            }
            Err(e) => return Err(e),
        };
        self.dispatcher.dispatch(&MixerEvent::ParameterChanged(change));

        // Armed before sending so a fast echo cannot beat it
        self.state.expect_echo(id, parameter, echo);
        let sent = match (parameter, value) {
            (Parameter::Fader, ParamValue::Level(level)) => self.board.set_fader(&id, level).await,
            (Parameter::Pan, ParamValue::Level(level)) => self.board.set_pan(&id, level).await,
            (Parameter::Mute, ParamValue::Toggle(muted)) => self.board.set_mute(&id, muted).await,
            (Parameter::Name, ParamValue::Text(name)) => self.board.set_channel_name(&id, &name).await,
            (Parameter::Color, ParamValue::Color(color)) => self.board.set_channel_color(&id, color).await,
            (parameter, value) => Err(MixerError::Translation(format!("{} cannot be set to {}", parameter, value))),
        };
        if let Err(e) = sent {
            warn!("{}.{} applied locally but not sent: {}", id, parameter, e);
            return Err(e);
        }
        Ok(applied.channel)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.drain.abort();
    }
}

/// Apply queued board events to state and forward them to subscribers
async fn drain_events(mut rx: EventReceiver, state: Arc<StateManager>, dispatcher: Arc<EventDispatcher>) {
    while let Some(received) = rx.recv().await {
        match received {
            Received::Queued(QueuedEvent::Parameter(change)) => match state.apply_change(&change) {
                Ok(applied) if applied.broadcast => {
                    dispatcher.dispatch(&MixerEvent::ParameterChanged(change));
                }
                Ok(_) => {}
                Err(MixerError::StaleChange { .. }) => {
                    trace!("Stale {}.{} seq {} dropped", change.channel_id, change.parameter, change.sequence);
                }
                Err(e) => debug!("Hardware change not applied: {}", e),
            },
            Received::Queued(QueuedEvent::Status(status)) => {
                state.set_connection_status(status.clone());
                dispatcher.dispatch(&MixerEvent::ConnectionStatusChanged(status));
            }
            Received::Meters(update) => {
                state.record_meters(&update);
                dispatcher.dispatch(&MixerEvent::MeterUpdate(update));
            }
        }
    }
    debug!("Event queue closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boards::{AllenHeathModel, Command8Model, ConsoleBoard, XAirMidiModel, XAirOscModel};
    use crate::midi::MidiMessage;
    use crate::protocol::midi::testing::AttachedMidi;
    use crate::protocol::mock::MockAdapter;
    use crate::protocol::WireMessage;
    use crate::types::ConnectionState;
    use parking_lot::Mutex;
    use rosc::{OscMessage, OscType};

    fn mock_registry(adapter: Arc<MockAdapter>) -> BoardRegistry {
        let mut registry = BoardRegistry::new();
        let midi = adapter.clone();
        registry.register("xair-midi", move |ctx| {
            Arc::new(ConsoleBoard::new("xair-midi", XAirMidiModel::default(), midi.clone(), ctx))
        });
        let osc = adapter.clone();
        registry.register("xair-osc", move |ctx| {
            Arc::new(ConsoleBoard::new("xair-osc", XAirOscModel::new(), osc.clone(), ctx))
        });
        let command8 = adapter.clone();
        registry.register("command8", move |ctx| {
            Arc::new(ConsoleBoard::new("command8", Command8Model::new(), command8.clone(), ctx))
        });
        registry.register("qu24", move |ctx| {
            Arc::new(ConsoleBoard::new("qu24", AllenHeathModel::qu24(0), adapter.clone(), ctx))
        });
        registry
    }

    async fn connected(board: &str) -> (Session, Arc<MockAdapter>) {
        let adapter = MockAdapter::new();
        let session = Session::start(&mock_registry(adapter.clone()), board, SessionOptions::default()).unwrap();
        session.connect("test").await.unwrap();
        adapter.clear_sent();
        (session, adapter)
    }

    /// Collect every event of `kind` a session dispatches
    fn record(session: &Session, kind: EventKind) -> Arc<Mutex<Vec<MixerEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        session.subscribe(
            kind,
            Arc::new(move |event: &MixerEvent| -> anyhow::Result<()> {
                sink.lock().push(event.clone());
                Ok(())
            }),
        );
        seen
    }

    /// Wait (up to a second) for the drain task to catch up
    async fn settle(mut done: impl FnMut() -> bool) {
        for _ in 0..200 {
            if done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    fn channel(session: &Session, id: ChannelId) -> Channel {
        session.state().unwrap().channels[&id].clone()
    }

    fn cc(channel: u8, cc: u8, value: u8) -> WireMessage {
        WireMessage::Midi(MidiMessage::ControlChange { channel, cc, value })
    }

    fn osc(addr: &str, args: Vec<OscType>) -> WireMessage {
        WireMessage::Osc(OscMessage { addr: addr.into(), args })
    }

    /// Sent messages minus the OSC keepalive, whose first tick races the test
    fn commands(adapter: &MockAdapter) -> Vec<WireMessage> {
        adapter
            .sent()
            .into_iter()
            .filter(|m| !matches!(m, WireMessage::Osc(msg) if msg.addr == "/xremote" || msg.addr == "/meters"))
            .collect()
    }

    #[tokio::test]
    async fn test_unknown_board() {
        let registry = mock_registry(MockAdapter::new());
        let err = Session::start(&registry, "x32", SessionOptions::default()).err().unwrap();
        assert_eq!(err, MixerError::UnknownBoard("x32".into()));
    }

    #[tokio::test]
    async fn test_connect_builds_state() {
        let (session, _adapter) = connected("xair-midi").await;
        let state = session.state().unwrap();
        assert_eq!(state.device.connection, "test");
        assert_eq!(state.device.manufacturer, "Behringer");
        assert_eq!(state.channels.len(), 16 + 6 + 4 + 4 + 1);
        settle(|| session.state().is_some_and(|s| s.status.connected)).await;
    }

    #[tokio::test]
    async fn test_set_fader_is_visible_immediately() {
        let (session, adapter) = connected("xair-midi").await;
        let seen = record(&session, EventKind::ParameterChanged);

        let main = session.set_fader("main", 0.8).await.unwrap();
        assert_eq!(main.fader, 0.8);
        let main = channel(&session, ChannelId::MAIN);
        assert_eq!(main.fader, 0.8);
        assert!(main.unconfirmed.contains(&Parameter::Fader));

        assert_eq!(adapter.sent(), vec![cc(0, 31, 102)]);
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        let MixerEvent::ParameterChanged(change) = &seen[0] else {
            panic!("expected a parameter change");
        };
        assert_eq!(change.source, Source::Client);
        assert_eq!(change.value, ParamValue::Level(0.8));
    }

    #[tokio::test]
    async fn test_invalid_channel_touches_nothing() {
        let (session, adapter) = connected("xair-midi").await;
        let before = session.state().unwrap().channels;

        let err = session.set_fader("input_99", 0.5).await.unwrap_err();
        assert_eq!(err, MixerError::InvalidChannel("input_99".into()));
        let err = session.set_fader("strip_1", 0.5).await.unwrap_err();
        assert_eq!(err, MixerError::InvalidChannel("strip_1".into()));

        assert!(adapter.sent().is_empty());
        assert_eq!(session.state().unwrap().channels, before);
    }

    #[tokio::test]
    async fn test_out_of_range_is_rejected() {
        let (session, adapter) = connected("xair-midi").await;
        let err = session.set_pan("input_1", 1.5).await.unwrap_err();
        assert!(matches!(err, MixerError::OutOfRange { .. }));
        assert!(adapter.sent().is_empty());
        assert_eq!(channel(&session, ChannelId::input(1)).pan, 0.0);
    }

    #[tokio::test]
    async fn test_echo_is_not_broadcast_twice() {
        let (session, adapter) = connected("xair-midi").await;
        let seen = record(&session, EventKind::ParameterChanged);

        session.set_fader("input_3", 0.4).await.unwrap();
        // 0.4 lands on raw 51 of 127
        assert_eq!(adapter.sent(), vec![cc(0, 2, 51)]);
        adapter.inject(cc(0, 2, 51));

        let input_3 = ChannelId::input(3);
        settle(|| channel(&session, input_3).unconfirmed.is_empty()).await;
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(channel(&session, input_3).fader, 51.0 / 127.0);
    }

    #[tokio::test]
    async fn test_differing_hardware_value_wins() {
        let (session, adapter) = connected("xair-midi").await;
        let seen = record(&session, EventKind::ParameterChanged);

        session.set_fader("input_3", 0.5).await.unwrap();
        adapter.inject(cc(0, 2, 76));

        settle(|| seen.lock().len() == 2).await;
        let input_3 = channel(&session, ChannelId::input(3));
        assert_eq!(input_3.fader, 76.0 / 127.0);
        assert!(input_3.unconfirmed.is_empty());
        let MixerEvent::ParameterChanged(change) = &seen.lock()[1] else {
            panic!("expected a parameter change");
        };
        assert_eq!(change.source, Source::Hardware);
    }

    #[tokio::test]
    async fn test_external_change_is_broadcast() {
        let (session, adapter) = connected("xair-midi").await;
        let seen = record(&session, EventKind::ParameterChanged);

        adapter.inject(cc(1, 4, 127));
        settle(|| seen.lock().len() == 1).await;
        assert!(channel(&session, ChannelId::input(5)).mute);
    }

    #[tokio::test]
    async fn test_forward_failure_keeps_value_unconfirmed() {
        let (session, adapter) = connected("xair-midi").await;
        adapter.set_fail_send(true);

        let err = session.set_mute("aux_2", true).await.unwrap_err();
        assert!(matches!(err, MixerError::Connection(_)));
        let aux = channel(&session, ChannelId::aux(2));
        assert!(aux.mute);
        assert!(aux.unconfirmed.contains(&Parameter::Mute));
    }

    #[tokio::test]
    async fn test_transport_loss_surfaces_as_status() {
        let (session, adapter) = connected("xair-midi").await;
        let statuses = record(&session, EventKind::ConnectionStatusChanged);

        adapter.inject_error(MixerError::Connection("device unplugged".into()));
        settle(|| {
            statuses
                .lock()
                .iter()
                .any(|e| matches!(e, MixerEvent::ConnectionStatusChanged(s) if s.state == ConnectionState::Error))
        })
        .await;
        assert_eq!(session.state().unwrap().status.state, ConnectionState::Error);

        // Commands are rejected without touching state
        let err = session.set_fader("main", 0.3).await.unwrap_err();
        assert!(matches!(err, MixerError::Connection(_)));
        assert_eq!(channel(&session, ChannelId::MAIN).fader, 0.0);
    }

    #[tokio::test]
    async fn test_failed_connect_leaves_no_state() {
        let adapter = MockAdapter::new();
        let session = Session::start(&mock_registry(adapter.clone()), "xair-midi", SessionOptions::default()).unwrap();
        adapter.fail_next_open("no such port");

        assert!(session.connect("X18").await.is_err());
        assert!(session.state().is_none());
        assert_eq!(session.status().state, ConnectionState::Error);
        let err = session.set_fader("main", 0.5).await.unwrap_err();
        assert!(matches!(err, MixerError::Connection(_)));
    }

    #[tokio::test]
    async fn test_meters_reach_state_and_subscribers() {
        let (session, adapter) = connected("xair-osc").await;
        let seen = record(&session, EventKind::MeterUpdate);

        // 40 values at -60 dB except input 1 at 0 dB
        let mut blob = 40i32.to_le_bytes().to_vec();
        for i in 0..40 {
            let db: i16 = if i == 0 { 0 } else { -60 * 256 };
            blob.extend_from_slice(&db.to_le_bytes());
        }
        adapter.inject(WireMessage::Osc(OscMessage {
            addr: "/meters/1".into(),
            args: vec![OscType::Blob(blob)],
        }));

        settle(|| !seen.lock().is_empty()).await;
        let meters = session.state().unwrap().meters;
        assert_eq!(meters[&ChannelId::input(1)], 1.0);
        assert_eq!(meters[&ChannelId::input(2)], 0.0);
    }

    #[tokio::test]
    async fn test_superseded_command_is_not_sent() {
        let (session, adapter) = connected("xair-midi").await;
        let seen = record(&session, EventKind::ParameterChanged);

        // A hardware report numbered after anything the session can draw
        session
            .state
            .apply_change(&ParameterChange {
                source: Source::Hardware,
                channel_id: ChannelId::input(2),
                parameter: Parameter::Fader,
                value: ParamValue::Level(0.25),
                sequence: u64::MAX,
            })
            .unwrap();

        let input_2 = session.set_fader("input_2", 0.9).await.unwrap();
        assert_eq!(input_2.fader, 0.25);
        assert!(input_2.unconfirmed.is_empty());
        assert!(adapter.sent().is_empty());
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_lone_data_entry_moves_xair_input_7() {
        let adapter = AttachedMidi::new();
        let mut registry = BoardRegistry::new();
        let board_adapter = adapter.clone();
        registry.register("xair-midi", move |ctx| {
            Arc::new(ConsoleBoard::new("xair-midi", XAirMidiModel::default(), board_adapter.clone(), ctx))
        });
        let session = Session::start(&registry, "xair-midi", SessionOptions::default()).unwrap();
        let seen = record(&session, EventKind::ParameterChanged);
        session.connect("X18").await.unwrap();

        // CC 6 is input 7's fader on X Air, not the start of an NRPN value
        adapter.push(&[0xB0, 0x06, 0x40]).await;

        settle(|| seen.lock().len() == 1).await;
        assert_eq!(channel(&session, ChannelId::input(7)).fader, 64.0 / 127.0);
    }

    #[tokio::test]
    async fn test_names_and_colors_over_osc() {
        let (session, adapter) = connected("xair-osc").await;
        let seen = record(&session, EventKind::ParameterChanged);

        let input_2 = session.set_channel_name("input_2", "Kick").await.unwrap();
        assert_eq!(input_2.name, "Kick");
        assert!(input_2.unconfirmed.contains(&Parameter::Name));
        let main = session.set_channel_color("main", 3).await.unwrap();
        assert_eq!(main.color, 3);
        assert_eq!(
            commands(&adapter),
            vec![
                osc("/ch/02/config/name", vec![OscType::String("Kick".into())]),
                osc("/lr/config/color", vec![OscType::Int(3)]),
            ]
        );

        // The console confirms the name and someone renames an aux at the desk
        adapter.inject(osc("/ch/02/config/name", vec![OscType::String("Kick".into())]));
        adapter.inject(osc("/bus/1/config/name", vec![OscType::String("Drums".into())]));
        settle(|| seen.lock().len() == 3).await;
        assert!(channel(&session, ChannelId::input(2)).unconfirmed.is_empty());
        assert_eq!(channel(&session, ChannelId::aux(1)).name, "Drums");
    }

    #[tokio::test]
    async fn test_bad_labels_touch_nothing() {
        let (session, adapter) = connected("xair-osc").await;
        let err = session.set_channel_name("input_1", "Lead Vocal Left").await.unwrap_err();
        assert!(matches!(err, MixerError::Translation(_)));
        let err = session.set_channel_color("input_1", 8).await.unwrap_err();
        assert!(matches!(err, MixerError::OutOfRange { .. }));
        assert!(commands(&adapter).is_empty());
        assert_eq!(channel(&session, ChannelId::input(1)).name, "Ch 1");

        let (session, adapter) = connected("xair-midi").await;
        let err = session.set_channel_name("input_1", "Vox").await.unwrap_err();
        assert!(matches!(err, MixerError::Unsupported(_)));
        assert!(adapter.sent().is_empty());
    }

    #[tokio::test]
    async fn test_command8_main_is_not_addressable() {
        let (session, adapter) = connected("command8").await;
        let before = session.state().unwrap().channels;

        let err = session.set_fader("main", 0.5).await.unwrap_err();
        assert_eq!(err, MixerError::InvalidChannel("main".into()));
        assert!(adapter.sent().is_empty());
        assert_eq!(session.state().unwrap().channels, before);

        session.set_mute("input_16", true).await.unwrap();
        assert_eq!(adapter.sent(), vec![cc(15, 14, 127)]);
    }

    #[tokio::test]
    async fn test_scene_recall() {
        let (session, adapter) = connected("xair-midi").await;
        session.recall_scene(3).await.unwrap();
        assert_eq!(
            adapter.sent(),
            vec![WireMessage::Midi(MidiMessage::ProgramChange { channel: 0, program: 2 })]
        );
        assert_eq!(
            session.recall_scene(65).await.unwrap_err(),
            MixerError::InvalidScene { scene: 65, max: 64 }
        );
        assert_eq!(
            session.recall_scene(0).await.unwrap_err(),
            MixerError::InvalidScene { scene: 0, max: 64 }
        );

        let (session, adapter) = connected("command8").await;
        assert!(matches!(session.recall_scene(1).await, Err(MixerError::Unsupported(_))));
        assert!(adapter.sent().is_empty());
    }

    #[tokio::test]
    async fn test_scene_recall_rereads_osc_state() {
        let (session, adapter) = connected("xair-osc").await;
        session.recall_scene(2).await.unwrap();
        let sent = commands(&adapter);
        assert_eq!(sent[0], osc("/-snap/load", vec![OscType::Int(2)]));
        assert_eq!(sent.len(), 1 + (16 + 6 + 4 + 4 + 1) * 5);
    }

    #[tokio::test]
    async fn test_disconnect_discards_state() {
        let (session, adapter) = connected("qu24").await;
        session.set_fader("input_1", 0.75).await.unwrap();
        session.disconnect().await;
        assert!(session.state().is_none());
        assert!(!adapter.is_open());
        adapter.clear_sent();

        session.connect("test").await.unwrap();
        let input_1 = channel(&session, ChannelId::input(1));
        assert_eq!(input_1.fader, 0.0);
        assert!(input_1.unconfirmed.is_empty());
        // Full state requested again on reconnect
        assert!(matches!(&adapter.sent()[..], [WireMessage::Midi(MidiMessage::SysEx { .. })]));
    }

    #[tokio::test]
    async fn test_disconnect_mid_nrpn_leaves_clean_state() {
        let adapter = AttachedMidi::new();
        let mut registry = BoardRegistry::new();
        let board_adapter = adapter.clone();
        registry.register("qu24", move |ctx| {
            Arc::new(ConsoleBoard::new("qu24", AllenHeathModel::qu24(0), board_adapter.clone(), ctx))
        });
        let session = Session::start(&registry, "qu24", SessionOptions::default()).unwrap();
        let seen = record(&session, EventKind::ParameterChanged);

        session.connect("Qu-24").await.unwrap();
        assert_eq!(adapter.sysex_written(), 1);

        // Parameter half of an input 1 fader report, then the link drops
        adapter.push(&[0xB0, 0x63, 0x20]).await;
        adapter.push(&[0xB0, 0x62, 0x17]).await;
        session.disconnect().await;

        // Each open starts a fresh output log
        session.connect("Qu-24").await.unwrap();
        assert_eq!(adapter.sysex_written(), 1);

        // The value half alone must not complete the stale sequence
        adapter.push(&[0xB0, 0x06, 0x6B]).await;
        adapter.push(&[0xB0, 0x26, 0x07]).await;
        // A complete report for input 2
        for frame in [[0xB0, 0x63, 0x21], [0xB0, 0x62, 0x17], [0xB0, 0x06, 0x6B], [0xB0, 0x26, 0x07]] {
            adapter.push(&frame).await;
        }

        settle(|| seen.lock().len() == 1).await;
        let input_2 = channel(&session, ChannelId::input(2));
        assert!((input_2.fader - 0.75).abs() < 1e-9);
        let input_1 = channel(&session, ChannelId::input(1));
        assert_eq!(input_1.fader, 0.0);
        assert!(input_1.unconfirmed.is_empty());
    }
}
