//! Generic board: connection lifecycle and receive loop around a [`ConsoleModel`]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::{BoardContext, BoardPlugin, ConsoleModel, Decoded};
use crate::error::{MixerError, Result};
use crate::protocol::{ProtocolAdapter, WireMessage};
use crate::types::{
    ChannelId, ConnectionState, ConnectionStatus, DeviceCapabilities, DeviceInfo, MeterUpdate, ParamValue, Parameter,
    ParameterChange, Source,
};

/// Background tasks of a live connection
struct BoardTasks {
    shutdown: watch::Sender<bool>,
    receive: JoinHandle<()>,
    keepalive: Option<JoinHandle<()>>,
}

impl BoardTasks {
    /// Signal both tasks and wait for them to finish
    async fn stop(self) {
        if self.shutdown.send(true).is_err() {
            debug!("Board tasks already stopped");
        }
        if let Err(e) = self.receive.await {
            warn!("Receive loop ended abnormally: {}", e);
        }
        if let Some(keepalive) = self.keepalive {
            if let Err(e) = keepalive.await {
                warn!("Keepalive loop ended abnormally: {}", e);
            }
        }
    }
}

/// Board plugin for any console described by a [`ConsoleModel`]
pub struct ConsoleBoard<M: ConsoleModel> {
    board_id: String,
    model: Arc<M>,
    adapter: Arc<dyn ProtocolAdapter>,
    ctx: BoardContext,
    status: Arc<Mutex<ConnectionStatus>>,
    connection: Mutex<Option<String>>,
    // Also serializes connect/disconnect
    tasks: tokio::sync::Mutex<Option<BoardTasks>>,
}

impl<M: ConsoleModel> ConsoleBoard<M> {
    pub fn new(board_id: impl Into<String>, model: M, adapter: Arc<dyn ProtocolAdapter>, ctx: BoardContext) -> Self {
        Self {
            board_id: board_id.into(),
            model: Arc::new(model),
            adapter,
            ctx,
            status: Arc::new(Mutex::new(ConnectionStatus::disconnected())),
            connection: Mutex::new(None),
            tasks: tokio::sync::Mutex::new(None),
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    async fn set_status(&self, state: ConnectionState, error: Option<String>) {
        publish_status(&self.status, &self.ctx, ConnectionStatus::new(state, error)).await;
    }

    fn is_connected(&self) -> bool {
        self.status.lock().state == ConnectionState::Connected
    }

    /// Send in order; a transport failure takes the board to `Error`
    async fn send_all(&self, messages: &[WireMessage]) -> Result<()> {
        for message in messages {
            if let Err(e) = self.adapter.send(message).await {
                if e.is_transport_loss() {
                    self.connection_lost(e.to_string()).await;
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Stop the background tasks and publish `Error`, once per lost connection
    async fn connection_lost(&self, reason: String) {
        let mut tasks = self.tasks.lock().await;
        if !self.is_connected() {
            return;
        }
        warn!("⚠️  {} connection lost: {}", self.board_id, reason);
        if let Some(running) = tasks.take() {
            running.stop().await;
        }
        self.set_status(ConnectionState::Error, Some(reason)).await;
    }

    /// Wire messages for a value plus the value the console will echo
    fn encode_value(
        &self,
        channel: &ChannelId,
        parameter: Parameter,
        value: ParamValue,
    ) -> Result<(Vec<WireMessage>, ParamValue)> {
        match self.model.translator(parameter) {
            Some(translator) => {
                let raw = translator.to_hardware(value)?;
                let messages = self.model.encode(channel, parameter, raw)?;
                Ok((messages, translator.from_hardware(raw)?))
            }
            None => {
                let messages = self.model.encode_label(channel, parameter, &value)?;
                Ok((messages, value))
            }
        }
    }

    /// Translate, address and send one parameter
    async fn set_param(&self, channel: &ChannelId, parameter: Parameter, value: ParamValue) -> Result<ParamValue> {
        let (messages, echo) = self.encode_value(channel, parameter, value)?;

        if !self.is_connected() {
            return Err(MixerError::Connection(format!("{} is not connected", self.board_id)));
        }
        self.send_all(&messages).await?;
        debug!("{} {}.{} = {}", self.board_id, channel, parameter, echo);
        Ok(echo)
    }
}

async fn publish_status(slot: &Mutex<ConnectionStatus>, ctx: &BoardContext, status: ConnectionStatus) {
    *slot.lock() = status.clone();
    ctx.events.status(status).await;
}

async fn publish_change(board_id: &str, ctx: &BoardContext, channel: ChannelId, parameter: Parameter, value: ParamValue) {
    let change = ParameterChange {
        source: Source::Hardware,
        channel_id: channel,
        parameter,
        value,
        sequence: ctx.sequence.next(),
    };
    trace!("{} RX {}.{} = {} (seq {})", board_id, channel, parameter, change.value, change.sequence);
    ctx.events.parameter(change).await;
}

/// Turn one inbound message into events
async fn handle_message<M: ConsoleModel>(board_id: &str, model: &M, ctx: &BoardContext, message: &WireMessage) {
    match model.decode(message) {
        Ok(Some(Decoded::Param { channel, parameter, raw })) => {
            let value = model
                .translator(parameter)
                .ok_or_else(|| MixerError::Translation(format!("{} has no raw encoding", parameter)))
                .and_then(|translator| translator.from_hardware(raw));
            match value {
                Ok(value) => publish_change(board_id, ctx, channel, parameter, value).await,
                Err(e) => warn!("{}: dropping {} for {}: {}", board_id, message, channel, e),
            }
        }
        Ok(Some(Decoded::Label { channel, parameter, value })) => {
            publish_change(board_id, ctx, channel, parameter, value).await
        }
        Ok(Some(Decoded::Meters(levels))) => ctx.events.meters(MeterUpdate { levels }),
        Ok(None) => trace!("{}: ignoring {}", board_id, message),
        Err(e) => warn!("{}: dropping {}: {}", board_id, message, e),
    }
}

/// Read until shutdown or transport loss
async fn receive_loop<M: ConsoleModel>(
    board_id: String,
    model: Arc<M>,
    adapter: Arc<dyn ProtocolAdapter>,
    ctx: BoardContext,
    status: Arc<Mutex<ConnectionStatus>>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!("{} receive loop started", board_id);
    let lost = loop {
        let received = tokio::select! {
            _ = shutdown.changed() => break None,
            received = adapter.receive() => received,
        };
        match received {
            Ok(Some(message)) => handle_message(&board_id, model.as_ref(), &ctx, &message).await,
            Ok(None) => break Some("transport closed".to_string()),
            Err(e) if e.is_transport_loss() => break Some(e.to_string()),
            Err(e) => warn!("{}: {}", board_id, e),
        }
    };

    if let Some(reason) = lost {
        warn!("⚠️  {} connection lost: {}", board_id, reason);
        publish_status(&status, &ctx, ConnectionStatus::new(ConnectionState::Error, Some(reason))).await;
    }
    debug!("{} receive loop stopped", board_id);
}

/// Resend `messages` every `interval` until shutdown
async fn keepalive_loop(
    board_id: String,
    adapter: Arc<dyn ProtocolAdapter>,
    interval: Duration,
    messages: Vec<WireMessage>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                for message in &messages {
                    if let Err(e) = adapter.send(message).await {
                        debug!("{} keepalive failed: {}", board_id, e);
                    }
                }
            }
        }
    }
}

#[async_trait]
impl<M: ConsoleModel> BoardPlugin for ConsoleBoard<M> {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            board: self.board_id.clone(),
            manufacturer: self.model.manufacturer().to_string(),
            model: self.model.model().to_string(),
            connection: self.connection.lock().clone().unwrap_or_default(),
        }
    }

    fn capabilities(&self) -> DeviceCapabilities {
        self.model.capabilities()
    }

    fn status(&self) -> ConnectionStatus {
        self.status.lock().clone()
    }

    fn quantize(&self, channel: &ChannelId, parameter: Parameter, value: ParamValue) -> Result<ParamValue> {
        self.encode_value(channel, parameter, value).map(|(_, echo)| echo)
    }

    async fn connect(&self, connection: &str) -> Result<()> {
        let mut tasks = self.tasks.lock().await;
        if self.is_connected() {
            debug!("{} already connected", self.board_id);
            return Ok(());
        }
        // Left over from a connection that was lost
        if let Some(stale) = tasks.take() {
            stale.stop().await;
        }

        info!("🔌 Connecting {} via '{}'", self.board_id, connection);
        self.set_status(ConnectionState::Connecting, None).await;
        if let Err(e) = self.adapter.open(connection).await {
            warn!("❌ {} connect failed: {}", self.board_id, e);
            self.set_status(ConnectionState::Error, Some(e.to_string())).await;
            return Err(e);
        }
        *self.connection.lock() = Some(connection.to_string());

        // Published before the loop starts so it precedes any inbound change
        self.set_status(ConnectionState::Connected, None).await;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let receive = tokio::spawn(receive_loop(
            self.board_id.clone(),
            self.model.clone(),
            self.adapter.clone(),
            self.ctx.clone(),
            self.status.clone(),
            shutdown_rx.clone(),
        ));
        let keepalive = self.model.keepalive().map(|(interval, messages)| {
            tokio::spawn(keepalive_loop(
                self.board_id.clone(),
                self.adapter.clone(),
                interval,
                messages,
                shutdown_rx,
            ))
        });
        *tasks = Some(BoardTasks {
            shutdown,
            receive,
            keepalive,
        });
        drop(tasks);

        info!(
            "✅ {} connected ({} {})",
            self.board_id,
            self.model.manufacturer(),
            self.model.model()
        );

        if self.model.capabilities().supports_full_state {
            if let Err(e) = self.request_full_state().await {
                warn!("{} full state request failed: {}", self.board_id, e);
            }
        }
        Ok(())
    }

    async fn disconnect(&self) {
        let mut tasks = self.tasks.lock().await;
        let running = tasks.take();
        if running.is_none() && self.status.lock().state == ConnectionState::Disconnected {
            return;
        }
        if let Some(running) = running {
            running.stop().await;
        }
        self.adapter.close().await;
        self.set_status(ConnectionState::Disconnected, None).await;
        info!("{} disconnected", self.board_id);
    }

    async fn set_fader(&self, channel: &ChannelId, value: f64) -> Result<ParamValue> {
        self.set_param(channel, Parameter::Fader, ParamValue::Level(value)).await
    }

    async fn set_mute(&self, channel: &ChannelId, muted: bool) -> Result<ParamValue> {
        self.set_param(channel, Parameter::Mute, ParamValue::Toggle(muted)).await
    }

    async fn set_pan(&self, channel: &ChannelId, value: f64) -> Result<ParamValue> {
        self.set_param(channel, Parameter::Pan, ParamValue::Level(value)).await
    }

    async fn set_channel_name(&self, channel: &ChannelId, name: &str) -> Result<ParamValue> {
        self.set_param(channel, Parameter::Name, ParamValue::Text(name.to_string())).await
    }

    async fn set_channel_color(&self, channel: &ChannelId, color: u8) -> Result<ParamValue> {
        self.set_param(channel, Parameter::Color, ParamValue::Color(color)).await
    }

    async fn recall_scene(&self, scene: u16) -> Result<()> {
        let scenes = self.model.capabilities().scenes;
        if scenes == 0 {
            return Err(MixerError::Unsupported(format!("{} has no scene memory", self.board_id)));
        }
        if scene == 0 || scene > scenes {
            return Err(MixerError::InvalidScene { scene, max: scenes });
        }
        if !self.is_connected() {
            return Err(MixerError::Connection(format!("{} is not connected", self.board_id)));
        }

        self.send_all(&self.model.scene_recall(scene)).await?;
        info!("🎬 Recalled scene {} on {}", scene, self.board_id);
        // A recall moves everything; re-read what the console can report
        if self.model.capabilities().supports_full_state {
            self.request_full_state().await?;
        }
        Ok(())
    }

    async fn request_full_state(&self) -> Result<()> {
        if !self.is_connected() {
            return Err(MixerError::Connection(format!("{} is not connected", self.board_id)));
        }
        let messages = self.model.full_state_request();
        if messages.is_empty() {
            debug!("{} has no full-state query", self.board_id);
            return Ok(());
        }
        self.send_all(&messages).await?;
        info!("Requested full state from {} ({} messages)", self.board_id, messages.len());
        Ok(())
    }
}
