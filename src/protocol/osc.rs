//! OSC transport over UDP
//!
//! Every datagram is one OSC packet and decodes atomically; bundles are
//! flattened into their messages in order.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rosc::{OscPacket, OscMessage};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, info, trace};

use super::{ProtocolAdapter, WireMessage};
use crate::error::{MixerError, Result};

const RECV_BUFFER_SIZE: usize = 8192;

/// UDP socket connected to one console
pub struct OscAdapter {
    socket: RwLock<Option<Arc<UdpSocket>>>,
    /// Messages from a bundle not yet handed out
    backlog: Mutex<VecDeque<OscMessage>>,
}

fn flatten(packet: OscPacket, out: &mut VecDeque<OscMessage>) {
    match packet {
        OscPacket::Message(msg) => out.push_back(msg),
        OscPacket::Bundle(bundle) => {
            for p in bundle.content {
                flatten(p, out);
            }
        }
    }
}

impl OscAdapter {
    pub fn new() -> Self {
        Self {
            socket: RwLock::new(None),
            backlog: Mutex::new(VecDeque::new()),
        }
    }

    fn socket(&self) -> Option<Arc<UdpSocket>> {
        self.socket.read().clone()
    }
}

impl Default for OscAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolAdapter for OscAdapter {
    fn name(&self) -> &str {
        "osc"
    }

    /// `target` is `host:port` of the console
    async fn open(&self, target: &str) -> Result<()> {
        self.close().await;

        let target = target.trim();
        if !target.contains(':') {
            return Err(MixerError::Connection(format!("invalid OSC target '{}', expected host:port", target)));
        }
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| MixerError::Connection(format!("failed to bind UDP socket: {}", e)))?;
        socket
            .connect(target)
            .await
            .map_err(|e| MixerError::Connection(format!("failed to reach {}: {}", target, e)))?;

        *self.socket.write() = Some(Arc::new(socket));
        info!("OSC connected: {}", target);
        Ok(())
    }

    async fn close(&self) {
        if self.socket.write().take().is_some() {
            debug!("OSC socket closed");
        }
        self.backlog.lock().clear();
    }

    async fn send(&self, message: &WireMessage) -> Result<()> {
        let WireMessage::Osc(msg) = message else {
            return Err(MixerError::Translation(format!("{} cannot be sent over OSC", message)));
        };
        let socket = self
            .socket()
            .ok_or_else(|| MixerError::Connection("OSC socket not open".into()))?;

        let buf = rosc::encoder::encode(&OscPacket::Message(msg.clone()))
            .map_err(|e| MixerError::Translation(format!("OSC encode failed: {}", e)))?;
        // One datagram per message, so a message is never split
        socket
            .send(&buf)
            .await
            .map_err(|e| MixerError::Connection(format!("OSC send failed: {}", e)))?;
        trace!("OSC TX -> {} {:?}", msg.addr, msg.args);
        Ok(())
    }

    async fn receive(&self) -> Result<Option<WireMessage>> {
        loop {
            if let Some(msg) = self.backlog.lock().pop_front() {
                return Ok(Some(WireMessage::Osc(msg)));
            }

            let Some(socket) = self.socket() else {
                return Ok(None);
            };
            let mut buf = vec![0u8; RECV_BUFFER_SIZE];
            let n = socket
                .recv(&mut buf)
                .await
                .map_err(|e| MixerError::Connection(format!("OSC receive failed: {}", e)))?;

            let (_, packet) = rosc::decoder::decode_udp(&buf[..n])
                .map_err(|e| MixerError::ProtocolDecode(format!("bad OSC datagram ({} bytes): {}", n, e)))?;
            flatten(packet, &mut self.backlog.lock());
        }
    }
}
