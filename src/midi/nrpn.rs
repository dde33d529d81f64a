//! NRPN (Non-Registered Parameter Number) sequences
//!
//! An NRPN write travels as four Control Changes on one MIDI channel:
//! CC99 (parameter MSB), CC98 (parameter LSB), CC6 (data MSB), CC38 (data LSB).
//! [`NrpnAssembler`] rebuilds them on receive. A sequence is only emitted once
//! all four parts arrived in order within the timeout; a broken sequence is
//! discarded whole. Data entry and parameter LSB CCs seen while no sequence is
//! pending are ordinary Control Changes and pass through.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::{cc, MidiMessage};

/// Default time allowed between the first and last CC of a sequence
pub const DEFAULT_NRPN_TIMEOUT_MS: u64 = 100;

/// One complete NRPN write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nrpn {
    /// MIDI channel (0-15)
    pub channel: u8,
    pub param_msb: u8,
    pub param_lsb: u8,
    pub value_msb: u8,
    pub value_lsb: u8,
}

impl Nrpn {
    /// The four Control Changes in wire order
    pub fn to_messages(&self) -> [MidiMessage; 4] {
        let ch = self.channel & 0x0F;
        [
            MidiMessage::ControlChange { channel: ch, cc: cc::NRPN_MSB, value: self.param_msb & 0x7F },
            MidiMessage::ControlChange { channel: ch, cc: cc::NRPN_LSB, value: self.param_lsb & 0x7F },
            MidiMessage::ControlChange { channel: ch, cc: cc::DATA_ENTRY_MSB, value: self.value_msb & 0x7F },
            MidiMessage::ControlChange { channel: ch, cc: cc::DATA_ENTRY_LSB, value: self.value_lsb & 0x7F },
        ]
    }

    /// Bytes for all four messages, concatenated
    pub fn encode(&self) -> Vec<u8> {
        self.to_messages().iter().flat_map(|m| m.encode()).collect()
    }
}

/// Result of feeding one message to the assembler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feed {
    /// Sequence completed
    Complete(Nrpn),
    /// Message consumed as part of a pending sequence
    Pending,
    /// Not part of any NRPN sequence; handle it as a plain message
    Passthrough(MidiMessage),
    /// Message belonged to a broken sequence; the sequence was dropped
    Discarded,
}

#[derive(Debug, Clone, Copy)]
struct Partial {
    started: Instant,
    param_msb: u8,
    param_lsb: Option<u8>,
    value_msb: Option<u8>,
}

/// Per-channel NRPN reassembly
#[derive(Debug)]
pub struct NrpnAssembler {
    timeout: Duration,
    pending: [Option<Partial>; 16],
}

impl NrpnAssembler {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            pending: [None; 16],
        }
    }

    /// Drop every partial sequence (used on disconnect)
    pub fn reset(&mut self) {
        self.pending = [None; 16];
    }

    /// Feed one inbound message, stamped with its arrival time
    pub fn feed(&mut self, msg: MidiMessage, now: Instant) -> Feed {
        let MidiMessage::ControlChange { channel, cc: number, value } = msg else {
            return Feed::Passthrough(msg);
        };
        let timeout = self.timeout;
        let slot = &mut self.pending[(channel & 0x0F) as usize];

        // Expire a sequence that sat too long before looking at the new CC
        let expired = slot.is_some_and(|p| now.duration_since(p.started) > timeout);
        if expired {
            debug!(channel, "NRPN sequence timed out, discarding");
            *slot = None;
        }

        match number {
            cc::NRPN_LSB | cc::DATA_ENTRY_MSB | cc::DATA_ENTRY_LSB if slot.is_none() => {
                if expired {
                    Feed::Discarded
                } else {
                    Feed::Passthrough(msg)
                }
            }
            cc::NRPN_MSB => {
                if slot.is_some() {
                    debug!(channel, "NRPN sequence restarted before completion");
                }
                *slot = Some(Partial {
                    started: now,
                    param_msb: value,
                    param_lsb: None,
                    value_msb: None,
                });
                Feed::Pending
            }
            cc::NRPN_LSB => match slot {
                Some(p) if p.param_lsb.is_none() => {
                    p.param_lsb = Some(value);
                    Feed::Pending
                }
                _ => Self::discard(slot, channel, "parameter LSB out of order"),
            },
            cc::DATA_ENTRY_MSB => match slot {
                Some(p) if p.param_lsb.is_some() && p.value_msb.is_none() => {
                    p.value_msb = Some(value);
                    Feed::Pending
                }
                _ => Self::discard(slot, channel, "data entry MSB out of order"),
            },
            cc::DATA_ENTRY_LSB => match *slot {
                Some(Partial {
                    param_msb,
                    param_lsb: Some(param_lsb),
                    value_msb: Some(value_msb),
                    ..
                }) => {
                    *slot = None;
                    let nrpn = Nrpn {
                        channel,
                        param_msb,
                        param_lsb,
                        value_msb,
                        value_lsb: value,
                    };
                    trace!(?nrpn, "NRPN sequence complete");
                    Feed::Complete(nrpn)
                }
                _ => Self::discard(slot, channel, "data entry LSB out of order"),
            },
            _ => Feed::Passthrough(msg),
        }
    }

    fn discard(slot: &mut Option<Partial>, channel: u8, reason: &str) -> Feed {
        debug!(channel, reason, "Discarding NRPN sequence");
        *slot = None;
        Feed::Discarded
    }
}

#[cfg(test)]
impl NrpnAssembler {
    fn has_pending(&self) -> bool {
        self.pending.iter().any(Option::is_some)
    }
}

impl Default for NrpnAssembler {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_NRPN_TIMEOUT_MS))
    }
}
