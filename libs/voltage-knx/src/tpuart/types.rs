//! TP-UART states, events and outcomes

use std::fmt;

use serde::{Deserialize, Serialize};

use super::constants::{
    STATE_PROTOCOL_ERROR, STATE_RECEIVE_ERROR, STATE_SLAVE_COLLISION, STATE_TEMPERATURE_WARNING,
    STATE_TRANSMIT_ERROR,
};
use crate::telegram::Telegram;

/// Transceiver working mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TpUartMode {
    #[default]
    Normal,
    /// Raw bus bytes are passed to the host, no address evaluation
    BusMonitor,
}

/// Receive state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RxState {
    /// Awaiting reset
    Reset,
    /// Device reset seen, reception stopped
    Stopped,
    /// Awaiting init
    Init,
    /// Waiting for a control field
    Idle,
    /// Telegram started, destination not evaluated yet
    FrameStarted,
    /// Telegram addressed to a local object
    FrameAddressed,
    /// Addressed telegram longer than the maximum size
    FrameLengthInvalid,
    /// Telegram for someone else (or sent by us)
    FrameNotAddressed,
}

/// Transmit state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TxState {
    Reset,
    Stopped,
    Init,
    Idle,
    Sending,
    WaitingAck,
}

/// Outcome of one transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxAck {
    /// Positive data confirm
    Ack,
    /// Negative data confirm (repetitions exhausted)
    Nack,
    /// No confirm within the ack timeout
    Timeout,
    /// Device reset before any confirm
    Reset,
}

/// Why an addressed reception was discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReceptionError {
    /// End of packet before the routing field
    Incomplete,
    /// More bytes than the maximum telegram size
    Oversize,
    BadChecksum,
}

/// Notification produced by the engine, drained by the owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TpUartEvent {
    /// Device reset indication received, RX and TX stopped
    Reset,
    /// Addressed telegram with a correct checksum
    TelegramReceived {
        telegram: Telegram,
        object_index: usize,
    },
    ReceptionError(ReceptionError),
    /// New state indication byte (see [`StateIndication`])
    StateIndication(u8),
    /// Outcome of the last accepted send
    TxAck(TxAck),
}

/// Data read in bus monitor mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitorData {
    Byte(u8),
    /// Gap longer than the end-of-packet delay after the last byte
    EndOfPacket,
}

/// Decoded state indication byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StateIndication(pub u8);

impl StateIndication {
    pub fn slave_collision(self) -> bool {
        self.0 & STATE_SLAVE_COLLISION != 0
    }

    pub fn receive_error(self) -> bool {
        self.0 & STATE_RECEIVE_ERROR != 0
    }

    pub fn transmit_error(self) -> bool {
        self.0 & STATE_TRANSMIT_ERROR != 0
    }

    pub fn protocol_error(self) -> bool {
        self.0 & STATE_PROTOCOL_ERROR != 0
    }

    pub fn temperature_warning(self) -> bool {
        self.0 & STATE_TEMPERATURE_WARNING != 0
    }

    pub fn has_error(self) -> bool {
        self.0
            & (STATE_SLAVE_COLLISION
                | STATE_RECEIVE_ERROR
                | STATE_TRANSMIT_ERROR
                | STATE_PROTOCOL_ERROR
                | STATE_TEMPERATURE_WARNING)
            != 0
    }
}

impl fmt::Display for StateIndication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.has_error() {
            return write!(f, "OK");
        }
        let flags = [
            (self.slave_collision(), "SLAVE_COLLISION"),
            (self.receive_error(), "RX_ERROR"),
            (self.transmit_error(), "TX_ERROR"),
            (self.protocol_error(), "PROTOCOL_ERROR"),
            (self.temperature_warning(), "TEMP_WARNING"),
        ];
        let names: Vec<&str> = flags
            .iter()
            .filter(|(set, _)| *set)
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&names.join("|"))
    }
}
