//! TP-UART Transceiver Driver
//!
//! Host side of the serial protocol spoken by TP-UART bus couplers:
//! - Reset handshake with bounded retries
//! - Individual address setup and state requests
//! - Address evaluation of incoming frames with an in-time acknowledge
//! - Byte-by-byte transmission with data confirm and timeout
//! - Raw bus monitor mode
//!
//! # Architecture
//!
//! ```text
//! tpuart
//!     ├── TpUart (RX/TX state machines, event queue)
//!     ├── types (states, events, outcomes)
//!     └── constants (service codes, timing)
//! ```

pub mod constants;
mod engine;
mod types;

pub use engine::{TpUart, TpUartTiming};
pub use types::{
    MonitorData, ReceptionError, RxState, StateIndication, TpUartEvent, TpUartMode, TxAck,
    TxState,
};
