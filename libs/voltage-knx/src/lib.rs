//! VoltageEMS KNX TP-UART Stack
//!
//! Turns a host with a UART-attached TP-UART transceiver into a node on a
//! KNX twisted-pair bus. Everything is poll-driven: the application calls
//! [`KnxDevice::task`] in a loop and all waiting is expressed as elapsed-time
//! checks, so nothing here blocks.
//!
//! # Features
//!
//! - `serial` - [`UartLink`] over a real serial port (`tokio-serial`)
//!
//! # Architecture
//!
//! ```text
//! voltage-knx
//!     ├── KnxDevice (bring-up, polling cadence, action dispatch)
//!     │     ├── ActionQueue (bounded, overwrite-oldest)
//!     │     └── ComObject (application values and capability flags)
//!     ├── TpUart (RX/TX state machines, bus monitor)
//!     │     └── AddressIndex (group address -> object index)
//!     ├── Telegram (frame codec, checksum, validity)
//!     ├── dpt (datapoint formats, numeric codec)
//!     └── link (SerialLink / Clock seams, sim for tests)
//! ```
//!
//! # Example
//!
//! ```
//! use voltage_knx::sim::{ManualClock, MemoryLink};
//! use voltage_knx::{ComObject, Dpt, KnxDevice, ObjectFlags};
//!
//! let link = MemoryLink::new();
//! let clock = ManualClock::new();
//! let objects = vec![ComObject::new(
//!     "1/0/1".parse().unwrap(),
//!     Dpt::SWITCH,
//!     ObjectFlags::SENSOR,
//! )];
//! let mut device = KnxDevice::new(link.clone(), clock.clone(), "1.1.1".parse().unwrap(), objects);
//!
//! device.begin().unwrap();
//! link.add_read_data(&[0x03]); // reset indication
//! device.task().unwrap();
//! device.write(0, 1).unwrap();
//! ```

pub mod action_queue;
pub mod address;
pub mod address_index;
pub mod com_object;
pub mod config;
pub mod device;
pub mod dpt;
pub mod error;
pub mod link;
pub mod sim;
pub mod telegram;
pub mod tpuart;

pub use action_queue::{ActionKind, ActionQueue, ActionValue, PendingAction, QueueStats};
pub use address::{GroupAddress, IndividualAddress};
pub use address_index::AddressIndex;
pub use com_object::{ComObject, ObjectFlags};
pub use config::{DeviceConfig, ObjectConfig, SerialConfig, TimingConfig};
pub use device::{DeviceState, KnxDevice};
pub use dpt::{Dpt, DptFormat, NumericKind, NumericValue};
pub use error::{KnxError, Result};
pub use link::{Clock, SerialLink, SystemClock};
pub use telegram::{Command, Priority, Telegram, TelegramValidity};
pub use tpuart::{
    MonitorData, ReceptionError, RxState, StateIndication, TpUart, TpUartEvent, TpUartMode,
    TpUartTiming, TxAck, TxState,
};

#[cfg(feature = "serial")]
pub use link::UartLink;
