//! KNX bus device
//!
//! Owns the communication objects, the action queue and the TP-UART engine,
//! and runs them from a single [`KnxDevice::task`] call that the application
//! invokes as often as it can (at least every 400 µs).
//!
//! Each tick runs, in order:
//! 1. start-up reads of init-read objects (one every 500 ms)
//! 2. RX poll (every 400 µs)
//! 3. dispatch of one queued action while nothing is being sent
//! 4. TX poll (every 800 µs)
//! 5. engine notifications
//!
//! Notifications are handled last, so a read request received in a tick is
//! answered by a response dispatched on a later tick.

use std::collections::vec_deque::Drain;
use std::collections::VecDeque;

use tracing::{debug, error, info, trace, warn};

use crate::action_queue::{ActionKind, ActionQueue, ActionValue, PendingAction, QueueStats};
use crate::address::IndividualAddress;
use crate::com_object::{ComObject, ObjectFlags};
use crate::config::{DeviceConfig, TimingConfig};
use crate::dpt::NumericValue;
use crate::error::{KnxError, Result};
use crate::link::{elapsed, Clock, SerialLink};
use crate::telegram::{Command, Telegram, LONG_PAYLOAD_MAX_SIZE};
use crate::tpuart::{StateIndication, TpUart, TpUartEvent, TpUartMode, TxAck, TxState};

/// Device scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceState {
    /// Transceiver bring-up in progress (or device stopped)
    Init,
    Idle,
    /// A telegram was handed to the transceiver, outcome pending
    TxOngoing,
}

#[derive(Debug, Clone, Copy, Default)]
struct InitReadProgress {
    completed: bool,
    next_index: usize,
    last_request_ms: u64,
}

/// KNX device running on a TP-UART transceiver
pub struct KnxDevice<L: SerialLink, C: Clock> {
    tpuart: TpUart<L, C>,
    objects: Vec<ComObject>,
    actions: ActionQueue,
    state: DeviceState,
    started: bool,
    /// Set once bring-up succeeded; later resets retry forever
    hot_reset: bool,
    timing: TimingConfig,
    init_read: InitReadProgress,
    last_rx_us: u64,
    last_tx_us: u64,
    tx_telegram: Telegram,
    updates: VecDeque<usize>,
}

impl<L: SerialLink, C: Clock> KnxDevice<L, C> {
    pub fn new(
        link: L,
        clock: C,
        physical_address: IndividualAddress,
        objects: Vec<ComObject>,
    ) -> Self {
        Self::with_settings(
            link,
            clock,
            physical_address,
            objects,
            TimingConfig::default(),
            ActionQueue::default(),
        )
    }

    /// Device from a loaded configuration. Bus monitor mode is a transceiver
    /// mode only and is refused here.
    pub fn from_config(link: L, clock: C, config: &DeviceConfig) -> Result<Self> {
        if config.mode != TpUartMode::Normal {
            return Err(KnxError::config(
                "bus_monitor mode cannot run a device, use the transceiver directly",
            ));
        }
        config.validate()?;
        Ok(Self::with_settings(
            link,
            clock,
            config.physical_address,
            config.com_objects(),
            config.timing,
            ActionQueue::new(config.action_queue_capacity),
        ))
    }

    fn with_settings(
        link: L,
        clock: C,
        physical_address: IndividualAddress,
        objects: Vec<ComObject>,
        timing: TimingConfig,
        actions: ActionQueue,
    ) -> Self {
        let tpuart = TpUart::new(link, clock, physical_address, TpUartMode::Normal)
            .with_timing(timing.tpuart());
        Self {
            tpuart,
            objects,
            actions,
            state: DeviceState::Init,
            started: false,
            hot_reset: false,
            timing,
            init_read: InitReadProgress::default(),
            last_rx_us: 0,
            last_tx_us: 0,
            tx_telegram: Telegram::new(),
            updates: VecDeque::new(),
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start bring-up; [`task`](Self::task) completes it
    pub fn begin(&mut self) -> Result<()> {
        info!(
            "Starting KNX device {} with {} objects",
            self.tpuart.physical_address(),
            self.objects.len()
        );
        self.state = DeviceState::Init;
        self.hot_reset = false;
        self.init_read = InitReadProgress::default();
        self.tpuart.reset()?;
        self.started = true;
        Ok(())
    }

    /// Stop the device, dropping queued actions
    pub fn end(&mut self) {
        self.tpuart.shutdown();
        self.actions.clear();
        self.updates.clear();
        self.init_read = InitReadProgress::default();
        self.state = DeviceState::Init;
        self.started = false;
        self.hot_reset = false;
        info!("KNX device stopped");
    }

    /// Run one scheduler tick
    pub fn task(&mut self) -> Result<()> {
        if !self.started {
            return Err(KnxError::NotStarted);
        }
        if self.state == DeviceState::Init {
            return self.bring_up();
        }

        let now_us = self.tpuart.clock().now_micros();
        let now_ms = now_us / 1000;

        if !self.init_read.completed
            && elapsed(now_ms, self.init_read.last_request_ms) > self.timing.init_read_interval_ms
        {
            self.request_next_init_read(now_ms);
        }

        if elapsed(now_us, self.last_rx_us) > self.timing.rx_poll_interval_us {
            self.tpuart.rx_task()?;
            self.last_rx_us = now_us;
        }

        if self.state == DeviceState::Idle && self.tpuart.tx_state() == TxState::Idle {
            if let Some(action) = self.actions.pop() {
                self.dispatch(action)?;
            }
        }

        if elapsed(now_us, self.last_tx_us) > self.timing.tx_poll_interval_us {
            self.tpuart.tx_task()?;
            self.last_tx_us = now_us;
        }

        self.process_events()
    }

    fn bring_up(&mut self) -> Result<()> {
        match self.tpuart.poll_reset() {
            Ok(false) => Ok(()),
            Ok(true) => {
                self.tpuart.attach_objects(&self.objects)?;
                self.tpuart.init()?;
                let now_us = self.tpuart.clock().now_micros();
                self.last_rx_us = now_us;
                self.last_tx_us = now_us;
                if !self.hot_reset {
                    self.init_read.last_request_ms = now_us / 1000;
                }
                self.hot_reset = true;
                self.state = DeviceState::Idle;
                info!("KNX device ready");
                Ok(())
            }
            Err(KnxError::ResetFailed { attempts }) if self.hot_reset => {
                error!(
                    "Transceiver silent after {} reset requests, retrying",
                    attempts
                );
                self.tpuart.reset()
            }
            Err(e) => {
                self.started = false;
                Err(e)
            }
        }
    }

    fn request_next_init_read(&mut self, now_ms: u64) {
        let next = self.objects[self.init_read.next_index.min(self.objects.len())..]
            .iter()
            .position(|o| o.flags().contains(ObjectFlags::INIT_READ) && !o.is_valid())
            .map(|offset| self.init_read.next_index + offset);

        match next {
            Some(index) => {
                debug!("Start-up read of object {}", index);
                self.actions.append(PendingAction::read(index));
                self.init_read.next_index = index + 1;
                self.init_read.last_request_ms = now_ms;
            }
            None => {
                debug!("Start-up reads complete");
                self.init_read.completed = true;
            }
        }
    }

    // ========================================================================
    // Action dispatch
    // ========================================================================

    fn dispatch(&mut self, action: PendingAction) -> Result<()> {
        let Some(object) = self.objects.get_mut(action.index) else {
            warn!("Dropping {:?}, no object {}", action.kind, action.index);
            return Ok(());
        };
        trace!("Dispatching {:?} for object {}", action.kind, action.index);

        let command = match action.kind {
            ActionKind::ReadRequest => Command::ValueRead,
            ActionKind::ResponseRequest => Command::ValueResponse,
            ActionKind::WriteRequest => {
                let applied = match action.value {
                    ActionValue::Short(value) => object.update_value(value),
                    ActionValue::Long { .. } => object.update_bytes(action.value.as_bytes()),
                    ActionValue::None => {
                        warn!("Dropping write to object {} without a value", action.index);
                        return Ok(());
                    }
                };
                if let Err(e) = applied {
                    warn!("Write to object {} rejected: {}", action.index, e);
                    return Ok(());
                }
                if !object.flags().contains(ObjectFlags::TRANSMIT) {
                    return Ok(());
                }
                Command::ValueWrite
            }
        };

        let telegram = &mut self.tx_telegram;
        telegram.clear();
        object.copy_attributes(telegram);
        if command == Command::ValueRead {
            telegram.clear_long_payload();
            telegram.clear_first_payload_byte();
        } else {
            object.copy_value(telegram);
        }
        telegram.set_command(command);
        telegram.update_checksum();

        match self.tpuart.send(&self.tx_telegram) {
            Ok(()) => {
                self.state = DeviceState::TxOngoing;
                Ok(())
            }
            Err(KnxError::TxNotAvailable) => {
                warn!("Transmitter busy, {:?} for object {} dropped", action.kind, action.index);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    // ========================================================================
    // Engine notifications
    // ========================================================================

    fn process_events(&mut self) -> Result<()> {
        while let Some(event) = self.tpuart.next_event() {
            match event {
                TpUartEvent::TelegramReceived {
                    telegram,
                    object_index,
                } => self.on_telegram(&telegram, object_index),
                TpUartEvent::ReceptionError(reason) => {
                    debug!("Reception discarded: {:?}", reason);
                }
                TpUartEvent::StateIndication(byte) => {
                    trace!("State indication {}", StateIndication(byte));
                }
                TpUartEvent::TxAck(ack) => {
                    if ack != TxAck::Ack {
                        warn!("Transmission ended with {:?}", ack);
                    }
                    self.state = DeviceState::Idle;
                }
                TpUartEvent::Reset => {
                    warn!("Transceiver reset, re-running bring-up");
                    self.state = DeviceState::Init;
                    self.tpuart.reset()?;
                }
            }
        }
        Ok(())
    }

    fn on_telegram(&mut self, telegram: &Telegram, index: usize) {
        let Some(flags) = self.objects.get(index).map(ComObject::flags) else {
            warn!("Telegram for unknown object {}", index);
            return;
        };
        match telegram.command() {
            Some(Command::ValueRead) if flags.contains(ObjectFlags::READ) => {
                self.actions.append(PendingAction::response(index));
            }
            Some(Command::ValueResponse) if flags.contains(ObjectFlags::UPDATE) => {
                self.apply_bus_value(telegram, index);
            }
            Some(Command::ValueWrite) if flags.contains(ObjectFlags::WRITE) => {
                self.apply_bus_value(telegram, index);
            }
            command => trace!("Ignoring {:?} for object {} ({})", command, index, flags),
        }
    }

    fn apply_bus_value(&mut self, telegram: &Telegram, index: usize) {
        let Some(object) = self.objects.get_mut(index) else {
            return;
        };
        match object.update_from_telegram(telegram) {
            Ok(()) => {
                debug!("Object {} updated from bus: {:02X?}", index, object.value_bytes());
                self.updates.push_back(index);
            }
            Err(e) => warn!("Object {} not updated: {}", index, e),
        }
    }

    // ========================================================================
    // Application API
    // ========================================================================

    fn object_checked(&self, index: usize) -> Result<&ComObject> {
        self.objects.get(index).ok_or(KnxError::ObjectNotFound(index))
    }

    /// Short value of an object (payload length <= 2)
    pub fn read(&self, index: usize) -> Result<u8> {
        let object = self.object_checked(index)?;
        if object.is_long() {
            return Err(KnxError::LengthMismatch {
                expected: object.value_len(),
                actual: 1,
            });
        }
        Ok(object.value())
    }

    /// Value bytes of a long object (payload length > 2)
    pub fn read_long(&self, index: usize) -> Result<&[u8]> {
        let object = self.object_checked(index)?;
        if !object.is_long() {
            return Err(KnxError::LengthMismatch {
                expected: 1,
                actual: object.value_len(),
            });
        }
        Ok(object.value_bytes())
    }

    /// Decoded value of a numeric datapoint
    pub fn read_numeric(&self, index: usize) -> Result<NumericValue> {
        let object = self.object_checked(index)?;
        let kind = object
            .dpt()
            .numeric_kind()
            .ok_or_else(|| KnxError::UnsupportedDpt(object.dpt().to_string()))?;
        NumericValue::decode(kind, object.value_bytes())
    }

    /// Queue a short value write
    pub fn write(&mut self, index: usize, value: u8) -> Result<()> {
        let object = self.object_checked(index)?;
        if object.is_long() {
            return Err(KnxError::LengthMismatch {
                expected: object.value_len(),
                actual: 1,
            });
        }
        self.actions.append(PendingAction::write(index, value));
        Ok(())
    }

    /// Queue a long value write; `value` must match the object width
    pub fn write_long(&mut self, index: usize, value: &[u8]) -> Result<()> {
        let object = self.object_checked(index)?;
        if !object.is_long() || value.len() != object.value_len() {
            return Err(KnxError::LengthMismatch {
                expected: object.value_len(),
                actual: value.len(),
            });
        }
        self.actions.append(PendingAction::write_long(index, value));
        Ok(())
    }

    /// Encode a number with the object's datapoint encoding and queue it
    pub fn write_numeric(&mut self, index: usize, value: f64) -> Result<()> {
        let object = self.object_checked(index)?;
        let kind = object
            .dpt()
            .numeric_kind()
            .ok_or_else(|| KnxError::UnsupportedDpt(object.dpt().to_string()))?;
        let mut buf = [0u8; LONG_PAYLOAD_MAX_SIZE];
        let len = NumericValue::from_f64(kind, value)?.encode(&mut buf)?;
        self.write_long(index, &buf[..len])
    }

    /// Queue a bus read of the object's value
    pub fn update(&mut self, index: usize) -> Result<()> {
        self.object_checked(index)?;
        self.actions.append(PendingAction::read(index));
        Ok(())
    }

    /// Work pending: transceiver busy, send outstanding or actions queued
    pub fn is_active(&self) -> bool {
        self.tpuart.is_active() || self.state == DeviceState::TxOngoing || !self.actions.is_empty()
    }

    /// Indices of objects updated from the bus, oldest first
    pub fn drain_updates(&mut self) -> Drain<'_, usize> {
        self.updates.drain(..)
    }

    /// Last state indication reported by the transceiver
    pub fn state_indication(&self) -> StateIndication {
        StateIndication(self.tpuart.state_indication())
    }

    pub fn request_state(&mut self) -> Result<()> {
        self.tpuart.request_state()
    }

    pub fn object(&self, index: usize) -> Option<&ComObject> {
        self.objects.get(index)
    }

    pub fn objects(&self) -> &[ComObject] {
        &self.objects
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.actions.stats()
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn tpuart(&self) -> &TpUart<L, C> {
        &self.tpuart
    }
}
