//! TP-UART transceiver engine
//!
//! Drives the receive and transmit state machines over a non-blocking
//! [`SerialLink`]. Nothing here waits: end of packet, acknowledge timeout
//! and reset retries are all elapsed-time checks evaluated on each poll.
//!
//! ```text
//! RX:  Idle ──frame start──▶ FrameStarted ──byte 3: own source──▶ FrameNotAddressed
//!                                 │
//!                                 └──byte 6: lookup──▶ FrameAddressed  (ACK 0x11 written)
//!                                                  └─▶ FrameNotAddressed (ACK 0x10 written)
//!      any frame state ──gap > EOP──▶ Idle (+ event)
//!
//! TX:  Idle ──send()──▶ Sending ──last byte──▶ WaitingAck ──confirm/timeout──▶ Idle
//! ```
//!
//! Notifications are queued and handed out by [`TpUart::next_event`].

use std::collections::VecDeque;

use tracing::{debug, error, info, trace, warn};

use super::constants::*;
use super::types::{
    MonitorData, ReceptionError, RxState, StateIndication, TpUartEvent, TpUartMode, TxAck,
    TxState,
};
use crate::address::IndividualAddress;
use crate::address_index::AddressIndex;
use crate::com_object::ComObject;
use crate::error::{KnxError, Result};
use crate::link::{elapsed, Clock, SerialLink};
use crate::telegram::{Telegram, TELEGRAM_MAX_SIZE};

/// Engine timing parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TpUartTiming {
    pub eop_gap_us: u64,
    pub ack_timeout_ms: u64,
    pub reset_attempts: u32,
    pub reset_attempt_timeout_ms: u64,
}

impl Default for TpUartTiming {
    fn default() -> Self {
        Self {
            eop_gap_us: EOP_GAP_US,
            ack_timeout_ms: ACK_TIMEOUT_MS,
            reset_attempts: RESET_ATTEMPTS,
            reset_attempt_timeout_ms: RESET_ATTEMPT_TIMEOUT_MS,
        }
    }
}

#[derive(Debug)]
struct RxContext {
    state: RxState,
    /// Telegram being assembled
    building: Telegram,
    byte_count: usize,
    last_byte_us: u64,
    pending_index: usize,
    /// Last telegram published
    received: Telegram,
    object_index: usize,
}

#[derive(Debug)]
struct TxContext {
    state: TxState,
    telegram: Telegram,
    remaining: usize,
    byte_index: usize,
    sent_ms: u64,
}

#[derive(Debug, Clone, Copy)]
struct ResetProgress {
    attempts: u32,
    last_request_ms: u64,
}

#[derive(Debug)]
struct MonitorContext {
    eop_reported: bool,
    last_byte_us: u64,
}

/// TP-UART driver
pub struct TpUart<L: SerialLink, C: Clock> {
    link: L,
    clock: C,
    physical_address: IndividualAddress,
    mode: TpUartMode,
    timing: TpUartTiming,
    rx: RxContext,
    tx: TxContext,
    index: AddressIndex,
    events: VecDeque<TpUartEvent>,
    state_indication: u8,
    reset_progress: Option<ResetProgress>,
    monitor: MonitorContext,
}

impl<L: SerialLink, C: Clock> TpUart<L, C> {
    pub fn new(link: L, clock: C, physical_address: IndividualAddress, mode: TpUartMode) -> Self {
        Self {
            link,
            clock,
            physical_address,
            mode,
            timing: TpUartTiming::default(),
            rx: RxContext {
                state: RxState::Reset,
                building: Telegram::new(),
                byte_count: 0,
                last_byte_us: 0,
                pending_index: 0,
                received: Telegram::new(),
                object_index: 0,
            },
            tx: TxContext {
                state: TxState::Reset,
                telegram: Telegram::new(),
                remaining: 0,
                byte_index: 0,
                sent_ms: 0,
            },
            index: AddressIndex::default(),
            events: VecDeque::new(),
            state_indication: 0,
            reset_progress: None,
            monitor: MonitorContext {
                eop_reported: true,
                last_byte_us: 0,
            },
        }
    }

    pub fn with_timing(mut self, timing: TpUartTiming) -> Self {
        self.timing = timing;
        self
    }

    // ========================================================================
    // Bring-up
    // ========================================================================

    /// Send the reset request; follow with [`poll_reset`](Self::poll_reset).
    /// A reset of a running transceiver drops the link buffers first.
    pub fn reset(&mut self) -> Result<()> {
        if self.rx.state > RxState::Reset || self.tx.state > TxState::Reset {
            info!("TP-UART hot reset");
            self.link.reset_link()?;
            self.rx.state = RxState::Reset;
            self.tx.state = TxState::Reset;
        }
        self.link.write_bytes(&[RESET_REQ])?;
        self.reset_progress = Some(ResetProgress {
            attempts: 1,
            last_request_ms: self.clock.now_millis(),
        });
        debug!("TP-UART reset request sent (attempt 1/{})", self.timing.reset_attempts);
        Ok(())
    }

    /// Advance the reset handshake. `Ok(true)` once the reset indication
    /// arrived and RX/TX are in their init state.
    pub fn poll_reset(&mut self) -> Result<bool> {
        let Some(mut progress) = self.reset_progress else {
            return Ok(self.rx.state >= RxState::Init);
        };

        while self.link.available()? > 0 {
            match self.link.read_byte()? {
                Some(RESET_INDICATION) => {
                    self.reset_progress = None;
                    self.rx.state = RxState::Init;
                    self.tx.state = TxState::Init;
                    info!(
                        "TP-UART reset indication received after {} attempt(s)",
                        progress.attempts
                    );
                    return Ok(true);
                }
                Some(byte) => trace!("Ignoring byte {:#04X} while waiting for reset", byte),
                None => break,
            }
        }

        let now = self.clock.now_millis();
        if elapsed(now, progress.last_request_ms) >= self.timing.reset_attempt_timeout_ms {
            if progress.attempts >= self.timing.reset_attempts {
                self.reset_progress = None;
                error!(
                    "TP-UART did not answer {} reset requests",
                    progress.attempts
                );
                return Err(KnxError::ResetFailed {
                    attempts: progress.attempts,
                });
            }
            self.link.write_bytes(&[RESET_REQ])?;
            progress.attempts += 1;
            progress.last_request_ms = now;
            debug!(
                "TP-UART reset request sent (attempt {}/{})",
                progress.attempts, self.timing.reset_attempts
            );
            self.reset_progress = Some(progress);
        }
        Ok(false)
    }

    /// Index the communication objects for address evaluation (init state only)
    pub fn attach_objects(&mut self, objects: &[ComObject]) -> Result<()> {
        self.require_init_state()?;
        self.index = AddressIndex::build(objects);
        Ok(())
    }

    /// Configure the transceiver after a reset.
    /// Normal mode sets the individual address and requests the state;
    /// bus monitor mode activates monitoring.
    pub fn init(&mut self) -> Result<()> {
        self.require_init_state()?;
        match self.mode {
            TpUartMode::BusMonitor => {
                self.link.write_bytes(&[ACTIVATE_BUSMON_REQ])?;
                info!("TP-UART bus monitor mode activated");
            }
            TpUartMode::Normal => {
                let [hi, lo] = self.physical_address.raw().to_be_bytes();
                self.link.write_bytes(&[SET_ADDR_REQ, hi, lo])?;
                self.link.write_bytes(&[STATE_REQ])?;
                self.rx.state = RxState::Idle;
                self.tx.state = TxState::Idle;
                info!(
                    "TP-UART initialized, individual address {}",
                    self.physical_address
                );
            }
        }
        Ok(())
    }

    /// Return to the power-on state, dropping any transfer in progress
    pub fn shutdown(&mut self) {
        self.rx.state = RxState::Reset;
        self.tx.state = TxState::Reset;
        self.reset_progress = None;
        self.events.clear();
        debug!("TP-UART stopped");
    }

    fn require_init_state(&self) -> Result<()> {
        if self.rx.state != RxState::Init || self.tx.state != TxState::Init {
            return Err(KnxError::NotInitState);
        }
        Ok(())
    }

    // ========================================================================
    // Transmission
    // ========================================================================

    /// Queue a telegram for transmission. The source address is forced to
    /// the individual address of this node.
    pub fn send(&mut self, telegram: &Telegram) -> Result<()> {
        if self.tx.state != TxState::Idle {
            return Err(KnxError::TxNotAvailable);
        }
        let mut outgoing = *telegram;
        let own = self.physical_address.raw();
        if outgoing.source() != own {
            outgoing.set_source(own);
            outgoing.update_checksum();
        }
        debug!("TX start: {}", outgoing.verbose());
        self.tx.telegram = outgoing;
        self.tx.remaining = outgoing.len().min(TELEGRAM_MAX_SIZE);
        self.tx.byte_index = 0;
        self.tx.state = TxState::Sending;
        Ok(())
    }

    /// Push the next telegram byte, or check the acknowledge timeout
    pub fn tx_task(&mut self) -> Result<()> {
        match self.tx.state {
            TxState::WaitingAck => {
                let now = self.clock.now_millis();
                if elapsed(now, self.tx.sent_ms) > self.timing.ack_timeout_ms {
                    warn!(
                        "No data confirm within {} ms, transmission timed out",
                        self.timing.ack_timeout_ms
                    );
                    self.tx.state = TxState::Idle;
                    self.events.push_back(TpUartEvent::TxAck(TxAck::Timeout));
                }
            }
            TxState::Sending => {
                // Hold back while a reception waits for its acknowledge
                if self.rx.state == RxState::FrameStarted {
                    trace!("TX paused, reception in progress");
                    return Ok(());
                }
                let index = self.tx.byte_index;
                let byte = self.tx.telegram.raw()[index];
                if self.tx.remaining <= 1 {
                    self.link.write_bytes(&[DATA_END_REQ + index as u8, byte])?;
                    self.tx.sent_ms = self.clock.now_millis();
                    self.tx.state = TxState::WaitingAck;
                    trace!("TX end byte[{}] = {:#04X}, waiting for confirm", index, byte);
                } else {
                    self.link
                        .write_bytes(&[DATA_START_CONTINUE_REQ + index as u8, byte])?;
                    self.tx.byte_index += 1;
                    self.tx.remaining -= 1;
                    trace!("TX byte[{}] = {:#04X}", index, byte);
                }
            }
            _ => {}
        }
        Ok(())
    }

    // ========================================================================
    // Reception
    // ========================================================================

    /// Check for end of packet, then consume every byte waiting on the link
    pub fn rx_task(&mut self) -> Result<()> {
        self.check_end_of_packet();

        while self.link.available()? > 0 {
            let Some(byte) = self.link.read_byte()? else {
                break;
            };
            self.rx.last_byte_us = self.clock.now_micros();
            if !self.handle_rx_byte(byte)? {
                break;
            }
        }
        Ok(())
    }

    fn check_end_of_packet(&mut self) {
        if self.rx.state < RxState::FrameStarted {
            return;
        }
        let now = self.clock.now_micros();
        if elapsed(now, self.rx.last_byte_us) <= self.timing.eop_gap_us {
            return;
        }

        match self.rx.state {
            RxState::FrameStarted => {
                debug!("EOP after {} bytes, telegram incomplete", self.rx.byte_count);
                self.events
                    .push_back(TpUartEvent::ReceptionError(ReceptionError::Incomplete));
            }
            RxState::FrameLengthInvalid => {
                debug!("EOP on oversize telegram");
                self.events
                    .push_back(TpUartEvent::ReceptionError(ReceptionError::Oversize));
            }
            RxState::FrameAddressed => {
                if self.rx.building.is_checksum_correct() {
                    self.rx.received = self.rx.building;
                    self.rx.object_index = self.rx.pending_index;
                    debug!(
                        "RX telegram for object {}: {}",
                        self.rx.object_index,
                        self.rx.received.verbose()
                    );
                    self.events.push_back(TpUartEvent::TelegramReceived {
                        telegram: self.rx.received,
                        object_index: self.rx.object_index,
                    });
                } else {
                    debug!("RX checksum error: {:?}", self.rx.building);
                    self.events
                        .push_back(TpUartEvent::ReceptionError(ReceptionError::BadChecksum));
                }
            }
            _ => {}
        }
        self.rx.state = RxState::Idle;
    }

    /// Returns false when reading must stop (device reset)
    fn handle_rx_byte(&mut self, byte: u8) -> Result<bool> {
        trace!("RX byte {:#04X} in {:?}", byte, self.rx.state);
        match self.rx.state {
            RxState::Idle => return self.handle_service_byte(byte),
            RxState::FrameStarted => {
                self.store_rx_byte(byte);
                if self.rx.byte_count == SOURCE_COMPLETE_COUNT {
                    if self.rx.building.source() == self.physical_address.raw() {
                        trace!("Own telegram echoed back, not addressed");
                        self.rx.state = RxState::FrameNotAddressed;
                    }
                } else if self.rx.byte_count == ROUTING_COMPLETE_COUNT {
                    let destination = self.rx.building.destination();
                    // The acknowledge is due within 1.7 ms of the routing byte
                    match self.index.lookup(destination) {
                        Some(object_index) => {
                            self.rx.pending_index = object_index;
                            self.rx.state = RxState::FrameAddressed;
                            self.link.write_bytes(&[RX_ACK_ADDRESSED])?;
                            debug!(
                                "Telegram to {:04X} addressed to object {}",
                                destination, object_index
                            );
                        }
                        None => {
                            self.rx.state = RxState::FrameNotAddressed;
                            self.link.write_bytes(&[RX_ACK_NOT_ADDRESSED])?;
                            trace!("Telegram to {:04X} not addressed", destination);
                        }
                    }
                }
            }
            RxState::FrameAddressed => {
                if self.rx.byte_count == TELEGRAM_MAX_SIZE {
                    warn!("Addressed telegram exceeds {} bytes", TELEGRAM_MAX_SIZE);
                    self.rx.state = RxState::FrameLengthInvalid;
                } else {
                    self.store_rx_byte(byte);
                }
            }
            // Reset, Stopped, Init, FrameLengthInvalid, FrameNotAddressed
            _ => {}
        }
        Ok(true)
    }

    fn store_rx_byte(&mut self, byte: u8) {
        self.rx.building.set_raw_byte(self.rx.byte_count, byte);
        self.rx.byte_count += 1;
    }

    fn handle_service_byte(&mut self, byte: u8) -> Result<bool> {
        if byte & FRAME_START_MASK == FRAME_START_PATTERN {
            self.rx.building = Telegram::from_bytes(&[byte]);
            self.rx.byte_count = 1;
            self.rx.state = RxState::FrameStarted;
        } else if byte == DATA_CONFIRM_SUCCESS {
            if self.tx.state == TxState::WaitingAck {
                debug!("TX confirmed");
                self.tx.state = TxState::Idle;
                self.events.push_back(TpUartEvent::TxAck(TxAck::Ack));
            } else {
                warn!("Unexpected positive confirm in TX state {:?}", self.tx.state);
            }
        } else if byte == RESET_INDICATION {
            if matches!(self.tx.state, TxState::Sending | TxState::WaitingAck) {
                self.events.push_back(TpUartEvent::TxAck(TxAck::Reset));
            }
            warn!("TP-UART reset indication received, RX/TX stopped");
            self.tx.state = TxState::Stopped;
            self.rx.state = RxState::Stopped;
            self.events.push_back(TpUartEvent::Reset);
            return Ok(false);
        } else if byte & STATE_INDICATION_MASK == STATE_INDICATION {
            let indication = StateIndication(byte);
            if indication.has_error() {
                warn!("TP-UART state indication: {}", indication);
            } else {
                debug!("TP-UART state indication: {}", indication);
            }
            self.state_indication = byte;
            self.events.push_back(TpUartEvent::StateIndication(byte));
        } else if byte == DATA_CONFIRM_FAILED {
            if self.tx.state == TxState::WaitingAck {
                warn!("TX not confirmed (NACK)");
                self.tx.state = TxState::Idle;
                self.events.push_back(TpUartEvent::TxAck(TxAck::Nack));
            } else {
                warn!("Unexpected negative confirm in TX state {:?}", self.tx.state);
            }
        } else if byte != 0 {
            // 0x00 precedes the reset indication at power-up
            warn!("Unknown TP-UART service byte {:#04X}", byte);
        }
        Ok(true)
    }

    // ========================================================================
    // Bus monitor
    // ========================================================================

    /// Next raw bus byte, or one end-of-packet marker after a quiet gap
    pub fn monitor_data(&mut self) -> Result<Option<MonitorData>> {
        let now = self.clock.now_micros();
        if !self.monitor.eop_reported
            && elapsed(now, self.monitor.last_byte_us) > self.timing.eop_gap_us
        {
            self.monitor.eop_reported = true;
            return Ok(Some(MonitorData::EndOfPacket));
        }

        if self.link.available()? > 0 {
            if let Some(byte) = self.link.read_byte()? {
                self.monitor.eop_reported = false;
                self.monitor.last_byte_us = now;
                return Ok(Some(MonitorData::Byte(byte)));
            }
        }
        Ok(None)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Oldest undelivered notification
    pub fn next_event(&mut self) -> Option<TpUartEvent> {
        self.events.pop_front()
    }

    /// Last state indication byte
    pub fn state_indication(&self) -> u8 {
        self.state_indication
    }

    /// Ask the transceiver for a fresh state indication
    pub fn request_state(&mut self) -> Result<()> {
        if self.rx.state < RxState::Idle {
            return Err(KnxError::NotStarted);
        }
        self.link.write_bytes(&[STATE_REQ])
    }

    /// Last telegram published by a `TelegramReceived` event
    pub fn received_telegram(&self) -> &Telegram {
        &self.rx.received
    }

    /// Object addressed by the last received telegram
    pub fn addressed_object_index(&self) -> usize {
        self.rx.object_index
    }

    /// Reception or transmission in progress
    pub fn is_active(&self) -> bool {
        self.rx.state > RxState::Idle || self.tx.state > TxState::Idle
    }

    pub fn rx_state(&self) -> RxState {
        self.rx.state
    }

    pub fn tx_state(&self) -> TxState {
        self.tx.state
    }

    pub fn mode(&self) -> TpUartMode {
        self.mode
    }

    pub fn physical_address(&self) -> IndividualAddress {
        self.physical_address
    }

    pub fn address_index(&self) -> &AddressIndex {
        &self.index
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::address::GroupAddress;
    use crate::com_object::ObjectFlags;
    use crate::dpt::Dpt;
    use crate::sim::{ManualClock, MemoryLink};
    use crate::telegram::Command;

    const OWN: u16 = 0x1101;

    type TestEngine = TpUart<MemoryLink, ManualClock>;

    fn ready_engine(objects: &[ComObject]) -> (TestEngine, MemoryLink, ManualClock) {
        let link = MemoryLink::new();
        let clock = ManualClock::new();
        let mut tpuart = TpUart::new(
            link.clone(),
            clock.clone(),
            IndividualAddress::from_raw(OWN),
            TpUartMode::Normal,
        );
        tpuart.reset().unwrap();
        link.add_read_data(&[RESET_INDICATION]);
        assert!(tpuart.poll_reset().unwrap());
        tpuart.attach_objects(objects).unwrap();
        tpuart.init().unwrap();
        link.take_written_data();
        (tpuart, link, clock)
    }

    fn telegram(source: u16, destination: u16) -> Telegram {
        let mut t = Telegram::new();
        t.set_source(source);
        t.set_destination(destination);
        t.set_command(Command::ValueWrite);
        t.set_first_payload_byte(1);
        t.update_checksum();
        t
    }

    fn objects() -> Vec<ComObject> {
        vec![ComObject::new(
            GroupAddress::from_raw(0x0801),
            Dpt::SWITCH,
            ObjectFlags::LOGIC_IN,
        )]
    }

    #[test]
    fn test_bring_up_sequence() {
        let link = MemoryLink::new();
        let clock = ManualClock::new();
        let mut tpuart = TpUart::new(
            link.clone(),
            clock.clone(),
            IndividualAddress::from_raw(OWN),
            TpUartMode::Normal,
        );
        assert_eq!(tpuart.init(), Err(KnxError::NotInitState));

        tpuart.reset().unwrap();
        assert_eq!(link.take_written_data(), vec![RESET_REQ]);
        assert!(!tpuart.poll_reset().unwrap());

        link.add_read_data(&[0x00, RESET_INDICATION]);
        assert!(tpuart.poll_reset().unwrap());
        assert_eq!(tpuart.rx_state(), RxState::Init);

        tpuart.init().unwrap();
        assert_eq!(
            link.take_written_data(),
            vec![SET_ADDR_REQ, 0x11, 0x01, STATE_REQ]
        );
        assert_eq!(tpuart.rx_state(), RxState::Idle);
        assert_eq!(tpuart.tx_state(), TxState::Idle);
    }

    #[test]
    fn test_reset_retries_then_fails() {
        let link = MemoryLink::new();
        let clock = ManualClock::new();
        let mut tpuart = TpUart::new(
            link.clone(),
            clock.clone(),
            IndividualAddress::from_raw(OWN),
            TpUartMode::Normal,
        )
        .with_timing(TpUartTiming {
            reset_attempts: 3,
            ..TpUartTiming::default()
        });

        tpuart.reset().unwrap();
        for _ in 0..2 {
            clock.advance_millis(1000);
            assert!(!tpuart.poll_reset().unwrap());
        }
        assert_eq!(link.take_written_data(), vec![RESET_REQ; 3]);

        clock.advance_millis(1000);
        assert_eq!(
            tpuart.poll_reset(),
            Err(KnxError::ResetFailed { attempts: 3 })
        );
    }

    #[test]
    fn test_bus_monitor_init() {
        let link = MemoryLink::new();
        let clock = ManualClock::new();
        let mut tpuart = TpUart::new(
            link.clone(),
            clock.clone(),
            IndividualAddress::from_raw(OWN),
            TpUartMode::BusMonitor,
        );
        tpuart.reset().unwrap();
        link.add_read_data(&[RESET_INDICATION]);
        assert!(tpuart.poll_reset().unwrap());
        link.take_written_data();
        tpuart.init().unwrap();
        assert_eq!(link.take_written_data(), vec![ACTIVATE_BUSMON_REQ]);

        link.add_read_data(&[0xBC, 0x11]);
        assert_eq!(tpuart.monitor_data().unwrap(), Some(MonitorData::Byte(0xBC)));
        assert_eq!(tpuart.monitor_data().unwrap(), Some(MonitorData::Byte(0x11)));
        assert_eq!(tpuart.monitor_data().unwrap(), None);
        clock.advance_micros(2001);
        assert_eq!(tpuart.monitor_data().unwrap(), Some(MonitorData::EndOfPacket));
        clock.advance_micros(5000);
        assert_eq!(tpuart.monitor_data().unwrap(), None);
    }

    #[test]
    fn test_addressed_telegram_published_after_eop() {
        let (mut tpuart, link, clock) = ready_engine(&objects());
        let t = telegram(0x1102, 0x0801);
        link.add_read_data(t.as_bytes());

        tpuart.rx_task().unwrap();
        assert_eq!(tpuart.rx_state(), RxState::FrameAddressed);
        assert_eq!(link.take_written_data(), vec![RX_ACK_ADDRESSED]);
        assert!(tpuart.next_event().is_none());

        clock.advance_micros(2000);
        tpuart.rx_task().unwrap();
        assert!(tpuart.next_event().is_none());

        clock.advance_micros(1);
        tpuart.rx_task().unwrap();
        assert_eq!(
            tpuart.next_event(),
            Some(TpUartEvent::TelegramReceived {
                telegram: t,
                object_index: 0
            })
        );
        assert_eq!(tpuart.rx_state(), RxState::Idle);
        assert_eq!(tpuart.received_telegram(), &t);
    }

    #[test]
    fn test_not_addressed_telegram_is_silent() {
        let (mut tpuart, link, clock) = ready_engine(&objects());
        link.add_read_data(telegram(0x1102, 0x0999).as_bytes());
        tpuart.rx_task().unwrap();
        assert_eq!(tpuart.rx_state(), RxState::FrameNotAddressed);
        assert_eq!(link.take_written_data(), vec![RX_ACK_NOT_ADDRESSED]);

        clock.advance_micros(3000);
        tpuart.rx_task().unwrap();
        assert_eq!(tpuart.rx_state(), RxState::Idle);
        assert!(tpuart.next_event().is_none());
    }

    #[test]
    fn test_bad_checksum_reported() {
        let (mut tpuart, link, clock) = ready_engine(&objects());
        let mut t = telegram(0x1102, 0x0801);
        t.set_raw_byte(8, t.checksum() ^ 0xFF);
        link.add_read_data(t.as_bytes());
        tpuart.rx_task().unwrap();
        clock.advance_micros(2500);
        tpuart.rx_task().unwrap();
        assert_eq!(
            tpuart.next_event(),
            Some(TpUartEvent::ReceptionError(ReceptionError::BadChecksum))
        );
    }

    #[test]
    fn test_incomplete_and_oversize_telegrams() {
        let (mut tpuart, link, clock) = ready_engine(&objects());
        link.add_read_data(&[0xBC, 0x11, 0x02, 0x08]);
        tpuart.rx_task().unwrap();
        clock.advance_micros(2500);
        tpuart.rx_task().unwrap();
        assert_eq!(
            tpuart.next_event(),
            Some(TpUartEvent::ReceptionError(ReceptionError::Incomplete))
        );

        let t = telegram(0x1102, 0x0801);
        link.add_read_data(t.as_bytes());
        link.add_read_data(&[0x55; 20]);
        tpuart.rx_task().unwrap();
        assert_eq!(tpuart.rx_state(), RxState::FrameLengthInvalid);
        clock.advance_micros(2500);
        tpuart.rx_task().unwrap();
        assert_eq!(
            tpuart.next_event(),
            Some(TpUartEvent::ReceptionError(ReceptionError::Oversize))
        );
    }

    #[test]
    fn test_send_forces_source_and_streams_bytes() {
        let (mut tpuart, link, _clock) = ready_engine(&objects());
        let t = telegram(0x0000, 0x0801);
        tpuart.send(&t).unwrap();
        assert_eq!(tpuart.send(&t), Err(KnxError::TxNotAvailable));

        let mut expected = t;
        expected.set_source(OWN);
        expected.update_checksum();

        for _ in 0..expected.len() {
            tpuart.tx_task().unwrap();
        }
        let written = link.take_written_data();
        let mut wire = Vec::new();
        for (i, b) in expected.as_bytes().iter().enumerate() {
            let service = if i + 1 == expected.len() {
                DATA_END_REQ
            } else {
                DATA_START_CONTINUE_REQ
            };
            wire.push(service + i as u8);
            wire.push(*b);
        }
        assert_eq!(written, wire);
        assert_eq!(tpuart.tx_state(), TxState::WaitingAck);

        link.add_read_data(&[DATA_CONFIRM_SUCCESS]);
        tpuart.rx_task().unwrap();
        assert_eq!(tpuart.next_event(), Some(TpUartEvent::TxAck(TxAck::Ack)));
        assert_eq!(tpuart.tx_state(), TxState::Idle);
    }

    #[test]
    fn test_nack_resolves_wait() {
        let (mut tpuart, link, _clock) = ready_engine(&objects());
        tpuart.send(&telegram(OWN, 0x0801)).unwrap();
        for _ in 0..9 {
            tpuart.tx_task().unwrap();
        }
        link.add_read_data(&[DATA_CONFIRM_FAILED]);
        tpuart.rx_task().unwrap();
        assert_eq!(tpuart.next_event(), Some(TpUartEvent::TxAck(TxAck::Nack)));
        assert_eq!(tpuart.tx_state(), TxState::Idle);
    }

    #[test]
    fn test_tx_paused_while_frame_started() {
        let (mut tpuart, link, _clock) = ready_engine(&objects());
        tpuart.send(&telegram(OWN, 0x0801)).unwrap();
        link.add_read_data(&[0xBC, 0x11]);
        tpuart.rx_task().unwrap();
        assert_eq!(tpuart.rx_state(), RxState::FrameStarted);

        tpuart.tx_task().unwrap();
        assert!(link.take_written_data().is_empty());
    }

    #[test]
    fn test_reset_indication_aborts_tx() {
        let (mut tpuart, link, _clock) = ready_engine(&objects());
        tpuart.send(&telegram(OWN, 0x0801)).unwrap();
        tpuart.tx_task().unwrap();

        link.add_read_data(&[RESET_INDICATION, 0x07]);
        tpuart.rx_task().unwrap();
        assert_eq!(tpuart.next_event(), Some(TpUartEvent::TxAck(TxAck::Reset)));
        assert_eq!(tpuart.next_event(), Some(TpUartEvent::Reset));
        assert_eq!(tpuart.next_event(), None);
        assert_eq!(tpuart.rx_state(), RxState::Stopped);
        assert_eq!(tpuart.tx_state(), TxState::Stopped);
        assert_eq!(link.pending_read(), 1);
    }

    #[test]
    fn test_state_indication_cached() {
        let (mut tpuart, link, _clock) = ready_engine(&objects());
        link.add_read_data(&[0x27]);
        tpuart.rx_task().unwrap();
        assert_eq!(tpuart.next_event(), Some(TpUartEvent::StateIndication(0x27)));
        assert_eq!(tpuart.state_indication(), 0x27);

        tpuart.request_state().unwrap();
        assert_eq!(link.take_written_data(), vec![STATE_REQ]);
    }

    #[test]
    fn test_is_active() {
        let (mut tpuart, _link, _clock) = ready_engine(&objects());
        assert!(!tpuart.is_active());
        tpuart.send(&telegram(OWN, 0x0801)).unwrap();
        assert!(tpuart.is_active());
    }
}
