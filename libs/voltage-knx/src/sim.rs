//! In-memory link and manual clock
//!
//! Used by the unit and integration tests, and handy for driving a device
//! without hardware. Both types are cheap handles over shared state: keep a
//! clone to feed bytes and move time while the engine owns the other one.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::error::{KnxError, Result};
use crate::link::{Clock, SerialLink};

#[derive(Debug, Default)]
struct LinkBuffers {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    disconnected: bool,
}

/// Byte link backed by two in-memory buffers
#[derive(Debug, Clone, Default)]
pub struct MemoryLink {
    inner: Rc<RefCell<LinkBuffers>>,
}

impl MemoryLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes as if received from the transceiver
    pub fn add_read_data(&self, data: &[u8]) {
        self.inner.borrow_mut().rx.extend(data.iter().copied());
    }

    /// Everything written by the host since the last call
    pub fn take_written_data(&self) -> Vec<u8> {
        std::mem::take(&mut self.inner.borrow_mut().tx)
    }

    /// Bytes not consumed yet
    pub fn pending_read(&self) -> usize {
        self.inner.borrow().rx.len()
    }

    /// A disconnected link fails every operation with an I/O error
    pub fn set_connected(&self, connected: bool) {
        self.inner.borrow_mut().disconnected = !connected;
    }

    fn check_connected(&self) -> Result<()> {
        if self.inner.borrow().disconnected {
            return Err(KnxError::io("memory link disconnected"));
        }
        Ok(())
    }
}

impl SerialLink for MemoryLink {
    fn available(&mut self) -> Result<usize> {
        self.check_connected()?;
        Ok(self.inner.borrow().rx.len())
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        self.check_connected()?;
        Ok(self.inner.borrow_mut().rx.pop_front())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.check_connected()?;
        self.inner.borrow_mut().tx.extend_from_slice(bytes);
        Ok(())
    }
}

/// Clock that only moves when told to
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    micros: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_micros(&self, micros: u64) {
        self.micros.set(micros);
    }

    pub fn advance_micros(&self, micros: u64) {
        self.micros.set(self.micros.get().wrapping_add(micros));
    }

    pub fn advance_millis(&self, millis: u64) {
        self.advance_micros(millis * 1000);
    }
}

impl Clock for ManualClock {
    fn now_micros(&self) -> u64 {
        self.micros.get()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_memory_link_shares_buffers() {
        let feeder = MemoryLink::new();
        let mut link = feeder.clone();
        feeder.add_read_data(&[1, 2]);
        assert_eq!(link.available().unwrap(), 2);
        assert_eq!(link.read_byte().unwrap(), Some(1));
        link.write_bytes(&[9]).unwrap();
        assert_eq!(feeder.take_written_data(), vec![9]);
        assert!(feeder.take_written_data().is_empty());
        assert_eq!(feeder.pending_read(), 1);
    }

    #[test]
    fn test_disconnected_link_errors() {
        let feeder = MemoryLink::new();
        let mut link = feeder.clone();
        feeder.set_connected(false);
        assert!(link.available().is_err());
        assert!(link.write_bytes(&[1]).is_err());
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        handle.advance_millis(2);
        handle.advance_micros(5);
        assert_eq!(clock.now_micros(), 2005);
        assert_eq!(clock.now_millis(), 2);
        handle.set_micros(u64::MAX);
        handle.advance_micros(2);
        assert_eq!(clock.now_micros(), 1);
    }
}
