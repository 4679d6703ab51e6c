//! Byte link and clock seams
//!
//! The transceiver engine never blocks: it asks the link how many bytes are
//! waiting, reads them one at a time, and compares timestamps from a
//! monotonic clock. Hardware access stays behind these two traits.

use std::time::Instant;

use crate::error::Result;

/// Non-blocking byte stream to the bus transceiver
pub trait SerialLink {
    /// Bytes ready to be read without blocking
    fn available(&mut self) -> Result<usize>;

    /// Next received byte, `None` when nothing is waiting
    fn read_byte(&mut self) -> Result<Option<u8>>;

    /// Queue bytes for transmission
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()>;

    /// Drop buffered data before a transceiver reset
    fn reset_link(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<L: SerialLink + ?Sized> SerialLink for Box<L> {
    fn available(&mut self) -> Result<usize> {
        (**self).available()
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        (**self).read_byte()
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write_bytes(bytes)
    }

    fn reset_link(&mut self) -> Result<()> {
        (**self).reset_link()
    }
}

/// Monotonic time source. Values wrap; compare with `wrapping_sub`.
pub trait Clock {
    fn now_micros(&self) -> u64;

    fn now_millis(&self) -> u64 {
        self.now_micros() / 1000
    }
}

/// Elapsed time between two wrapping timestamps
#[inline]
pub fn elapsed(now: u64, since: u64) -> u64 {
    now.wrapping_sub(since)
}

/// Wall clock based on [`Instant`]
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_micros(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }
}

#[cfg(feature = "serial")]
pub use uart::UartLink;

#[cfg(feature = "serial")]
mod uart {
    use std::io::{ErrorKind, Read, Write};
    use std::time::Duration;

    use tokio_serial::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
    use tracing::{debug, info};

    use super::SerialLink;
    use crate::error::{KnxError, Result};

    /// TP-UART transceiver baud rate
    pub const TPUART_BAUD_RATE: u32 = 19_200;

    /// UART link, 8 data bits, even parity, 1 stop bit
    pub struct UartLink {
        port: Box<dyn SerialPort>,
        name: String,
    }

    impl UartLink {
        pub fn open(port: &str, baud_rate: u32) -> Result<Self> {
            if baud_rate != TPUART_BAUD_RATE {
                debug!(
                    "Opening {} at {} baud, transceiver expects {}",
                    port, baud_rate, TPUART_BAUD_RATE
                );
            }
            let serial = tokio_serial::new(port, baud_rate)
                .data_bits(DataBits::Eight)
                .parity(Parity::Even)
                .stop_bits(StopBits::One)
                .flow_control(FlowControl::None)
                .timeout(Duration::from_millis(1))
                .open()
                .map_err(|e| KnxError::io(format!("Failed to open serial port {port}: {e}")))?;
            info!("Serial port {} opened ({} 8E1)", port, baud_rate);
            Ok(Self {
                port: serial,
                name: port.to_string(),
            })
        }

        pub fn name(&self) -> &str {
            &self.name
        }
    }

    impl SerialLink for UartLink {
        fn available(&mut self) -> Result<usize> {
            Ok(self.port.bytes_to_read()? as usize)
        }

        fn read_byte(&mut self) -> Result<Option<u8>> {
            let mut byte = [0u8; 1];
            match self.port.read(&mut byte) {
                Ok(1) => Ok(Some(byte[0])),
                Ok(_) => Ok(None),
                Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                    Ok(None)
                }
                Err(e) => Err(e.into()),
            }
        }

        fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
            self.port.write_all(bytes)?;
            Ok(())
        }

        fn reset_link(&mut self) -> Result<()> {
            self.port.clear(ClearBuffer::All)?;
            Ok(())
        }
    }
}
