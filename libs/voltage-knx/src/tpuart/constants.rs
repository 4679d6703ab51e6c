//! TP-UART service codes and timing constants

// ============================================================================
// Host -> transceiver services
// ============================================================================

pub const RESET_REQ: u8 = 0x01;
pub const STATE_REQ: u8 = 0x02;
/// Followed by the individual address, high byte first
pub const SET_ADDR_REQ: u8 = 0x28;
/// Plus the byte index within the telegram
pub const DATA_START_CONTINUE_REQ: u8 = 0x80;
/// Plus the byte index of the last (checksum) byte
pub const DATA_END_REQ: u8 = 0x40;
pub const ACTIVATE_BUSMON_REQ: u8 = 0x05;
pub const RX_ACK_ADDRESSED: u8 = 0x11;
pub const RX_ACK_NOT_ADDRESSED: u8 = 0x10;

// ============================================================================
// Transceiver -> host services
// ============================================================================

pub const RESET_INDICATION: u8 = 0x03;
pub const DATA_CONFIRM_SUCCESS: u8 = 0x8B;
pub const DATA_CONFIRM_FAILED: u8 = 0x0B;
pub const STATE_INDICATION: u8 = 0x07;
pub const STATE_INDICATION_MASK: u8 = 0x07;

/// Control field of a standard-format bus frame, checked with [`FRAME_START_MASK`]
pub const FRAME_START_PATTERN: u8 = 0b1001_0000;
pub const FRAME_START_MASK: u8 = 0b1101_0011;

// State indication bits
pub const STATE_SLAVE_COLLISION: u8 = 0x80;
pub const STATE_RECEIVE_ERROR: u8 = 0x40;
pub const STATE_TRANSMIT_ERROR: u8 = 0x20;
pub const STATE_PROTOCOL_ERROR: u8 = 0x10;
pub const STATE_TEMPERATURE_WARNING: u8 = 0x08;

// ============================================================================
// Timing (19200 baud, 11 bits per character: ~0.58 ms per byte)
// ============================================================================

/// Inter-byte gap that ends a telegram
pub const EOP_GAP_US: u64 = 2_000;
/// Wait for the data confirm after the last byte
pub const ACK_TIMEOUT_MS: u64 = 500;
/// Reset requests sent before bring-up gives up
pub const RESET_ATTEMPTS: u32 = 10;
/// Wait for the reset indication after each request
pub const RESET_ATTEMPT_TIMEOUT_MS: u64 = 1_000;

/// Byte count at which the routing field (and destination) is complete
pub(crate) const ROUTING_COMPLETE_COUNT: usize = 6;
/// Byte count at which the source address is complete
pub(crate) const SOURCE_COMPLETE_COUNT: usize = 3;
