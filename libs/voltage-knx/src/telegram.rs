//! KNX telegram codec
//!
//! A telegram is 9 to 23 bytes, kept in a fixed stack array and accessed
//! through named field accessors. Multi-byte fields are big-endian on the wire.
//!
//! ```text
//! Byte 0       Control field       FFR1 PP00
//!                                  FF = frame format (10 = standard)
//!                                   R = repeat flag (1 = not repeated)
//!                                  PP = priority
//! Byte 1-2     Source address
//! Byte 3-4     Destination address
//! Byte 5       Routing field       TCCC LLLL
//!                                   T = target type (1 = group address)
//!                                 CCC = hop counter
//!                                LLLL = payload length (1-15)
//! Byte 6       Command high        00XX XXCC
//! Byte 7       Command low         CCDD DDDD (DD = first payload value)
//! Byte 8..     Long payload (0-14 bytes)
//! Byte 7+len   Checksum            !(XOR of all preceding bytes)
//! ```

use std::fmt;

use tracing::trace;

/// Header size (control, source, destination, routing)
pub const HEADER_SIZE: usize = 6;
/// Payload capacity including both command bytes
pub const PAYLOAD_MAX_SIZE: usize = 16;
/// Long payload capacity (bytes after the command field)
pub const LONG_PAYLOAD_MAX_SIZE: usize = PAYLOAD_MAX_SIZE - 2;
/// Smallest telegram on the wire
pub const TELEGRAM_MIN_SIZE: usize = 9;
/// Largest telegram on the wire
pub const TELEGRAM_MAX_SIZE: usize = 23;
/// Telegram length = payload length + this offset
pub const TELEGRAM_LENGTH_OFFSET: usize = 8;

const CONTROL_OFFSET: usize = 0;
const SOURCE_OFFSET: usize = 1;
const DESTINATION_OFFSET: usize = 3;
const ROUTING_OFFSET: usize = 5;
const COMMAND_HIGH_OFFSET: usize = 6;
const COMMAND_LOW_OFFSET: usize = 7;
const LONG_PAYLOAD_OFFSET: usize = 8;

// Control field
const CONTROL_DEFAULT: u8 = 0b1011_1100;
const CONTROL_FRAME_FORMAT_MASK: u8 = 0b1100_0000;
const CONTROL_STANDARD_FRAME_FORMAT: u8 = 0b1000_0000;
const CONTROL_REPEATED_MASK: u8 = 0b0010_0000;
const CONTROL_PRIORITY_MASK: u8 = 0b0000_1100;
const CONTROL_PATTERN_MASK: u8 = 0b0001_0011;
const CONTROL_VALID_PATTERN: u8 = 0b0001_0000;

// Routing field
const ROUTING_DEFAULT: u8 = 0b1110_0001;
const ROUTING_MULTICAST_MASK: u8 = 0b1000_0000;
const ROUTING_HOP_COUNT_MASK: u8 = 0b0111_0000;
const ROUTING_HOP_COUNT_SHIFT: u8 = 4;
const ROUTING_PAYLOAD_LENGTH_MASK: u8 = 0b0000_1111;

// Command field
const COMMAND_HIGH_MASK: u8 = 0x03;
const COMMAND_LOW_MASK: u8 = 0xC0;
const COMMAND_LOW_DATA_MASK: u8 = 0x3F;
const COMMAND_PATTERN_MASK: u8 = 0b1100_0000;
const COMMAND_VALID_PATTERN: u8 = 0b0000_0000;

/// Telegram priority, as encoded in the control field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    System = 0b0000_0000,
    High = 0b0000_0100,
    Alarm = 0b0000_1000,
    #[default]
    Normal = 0b0000_1100,
}

impl Priority {
    fn from_bits(bits: u8) -> Self {
        match bits & CONTROL_PRIORITY_MASK {
            0b0000_0000 => Priority::System,
            0b0000_0100 => Priority::High,
            0b0000_1000 => Priority::Alarm,
            _ => Priority::Normal,
        }
    }
}

/// Application layer command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    ValueRead = 0b0000,
    ValueResponse = 0b0001,
    ValueWrite = 0b0010,
    MemoryWrite = 0b1010,
}

impl Command {
    /// Decode a 4-bit command code
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0b0000 => Some(Command::ValueRead),
            0b0001 => Some(Command::ValueResponse),
            0b0010 => Some(Command::ValueWrite),
            0b1010 => Some(Command::MemoryWrite),
            _ => None,
        }
    }

    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Command::ValueRead => "VAL_READ",
            Command::ValueResponse => "VAL_RESP",
            Command::ValueWrite => "VAL_WRITE",
            Command::MemoryWrite => "MEM_WRITE",
        }
    }
}

/// Telegram validity classification
///
/// Checks run in declaration order and the first failing one is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelegramValidity {
    InvalidControlField,
    UnsupportedFrameFormat,
    IncorrectPayloadLength,
    InvalidCommandField,
    IncorrectChecksum,
    UnknownCommand,
    Valid,
}

impl TelegramValidity {
    #[inline]
    pub fn is_valid(self) -> bool {
        self == TelegramValidity::Valid
    }
}

impl fmt::Display for TelegramValidity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TelegramValidity::InvalidControlField => "INVALID_CTRL_FIELD",
            TelegramValidity::UnsupportedFrameFormat => "UNSUPPORTED_FRAME_FORMAT",
            TelegramValidity::IncorrectPayloadLength => "INCORRECT_PAYLOAD_LGTH",
            TelegramValidity::InvalidCommandField => "INVALID_CMD_FIELD",
            TelegramValidity::IncorrectChecksum => "INCORRECT_CHKSUM",
            TelegramValidity::UnknownCommand => "UNKNOWN_CMD",
            TelegramValidity::Valid => "VALID",
        };
        f.write_str(s)
    }
}

/// One KNX telegram in a fixed-size stack buffer
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Telegram {
    data: [u8; TELEGRAM_MAX_SIZE],
}

impl Default for Telegram {
    fn default() -> Self {
        Self::new()
    }
}

impl Telegram {
    /// Standard frame, not repeated, normal priority, multicast,
    /// hop count 6, payload length 1, zero payload
    pub fn new() -> Self {
        let mut telegram = Self {
            data: [0; TELEGRAM_MAX_SIZE],
        };
        telegram.clear();
        telegram
    }

    /// Build from raw wire bytes; anything past the buffer is ignored
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut telegram = Self {
            data: [0; TELEGRAM_MAX_SIZE],
        };
        let n = bytes.len().min(TELEGRAM_MAX_SIZE);
        telegram.data[..n].copy_from_slice(&bytes[..n]);
        telegram
    }

    /// Reset to default values
    pub fn clear(&mut self) {
        self.data = [0; TELEGRAM_MAX_SIZE];
        self.data[CONTROL_OFFSET] = CONTROL_DEFAULT;
        self.data[ROUTING_OFFSET] = ROUTING_DEFAULT;
    }

    // ---- Control field ----

    pub fn set_priority(&mut self, priority: Priority) {
        let control = &mut self.data[CONTROL_OFFSET];
        *control = (*control & !CONTROL_PRIORITY_MASK) | (priority as u8 & CONTROL_PRIORITY_MASK);
    }

    pub fn priority(&self) -> Priority {
        Priority::from_bits(self.data[CONTROL_OFFSET])
    }

    /// Mark as repeated (clears the repeat bit)
    pub fn set_repeated(&mut self) {
        self.data[CONTROL_OFFSET] &= !CONTROL_REPEATED_MASK;
    }

    pub fn is_repeated(&self) -> bool {
        self.data[CONTROL_OFFSET] & CONTROL_REPEATED_MASK == 0
    }

    // ---- Addresses ----

    pub fn set_source(&mut self, addr: u16) {
        self.write_u16(SOURCE_OFFSET, addr);
    }

    pub fn source(&self) -> u16 {
        self.read_u16(SOURCE_OFFSET)
    }

    pub fn set_destination(&mut self, addr: u16) {
        self.write_u16(DESTINATION_OFFSET, addr);
    }

    pub fn destination(&self) -> u16 {
        self.read_u16(DESTINATION_OFFSET)
    }

    #[inline]
    fn read_u16(&self, offset: usize) -> u16 {
        u16::from_be_bytes([self.data[offset], self.data[offset + 1]])
    }

    #[inline]
    fn write_u16(&mut self, offset: usize, value: u16) {
        self.data[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
    }

    // ---- Routing field ----

    pub fn set_multicast(&mut self, multicast: bool) {
        if multicast {
            self.data[ROUTING_OFFSET] |= ROUTING_MULTICAST_MASK;
        } else {
            self.data[ROUTING_OFFSET] &= !ROUTING_MULTICAST_MASK;
        }
    }

    pub fn is_multicast(&self) -> bool {
        self.data[ROUTING_OFFSET] & ROUTING_MULTICAST_MASK != 0
    }

    /// Hop counter, 0-7 (wider values are masked)
    pub fn set_hop_count(&mut self, count: u8) {
        let routing = &mut self.data[ROUTING_OFFSET];
        *routing = (*routing & !ROUTING_HOP_COUNT_MASK)
            | ((count << ROUTING_HOP_COUNT_SHIFT) & ROUTING_HOP_COUNT_MASK);
    }

    pub fn hop_count(&self) -> u8 {
        (self.data[ROUTING_OFFSET] & ROUTING_HOP_COUNT_MASK) >> ROUTING_HOP_COUNT_SHIFT
    }

    /// Payload length, 1-15 (wider values are masked)
    pub fn set_payload_length(&mut self, length: u8) {
        let routing = &mut self.data[ROUTING_OFFSET];
        *routing =
            (*routing & !ROUTING_PAYLOAD_LENGTH_MASK) | (length & ROUTING_PAYLOAD_LENGTH_MASK);
    }

    pub fn payload_length(&self) -> u8 {
        self.data[ROUTING_OFFSET] & ROUTING_PAYLOAD_LENGTH_MASK
    }

    /// Wire length: payload length + 8
    pub fn len(&self) -> usize {
        TELEGRAM_LENGTH_OFFSET + self.payload_length() as usize
    }

    // ---- Command field ----

    pub fn set_command(&mut self, command: Command) {
        let code = command.code();
        let high = &mut self.data[COMMAND_HIGH_OFFSET];
        *high = (*high & !COMMAND_HIGH_MASK) | ((code >> 2) & COMMAND_HIGH_MASK);
        let low = &mut self.data[COMMAND_LOW_OFFSET];
        *low = (*low & !COMMAND_LOW_MASK) | ((code << 6) & COMMAND_LOW_MASK);
    }

    /// Raw 4-bit command code, recognized or not
    pub fn command_code(&self) -> u8 {
        ((self.data[COMMAND_LOW_OFFSET] & COMMAND_LOW_MASK) >> 6)
            + ((self.data[COMMAND_HIGH_OFFSET] & COMMAND_HIGH_MASK) << 2)
    }

    pub fn command(&self) -> Option<Command> {
        Command::from_code(self.command_code())
    }

    /// 6-bit inline value carried in the low command byte
    pub fn set_first_payload_byte(&mut self, value: u8) {
        let low = &mut self.data[COMMAND_LOW_OFFSET];
        *low = (*low & !COMMAND_LOW_DATA_MASK) | (value & COMMAND_LOW_DATA_MASK);
    }

    pub fn clear_first_payload_byte(&mut self) {
        self.data[COMMAND_LOW_OFFSET] &= !COMMAND_LOW_DATA_MASK;
    }

    pub fn first_payload_byte(&self) -> u8 {
        self.data[COMMAND_LOW_OFFSET] & COMMAND_LOW_DATA_MASK
    }

    // ---- Long payload ----

    /// Copy bytes after the command field; more than 14 bytes are silently dropped
    pub fn set_long_payload(&mut self, src: &[u8]) {
        let n = src.len().min(LONG_PAYLOAD_MAX_SIZE);
        self.data[LONG_PAYLOAD_OFFSET..LONG_PAYLOAD_OFFSET + n].copy_from_slice(&src[..n]);
    }

    /// Fill `dst` from the long payload, clamped to 14 bytes. Returns the copied count.
    pub fn long_payload(&self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(LONG_PAYLOAD_MAX_SIZE);
        dst[..n].copy_from_slice(&self.data[LONG_PAYLOAD_OFFSET..LONG_PAYLOAD_OFFSET + n]);
        n
    }

    /// Zero the whole payload area except the first payload value
    pub fn clear_long_payload(&mut self) {
        self.data[LONG_PAYLOAD_OFFSET..].fill(0);
    }

    // ---- Checksum ----

    #[inline]
    fn checksum_offset(&self) -> usize {
        HEADER_SIZE + 1 + self.payload_length() as usize
    }

    /// One's complement of the XOR of every byte before the checksum slot
    pub fn compute_checksum(&self) -> u8 {
        !self.data[..self.checksum_offset()]
            .iter()
            .fold(0u8, |acc, b| acc ^ b)
    }

    pub fn update_checksum(&mut self) {
        let offset = self.checksum_offset();
        self.data[offset] = self.compute_checksum();
    }

    pub fn checksum(&self) -> u8 {
        self.data[self.checksum_offset()]
    }

    pub fn is_checksum_correct(&self) -> bool {
        self.checksum() == self.compute_checksum()
    }

    /// Classify the telegram; the first failing check wins
    pub fn validity(&self) -> TelegramValidity {
        let control = self.data[CONTROL_OFFSET];
        if control & CONTROL_PATTERN_MASK != CONTROL_VALID_PATTERN {
            return TelegramValidity::InvalidControlField;
        }
        if control & CONTROL_FRAME_FORMAT_MASK != CONTROL_STANDARD_FRAME_FORMAT {
            return TelegramValidity::UnsupportedFrameFormat;
        }
        if self.payload_length() == 0 {
            return TelegramValidity::IncorrectPayloadLength;
        }
        if self.data[COMMAND_HIGH_OFFSET] & COMMAND_PATTERN_MASK != COMMAND_VALID_PATTERN {
            return TelegramValidity::InvalidCommandField;
        }
        if !self.is_checksum_correct() {
            return TelegramValidity::IncorrectChecksum;
        }
        if self.command().is_none() {
            return TelegramValidity::UnknownCommand;
        }
        TelegramValidity::Valid
    }

    // ---- Raw access and copies ----

    /// Byte at `index`, `None` past the buffer
    pub fn raw_byte(&self, index: usize) -> Option<u8> {
        self.data.get(index).copied()
    }

    /// Write one raw byte; out of range indices are ignored
    pub fn set_raw_byte(&mut self, index: usize, value: u8) {
        if let Some(slot) = self.data.get_mut(index) {
            *slot = value;
        } else {
            trace!("Raw write past telegram buffer ignored: index={}", index);
        }
    }

    /// Meaningful bytes on the wire (clamped to the buffer)
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len().min(TELEGRAM_MAX_SIZE)]
    }

    /// Whole 23-byte buffer
    pub fn raw(&self) -> &[u8; TELEGRAM_MAX_SIZE] {
        &self.data
    }

    /// Copy the telegram bytes into `dest`
    pub fn copy_to(&self, dest: &mut Telegram) {
        let n = self.len().min(TELEGRAM_MAX_SIZE);
        dest.data[..n].copy_from_slice(&self.data[..n]);
    }

    /// Copy only the 6 header bytes into `dest`
    pub fn copy_header_to(&self, dest: &mut Telegram) {
        dest.data[..HEADER_SIZE].copy_from_slice(&self.data[..HEADER_SIZE]);
    }

    fn command_str(&self) -> &'static str {
        self.command().map(Command::as_str).unwrap_or("ERR_VAL!")
    }

    fn payload_hex(&self) -> String {
        let mut out = format!("{:02X}", self.first_payload_byte());
        let extra = (self.payload_length() as usize)
            .saturating_sub(1)
            .min(LONG_PAYLOAD_MAX_SIZE);
        for b in &self.data[LONG_PAYLOAD_OFFSET..LONG_PAYLOAD_OFFSET + extra] {
            out.push_str(&format!(" {b:02X}"));
        }
        out
    }

    /// Multi-field description for debug output
    pub fn verbose(&self) -> String {
        format!(
            "repeat={} prio={:?} src={:04X} dst={:04X} group={} hops={} payload_len={} len={} cmd={} payload=[{}] validity={}",
            if self.is_repeated() { "YES" } else { "NO" },
            self.priority(),
            self.source(),
            self.destination(),
            if self.is_multicast() { "YES" } else { "NO" },
            self.hop_count(),
            self.payload_length(),
            self.len(),
            self.command_str(),
            self.payload_hex(),
            self.validity()
        )
    }
}

impl fmt::Display for Telegram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "src={:04X} dst={:04X} len={} cmd={} payload=[{}]",
            self.source(),
            self.destination(),
            self.payload_length(),
            self.command_str(),
            self.payload_hex()
        )
    }
}

impl fmt::Debug for Telegram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Telegram({:02X?})", self.as_bytes())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    fn valid_write() -> Telegram {
        let mut t = Telegram::new();
        t.set_destination(0x0807);
        t.set_command(Command::ValueWrite);
        t.set_first_payload_byte(1);
        t.update_checksum();
        t
    }

    #[test]
    fn test_cleared_telegram_bytes() {
        let mut t = Telegram::new();
        t.update_checksum();
        assert_eq!(
            t.as_bytes(),
            &[0xBC, 0x00, 0x00, 0x00, 0x00, 0xE1, 0x00, 0x00, 0xA2]
        );
        assert_eq!(t.len(), TELEGRAM_MIN_SIZE);
    }

    #[test]
    fn test_write_command_bytes() {
        let mut t = Telegram::new();
        t.set_command(Command::ValueWrite);
        t.update_checksum();
        assert_eq!(
            t.as_bytes(),
            &[0xBC, 0x00, 0x00, 0x00, 0x00, 0xE1, 0x00, 0x80, 0x22]
        );
    }

    #[test]
    fn test_default_fields() {
        let t = Telegram::new();
        assert_eq!(t.priority(), Priority::Normal);
        assert!(!t.is_repeated());
        assert!(t.is_multicast());
        assert_eq!(t.hop_count(), 6);
        assert_eq!(t.payload_length(), 1);
        assert_eq!(t.command(), Some(Command::ValueRead));
    }

    #[test]
    fn test_addresses_are_big_endian() {
        let mut t = Telegram::new();
        t.set_source(0x1105);
        t.set_destination(0x0A0B);
        assert_eq!(t.raw()[1..5], [0x11, 0x05, 0x0A, 0x0B]);
        assert_eq!(t.source(), 0x1105);
        assert_eq!(t.destination(), 0x0A0B);
    }

    #[test]
    fn test_control_field_accessors() {
        let mut t = Telegram::new();
        for prio in [
            Priority::System,
            Priority::High,
            Priority::Alarm,
            Priority::Normal,
        ] {
            t.set_priority(prio);
            assert_eq!(t.priority(), prio);
        }
        t.set_repeated();
        assert!(t.is_repeated());
        assert_eq!(t.raw()[0] & 0x20, 0);
    }

    #[test]
    fn test_routing_field_accessors() {
        let mut t = Telegram::new();
        t.set_multicast(false);
        assert!(!t.is_multicast());
        t.set_hop_count(3);
        assert_eq!(t.hop_count(), 3);
        t.set_hop_count(0xFF);
        assert_eq!(t.hop_count(), 7);
        t.set_payload_length(15);
        assert_eq!(t.payload_length(), 15);
        assert_eq!(t.len(), TELEGRAM_MAX_SIZE);
        assert!(!t.is_multicast());
    }

    #[test]
    fn test_command_split_across_bytes() {
        let mut t = Telegram::new();
        t.set_first_payload_byte(0x3F);
        t.set_command(Command::MemoryWrite);
        assert_eq!(t.raw()[6], 0b10);
        assert_eq!(t.raw()[7], 0b1011_1111);
        assert_eq!(t.command(), Some(Command::MemoryWrite));
        assert_eq!(t.first_payload_byte(), 0x3F);

        t.set_command(Command::ValueResponse);
        assert_eq!(t.command(), Some(Command::ValueResponse));
        assert_eq!(t.first_payload_byte(), 0x3F);

        t.clear_first_payload_byte();
        assert_eq!(t.first_payload_byte(), 0);
        assert_eq!(t.command(), Some(Command::ValueResponse));
    }

    #[test]
    fn test_long_payload_round_trip() {
        let mut t = Telegram::new();
        let value = [0x12, 0x34, 0x56, 0x78];
        t.set_payload_length(5);
        t.set_long_payload(&value);
        t.update_checksum();

        let mut out = [0u8; 4];
        assert_eq!(t.long_payload(&mut out), 4);
        assert_eq!(out, value);
        assert_eq!(t.validity(), TelegramValidity::Valid);
    }

    #[test]
    fn test_long_payload_clamped() {
        let mut t = Telegram::new();
        let src: Vec<u8> = (1..=20).collect();
        t.set_long_payload(&src);
        assert_eq!(t.raw()[8..22], src[..14]);
        assert_eq!(t.raw()[22], 0);

        let mut out = [0u8; 20];
        assert_eq!(t.long_payload(&mut out), LONG_PAYLOAD_MAX_SIZE);
        assert_eq!(out[14..], [0; 6]);

        t.clear_long_payload();
        assert!(t.raw()[8..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_validity_single_failures() {
        assert_eq!(valid_write().validity(), TelegramValidity::Valid);

        let mut t = valid_write();
        t.set_raw_byte(0, 0xBD);
        t.update_checksum();
        assert_eq!(t.validity(), TelegramValidity::InvalidControlField);

        let mut t = valid_write();
        t.set_raw_byte(0, 0x3C);
        t.update_checksum();
        assert_eq!(t.validity(), TelegramValidity::UnsupportedFrameFormat);

        let mut t = valid_write();
        t.set_payload_length(0);
        assert_eq!(t.validity(), TelegramValidity::IncorrectPayloadLength);

        let mut t = valid_write();
        t.set_raw_byte(6, 0x40);
        t.update_checksum();
        assert_eq!(t.validity(), TelegramValidity::InvalidCommandField);

        let mut t = valid_write();
        t.set_raw_byte(4, 0x99);
        assert_eq!(t.validity(), TelegramValidity::IncorrectChecksum);

        let mut t = valid_write();
        t.set_raw_byte(6, 0x03);
        t.update_checksum();
        assert_eq!(t.validity(), TelegramValidity::UnknownCommand);
    }

    #[test]
    fn test_validity_precedence() {
        // control pattern + frame format both wrong
        let mut t = valid_write();
        t.set_raw_byte(0, 0x01);
        t.update_checksum();
        assert_eq!(t.validity(), TelegramValidity::InvalidControlField);

        // frame format + zero length
        let mut t = valid_write();
        t.set_raw_byte(0, 0x3C);
        t.set_payload_length(0);
        assert_eq!(t.validity(), TelegramValidity::UnsupportedFrameFormat);

        // zero length + bad command field
        let mut t = valid_write();
        t.set_raw_byte(6, 0xC0);
        t.set_payload_length(0);
        assert_eq!(t.validity(), TelegramValidity::IncorrectPayloadLength);

        // bad command field + bad checksum
        let mut t = valid_write();
        t.set_raw_byte(6, 0x80);
        assert_eq!(t.validity(), TelegramValidity::InvalidCommandField);

        // bad checksum + unknown command
        let mut t = valid_write();
        t.set_raw_byte(6, 0x03);
        assert_eq!(t.validity(), TelegramValidity::IncorrectChecksum);
    }

    #[test]
    fn test_copy_and_copy_header() {
        let mut src = valid_write();
        src.set_source(0x1101);
        src.set_payload_length(3);
        src.set_long_payload(&[0xAA, 0xBB]);
        src.update_checksum();

        let mut full = Telegram::new();
        src.copy_to(&mut full);
        assert_eq!(full.as_bytes(), src.as_bytes());

        let mut header = Telegram::new();
        src.copy_header_to(&mut header);
        assert_eq!(header.raw()[..HEADER_SIZE], src.raw()[..HEADER_SIZE]);
        assert_eq!(header.command(), Some(Command::ValueRead));
        assert_eq!(header.raw()[8], 0);
    }

    #[test]
    fn test_display_and_verbose() {
        let t = valid_write();
        assert_eq!(
            t.to_string(),
            "src=0000 dst=0807 len=1 cmd=VAL_WRITE payload=[01]"
        );
        let verbose = t.verbose();
        assert!(verbose.contains("prio=Normal"));
        assert!(verbose.contains("validity=VALID"));
    }
}
