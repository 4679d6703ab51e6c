//! Communication objects
//!
//! A communication object is an application value bound to one group
//! address. Its capability flags decide how the device reacts to bus
//! traffic for that address:
//!
//! ```text
//! Flags byte: xx xx C R W T U I
//!   C  communication (object takes part in bus traffic at all)
//!   R  read          (answer read requests)
//!   W  write         (accept write telegrams)
//!   T  transmit      (send a telegram when written locally)
//!   U  update        (accept response telegrams)
//!   I  init read     (read the value from the bus at start-up)
//! ```
//!
//! Values up to one byte (payload length <= 2) are stored as a short value,
//! wider values as `length - 1` bytes in an inline buffer.

use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::address::GroupAddress;
use crate::dpt::Dpt;
use crate::error::{KnxError, Result};
use crate::telegram::{Priority, Telegram, LONG_PAYLOAD_MAX_SIZE};

/// Capability flags of a communication object
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "FlagsRepr", into = "String")]
pub struct ObjectFlags(u8);

impl ObjectFlags {
    pub const NONE: ObjectFlags = ObjectFlags(0);
    pub const COMMUNICATION: ObjectFlags = ObjectFlags(0x20);
    pub const READ: ObjectFlags = ObjectFlags(0x10);
    pub const WRITE: ObjectFlags = ObjectFlags(0x08);
    pub const TRANSMIT: ObjectFlags = ObjectFlags(0x04);
    pub const UPDATE: ObjectFlags = ObjectFlags(0x02);
    pub const INIT_READ: ObjectFlags = ObjectFlags(0x01);

    /// Communication | Read | Transmit
    pub const SENSOR: ObjectFlags = ObjectFlags(0x34);
    /// Communication | Write | Update
    pub const LOGIC_IN: ObjectFlags = ObjectFlags(0x2A);
    /// Communication | Write | Update | Init read
    pub const LOGIC_IN_INIT: ObjectFlags = ObjectFlags(0x2B);

    const LETTERS: [(char, ObjectFlags); 6] = [
        ('C', ObjectFlags::COMMUNICATION),
        ('R', ObjectFlags::READ),
        ('W', ObjectFlags::WRITE),
        ('T', ObjectFlags::TRANSMIT),
        ('U', ObjectFlags::UPDATE),
        ('I', ObjectFlags::INIT_READ),
    ];

    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0x3F)
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn contains(self, other: ObjectFlags) -> bool {
        self.0 & other.0 == other.0
    }

    fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "communication" | "c" => Ok(ObjectFlags::COMMUNICATION),
            "read" | "r" => Ok(ObjectFlags::READ),
            "write" | "w" => Ok(ObjectFlags::WRITE),
            "transmit" | "t" => Ok(ObjectFlags::TRANSMIT),
            "update" | "u" => Ok(ObjectFlags::UPDATE),
            "init_read" | "init" | "i" => Ok(ObjectFlags::INIT_READ),
            "sensor" => Ok(ObjectFlags::SENSOR),
            "logic_in" => Ok(ObjectFlags::LOGIC_IN),
            "logic_in_init" => Ok(ObjectFlags::LOGIC_IN_INIT),
            other => Err(KnxError::config(format!("unknown object flag '{other}'"))),
        }
    }
}

impl BitOr for ObjectFlags {
    type Output = ObjectFlags;

    fn bitor(self, rhs: ObjectFlags) -> ObjectFlags {
        ObjectFlags(self.0 | rhs.0)
    }
}

impl fmt::Display for ObjectFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (letter, flag) in Self::LETTERS {
            if self.contains(flag) {
                write!(f, "{letter}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ObjectFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectFlags({self} = 0x{:02X})", self.0)
    }
}

/// Letter form, e.g. `"CRT"`, or a preset name
impl FromStr for ObjectFlags {
    type Err = KnxError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(preset) = Self::from_name(s) {
            if s.len() > 1 {
                return Ok(preset);
            }
        }
        let mut flags = ObjectFlags::NONE;
        for c in s.chars() {
            let flag = Self::LETTERS
                .iter()
                .find(|(letter, _)| *letter == c.to_ascii_uppercase())
                .map(|(_, flag)| *flag)
                .ok_or_else(|| KnxError::config(format!("unknown flag letter '{c}' in '{s}'")))?;
            flags = flags | flag;
        }
        Ok(flags)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlagsRepr {
    Bits(u8),
    Letters(String),
    Names(Vec<String>),
}

impl TryFrom<FlagsRepr> for ObjectFlags {
    type Error = KnxError;

    fn try_from(repr: FlagsRepr) -> Result<Self> {
        match repr {
            FlagsRepr::Bits(bits) => Ok(ObjectFlags::from_bits(bits)),
            FlagsRepr::Letters(s) => s.parse(),
            FlagsRepr::Names(names) => names
                .iter()
                .try_fold(ObjectFlags::NONE, |acc, name| Ok(acc | Self::from_name(name)?)),
        }
    }
}

impl From<ObjectFlags> for String {
    fn from(flags: ObjectFlags) -> Self {
        flags.to_string()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ObjectValue {
    Short(u8),
    Long {
        data: [u8; LONG_PAYLOAD_MAX_SIZE],
        len: usize,
    },
}

/// Communication object: one group address, one datapoint, one value
#[derive(Clone, PartialEq, Eq)]
pub struct ComObject {
    address: GroupAddress,
    dpt: Dpt,
    flags: ObjectFlags,
    priority: Priority,
    length: u8,
    valid: bool,
    value: ObjectValue,
}

impl ComObject {
    pub fn new(address: GroupAddress, dpt: Dpt, flags: ObjectFlags) -> Self {
        Self::with_priority(address, dpt, flags, Priority::Normal)
    }

    pub fn with_priority(
        address: GroupAddress,
        dpt: Dpt,
        flags: ObjectFlags,
        priority: Priority,
    ) -> Self {
        let length = dpt.payload_length();
        let value = if length <= 2 {
            ObjectValue::Short(0)
        } else {
            ObjectValue::Long {
                data: [0; LONG_PAYLOAD_MAX_SIZE],
                len: (length as usize - 1).min(LONG_PAYLOAD_MAX_SIZE),
            }
        };
        Self {
            address,
            dpt,
            flags,
            priority,
            length,
            valid: !flags.contains(ObjectFlags::INIT_READ),
            value,
        }
    }

    #[inline]
    pub fn address(&self) -> GroupAddress {
        self.address
    }

    #[inline]
    pub fn dpt(&self) -> Dpt {
        self.dpt
    }

    #[inline]
    pub fn flags(&self) -> ObjectFlags {
        self.flags
    }

    #[inline]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Payload length, same encoding as the telegram payload length
    #[inline]
    pub fn length(&self) -> u8 {
        self.length
    }

    /// Number of value bytes (1 for short values)
    pub fn value_len(&self) -> usize {
        match &self.value {
            ObjectValue::Short(_) => 1,
            ObjectValue::Long { len, .. } => *len,
        }
    }

    #[inline]
    pub fn is_long(&self) -> bool {
        matches!(self.value, ObjectValue::Long { .. })
    }

    /// False for init-read objects until a value has been received or written
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }

    /// Short value (long objects report 0)
    pub fn value(&self) -> u8 {
        match self.value {
            ObjectValue::Short(v) => v,
            ObjectValue::Long { .. } => 0,
        }
    }

    /// Value bytes, 1 byte for short objects
    pub fn value_bytes(&self) -> &[u8] {
        match &self.value {
            ObjectValue::Short(v) => std::slice::from_ref(v),
            ObjectValue::Long { data, len } => &data[..*len],
        }
    }

    /// Set a short value; refused for long objects
    pub fn update_value(&mut self, value: u8) -> Result<()> {
        match &mut self.value {
            ObjectValue::Short(v) => {
                *v = value;
                self.valid = true;
                Ok(())
            }
            ObjectValue::Long { len, .. } => Err(KnxError::LengthMismatch {
                expected: *len,
                actual: 1,
            }),
        }
    }

    /// Set the value from bytes; the first `value_len()` bytes are used
    pub fn update_bytes(&mut self, src: &[u8]) -> Result<()> {
        let expected = self.value_len();
        if src.len() < expected {
            return Err(KnxError::LengthMismatch {
                expected,
                actual: src.len(),
            });
        }
        match &mut self.value {
            ObjectValue::Short(v) => *v = src[0],
            ObjectValue::Long { data, len } => data[..*len].copy_from_slice(&src[..*len]),
        }
        self.valid = true;
        Ok(())
    }

    /// Take the value carried by a received telegram.
    /// Fails if the telegram payload length differs from the object's.
    pub fn update_from_telegram(&mut self, telegram: &Telegram) -> Result<()> {
        if telegram.payload_length() != self.length {
            return Err(KnxError::LengthMismatch {
                expected: usize::from(self.length),
                actual: usize::from(telegram.payload_length()),
            });
        }
        let length = self.length;
        match &mut self.value {
            ObjectValue::Short(v) if length == 1 => *v = telegram.first_payload_byte(),
            ObjectValue::Short(v) => {
                telegram.long_payload(std::slice::from_mut(v));
            }
            ObjectValue::Long { data, len } => {
                telegram.long_payload(&mut data[..*len]);
            }
        }
        self.valid = true;
        Ok(())
    }

    /// Flip a 1-bit value; validity is left unchanged
    pub fn toggle(&mut self) {
        if let ObjectValue::Short(v) = &mut self.value {
            *v = u8::from(*v == 0);
        }
    }

    /// Copy priority, destination and payload length into `telegram`
    pub fn copy_attributes(&self, telegram: &mut Telegram) {
        telegram.set_priority(self.priority);
        telegram.set_destination(self.address.raw());
        telegram.set_multicast(true);
        telegram.set_payload_length(self.length);
    }

    /// Copy the value into the telegram payload
    pub fn copy_value(&self, telegram: &mut Telegram) {
        match &self.value {
            ObjectValue::Short(v) if self.length == 1 => telegram.set_first_payload_byte(*v),
            ObjectValue::Short(v) => telegram.set_long_payload(std::slice::from_ref(v)),
            ObjectValue::Long { data, len } => telegram.set_long_payload(&data[..*len]),
        }
    }
}

impl fmt::Debug for ComObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComObject")
            .field("address", &self.address.to_string())
            .field("dpt", &self.dpt.to_string())
            .field("flags", &self.flags)
            .field("priority", &self.priority)
            .field("length", &self.length)
            .field("valid", &self.valid)
            .field("value", &self.value_bytes())
            .finish()
    }
}
