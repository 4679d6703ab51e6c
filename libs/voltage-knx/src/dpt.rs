//! Datapoint types and numeric value codec
//!
//! Datapoint ids are written `main.sub` (e.g. `9.001` for a temperature).
//! The main group fixes the wire format and hence the payload length of the
//! communication object. Main groups 1 to 14 are supported.
//!
//! Numeric conversion covers the 16/32-bit integer formats and the 2-byte
//! KNX float. All values are big-endian on the wire.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{KnxError, Result};

/// Wire format of a datapoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DptFormat {
    B1,
    B2,
    B1U3,
    A8,
    U8,
    V8,
    B5N3,
    U16,
    V16,
    F16,
    N3N5R2N6R2N6,
    R3N5R4N4R1U7,
    U32,
    V32,
    F32,
}

impl DptFormat {
    /// Value width in bits
    pub const fn bit_length(self) -> u8 {
        match self {
            DptFormat::B1 => 1,
            DptFormat::B2 => 2,
            DptFormat::B1U3 => 4,
            DptFormat::A8 | DptFormat::U8 | DptFormat::V8 | DptFormat::B5N3 => 8,
            DptFormat::U16 | DptFormat::V16 | DptFormat::F16 => 16,
            DptFormat::N3N5R2N6R2N6 | DptFormat::R3N5R4N4R1U7 => 24,
            DptFormat::U32 | DptFormat::V32 | DptFormat::F32 => 32,
        }
    }

    /// Telegram payload length for a value of this format
    #[inline]
    pub const fn payload_length(self) -> u8 {
        self.bit_length() / 8 + 1
    }
}

/// Datapoint type id (`main.sub`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Dpt {
    main: u8,
    sub: u16,
}

impl Dpt {
    pub const SWITCH: Dpt = Dpt { main: 1, sub: 1 };
    pub const BOOL: Dpt = Dpt { main: 1, sub: 2 };
    pub const CONTROL_DIMMING: Dpt = Dpt { main: 3, sub: 7 };
    pub const SCALING: Dpt = Dpt { main: 5, sub: 1 };
    pub const STATUS_MODE3: Dpt = Dpt { main: 6, sub: 20 };
    pub const VALUE_2_UCOUNT: Dpt = Dpt { main: 7, sub: 1 };
    pub const VALUE_2_COUNT: Dpt = Dpt { main: 8, sub: 1 };
    pub const VALUE_TEMP: Dpt = Dpt { main: 9, sub: 1 };
    pub const VALUE_HUMIDITY: Dpt = Dpt { main: 9, sub: 7 };
    pub const TIME_OF_DAY: Dpt = Dpt { main: 10, sub: 1 };
    pub const DATE: Dpt = Dpt { main: 11, sub: 1 };
    pub const VALUE_4_UCOUNT: Dpt = Dpt { main: 12, sub: 1 };
    pub const VALUE_4_COUNT: Dpt = Dpt { main: 13, sub: 1 };
    pub const ACTIVE_ENERGY: Dpt = Dpt { main: 13, sub: 10 };
    pub const VALUE_ACCELERATION: Dpt = Dpt { main: 14, sub: 0 };

    pub fn new(main: u8, sub: u16) -> Result<Self> {
        if !(1..=14).contains(&main) {
            return Err(KnxError::UnsupportedDpt(format!("{main}.{sub:03}")));
        }
        Ok(Self { main, sub })
    }

    #[inline]
    pub const fn main(self) -> u8 {
        self.main
    }

    #[inline]
    pub const fn sub(self) -> u16 {
        self.sub
    }

    pub const fn format(self) -> DptFormat {
        match self.main {
            1 => DptFormat::B1,
            2 => DptFormat::B2,
            3 => DptFormat::B1U3,
            4 => DptFormat::A8,
            5 => DptFormat::U8,
            6 if self.sub == 20 => DptFormat::B5N3,
            6 => DptFormat::V8,
            7 => DptFormat::U16,
            8 => DptFormat::V16,
            9 => DptFormat::F16,
            10 => DptFormat::N3N5R2N6R2N6,
            11 => DptFormat::R3N5R4N4R1U7,
            12 => DptFormat::U32,
            13 => DptFormat::V32,
            _ => DptFormat::F32,
        }
    }

    /// Object / telegram payload length (`bits / 8 + 1`)
    #[inline]
    pub const fn payload_length(self) -> u8 {
        self.format().payload_length()
    }

    /// Numeric encoding used by this datapoint, if it has one
    pub fn numeric_kind(self) -> Option<NumericKind> {
        NumericKind::for_format(self.format())
    }
}

impl fmt::Display for Dpt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}", self.main, self.sub)
    }
}

impl FromStr for Dpt {
    type Err = KnxError;

    fn from_str(s: &str) -> Result<Self> {
        let (main, sub) = s
            .trim()
            .split_once('.')
            .ok_or_else(|| KnxError::UnsupportedDpt(format!("'{s}': expected main.sub")))?;
        let main = main
            .parse::<u8>()
            .map_err(|e| KnxError::UnsupportedDpt(format!("'{s}': {e}")))?;
        let sub = sub
            .parse::<u16>()
            .map_err(|e| KnxError::UnsupportedDpt(format!("'{s}': {e}")))?;
        Self::new(main, sub)
    }
}

impl TryFrom<String> for Dpt {
    type Error = KnxError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Dpt> for String {
    fn from(dpt: Dpt) -> Self {
        dpt.to_string()
    }
}

/// Numeric wire encodings handled by the device read/write API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericKind {
    /// DPT 7.xxx
    U16,
    /// DPT 8.xxx
    I16,
    /// DPT 12.xxx
    U32,
    /// DPT 13.xxx
    I32,
    /// DPT 9.xxx, 2-byte KNX float
    F16,
}

impl NumericKind {
    pub fn for_format(format: DptFormat) -> Option<Self> {
        match format {
            DptFormat::U16 => Some(NumericKind::U16),
            DptFormat::V16 => Some(NumericKind::I16),
            DptFormat::U32 => Some(NumericKind::U32),
            DptFormat::V32 => Some(NumericKind::I32),
            DptFormat::F16 => Some(NumericKind::F16),
            _ => None,
        }
    }

    /// Encoded size in bytes
    pub const fn byte_len(self) -> usize {
        match self {
            NumericKind::U16 | NumericKind::I16 | NumericKind::F16 => 2,
            NumericKind::U32 | NumericKind::I32 => 4,
        }
    }
}

/// A numeric datapoint value tagged with its encoding
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericValue {
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    F16(f32),
}

impl NumericValue {
    pub fn kind(&self) -> NumericKind {
        match self {
            NumericValue::U16(_) => NumericKind::U16,
            NumericValue::I16(_) => NumericKind::I16,
            NumericValue::U32(_) => NumericKind::U32,
            NumericValue::I32(_) => NumericKind::I32,
            NumericValue::F16(_) => NumericKind::F16,
        }
    }

    /// Convert an application number into `kind`, checking the range
    pub fn from_f64(kind: NumericKind, value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(KnxError::out_of_range(format!("{value} is not finite")));
        }
        let check = |min: f64, max: f64| {
            if value < min || value > max {
                Err(KnxError::out_of_range(format!(
                    "{value} outside {kind:?} range [{min}, {max}]"
                )))
            } else {
                Ok(())
            }
        };
        Ok(match kind {
            NumericKind::U16 => {
                check(0.0, f64::from(u16::MAX))?;
                NumericValue::U16(value.round() as u16)
            }
            NumericKind::I16 => {
                check(f64::from(i16::MIN), f64::from(i16::MAX))?;
                NumericValue::I16(value.round() as i16)
            }
            NumericKind::U32 => {
                check(0.0, f64::from(u32::MAX))?;
                NumericValue::U32(value.round() as u32)
            }
            NumericKind::I32 => {
                check(f64::from(i32::MIN), f64::from(i32::MAX))?;
                NumericValue::I32(value.round() as i32)
            }
            NumericKind::F16 => {
                check(F16_MIN, F16_MAX)?;
                NumericValue::F16(value as f32)
            }
        })
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            NumericValue::U16(v) => f64::from(v),
            NumericValue::I16(v) => f64::from(v),
            NumericValue::U32(v) => f64::from(v),
            NumericValue::I32(v) => f64::from(v),
            NumericValue::F16(v) => f64::from(v),
        }
    }

    /// Write the big-endian encoding into `out`, returning the byte count
    pub fn encode(&self, out: &mut [u8]) -> Result<usize> {
        let len = self.kind().byte_len();
        if out.len() < len {
            return Err(KnxError::invalid_data(format!(
                "buffer too small for {:?}: {} < {}",
                self.kind(),
                out.len(),
                len
            )));
        }
        match *self {
            NumericValue::U16(v) => out[..2].copy_from_slice(&v.to_be_bytes()),
            NumericValue::I16(v) => out[..2].copy_from_slice(&v.to_be_bytes()),
            NumericValue::U32(v) => out[..4].copy_from_slice(&v.to_be_bytes()),
            NumericValue::I32(v) => out[..4].copy_from_slice(&v.to_be_bytes()),
            NumericValue::F16(v) => {
                out[..2].copy_from_slice(&encode_f16(f64::from(v))?.to_be_bytes());
            }
        }
        Ok(len)
    }

    /// Decode a big-endian value of `kind` from the start of `bytes`
    pub fn decode(kind: NumericKind, bytes: &[u8]) -> Result<Self> {
        let len = kind.byte_len();
        if bytes.len() < len {
            return Err(KnxError::invalid_data(format!(
                "{:?} needs {} bytes, got {}",
                kind,
                len,
                bytes.len()
            )));
        }
        let word = || u16::from_be_bytes([bytes[0], bytes[1]]);
        let dword = || u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        Ok(match kind {
            NumericKind::U16 => NumericValue::U16(word()),
            NumericKind::I16 => NumericValue::I16(word() as i16),
            NumericKind::U32 => NumericValue::U32(dword()),
            NumericKind::I32 => NumericValue::I32(dword() as i32),
            NumericKind::F16 => NumericValue::F16(decode_f16(word())? as f32),
        })
    }
}

/// Raw value marking an invalid 2-byte float
pub const F16_INVALID: u16 = 0x7FFF;
/// Largest encodable 2-byte float (2046 * 2^15 / 100, 2047 * 2^15 is the invalid marker)
pub const F16_MAX: f64 = 670_433.28;
/// Smallest encodable 2-byte float (-2048 * 2^15 / 100)
pub const F16_MIN: f64 = -671_088.64;

/// Encode a 2-byte KNX float: `0.01 * M * 2^E`, 12-bit signed mantissa, 4-bit exponent
pub fn encode_f16(value: f64) -> Result<u16> {
    if !value.is_finite() {
        return Err(KnxError::out_of_range(format!("{value} is not finite")));
    }
    let mut mantissa = value * 100.0;
    let mut exponent: u16 = 0;
    while mantissa.round() > 2047.0 || mantissa.round() < -2048.0 {
        mantissa /= 2.0;
        exponent += 1;
        if exponent > 15 {
            return Err(KnxError::out_of_range(format!(
                "{value} not representable as 2-byte float"
            )));
        }
    }
    let m = (mantissa.round() as i32 as u16) & 0x0FFF;
    let raw = ((m & 0x0800) << 4) | (exponent << 11) | (m & 0x07FF);
    if raw == F16_INVALID {
        return Err(KnxError::out_of_range(format!(
            "{value} encodes to the invalid 2-byte float marker"
        )));
    }
    Ok(raw)
}

/// Decode a 2-byte KNX float; `0x7FFF` is rejected as invalid data
pub fn decode_f16(raw: u16) -> Result<f64> {
    if raw == F16_INVALID {
        return Err(KnxError::invalid_data("2-byte float marked invalid (0x7FFF)"));
    }
    let exponent = i32::from((raw >> 11) & 0x0F);
    let mut mantissa = i32::from(raw & 0x07FF);
    if raw & 0x8000 != 0 {
        mantissa -= 2048;
    }
    Ok(f64::from(mantissa) * f64::from(1u32 << exponent) / 100.0)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_dpt_parse_and_display() {
        let dpt: Dpt = "9.001".parse().unwrap();
        assert_eq!(dpt, Dpt::VALUE_TEMP);
        assert_eq!(dpt.to_string(), "9.001");
        assert_eq!("13.010".parse::<Dpt>().unwrap(), Dpt::ACTIVE_ENERGY);

        assert!("15.001".parse::<Dpt>().is_err());
        assert!("0.001".parse::<Dpt>().is_err());
        assert!("9".parse::<Dpt>().is_err());
        assert!("x.1".parse::<Dpt>().is_err());
    }

    #[test]
    fn test_dpt_formats_and_lengths() {
        let cases = [
            (Dpt::SWITCH, DptFormat::B1, 1),
            (Dpt::new(2, 1).unwrap(), DptFormat::B2, 1),
            (Dpt::CONTROL_DIMMING, DptFormat::B1U3, 1),
            (Dpt::new(4, 1).unwrap(), DptFormat::A8, 2),
            (Dpt::SCALING, DptFormat::U8, 2),
            (Dpt::new(6, 1).unwrap(), DptFormat::V8, 2),
            (Dpt::STATUS_MODE3, DptFormat::B5N3, 2),
            (Dpt::VALUE_2_UCOUNT, DptFormat::U16, 3),
            (Dpt::VALUE_2_COUNT, DptFormat::V16, 3),
            (Dpt::VALUE_TEMP, DptFormat::F16, 3),
            (Dpt::TIME_OF_DAY, DptFormat::N3N5R2N6R2N6, 4),
            (Dpt::DATE, DptFormat::R3N5R4N4R1U7, 4),
            (Dpt::VALUE_4_UCOUNT, DptFormat::U32, 5),
            (Dpt::VALUE_4_COUNT, DptFormat::V32, 5),
            (Dpt::VALUE_ACCELERATION, DptFormat::F32, 5),
        ];
        for (dpt, format, length) in cases {
            assert_eq!(dpt.format(), format, "{dpt}");
            assert_eq!(dpt.payload_length(), length, "{dpt}");
        }
    }

    #[test]
    fn test_numeric_kind_mapping() {
        assert_eq!(Dpt::VALUE_TEMP.numeric_kind(), Some(NumericKind::F16));
        assert_eq!(Dpt::VALUE_2_COUNT.numeric_kind(), Some(NumericKind::I16));
        assert_eq!(Dpt::VALUE_4_UCOUNT.numeric_kind(), Some(NumericKind::U32));
        assert_eq!(Dpt::VALUE_ACCELERATION.numeric_kind(), None);
        assert_eq!(Dpt::SWITCH.numeric_kind(), None);
    }

    #[test]
    fn test_f16_known_values() {
        assert_eq!(encode_f16(0.0).unwrap(), 0x0000);
        assert_eq!(encode_f16(-1.0).unwrap(), 0x879C);
        assert_eq!(encode_f16(20.48).unwrap(), 0x0C00);
        assert_eq!(encode_f16(F16_MAX).unwrap(), 0x7FFE);
        assert_eq!(encode_f16(F16_MIN).unwrap(), 0xF800);

        assert!((decode_f16(0x879C).unwrap() + 1.0).abs() < 1e-9);
        assert!((decode_f16(0x0C00).unwrap() - 20.48).abs() < 1e-9);
        assert!((decode_f16(0x0C1A).unwrap() - 21.0).abs() < 0.02);
        assert!(decode_f16(F16_INVALID).is_err());
    }

    #[test]
    fn test_f16_out_of_range() {
        assert!(encode_f16(700_000.0).is_err());
        assert!(encode_f16(670_700.0).is_err());
        assert!(encode_f16(f64::NAN).is_err());
        assert!(NumericValue::from_f64(NumericKind::F16, -700_000.0).is_err());
    }

    #[test]
    fn test_numeric_encode_decode() {
        let mut buf = [0u8; 4];

        let n = NumericValue::I16(-2).encode(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[0xFF, 0xFE]);
        assert_eq!(
            NumericValue::decode(NumericKind::I16, &buf).unwrap(),
            NumericValue::I16(-2)
        );

        let n = NumericValue::U32(0x0102_0304).encode(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[1, 2, 3, 4]);

        let n = NumericValue::F16(-1.0).encode(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[0x87, 0x9C]);
        assert_eq!(
            NumericValue::decode(NumericKind::F16, &buf).unwrap(),
            NumericValue::F16(-1.0)
        );

        assert!(NumericValue::U32(1).encode(&mut [0u8; 2]).is_err());
        assert!(NumericValue::decode(NumericKind::I32, &[0, 1]).is_err());
    }

    #[test]
    fn test_numeric_from_f64_range() {
        assert_eq!(
            NumericValue::from_f64(NumericKind::U16, 65535.0).unwrap(),
            NumericValue::U16(65535)
        );
        assert!(NumericValue::from_f64(NumericKind::U16, -1.0).is_err());
        assert!(NumericValue::from_f64(NumericKind::I16, 40_000.0).is_err());
        assert_eq!(
            NumericValue::from_f64(NumericKind::I32, -12.4).unwrap(),
            NumericValue::I32(-12)
        );
        assert!(NumericValue::from_f64(NumericKind::U32, f64::INFINITY).is_err());
    }
}
