//! Primitive byte codec for the 118 format.
//!
//! Every multi-byte read and write branches on the file's declared byte
//! order: `MSF` is network order, `LSF` is reversed. The branch happens
//! per call; byte order is fixed before any data is written, so there is
//! nothing to cache.
//!
//! Readers pull from any [`Read`]; writers return owned byte images so
//! callers can route everything through the buffered sink.

use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::error::{DtaError, Result};
use crate::types::missing::{
    BYTE_MAX, BYTE_MIN, BYTE_MISSING, DOUBLE_MAX, DOUBLE_MISSING_BITS, FLOAT_MISSING_BITS,
    INT_MAX, INT_MIN, INT_MISSING, LONG_MAX, LONG_MIN, LONG_MISSING, byte_is_missing,
    double_is_missing, float_is_missing, int_is_missing, long_is_missing,
};

/// Byte length of the timestamp string ("dd Mon yyyy HH:mm").
pub const TIMESTAMP_LEN: usize = 17;

/// chrono format string producing the 17-byte timestamp.
pub const TIMESTAMP_FORMAT: &str = "%d %b %Y %H:%M";

/// Byte order of all multi-byte fields in a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ByteOrder {
    /// Most significant byte first (network order).
    Msf,
    /// Least significant byte first.
    #[default]
    Lsf,
}

impl ByteOrder {
    /// The three-byte marker stored in the header.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Msf => "MSF",
            Self::Lsf => "LSF",
        }
    }

    /// Parse the header marker, case-insensitively.
    pub fn from_marker(marker: &str) -> Result<Self> {
        match marker.to_uppercase().as_str() {
            "MSF" => Ok(Self::Msf),
            "LSF" => Ok(Self::Lsf),
            _ => Err(DtaError::InvalidByteOrder {
                value: marker.to_string(),
            }),
        }
    }
}

/// Read exactly `N` bytes.
pub fn read_array<const N: usize, R: Read>(reader: &mut R) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Read exactly `len` bytes.
pub fn read_vec<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

// Unsigned integers.

pub fn encode_u16(order: ByteOrder, value: u16) -> [u8; 2] {
    match order {
        ByteOrder::Msf => value.to_be_bytes(),
        ByteOrder::Lsf => value.to_le_bytes(),
    }
}

pub fn read_u16<R: Read>(reader: &mut R, order: ByteOrder) -> Result<u16> {
    let buf = read_array::<2, _>(reader)?;
    Ok(match order {
        ByteOrder::Msf => u16::from_be_bytes(buf),
        ByteOrder::Lsf => u16::from_le_bytes(buf),
    })
}

pub fn encode_u32(order: ByteOrder, value: u32) -> [u8; 4] {
    match order {
        ByteOrder::Msf => value.to_be_bytes(),
        ByteOrder::Lsf => value.to_le_bytes(),
    }
}

pub fn read_u32<R: Read>(reader: &mut R, order: ByteOrder) -> Result<u32> {
    let buf = read_array::<4, _>(reader)?;
    Ok(match order {
        ByteOrder::Msf => u32::from_be_bytes(buf),
        ByteOrder::Lsf => u32::from_le_bytes(buf),
    })
}

/// Encode the low 48 bits of `value`.
pub fn encode_u48(order: ByteOrder, value: u64) -> [u8; 6] {
    let wide = match order {
        ByteOrder::Msf => value.to_be_bytes(),
        ByteOrder::Lsf => value.to_le_bytes(),
    };
    let mut buf = [0u8; 6];
    match order {
        ByteOrder::Msf => buf.copy_from_slice(&wide[2..8]),
        ByteOrder::Lsf => buf.copy_from_slice(&wide[0..6]),
    }
    buf
}

pub fn read_u48<R: Read>(reader: &mut R, order: ByteOrder) -> Result<u64> {
    let narrow = read_array::<6, _>(reader)?;
    let mut wide = [0u8; 8];
    match order {
        ByteOrder::Msf => wide[2..8].copy_from_slice(&narrow),
        ByteOrder::Lsf => wide[0..6].copy_from_slice(&narrow),
    }
    Ok(match order {
        ByteOrder::Msf => u64::from_be_bytes(wide),
        ByteOrder::Lsf => u64::from_le_bytes(wide),
    })
}

pub fn encode_u64(order: ByteOrder, value: u64) -> [u8; 8] {
    match order {
        ByteOrder::Msf => value.to_be_bytes(),
        ByteOrder::Lsf => value.to_le_bytes(),
    }
}

pub fn read_u64<R: Read>(reader: &mut R, order: ByteOrder) -> Result<u64> {
    let buf = read_array::<8, _>(reader)?;
    Ok(match order {
        ByteOrder::Msf => u64::from_be_bytes(buf),
        ByteOrder::Lsf => u64::from_le_bytes(buf),
    })
}

// Numeric fields with missing-value sentinels.

/// Encode a `byte` field; absent or out-of-range values become the sentinel.
pub fn encode_byte_field(value: Option<i8>) -> [u8; 1] {
    let stored = match value {
        Some(v) if (BYTE_MIN..=BYTE_MAX).contains(&v) => v,
        _ => BYTE_MISSING,
    };
    [stored as u8]
}

pub fn read_byte_field<R: Read>(reader: &mut R) -> Result<Option<i8>> {
    let [raw] = read_array::<1, _>(reader)?;
    let value = raw as i8;
    Ok((!byte_is_missing(value)).then_some(value))
}

/// Encode an `int` field; absent or out-of-range values become the sentinel.
pub fn encode_int_field(order: ByteOrder, value: Option<i16>) -> [u8; 2] {
    let stored = match value {
        Some(v) if (INT_MIN..=INT_MAX).contains(&v) => v,
        _ => INT_MISSING,
    };
    encode_u16(order, stored as u16)
}

pub fn read_int_field<R: Read>(reader: &mut R, order: ByteOrder) -> Result<Option<i16>> {
    let value = read_u16(reader, order)? as i16;
    Ok((!int_is_missing(value)).then_some(value))
}

/// Encode a `long` field; absent or out-of-range values become the sentinel.
pub fn encode_long_field(order: ByteOrder, value: Option<i32>) -> [u8; 4] {
    let stored = match value {
        Some(v) if (LONG_MIN..=LONG_MAX).contains(&v) => v,
        _ => LONG_MISSING,
    };
    encode_u32(order, stored as u32)
}

pub fn read_long_field<R: Read>(reader: &mut R, order: ByteOrder) -> Result<Option<i32>> {
    let value = read_u32(reader, order)? as i32;
    Ok((!long_is_missing(value)).then_some(value))
}

/// Encode a `float` field.
///
/// The range check deliberately compares against the `long` bound, not
/// the float missing threshold — the format lineage has always written
/// it this way and files in the wild depend on it.
pub fn encode_float_field(order: ByteOrder, value: Option<f32>) -> [u8; 4] {
    let bits = match value {
        Some(v) if v.is_finite() && v <= LONG_MAX as f32 => v.to_bits(),
        _ => FLOAT_MISSING_BITS,
    };
    encode_u32(order, bits)
}

pub fn read_float_field<R: Read>(reader: &mut R, order: ByteOrder) -> Result<Option<f32>> {
    let value = f32::from_bits(read_u32(reader, order)?);
    Ok((!float_is_missing(value)).then_some(value))
}

/// Encode a `double` field; absent or out-of-range values become the
/// canonical missing bit pattern.
pub fn encode_double_field(order: ByteOrder, value: Option<f64>) -> [u8; 8] {
    let bits = match value {
        Some(v) if v.is_finite() && v <= DOUBLE_MAX => v.to_bits(),
        _ => DOUBLE_MISSING_BITS,
    };
    encode_u64(order, bits)
}

pub fn read_double_field<R: Read>(reader: &mut R, order: ByteOrder) -> Result<Option<f64>> {
    let value = f64::from_bits(read_u64(reader, order)?);
    Ok((!double_is_missing(value)).then_some(value))
}

// Strings.

/// Truncate to at most `max_chars` characters and `max_bytes` UTF-8
/// bytes, never splitting a multi-byte character.
pub fn truncate_text(text: &str, max_chars: usize, max_bytes: usize) -> &str {
    let mut end = 0;
    for (count, (index, ch)) in text.char_indices().enumerate() {
        if count >= max_chars || index + ch.len_utf8() > max_bytes {
            break;
        }
        end = index + ch.len_utf8();
    }
    &text[..end]
}

/// Encode a zero-padded fixed-width string field. Input longer than the
/// width is truncated at a character boundary.
pub fn encode_fixed_str(value: &str, width: usize) -> Vec<u8> {
    let kept = truncate_text(value, usize::MAX, width);
    let mut buf = vec![0u8; width];
    buf[..kept.len()].copy_from_slice(kept.as_bytes());
    buf
}

/// Read a fixed-width string field, stopping at the first zero byte.
pub fn read_fixed_str<R: Read>(reader: &mut R, width: usize) -> Result<String> {
    let buf = read_vec(reader, width)?;
    let end = buf.iter().position(|&b| b == 0).unwrap_or(width);
    Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
}

/// Encode a u16-length-prefixed string (the dataset label).
pub fn encode_prefixed_str(order: ByteOrder, value: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(2 + value.len());
    buf.extend_from_slice(&encode_u16(order, value.len() as u16));
    buf.extend_from_slice(value.as_bytes());
    buf
}

pub fn read_prefixed_str<R: Read>(reader: &mut R, order: ByteOrder) -> Result<String> {
    let len = read_u16(reader, order)? as usize;
    let buf = read_vec(reader, len)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

// Timestamp: one length byte (0 = absent, 17 = present) then the fixed
// "dd Mon yyyy HH:mm" string.

pub fn encode_timestamp(value: Option<&str>) -> Vec<u8> {
    match value {
        None => vec![0u8],
        Some(text) => {
            let mut buf = Vec::with_capacity(1 + TIMESTAMP_LEN);
            buf.push(TIMESTAMP_LEN as u8);
            let kept = truncate_text(text, usize::MAX, TIMESTAMP_LEN);
            buf.extend_from_slice(kept.as_bytes());
            buf.resize(1 + TIMESTAMP_LEN, b' ');
            buf
        }
    }
}

pub fn read_timestamp<R: Read>(reader: &mut R) -> Result<Option<String>> {
    let [len] = read_array::<1, _>(reader)?;
    match len as usize {
        0 => Ok(None),
        TIMESTAMP_LEN => {
            let buf = read_vec(reader, TIMESTAMP_LEN)?;
            Ok(Some(String::from_utf8_lossy(&buf).trim_end().to_string()))
        }
        other => Err(DtaError::invalid_format(format!(
            "timestamp length must be 0 or 17, found {other}"
        ))),
    }
}

/// Format the current local time as a header timestamp.
pub fn current_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}
