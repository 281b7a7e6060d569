//! # MQTT Serialization Utilities
//!
//! This module provides helper functions for reading and writing MQTT-specific data types
//! from and to byte buffers, such as variable-byte integers and length-prefixed strings.

use alloc::vec::Vec;

use crate::error::{MqttBleError, ParameterError};

/// Largest value a four-byte remaining-length field can carry.
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// Reads a variable-byte integer from the buffer, advancing the cursor.
///
/// This is the remaining-length encoding of MQTT 3.1.1 §2.2.3: seven bits per byte,
/// least significant group first, at most four bytes.
pub fn read_variable_byte_integer(cursor: &mut usize, buf: &[u8]) -> Result<usize, ParameterError> {
    let mut multiplier = 1;
    let mut value = 0;
    let mut i = 0;
    loop {
        let encoded_byte = buf
            .get(*cursor + i)
            .ok_or(ParameterError::MalformedPacket)?;
        value += (encoded_byte & 127) as usize * multiplier;
        if (encoded_byte & 128) == 0 {
            break;
        }
        multiplier *= 128;
        i += 1;
        if i >= 4 {
            return Err(ParameterError::MalformedPacket);
        }
    }
    *cursor += i + 1;
    Ok(value)
}

/// Writes a variable-byte integer to the buffer, advancing the cursor.
pub fn write_variable_byte_integer(
    cursor: &mut usize,
    buf: &mut [u8],
    mut val: usize,
) -> Result<(), ParameterError> {
    if val > MAX_REMAINING_LENGTH {
        return Err(ParameterError::MalformedPacket);
    }
    loop {
        let mut encoded_byte = (val % 128) as u8;
        val /= 128;
        if val > 0 {
            encoded_byte |= 128;
        }
        *buf.get_mut(*cursor).ok_or(ParameterError::BufferTooSmall)? = encoded_byte;
        *cursor += 1;
        if val == 0 {
            break;
        }
    }
    Ok(())
}

/// Number of bytes `val` occupies as a variable-byte integer.
pub fn variable_byte_integer_len(val: usize) -> usize {
    match val {
        0..=127 => 1,
        128..=16_383 => 2,
        16_384..=2_097_151 => 3,
        _ => 4,
    }
}

/// Reads a big-endian two-byte integer, advancing the cursor.
pub fn read_u16(cursor: &mut usize, buf: &[u8]) -> Result<u16, ParameterError> {
    let bytes = buf
        .get(*cursor..*cursor + 2)
        .ok_or(ParameterError::MalformedPacket)?;
    *cursor += 2;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Writes a big-endian two-byte integer, advancing the cursor.
pub fn write_u16(cursor: &mut usize, buf: &mut [u8], val: u16) -> Result<(), ParameterError> {
    buf.get_mut(*cursor..*cursor + 2)
        .ok_or(ParameterError::BufferTooSmall)?
        .copy_from_slice(&val.to_be_bytes());
    *cursor += 2;
    Ok(())
}

/// Reads binary data prefixed with a 2-byte length, advancing the cursor.
pub fn read_binary<'a>(cursor: &mut usize, buf: &'a [u8]) -> Result<&'a [u8], ParameterError> {
    let len = read_u16(cursor, buf)? as usize;
    let data = buf
        .get(*cursor..*cursor + len)
        .ok_or(ParameterError::MalformedPacket)?;
    *cursor += len;
    Ok(data)
}

/// Reads a UTF-8 encoded string (prefixed with a 2-byte length) from the buffer.
pub fn read_utf8_string<'a>(cursor: &mut usize, buf: &'a [u8]) -> Result<&'a str, ParameterError> {
    let bytes = read_binary(cursor, buf)?;
    core::str::from_utf8(bytes).map_err(|_| ParameterError::InvalidUtf8String)
}

/// Writes binary data prefixed with a 2-byte length, advancing the cursor.
pub fn write_binary(cursor: &mut usize, buf: &mut [u8], data: &[u8]) -> Result<(), ParameterError> {
    let len = u16::try_from(data.len()).map_err(|_| ParameterError::MalformedPacket)?;
    write_u16(cursor, buf, len)?;
    buf.get_mut(*cursor..*cursor + data.len())
        .ok_or(ParameterError::BufferTooSmall)?
        .copy_from_slice(data);
    *cursor += data.len();
    Ok(())
}

/// Writes a UTF-8 encoded string (prefixed with a 2-byte length) to the buffer.
pub fn write_utf8_string(cursor: &mut usize, buf: &mut [u8], s: &str) -> Result<(), ParameterError> {
    write_binary(cursor, buf, s.as_bytes())
}

/// Allocates an empty vector with room for exactly `capacity` items.
///
/// Heap exhaustion is reported as [`MqttBleError::NoMemory`] instead of aborting.
pub fn try_vec<T>(capacity: usize) -> Result<Vec<T>, MqttBleError> {
    let mut vec = Vec::new();
    vec.try_reserve_exact(capacity)
        .map_err(|_| MqttBleError::NoMemory)?;
    Ok(vec)
}
