//! Standard message codec byte layout
//!
//! Every value is a one-byte type tag followed by its payload. Lengths use a
//! variable-width size prefix and numeric arrays are aligned relative to the
//! start of the buffer.
//!
//! # Format
//!
//! ```text
//! size:      n < 254           -> [n]
//!            n <= 0xFFFF       -> [254] [u16 LE]
//!            n <= 0xFFFF_FFFF  -> [255] [u32 LE]
//!
//! call:      [string method] [value args]
//! success:   [0x00] [value result]
//! error:     [0x01] [string code] [string|null message] [value details] ([string stacktrace])
//! ```

use super::MAX_NESTING_DEPTH;
use super::error::WireError;
use super::wire::{WireFormat, WireKind, WireMessage, WireValue};

const TAG_NULL: u8 = 0;
const TAG_TRUE: u8 = 1;
const TAG_FALSE: u8 = 2;
const TAG_INT32: u8 = 3;
const TAG_INT64: u8 = 4;
const TAG_FLOAT64: u8 = 6;
const TAG_STRING: u8 = 7;
const TAG_UINT8_LIST: u8 = 8;
const TAG_INT32_LIST: u8 = 9;
const TAG_INT64_LIST: u8 = 10;
const TAG_FLOAT64_LIST: u8 = 11;
const TAG_LIST: u8 = 12;
const TAG_MAP: u8 = 13;
const TAG_FLOAT32_LIST: u8 = 14;

const ENVELOPE_SUCCESS: u8 = 0;
const ENVELOPE_ERROR: u8 = 1;

const SIZE_U16: u8 = 254;
const SIZE_U32: u8 = 255;

/// Byte adapter implementing the standard message codec layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardWire;

impl StandardWire {
    /// Create the adapter
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl WireFormat for StandardWire {
    fn tree_encode(&self, message: &WireMessage) -> Result<Vec<u8>, WireError> {
        encode(message)
    }

    fn tree_decode(&self, bytes: &[u8], kind: WireKind) -> Result<WireMessage, WireError> {
        decode(bytes, kind)
    }
}

/// Encode a message tree to bytes
pub fn encode(message: &WireMessage) -> Result<Vec<u8>, WireError> {
    let mut writer = Writer::default();
    match message {
        WireMessage::MethodCall { method, args } => {
            writer.write_string(method)?;
            writer.write_value(args)?;
        }
        WireMessage::Success(result) => {
            writer.buf.push(ENVELOPE_SUCCESS);
            writer.write_value(result)?;
        }
        WireMessage::Error {
            code,
            message,
            details,
        } => {
            writer.buf.push(ENVELOPE_ERROR);
            writer.write_string(code)?;
            match message {
                Some(message) => writer.write_string(message)?,
                None => writer.buf.push(TAG_NULL),
            }
            writer.write_value(details)?;
        }
    }
    Ok(writer.buf)
}

/// Decode a message tree of the given kind
///
/// # Errors
///
/// Returns an error if:
/// - Input is truncated
/// - A type tag or envelope tag is unknown
/// - The method name or error code is not a string
/// - Containers nest deeper than [`MAX_NESTING_DEPTH`]
/// - Bytes remain after the message
pub fn decode(bytes: &[u8], kind: WireKind) -> Result<WireMessage, WireError> {
    let mut reader = Reader::new(bytes);
    let message = match kind {
        WireKind::MethodCall => {
            let method = reader.read_string_field("method")?;
            let args = reader.read_value(0)?;
            WireMessage::MethodCall { method, args }
        }
        WireKind::Response => match reader.read_u8()? {
            ENVELOPE_SUCCESS => WireMessage::Success(reader.read_value(0)?),
            ENVELOPE_ERROR => {
                let code = reader.read_string_field("error code")?;
                let message = reader.read_optional_string("error message")?;
                let details = reader.read_value(0)?;
                // Newer peers append a stacktrace; accept and drop it.
                if !reader.is_at_end() {
                    reader.read_optional_string("stacktrace")?;
                }
                WireMessage::Error {
                    code,
                    message,
                    details,
                }
            }
            tag => return Err(WireError::InvalidEnvelope { tag }),
        },
    };
    reader.finish()?;
    Ok(message)
}

#[derive(Default)]
struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn write_size(&mut self, size: usize) -> Result<(), WireError> {
        if size < usize::from(SIZE_U16) {
            self.buf.push(size as u8);
        } else if let Ok(size) = u16::try_from(size) {
            self.buf.push(SIZE_U16);
            self.buf.extend_from_slice(&size.to_le_bytes());
        } else if let Ok(size) = u32::try_from(size) {
            self.buf.push(SIZE_U32);
            self.buf.extend_from_slice(&size.to_le_bytes());
        } else {
            return Err(WireError::TooLarge {
                size,
                max: u32::MAX as usize,
            });
        }
        Ok(())
    }

    fn align(&mut self, alignment: usize) {
        let padding = (alignment - self.buf.len() % alignment) % alignment;
        self.buf.resize(self.buf.len() + padding, 0);
    }

    fn write_string(&mut self, value: &str) -> Result<(), WireError> {
        self.buf.push(TAG_STRING);
        self.write_size(value.len())?;
        self.buf.extend_from_slice(value.as_bytes());
        Ok(())
    }

    fn write_value(&mut self, value: &WireValue) -> Result<(), WireError> {
        match value {
            WireValue::Null => self.buf.push(TAG_NULL),
            WireValue::True => self.buf.push(TAG_TRUE),
            WireValue::False => self.buf.push(TAG_FALSE),
            WireValue::Int32(value) => {
                self.buf.push(TAG_INT32);
                self.buf.extend_from_slice(&value.to_le_bytes());
            }
            WireValue::Int64(value) => {
                self.buf.push(TAG_INT64);
                self.buf.extend_from_slice(&value.to_le_bytes());
            }
            WireValue::Float64(value) => {
                self.buf.push(TAG_FLOAT64);
                self.align(8);
                self.buf.extend_from_slice(&value.to_le_bytes());
            }
            WireValue::String(value) => self.write_string(value)?,
            WireValue::Uint8Array(values) => {
                self.buf.push(TAG_UINT8_LIST);
                self.write_size(values.len())?;
                self.buf.extend_from_slice(values);
            }
            WireValue::Int32Array(values) => {
                self.buf.push(TAG_INT32_LIST);
                self.write_size(values.len())?;
                self.align(4);
                for value in values {
                    self.buf.extend_from_slice(&value.to_le_bytes());
                }
            }
            WireValue::Int64Array(values) => {
                self.buf.push(TAG_INT64_LIST);
                self.write_size(values.len())?;
                self.align(8);
                for value in values {
                    self.buf.extend_from_slice(&value.to_le_bytes());
                }
            }
            WireValue::Float32Array(values) => {
                self.buf.push(TAG_FLOAT32_LIST);
                self.write_size(values.len())?;
                self.align(4);
                for value in values {
                    self.buf.extend_from_slice(&value.to_le_bytes());
                }
            }
            WireValue::Float64Array(values) => {
                self.buf.push(TAG_FLOAT64_LIST);
                self.write_size(values.len())?;
                self.align(8);
                for value in values {
                    self.buf.extend_from_slice(&value.to_le_bytes());
                }
            }
            WireValue::List(values) => {
                self.buf.push(TAG_LIST);
                self.write_size(values.len())?;
                for value in values {
                    self.write_value(value)?;
                }
            }
            WireValue::Map(entries) => {
                self.buf.push(TAG_MAP);
                self.write_size(entries.len())?;
                for (key, value) in entries {
                    self.write_value(key)?;
                    self.write_value(value)?;
                }
            }
        }
        Ok(())
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    fn finish(&self) -> Result<(), WireError> {
        match self.remaining() {
            0 => Ok(()),
            remaining => Err(WireError::TrailingBytes { remaining }),
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        if len > self.remaining() {
            return Err(WireError::UnexpectedEnd {
                needed: len,
                offset: self.pos,
                available: self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn read_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    fn read_size(&mut self) -> Result<usize, WireError> {
        match self.read_u8()? {
            SIZE_U16 => Ok(usize::from(u16::from_le_bytes(self.take_array()?))),
            SIZE_U32 => Ok(u32::from_le_bytes(self.take_array()?) as usize),
            size => Ok(usize::from(size)),
        }
    }

    fn align(&mut self, alignment: usize) -> Result<(), WireError> {
        let padding = (alignment - self.pos % alignment) % alignment;
        self.take(padding)?;
        Ok(())
    }

    /// Take `count` elements of `width` bytes, checking bounds before any
    /// allocation sized by untrusted input.
    fn take_elements(&mut self, count: usize, width: usize) -> Result<&'a [u8], WireError> {
        let len = count.checked_mul(width).ok_or(WireError::UnexpectedEnd {
            needed: usize::MAX,
            offset: self.pos,
            available: self.remaining(),
        })?;
        self.take(len)
    }

    fn read_string_payload(&mut self) -> Result<String, WireError> {
        let len = self.read_size()?;
        let offset = self.pos;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| WireError::InvalidUtf8 { offset })
    }

    fn read_string_field(&mut self, field: &'static str) -> Result<String, WireError> {
        match self.read_u8()? {
            TAG_STRING => self.read_string_payload(),
            tag => Err(WireError::ExpectedString { field, tag }),
        }
    }

    fn read_optional_string(&mut self, field: &'static str) -> Result<Option<String>, WireError> {
        match self.read_u8()? {
            TAG_NULL => Ok(None),
            TAG_STRING => self.read_string_payload().map(Some),
            tag => Err(WireError::ExpectedString { field, tag }),
        }
    }

    fn read_value(&mut self, depth: usize) -> Result<WireValue, WireError> {
        let offset = self.pos;
        let value = match self.read_u8()? {
            TAG_NULL => WireValue::Null,
            TAG_TRUE => WireValue::True,
            TAG_FALSE => WireValue::False,
            TAG_INT32 => WireValue::Int32(i32::from_le_bytes(self.take_array()?)),
            TAG_INT64 => WireValue::Int64(i64::from_le_bytes(self.take_array()?)),
            TAG_FLOAT64 => {
                self.align(8)?;
                WireValue::Float64(f64::from_le_bytes(self.take_array()?))
            }
            TAG_STRING => WireValue::String(self.read_string_payload()?),
            TAG_UINT8_LIST => {
                let len = self.read_size()?;
                WireValue::Uint8Array(self.take(len)?.to_vec())
            }
            TAG_INT32_LIST => {
                let count = self.read_size()?;
                self.align(4)?;
                let raw = self.take_elements(count, 4)?;
                WireValue::Int32Array(
                    raw.chunks_exact(4)
                        .map(|chunk| i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                        .collect(),
                )
            }
            TAG_INT64_LIST => {
                let count = self.read_size()?;
                self.align(8)?;
                let raw = self.take_elements(count, 8)?;
                WireValue::Int64Array(raw.chunks_exact(8).map(le_eight).map(i64::from_le_bytes).collect())
            }
            TAG_FLOAT32_LIST => {
                let count = self.read_size()?;
                self.align(4)?;
                let raw = self.take_elements(count, 4)?;
                WireValue::Float32Array(
                    raw.chunks_exact(4)
                        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                        .collect(),
                )
            }
            TAG_FLOAT64_LIST => {
                let count = self.read_size()?;
                self.align(8)?;
                let raw = self.take_elements(count, 8)?;
                WireValue::Float64Array(raw.chunks_exact(8).map(le_eight).map(f64::from_le_bytes).collect())
            }
            TAG_LIST => {
                let count = self.read_container_size(depth, 1)?;
                let mut values = Vec::with_capacity(count);
                for _ in 0..count {
                    values.push(self.read_value(depth + 1)?);
                }
                WireValue::List(values)
            }
            TAG_MAP => {
                let count = self.read_container_size(depth, 2)?;
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    let key = self.read_value(depth + 1)?;
                    let value = self.read_value(depth + 1)?;
                    entries.push((key, value));
                }
                WireValue::Map(entries)
            }
            tag => return Err(WireError::UnknownType { tag, offset }),
        };
        Ok(value)
    }

    /// Read a container size, rejecting counts that cannot fit in the rest of
    /// the input (each element is at least one byte per slot).
    fn read_container_size(&mut self, depth: usize, slots: usize) -> Result<usize, WireError> {
        if depth >= MAX_NESTING_DEPTH {
            return Err(WireError::NestingTooDeep {
                max: MAX_NESTING_DEPTH,
            });
        }
        let count = self.read_size()?;
        let needed = count.saturating_mul(slots);
        if needed > self.remaining() {
            return Err(WireError::UnexpectedEnd {
                needed,
                offset: self.pos,
                available: self.remaining(),
            });
        }
        Ok(count)
    }
}

fn le_eight(chunk: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(chunk);
    out
}
