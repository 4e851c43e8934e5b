//! Message type capability
//!
//! Every topic is declared with a concrete message type. The type supplies
//! its declared schema name and the conversion to and from a wire frame;
//! the registry only ever sees the erased result.

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Capability bundle for a topic's message type
pub trait Message: Sized + Send + 'static {
    /// Declared schema name, e.g. `std_msgs/String`
    fn type_name() -> &'static str;

    /// Serialize into a single wire frame (without the frame length prefix)
    fn encode(&self) -> Bytes;

    /// Deserialize from a single wire frame
    fn decode(frame: Bytes) -> Result<Self, DecodeError>;
}

/// Failure to decode a wire frame into a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Frame ended before the message was complete
    Truncated { needed: usize, available: usize },
    /// Frame had bytes left over after the message
    TrailingBytes(usize),
    /// String payload was not valid UTF-8
    InvalidUtf8,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Truncated { needed, available } => {
                write!(f, "Truncated frame: need {} bytes, have {}", needed, available)
            }
            DecodeError::TrailingBytes(n) => write!(f, "{} trailing bytes after message", n),
            DecodeError::InvalidUtf8 => write!(f, "Invalid UTF-8 in string field"),
        }
    }
}

impl std::error::Error for DecodeError {}

fn ensure(buf: &Bytes, needed: usize) -> Result<(), DecodeError> {
    if buf.remaining() < needed {
        return Err(DecodeError::Truncated {
            needed,
            available: buf.remaining(),
        });
    }
    Ok(())
}

fn finish(buf: &Bytes) -> Result<(), DecodeError> {
    match buf.remaining() {
        0 => Ok(()),
        n => Err(DecodeError::TrailingBytes(n)),
    }
}

/// `std_msgs/String`: u32 LE length followed by UTF-8 bytes
impl Message for String {
    fn type_name() -> &'static str {
        "std_msgs/String"
    }

    fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(4 + self.len());
        buf.put_u32_le(self.len() as u32);
        buf.put_slice(self.as_bytes());
        buf.freeze()
    }

    fn decode(mut frame: Bytes) -> Result<Self, DecodeError> {
        ensure(&frame, 4)?;
        let len = frame.get_u32_le() as usize;
        ensure(&frame, len)?;
        let data = frame.split_to(len);
        finish(&frame)?;
        String::from_utf8(data.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
    }
}

/// `std_msgs/Int32`: little-endian i32
impl Message for i32 {
    fn type_name() -> &'static str {
        "std_msgs/Int32"
    }

    fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(4);
        buf.put_i32_le(*self);
        buf.freeze()
    }

    fn decode(mut frame: Bytes) -> Result<Self, DecodeError> {
        ensure(&frame, 4)?;
        let value = frame.get_i32_le();
        finish(&frame)?;
        Ok(value)
    }
}
