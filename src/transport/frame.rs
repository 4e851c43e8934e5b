//! Wire framing for topic connections
//!
//! Every frame is a u32 little-endian length followed by that many payload
//! bytes. The first frame in each direction is a connection header whose
//! payload is a sequence of `key=value` fields, each with its own u32 length:
//!
//! ```text
//! +---------+---------+----------------+---------+--------------+ ...
//! | u32 len | u32 len | "topic=/chat"  | u32 len | "type=std/S" |
//! +---------+---------+----------------+---------+--------------+ ...
//!   frame     field 1                   field 2
//! ```
//!
//! After the headers, the subscriber grants the publisher credit with frames
//! whose payload is a single u32 little-endian count. The publisher writes
//! one message frame per unit of credit.

use std::collections::HashMap;
use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

/// Size of the length prefix
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Payload size of a credit frame
pub const CREDIT_SIZE: usize = 4;

/// Read one frame
///
/// Returns `Ok(None)` if the peer closed the connection between frames.
pub async fn read_frame<R>(reader: &mut R, max_frame_size: usize) -> Result<Option<Bytes>>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32_le().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if len > max_frame_size {
        return Err(Error::Protocol(format!(
            "Frame of {} bytes exceeds limit of {}",
            len, max_frame_size
        )));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(Bytes::from(payload)))
}

/// Write one frame
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    buf.put_u32_le(payload.len() as u32);
    buf.put_slice(payload);
    writer.write_all(&buf).await?;
    Ok(())
}

/// Encode connection header fields into a frame payload
pub fn encode_header(fields: &[(&str, &str)]) -> Bytes {
    let mut buf = BytesMut::new();
    for (key, value) in fields {
        let len = key.len() + 1 + value.len();
        buf.put_u32_le(len as u32);
        buf.put_slice(key.as_bytes());
        buf.put_u8(b'=');
        buf.put_slice(value.as_bytes());
    }
    buf.freeze()
}

/// Decode a connection header frame payload
pub fn decode_header(mut payload: Bytes) -> Result<HashMap<String, String>> {
    let mut fields = HashMap::new();

    while payload.has_remaining() {
        if payload.remaining() < LENGTH_PREFIX_SIZE {
            return Err(Error::Protocol("Truncated header field length".into()));
        }
        let len = payload.get_u32_le() as usize;
        if payload.remaining() < len {
            return Err(Error::Protocol(format!(
                "Header field of {} bytes overruns header",
                len
            )));
        }

        let field = payload.split_to(len);
        let field = std::str::from_utf8(&field)
            .map_err(|_| Error::Protocol("Header field is not UTF-8".into()))?;
        let (key, value) = field
            .split_once('=')
            .ok_or_else(|| Error::Protocol(format!("Header field missing '=': {}", field)))?;

        fields.insert(key.to_string(), value.to_string());
    }

    Ok(fields)
}

/// Read a frame and decode it as a connection header
pub async fn read_header<R>(reader: &mut R, max_frame_size: usize) -> Result<HashMap<String, String>>
where
    R: AsyncRead + Unpin,
{
    let payload = read_frame(reader, max_frame_size)
        .await?
        .ok_or_else(|| Error::Protocol("Connection closed before header".into()))?;
    decode_header(payload)
}

/// Grant the peer `count` more message frames
pub async fn write_credit<W>(writer: &mut W, count: u32) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    write_frame(writer, &count.to_le_bytes()).await
}

/// Read one credit grant
///
/// Returns `Ok(None)` if the peer closed the connection.
pub async fn read_credit<R>(reader: &mut R) -> Result<Option<u32>>
where
    R: AsyncRead + Unpin,
{
    let Some(mut payload) = read_frame(reader, CREDIT_SIZE).await? else {
        return Ok(None);
    };
    if payload.len() != CREDIT_SIZE {
        return Err(Error::Protocol(format!(
            "Credit frame of {} bytes, expected {}",
            payload.len(),
            CREDIT_SIZE
        )));
    }
    Ok(Some(payload.get_u32_le()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frame_roundtrip_over_duplex() {
        let (mut a, mut b) = tokio::io::duplex(64);

        write_frame(&mut a, b"hello").await.unwrap();
        write_frame(&mut a, b"").await.unwrap();
        drop(a);

        assert_eq!(
            read_frame(&mut b, 1024).await.unwrap(),
            Some(Bytes::from_static(b"hello"))
        );
        assert_eq!(read_frame(&mut b, 1024).await.unwrap(), Some(Bytes::new()));
        assert_eq!(read_frame(&mut b, 1024).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        write_frame(&mut a, &[0u8; 32]).await.unwrap();

        let result = read_frame(&mut b, 16).await;
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn test_credit_grants() {
        let (mut a, mut b) = tokio::io::duplex(64);

        write_credit(&mut a, 16).await.unwrap();
        write_credit(&mut a, 1).await.unwrap();
        drop(a);

        assert_eq!(read_credit(&mut b).await.unwrap(), Some(16));
        assert_eq!(read_credit(&mut b).await.unwrap(), Some(1));
        assert_eq!(read_credit(&mut b).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_malformed_credit_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        write_frame(&mut a, &[1, 0]).await.unwrap();

        assert!(matches!(read_credit(&mut b).await, Err(Error::Protocol(_))));
    }

    #[test]
    fn test_header_layout() {
        let header = encode_header(&[("topic", "/a")]);
        assert_eq!(&header[..], b"\x08\x00\x00\x00topic=/a");
    }

    #[test]
    fn test_header_decode_fields() {
        let header = encode_header(&[
            ("callerid", "/listener"),
            ("topic", "/chatter"),
            ("type", "std_msgs/String"),
        ]);
        let fields = decode_header(header).unwrap();

        assert_eq!(fields.len(), 3);
        assert_eq!(fields["callerid"], "/listener");
        assert_eq!(fields["topic"], "/chatter");
        assert_eq!(fields["type"], "std_msgs/String");
    }

    #[test]
    fn test_header_value_may_contain_equals() {
        let fields = decode_header(encode_header(&[("error", "a=b")])).unwrap();
        assert_eq!(fields["error"], "a=b");
    }

    #[test]
    fn test_header_missing_separator() {
        let payload = Bytes::from_static(b"\x03\x00\x00\x00abc");
        assert!(matches!(decode_header(payload), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_header_field_overrun() {
        let payload = Bytes::from_static(b"\x10\x00\x00\x00abc");
        assert!(matches!(decode_header(payload), Err(Error::Protocol(_))));
    }
}
