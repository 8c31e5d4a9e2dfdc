//! Wire message encoding
//!
//! All integers are little-endian per the BSON and MongoDB wire specs.

use super::constants::{bson, section, HEADER_LEN, OP_MSG};
use super::document::{Document, Value};
use bytes::{BufMut, BytesMut};
use std::io;

/// Encode a client command as an OP_MSG wire message
pub fn encode_message(request_id: i32, body: &Document) -> io::Result<BytesMut> {
    encode_op_msg(request_id, 0, body)
}

/// Encode an OP_MSG with an explicit responseTo (server replies set this)
pub fn encode_op_msg(request_id: i32, response_to: i32, body: &Document) -> io::Result<BytesMut> {
    let mut buf = BytesMut::new();

    // Header: length is filled in at the end
    buf.put_i32_le(0);
    buf.put_i32_le(request_id);
    buf.put_i32_le(response_to);
    buf.put_i32_le(OP_MSG);

    // Flag bits (none set) and a single body section
    buf.put_u32_le(0);
    buf.put_u8(section::BODY);
    encode_document(&mut buf, body)?;

    let len = buf.len();
    buf[0..4].copy_from_slice(&(len as i32).to_le_bytes());

    debug_assert!(len >= HEADER_LEN + 5);
    Ok(buf)
}

/// Encode a BSON document into the buffer
pub fn encode_document(buf: &mut BytesMut, doc: &Document) -> io::Result<()> {
    let len_pos = buf.len();
    buf.put_i32_le(0);

    for (key, value) in doc.iter() {
        encode_element(buf, key, value)?;
    }

    // Document terminator
    buf.put_u8(0);

    let len = buf.len() - len_pos;
    buf[len_pos..len_pos + 4].copy_from_slice(&(len as i32).to_le_bytes());

    Ok(())
}

fn encode_element(buf: &mut BytesMut, key: &str, value: &Value) -> io::Result<()> {
    if key.as_bytes().contains(&0) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("field name contains NUL byte: {:?}", key),
        ));
    }

    match value {
        Value::Double(d) => {
            buf.put_u8(bson::DOUBLE);
            put_cstring(buf, key);
            buf.put_f64_le(*d);
        }
        Value::String(s) => {
            buf.put_u8(bson::STRING);
            put_cstring(buf, key);
            // Length includes the trailing NUL
            buf.put_i32_le(s.len() as i32 + 1);
            buf.put(s.as_bytes());
            buf.put_u8(0);
        }
        Value::Document(doc) => {
            buf.put_u8(bson::DOCUMENT);
            put_cstring(buf, key);
            encode_document(buf, doc)?;
        }
        Value::Binary(data) => {
            buf.put_u8(bson::BINARY);
            put_cstring(buf, key);
            buf.put_i32_le(data.len() as i32);
            buf.put_u8(bson::BINARY_SUBTYPE_GENERIC);
            buf.put_slice(data);
        }
        Value::Bool(b) => {
            buf.put_u8(bson::BOOL);
            put_cstring(buf, key);
            buf.put_u8(u8::from(*b));
        }
        Value::Int32(i) => {
            buf.put_u8(bson::INT32);
            put_cstring(buf, key);
            buf.put_i32_le(*i);
        }
        Value::Int64(i) => {
            buf.put_u8(bson::INT64);
            put_cstring(buf, key);
            buf.put_i64_le(*i);
        }
    }
    Ok(())
}

fn put_cstring(buf: &mut BytesMut, s: &str) {
    buf.put(s.as_bytes());
    buf.put_u8(0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::constants::OP_MSG;

    #[test]
    fn test_encode_empty_document() {
        let mut buf = BytesMut::new();
        encode_document(&mut buf, &Document::new()).unwrap();
        // int32 length (5) + terminator
        assert_eq!(&buf[..], &[5, 0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_ping_command() {
        let doc = Document::new().with("ping", 1i32).with("$db", "admin");
        let mut buf = BytesMut::new();
        encode_document(&mut buf, &doc).unwrap();

        let len = i32::from_le_bytes(buf[0..4].try_into().unwrap()) as usize;
        assert_eq!(len, buf.len());
        // First element: int32 "ping"
        assert_eq!(buf[4], 0x10);
        assert_eq!(&buf[5..10], b"ping\0");
    }

    #[test]
    fn test_encode_message_header() {
        let doc = Document::new().with("ping", 1i32);
        let buf = encode_message(42, &doc).unwrap();

        let total = i32::from_le_bytes(buf[0..4].try_into().unwrap()) as usize;
        assert_eq!(total, buf.len());
        assert_eq!(i32::from_le_bytes(buf[4..8].try_into().unwrap()), 42);
        assert_eq!(i32::from_le_bytes(buf[8..12].try_into().unwrap()), 0);
        assert_eq!(i32::from_le_bytes(buf[12..16].try_into().unwrap()), OP_MSG);
        // Flag bits zero, body section kind 0
        assert_eq!(&buf[16..20], &[0, 0, 0, 0]);
        assert_eq!(buf[20], 0);
    }

    #[test]
    fn test_encode_rejects_nul_in_key() {
        let doc = Document::new().with("bad\0key", 1i32);
        let mut buf = BytesMut::new();
        assert!(encode_document(&mut buf, &doc).is_err());
    }

    #[test]
    fn test_encode_binary_element() {
        let doc = Document::new().with("payload", vec![0xDEu8, 0xAD]);
        let mut buf = BytesMut::new();
        encode_document(&mut buf, &doc).unwrap();
        // type, "payload\0", len=2, subtype 0, bytes
        assert_eq!(buf[4], 0x05);
        assert_eq!(&buf[13..17], &[2, 0, 0, 0]);
        assert_eq!(buf[17], 0x00);
        assert_eq!(&buf[18..20], &[0xDE, 0xAD]);
    }
}
