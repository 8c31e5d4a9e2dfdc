//! Wire message decoding

use super::constants::{bson, flags, section, HEADER_LEN, MAX_MESSAGE_LENGTH, OP_COMPRESSED, OP_MSG};
use super::document::Document;
use super::message::Message;
use bytes::BytesMut;
use std::io;

/// Decode one OP_MSG from the front of the buffer without copying the buffer.
///
/// # Returns
/// `Ok((msg, consumed))` - Message and number of bytes consumed. The caller
/// must advance the buffer by `consumed` after calling this.
///
/// `Err(e)` - `UnexpectedEof` if the message is incomplete (read more bytes
/// and retry), any other kind if the message is invalid.
pub fn decode_message(data: &mut BytesMut) -> io::Result<(Message, usize)> {
    if data.len() < 4 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "incomplete message header",
        ));
    }

    let len = i32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;

    if len > MAX_MESSAGE_LENGTH {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "message length {} exceeds maximum allowed {}",
                len, MAX_MESSAGE_LENGTH
            ),
        ));
    }
    // Smallest well-formed OP_MSG: header + flags + kind byte + empty document
    if len < HEADER_LEN + 10 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("message length {} below minimum", len),
        ));
    }

    if data.len() < HEADER_LEN {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "incomplete message header",
        ));
    }

    let request_id = i32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    let response_to = i32::from_le_bytes([data[8], data[9], data[10], data[11]]);
    let opcode = i32::from_le_bytes([data[12], data[13], data[14], data[15]]);

    // The opcode needs only the header, so garbage traffic is rejected
    // without waiting for a body that will never arrive.
    match opcode {
        OP_MSG => {}
        OP_COMPRESSED => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "OP_COMPRESSED is not supported (compression was never negotiated)",
            ));
        }
        other => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown opcode: {}", other),
            ));
        }
    }

    if data.len() < len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "incomplete message body",
        ));
    }

    let body_bytes = &data[HEADER_LEN..len];
    let msg_flags = u32::from_le_bytes([body_bytes[0], body_bytes[1], body_bytes[2], body_bytes[3]]);

    let kind = body_bytes[4];
    if kind != section::BODY {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unsupported OP_MSG section kind: {}", kind),
        ));
    }

    // A trailing CRC-32C (if CHECKSUM_PRESENT) sits after the document; the
    // document's own length field delimits it, so the checksum is skipped by
    // consuming `len` bytes regardless.
    let doc_bytes = &body_bytes[5..];
    let available = if msg_flags & flags::CHECKSUM_PRESENT != 0 {
        doc_bytes.len().saturating_sub(4)
    } else {
        doc_bytes.len()
    };
    let (body, _) = decode_document(&doc_bytes[..available])?;

    Ok((
        Message {
            request_id,
            response_to,
            flags: msg_flags,
            body,
        },
        len,
    ))
}

/// Decode a BSON document from the start of `data`.
///
/// Returns the document and the number of bytes it occupied. Element types
/// this crate does not model are skipped by their encoded size; a type whose
/// size cannot be determined is an error.
pub fn decode_document(data: &[u8]) -> io::Result<(Document, usize)> {
    if data.len() < 5 {
        return Err(invalid("truncated document"));
    }
    let doc_len = i32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if doc_len < 5 || doc_len > data.len() {
        return Err(invalid("document length out of bounds"));
    }
    if data[doc_len - 1] != 0 {
        return Err(invalid("missing document terminator"));
    }

    let mut doc = Document::new();
    let mut pos = 4;
    let end = doc_len - 1;

    while pos < end {
        let tag = data[pos];
        pos += 1;

        let name_end = data[pos..end]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| invalid("unterminated field name"))?
            + pos;
        let name = std::str::from_utf8(&data[pos..name_end])
            .map_err(|_| invalid("field name is not UTF-8"))?
            .to_string();
        pos = name_end + 1;

        let rest = &data[pos..end];
        let consumed = match tag {
            bson::DOUBLE => {
                let raw = fixed::<8>(rest)?;
                doc.push(name, f64::from_le_bytes(raw));
                8
            }
            bson::STRING => {
                let (s, n) = decode_string(rest)?;
                doc.push(name, s);
                n
            }
            bson::DOCUMENT | bson::ARRAY => {
                let (inner, n) = decode_document(rest)?;
                // Arrays are kept as documents with numeric keys
                doc.push(name, inner);
                n
            }
            bson::BINARY => {
                if rest.len() < 5 {
                    return Err(invalid("truncated binary element"));
                }
                let blen = i32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
                if rest.len() < 5 + blen {
                    return Err(invalid("binary element overruns document"));
                }
                doc.push(name, rest[5..5 + blen].to_vec());
                5 + blen
            }
            bson::BOOL => {
                let raw = fixed::<1>(rest)?;
                doc.push(name, raw[0] != 0);
                1
            }
            bson::INT32 => {
                let raw = fixed::<4>(rest)?;
                doc.push(name, i32::from_le_bytes(raw));
                4
            }
            bson::INT64 => {
                let raw = fixed::<8>(rest)?;
                doc.push(name, i64::from_le_bytes(raw));
                8
            }
            // Sized types we don't model: skip without recording
            bson::DATETIME | bson::TIMESTAMP => {
                fixed::<8>(rest)?;
                8
            }
            bson::OBJECT_ID => {
                fixed::<12>(rest)?;
                12
            }
            bson::DECIMAL128 => {
                fixed::<16>(rest)?;
                16
            }
            bson::NULL => 0,
            bson::REGEX => skip_regex(rest)?,
            other => {
                return Err(invalid(&format!("unsupported BSON element type 0x{:02X}", other)));
            }
        };
        pos += consumed;
    }

    if pos != end {
        return Err(invalid("document elements overran length"));
    }

    Ok((doc, doc_len))
}

fn decode_string(data: &[u8]) -> io::Result<(String, usize)> {
    if data.len() < 4 {
        return Err(invalid("truncated string element"));
    }
    let slen = i32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if slen == 0 || data.len() < 4 + slen {
        return Err(invalid("string element overruns document"));
    }
    if data[4 + slen - 1] != 0 {
        return Err(invalid("string missing NUL terminator"));
    }
    let s = std::str::from_utf8(&data[4..4 + slen - 1])
        .map_err(|_| invalid("string is not UTF-8"))?
        .to_string();
    Ok((s, 4 + slen))
}

fn skip_regex(data: &[u8]) -> io::Result<usize> {
    // Two consecutive cstrings: pattern and options
    let first = data
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| invalid("unterminated regex pattern"))?;
    let second = data[first + 1..]
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| invalid("unterminated regex options"))?;
    Ok(first + 1 + second + 1)
}

fn fixed<const N: usize>(data: &[u8]) -> io::Result<[u8; N]> {
    if data.len() < N {
        return Err(invalid("element overruns document"));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&data[..N]);
    Ok(out)
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode::{encode_document, encode_op_msg};
    use crate::protocol::Value;

    #[test]
    fn test_decode_roundtrips_command_reply() {
        let reply = Document::new()
            .with("ok", 1.0f64)
            .with("errmsg", "none")
            .with("conversationId", 1i32)
            .with("done", true);
        let mut wire = encode_op_msg(7, 3, &reply).unwrap();

        let (msg, consumed) = decode_message(&mut wire).unwrap();
        assert_eq!(consumed, wire.len());
        assert_eq!(msg.request_id, 7);
        assert_eq!(msg.response_to, 3);
        assert!(msg.body.is_ok());
        assert_eq!(msg.body.int32("conversationId"), Some(1));
        assert_eq!(msg.body.boolean("done"), Some(true));
    }

    #[test]
    fn test_decode_incomplete_header_is_eof() {
        let mut buf = BytesMut::from(&[0x10u8, 0x00][..]);
        let err = decode_message(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_decode_incomplete_body_is_eof() {
        let doc = Document::new().with("ok", 1.0f64);
        let wire = encode_op_msg(1, 0, &doc).unwrap();
        let mut partial = BytesMut::from(&wire[..wire.len() - 3]);
        let err = decode_message(&mut partial).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_decode_rejects_oversized_length() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&(i32::MAX).to_le_bytes());
        buf.extend_from_slice(&[0u8; 16]);
        let err = decode_message(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_decode_rejects_unknown_opcode() {
        let doc = Document::new().with("ok", 1.0f64);
        let mut wire = encode_op_msg(1, 0, &doc).unwrap();
        wire[12..16].copy_from_slice(&2004i32.to_le_bytes()); // OP_QUERY
        let err = decode_message(&mut wire).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_decode_skips_unmodeled_sized_types() {
        // Hand-build a document with a datetime (0x09) before a modeled field
        let mut buf = BytesMut::new();
        let inner = {
            let mut b = BytesMut::new();
            b.extend_from_slice(&[0x09]); // datetime
            b.extend_from_slice(b"when\0");
            b.extend_from_slice(&1_700_000_000_000i64.to_le_bytes());
            b.extend_from_slice(&[0x0A]); // null
            b.extend_from_slice(b"nothing\0");
            b.extend_from_slice(&[0x01]); // double
            b.extend_from_slice(b"ok\0");
            b.extend_from_slice(&1.0f64.to_le_bytes());
            b
        };
        let total = 4 + inner.len() + 1;
        buf.extend_from_slice(&(total as i32).to_le_bytes());
        buf.extend_from_slice(&inner);
        buf.extend_from_slice(&[0]);

        let (doc, consumed) = decode_document(&buf).unwrap();
        assert_eq!(consumed, total);
        assert!(doc.is_ok());
        assert!(doc.get("when").is_none());
    }

    #[test]
    fn test_decode_embedded_document() {
        let outer = Document::new()
            .with("ok", 1.0f64)
            .with("topology", Document::new().with("hosts", "a,b"));
        let mut buf = BytesMut::new();
        encode_document(&mut buf, &outer).unwrap();

        let (doc, _) = decode_document(&buf).unwrap();
        let inner = match doc.get("topology") {
            Some(Value::Document(d)) => d,
            other => panic!("expected document, got {:?}", other),
        };
        assert_eq!(inner.str_value("hosts"), Some("a,b"));
    }

    #[test]
    fn test_decode_missing_terminator() {
        let doc = Document::new().with("ok", 1.0f64);
        let mut buf = BytesMut::new();
        encode_document(&mut buf, &doc).unwrap();
        let last = buf.len() - 1;
        buf[last] = 0xFF;
        assert!(decode_document(&buf).is_err());
    }
}
