//! MongoDB wire protocol constants

/// Wire message header length (messageLength, requestID, responseTo, opCode)
pub const HEADER_LEN: usize = 16;

/// OP_MSG opcode (MongoDB 3.6+)
pub const OP_MSG: i32 = 2013;

/// OP_COMPRESSED opcode (not supported; rejected on receipt)
pub const OP_COMPRESSED: i32 = 2012;

/// Maximum message length (48 MB), matching the server's `maxMessageSizeBytes`.
///
/// Any message whose length field exceeds this value is rejected before
/// allocation to prevent denial-of-service via crafted length headers.
pub const MAX_MESSAGE_LENGTH: usize = 48 * 1024 * 1024;

/// OP_MSG flag bits
pub mod flags {
    /// CRC-32C checksum appended after the sections
    pub const CHECKSUM_PRESENT: u32 = 0x1;

    /// Another message follows without a round-trip
    pub const MORE_TO_COME: u32 = 0x2;

    /// Client allows exhaust-style replies
    pub const EXHAUST_ALLOWED: u32 = 0x1_0000;
}

/// OP_MSG section kinds
pub mod section {
    /// Single BSON document body
    pub const BODY: u8 = 0;

    /// Document sequence (bulk operations; not produced by this crate)
    pub const DOC_SEQUENCE: u8 = 1;
}

/// BSON element type tags
pub mod bson {
    /// 64-bit IEEE 754 double
    pub const DOUBLE: u8 = 0x01;

    /// UTF-8 string
    pub const STRING: u8 = 0x02;

    /// Embedded document
    pub const DOCUMENT: u8 = 0x03;

    /// Array (encoded as a document with numeric keys)
    pub const ARRAY: u8 = 0x04;

    /// Binary data with subtype byte
    pub const BINARY: u8 = 0x05;

    /// ObjectId (12 bytes)
    pub const OBJECT_ID: u8 = 0x07;

    /// Boolean
    pub const BOOL: u8 = 0x08;

    /// UTC datetime (int64 millis)
    pub const DATETIME: u8 = 0x09;

    /// Null
    pub const NULL: u8 = 0x0A;

    /// Regular expression (two cstrings)
    pub const REGEX: u8 = 0x0B;

    /// 32-bit integer
    pub const INT32: u8 = 0x10;

    /// Internal timestamp (uint64)
    pub const TIMESTAMP: u8 = 0x11;

    /// 64-bit integer
    pub const INT64: u8 = 0x12;

    /// 128-bit decimal
    pub const DECIMAL128: u8 = 0x13;

    /// Generic binary subtype
    pub const BINARY_SUBTYPE_GENERIC: u8 = 0x00;
}
