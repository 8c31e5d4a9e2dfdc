//! MongoDB wire protocol
//!
//! OP_MSG framing plus the minimal BSON subset this crate needs to issue
//! commands (`hello`, `ping`, `saslStart`/`saslContinue`) and inspect their
//! replies.

pub mod constants;

mod decode;
mod document;
mod encode;
mod message;

pub use decode::{decode_document, decode_message};
pub use document::{Document, Value};
pub use encode::{encode_document, encode_message, encode_op_msg};
pub use message::Message;
