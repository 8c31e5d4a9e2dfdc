//! Wire message type

use super::document::Document;

/// A decoded OP_MSG wire message
///
/// The same shape serves both directions: client commands carry
/// `response_to == 0`; server replies set it to the request id they answer.
#[derive(Debug, Clone)]
pub struct Message {
    /// Sender-assigned message id
    pub request_id: i32,
    /// Request id this message responds to (0 for client commands)
    pub response_to: i32,
    /// OP_MSG flag bits
    pub flags: u32,
    /// Body section document
    pub body: Document,
}
