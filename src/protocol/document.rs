//! Minimal BSON document model
//!
//! Only the value types this crate sends and inspects are modeled. Command
//! documents preserve insertion order because the server requires the command
//! name to be the first element.

/// BSON value subset
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 64-bit double
    Double(f64),
    /// UTF-8 string
    String(String),
    /// Embedded document
    Document(Document),
    /// Binary data (generic subtype)
    Binary(Vec<u8>),
    /// Boolean
    Bool(bool),
    /// 32-bit integer
    Int32(i32),
    /// 64-bit integer
    Int64(i64),
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Document> for Value {
    fn from(v: Document) -> Self {
        Value::Document(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Binary(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

/// Ordered BSON document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    elements: Vec<(String, Value)>,
}

impl Document {
    /// Create an empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field, builder-style
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(key, value);
        self
    }

    /// Append a field
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.elements.push((key.into(), value.into()));
    }

    /// Iterate fields in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.elements.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Look up a field by name (first match)
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.elements
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Numeric field coerced to f64 (double, int32, or int64)
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            Value::Double(d) => Some(*d),
            Value::Int32(i) => Some(f64::from(*i)),
            Value::Int64(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// String field
    pub fn str_value(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Binary field
    pub fn binary(&self, key: &str) -> Option<&[u8]> {
        match self.get(key)? {
            Value::Binary(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    /// 32-bit integer field
    pub fn int32(&self, key: &str) -> Option<i32> {
        match self.get(key)? {
            Value::Int32(i) => Some(*i),
            _ => None,
        }
    }

    /// Boolean field
    pub fn boolean(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Whether the server reported success (`ok == 1`)
    pub fn is_ok(&self) -> bool {
        self.number("ok") == Some(1.0)
    }

    /// Server error message, if any
    pub fn error_message(&self) -> Option<&str> {
        self.str_value("errmsg")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_preserved() {
        let doc = Document::new()
            .with("ping", 1i32)
            .with("$db", "admin")
            .with("extra", true);
        let keys: Vec<&str> = doc.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["ping", "$db", "extra"]);
    }

    #[test]
    fn test_number_coercion() {
        let doc = Document::new()
            .with("a", 1.0f64)
            .with("b", 1i32)
            .with("c", 1i64);
        assert_eq!(doc.number("a"), Some(1.0));
        assert_eq!(doc.number("b"), Some(1.0));
        assert_eq!(doc.number("c"), Some(1.0));
        assert_eq!(doc.number("missing"), None);
    }

    #[test]
    fn test_is_ok_accepts_int_and_double() {
        assert!(Document::new().with("ok", 1.0f64).is_ok());
        assert!(Document::new().with("ok", 1i32).is_ok());
        assert!(!Document::new().with("ok", 0.0f64).is_ok());
        assert!(!Document::new().is_ok());
    }

    #[test]
    fn test_error_message() {
        let doc = Document::new()
            .with("ok", 0.0f64)
            .with("errmsg", "not authorized");
        assert_eq!(doc.error_message(), Some("not authorized"));
    }
}
