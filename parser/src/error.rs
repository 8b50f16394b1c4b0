//! Error types for XML parsing.

/// Errors produced while decoding device XML.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The XML could not be deserialized into the expected shape
    #[error("XML deserialization failed: {0}")]
    XmlDecode(String),

    /// A required element was missing from an otherwise well-formed document
    #[error("missing element: {0}")]
    MissingElement(&'static str),

    /// The payload was structurally valid XML but carried an unusable value
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

/// Convenience alias for parse results.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
