//! Error types for the chatwire-proto crate.

use thiserror::Error;

/// Errors that can occur while encoding or decoding frames.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// Failed to encode a frame.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Failed to decode a frame.
    #[error("decoding error: {0}")]
    Decoding(String),

    /// Missing required field.
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            ProtoError::Encoding("bad value".into()).to_string(),
            "encoding error: bad value"
        );
        assert_eq!(
            ProtoError::Decoding("eof".into()).to_string(),
            "decoding error: eof"
        );
        assert_eq!(
            ProtoError::MissingField("type").to_string(),
            "missing required field: type"
        );
    }
}
