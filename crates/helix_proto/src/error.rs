use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("field `{field}` exceeds the maximum base64 length of {max} (got {actual})")]
    OversizedField {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    #[error("invalid base64 in field `{field}`: {source}")]
    InvalidBase64 {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("unknown frame type {0}")]
    UnknownFrameType(u8),

    #[error("payload does not match the schema for frame type {frame_type}: {reason}")]
    SchemaViolation { frame_type: u8, reason: String },

    #[error("invalid identifier `{0}`")]
    InvalidIdentifier(String),
}
