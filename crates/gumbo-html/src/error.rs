//! Error types for the engine boundary

/// A foreign record could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Null {record} record pointer")]
    NullRecord { record: &'static str },

    #[error("Node type '{0}' is not implemented")]
    UnknownNodeType(u32),

    #[error("Unknown tag value {0}")]
    UnknownTag(u32),

    #[error("Unknown {field} value {raw}")]
    UnknownValue { field: &'static str, raw: u32 },
}

/// The engine failed to produce an output blob
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Input too large for the engine: {0} bytes")]
    InputTooLarge(usize),

    #[error("Engine returned no output")]
    NoOutput,

    #[error("Engine failed: {0}")]
    Failed(String),
}
