use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncodingError {
    #[error("key at position {position} cannot be encoded: {source}")]
    Key {
        position: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("value at position {position} cannot be encoded: {source}")]
    Value {
        position: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write the encoded map")]
    Io(#[from] std::io::Error),
}

impl EncodingError {
    /// Position in the key order of the entry that failed, if the failure came
    /// from an entry rather than the writer.
    pub fn position(&self) -> Option<usize> {
        match self {
            EncodingError::Key { position, .. } | EncodingError::Value { position, .. } => {
                Some(*position)
            }
            EncodingError::Io(_) => None,
        }
    }
}
