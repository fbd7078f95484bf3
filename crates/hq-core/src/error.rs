//! Error types for query parsing and transaction construction.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Malformed query: {0}")]
    MalformedQuery(String),

    #[error("Unsupported operator '{operator}' in {grammar} condition")]
    UnsupportedOperator {
        operator: String,
        grammar: Grammar,
    },

    #[error("Unsupported content type '{0}' (expected a json or xml variant)")]
    UnsupportedContentType(String),

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
}

/// Which condition grammar rejected an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    Standard,
    Length,
}

impl std::fmt::Display for Grammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Length => write!(f, "length"),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
