//! Field values produced by extractors.

use crate::transaction::ContentType;
use serde::{Serialize, Serializer};
use std::borrow::Cow;

/// The value of one field of one transaction.
///
/// `Absent` means the field has no value for this transaction (for example a
/// response field on a request that never got a response). It is distinct
/// from an empty `Text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Integer(i64),
    ContentType(ContentType),
    Absent,
}

impl Value {
    /// String form used by comparisons, `None` for `Absent`.
    pub fn render(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Text(s) => Some(Cow::Borrowed(s)),
            Self::Integer(n) => Some(Cow::Owned(n.to_string())),
            Self::ContentType(ct) => Some(Cow::Borrowed(ct.token())),
            Self::Absent => None,
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Absent, Into::into)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(s) => serializer.serialize_str(s),
            Self::Integer(n) => serializer.serialize_i64(*n),
            Self::ContentType(ct) => serializer.serialize_str(ct.token()),
            Self::Absent => serializer.serialize_none(),
        }
    }
}
