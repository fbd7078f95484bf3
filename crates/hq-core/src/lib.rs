//! # hq-core: query engine for recorded proxy history
//!
//! Filters and projects recorded HTTP transactions with a small SQL-like
//! language:
//!
//! ```text
//! SELECT url, status_code FROM proxy WHERE method = 'POST' and len(req.body) > 10 LIMIT 20
//! ```
//!
//! The engine is synchronous and read-only. It takes a history snapshot
//! ordered oldest first and returns rows most recent first. Storage and
//! transport belong to the host (see the `hq-hub` crate).

pub mod error;
pub mod fields;
pub mod query;
pub mod transaction;
pub mod value;

pub use error::{Error, Grammar, Result};
pub use fields::{Extractor, FieldRegistry};
pub use query::executor::QueryEngine;
pub use query::parser::parse;
pub use query::{
    CompareOp, Condition, LengthCondition, LengthOp, Operand, Query, Row, StandardCondition,
    WherePolicy,
};
pub use transaction::{ContentType, Response, Transaction};
pub use value::Value;
