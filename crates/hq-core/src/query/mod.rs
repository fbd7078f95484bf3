//! # History Query Language
//!
//! SQL-like filtering and projection over recorded transactions:
//!
//! ```text
//! SELECT url, method FROM proxy WHERE path like '/api' AND len(req.body) > 10 LIMIT 20
//! ```
//!
//! Conditions form a single AND-chain. There is no OR, no grouping and no
//! ordering clause; results always come most recent first.

pub mod condition;
pub mod executor;
pub mod filter;
pub mod parser;
pub mod projector;

use crate::transaction::ContentType;
use crate::value::Value;
use std::collections::BTreeMap;

/// A parsed query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Requested fields as written (`*` selects every registered field).
    pub select_fields: Vec<String>,
    /// The name after `FROM`.
    pub source: String,
    /// Raw condition fragments in source order.
    pub where_conditions: Vec<String>,
    /// Maximum number of results, `0` = unbounded.
    pub limit: usize,
}

/// A single WHERE fragment after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Standard(StandardCondition),
    Length(LengthCondition),
}

/// `<field> <op> <value>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardCondition {
    pub key: String,
    pub op: CompareOp,
    pub operand: Operand,
}

/// `len(<field>) <op> <integer>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthCondition {
    pub key: String,
    pub op: LengthOp,
    /// The integer literal as written; parsed when evaluated.
    pub literal: String,
}

/// Right-hand side of a standard condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Text(String),
    /// Content-type conditions carry a marker, never free text.
    ContentType(ContentType),
}

impl Operand {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(s) => s,
            Self::ContentType(ct) => ct.token(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    /// Substring containment, case-sensitive.
    Like,
    Gt,
    Lt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthOp {
    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
}

/// What to do with a query that has no WHERE conditions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WherePolicy {
    /// Reject it as malformed.
    #[default]
    Required,
    /// Match every transaction.
    MatchAll,
}

/// One result row: lower-cased field name to extracted value.
pub type Row = BTreeMap<String, Value>;
