//! # Condition Parser & Evaluator
//!
//! Each WHERE fragment is tried against two grammars, in order:
//!
//! 1. length: `len(<field>) <op> <integer>` with `=`, `!=`, `>`, `<`, `>=`, `<=`
//! 2. standard: `<field> <op> <value>` with `=`, `!=`, `like`, `>`, `<`
//!
//! A value is `'single quoted'`, `"double quoted"` or a bare token without
//! whitespace. An operator the matched grammar does not support is an error;
//! a fragment that fits neither grammar is simply not a condition.

use super::{CompareOp, Condition, LengthCondition, LengthOp, Operand, StandardCondition};
use crate::error::{Error, Grammar, Result};
use crate::fields::FieldRegistry;
use crate::transaction::{ContentType, Transaction};
use crate::value::Value;
use once_cell::sync::Lazy;
use regex::Regex;

static LEN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^len\(\s*([^()\s]+)\s*\)\s*([=!<>~]+|[a-z]+)\s*(.*)$")
        .expect("length condition pattern")
});

const FIELD: &str = r"([A-Za-z_][\w-]*(?:\.[A-Za-z_][\w-]*)?)";

/// An operator run set off from its value by whitespace or a quote.
static SYMBOL_OP_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r#"^{FIELD}\s*([=!<>~]+)(\s.*|['"].*)?$"#))
        .expect("symbol operator pattern")
});

/// An operator glued to a bare value, as in `req.body=<script>`.
static GLUED_OP_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^{FIELD}\s*(!=|>=|<=|=|>|<)(.*)$")).expect("glued operator pattern")
});

static WORD_OP_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r#"^{FIELD}\s+([A-Za-z]+)(\s.*|['"].*)$"#))
        .expect("word operator pattern")
});

static VALUE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?:'([^']*)'|"([^"]*)"|([^\s'"]\S*))$"#).expect("value pattern")
});

static INTEGER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+$").expect("integer pattern"));

impl Condition {
    /// Parse one WHERE fragment. `Ok(None)` means it fits neither grammar.
    pub fn parse(raw: &str) -> Result<Option<Self>> {
        let raw = raw.trim();

        if let Some(caps) = LEN_PATTERN.captures(raw) {
            let op = match &caps[2] {
                "=" => LengthOp::Eq,
                "!=" => LengthOp::Neq,
                ">" => LengthOp::Gt,
                "<" => LengthOp::Lt,
                ">=" => LengthOp::Gte,
                "<=" => LengthOp::Lte,
                other => {
                    return Err(Error::UnsupportedOperator {
                        operator: other.to_string(),
                        grammar: Grammar::Length,
                    })
                }
            };
            let literal = caps[3].trim();
            if !INTEGER_PATTERN.is_match(literal) {
                return Ok(None);
            }
            return Ok(Some(Self::Length(LengthCondition {
                key: caps[1].to_lowercase(),
                op,
                literal: literal.to_string(),
            })));
        }

        let Some(caps) = SYMBOL_OP_PATTERN
            .captures(raw)
            .or_else(|| GLUED_OP_PATTERN.captures(raw))
            .or_else(|| WORD_OP_PATTERN.captures(raw))
        else {
            return Ok(None);
        };

        let key = caps[1].to_lowercase();
        let op = match caps[2].to_lowercase().as_str() {
            "=" => CompareOp::Eq,
            "!=" => CompareOp::Neq,
            "like" => CompareOp::Like,
            ">" => CompareOp::Gt,
            "<" => CompareOp::Lt,
            _ => {
                return Err(Error::UnsupportedOperator {
                    operator: caps[2].to_string(),
                    grammar: Grammar::Standard,
                })
            }
        };

        let rest = caps.get(3).map_or("", |m| m.as_str());
        let Some(value) = VALUE_PATTERN.captures(rest.trim()) else {
            return Ok(None);
        };
        let value = value
            .get(1)
            .or_else(|| value.get(2))
            .or_else(|| value.get(3))
            .map_or("", |m| m.as_str());

        let operand = if key == "req.content_type" || key == "resp.content_type" {
            Operand::ContentType(content_type_operand(value)?)
        } else {
            Operand::Text(value.to_string())
        };

        Ok(Some(Self::Standard(StandardCondition { key, op, operand })))
    }

    pub fn key(&self) -> &str {
        match self {
            Self::Standard(c) => &c.key,
            Self::Length(c) => &c.key,
        }
    }

    /// Evaluate against one transaction. Unknown fields and absent values
    /// never satisfy a condition.
    pub fn evaluate(&self, tx: &Transaction, registry: &FieldRegistry) -> bool {
        let Some(value) = registry.extract(self.key(), tx) else {
            tracing::debug!("Unknown field '{}' in condition", self.key());
            return false;
        };
        let Some(text) = value.render() else {
            return false;
        };

        match self {
            Self::Standard(c) => c.matches(&value, &text),
            Self::Length(c) => c.matches(&text),
        }
    }
}

impl StandardCondition {
    fn matches(&self, value: &Value, text: &str) -> bool {
        if let (Operand::ContentType(expected), Value::ContentType(actual)) =
            (&self.operand, value)
        {
            match self.op {
                CompareOp::Eq => return actual == expected,
                CompareOp::Neq => return actual != expected,
                _ => {}
            }
        }

        let operand = self.operand.as_str();
        match self.op {
            CompareOp::Eq => text == operand,
            CompareOp::Neq => text != operand,
            CompareOp::Like => text.contains(operand),
            CompareOp::Gt => text > operand,
            CompareOp::Lt => text < operand,
        }
    }
}

impl LengthCondition {
    fn matches(&self, text: &str) -> bool {
        let Ok(expected) = self.literal.parse::<usize>() else {
            return false;
        };
        let length = text.chars().count();
        match self.op {
            LengthOp::Eq => length == expected,
            LengthOp::Neq => length != expected,
            LengthOp::Gt => length > expected,
            LengthOp::Lt => length < expected,
            LengthOp::Gte => length >= expected,
            LengthOp::Lte => length <= expected,
        }
    }
}

fn content_type_operand(value: &str) -> Result<ContentType> {
    let lowered = value.to_lowercase();
    if lowered.contains("json") {
        Ok(ContentType::Json)
    } else if lowered.contains("xml") {
        Ok(ContentType::Xml)
    } else {
        Err(Error::UnsupportedContentType(value.to_string()))
    }
}
