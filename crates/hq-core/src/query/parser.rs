//! # Query Parser
//!
//! Splits a raw query string into its clauses:
//!
//! ```text
//! SELECT <field>[, <field>...] FROM <source> [WHERE <cond> [and <cond>...]] [LIMIT <n>]
//! ```
//!
//! Keywords are whitespace-delimited words matched without regard to ASCII
//! case. Text inside single or double quotes never counts as a keyword, so
//! `req.body like 'select and limit'` stays one condition.

use super::Query;
use crate::error::{Error, Result};

/// Parse a raw query string into a [`Query`].
pub fn parse(input: &str) -> Result<Query> {
    let input = input.trim();

    let select_pos = find_keyword(input, "SELECT", 0);
    let from_pos = find_keyword(input, "FROM", 0);
    let (select_pos, from_pos) = match (select_pos, from_pos) {
        (Some(s), Some(f)) if s < f => (s, f),
        (Some(_), Some(_)) => {
            return Err(Error::MalformedQuery("SELECT must come before FROM".into()))
        }
        _ => {
            return Err(Error::MalformedQuery(
                "missing SELECT or FROM clause".into(),
            ))
        }
    };

    let select_fields: Vec<String> = input[select_pos + "SELECT".len()..from_pos]
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if select_fields.is_empty() {
        return Err(Error::MalformedQuery("no fields selected".into()));
    }

    let where_pos = find_keyword(input, "WHERE", from_pos);
    let limit_pos = find_keyword(input, "LIMIT", from_pos);

    let source_end = [where_pos, limit_pos]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(input.len());
    let source = input[from_pos + "FROM".len()..source_end].trim().to_string();
    if source.is_empty() {
        return Err(Error::MalformedQuery("missing source after FROM".into()));
    }

    let where_conditions = match where_pos {
        Some(w) => {
            let end = limit_pos.filter(|&l| l > w).unwrap_or(input.len());
            split_and(&input[w + "WHERE".len()..end])
        }
        None => Vec::new(),
    };

    let limit = match limit_pos {
        Some(l) => {
            let end = where_pos.filter(|&w| w > l).unwrap_or(input.len());
            parse_limit(input[l + "LIMIT".len()..end].trim())
        }
        None => 0,
    };

    Ok(Query {
        select_fields,
        source,
        where_conditions,
        limit,
    })
}

/// Positive limits are kept, zero or negative mean unbounded, anything that
/// is not an integer falls back to a single result.
fn parse_limit(literal: &str) -> usize {
    match literal.parse::<i64>() {
        Ok(n) if n > 0 => usize::try_from(n).unwrap_or(usize::MAX),
        Ok(_) => 0,
        Err(_) => {
            tracing::warn!("Non-numeric LIMIT '{}', falling back to 1", literal);
            1
        }
    }
}

/// Split a WHERE clause on the `and` keyword.
fn split_and(clause: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut last = 0;
    for pos in keyword_positions(clause, "and") {
        parts.push(&clause[last..pos]);
        last = pos + "and".len();
    }
    parts.push(&clause[last..]);

    parts
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn find_keyword(input: &str, word: &str, from: usize) -> Option<usize> {
    keyword_positions(input, word)
        .into_iter()
        .find(|&pos| pos >= from)
}

/// Byte offsets of every standalone, unquoted occurrence of `word`.
fn keyword_positions(input: &str, word: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut quote: Option<char> = None;
    let mut prev_is_space = true;

    for (pos, ch) in input.char_indices() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                }
            }
            None if ch == '\'' || ch == '"' => quote = Some(ch),
            None => {
                if prev_is_space && is_word_at(input, pos, word) {
                    positions.push(pos);
                }
            }
        }
        prev_is_space = ch.is_whitespace();
    }

    positions
}

fn is_word_at(input: &str, pos: usize, word: &str) -> bool {
    let end = pos + word.len();
    let matches = input
        .get(pos..end)
        .is_some_and(|candidate| candidate.eq_ignore_ascii_case(word));
    matches && input[end..].chars().next().map_or(true, char::is_whitespace)
}
