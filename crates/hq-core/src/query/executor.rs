//! # Query Executor
//!
//! Runs a raw query string end to end against a history snapshot:
//! parse, apply the empty-WHERE policy, filter, project.

use super::{filter, parser, projector, Query, Row, WherePolicy};
use crate::error::{Error, Result};
use crate::fields::FieldRegistry;
use crate::transaction::Transaction;
use std::borrow::Borrow;
use std::time::Instant;

/// A field registry plus the policy for queries without conditions.
#[derive(Debug, Clone, Default)]
pub struct QueryEngine {
    registry: FieldRegistry,
    where_policy: WherePolicy,
}

impl QueryEngine {
    pub fn new(registry: FieldRegistry, where_policy: WherePolicy) -> Self {
        Self {
            registry,
            where_policy,
        }
    }

    pub fn where_policy(&self) -> WherePolicy {
        self.where_policy
    }

    /// Parse `raw` and check it against the empty-WHERE policy.
    pub fn prepare(&self, raw: &str) -> Result<Query> {
        let query = parser::parse(raw)?;
        tracing::debug!(
            select = ?query.select_fields,
            source = %query.source,
            conditions = ?query.where_conditions,
            limit = query.limit,
            "Parsed query"
        );

        if query.where_conditions.is_empty() && self.where_policy == WherePolicy::Required {
            return Err(Error::MalformedQuery("a WHERE clause is required".into()));
        }
        Ok(query)
    }

    /// Execute `raw` against `history`, which is ordered oldest first.
    pub fn execute<T: Borrow<Transaction>>(&self, raw: &str, history: &[T]) -> Result<Vec<Row>> {
        let start = Instant::now();
        let query = self.prepare(raw)?;

        let matched = filter::filter(
            history,
            &query.where_conditions,
            query.limit,
            &self.registry,
        )?;
        let rows = projector::project(&matched, &query.select_fields, &self.registry);

        tracing::info!(
            "Query over {} transactions matched {} in {}ms",
            history.len(),
            rows.len(),
            start.elapsed().as_millis()
        );
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn history() -> Vec<Transaction> {
        let raw = [
            ("https://shop.test/api/v2/users", "GET", "", None),
            (
                "https://shop.test/api/login",
                "POST",
                "user=alice&pw=hunter2",
                Some("HTTP/1.1 302 Found\r\nContent-Type: text/html\r\n\r\n"),
            ),
            (
                "https://shop.test/api/cart",
                "POST",
                "{\"sku\":42}",
                Some("HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n{\"ok\":true}"),
            ),
            ("https://shop.test/index.html", "GET", "", None),
        ];
        raw.iter()
            .map(|(url, method, body, response)| {
                let content_type = if body.starts_with('{') {
                    "application/json"
                } else {
                    "application/x-www-form-urlencoded"
                };
                Transaction::from_raw(
                    url,
                    &format!(
                        "{} / HTTP/1.1\r\nContent-Type: {}\r\n\r\n{}",
                        method, content_type, body
                    ),
                    *response,
                )
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_execute_end_to_end() {
        let engine = QueryEngine::default();
        let rows = engine
            .execute(
                "SELECT url, status_code FROM proxy WHERE method = 'POST' and path like '/api' LIMIT 10",
                &history(),
            )
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["url"], Value::from("https://shop.test/api/cart"));
        assert_eq!(rows[0]["status_code"], Value::Integer(200));
        assert_eq!(rows[1]["status_code"], Value::Integer(302));
    }

    #[test]
    fn test_required_policy_rejects_missing_where() {
        let engine = QueryEngine::new(FieldRegistry::with_builtins(), WherePolicy::Required);
        assert!(matches!(
            engine.execute("SELECT url FROM proxy LIMIT 3", &history()),
            Err(Error::MalformedQuery(_))
        ));
    }

    #[test]
    fn test_match_all_policy_returns_everything_newest_first() {
        let engine = QueryEngine::new(FieldRegistry::with_builtins(), WherePolicy::MatchAll);
        let rows = engine.execute("SELECT url FROM proxy", &history()).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0]["url"], Value::from("https://shop.test/index.html"));

        let limited = engine.execute("SELECT url FROM proxy LIMIT 2", &history()).unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_bad_limit_falls_back_to_one() {
        let engine = QueryEngine::default();
        let rows = engine
            .execute("select url from proxy where method='POST' limit abc", &history())
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_content_type_spellings_agree() {
        let engine = QueryEngine::default();
        let by_mime = engine
            .execute(
                "SELECT url FROM proxy WHERE req.content_type = 'application/json'",
                &history(),
            )
            .unwrap();
        let by_word = engine
            .execute("SELECT url FROM proxy WHERE req.content_type = 'json'", &history())
            .unwrap();
        assert_eq!(by_mime, by_word);
        assert_eq!(by_mime.len(), 1);
        assert_eq!(by_mime[0]["url"], Value::from("https://shop.test/api/cart"));
    }

    #[test]
    fn test_unknown_projection_field_is_not_an_error() {
        let engine = QueryEngine::default();
        let rows = engine
            .execute(
                "select nonexistent_field from proxy where method='GET'",
                &history(),
            )
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.is_empty()));
    }

    #[test]
    fn test_errors_surface_from_conditions() {
        let engine = QueryEngine::default();
        assert!(matches!(
            engine.execute("SELECT url FROM proxy WHERE status_code >= 200", &history()),
            Err(Error::UnsupportedOperator { .. })
        ));
        assert!(matches!(
            engine.execute(
                "SELECT url FROM proxy WHERE resp.content_type = 'text/html'",
                &history()
            ),
            Err(Error::UnsupportedContentType(_))
        ));
    }

    #[test]
    fn test_length_condition_end_to_end() {
        let engine = QueryEngine::default();
        let rows = engine
            .execute("SELECT url FROM proxy WHERE len(req.body) > 10", &history())
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["url"], Value::from("https://shop.test/api/login"));
    }
}
