//! # History Filter
//!
//! Walks the history most recent first, keeps the transactions satisfying
//! every condition, drops repeats of an already kept request and stops once
//! the limit is reached.

use super::Condition;
use crate::error::Result;
use crate::fields::FieldRegistry;
use crate::transaction::Transaction;
use std::borrow::Borrow;
use std::collections::HashSet;

/// MD5 over method, URL without query, query string and request body.
pub type Fingerprint = [u8; 16];

/// Filter `history` (oldest first) by the raw AND-chained `conditions`.
///
/// Every condition is parsed before the first transaction is looked at, so
/// an unsupported operator fails the whole call even on an empty history.
/// A `limit` of `0` means unbounded.
pub fn filter<'a, T: Borrow<Transaction>>(
    history: &'a [T],
    conditions: &[String],
    limit: usize,
    registry: &FieldRegistry,
) -> Result<Vec<&'a Transaction>> {
    let newest_first = history
        .iter()
        .rev()
        .map(|tx| Borrow::<Transaction>::borrow(tx));
    let limit = if limit == 0 { usize::MAX } else { limit };

    if conditions.is_empty() {
        return Ok(newest_first.take(limit).collect());
    }

    let mut parsed = Vec::with_capacity(conditions.len());
    let mut understood = true;
    for raw in conditions {
        match Condition::parse(raw)? {
            Some(condition) => parsed.push(condition),
            None => {
                tracing::warn!("Condition '{}' is not understood and never matches", raw);
                understood = false;
            }
        }
    }
    if !understood {
        return Ok(Vec::new());
    }

    let mut seen: HashSet<Fingerprint> = HashSet::new();
    let mut matched = Vec::new();

    for tx in newest_first {
        if matched.len() >= limit {
            break;
        }
        if !parsed.iter().all(|c| c.evaluate(tx, registry)) {
            continue;
        }
        if !seen.insert(fingerprint(tx)) {
            tracing::trace!("Skipping duplicate of {} {}", tx.method, tx.url);
            continue;
        }
        matched.push(tx);
    }

    Ok(matched)
}

/// Identity of a request for deduplication.
pub fn fingerprint(tx: &Transaction) -> Fingerprint {
    let identifier = format!(
        "{}{}{}{}",
        tx.method,
        url_without_query(&tx.url, &tx.query),
        tx.query,
        tx.request_body
    );
    md5::compute(identifier.as_bytes()).0
}

/// Cut `url` at the first literal occurrence of `query`.
fn url_without_query<'a>(url: &'a str, query: &str) -> &'a str {
    if query.is_empty() {
        return url;
    }
    url.find(query).map_or(url, |pos| &url[..pos])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn get(url: &str) -> Transaction {
        Transaction::from_raw(url, "GET / HTTP/1.1\r\n\r\n", None).unwrap()
    }

    fn post(url: &str, body: &str) -> Transaction {
        Transaction::from_raw(url, &format!("POST / HTTP/1.1\r\n\r\n{}", body), None).unwrap()
    }

    fn conds(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    fn urls(matched: &[&Transaction]) -> Vec<String> {
        matched.iter().map(|tx| tx.url.clone()).collect()
    }

    #[test]
    fn test_no_conditions_returns_newest_first() {
        let history = vec![get("http://a.test/1"), get("http://a.test/2"), get("http://a.test/2")];
        let registry = FieldRegistry::with_builtins();

        let all = filter(&history, &[], 0, &registry).unwrap();
        assert_eq!(
            urls(&all),
            vec!["http://a.test/2", "http://a.test/2", "http://a.test/1"]
        );

        let two = filter(&history, &[], 2, &registry).unwrap();
        assert_eq!(two.len(), 2);
    }

    #[test]
    fn test_limit_caps_matches() {
        let history: Vec<Transaction> = (0..5)
            .map(|i| get(&format!("http://a.test/item/{}", i)))
            .collect();
        let registry = FieldRegistry::with_builtins();
        let c = conds(&["path like '/item'"]);

        assert_eq!(filter(&history, &c, 3, &registry).unwrap().len(), 3);
        assert_eq!(filter(&history, &c, 10, &registry).unwrap().len(), 5);
        assert_eq!(filter(&history, &c, 0, &registry).unwrap().len(), 5);

        let newest = filter(&history, &c, 1, &registry).unwrap();
        assert_eq!(urls(&newest), vec!["http://a.test/item/4"]);
    }

    #[test]
    fn test_all_conditions_must_hold() {
        let history = vec![
            post("http://a.test/api/login", "user=bob"),
            get("http://a.test/api/login"),
            post("http://a.test/static", "user=bob"),
        ];
        let registry = FieldRegistry::with_builtins();
        let c = conds(&["method = POST", "path like '/api'"]);

        let matched = filter(&history, &c, 0, &registry).unwrap();
        assert_eq!(urls(&matched), vec!["http://a.test/api/login"]);
        assert_eq!(matched[0].method, "POST");
    }

    #[test]
    fn test_duplicates_are_dropped() {
        let history = vec![
            post("http://a.test/api?x=1", "a"),
            post("http://a.test/api?x=1", "a"),
            post("http://a.test/api?x=2", "a"),
            post("http://a.test/api?x=1", "b"),
        ];
        let registry = FieldRegistry::with_builtins();
        let c = conds(&["method = POST"]);

        let matched = filter(&history, &c, 0, &registry).unwrap();
        assert_eq!(matched.len(), 3);
    }

    #[test]
    fn test_duplicates_do_not_count_towards_limit() {
        let history = vec![
            get("http://a.test/old"),
            get("http://a.test/new"),
            get("http://a.test/new"),
        ];
        let registry = FieldRegistry::with_builtins();
        let matched = filter(&history, &conds(&["method = GET"]), 2, &registry).unwrap();
        assert_eq!(urls(&matched), vec!["http://a.test/new", "http://a.test/old"]);
    }

    #[test]
    fn test_repeat_runs_are_identical() {
        let history = vec![get("http://a.test/1"), get("http://a.test/2"), get("http://a.test/1")];
        let registry = FieldRegistry::with_builtins();
        let c = conds(&["host = a.test"]);
        let first = filter(&history, &c, 0, &registry).unwrap();
        let second = filter(&history, &c, 0, &registry).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unsupported_operator_fails_even_without_history() {
        let history: Vec<Transaction> = Vec::new();
        let registry = FieldRegistry::with_builtins();
        assert!(filter(&history, &conds(&["status_code >= 200"]), 0, &registry).is_err());
    }

    #[test]
    fn test_unparseable_condition_matches_nothing() {
        let history = vec![get("http://a.test/1")];
        let registry = FieldRegistry::with_builtins();
        let matched = filter(&history, &conds(&["gibberish"]), 0, &registry).unwrap();
        assert!(matched.is_empty());
    }

    #[test]
    fn test_later_errors_surface_after_unparseable_condition() {
        let history = vec![get("http://a.test/1")];
        let registry = FieldRegistry::with_builtins();
        assert!(matches!(
            filter(&history, &conds(&["gibberish", "status_code >= 200"]), 0, &registry),
            Err(crate::error::Error::UnsupportedOperator { .. })
        ));
        assert!(matches!(
            filter(
                &history,
                &conds(&["gibberish", "req.content_type = 'text/html'"]),
                0,
                &registry
            ),
            Err(crate::error::Error::UnsupportedContentType(_))
        ));
    }

    #[test]
    fn test_works_over_shared_snapshots() {
        let history: Vec<Arc<Transaction>> = vec![Arc::new(get("http://a.test/1"))];
        let registry = FieldRegistry::with_builtins();
        let matched = filter(&history, &conds(&["method = GET"]), 0, &registry).unwrap();
        assert_eq!(matched.len(), 1);
    }

    #[test]
    fn test_url_split_is_literal() {
        assert_eq!(url_without_query("http://a.test/p?a.b=(1)", "a.b=(1)"), "http://a.test/p?");
        assert_eq!(url_without_query("http://a.test/p", ""), "http://a.test/p");
        assert_eq!(url_without_query("http://a.test/p", "zzz"), "http://a.test/p");
    }

    #[test]
    fn test_fingerprint_distinguishes_queries() {
        assert_ne!(
            fingerprint(&get("http://a.test/p?id=1")),
            fingerprint(&get("http://a.test/p?id=2"))
        );
        assert_eq!(
            fingerprint(&get("http://a.test/p?id=1")),
            fingerprint(&get("http://a.test/p?id=1"))
        );
    }
}
