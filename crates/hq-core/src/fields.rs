//! # Field Extractor Registry
//!
//! Maps a case-insensitive field name to a function pulling that field's
//! [`Value`] out of a [`Transaction`]. Both WHERE conditions and SELECT
//! projection resolve field names through the registry, so a name that is
//! not registered never matches and is never projected.

use crate::transaction::Transaction;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A pure function extracting one field from a transaction.
pub type Extractor = Arc<dyn Fn(&Transaction) -> Value + Send + Sync>;

/// String-keyed table of field extractors.
#[derive(Clone)]
pub struct FieldRegistry {
    extractors: HashMap<String, Extractor>,
}

impl FieldRegistry {
    /// A registry with no fields at all.
    pub fn empty() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// A registry holding every built-in field.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();

        registry.register("req", |tx| Value::from(tx.request.as_str()));
        registry.register("host", |tx| Value::from(tx.host.as_str()));
        registry.register("url", |tx| Value::from(tx.url.as_str()));
        registry.register("path", |tx| Value::from(tx.path.as_str()));
        registry.register("query", |tx| Value::from(tx.query.as_str()));
        registry.register("method", |tx| Value::Text(tx.method.to_uppercase()));
        registry.register("req.content_type", |tx| {
            Value::ContentType(tx.request_content_type)
        });
        registry.register("req.body", |tx| Value::from(tx.request_body.as_str()));
        registry.register("body", |tx| Value::from(tx.request_body.as_str()));

        registry.register("resp", |tx| {
            Value::from(tx.response.as_ref().map(|r| r.raw.as_str()))
        });
        registry.register("status_code", status_code);
        registry.register("resp.status_code", status_code);
        registry.register("resp.content_type", |tx| {
            tx.response
                .as_ref()
                .map_or(Value::Absent, |r| Value::ContentType(r.content_type))
        });
        registry.register("resp.body", |tx| {
            Value::from(tx.response.as_ref().map(|r| r.body.as_str()))
        });

        registry
    }

    /// Register (or replace) the extractor for `name`.
    pub fn register<F>(&mut self, name: &str, extractor: F)
    where
        F: Fn(&Transaction) -> Value + Send + Sync + 'static,
    {
        self.extractors
            .insert(name.to_lowercase(), Arc::new(extractor));
    }

    pub fn get(&self, name: &str) -> Option<&Extractor> {
        self.extractors.get(&name.to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.extractors.contains_key(&name.to_lowercase())
    }

    /// Run the extractor for `name`; `None` when the field is not registered.
    pub fn extract(&self, name: &str, tx: &Transaction) -> Option<Value> {
        self.get(name).map(|extractor| extractor(tx))
    }

    /// All registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.extractors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for FieldRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldRegistry")
            .field("fields", &self.names())
            .finish()
    }
}

fn status_code(tx: &Transaction) -> Value {
    tx.response
        .as_ref()
        .map_or(Value::Absent, |r| Value::Integer(i64::from(r.status_code)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::ContentType;

    fn sample(with_response: bool) -> Transaction {
        Transaction::from_raw(
            "https://api.example/v1/items?page=2",
            "get /v1/items?page=2 HTTP/1.1\r\nHost: api.example\r\n\r\n",
            with_response.then_some(
                "HTTP/1.1 404 Not Found\r\nContent-Type: application/json\r\n\r\n{}",
            ),
        )
        .unwrap()
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = FieldRegistry::with_builtins();
        assert!(registry.contains("METHOD"));
        assert!(registry.contains("Req.Body"));
        assert!(!registry.contains("cookie"));
    }

    #[test]
    fn test_method_is_upper_cased() {
        let registry = FieldRegistry::with_builtins();
        let tx = sample(false);
        assert_eq!(registry.extract("method", &tx), Some(Value::from("GET")));
    }

    #[test]
    fn test_response_fields_absent_without_response() {
        let registry = FieldRegistry::with_builtins();
        let tx = sample(false);
        for field in ["resp", "status_code", "resp.content_type", "resp.body"] {
            assert_eq!(registry.extract(field, &tx), Some(Value::Absent), "{}", field);
        }
    }

    #[test]
    fn test_response_fields_with_response() {
        let registry = FieldRegistry::with_builtins();
        let tx = sample(true);
        assert_eq!(registry.extract("status_code", &tx), Some(Value::Integer(404)));
        assert_eq!(
            registry.extract("resp.content_type", &tx),
            Some(Value::ContentType(ContentType::Json))
        );
        assert_eq!(registry.extract("resp.body", &tx), Some(Value::from("{}")));
    }

    #[test]
    fn test_unknown_field_extracts_nothing() {
        let registry = FieldRegistry::with_builtins();
        assert_eq!(registry.extract("nonexistent_field", &sample(true)), None);
    }

    #[test]
    fn test_register_custom_field() {
        let mut registry = FieldRegistry::empty();
        registry.register("Scheme", |tx| {
            Value::from(tx.url.split("://").next().unwrap_or_default())
        });
        assert_eq!(registry.names(), vec!["scheme"]);
        assert_eq!(registry.extract("scheme", &sample(false)), Some(Value::from("https")));
    }
}
