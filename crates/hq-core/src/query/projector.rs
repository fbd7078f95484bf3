//! Turns matched transactions into result rows.

use super::Row;
use crate::fields::FieldRegistry;
use crate::transaction::Transaction;
use std::borrow::Borrow;

/// Build one row per transaction holding the selected fields.
///
/// `*` selects every registered field. Fields the registry does not know are
/// left out of the row.
pub fn project<T: Borrow<Transaction>>(
    transactions: &[T],
    select_fields: &[String],
    registry: &FieldRegistry,
) -> Vec<Row> {
    let fields = resolve_fields(select_fields, registry);

    transactions
        .iter()
        .map(|tx| {
            let tx: &Transaction = tx.borrow();
            fields
                .iter()
                .filter_map(|field| {
                    registry
                        .extract(field, tx)
                        .map(|value| (field.clone(), value))
                })
                .collect()
        })
        .collect()
}

fn resolve_fields(select_fields: &[String], registry: &FieldRegistry) -> Vec<String> {
    let mut fields = Vec::new();
    for field in select_fields {
        let field = field.trim().to_lowercase();
        if field == "*" {
            fields.extend(registry.names().into_iter().map(str::to_string));
        } else if registry.contains(&field) {
            fields.push(field);
        } else {
            tracing::debug!("Ignoring unknown field '{}' in SELECT", field);
        }
    }
    fields
}
