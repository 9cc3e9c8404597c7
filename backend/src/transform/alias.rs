//! Item name reconciliation.
//!
//! Rewrites shipping-schedule item codes into the purchase-order naming, then
//! keeps only the lines whose item is a known purchase-order item.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{Feed, ItemAliasMap, ScheduleLine};

/// Columns of the alias table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasColumns {
    /// Shipping-schedule naming
    pub from: String,
    /// Canonical (purchase-order) naming
    pub to: String,
}

impl Default for AliasColumns {
    fn default() -> Self {
        Self {
            from: "NAV".to_string(),
            to: "QB".to_string(),
        }
    }
}

/// Build the alias map from parsed alias-table rows.
///
/// Rows with an empty side are ignored; a repeated key keeps its last value.
/// A non-empty table without the configured columns is unusable.
pub fn load_aliases(records: &[Value], columns: &AliasColumns) -> LedgerResult<ItemAliasMap> {
    if let Some(first) = records.first().and_then(Value::as_object) {
        for column in [&columns.from, &columns.to] {
            if !first.contains_key(column.as_str()) {
                return Err(LedgerError::unavailable(
                    Feed::ItemAliases,
                    format!("missing column {}", column),
                ));
            }
        }
    }

    let map = records
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|row| {
            let from = row.get(&columns.from)?.as_str()?.trim();
            let to = row.get(&columns.to)?.as_str()?.trim();
            if from.is_empty() || to.is_empty() {
                None
            } else {
                Some((from.to_string(), to.to_string()))
            }
        })
        .collect();

    Ok(map)
}

/// Rewrite item codes through `aliases`, then drop lines whose item is not in
/// `known_items`.
pub fn reconcile(
    lines: Vec<ScheduleLine>,
    aliases: &ItemAliasMap,
    known_items: &HashSet<String>,
) -> Vec<ScheduleLine> {
    lines
        .into_iter()
        .map(|mut line| {
            let resolved = aliases.resolve(&line.line.item_code).to_string();
            line.line.item_code = resolved;
            line
        })
        .filter(|line| known_items.contains(&line.line.item_code))
        .collect()
}
