//! Normalization of the backend's list-response envelopes.
//!
//! List endpoints are allowed to answer in any of four shapes:
//!
//! - bare array: `[T, ...]`
//! - items/total: `{"items": [T], "total": n}`
//! - paginated: `{"data": [T], "pagination": {...}}`
//! - nested: `{"success": true, "data": {"data": [T], "pagination": {...}}}`
//!
//! Callers never shape-sniff; they go through [`normalize_list`], which
//! resolves the union once at the adapter boundary and fails loudly on
//! anything else.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::model::{Paginated, Pagination};

/// The four documented list envelope shapes as an explicit tagged union.
///
/// Variant order matters: serde tries untagged variants top to bottom, and
/// the paginated shape must win over the nested one.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ListEnvelope<T> {
    Paginated(Paginated<T>),
    Nested { data: Paginated<T> },
    ItemsTotal { items: Vec<T>, total: u64 },
    Bare(Vec<T>),
}

impl<T> ListEnvelope<T> {
    /// Collapse any envelope shape into the canonical paginated result.
    ///
    /// Shapes that carry no pagination metadata get it computed from
    /// `page`/`limit` and the item count or declared total.
    pub fn normalize(self, page: u32, limit: u32) -> Paginated<T> {
        match self {
            ListEnvelope::Paginated(p) => p,
            ListEnvelope::Nested { data } => data,
            ListEnvelope::ItemsTotal { items, total } => Paginated {
                pagination: Pagination::compute(page, limit, total),
                data: items,
            },
            ListEnvelope::Bare(items) => Paginated {
                pagination: Pagination::compute(page, limit, items.len() as u64),
                data: items,
            },
        }
    }
}

/// Parse a raw list response into the canonical paginated result.
///
/// Returns [`ApiError::UnexpectedShape`] when the payload matches none of the
/// documented envelopes; this is a contract error and must not be coerced.
pub fn normalize_list<T: DeserializeOwned>(
    value: Value,
    page: u32,
    limit: u32,
) -> Result<Paginated<T>, ApiError> {
    let envelope: ListEnvelope<T> = serde_json::from_value(value)
        .map_err(|e| ApiError::UnexpectedShape(format!("list response matched no envelope: {e}")))?;
    Ok(envelope.normalize(page, limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items() -> Value {
        json!([
            {"id": "a", "n": 1},
            {"id": "b", "n": 2},
            {"id": "c", "n": 3}
        ])
    }

    #[derive(Debug, Clone, PartialEq, serde::Deserialize)]
    struct Item {
        id: String,
        n: u32,
    }

    fn expected() -> Paginated<Item> {
        Paginated {
            data: vec![
                Item { id: "a".into(), n: 1 },
                Item { id: "b".into(), n: 2 },
                Item { id: "c".into(), n: 3 },
            ],
            pagination: Pagination::compute(1, 10, 3),
        }
    }

    #[test]
    fn test_all_four_shapes_normalize_identically() {
        let pagination = json!({
            "page": 1, "limit": 10, "total": 3,
            "totalPages": 1, "hasNext": false, "hasPrev": false
        });
        let shapes = vec![
            items(),
            json!({"items": items(), "total": 3}),
            json!({"data": items(), "pagination": pagination}),
            json!({"success": true, "data": {"data": items(), "pagination": pagination}}),
        ];

        for shape in shapes {
            let normalized: Paginated<Item> = normalize_list(shape, 1, 10).unwrap();
            assert_eq!(normalized, expected());
        }
    }

    #[test]
    fn test_unexpected_shape_fails_loudly() {
        let bogus = json!({"rows": [1, 2, 3]});
        let err = normalize_list::<Item>(bogus, 1, 10).unwrap_err();
        assert!(matches!(err, ApiError::UnexpectedShape(_)));
    }

    #[test]
    fn test_bare_array_pagination_is_computed() {
        let normalized: Paginated<Item> = normalize_list(items(), 1, 2).unwrap();
        assert_eq!(normalized.pagination.total, 3);
        assert!(normalized.pagination.has_next);
        assert!(!normalized.pagination.has_prev);
    }
}
