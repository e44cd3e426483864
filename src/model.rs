//! Domain types shared between the backend surface and the cache layer.
//!
//! Wire names are camelCase to match the backend's JSON envelopes.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a job posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Active,
    Archived,
    Draft,
    Closed,
}

/// A job posting.
///
/// `order` defines a total order within a listing context; ties are broken by
/// array position, never treated as an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub title: String,
    pub status: JobStatus,
    pub order: i64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One of the seven fixed pipeline categories a candidate occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Applied,
    Screening,
    Assessment,
    Interview,
    Offer,
    Hired,
    Rejected,
}

impl Stage {
    /// All stages in board order.
    pub const ALL: [Stage; 7] = [
        Stage::Applied,
        Stage::Screening,
        Stage::Assessment,
        Stage::Interview,
        Stage::Offer,
        Stage::Hired,
        Stage::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Applied => "applied",
            Stage::Screening => "screening",
            Stage::Assessment => "assessment",
            Stage::Interview => "interview",
            Stage::Offer => "offer",
            Stage::Hired => "hired",
            Stage::Rejected => "rejected",
        }
    }
}

/// A candidate in the pipeline. Belongs to exactly one stage at a time; any
/// stage-to-stage transition is permitted client-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub job_id: Option<String>,
    /// Defaults to `applied` when the backend omits it.
    #[serde(default)]
    pub stage: Stage,
    pub applied_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A single event in a candidate's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub id: String,
    pub candidate_id: String,
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub date: i64,
    pub performed_by: String,
}

/// Pagination metadata attached to a paginated result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    /// Compute pagination metadata for `total` items sliced at `page`/`limit`.
    pub fn compute(page: u32, limit: u32, total: u64) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            total.div_ceil(limit as u64) as u32
        };
        Pagination {
            page,
            limit,
            total,
            total_pages,
            has_next: (page as u64) * (limit as u64) < total,
            has_prev: page > 1,
        }
    }
}

/// A page of results plus its pagination metadata.
///
/// Invariants: `data.len() <= limit`, `has_next == page < total_pages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

/// Sort direction for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Search / pagination / sort parameters for list endpoints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchParams {
    pub query: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub job_id: Option<String>,
    pub stage: Option<Stage>,
    pub sort: Option<(String, SortDirection)>,
}

impl SearchParams {
    /// Canonical query-string form, used as the variable part of list keys.
    ///
    /// Mirrors the `search=&page=&pageSize=&jobId=&stage=&sort=field:dir`
    /// wire format so equal parameter sets always produce equal keys.
    pub fn to_query_string(&self) -> String {
        let mut parts = Vec::new();
        if let Some(q) = &self.query {
            parts.push(format!("search={q}"));
        }
        if let Some(p) = self.page {
            parts.push(format!("page={p}"));
        }
        if let Some(l) = self.limit {
            parts.push(format!("pageSize={l}"));
        }
        if let Some(j) = &self.job_id {
            parts.push(format!("jobId={j}"));
        }
        if let Some(s) = &self.stage {
            parts.push(format!("stage={}", s.as_str()));
        }
        if let Some((field, dir)) = &self.sort {
            let dir = match dir {
                SortDirection::Asc => "asc",
                SortDirection::Desc => "desc",
            };
            parts.push(format!("sort={field}:{dir}"));
        }
        parts.join("&")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_defaults_to_applied_when_missing() {
        let c: Candidate = serde_json::from_str(
            r#"{"id":"c1","name":"Ada","email":"ada@example.com",
                "appliedAt":1,"createdAt":1,"updatedAt":1}"#,
        )
        .unwrap();
        assert_eq!(c.stage, Stage::Applied);
    }

    #[test]
    fn test_stage_wire_names_are_lowercase() {
        assert_eq!(serde_json::to_string(&Stage::Screening).unwrap(), "\"screening\"");
        let s: Stage = serde_json::from_str("\"rejected\"").unwrap();
        assert_eq!(s, Stage::Rejected);
    }

    #[test]
    fn test_pagination_compute_invariants() {
        let p = Pagination::compute(2, 10, 25);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next);
        assert!(p.has_prev);
        assert_eq!(p.has_next, p.page < p.total_pages);

        let last = Pagination::compute(3, 10, 25);
        assert!(!last.has_next);

        let empty = Pagination::compute(1, 10, 0);
        assert!(!empty.has_next);
        assert!(!empty.has_prev);
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn test_search_params_query_string_is_stable() {
        let params = SearchParams {
            query: Some("rust".into()),
            page: Some(2),
            limit: Some(10),
            sort: Some(("order".into(), SortDirection::Asc)),
            ..Default::default()
        };
        assert_eq!(
            params.to_query_string(),
            "search=rust&page=2&pageSize=10&sort=order:asc"
        );
    }
}
