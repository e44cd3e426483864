//! Query keys: ordered tuples identifying cached result sets.

use std::fmt;

use crate::model::{SearchParams, Stage};

/// Namespace segment for job queries.
pub const NS_JOBS: &str = "jobs";
/// Namespace segment for candidate queries.
pub const NS_CANDIDATES: &str = "candidates";
/// Namespace segment for the per-stage paginated board queries.
pub const NS_CANDIDATES_BY_STAGE: &str = "candidates-by-stage";

/// An ordered tuple identifying a cached result set.
///
/// Keys are compared by structural equality of their segments; predicate
/// helpers match key families by prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        QueryKey(segments.into_iter().map(Into::into).collect())
    }

    /// The jobs list for a given parameter set.
    pub fn jobs_list(params: &SearchParams) -> Self {
        QueryKey::new([NS_JOBS.to_string(), params.to_query_string()])
    }

    /// A single job lookup.
    pub fn job(id: &str) -> Self {
        QueryKey::new([NS_JOBS, id])
    }

    /// The candidates list for a given parameter set.
    pub fn candidates_list(params: &SearchParams) -> Self {
        QueryKey::new([NS_CANDIDATES.to_string(), params.to_query_string()])
    }

    /// A single candidate lookup.
    pub fn candidate(id: &str) -> Self {
        QueryKey::new([NS_CANDIDATES, id])
    }

    /// A candidate's timeline.
    pub fn timeline(candidate_id: &str) -> Self {
        QueryKey::new([NS_CANDIDATES, candidate_id, "timeline"])
    }

    /// One page of the per-stage board projection.
    pub fn candidates_by_stage(stage: Stage, page: u32, limit: u32, job_id: Option<&str>) -> Self {
        QueryKey::new([
            NS_CANDIDATES_BY_STAGE.to_string(),
            stage.as_str().to_string(),
            page.to_string(),
            limit.to_string(),
            job_id.unwrap_or("all").to_string(),
        ])
    }

    /// First segment of the key, i.e. its namespace.
    pub fn namespace(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// Whether the key's first segment equals `ns`.
    pub fn in_namespace(&self, ns: &str) -> bool {
        self.namespace() == Some(ns)
    }

    /// Whether the key starts with all of the given segments.
    pub fn has_prefix(&self, prefix: &[&str]) -> bool {
        self.0.len() >= prefix.len() && self.0.iter().zip(prefix).all(|(a, b)| a == b)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("::"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality() {
        let params = SearchParams {
            page: Some(1),
            limit: Some(10),
            ..Default::default()
        };
        assert_eq!(QueryKey::jobs_list(&params), QueryKey::jobs_list(&params.clone()));
        assert_ne!(QueryKey::job("j1"), QueryKey::job("j2"));
    }

    #[test]
    fn test_namespace_predicates() {
        let key = QueryKey::candidates_by_stage(Stage::Offer, 2, 6, None);
        assert!(key.in_namespace(NS_CANDIDATES_BY_STAGE));
        assert!(key.has_prefix(&[NS_CANDIDATES_BY_STAGE, "offer"]));
        assert!(!key.has_prefix(&[NS_CANDIDATES_BY_STAGE, "hired"]));

        let timeline = QueryKey::timeline("c1");
        assert!(timeline.in_namespace(NS_CANDIDATES));
        assert!(timeline.has_prefix(&[NS_CANDIDATES, "c1", "timeline"]));
    }

    #[test]
    fn test_display_joins_segments() {
        assert_eq!(QueryKey::timeline("c9").to_string(), "candidates::c9::timeline");
    }
}
