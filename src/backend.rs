//! The request/response-capable backend surface the core consumes.
//!
//! List endpoints hand back raw JSON because the backend is allowed to pick
//! any of the four documented envelope shapes; [`crate::envelope`] is the
//! only place those shapes are resolved. Entity endpoints answer with the
//! typed [`ApiResponse`] envelope (`success` flag plus data or error).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

use crate::error::ApiError;
use crate::model::{Candidate, Job, JobStatus, SearchParams, Stage, TimelineEntry};

/// The typed success/failure envelope around entity responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// Collapse the envelope into a `Result`, mapping `success: false` to
    /// [`ApiError::Rejected`]. Controllers treat rejections exactly like any
    /// other mutation failure.
    pub fn into_result(self) -> Result<T, ApiError> {
        if self.success {
            self.data
                .ok_or_else(|| ApiError::UnexpectedShape("success response without data".into()))
        } else {
            Err(ApiError::Rejected(
                self.error.unwrap_or_else(|| "request failed".into()),
            ))
        }
    }
}

/// Body of `POST /jobs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDraft {
    pub title: String,
    pub status: JobStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    pub order: i64,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Body of `PATCH /jobs/:id`; every field optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

/// Body of `POST /candidates`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateDraft {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub job_id: Option<String>,
}

/// Body of `PATCH /candidates/:id`; every field optional. A `stage` change
/// triggers the backend's implicit timeline side effect.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidatePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
}

/// CRUD + reorder + stage-transition endpoints over Jobs and Candidates.
#[async_trait]
pub trait Backend: Send + Sync {
    /// `GET /jobs?search=&page=&pageSize=&sort=`. Envelope shape varies.
    async fn list_jobs(&self, params: &SearchParams) -> Result<Value, ApiError>;

    /// `GET /jobs/:id`
    async fn get_job(&self, id: &str) -> Result<ApiResponse<Job>, ApiError>;

    /// `POST /jobs`
    async fn create_job(&self, draft: JobDraft) -> Result<ApiResponse<Job>, ApiError>;

    /// `PATCH /jobs/:id`
    async fn update_job(&self, id: &str, patch: JobPatch) -> Result<ApiResponse<Job>, ApiError>;

    /// `PATCH /jobs/:id/reorder`, fault-injected at an elevated rate to
    /// exercise rollback.
    async fn reorder_job(&self, id: &str, new_order: i64) -> Result<ApiResponse<Job>, ApiError>;

    /// `GET /candidates?search=&page=&pageSize=&jobId=&stage=&sort=`
    async fn list_candidates(&self, params: &SearchParams) -> Result<Value, ApiError>;

    /// `GET /candidates/:id`
    async fn get_candidate(&self, id: &str) -> Result<ApiResponse<Candidate>, ApiError>;

    /// `POST /candidates`
    async fn create_candidate(
        &self,
        draft: CandidateDraft,
    ) -> Result<ApiResponse<Candidate>, ApiError>;

    /// `PATCH /candidates/:id`
    async fn update_candidate(
        &self,
        id: &str,
        patch: CandidatePatch,
    ) -> Result<ApiResponse<Candidate>, ApiError>;

    /// `GET /candidates/:id/timeline`. Entries sorted by date.
    async fn candidate_timeline(
        &self,
        id: &str,
    ) -> Result<ApiResponse<Vec<TimelineEntry>>, ApiError>;
}

/// A backend wrapper that retries transient failures with a small fixed
/// budget. Typed rejections (the 4xx class) are never retried.
///
/// Retry policy lives here at the adapter boundary; the mutation engine sees
/// a single "mutation failed" signal either way.
pub struct RetryBackend {
    inner: Arc<dyn Backend>,
    retries: u32,
}

impl RetryBackend {
    /// Wrap `inner`, re-attempting transient failures up to `retries` times.
    pub fn new(inner: Arc<dyn Backend>, retries: u32) -> Self {
        RetryBackend { inner, retries }
    }

    async fn attempt<T, F, Fut>(&self, op: &'static str, call: F) -> Result<T, ApiError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ApiError>> + Send,
    {
        let mut last_err = None;
        for attempt in 0..=self.retries {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => {
                    tracing::warn!(op, attempt, error = %e, "transient backend failure");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| ApiError::Network("retry budget exhausted".into())))
    }
}

#[async_trait]
impl Backend for RetryBackend {
    async fn list_jobs(&self, params: &SearchParams) -> Result<Value, ApiError> {
        self.attempt("list_jobs", || self.inner.list_jobs(params)).await
    }

    async fn get_job(&self, id: &str) -> Result<ApiResponse<Job>, ApiError> {
        self.attempt("get_job", || self.inner.get_job(id)).await
    }

    async fn create_job(&self, draft: JobDraft) -> Result<ApiResponse<Job>, ApiError> {
        self.attempt("create_job", || self.inner.create_job(draft.clone()))
            .await
    }

    async fn update_job(&self, id: &str, patch: JobPatch) -> Result<ApiResponse<Job>, ApiError> {
        self.attempt("update_job", || self.inner.update_job(id, patch.clone()))
            .await
    }

    async fn reorder_job(&self, id: &str, new_order: i64) -> Result<ApiResponse<Job>, ApiError> {
        self.attempt("reorder_job", || self.inner.reorder_job(id, new_order))
            .await
    }

    async fn list_candidates(&self, params: &SearchParams) -> Result<Value, ApiError> {
        self.attempt("list_candidates", || self.inner.list_candidates(params))
            .await
    }

    async fn get_candidate(&self, id: &str) -> Result<ApiResponse<Candidate>, ApiError> {
        self.attempt("get_candidate", || self.inner.get_candidate(id))
            .await
    }

    async fn create_candidate(
        &self,
        draft: CandidateDraft,
    ) -> Result<ApiResponse<Candidate>, ApiError> {
        self.attempt("create_candidate", || {
            self.inner.create_candidate(draft.clone())
        })
        .await
    }

    async fn update_candidate(
        &self,
        id: &str,
        patch: CandidatePatch,
    ) -> Result<ApiResponse<Candidate>, ApiError> {
        self.attempt("update_candidate", || {
            self.inner.update_candidate(id, patch.clone())
        })
        .await
    }

    async fn candidate_timeline(
        &self,
        id: &str,
    ) -> Result<ApiResponse<Vec<TimelineEntry>>, ApiError> {
        self.attempt("candidate_timeline", || self.inner.candidate_timeline(id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails with a transient error `failures` times, then succeeds.
    struct FlakyBackend {
        failures: usize,
        calls: AtomicUsize,
        reject: bool,
    }

    impl FlakyBackend {
        fn transient(failures: usize) -> Self {
            FlakyBackend {
                failures,
                calls: AtomicUsize::new(0),
                reject: false,
            }
        }

        fn rejecting() -> Self {
            FlakyBackend {
                failures: usize::MAX,
                calls: AtomicUsize::new(0),
                reject: true,
            }
        }

        fn outcome(&self) -> Result<ApiResponse<Job>, ApiError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.reject {
                return Ok(ApiResponse::err("Job not found"));
            }
            if n < self.failures {
                Err(ApiError::Network("injected".into()))
            } else {
                Ok(ApiResponse::ok(Job {
                    id: "j1".into(),
                    title: "Engineer".into(),
                    status: JobStatus::Active,
                    order: 0,
                    tags: vec![],
                    department: None,
                    location: None,
                    created_at: 0,
                    updated_at: 0,
                }))
            }
        }
    }

    #[async_trait]
    impl Backend for FlakyBackend {
        async fn list_jobs(&self, _: &SearchParams) -> Result<Value, ApiError> {
            unimplemented!()
        }
        async fn get_job(&self, _: &str) -> Result<ApiResponse<Job>, ApiError> {
            self.outcome()
        }
        async fn create_job(&self, _: JobDraft) -> Result<ApiResponse<Job>, ApiError> {
            unimplemented!()
        }
        async fn update_job(&self, _: &str, _: JobPatch) -> Result<ApiResponse<Job>, ApiError> {
            unimplemented!()
        }
        async fn reorder_job(&self, _: &str, _: i64) -> Result<ApiResponse<Job>, ApiError> {
            self.outcome()
        }
        async fn list_candidates(&self, _: &SearchParams) -> Result<Value, ApiError> {
            unimplemented!()
        }
        async fn get_candidate(&self, _: &str) -> Result<ApiResponse<Candidate>, ApiError> {
            unimplemented!()
        }
        async fn create_candidate(
            &self,
            _: CandidateDraft,
        ) -> Result<ApiResponse<Candidate>, ApiError> {
            unimplemented!()
        }
        async fn update_candidate(
            &self,
            _: &str,
            _: CandidatePatch,
        ) -> Result<ApiResponse<Candidate>, ApiError> {
            unimplemented!()
        }
        async fn candidate_timeline(
            &self,
            _: &str,
        ) -> Result<ApiResponse<Vec<TimelineEntry>>, ApiError> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn test_retries_transient_failures_then_succeeds() {
        let inner = Arc::new(FlakyBackend::transient(2));
        let backend = RetryBackend::new(inner.clone(), 2);

        let job = backend.get_job("j1").await.unwrap().into_result().unwrap();
        assert_eq!(job.id, "j1");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_returns_last_error() {
        let inner = Arc::new(FlakyBackend::transient(10));
        let backend = RetryBackend::new(inner.clone(), 2);

        let err = backend.get_job("j1").await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rejections_are_not_retried() {
        let inner = Arc::new(FlakyBackend::rejecting());
        let backend = RetryBackend::new(inner.clone(), 2);

        let err = backend
            .get_job("missing")
            .await
            .unwrap()
            .into_result()
            .unwrap_err();
        assert!(matches!(err, ApiError::Rejected(_)));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }
}
