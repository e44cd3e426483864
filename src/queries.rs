//! Read-through query client and the plain entity mutations.
//!
//! Reads serve fresh cache entries without touching the backend; stale or
//! missing entries are fetched in the foreground, written back, and leave a
//! refetch closure behind so later invalidations can revalidate the key in
//! the background. Mutations run through the [`MutationEngine`] so every
//! write ends in an invalidation of the keys it may have drifted.

use std::sync::Arc;

use crate::backend::{Backend, CandidateDraft, CandidatePatch, JobDraft, JobPatch};
use crate::cache::CacheStore;
use crate::envelope::normalize_list;
use crate::error::ApiError;
use crate::key::{QueryKey, NS_CANDIDATES, NS_CANDIDATES_BY_STAGE, NS_JOBS};
use crate::model::{Candidate, Job, Paginated, SearchParams, Stage, TimelineEntry};
use crate::mutation::{MutationEngine, MutationHooks};

const DEFAULT_PAGE_SIZE: u32 = 10;

/// Cache-aware access to the backend's queries and mutations.
#[derive(Clone)]
pub struct QueryClient {
    cache: Arc<CacheStore>,
    backend: Arc<dyn Backend>,
    engine: MutationEngine,
}

impl QueryClient {
    pub fn new(cache: Arc<CacheStore>, backend: Arc<dyn Backend>) -> Self {
        QueryClient {
            engine: MutationEngine::new(cache.clone()),
            cache,
            backend,
        }
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn engine(&self) -> &MutationEngine {
        &self.engine
    }

    /// Serve `key` from cache when fresh, otherwise fall through.
    fn cached<T: Clone + Send + Sync + 'static>(&self, key: &QueryKey) -> Option<T> {
        self.cache
            .read(key)
            .filter(|e| !e.is_stale)
            .and_then(|e| e.typed())
    }

    /// One page of jobs matching `params`.
    pub async fn jobs(&self, params: &SearchParams) -> Result<Paginated<Job>, ApiError> {
        let key = QueryKey::jobs_list(params);
        if let Some(page) = self.cached::<Paginated<Job>>(&key) {
            return Ok(page);
        }

        let page = Self::load_jobs(&self.backend, &self.cache, params).await?;

        let backend = self.backend.clone();
        let cache = self.cache.clone();
        let params = params.clone();
        self.cache.register_refetcher(
            &key,
            Arc::new(move || {
                let backend = backend.clone();
                let cache = cache.clone();
                let params = params.clone();
                Box::pin(async move {
                    Self::load_jobs(&backend, &cache, &params).await.map(|_| ())
                })
            }),
        );
        Ok(page)
    }

    async fn load_jobs(
        backend: &Arc<dyn Backend>,
        cache: &Arc<CacheStore>,
        params: &SearchParams,
    ) -> Result<Paginated<Job>, ApiError> {
        let page = params.page.unwrap_or(1);
        let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        let raw = backend.list_jobs(params).await?;
        let result: Paginated<Job> = normalize_list(raw, page, limit)?;
        cache.put(&QueryKey::jobs_list(params), result.clone());
        Ok(result)
    }

    /// A single job by id.
    pub async fn job(&self, id: &str) -> Result<Job, ApiError> {
        let key = QueryKey::job(id);
        if let Some(job) = self.cached::<Job>(&key) {
            return Ok(job);
        }
        let job = self.backend.get_job(id).await?.into_result()?;
        self.cache.put(&key, job.clone());
        Ok(job)
    }

    /// One page of candidates matching `params`.
    pub async fn candidates(&self, params: &SearchParams) -> Result<Paginated<Candidate>, ApiError> {
        let key = QueryKey::candidates_list(params);
        if let Some(page) = self.cached::<Paginated<Candidate>>(&key) {
            return Ok(page);
        }

        let page = Self::load_candidates(&self.backend, &self.cache, key.clone(), params).await?;

        let backend = self.backend.clone();
        let cache = self.cache.clone();
        let params = params.clone();
        self.cache.register_refetcher(
            &key,
            Arc::new(move || {
                let backend = backend.clone();
                let cache = cache.clone();
                let key = QueryKey::candidates_list(&params);
                let params = params.clone();
                Box::pin(async move {
                    Self::load_candidates(&backend, &cache, key, &params)
                        .await
                        .map(|_| ())
                })
            }),
        );
        Ok(page)
    }

    async fn load_candidates(
        backend: &Arc<dyn Backend>,
        cache: &Arc<CacheStore>,
        key: QueryKey,
        params: &SearchParams,
    ) -> Result<Paginated<Candidate>, ApiError> {
        let page = params.page.unwrap_or(1);
        let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        let raw = backend.list_candidates(params).await?;
        let result: Paginated<Candidate> = normalize_list(raw, page, limit)?;
        cache.put(&key, result.clone());
        Ok(result)
    }

    /// One page of the per-stage board projection.
    ///
    /// Cached under its own key family so invalidating the board does not
    /// disturb ordinary candidate lists, and vice versa it still falls under
    /// candidate-wide invalidations via [`NS_CANDIDATES_BY_STAGE`].
    pub async fn candidates_by_stage(
        &self,
        stage: Stage,
        page: u32,
        limit: u32,
        job_id: Option<&str>,
    ) -> Result<Paginated<Candidate>, ApiError> {
        let key = QueryKey::candidates_by_stage(stage, page, limit, job_id);
        if let Some(cached) = self.cached::<Paginated<Candidate>>(&key) {
            return Ok(cached);
        }

        let params = SearchParams {
            stage: Some(stage),
            page: Some(page),
            limit: Some(limit),
            job_id: job_id.map(str::to_string),
            ..Default::default()
        };
        let result =
            Self::load_candidates(&self.backend, &self.cache, key.clone(), &params).await?;

        let backend = self.backend.clone();
        let cache = self.cache.clone();
        self.cache.register_refetcher(
            &key,
            Arc::new(move || {
                let backend = backend.clone();
                let cache = cache.clone();
                let key = QueryKey::candidates_by_stage(stage, page, limit, params.job_id.as_deref());
                let params = params.clone();
                Box::pin(async move {
                    Self::load_candidates(&backend, &cache, key, &params)
                        .await
                        .map(|_| ())
                })
            }),
        );
        Ok(result)
    }

    /// A candidate's timeline, oldest first.
    pub async fn timeline(&self, candidate_id: &str) -> Result<Vec<TimelineEntry>, ApiError> {
        let key = QueryKey::timeline(candidate_id);
        if let Some(entries) = self.cached::<Vec<TimelineEntry>>(&key) {
            return Ok(entries);
        }
        let entries = self
            .backend
            .candidate_timeline(candidate_id)
            .await?
            .into_result()?;
        self.cache.put(&key, entries.clone());
        Ok(entries)
    }

    /// A single candidate by id.
    pub async fn candidate(&self, id: &str) -> Result<Candidate, ApiError> {
        let key = QueryKey::candidate(id);
        if let Some(candidate) = self.cached::<Candidate>(&key) {
            return Ok(candidate);
        }
        let candidate = self.backend.get_candidate(id).await?.into_result()?;
        self.cache.put(&key, candidate.clone());
        Ok(candidate)
    }

    /// Create a job; all cached jobs queries are invalidated on settle.
    pub async fn create_job(&self, draft: JobDraft) -> Result<Job, ApiError> {
        let affected = self.cache.keys_matching(|k| k.in_namespace(NS_JOBS));
        let backend = self.backend.clone();
        self.engine
            .execute(
                affected,
                |_| {},
                move || async move { backend.create_job(draft).await?.into_result() },
                MutationHooks::new().on_success(|job: &Job, cache| {
                    cache.put(&QueryKey::job(&job.id), job.clone());
                }),
            )
            .await
    }

    /// Patch a job, with the detail entry updated optimistically.
    pub async fn update_job(&self, id: &str, patch: JobPatch) -> Result<Job, ApiError> {
        let detail = QueryKey::job(id);
        let mut affected = self.cache.keys_matching(|k| k.in_namespace(NS_JOBS));
        if !affected.contains(&detail) {
            affected.push(detail.clone());
        }

        let optimistic_patch = patch.clone();
        let backend = self.backend.clone();
        let id_owned = id.to_string();
        self.engine
            .execute(
                affected,
                move |cache| {
                    if let Some(mut job) = cache.get::<Job>(&detail) {
                        if let Some(title) = optimistic_patch.title {
                            job.title = title;
                        }
                        if let Some(status) = optimistic_patch.status {
                            job.status = status;
                        }
                        if let Some(tags) = optimistic_patch.tags {
                            job.tags = tags;
                        }
                        if let Some(order) = optimistic_patch.order {
                            job.order = order;
                        }
                        cache.put(&QueryKey::job(&job.id), job);
                    }
                },
                move || async move { backend.update_job(&id_owned, patch).await?.into_result() },
                MutationHooks::new().on_success(|job: &Job, cache| {
                    cache.put(&QueryKey::job(&job.id), job.clone());
                }),
            )
            .await
    }

    /// Create a candidate; all cached candidate queries are invalidated.
    pub async fn create_candidate(&self, draft: CandidateDraft) -> Result<Candidate, ApiError> {
        let affected = self.cache.keys_matching(Self::is_candidate_key);
        let backend = self.backend.clone();
        self.engine
            .execute(
                affected,
                |_| {},
                move || async move { backend.create_candidate(draft).await?.into_result() },
                MutationHooks::new().on_success(|candidate: &Candidate, cache| {
                    cache.put(&QueryKey::candidate(&candidate.id), candidate.clone());
                }),
            )
            .await
    }

    /// Patch a candidate, with the detail entry updated optimistically.
    ///
    /// A stage change also invalidates the timeline (the backend appends an
    /// entry as a side effect) and every board page.
    pub async fn update_candidate(
        &self,
        id: &str,
        patch: CandidatePatch,
    ) -> Result<Candidate, ApiError> {
        let detail = QueryKey::candidate(id);
        let mut affected = self.cache.keys_matching(Self::is_candidate_key);
        if !affected.contains(&detail) {
            affected.push(detail.clone());
        }

        let optimistic_patch = patch.clone();
        let backend = self.backend.clone();
        let id_owned = id.to_string();
        self.engine
            .execute(
                affected,
                move |cache| {
                    if let Some(mut candidate) = cache.get::<Candidate>(&detail) {
                        if let Some(name) = optimistic_patch.name {
                            candidate.name = name;
                        }
                        if let Some(email) = optimistic_patch.email {
                            candidate.email = email;
                        }
                        if let Some(stage) = optimistic_patch.stage {
                            candidate.stage = stage;
                        }
                        cache.put(&QueryKey::candidate(&candidate.id), candidate);
                    }
                },
                move || async move {
                    backend
                        .update_candidate(&id_owned, patch)
                        .await?
                        .into_result()
                },
                MutationHooks::new().on_success(|candidate: &Candidate, cache| {
                    cache.put(&QueryKey::candidate(&candidate.id), candidate.clone());
                }),
            )
            .await
    }

    /// Every key touched by candidate mutations: lists, details, timelines
    /// and the board projection.
    pub(crate) fn is_candidate_key(key: &QueryKey) -> bool {
        key.in_namespace(NS_CANDIDATES) || key.in_namespace(NS_CANDIDATES_BY_STAGE)
    }
}
