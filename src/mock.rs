//! An in-memory, fault-injecting stand-in backend.
//!
//! `MockBackend` implements the full [`Backend`] surface against in-memory
//! tables, with randomized latency and randomized failure injection so the
//! optimistic/rollback paths get exercised without a real network. Tests
//! pin the fault profile to zero (or to always-fail) for determinism.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::RwLock;
use tokio::time::{sleep, Duration};

use crate::backend::{
    ApiResponse, Backend, CandidateDraft, CandidatePatch, JobDraft, JobPatch,
};
use crate::error::ApiError;
use crate::model::{
    Candidate, Job, Paginated, Pagination, SearchParams, SortDirection, Stage, TimelineEntry,
};
use crate::utils::{now_ms, rand_simple};

const DEFAULT_PAGE_SIZE: u32 = 10;

/// Failure rates and latency range for injected faults.
#[derive(Debug, Clone)]
pub struct FaultProfile {
    /// Probability a read endpoint fails with a transient error.
    pub read_error_rate: f64,
    /// Probability a write endpoint fails with a transient error.
    pub write_error_rate: f64,
    /// Probability the reorder endpoint fails. Elevated to exercise rollback.
    pub reorder_error_rate: f64,
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
}

impl Default for FaultProfile {
    fn default() -> Self {
        FaultProfile {
            read_error_rate: 0.05,
            write_error_rate: 0.10,
            reorder_error_rate: 0.075,
            min_latency_ms: 200,
            max_latency_ms: 1200,
        }
    }
}

impl FaultProfile {
    /// No faults, no latency. The profile tests run with.
    pub fn none() -> Self {
        FaultProfile {
            read_error_rate: 0.0,
            write_error_rate: 0.0,
            reorder_error_rate: 0.0,
            min_latency_ms: 0,
            max_latency_ms: 0,
        }
    }

    /// Every write fails; reads succeed. Used to force rollback paths.
    pub fn failing_writes() -> Self {
        FaultProfile {
            write_error_rate: 1.0,
            reorder_error_rate: 1.0,
            ..FaultProfile::none()
        }
    }
}

/// Which of the four list envelope shapes the mock emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvelopeStyle {
    /// `{success, data: {data, pagination}}`, the shape real handlers use.
    #[default]
    Nested,
    /// `{data, pagination}`
    Paginated,
    /// `{items, total}`
    ItemsTotal,
    /// bare `[T]`
    Bare,
}

/// Per-endpoint-class call counters, for asserting no-op guarantees.
#[derive(Debug, Default)]
pub struct CallCounts {
    reads: AtomicUsize,
    writes: AtomicUsize,
    reorders: AtomicUsize,
}

impl CallCounts {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reorders(&self) -> usize {
        self.reorders.load(Ordering::SeqCst)
    }
}

/// The opaque fault-injecting backend stand-in.
pub struct MockBackend {
    jobs: RwLock<HashMap<String, Job>>,
    candidates: RwLock<HashMap<String, Candidate>>,
    timelines: RwLock<Vec<TimelineEntry>>,
    faults: FaultProfile,
    envelope: EnvelopeStyle,
    next_id: AtomicU64,
    counts: CallCounts,
}

impl MockBackend {
    pub fn new(faults: FaultProfile) -> Self {
        MockBackend {
            jobs: RwLock::new(HashMap::new()),
            candidates: RwLock::new(HashMap::new()),
            timelines: RwLock::new(Vec::new()),
            faults,
            envelope: EnvelopeStyle::default(),
            next_id: AtomicU64::new(1),
            counts: CallCounts::default(),
        }
    }

    pub fn with_envelope(mut self, envelope: EnvelopeStyle) -> Self {
        self.envelope = envelope;
        self
    }

    pub fn counts(&self) -> &CallCounts {
        &self.counts
    }

    pub fn seed_jobs(&self, jobs: impl IntoIterator<Item = Job>) {
        let mut table = self.jobs.write().unwrap();
        for job in jobs {
            table.insert(job.id.clone(), job);
        }
    }

    pub fn seed_candidates(&self, candidates: impl IntoIterator<Item = Candidate>) {
        let mut table = self.candidates.write().unwrap();
        for candidate in candidates {
            table.insert(candidate.id.clone(), candidate);
        }
    }

    fn fresh_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn simulate_latency(&self) {
        if self.faults.max_latency_ms == 0 {
            return;
        }
        let span = (self.faults.max_latency_ms - self.faults.min_latency_ms) as f64;
        let ms = self.faults.min_latency_ms + (rand_simple() * span) as u64;
        sleep(Duration::from_millis(ms)).await;
    }

    fn maybe_fail(&self, rate: f64, what: &str) -> Result<(), ApiError> {
        if rate > 0.0 && rand_simple() < rate {
            Err(ApiError::Network(format!("failed to {what}")))
        } else {
            Ok(())
        }
    }

    fn paginate<T: Clone>(items: &[T], page: u32, limit: u32) -> Paginated<T> {
        let total = items.len() as u64;
        let start = ((page.max(1) - 1) * limit) as usize;
        let data = items
            .iter()
            .skip(start)
            .take(limit as usize)
            .cloned()
            .collect();
        Paginated {
            data,
            pagination: Pagination::compute(page.max(1), limit, total),
        }
    }

    fn envelop<T: serde::Serialize>(&self, page: Paginated<T>) -> Value {
        match self.envelope {
            EnvelopeStyle::Nested => serde_json::json!({
                "success": true,
                "data": {
                    "data": page.data,
                    "pagination": page.pagination,
                },
            }),
            EnvelopeStyle::Paginated => serde_json::json!({
                "data": page.data,
                "pagination": page.pagination,
            }),
            EnvelopeStyle::ItemsTotal => serde_json::json!({
                "items": page.data,
                "total": page.pagination.total,
            }),
            EnvelopeStyle::Bare => serde_json::json!(page.data),
        }
    }

    fn sort_jobs(jobs: &mut [Job], sort: &Option<(String, SortDirection)>) {
        match sort {
            Some((field, dir)) => {
                jobs.sort_by(|a, b| {
                    let ord = match field.as_str() {
                        "title" => a.title.cmp(&b.title),
                        "createdAt" => a.created_at.cmp(&b.created_at),
                        _ => a.order.cmp(&b.order),
                    };
                    match dir {
                        SortDirection::Asc => ord,
                        SortDirection::Desc => ord.reverse(),
                    }
                });
            }
            // Listing context default: ascending display order, id ties.
            None => jobs.sort_by(|a, b| a.order.cmp(&b.order).then(a.id.cmp(&b.id))),
        }
    }

    fn timeline_kind(stage: Stage) -> &'static str {
        match stage {
            Stage::Hired => "hire",
            Stage::Rejected => "rejection",
            Stage::Interview => "interview",
            _ => "review",
        }
    }

    fn push_timeline(&self, candidate_id: &str, kind: &str, title: String, description: String) {
        let entry = TimelineEntry {
            id: self.fresh_id("timeline"),
            candidate_id: candidate_id.to_string(),
            kind: kind.to_string(),
            title,
            description: Some(description),
            date: now_ms(),
            performed_by: "current-user".to_string(),
        };
        self.timelines.write().unwrap().push(entry);
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn list_jobs(&self, params: &SearchParams) -> Result<Value, ApiError> {
        self.counts.reads.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.maybe_fail(self.faults.read_error_rate, "fetch jobs")?;

        let mut jobs: Vec<Job> = self.jobs.read().unwrap().values().cloned().collect();

        if let Some(query) = &params.query {
            let query = query.to_lowercase();
            jobs.retain(|j| {
                j.title.to_lowercase().contains(&query)
                    || j.department
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&query))
            });
        }
        Self::sort_jobs(&mut jobs, &params.sort);

        let page = params.page.unwrap_or(1);
        let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        Ok(self.envelop(Self::paginate(&jobs, page, limit)))
    }

    async fn get_job(&self, id: &str) -> Result<ApiResponse<Job>, ApiError> {
        self.counts.reads.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.maybe_fail(self.faults.read_error_rate, "fetch job")?;

        Ok(match self.jobs.read().unwrap().get(id) {
            Some(job) => ApiResponse::ok(job.clone()),
            None => ApiResponse::err("Job not found"),
        })
    }

    async fn create_job(&self, draft: JobDraft) -> Result<ApiResponse<Job>, ApiError> {
        self.counts.writes.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.maybe_fail(self.faults.write_error_rate, "create job")?;

        let now = now_ms();
        let job = Job {
            id: self.fresh_id("job"),
            title: draft.title,
            status: draft.status,
            tags: draft.tags,
            order: draft.order,
            department: draft.department,
            location: draft.location,
            created_at: now,
            updated_at: now,
        };
        self.jobs
            .write()
            .unwrap()
            .insert(job.id.clone(), job.clone());
        Ok(ApiResponse::ok(job))
    }

    async fn update_job(&self, id: &str, patch: JobPatch) -> Result<ApiResponse<Job>, ApiError> {
        self.counts.writes.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.maybe_fail(self.faults.write_error_rate, "update job")?;

        let mut jobs = self.jobs.write().unwrap();
        let Some(job) = jobs.get_mut(id) else {
            return Ok(ApiResponse::err("Job not found"));
        };
        if let Some(title) = patch.title {
            job.title = title;
        }
        if let Some(status) = patch.status {
            job.status = status;
        }
        if let Some(tags) = patch.tags {
            job.tags = tags;
        }
        if let Some(order) = patch.order {
            job.order = order;
        }
        job.updated_at = now_ms();
        Ok(ApiResponse::ok(job.clone()))
    }

    async fn reorder_job(&self, id: &str, new_order: i64) -> Result<ApiResponse<Job>, ApiError> {
        self.counts.reorders.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.maybe_fail(self.faults.reorder_error_rate, "reorder job")?;

        let mut jobs = self.jobs.write().unwrap();
        let Some(job) = jobs.get_mut(id) else {
            return Ok(ApiResponse::err("Job not found"));
        };
        job.order = new_order;
        job.updated_at = now_ms();
        Ok(ApiResponse::ok(job.clone()))
    }

    async fn list_candidates(&self, params: &SearchParams) -> Result<Value, ApiError> {
        self.counts.reads.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.maybe_fail(self.faults.read_error_rate, "fetch candidates")?;

        let mut candidates: Vec<Candidate> =
            self.candidates.read().unwrap().values().cloned().collect();

        if let Some(job_id) = &params.job_id {
            candidates.retain(|c| c.job_id.as_deref() == Some(job_id));
        }
        if let Some(stage) = params.stage {
            candidates.retain(|c| c.stage == stage);
        }
        if let Some(query) = &params.query {
            let query = query.to_lowercase();
            candidates.retain(|c| {
                c.name.to_lowercase().contains(&query) || c.email.to_lowercase().contains(&query)
            });
        }
        // Most recent applications first, the board's display order.
        candidates.sort_by(|a, b| b.applied_at.cmp(&a.applied_at).then(a.id.cmp(&b.id)));

        let page = params.page.unwrap_or(1);
        let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        Ok(self.envelop(Self::paginate(&candidates, page, limit)))
    }

    async fn get_candidate(&self, id: &str) -> Result<ApiResponse<Candidate>, ApiError> {
        self.counts.reads.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.maybe_fail(self.faults.read_error_rate, "fetch candidate")?;

        Ok(match self.candidates.read().unwrap().get(id) {
            Some(candidate) => ApiResponse::ok(candidate.clone()),
            None => ApiResponse::err("Candidate not found"),
        })
    }

    async fn create_candidate(
        &self,
        draft: CandidateDraft,
    ) -> Result<ApiResponse<Candidate>, ApiError> {
        self.counts.writes.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.maybe_fail(self.faults.write_error_rate, "create candidate")?;

        let now = now_ms();
        let candidate = Candidate {
            id: self.fresh_id("candidate"),
            name: draft.name,
            email: draft.email,
            phone: draft.phone,
            job_id: draft.job_id,
            stage: Stage::Applied,
            applied_at: now,
            created_at: now,
            updated_at: now,
        };
        self.candidates
            .write()
            .unwrap()
            .insert(candidate.id.clone(), candidate.clone());
        self.push_timeline(
            &candidate.id,
            "application",
            "Application Submitted".to_string(),
            "Applied for the position".to_string(),
        );
        Ok(ApiResponse::ok(candidate))
    }

    async fn update_candidate(
        &self,
        id: &str,
        patch: CandidatePatch,
    ) -> Result<ApiResponse<Candidate>, ApiError> {
        self.counts.writes.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.maybe_fail(self.faults.write_error_rate, "update candidate")?;

        let updated = {
            let mut candidates = self.candidates.write().unwrap();
            let Some(candidate) = candidates.get_mut(id) else {
                return Ok(ApiResponse::err("Candidate not found"));
            };
            let previous_stage = candidate.stage;
            if let Some(name) = patch.name {
                candidate.name = name;
            }
            if let Some(email) = patch.email {
                candidate.email = email;
            }
            if let Some(stage) = patch.stage {
                candidate.stage = stage;
            }
            candidate.updated_at = now_ms();
            (candidate.clone(), previous_stage)
        };

        let (candidate, previous_stage) = updated;
        if candidate.stage != previous_stage {
            self.push_timeline(
                id,
                Self::timeline_kind(candidate.stage),
                format!("Stage changed to {}", candidate.stage.as_str()),
                format!("Candidate moved to {} stage", candidate.stage.as_str()),
            );
        }
        Ok(ApiResponse::ok(candidate))
    }

    async fn candidate_timeline(
        &self,
        id: &str,
    ) -> Result<ApiResponse<Vec<TimelineEntry>>, ApiError> {
        self.counts.reads.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.maybe_fail(self.faults.read_error_rate, "fetch timeline")?;

        let mut entries: Vec<TimelineEntry> = self
            .timelines
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.candidate_id == id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.date);
        Ok(ApiResponse::ok(entries))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::model::{Candidate, Job, JobStatus, Stage};

    pub(crate) fn job(id: &str, order: i64) -> Job {
        Job {
            id: id.to_string(),
            title: format!("Job {id}"),
            status: JobStatus::Active,
            order,
            tags: vec![],
            department: None,
            location: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub(crate) fn candidate(id: &str, stage: Stage, applied_at: i64) -> Candidate {
        Candidate {
            id: id.to_string(),
            name: format!("Candidate {id}"),
            email: format!("{id}@example.com"),
            phone: None,
            job_id: None,
            stage,
            applied_at,
            created_at: applied_at,
            updated_at: applied_at,
        }
    }
}
