//! The per-stage board: seven columns of paginated candidates with
//! optimistic drag-and-drop moves.
//!
//! The controller owns a local projection of the cached per-stage pages
//! (`columns`). Moves splice the local projection immediately, then run the
//! stage patch through the mutation engine; a failed patch restores both the
//! cache (engine rollback) and the local projection (saved copy here).

use std::collections::HashMap;

use futures::future::join_all;

use crate::backend::CandidatePatch;
use crate::error::ApiError;
use crate::key::NS_CANDIDATES_BY_STAGE;
use crate::model::{Candidate, Stage};
use crate::queries::QueryClient;

const BOARD_PAGE_SIZE: u32 = 6;

/// Drives the seven-column stage board against a [`QueryClient`].
pub struct StageBoardController {
    client: QueryClient,
    job_id: Option<String>,
    page_size: u32,
    /// Highest page loaded so far per stage; columns hold pages `1..=n`.
    pages: HashMap<Stage, u32>,
    has_next: HashMap<Stage, bool>,
    columns: HashMap<Stage, Vec<Candidate>>,
    /// Fingerprint of the last applied column set, so a refresh that yields
    /// structurally identical data does not clobber local state.
    last_applied: String,
}

impl StageBoardController {
    pub fn new(client: QueryClient, job_id: Option<String>) -> Self {
        StageBoardController {
            client,
            job_id,
            page_size: BOARD_PAGE_SIZE,
            pages: Stage::ALL.iter().map(|&s| (s, 1)).collect(),
            has_next: HashMap::new(),
            columns: HashMap::new(),
            last_applied: String::new(),
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// The candidates currently shown in a column.
    pub fn column(&self, stage: Stage) -> &[Candidate] {
        self.columns.get(&stage).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether a column has more pages to load.
    pub fn has_more(&self, stage: Stage) -> bool {
        self.has_next.get(&stage).copied().unwrap_or(false)
    }

    /// Fetch all loaded pages for every stage concurrently and apply the
    /// result to the columns.
    pub async fn refresh(&mut self) -> Result<(), ApiError> {
        let fetches = Stage::ALL.iter().map(|&stage| {
            let client = self.client.clone();
            let job_id = self.job_id.clone();
            let loaded = self.pages.get(&stage).copied().unwrap_or(1);
            let limit = self.page_size;
            async move {
                let mut items = Vec::new();
                let mut has_next = false;
                for page in 1..=loaded {
                    let result = client
                        .candidates_by_stage(stage, page, limit, job_id.as_deref())
                        .await?;
                    has_next = result.pagination.has_next;
                    items.extend(result.data);
                }
                Ok::<_, ApiError>((stage, items, has_next))
            }
        });

        let mut columns = HashMap::new();
        for result in join_all(fetches).await {
            let (stage, items, has_next) = result?;
            self.has_next.insert(stage, has_next);
            columns.insert(stage, items);
        }
        self.sync_columns(columns);
        Ok(())
    }

    /// Load the next page for one column.
    ///
    /// Returns `Ok(false)` without a network call when the column's last
    /// page reported no next page.
    pub async fn load_more(&mut self, stage: Stage) -> Result<bool, ApiError> {
        if !self.has_more(stage) {
            return Ok(false);
        }

        let next_page = self.pages.get(&stage).copied().unwrap_or(1) + 1;
        let result = self
            .client
            .candidates_by_stage(stage, next_page, self.page_size, self.job_id.as_deref())
            .await?;

        self.pages.insert(stage, next_page);
        self.has_next.insert(stage, result.pagination.has_next);

        let column = self.columns.entry(stage).or_default();
        for candidate in result.data {
            if !column.iter().any(|c| c.id == candidate.id) {
                column.push(candidate);
            }
        }
        self.last_applied = Self::fingerprint(&self.columns);
        Ok(true)
    }

    /// Move a candidate from `from_stage` to `to_stage` at `to_index`,
    /// optimistically.
    ///
    /// Dropping a card back where it came from is a no-op with no network
    /// call, as is a drag event whose source stage no longer matches where
    /// the candidate actually sits. On failure the columns revert to their
    /// pre-move arrangement and the error is returned for the caller to
    /// surface.
    pub async fn move_candidate(
        &mut self,
        candidate_id: &str,
        from_stage: Stage,
        to_stage: Stage,
        to_index: usize,
    ) -> Result<(), ApiError> {
        let Some(from_index) = self
            .columns
            .get(&from_stage)
            .and_then(|column| column.iter().position(|c| c.id == candidate_id))
        else {
            return Ok(());
        };
        if from_stage == to_stage && from_index == to_index {
            return Ok(());
        }

        let saved_columns = self.columns.clone();
        let saved_fingerprint = self.last_applied.clone();

        let mut moved = match self.columns.get_mut(&from_stage) {
            Some(column) => column.remove(from_index),
            None => return Ok(()),
        };
        moved.stage = to_stage;
        let dest = self.columns.entry(to_stage).or_default();
        let index = to_index.min(dest.len());
        dest.insert(index, moved);
        self.last_applied = Self::fingerprint(&self.columns);

        let patch = CandidatePatch {
            stage: Some(to_stage),
            ..Default::default()
        };
        match self.client.update_candidate(candidate_id, patch).await {
            Ok(_) => Ok(()),
            Err(e) => {
                self.columns = saved_columns;
                self.last_applied = saved_fingerprint;
                Err(e)
            }
        }
    }

    /// Drop every cached board page and refetch from scratch, falling back
    /// to a full recovery when the refetch itself fails.
    pub async fn reload_data(&mut self) -> Result<(), ApiError> {
        self.client
            .cache()
            .remove(|k| k.in_namespace(NS_CANDIDATES_BY_STAGE));
        if let Err(e) = self.refresh().await {
            tracing::warn!(error = %e, "board reload failed, running full recovery");
            return self.recover().await;
        }
        Ok(())
    }

    /// Last-resort reset: drop all candidate-scoped cache entries and local
    /// state, then rebuild the board from page 1 of every stage.
    pub async fn recover(&mut self) -> Result<(), ApiError> {
        self.client.cache().remove(QueryClient::is_candidate_key);
        self.pages = Stage::ALL.iter().map(|&s| (s, 1)).collect();
        self.has_next.clear();
        self.columns.clear();
        self.last_applied.clear();
        self.refresh().await
    }

    /// Replace the columns only when the incoming data is structurally
    /// different from what was last applied.
    fn sync_columns(&mut self, incoming: HashMap<Stage, Vec<Candidate>>) {
        let fingerprint = Self::fingerprint(&incoming);
        if fingerprint != self.last_applied {
            self.columns = incoming;
            self.last_applied = fingerprint;
        }
    }

    fn fingerprint(columns: &HashMap<Stage, Vec<Candidate>>) -> String {
        let mut parts = Vec::with_capacity(Stage::ALL.len());
        for stage in Stage::ALL {
            let ids = columns
                .get(&stage)
                .map(|column| {
                    column
                        .iter()
                        .map(|c| c.id.as_str())
                        .collect::<Vec<_>>()
                        .join(",")
                })
                .unwrap_or_default();
            parts.push(format!("{}:{ids}", stage.as_str()));
        }
        parts.join(";")
    }
}
