//! Incremental run history paging.
//!
//! A [`RunHistoryCursor`] belongs to one interactive session. It only grows:
//! successful batches are appended, failed ones leave it untouched. A short
//! batch hints that history is exhausted but the next request may still
//! return runs that started in the meantime.

use crate::client::WorkflowServiceClient;
use crate::error::FetchError;
use crate::model::RunRecord;

/// Result of one run-history request. On failure `runs` is empty and `error` set.
#[derive(Debug)]
pub struct RunBatch {
    pub runs: Vec<RunRecord>,
    pub error: Option<FetchError>,
}

/// Fetch `limit` runs of `job_id` starting at `offset`, never failing outright.
pub async fn fetch_run_batch(
    client: &dyn WorkflowServiceClient,
    job_id: i64,
    limit: u32,
    offset: u32,
) -> RunBatch {
    match client.list_runs(job_id, limit, offset).await {
        Ok(runs) => RunBatch { runs, error: None },
        Err(e) => {
            let err = FetchError::runs(job_id, e);
            tracing::warn!(job_id, offset, error = %err, "run history fetch failed");
            RunBatch {
                runs: Vec::new(),
                error: Some(err),
            }
        }
    }
}

/// What applying a batch did to the cursor.
#[derive(Debug)]
pub enum BatchOutcome {
    /// `n` runs appended and the offset advanced.
    Appended(usize),
    /// The fetch failed; history unchanged.
    Failed(FetchError),
    /// Batch belongs to another job or an older offset; ignored.
    Stale,
}

#[derive(Debug, Clone, Default)]
pub struct RunHistoryCursor {
    job_id: Option<i64>,
    offset: u32,
    runs: Vec<RunRecord>,
    short_batch_seen: bool,
}

impl RunHistoryCursor {
    pub fn job_id(&self) -> Option<i64> {
        self.job_id
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn runs(&self) -> &[RunRecord] {
        &self.runs
    }

    /// True once a batch came back shorter than requested.
    pub fn likely_complete(&self) -> bool {
        self.short_batch_seen
    }

    /// Switch to `job_id`; history is dropped when the job changes.
    pub fn select_job(&mut self, job_id: i64) -> bool {
        if self.job_id == Some(job_id) {
            return false;
        }
        *self = Self {
            job_id: Some(job_id),
            ..Self::default()
        };
        true
    }

    /// Drop accumulated history but keep the selected job.
    pub fn reset(&mut self) {
        self.offset = 0;
        self.runs.clear();
        self.short_batch_seen = false;
    }

    pub fn needs_initial_load(&self) -> bool {
        self.job_id.is_some() && self.offset == 0
    }

    /// Fold a batch fetched for (`job_id`, `offset`) into the history.
    ///
    /// The offset advances by `limit` however many runs came back.
    pub fn apply_batch(
        &mut self,
        job_id: i64,
        offset: u32,
        limit: u32,
        batch: RunBatch,
    ) -> BatchOutcome {
        if self.job_id != Some(job_id) || self.offset != offset {
            return BatchOutcome::Stale;
        }
        if let Some(err) = batch.error {
            return BatchOutcome::Failed(err);
        }
        let n = batch.runs.len();
        self.short_batch_seen = n < limit as usize;
        self.runs.extend(batch.runs);
        self.offset += limit;
        BatchOutcome::Appended(n)
    }

    /// Fetch the next batch of the selected job and apply it.
    pub async fn load_more(
        &mut self,
        client: &dyn WorkflowServiceClient,
        limit: u32,
    ) -> BatchOutcome {
        let Some(job_id) = self.job_id else {
            return BatchOutcome::Stale;
        };
        let offset = self.offset;
        let batch = fetch_run_batch(client, job_id, limit, offset).await;
        self.apply_batch(job_id, offset, limit, batch)
    }
}
