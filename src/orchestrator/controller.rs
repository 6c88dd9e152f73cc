//! Remote-call controller.
//!
//! Serializes UI commands into service calls, one at a time, and emits the
//! results as events for presentation layers.

use crate::cache::JobCache;
use crate::client::WorkflowServiceClient;
use crate::error::{FetchError, SubmissionError};
use crate::history::{fetch_run_batch, RunBatch};
use crate::model::{Job, RunNowResponse, SubmissionPayload};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Commands emitted by UI layers.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    /// Job listing; `refresh` bypasses the cache.
    LoadJobs { refresh: bool },
    LoadJob { job_id: i64 },
    LoadRuns { job_id: i64, limit: u32, offset: u32 },
    Submit(SubmissionPayload),
    Quit,
}

/// Results delivered back to UI layers.
#[derive(Debug)]
pub(crate) enum AppEvent {
    JobsLoaded(Vec<Job>),
    JobLoaded(Job),
    RunsLoaded {
        job_id: i64,
        limit: u32,
        offset: u32,
        batch: RunBatch,
    },
    Submitted { job_id: i64, run_id: i64 },
    SubmissionFailed(String),
    Info(String),
}

/// Service access with the advisory job cache in front of it.
pub(crate) struct Session {
    client: Arc<dyn WorkflowServiceClient>,
    cache: JobCache,
}

impl Session {
    pub(crate) fn new(client: Arc<dyn WorkflowServiceClient>, cache_ttl: Duration) -> Self {
        Self {
            client,
            cache: JobCache::new(cache_ttl),
        }
    }

    pub(crate) fn client(&self) -> &dyn WorkflowServiceClient {
        self.client.as_ref()
    }

    pub(crate) async fn jobs(&mut self, refresh: bool) -> Result<Vec<Job>, FetchError> {
        if refresh {
            self.cache.clear();
        } else if let Some(jobs) = self.cache.listing(true) {
            return Ok(jobs);
        }
        let jobs = self
            .client
            .list_jobs(true)
            .await
            .map_err(FetchError::jobs)?;
        self.cache.store_listing(true, jobs.clone());
        Ok(jobs)
    }

    pub(crate) async fn job(&mut self, job_id: i64) -> Result<Job, FetchError> {
        if let Some(job) = self.cache.job(job_id) {
            return Ok(job);
        }
        let job = self
            .client
            .get_job(job_id)
            .await
            .map_err(|e| FetchError::job(job_id, e))?;
        self.cache.store_job(job.clone());
        Ok(job)
    }

    /// Send run-now. Failures are returned as-is, never retried.
    pub(crate) async fn submit(
        &self,
        payload: &SubmissionPayload,
    ) -> Result<RunNowResponse, SubmissionError> {
        let resp = self
            .client
            .run_now(payload)
            .await
            .map_err(|source| SubmissionError {
                job_id: payload.job_id,
                source,
            })?;
        tracing::info!(job_id = payload.job_id, run_id = resp.run_id, "job triggered");
        Ok(resp)
    }
}

/// Handle UI commands until `Quit` or until the UI hangs up.
pub(crate) async fn run_controller(
    mut session: Session,
    event_tx: UnboundedSender<AppEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    while let Some(cmd) = cmd_rx.recv().await {
        tracing::debug!(?cmd, "ui command");
        let ev = match cmd {
            UiCommand::LoadJobs { refresh } => match session.jobs(refresh).await {
                Ok(jobs) => AppEvent::JobsLoaded(jobs),
                Err(e) => {
                    tracing::warn!(error = %e, "job listing failed");
                    AppEvent::Info(e.to_string())
                }
            },
            UiCommand::LoadJob { job_id } => match session.job(job_id).await {
                Ok(job) => AppEvent::JobLoaded(job),
                Err(e) => {
                    tracing::warn!(error = %e, "job details failed");
                    AppEvent::Info(e.to_string())
                }
            },
            UiCommand::LoadRuns {
                job_id,
                limit,
                offset,
            } => AppEvent::RunsLoaded {
                job_id,
                limit,
                offset,
                batch: fetch_run_batch(session.client(), job_id, limit, offset).await,
            },
            UiCommand::Submit(payload) => match session.submit(&payload).await {
                Ok(resp) => AppEvent::Submitted {
                    job_id: payload.job_id,
                    run_id: resp.run_id,
                },
                Err(e) => {
                    tracing::warn!(error = %e, "run-now failed");
                    AppEvent::SubmissionFailed(e.to_string())
                }
            },
            UiCommand::Quit => break,
        };
        if event_tx.send(ev).is_err() {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::tests::FakeService;
    use crate::model::ParameterEncoding;
    use indexmap::IndexMap;
    use std::sync::atomic::Ordering;
    use tokio::sync::mpsc;

    fn job(id: i64) -> Job {
        Job {
            job_id: id,
            name: Some(format!("job-{id}")),
            tasks: vec![],
            parameters: IndexMap::new(),
        }
    }

    fn payload(job_id: i64) -> SubmissionPayload {
        SubmissionPayload {
            job_id,
            parameters: ParameterEncoding::JobParameters(IndexMap::from([(
                "triggered_by".to_string(),
                "a@b.com".to_string(),
            )])),
            tasks: None,
        }
    }

    #[tokio::test]
    async fn job_listing_is_cached_until_refresh() {
        let service = Arc::new(FakeService {
            jobs: vec![job(1), job(2)],
            ..Default::default()
        });
        let mut session = Session::new(service.clone(), Duration::from_secs(60));

        assert_eq!(session.jobs(false).await.unwrap().len(), 2);
        assert_eq!(session.jobs(false).await.unwrap().len(), 2);
        assert_eq!(service.list_calls.load(Ordering::SeqCst), 1);

        session.jobs(true).await.unwrap();
        assert_eq!(service.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn controller_answers_each_command_in_order() {
        let service = Arc::new(FakeService {
            jobs: vec![job(1)],
            ..FakeService::with_runs(3)
        });
        let session = Session::new(service.clone(), Duration::from_secs(60));
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        cmd_tx.send(UiCommand::LoadJobs { refresh: false }).unwrap();
        cmd_tx.send(UiCommand::LoadJob { job_id: 9 }).unwrap();
        cmd_tx
            .send(UiCommand::LoadRuns {
                job_id: 1,
                limit: 5,
                offset: 0,
            })
            .unwrap();
        cmd_tx.send(UiCommand::Submit(payload(1))).unwrap();
        cmd_tx.send(UiCommand::Quit).unwrap();

        run_controller(session, event_tx, cmd_rx).await.unwrap();

        assert!(matches!(event_rx.recv().await, Some(AppEvent::JobsLoaded(j)) if j.len() == 1));
        assert!(
            matches!(event_rx.recv().await, Some(AppEvent::Info(msg)) if msg.contains("Job 9 does not exist"))
        );
        match event_rx.recv().await {
            Some(AppEvent::RunsLoaded { job_id, batch, .. }) => {
                assert_eq!(job_id, 1);
                assert_eq!(batch.runs.len(), 3);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            event_rx.recv().await,
            Some(AppEvent::Submitted { job_id: 1, run_id: 5001 })
        ));
        assert!(event_rx.recv().await.is_none());
        assert_eq!(service.submitted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn submission_failure_is_reported_verbatim() {
        let service = Arc::new(FakeService::default());
        service.fail.store(true, Ordering::SeqCst);
        let session = Session::new(service, Duration::from_secs(60));
        let err = session.submit(&payload(4)).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "error triggering job 4: TEMPORARILY_UNAVAILABLE (HTTP 503): try again"
        );
    }
}
