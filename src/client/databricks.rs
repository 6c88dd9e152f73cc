use super::WorkflowServiceClient;
use crate::error::ClientError;
use crate::model::{AppConfig, Job, RunNowResponse, RunRecord, SubmissionPayload};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Page size for jobs/list; the API caps it at 100.
const JOBS_PAGE_LIMIT: u32 = 100;

/// Jobs API 2.1 over HTTPS with a personal access token.
pub struct DatabricksClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobsPage {
    #[serde(default)]
    jobs: Vec<Job>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunsPage {
    #[serde(default)]
    runs: Vec<RunRecord>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Normalize a workspace host into a base URL without trailing slash.
fn base_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

impl DatabricksClient {
    pub fn new(cfg: &AppConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url(&cfg.host),
            token: cfg.token.clone().filter(|t| !t.is_empty()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/2.1/jobs/{}", self.base_url, path)
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token.as_deref() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        let resp = self.authorized(req).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            let parsed: ApiErrorBody = serde_json::from_str(&body).unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                error_code: parsed
                    .error_code
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("ERROR").to_string()),
                message: parsed.message.unwrap_or(body),
            });
        }
        serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[async_trait]
impl WorkflowServiceClient for DatabricksClient {
    async fn list_jobs(&self, expand_tasks: bool) -> Result<Vec<Job>, ClientError> {
        let mut jobs = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut req = self.http.get(self.url("list")).query(&[
                ("expand_tasks", expand_tasks.to_string()),
                ("limit", JOBS_PAGE_LIMIT.to_string()),
            ]);
            if let Some(token) = page_token.as_deref() {
                req = req.query(&[("page_token", token)]);
            }
            let page: JobsPage = self.send(req).await?;
            tracing::debug!(count = page.jobs.len(), has_more = page.has_more, "jobs page");
            jobs.extend(page.jobs);
            match page.next_page_token.filter(|t| page.has_more && !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }
        Ok(jobs)
    }

    async fn get_job(&self, job_id: i64) -> Result<Job, ClientError> {
        tracing::debug!(job_id, "get job");
        let req = self.http.get(self.url("get")).query(&[("job_id", job_id)]);
        self.send(req).await
    }

    async fn list_runs(
        &self,
        job_id: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<RunRecord>, ClientError> {
        tracing::debug!(job_id, limit, offset, "list runs");
        let req = self.http.get(self.url("runs/list")).query(&[
            ("job_id", job_id.to_string()),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ]);
        let page: RunsPage = self.send(req).await?;
        Ok(page.runs)
    }

    async fn run_now(&self, payload: &SubmissionPayload) -> Result<RunNowResponse, ClientError> {
        tracing::info!(job_id = payload.job_id, style = %payload.parameters.style(), "run-now");
        let req = self.http.post(self.url("run-now")).json(payload);
        self.send(req).await
    }
}
