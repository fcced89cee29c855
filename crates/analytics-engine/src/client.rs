//! HTTP implementation of [`AnalyticsEngine`].

use async_trait::async_trait;
use pipeline::{AnalyticsEngine, EngineError, EngineRun, Template};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::EngineConfig;
use crate::wire::{JobRequest, JobState, JobStatus, Submitted};

/// Failure to construct the client.
#[derive(Debug, Error)]
pub enum EngineClientError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Submits templates as jobs and polls them to completion.
#[derive(Debug, Clone)]
pub struct HttpAnalyticsEngine {
    client: Client,
    config: EngineConfig,
    base_url: String,
    token: Option<String>,
}

fn transport(e: reqwest::Error) -> EngineError {
    EngineError::Unavailable {
        message: e.to_string(),
    }
}

fn malformed(e: impl std::fmt::Display) -> EngineError {
    EngineError::MalformedResponse {
        message: e.to_string(),
    }
}

/// Decodes a success body or maps the status to an [`EngineError`].
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, EngineError> {
    let status = response.status();
    let body = response.text().await.map_err(transport)?;
    if status.is_server_error() || status.as_u16() == 429 {
        return Err(EngineError::Unavailable {
            message: format!("{status}: {}", body.trim()),
        });
    }
    if !status.is_success() {
        return Err(EngineError::Rejected {
            status: status.as_u16(),
            message: body.trim().to_string(),
        });
    }
    serde_json::from_str(&body).map_err(malformed)
}

impl HttpAnalyticsEngine {
    /// # Errors
    ///
    /// [`EngineClientError::Client`] if the HTTP client cannot be built.
    pub fn new(config: EngineConfig, token: Option<String>) -> Result<Self, EngineClientError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            config,
            token,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn submit(&self, template: &Template) -> Result<String, EngineError> {
        let request = self
            .client
            .post(format!("{}/v1/jobs", self.base_url))
            .json(&JobRequest::from(template));
        let response = self.authorized(request).send().await.map_err(transport)?;
        let submitted: Submitted = decode(response).await?;
        Ok(submitted.id)
    }

    async fn status(&self, job_id: &str) -> Result<JobStatus, EngineError> {
        let request = self.client.get(format!("{}/v1/jobs/{job_id}", self.base_url));
        let response = self.authorized(request).send().await.map_err(transport)?;
        decode(response).await
    }

    /// Polls `job_id` until it is terminal or `deadline` passes.
    async fn wait(&self, job_id: &str, deadline: Instant) -> Result<JobStatus, EngineError> {
        loop {
            let status = self.status(job_id).await?;
            if status.status.is_terminal() {
                return Ok(status);
            }
            debug!(job_id, state = ?status.status, "job not finished");
            let now = Instant::now();
            if now >= deadline {
                return Err(EngineError::Timeout {
                    after: self.config.max_wait(),
                });
            }
            tokio::time::sleep(self.config.poll_interval().min(deadline - now)).await;
        }
    }
}

#[async_trait]
impl AnalyticsEngine for HttpAnalyticsEngine {
    #[instrument(skip_all, fields(template = %template.name, algorithm = %template.algorithm))]
    async fn execute(&self, template: &Template) -> Result<EngineRun, EngineError> {
        let started = Instant::now();
        let deadline = started + self.config.max_wait();
        let job_id = self.submit(template).await?;
        info!(%job_id, "analytics job submitted");

        let status = self.wait(&job_id, deadline).await?;
        let elapsed = started.elapsed().as_secs_f64();
        if status.status == JobState::Failed {
            let message = status.error.unwrap_or_else(|| "no reason given".into());
            warn!(%job_id, %message, "analytics job failed");
            return Err(EngineError::JobFailed { job_id, message });
        }

        let mut rows = status.rows;
        if rows.len() > self.config.max_results {
            debug!(
                %job_id,
                returned = rows.len(),
                kept = self.config.max_results,
                "truncating job results"
            );
            rows.truncate(self.config.max_results);
        }
        info!(%job_id, rows = rows.len(), elapsed_seconds = elapsed, "analytics job completed");
        Ok(EngineRun {
            job_id,
            rows,
            metrics: status.metrics.into_performance(elapsed),
        })
    }
}
