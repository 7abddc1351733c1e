//! Remote job trigger
//!
//! [`JobTrigger`] is the seam the pipeline calls; [`RestJobClient`] is the
//! HTTP implementation. A trigger is a single request: the job is started
//! and its log location returned, without polling for completion.

use super::params::EtlParameterSet;
use crate::config::{Credentials, EtlTarget};
use crate::error::{AgentError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// Where to follow a started job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerOutcome {
    pub log_url: String,
}

#[async_trait]
pub trait JobTrigger: Send + Sync {
    async fn trigger(&self, target: &EtlTarget, params: &EtlParameterSet) -> Result<TriggerOutcome>;
}

#[derive(Debug, Serialize)]
struct ExecutionRequest<'a> {
    execution: Execution<'a>,
}

#[derive(Debug, Serialize)]
struct Execution<'a> {
    graph: &'a str,
    params: &'a BTreeMap<String, String>,
    #[serde(rename = "hiddenParams")]
    hidden_params: &'a BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ExecutionResponse {
    #[serde(rename = "executionTask")]
    execution_task: ExecutionTask,
}

#[derive(Debug, Deserialize)]
struct ExecutionTask {
    links: ExecutionLinks,
}

#[derive(Debug, Deserialize)]
struct ExecutionLinks {
    log: Option<String>,
    poll: Option<String>,
}

/// Starts jobs through `POST <process_url>/executions`
pub struct RestJobClient {
    client: Client,
    credentials: Credentials,
}

impl RestJobClient {
    pub fn new(client: Client, credentials: Credentials) -> Self {
        Self {
            client,
            credentials,
        }
    }
}

#[async_trait]
impl JobTrigger for RestJobClient {
    #[instrument(skip(self, target, params), fields(graph = %target.graph))]
    async fn trigger(&self, target: &EtlTarget, params: &EtlParameterSet) -> Result<TriggerOutcome> {
        let url = target.process.plain_child("executions");
        debug!("Triggering {} with parameters {:?}", url, params);

        let request = ExecutionRequest {
            execution: Execution {
                graph: &target.graph,
                params: &params.visible,
                hidden_params: &params.hidden,
            },
        };

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::trigger(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::trigger(format!(
                "{url} answered {status}: {}",
                body.trim()
            )));
        }

        let answer: ExecutionResponse = response
            .json()
            .await
            .map_err(|e| AgentError::trigger(format!("unexpected answer from {url}: {e}")))?;
        let links = answer.execution_task.links;
        let link = links
            .log
            .or(links.poll)
            .ok_or_else(|| AgentError::trigger(format!("{url} returned no log location")))?;

        // relative links resolve against the process URL
        let log_url = target
            .process
            .url
            .join(&link)
            .map(|u| u.to_string())
            .unwrap_or(link);

        info!("Job started, log at {}", log_url);
        Ok(TriggerOutcome { log_url })
    }
}
