use async_trait::async_trait;
use common::{Assignment, AssignmentRequest, CompletionReport, CompletionResponse, CompletionStatus};
use reqwest::{Client, StatusCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("error HTTP hablando con el master: {0}")]
    Http(#[from] reqwest::Error),

    #[error("el master respondió {status}: {body}")]
    Server { status: u16, body: String },

    /// El master rechazó el pedido por inválido (4xx); reintentar no sirve.
    #[error("el master rechazó el pedido ({status}): {body}")]
    Rejected { status: u16, body: String },
}

impl TransportError {
    /// Conexión caída, timeouts y 5xx se reintentan; los rechazos no.
    pub fn is_transient(&self) -> bool {
        !matches!(self, TransportError::Rejected { .. })
    }
}

/// Lado worker del protocolo con el master.
#[async_trait]
pub trait CoordinatorApi: Send + Sync {
    async fn request_assignment(&self, worker_id: &str) -> Result<Assignment, TransportError>;

    async fn report_completion(
        &self,
        report: &CompletionReport,
    ) -> Result<CompletionStatus, TransportError>;
}

/// Implementación sobre HTTP/JSON contra el master.
#[derive(Clone)]
pub struct HttpCoordinator {
    client: Client,
    base_url: String,
}

impl HttpCoordinator {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, TransportError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        if status.is_client_error() && status != StatusCode::REQUEST_TIMEOUT {
            Err(TransportError::Rejected {
                status: status.as_u16(),
                body,
            })
        } else {
            Err(TransportError::Server {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl CoordinatorApi for HttpCoordinator {
    async fn request_assignment(&self, worker_id: &str) -> Result<Assignment, TransportError> {
        let url = format!("{}/api/v1/tasks/next", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&AssignmentRequest {
                worker_id: worker_id.to_string(),
            })
            .send()
            .await?;

        let assignment: Assignment = Self::check(resp).await?.json().await?;
        Ok(assignment)
    }

    async fn report_completion(
        &self,
        report: &CompletionReport,
    ) -> Result<CompletionStatus, TransportError> {
        let url = format!("{}/api/v1/tasks/complete", self.base_url);
        let resp = self.client.post(&url).json(report).send().await?;

        let body: CompletionResponse = Self::check(resp).await?.json().await?;
        Ok(body.status)
    }
}
