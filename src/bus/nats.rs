use super::envelope::{JobRequest, JobResponse};
use super::transport::{JobTransport, MessageTransport, TransportError};
use super::BusConfig;
use anyhow::{Context, Result};
use async_nats::client::RequestErrorKind;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::time::Duration;
use tracing::{debug, info};

/// NATS-backed bus: jobs are request/reply on one subject, message channels
/// are plain subjects.
pub struct NatsTransport {
    client: async_nats::Client,
    jobs_subject: String,
}

impl NatsTransport {
    /// Connect to NATS
    pub async fn connect(config: &BusConfig) -> Result<Self> {
        info!("Connecting to NATS at {}", config.url);

        let client = async_nats::ConnectOptions::new()
            .request_timeout(Some(Duration::from_millis(config.request_timeout_ms)))
            .connect(config.url.as_str())
            .await
            .context("Failed to connect to NATS")?;

        info!(jobs_subject = %config.jobs_subject, "Connected to NATS");

        Ok(Self {
            client,
            jobs_subject: config.jobs_subject.clone(),
        })
    }
}

#[async_trait]
impl JobTransport for NatsTransport {
    async fn request(&self, request: JobRequest) -> Result<JobResponse, TransportError> {
        let payload = serde_json::to_vec(&request)
            .map_err(|e| TransportError::InvalidFrame(e.to_string()))?;

        debug!(
            subject = %self.jobs_subject,
            job_type = ?request.job_type(),
            "Publishing job request"
        );

        let reply = self
            .client
            .request(self.jobs_subject.clone(), payload.into())
            .await
            .map_err(|e| match e.kind() {
                RequestErrorKind::TimedOut => TransportError::TimedOut,
                _ => TransportError::Unavailable(e.to_string()),
            })?;

        serde_json::from_slice(&reply.payload)
            .map_err(|e| TransportError::InvalidFrame(e.to_string()))
    }
}

#[async_trait]
impl MessageTransport for NatsTransport {
    async fn subscribe(
        &self,
        subject: String,
    ) -> Result<BoxStream<'static, Vec<u8>>, TransportError> {
        let subscriber = self
            .client
            .subscribe(subject)
            .await
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;

        Ok(subscriber.map(|message| message.payload.to_vec()).boxed())
    }
}
