use super::envelope::{JobRequest, JobResponse};
use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

/// Failures below the job protocol
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Transport gave up waiting for a reply
    #[error("request timed out")]
    TimedOut,
    /// Bus unreachable or connection dropped
    #[error("bus unavailable: {0}")]
    Unavailable(String),
    /// Reply could not be decoded as a job envelope
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}

/// Opaque request/response primitive carrying job envelopes
#[async_trait]
pub trait JobTransport: Send + Sync {
    async fn request(&self, request: JobRequest) -> Result<JobResponse, TransportError>;
}

/// Opaque publish/subscribe primitive; yields raw payloads published on `subject`
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn subscribe(&self, subject: String)
        -> Result<BoxStream<'static, Vec<u8>>, TransportError>;
}
