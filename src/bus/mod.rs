// Device cloud bus: job envelopes, transports and the per-connection gateway

mod envelope;
mod gateway;
pub mod message;
mod nats;
mod transport;

pub use envelope::{
    EventType, JobAuth, JobMetadata, JobRequest, JobResponse, JobType, ResponseMetadata,
    Subscription,
};
pub use gateway::BusGateway;
pub use message::{BusEvent, RouteHop};
pub use nats::NatsTransport;
pub use transport::{JobTransport, MessageTransport, TransportError};

use serde::Deserialize;

/// Bus configuration
#[derive(Clone, Debug, Deserialize)]
pub struct BusConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_jobs_subject")]
    pub jobs_subject: String,
    #[serde(default = "default_messages_namespace")]
    pub messages_namespace: String,
    /// Deadline for every job request
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_jobs_subject() -> String {
    "meshblu.jobs".to_string()
}

fn default_messages_namespace() -> String {
    "meshblu.messages".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5000
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            jobs_subject: default_jobs_subject(),
            messages_namespace: default_messages_namespace(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}
