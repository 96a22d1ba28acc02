use super::envelope::{JobAuth, JobRequest, JobResponse, JobType, Subscription};
use super::message::{self, BusEvent};
use super::transport::{JobTransport, MessageTransport, TransportError};
use super::BusConfig;
use crate::alias::AliasResolver;
use crate::device::{Device, DeviceType};
use crate::error::{GatewayError, Result};
use crate::session::Credentials;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Deserialize)]
struct SessionTokenReply {
    token: String,
}

/// Sender/auth routing for a job issued on behalf of `credentials`
struct Route {
    auth: JobAuth,
    from_uuid: String,
}

/// Per-connection client of the device cloud.
///
/// Turns domain operations into job envelopes, bounds every request with a
/// deadline and normalizes failures into [`GatewayError`]s.
pub struct BusGateway {
    jobs: Arc<dyn JobTransport>,
    messages: Arc<dyn MessageTransport>,
    aliases: AliasResolver,
    request_timeout: Duration,
    messages_namespace: String,
    /// Reader tasks for subscribed channels
    listeners: Mutex<Vec<JoinHandle<()>>>,
}

impl BusGateway {
    pub fn new(
        jobs: Arc<dyn JobTransport>,
        messages: Arc<dyn MessageTransport>,
        aliases: AliasResolver,
        config: &BusConfig,
    ) -> Self {
        Self {
            jobs,
            messages,
            aliases,
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            messages_namespace: config.messages_namespace.clone(),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn aliases(&self) -> &AliasResolver {
        &self.aliases
    }

    pub async fn authenticate(&self, credentials: &Credentials) -> Result<()> {
        let request = JobRequest::new(JobType::Authenticate).auth(credentials.into());
        self.send(request).await?;
        Ok(())
    }

    /// Create a device; the reply carries its uuid and token
    pub async fn register_device(&self, device: &Device) -> Result<Device> {
        let request = JobRequest::new(JobType::RegisterDevice).data(serde_json::to_value(device)?);
        let response = self.send(request).await?;
        Self::parse(&response)
    }

    /// Apply `patch` (a `$set` document) to the target device
    pub async fn update_device(
        &self,
        credentials: &Credentials,
        target_id: &str,
        patch: Value,
    ) -> Result<()> {
        let uuid = self.aliases.resolve(target_id).await?;
        let mut request = JobRequest::new(JobType::FindAndUpdateDevice)
            .to_uuid(uuid)
            .data(json!({ "$set": patch }));
        if let Some(route) = self.router_route(credentials).await? {
            request = request.auth(route.auth).from_uuid(route.from_uuid);
        } else {
            request = request.auth(credentials.into());
        }
        self.send(request).await?;
        Ok(())
    }

    pub async fn get_device(&self, credentials: &Credentials, target_id: &str) -> Result<Device> {
        let uuid = self.aliases.resolve(target_id).await?;
        let request = JobRequest::new(JobType::GetDevice)
            .auth(credentials.into())
            .to_uuid(uuid)
            .from_uuid(credentials.uuid.clone());
        let response = self.send(request).await?;
        Self::parse(&response)
    }

    /// Raw device search; callers apply their own visibility rules
    pub async fn get_devices(&self, credentials: &Credentials, query: Value) -> Result<Vec<Device>> {
        let route = self.route(credentials).await?;
        let request = JobRequest::new(JobType::SearchDevices)
            .auth(route.auth)
            .from_uuid(route.from_uuid)
            .data(query);
        let response = self.send(request).await?;
        Self::parse(&response)
    }

    /// Unregister the target device, returning its resolved uuid
    pub async fn unregister(&self, credentials: &Credentials, target_id: &str) -> Result<String> {
        let uuid = self.aliases.resolve(target_id).await?;
        let request = JobRequest::new(JobType::UnregisterDevice)
            .auth(credentials.into())
            .to_uuid(uuid.clone())
            .data(json!({ "uuid": uuid }));
        self.send(request).await?;
        Ok(uuid)
    }

    pub async fn create_session_token(
        &self,
        credentials: &Credentials,
        target_id: &str,
    ) -> Result<String> {
        let uuid = self.aliases.resolve(target_id).await?;
        let request = JobRequest::new(JobType::CreateSessionToken)
            .auth(credentials.into())
            .to_uuid(uuid);
        let response = self.send(request).await?;
        let reply: SessionTokenReply = Self::parse(&response)?;
        Ok(reply.token)
    }

    pub async fn revoke_session_token(
        &self,
        credentials: &Credentials,
        target_id: &str,
        token: &str,
    ) -> Result<()> {
        let uuid = self.aliases.resolve(target_id).await?;
        let request = JobRequest::new(JobType::RevokeSessionToken)
            .auth(credentials.into())
            .to_uuid(uuid)
            .data(json!({ "token": token }));
        self.send(request).await?;
        Ok(())
    }

    /// Send `topic`/`payload` to one device
    pub async fn send_message_to_device(
        &self,
        credentials: &Credentials,
        target_id: &str,
        topic: &str,
        payload: Value,
    ) -> Result<()> {
        let uuid = self.aliases.resolve(target_id).await?;
        self.send_message(credentials, vec![uuid], topic, payload).await
    }

    /// Send `topic`/`payload` to every subscriber of the caller's broadcasts
    pub async fn broadcast_message(
        &self,
        credentials: &Credentials,
        topic: &str,
        payload: Value,
    ) -> Result<()> {
        self.send_message(credentials, vec!["*".to_string()], topic, payload)
            .await
    }

    async fn send_message(
        &self,
        credentials: &Credentials,
        devices: Vec<String>,
        topic: &str,
        payload: Value,
    ) -> Result<()> {
        let route = self.route(credentials).await?;
        let request = JobRequest::new(JobType::SendMessage)
            .auth(route.auth)
            .from_uuid(route.from_uuid)
            .data(json!({
                "devices": devices,
                "topic": topic,
                "payload": payload,
            }));
        self.send(request).await?;
        Ok(())
    }

    pub async fn create_subscription(
        &self,
        credentials: &Credentials,
        subscription: &Subscription,
    ) -> Result<()> {
        let request = JobRequest::new(JobType::CreateSubscription)
            .auth(credentials.into())
            .to_uuid(subscription.subscriber_uuid.clone())
            .data(serde_json::to_value(subscription)?);
        self.send(request).await?;
        Ok(())
    }

    /// Listen on `uuid`'s channel for `event_type`.
    ///
    /// Each message is decoded and its route resolved to aliases before
    /// `listener` runs. Reading happens on its own task, so request RPCs are
    /// never blocked by channel traffic.
    pub async fn on<F>(&self, uuid: &str, event_type: &str, listener: F) -> Result<()>
    where
        F: Fn(BusEvent) + Send + Sync + 'static,
    {
        let subject = format!("{}.{}.{}", self.messages_namespace, uuid, event_type);
        let mut stream = self
            .messages
            .subscribe(subject.clone())
            .await
            .map_err(|e| {
                warn!(subject = %subject, error = %e, "Failed to subscribe to bus channel");
                GatewayError::bad_gateway()
            })?;

        debug!(subject = %subject, "Subscribed to bus channel");

        let aliases = self.aliases.clone();
        let event_type = event_type.to_string();
        let handle = tokio::spawn(async move {
            while let Some(payload) = stream.next().await {
                let mut event = message::decode(&event_type, &payload);
                message::resolve_route(&aliases, &mut event.route).await;
                listener(event);
            }
            debug!(subject = %subject, "Bus channel ended");
        });

        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push(handle);
        }
        Ok(())
    }

    /// Replace the current channel readers with one on `uuid`'s channel.
    ///
    /// The old readers keep running until the new subscription is live, so a
    /// failed subscribe leaves the previous channel in place.
    pub async fn switch_to<F>(&self, uuid: &str, event_type: &str, listener: F) -> Result<()>
    where
        F: Fn(BusEvent) + Send + Sync + 'static,
    {
        let previous = match self.listeners.lock() {
            Ok(mut listeners) => listeners.drain(..).collect::<Vec<_>>(),
            Err(_) => Vec::new(),
        };

        if let Err(e) = self.on(uuid, event_type, listener).await {
            if let Ok(mut listeners) = self.listeners.lock() {
                listeners.extend(previous);
            }
            return Err(e);
        }

        for handle in previous {
            handle.abort();
        }
        Ok(())
    }

    /// Stop every channel reader. In-flight requests are left alone.
    pub fn close(&self) {
        if let Ok(mut listeners) = self.listeners.lock() {
            for handle in listeners.drain(..) {
                handle.abort();
            }
        }
    }

    /// Apps act as their router; everyone else acts as themselves
    async fn route(&self, credentials: &Credentials) -> Result<Route> {
        Ok(match self.router_route(credentials).await? {
            Some(route) => route,
            None => Route {
                auth: credentials.into(),
                from_uuid: credentials.uuid.clone(),
            },
        })
    }

    async fn router_route(&self, credentials: &Credentials) -> Result<Option<Route>> {
        let caller = self.get_device(credentials, &credentials.uuid).await?;
        let router = match caller.device_type {
            Some(DeviceType::App) => caller.knot.router,
            Some(DeviceType::User)
            | Some(DeviceType::Gateway)
            | Some(DeviceType::Thing)
            | Some(DeviceType::Router)
            | None => None,
        };

        Ok(router.map(|router| {
            let mut auth = JobAuth::from(credentials);
            auth.as_uuid = Some(router.clone());
            Route {
                auth,
                from_uuid: router,
            }
        }))
    }

    /// Send a job and check its status against the job type's success code
    async fn send(&self, request: JobRequest) -> Result<JobResponse> {
        let job_type = request.job_type();
        debug!(job_type = ?job_type, to_uuid = ?request.metadata.to_uuid, "Sending bus job");

        let response = match tokio::time::timeout(self.request_timeout, self.jobs.request(request)).await
        {
            Err(_) | Ok(Err(TransportError::TimedOut)) => {
                warn!(job_type = ?job_type, "Bus job timed out");
                return Err(GatewayError::gateway_timeout());
            }
            Ok(Err(e)) => {
                warn!(job_type = ?job_type, error = %e, "Bus job failed in transport");
                return Err(GatewayError::bad_gateway());
            }
            Ok(Ok(response)) => response,
        };

        if response.metadata.code != job_type.expected_code() {
            debug!(
                job_type = ?job_type,
                code = response.metadata.code,
                status = %response.metadata.status,
                "Bus job rejected"
            );
            return Err(GatewayError::from_status(
                response.metadata.code,
                response.metadata.status,
            ));
        }

        Ok(response)
    }

    fn parse<T: DeserializeOwned>(response: &JobResponse) -> Result<T> {
        let raw = response.raw_data.as_deref().ok_or_else(|| {
            warn!("Bus reply is missing rawData");
            GatewayError::bad_gateway()
        })?;
        serde_json::from_str(raw).map_err(|e| {
            warn!(error = %e, "Bus reply rawData is not valid");
            GatewayError::bad_gateway()
        })
    }
}

impl Drop for BusGateway {
    fn drop(&mut self) {
        self.close();
    }
}
