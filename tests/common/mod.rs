// Shared fakes for integration tests: an in-memory device cloud behind the
// job transport, a channel-backed pub/sub feed and an in-memory alias directory.
#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use knot_gateway::alias::{AliasDirectory, AliasResolver};
use knot_gateway::bus::{
    BusConfig, BusGateway, JobRequest, JobResponse, JobTransport, JobType, MessageTransport,
    Subscription, TransportError,
};
use knot_gateway::error::{GatewayError, Result};
use knot_gateway::session::Credentials;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Barrier};
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

// ── Device cloud ─────────────────────────────────────────────────────────────

struct ReadGate {
    uuid: String,
    barrier: Arc<Barrier>,
    remaining: usize,
}

/// In-memory device cloud answering job envelopes
#[derive(Default)]
pub struct FakeCloud {
    devices: Mutex<HashMap<String, Value>>,
    session_tokens: Mutex<Vec<(String, String)>>,
    subscriptions: Mutex<Vec<Subscription>>,
    jobs: Mutex<Vec<JobRequest>>,
    gate: Mutex<Option<ReadGate>>,
    next_response: Mutex<Option<JobResponse>>,
}

fn set_path(doc: &mut Value, path: &str, value: Value) {
    let mut current = doc;
    let mut parts = path.split('.').peekable();
    while let Some(part) = parts.next() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let map = current.as_object_mut().expect("object");
        if parts.peek().is_none() {
            map.insert(part.to_string(), value);
            return;
        }
        current = map
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

fn get_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |current, part| current.get(part))
}

fn reply(code: u16, status: &str, raw: Option<Value>) -> JobResponse {
    JobResponse::new(code, status, raw.map(|v| v.to_string()))
}

impl FakeCloud {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Store a device document as-is; it must carry `uuid` and `token`
    pub fn add_device(&self, doc: Value) -> Credentials {
        let uuid = doc["uuid"].as_str().expect("uuid").to_string();
        let token = doc["token"].as_str().expect("token").to_string();
        self.devices.lock().unwrap().insert(uuid.clone(), doc);
        Credentials::new(uuid, token)
    }

    /// A router plus a user owning it. Returns (user, router uuid).
    pub fn seed_user(&self) -> (Credentials, String) {
        let router = self.add_device(json!({
            "uuid": Uuid::new_v4().to_string(),
            "token": "router-token",
            "type": "knot:router",
            "meshblu": {"whitelists": {}}
        }));
        let user = self.add_device(json!({
            "uuid": Uuid::new_v4().to_string(),
            "token": "user-token",
            "type": "knot:user",
            "metadata": {"name": "owner"},
            "knot": {"router": router.uuid},
            "meshblu": {"whitelists": {"discover": {"view": [{"uuid": router.uuid}]}}}
        }));
        (user, router.uuid)
    }

    /// A gateway owned by `user`, sharing its router
    pub fn seed_gateway(&self, user: &Credentials, router: &str) -> Credentials {
        self.add_device(json!({
            "uuid": Uuid::new_v4().to_string(),
            "token": "gateway-token",
            "type": "knot:gateway",
            "knot": {"router": router, "user": user.uuid, "active": true},
            "meshblu": {"whitelists": {"discover": {"view": [{"uuid": user.uuid}, {"uuid": router}]}}}
        }))
    }

    pub fn device(&self, uuid: &str) -> Option<Value> {
        self.devices.lock().unwrap().get(uuid).cloned()
    }

    pub fn device_count(&self) -> usize {
        self.devices.lock().unwrap().len()
    }

    /// UUIDs granted on `uuid`'s whitelist list, e.g. `broadcast.received`
    pub fn whitelist(&self, uuid: &str, capability: &str) -> Vec<String> {
        let device = self.device(uuid).unwrap_or(Value::Null);
        get_path(&device, &format!("meshblu.whitelists.{}", capability))
            .and_then(Value::as_array)
            .map(|grants| {
                grants
                    .iter()
                    .filter_map(|g| g["uuid"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.subscriptions.lock().unwrap().clone()
    }

    pub fn jobs(&self) -> Vec<JobRequest> {
        self.jobs.lock().unwrap().clone()
    }

    pub fn jobs_of(&self, job_type: JobType) -> Vec<JobRequest> {
        self.jobs()
            .into_iter()
            .filter(|job| job.job_type() == job_type)
            .collect()
    }

    /// Hold the next `readers` GetDevice calls for `uuid` until all of them
    /// have read
    pub fn gate_reads(&self, uuid: &str, readers: usize) {
        *self.gate.lock().unwrap() = Some(ReadGate {
            uuid: uuid.to_string(),
            barrier: Arc::new(Barrier::new(readers)),
            remaining: readers,
        });
    }

    /// Answer the next job with `response` regardless of its type
    pub fn respond_next_with(&self, code: u16, status: &str) {
        *self.next_response.lock().unwrap() = Some(reply(code, status, None));
    }

    fn authorized(&self, request: &JobRequest) -> bool {
        let Some(auth) = &request.metadata.auth else {
            return false;
        };
        let token_matches = self
            .devices
            .lock()
            .unwrap()
            .get(&auth.uuid)
            .and_then(|d| d["token"].as_str().map(|t| t == auth.token))
            .unwrap_or(false);
        token_matches
            || self
                .session_tokens
                .lock()
                .unwrap()
                .iter()
                .any(|(uuid, token)| *uuid == auth.uuid && *token == auth.token)
    }

    fn read_gate(&self, uuid: &str) -> Option<Arc<Barrier>> {
        let mut gate = self.gate.lock().unwrap();
        let barrier = match gate.as_mut() {
            Some(g) if g.uuid == uuid && g.remaining > 0 => {
                g.remaining -= 1;
                Some(g.barrier.clone())
            }
            _ => None,
        };
        if matches!(gate.as_ref(), Some(g) if g.remaining == 0) {
            *gate = None;
        }
        barrier
    }

    fn target(&self, request: &JobRequest) -> Option<Value> {
        request
            .metadata
            .to_uuid
            .as_deref()
            .and_then(|uuid| self.device(uuid))
    }

    fn handle(&self, request: &JobRequest) -> JobResponse {
        if request.job_type() != JobType::RegisterDevice && !self.authorized(request) {
            return reply(401, "Unauthorized", None);
        }

        let data = request.data.clone().unwrap_or(Value::Null);
        match request.job_type() {
            JobType::Authenticate => reply(204, "No Content", None),
            JobType::RegisterDevice => {
                let mut doc = data;
                let uuid = Uuid::new_v4().to_string();
                doc["uuid"] = json!(uuid);
                doc["token"] = json!(format!("token-{}", &uuid[..8]));
                self.devices.lock().unwrap().insert(uuid, doc.clone());
                reply(201, "Created", Some(doc))
            }
            JobType::FindAndUpdateDevice => {
                let Some(uuid) = request.metadata.to_uuid.clone() else {
                    return reply(422, "Unprocessable Entity", None);
                };
                let mut devices = self.devices.lock().unwrap();
                let Some(doc) = devices.get_mut(&uuid) else {
                    return reply(404, "Not Found", None);
                };
                if let Some(set) = data.get("$set").and_then(Value::as_object) {
                    for (path, value) in set {
                        set_path(doc, path, value.clone());
                    }
                }
                reply(200, "OK", Some(doc.clone()))
            }
            JobType::GetDevice => match self.target(request) {
                Some(doc) => reply(200, "OK", Some(doc)),
                None => reply(404, "Not Found", None),
            },
            JobType::SearchDevices => {
                let query = data.as_object().cloned().unwrap_or_default();
                let found: Vec<Value> = self
                    .devices
                    .lock()
                    .unwrap()
                    .values()
                    .filter(|doc| {
                        query
                            .iter()
                            .all(|(path, expected)| get_path(doc, path) == Some(expected))
                    })
                    .cloned()
                    .collect();
                reply(200, "OK", Some(Value::Array(found)))
            }
            JobType::UnregisterDevice => {
                let removed = request
                    .metadata
                    .to_uuid
                    .as_deref()
                    .and_then(|uuid| self.devices.lock().unwrap().remove(uuid));
                match removed {
                    Some(_) => reply(204, "No Content", None),
                    None => reply(404, "Not Found", None),
                }
            }
            JobType::CreateSessionToken => {
                let uuid = request.metadata.to_uuid.clone().unwrap_or_default();
                let token = format!("session-{}", Uuid::new_v4());
                self.session_tokens
                    .lock()
                    .unwrap()
                    .push((uuid, token.clone()));
                reply(201, "Created", Some(json!({ "token": token })))
            }
            JobType::RevokeSessionToken => {
                let token = data["token"].as_str().unwrap_or_default().to_string();
                self.session_tokens
                    .lock()
                    .unwrap()
                    .retain(|(_, t)| *t != token);
                reply(204, "No Content", None)
            }
            JobType::SendMessage => reply(204, "No Content", None),
            JobType::CreateSubscription => match serde_json::from_value(data) {
                Ok(subscription) => {
                    self.subscriptions.lock().unwrap().push(subscription);
                    reply(201, "Created", None)
                }
                Err(_) => reply(422, "Unprocessable Entity", None),
            },
        }
    }
}

#[async_trait]
impl JobTransport for FakeCloud {
    async fn request(&self, request: JobRequest) -> std::result::Result<JobResponse, TransportError> {
        self.jobs.lock().unwrap().push(request.clone());

        let overridden = self.next_response.lock().unwrap().take();
        if let Some(response) = overridden {
            return Ok(response);
        }

        if request.job_type() == JobType::GetDevice {
            let gate = request
                .metadata
                .to_uuid
                .as_deref()
                .and_then(|uuid| self.read_gate(uuid));
            if let Some(barrier) = gate {
                let response = self.handle(&request);
                barrier.wait().await;
                return Ok(response);
            }
        }

        Ok(self.handle(&request))
    }
}

// ── Failing transports ───────────────────────────────────────────────────────

/// Never answers within any sane deadline
pub struct SlowTransport;

#[async_trait]
impl JobTransport for SlowTransport {
    async fn request(&self, _request: JobRequest) -> std::result::Result<JobResponse, TransportError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Err(TransportError::TimedOut)
    }
}

/// Fails below the job protocol with the given error
pub struct BrokenTransport(pub TransportError);

#[async_trait]
impl JobTransport for BrokenTransport {
    async fn request(&self, _request: JobRequest) -> std::result::Result<JobResponse, TransportError> {
        Err(self.0.clone())
    }
}

// ── Pub/sub ──────────────────────────────────────────────────────────────────

/// Channel-backed message transport; tests publish frames by subject
#[derive(Default)]
pub struct FakeMessages {
    channels: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<Vec<u8>>>>>,
    fail_subscribes: AtomicBool,
}

impl FakeMessages {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Deliver `payload` to every live subscriber of `subject`; returns how many got it
    pub fn publish(&self, subject: &str, payload: Value) -> usize {
        let bytes = payload.to_string().into_bytes();
        let mut channels = self.channels.lock().unwrap();
        let Some(senders) = channels.get_mut(subject) else {
            return 0;
        };
        senders.retain(|tx| tx.send(bytes.clone()).is_ok());
        senders.len()
    }

    pub fn subjects(&self) -> Vec<String> {
        self.channels.lock().unwrap().keys().cloned().collect()
    }

    /// Make every later subscribe fail as if the bus were down
    pub fn fail_subscribes(&self) {
        self.fail_subscribes.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessageTransport for FakeMessages {
    async fn subscribe(
        &self,
        subject: String,
    ) -> std::result::Result<BoxStream<'static, Vec<u8>>, TransportError> {
        if self.fail_subscribes.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("connection closed".into()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.channels
            .lock()
            .unwrap()
            .entry(subject)
            .or_default()
            .push(tx);
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }
}

// ── Aliases ──────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryAliasDirectory {
    aliases: Mutex<Vec<(String, String)>>,
    fail_removes: AtomicBool,
}

impl InMemoryAliasDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, name: &str, uuid: &str) {
        self.aliases
            .lock()
            .unwrap()
            .push((name.to_string(), uuid.to_string()));
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.aliases
            .lock()
            .unwrap()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, uuid)| uuid.clone())
    }

    /// Make every later remove fail with 502
    pub fn fail_removes(&self) {
        self.fail_removes.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AliasDirectory for InMemoryAliasDirectory {
    async fn lookup(&self, name: &str) -> Result<Option<String>> {
        Ok(self.get(name))
    }

    async fn reverse_lookup(&self, uuid: &str) -> Result<Vec<String>> {
        Ok(self
            .aliases
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, u)| u == uuid)
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn create(&self, _credentials: &Credentials, name: &str, uuid: &str) -> Result<()> {
        self.insert(name, uuid);
        Ok(())
    }

    async fn remove(&self, _credentials: &Credentials, name: &str) -> Result<()> {
        if self.fail_removes.load(Ordering::SeqCst) {
            return Err(GatewayError::bad_gateway());
        }
        let mut aliases = self.aliases.lock().unwrap();
        let before = aliases.len();
        aliases.retain(|(n, _)| n != name);
        if aliases.len() == before {
            return Err(GatewayError::from_status(404, "Not Found"));
        }
        Ok(())
    }
}

// ── Wiring ───────────────────────────────────────────────────────────────────

pub struct Harness {
    pub cloud: Arc<FakeCloud>,
    pub messages: Arc<FakeMessages>,
    pub aliases: Arc<InMemoryAliasDirectory>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            cloud: FakeCloud::new(),
            messages: FakeMessages::new(),
            aliases: InMemoryAliasDirectory::new(),
        }
    }

    pub fn resolver(&self) -> AliasResolver {
        AliasResolver::new(self.aliases.clone())
    }

    pub fn bus(&self) -> Arc<BusGateway> {
        Arc::new(BusGateway::new(
            self.cloud.clone(),
            self.messages.clone(),
            self.resolver(),
            &test_bus_config(),
        ))
    }
}

pub fn test_bus_config() -> BusConfig {
    BusConfig {
        request_timeout_ms: 1000,
        ..BusConfig::default()
    }
}
