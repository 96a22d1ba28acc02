use crate::session::Credentials;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Job types understood by the device cloud
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobType {
    Authenticate,
    RegisterDevice,
    FindAndUpdateDevice,
    GetDevice,
    SearchDevices,
    UnregisterDevice,
    CreateSessionToken,
    RevokeSessionToken,
    SendMessage,
    CreateSubscription,
}

impl JobType {
    /// Status code the cloud answers with when the job succeeds
    pub fn expected_code(self) -> u16 {
        match self {
            JobType::Authenticate => 204,
            JobType::RegisterDevice => 201,
            JobType::FindAndUpdateDevice => 200,
            JobType::GetDevice => 200,
            JobType::SearchDevices => 200,
            JobType::UnregisterDevice => 204,
            JobType::CreateSessionToken => 201,
            JobType::RevokeSessionToken => 204,
            JobType::SendMessage => 204,
            JobType::CreateSubscription => 201,
        }
    }
}

/// Job authentication block: `{uuid, token[, as]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobAuth {
    pub uuid: String,
    pub token: String,
    /// Device the caller acts on behalf of
    #[serde(rename = "as", default, skip_serializing_if = "Option::is_none")]
    pub as_uuid: Option<String>,
}

impl From<&Credentials> for JobAuth {
    fn from(credentials: &Credentials) -> Self {
        Self {
            uuid: credentials.uuid.clone(),
            token: credentials.token.clone(),
            as_uuid: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMetadata {
    pub job_type: JobType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<JobAuth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_uuid: Option<String>,
}

/// Request envelope: `{metadata:{jobType, auth, toUuid?, fromUuid?}, data?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub metadata: JobMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JobRequest {
    pub fn new(job_type: JobType) -> Self {
        Self {
            metadata: JobMetadata {
                job_type,
                auth: None,
                to_uuid: None,
                from_uuid: None,
            },
            data: None,
        }
    }

    pub fn auth(mut self, auth: JobAuth) -> Self {
        self.metadata.auth = Some(auth);
        self
    }

    pub fn to_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.metadata.to_uuid = Some(uuid.into());
        self
    }

    pub fn from_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.metadata.from_uuid = Some(uuid.into());
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn job_type(&self) -> JobType {
        self.metadata.job_type
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub code: u16,
    #[serde(default)]
    pub status: String,
}

/// Response envelope: `{metadata:{code, status}, rawData?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResponse {
    pub metadata: ResponseMetadata,
    #[serde(rename = "rawData", default, skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<String>,
}

impl JobResponse {
    pub fn new(code: u16, status: impl Into<String>, raw_data: Option<String>) -> Self {
        Self {
            metadata: ResponseMetadata {
                code,
                status: status.into(),
            },
            raw_data,
        }
    }
}

/// Event types a subscription edge can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "broadcast.sent")]
    BroadcastSent,
    #[serde(rename = "broadcast.received")]
    BroadcastReceived,
    #[serde(rename = "configure.sent")]
    ConfigureSent,
    #[serde(rename = "configure.received")]
    ConfigureReceived,
    #[serde(rename = "message.sent")]
    MessageSent,
    #[serde(rename = "message.received")]
    MessageReceived,
    #[serde(rename = "unregister.sent")]
    UnregisterSent,
    #[serde(rename = "unregister.received")]
    UnregisterReceived,
}

/// Edge letting `subscriber_uuid` receive `event_type` events emitted by `emitter_uuid`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub subscriber_uuid: String,
    pub emitter_uuid: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
}

impl Subscription {
    pub fn new(
        subscriber_uuid: impl Into<String>,
        emitter_uuid: impl Into<String>,
        event_type: EventType,
    ) -> Self {
        Self {
            subscriber_uuid: subscriber_uuid.into(),
            emitter_uuid: emitter_uuid.into(),
            event_type,
        }
    }
}
