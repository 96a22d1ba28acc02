//! Client-facing device operations, one per inbound event type.
//!
//! Every operation except [`DeviceService::authenticate`] requires the
//! connection to hold a session.

pub mod requests;

pub use requests::{
    DeviceIdRequest, DevicesRequest, GetDataRequest, IdentityRequest, RevokeTokenRequest,
    SchemaRequest, SetDataRequest, UpdateMetadataRequest,
};

use crate::alias::AliasResolver;
use crate::bus::BusGateway;
use crate::device::{listing, Device, DeviceListing, DeviceProvisioner, DeviceType, RegisterRequest};
use crate::error::{GatewayError, Result};
use crate::schema::{self, SensorSchemaEntry, SensorValue};
use crate::session::{Credentials, Session, SessionStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Device operations on behalf of one connection's session
pub struct DeviceService {
    sessions: Arc<SessionStore>,
    bus: Arc<BusGateway>,
    provisioner: DeviceProvisioner,
}

impl DeviceService {
    pub fn new(sessions: Arc<SessionStore>, bus: Arc<BusGateway>) -> Self {
        Self {
            provisioner: DeviceProvisioner::new(bus.clone()),
            sessions,
            bus,
        }
    }

    pub fn bus(&self) -> &Arc<BusGateway> {
        &self.bus
    }

    fn credentials(&self, connection_id: &str) -> Result<Credentials> {
        self.sessions
            .get(connection_id)
            .map(|session| session.credentials)
            .ok_or_else(|| GatewayError::unauthorized("Unauthorized"))
    }

    async fn caller(&self, credentials: &Credentials) -> Result<Device> {
        self.bus.get_device(credentials, &credentials.uuid).await
    }

    async fn require_app(&self, credentials: &Credentials, event: &str) -> Result<Device> {
        let caller = self.caller(credentials).await?;
        match caller.device_type {
            Some(DeviceType::App) => Ok(caller),
            Some(DeviceType::User)
            | Some(DeviceType::Gateway)
            | Some(DeviceType::Thing)
            | Some(DeviceType::Router)
            | None => Err(GatewayError::bad_request(format!(
                "Only apps can send '{}'",
                event
            ))),
        }
    }

    async fn require_thing(&self, credentials: &Credentials, message: &str) -> Result<Device> {
        let caller = self.caller(credentials).await?;
        match caller.device_type {
            Some(DeviceType::Thing) => Ok(caller),
            Some(DeviceType::User)
            | Some(DeviceType::Gateway)
            | Some(DeviceType::App)
            | Some(DeviceType::Router)
            | None => Err(GatewayError::bad_request(message)),
        }
    }

    /// Stored schema of a thing, 403 when it has none
    fn schema_of(thing: &Device) -> Result<(&[SensorSchemaEntry], String)> {
        let thing_id = thing
            .knot
            .id
            .clone()
            .unwrap_or_else(|| thing.uuid().to_string());
        match thing.schema.as_deref() {
            Some(schema) => Ok((schema, thing_id)),
            None => Err(GatewayError::forbidden(format!(
                "The thing {} has no schema for sensors",
                thing_id
            ))),
        }
    }

    /// Authenticate the connection, replacing any credentials it held
    pub async fn authenticate(
        &self,
        connection_id: &str,
        request: &IdentityRequest,
    ) -> Result<Credentials> {
        let id = request
            .device_id()
            .ok_or_else(|| GatewayError::bad_request("Device id is required"))?;
        let uuid = self.bus.aliases().resolve(id).await?;
        let credentials = Credentials::new(uuid, request.token.clone());

        self.bus.authenticate(&credentials).await?;
        self.sessions
            .save(connection_id, Session::new(connection_id, credentials.clone()));

        info!(connection_id = %connection_id, uuid = %credentials.uuid, "Session established");
        Ok(credentials)
    }

    pub async fn register(&self, connection_id: &str, request: &RegisterRequest) -> Result<Device> {
        let credentials = self.credentials(connection_id)?;
        self.provisioner.register(&credentials, request).await
    }

    pub async fn update_metadata(
        &self,
        connection_id: &str,
        request: &UpdateMetadataRequest,
    ) -> Result<()> {
        let credentials = self.credentials(connection_id)?;
        self.bus
            .update_device(
                &credentials,
                &request.id,
                json!({ "metadata": request.metadata }),
            )
            .await
    }

    /// Devices visible to the caller; filters on hidden fields match nothing
    pub async fn list_devices(
        &self,
        connection_id: &str,
        request: &DevicesRequest,
    ) -> Result<Vec<DeviceListing>> {
        let credentials = self.credentials(connection_id)?;
        let query = Value::Object(request.query.clone().unwrap_or_default());

        if listing::queries_hidden_field(&query) {
            debug!(connection_id = %connection_id, "Device query touches hidden fields");
            return Ok(Vec::new());
        }

        let devices = self.bus.get_devices(&credentials, query).await?;
        Ok(listing::visible_listing(&devices, &credentials.uuid))
    }

    pub async fn unregister(&self, connection_id: &str, request: &DeviceIdRequest) -> Result<()> {
        let credentials = self.credentials(connection_id)?;
        let uuid = self.bus.unregister(&credentials, &request.id).await?;
        info!(uuid = %uuid, "Device unregistered");

        // The device is gone even if its alias outlives it
        if let Some(dropped) = self.sessions.remove_by_uuid(&uuid) {
            debug!(connection_id = %dropped, uuid = %uuid, "Session dropped after unregister");
        }

        if AliasResolver::is_alias(&request.id) {
            self.bus.aliases().remove(&credentials, &request.id).await?;
        }
        Ok(())
    }

    pub async fn update_schema(&self, connection_id: &str, request: &SchemaRequest) -> Result<()> {
        let credentials = self.credentials(connection_id)?;
        self.require_thing(&credentials, "Only things can update schema")
            .await?;

        let entries = schema::validate_schema(&request.schema)?;
        self.bus
            .update_device(
                &credentials,
                &credentials.uuid,
                json!({ "schema": entries }),
            )
            .await
    }

    pub async fn create_session_token(
        &self,
        connection_id: &str,
        request: &DeviceIdRequest,
    ) -> Result<String> {
        let credentials = self.credentials(connection_id)?;
        self.bus
            .create_session_token(&credentials, &request.id)
            .await
    }

    pub async fn revoke_session_token(
        &self,
        connection_id: &str,
        request: &RevokeTokenRequest,
    ) -> Result<()> {
        let credentials = self.credentials(connection_id)?;
        self.bus
            .revoke_session_token(&credentials, &request.id, &request.token)
            .await
    }

    pub async fn activate(&self, connection_id: &str, request: &DeviceIdRequest) -> Result<()> {
        let credentials = self.credentials(connection_id)?;
        self.bus
            .update_device(&credentials, &request.id, json!({ "knot.active": true }))
            .await
    }

    /// Broadcast a reading from the calling thing
    pub async fn publish_data(&self, connection_id: &str, reading: &SensorValue) -> Result<()> {
        let credentials = self.credentials(connection_id)?;
        let thing = self
            .require_thing(&credentials, "Only things can publish data")
            .await?;

        let (entries, thing_id) = Self::schema_of(&thing)?;
        schema::validate_value(entries, &thing_id, reading)?;

        self.bus
            .broadcast_message(&credentials, "data", serde_json::to_value(reading)?)
            .await
    }

    /// Ask a thing to report the given sensors
    pub async fn get_data(&self, connection_id: &str, request: &GetDataRequest) -> Result<()> {
        let credentials = self.credentials(connection_id)?;
        self.require_app(&credentials, "getData").await?;

        self.bus
            .send_message_to_device(
                &credentials,
                &request.id,
                "command",
                json!({ "getData": request.sensor_ids }),
            )
            .await
    }

    /// Write sensor values to a thing; every value must match its schema
    pub async fn set_data(&self, connection_id: &str, request: &SetDataRequest) -> Result<()> {
        let credentials = self.credentials(connection_id)?;
        self.require_app(&credentials, "setData").await?;

        let thing = self.bus.get_device(&credentials, &request.id).await?;
        let (entries, thing_id) = Self::schema_of(&thing)?;
        for reading in &request.data {
            schema::validate_value(entries, &thing_id, reading)?;
        }

        let data = serde_json::to_value(&request.data)?;
        self.bus
            .update_device(&credentials, &request.id, json!({ "setData": data }))
            .await?;
        self.bus
            .send_message_to_device(&credentials, &request.id, "setData", json!({ "data": data }))
            .await
    }
}
