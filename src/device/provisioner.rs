use super::listing::DeviceListing;
use super::{Capability, Device, DeviceType, Grant, Whitelists};
use crate::bus::{BusGateway, EventType, Subscription};
use crate::error::{GatewayError, Result};
use crate::session::Credentials;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

const MESHBLU_VERSION: &str = "2.0.0";

/// `register` request body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(rename = "type", default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Roles a client may provision
#[derive(Debug, Clone, PartialEq, Eq)]
enum Role {
    App,
    Gateway,
    Thing { id: String },
}

impl Role {
    fn device_type(&self) -> DeviceType {
        match self {
            Role::App => DeviceType::App,
            Role::Gateway => DeviceType::Gateway,
            Role::Thing { .. } => DeviceType::Thing,
        }
    }
}

fn is_thing_id(id: &str) -> bool {
    id.len() == 16 && id.chars().all(|c| c.is_ascii_hexdigit())
}

impl RegisterRequest {
    fn role(&self) -> Result<Role> {
        let device_type = self
            .device_type
            .as_deref()
            .ok_or_else(|| GatewayError::bad_request("Type property is required"))?;

        match device_type.parse::<DeviceType>() {
            Ok(DeviceType::App) => Ok(Role::App),
            Ok(DeviceType::Gateway) => Ok(Role::Gateway),
            Ok(DeviceType::Thing) => match self.id.as_deref() {
                Some(id) if is_thing_id(id) => Ok(Role::Thing { id: id.to_string() }),
                _ => Err(GatewayError::bad_request(
                    "Thing id must be 16 hexadecimal characters",
                )),
            },
            Ok(DeviceType::User) | Ok(DeviceType::Router) | Err(_) => Err(
                GatewayError::bad_request(format!("Unsupported device type '{}'", device_type)),
            ),
        }
    }
}

/// Creates devices and wires their ACL/subscription edges.
///
/// Every step is a sequential RPC; whitelist grants read the whole target
/// document and write it back, so concurrent grants to the same target can
/// overwrite each other.
pub struct DeviceProvisioner {
    bus: Arc<BusGateway>,
}

impl DeviceProvisioner {
    pub fn new(bus: Arc<BusGateway>) -> Self {
        Self { bus }
    }

    /// Register a device owned by the caller and return it with its token
    pub async fn register(
        &self,
        credentials: &Credentials,
        request: &RegisterRequest,
    ) -> Result<Device> {
        let role = request.role()?;
        let owner = self.bus.get_device(credentials, &credentials.uuid).await?;
        Self::authorize(&role, &owner)?;
        let router = owner
            .knot
            .router
            .clone()
            .ok_or_else(|| GatewayError::bad_request("Device owner has no router"))?;

        let device = match &role {
            Role::App | Role::Gateway => {
                self.app_or_gateway(&role, &owner, &router, request.name.clone())?
            }
            Role::Thing { id } => {
                self.thing(credentials, &owner, &router, id, request.name.clone())
                    .await?
            }
        };

        let registered = self.bus.register_device(&device).await?;
        let device_credentials = registered
            .credentials()
            .ok_or_else(GatewayError::bad_gateway)?;

        info!(
            uuid = %device_credentials.uuid,
            device_type = %role.device_type(),
            "Device registered"
        );

        if let Role::Thing { id } = &role {
            self.bus
                .aliases()
                .create(credentials, id, &device_credentials.uuid)
                .await?;
        }

        self.wire(&role, credentials, &device_credentials, &router)
            .await?;

        let mut announced = registered.clone();
        announced.device_type.get_or_insert(role.device_type());
        if let Some(listing) = DeviceListing::from_device(&announced) {
            self.bus
                .broadcast_message(&device_credentials, "register", serde_json::to_value(listing)?)
                .await?;
        }

        Ok(registered)
    }

    /// Role matrix: users own apps and gateways, users and gateways own things
    fn authorize(role: &Role, owner: &Device) -> Result<()> {
        match (role, owner.device_type) {
            (Role::App | Role::Gateway, Some(DeviceType::User)) => Ok(()),
            (
                Role::App | Role::Gateway,
                Some(DeviceType::Gateway)
                | Some(DeviceType::App)
                | Some(DeviceType::Thing)
                | Some(DeviceType::Router)
                | None,
            ) => Err(GatewayError::bad_request("Device owner isn't a user")),
            (Role::Thing { .. }, Some(DeviceType::Gateway) | Some(DeviceType::User)) => Ok(()),
            (
                Role::Thing { .. },
                Some(DeviceType::App) | Some(DeviceType::Thing) | Some(DeviceType::Router) | None,
            ) => Err(GatewayError::unauthorized("Session unauthorized")),
        }
    }

    fn app_or_gateway(
        &self,
        role: &Role,
        owner: &Device,
        router: &str,
        name: Option<String>,
    ) -> Result<Device> {
        let mut device = Device::new(role.device_type(), name);
        device.knot.user = Some(owner.uuid().to_string());
        device.knot.router = Some(router.to_string());
        if *role == Role::Gateway {
            device.knot.active = Some(false);
        }
        device.meshblu = Some(super::MeshbluProperties {
            version: Some(MESHBLU_VERSION.to_string()),
            whitelists: Some(Whitelists::seeded(vec![
                Grant::new(owner.uuid()),
                Grant::new(router),
            ])),
            ..Default::default()
        });
        Ok(device)
    }

    async fn thing(
        &self,
        credentials: &Credentials,
        owner: &Device,
        router: &str,
        id: &str,
        name: Option<String>,
    ) -> Result<Device> {
        let owner_is_gateway = owner.device_type == Some(DeviceType::Gateway);

        let mut grants = owner
            .whitelists()
            .map(|w| w.discover.view.clone())
            .ok_or_else(|| GatewayError::whitelist_unauthorized("Unauthorized whitelists"))?;
        grants.push(Grant::new(owner.uuid()));

        let existing = self
            .bus
            .get_devices(credentials, json!({ "knot.id": id }))
            .await?;
        if !existing.is_empty() {
            return Err(GatewayError::bad_request(format!(
                "Thing {} is already registered",
                id
            )));
        }

        let mut device = Device::new(DeviceType::Thing, name);
        device.knot.id = Some(id.to_string());
        device.knot.router = Some(router.to_string());
        if owner_is_gateway {
            device.knot.gateways = Some(vec![owner.uuid().to_string()]);
        }
        device.meshblu = Some(super::MeshbluProperties {
            version: Some(MESHBLU_VERSION.to_string()),
            whitelists: Some(Whitelists::seeded(grants)),
            ..Default::default()
        });
        Ok(device)
    }

    /// Connect a new device to its router and to itself. Order matters: each
    /// edge references devices created by the previous steps.
    async fn wire(
        &self,
        role: &Role,
        credentials: &Credentials,
        device: &Credentials,
        router: &str,
    ) -> Result<()> {
        let uuid = device.uuid.as_str();
        match role {
            Role::App => {
                self.grant(
                    credentials,
                    router,
                    &[
                        Capability::BroadcastReceived,
                        Capability::UnregisterReceived,
                        Capability::ConfigureReceived,
                    ],
                    uuid,
                )
                .await?;
                self.subscribe(credentials, uuid, uuid, EventType::BroadcastReceived)
                    .await?;
                self.subscribe(credentials, uuid, uuid, EventType::UnregisterReceived)
                    .await?;
                self.subscribe(credentials, router, uuid, EventType::BroadcastReceived)
                    .await?;
                self.subscribe(credentials, router, uuid, EventType::UnregisterReceived)
                    .await?;
                self.subscribe(credentials, uuid, router, EventType::UnregisterSent)
                    .await?;
                self.grant(
                    credentials,
                    uuid,
                    &[
                        Capability::MessageAs,
                        Capability::DiscoverAs,
                        Capability::ConfigureAs,
                    ],
                    uuid,
                )
                .await?;
            }
            Role::Gateway => {
                self.grant(credentials, router, &[Capability::ConfigureUpdate], uuid)
                    .await?;
                self.subscribe(credentials, uuid, uuid, EventType::BroadcastReceived)
                    .await?;
                self.subscribe(credentials, router, uuid, EventType::UnregisterReceived)
                    .await?;
                self.subscribe(credentials, uuid, router, EventType::BroadcastSent)
                    .await?;
                self.subscribe(credentials, uuid, router, EventType::UnregisterSent)
                    .await?;
            }
            // The caller can't subscribe on the thing's behalf
            Role::Thing { .. } => {
                self.subscribe(device, uuid, uuid, EventType::MessageReceived)
                    .await?;
                self.subscribe(device, uuid, router, EventType::BroadcastSent)
                    .await?;
                self.subscribe(device, uuid, router, EventType::UnregisterSent)
                    .await?;
            }
        }
        Ok(())
    }

    /// Append `grantee` to each capability list of `target_id`'s whitelist.
    ///
    /// Reads the target, appends locally and writes the whole document back.
    pub async fn grant(
        &self,
        credentials: &Credentials,
        target_id: &str,
        capabilities: &[Capability],
        grantee: &str,
    ) -> Result<()> {
        let mut target = self.bus.get_device(credentials, target_id).await?;
        let whitelists = target.whitelists_mut();
        for capability in capabilities {
            whitelists.grant(*capability, grantee);
        }

        debug!(
            target = %target_id,
            grantee = %grantee,
            capabilities = ?capabilities.iter().map(|c| c.path()).collect::<Vec<_>>(),
            "Granting capabilities"
        );

        let document = serde_json::to_value(&*whitelists)?;
        self.bus
            .update_device(credentials, target_id, json!({ "meshblu.whitelists": document }))
            .await
    }

    async fn subscribe(
        &self,
        credentials: &Credentials,
        subscriber: &str,
        emitter: &str,
        event_type: EventType,
    ) -> Result<()> {
        self.bus
            .create_subscription(credentials, &Subscription::new(subscriber, emitter, event_type))
            .await
    }
}
