use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One ACL entry: `{uuid}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub uuid: String,
}

impl Grant {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self { uuid: uuid.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoverWhitelist {
    #[serde(rename = "as", default)]
    pub act_as: Vec<Grant>,
    #[serde(default)]
    pub view: Vec<Grant>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigureWhitelist {
    #[serde(rename = "as", default)]
    pub act_as: Vec<Grant>,
    #[serde(default)]
    pub update: Vec<Grant>,
    #[serde(default)]
    pub sent: Vec<Grant>,
    #[serde(default)]
    pub received: Vec<Grant>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BroadcastWhitelist {
    #[serde(default)]
    pub sent: Vec<Grant>,
    #[serde(default)]
    pub received: Vec<Grant>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageWhitelist {
    #[serde(rename = "as", default)]
    pub act_as: Vec<Grant>,
    #[serde(default)]
    pub from: Vec<Grant>,
    #[serde(default)]
    pub received: Vec<Grant>,
    #[serde(default)]
    pub sent: Vec<Grant>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnregisterWhitelist {
    #[serde(default)]
    pub sent: Vec<Grant>,
    #[serde(default)]
    pub received: Vec<Grant>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Device ACL document (`meshblu.whitelists`).
///
/// Every list is ordered and append-only: grants are never removed or
/// deduplicated. Keys this model doesn't know about are carried through
/// untouched so a write never drops them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Whitelists {
    #[serde(default)]
    pub discover: DiscoverWhitelist,
    #[serde(default)]
    pub configure: ConfigureWhitelist,
    #[serde(default)]
    pub broadcast: BroadcastWhitelist,
    #[serde(default)]
    pub message: MessageWhitelist,
    #[serde(default)]
    pub unregister: UnregisterWhitelist,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Named capability list inside [`Whitelists`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    DiscoverAs,
    DiscoverView,
    ConfigureAs,
    ConfigureUpdate,
    ConfigureSent,
    ConfigureReceived,
    BroadcastSent,
    BroadcastReceived,
    MessageAs,
    MessageFrom,
    MessageReceived,
    MessageSent,
    UnregisterSent,
    UnregisterReceived,
}

impl Capability {
    /// Dotted path of the list, e.g. `broadcast.received`
    pub fn path(self) -> &'static str {
        match self {
            Capability::DiscoverAs => "discover.as",
            Capability::DiscoverView => "discover.view",
            Capability::ConfigureAs => "configure.as",
            Capability::ConfigureUpdate => "configure.update",
            Capability::ConfigureSent => "configure.sent",
            Capability::ConfigureReceived => "configure.received",
            Capability::BroadcastSent => "broadcast.sent",
            Capability::BroadcastReceived => "broadcast.received",
            Capability::MessageAs => "message.as",
            Capability::MessageFrom => "message.from",
            Capability::MessageReceived => "message.received",
            Capability::MessageSent => "message.sent",
            Capability::UnregisterSent => "unregister.sent",
            Capability::UnregisterReceived => "unregister.received",
        }
    }
}

impl Whitelists {
    /// ACL for a freshly created device: the seed grants may discover and
    /// configure it.
    pub fn seeded(grants: Vec<Grant>) -> Self {
        let mut whitelists = Self::default();
        whitelists.discover.act_as = grants.clone();
        whitelists.discover.view = grants.clone();
        whitelists.configure.act_as = grants.clone();
        whitelists.configure.update = grants;
        whitelists
    }

    pub fn list(&self, capability: Capability) -> &[Grant] {
        match capability {
            Capability::DiscoverAs => &self.discover.act_as,
            Capability::DiscoverView => &self.discover.view,
            Capability::ConfigureAs => &self.configure.act_as,
            Capability::ConfigureUpdate => &self.configure.update,
            Capability::ConfigureSent => &self.configure.sent,
            Capability::ConfigureReceived => &self.configure.received,
            Capability::BroadcastSent => &self.broadcast.sent,
            Capability::BroadcastReceived => &self.broadcast.received,
            Capability::MessageAs => &self.message.act_as,
            Capability::MessageFrom => &self.message.from,
            Capability::MessageReceived => &self.message.received,
            Capability::MessageSent => &self.message.sent,
            Capability::UnregisterSent => &self.unregister.sent,
            Capability::UnregisterReceived => &self.unregister.received,
        }
    }

    fn list_mut(&mut self, capability: Capability) -> &mut Vec<Grant> {
        match capability {
            Capability::DiscoverAs => &mut self.discover.act_as,
            Capability::DiscoverView => &mut self.discover.view,
            Capability::ConfigureAs => &mut self.configure.act_as,
            Capability::ConfigureUpdate => &mut self.configure.update,
            Capability::ConfigureSent => &mut self.configure.sent,
            Capability::ConfigureReceived => &mut self.configure.received,
            Capability::BroadcastSent => &mut self.broadcast.sent,
            Capability::BroadcastReceived => &mut self.broadcast.received,
            Capability::MessageAs => &mut self.message.act_as,
            Capability::MessageFrom => &mut self.message.from,
            Capability::MessageReceived => &mut self.message.received,
            Capability::MessageSent => &mut self.message.sent,
            Capability::UnregisterSent => &mut self.unregister.sent,
            Capability::UnregisterReceived => &mut self.unregister.received,
        }
    }

    /// Append `uuid` to a capability list. Repeated grants are kept.
    pub fn grant(&mut self, capability: Capability, uuid: &str) {
        self.list_mut(capability).push(Grant::new(uuid));
    }

    pub fn contains(&self, capability: Capability, uuid: &str) -> bool {
        self.list(capability).iter().any(|grant| grant.uuid == uuid)
    }
}
