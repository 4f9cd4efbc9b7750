use serde::{Deserialize, Serialize};

/// Encryption material a browser hands out alongside a push endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// One Web Push subscription, in the shape browsers serialize a
/// `PushSubscription` to. The endpoint URL is the unique key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

/// One host discovered by a network scan.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub ip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Device {
    pub fn with_ip(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            hostname: None,
            mac: None,
            name: None,
        }
    }
}

/// Latest scan snapshot. Replaced wholesale after each successful scan;
/// `timestamp` is absent until the first scan completes.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub devices: Vec<Device>,
}

/// One line of `docker events --format '{{json .}}'`. Only the fields the
/// notification bridge looks at; everything else in the event is ignored.
#[derive(Deserialize, Debug, Clone)]
pub struct DockerEvent {
    #[serde(rename = "Type", default)]
    pub kind: String,
    #[serde(default)]
    pub status: String,
    #[serde(rename = "Actor", default)]
    pub actor: DockerEventActor,
    #[serde(rename = "Time", default)]
    pub time: i64,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct DockerEventActor {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(rename = "Attributes", default)]
    pub attributes: DockerEventAttributes,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct DockerEventAttributes {
    #[serde(default)]
    pub name: String,
}

/// One row of `docker ps -a --format '{{json .}}'`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ContainerSummary {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(rename = "Names", default)]
    pub names: String,
    #[serde(rename = "Image", default)]
    pub image: String,
    #[serde(rename = "State", default)]
    pub state: String,
    #[serde(rename = "Status", default)]
    pub status: String,
    #[serde(rename = "Ports", default)]
    pub ports: String,
    #[serde(rename = "CreatedAt", default)]
    pub created_at: String,
    #[serde(rename = "RunningFor", default)]
    pub running_for: String,
}
