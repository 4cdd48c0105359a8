//! Column schema per entity kind
//!
//! Every kind recognises the common columns in [`COMMON_COLUMNS`] plus its own
//! table. Fields outside the schema are dropped at construction time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ModelError, Result};

/// Properties whose parent value is excluded from an entity's own value
pub const INHERITED_PROPS: &[&str] = &["tags"];

/// Properties stored as a sequence of whitespace-separated tokens
pub const LIST_TYPE_PROPS: &[&str] = &["tags"];

/// Content filter name matching every kind
pub const CONTENT_TYPE_ALL: &str = "all";

/// Columns shared by all kinds
pub const COMMON_COLUMNS: &[&str] = &[
    "objid", "type", "tags", "active", "name", "status", "parentid", "result",
];

const SENSOR_COLUMNS: &[&str] = &[
    "downtime",
    "downtimetime",
    "downtimesince",
    "uptime",
    "uptimetime",
    "uptimesince",
    "knowntime",
    "cumsince",
    "sensor",
    "interval",
    "lastcheck",
    "lastup",
    "lastdown",
    "device",
    "group",
    "probe",
    "grpdev",
    "notifiesx",
    "intervalx",
    "access",
    "dependency",
    "probegroupdevice",
    "status",
    "message",
    "priority",
    "lastvalue",
    "upsens",
    "downsens",
    "downacksens",
    "partialdownsens",
    "warnsens",
    "pausedsens",
    "unusualsens",
    "undefinedsens",
    "totalsens",
    "favorite",
    "schedule",
    "minigraph",
    "comments",
    "parentid",
];

const DEVICE_COLUMNS: &[&str] = &[
    "device",
    "group",
    "probe",
    "grpdev",
    "notifiesx",
    "intervalx",
    "access",
    "dependency",
    "probegroupdevice",
    "status",
    "message",
    "priority",
    "upsens",
    "downsens",
    "downacksens",
    "partialdownsens",
    "warnsens",
    "pausedsens",
    "unusualsens",
    "undefinedsens",
    "totalsens",
    "favorite",
    "schedule",
    "deviceicon",
    "host",
    "comments",
    "icon",
    "location",
    "parentid",
];

const GROUP_COLUMNS: &[&str] = &["group", "device", "sensor"];

const STATUS_COLUMNS: &[&str] = &[
    "NewMessages",
    "NewAlarms",
    "Alarms",
    "AckAlarms",
    "NewToDos",
    "Clock",
    "ActivationStatusMessage",
    "BackgroundTasks",
    "CorrelationTasks",
    "AutoDiscoTasks",
    "Version",
    "PRTGUpdateAvailable",
    "IsAdminUser",
    "IsCluster",
    "ReadOnlyUser",
    "ReadOnlyAllowAcknowledge",
];

/// Whether `prop` is stored as a token list
pub fn is_list_prop(prop: &str) -> bool {
    LIST_TYPE_PROPS.contains(&prop)
}

/// Whether `prop` inherits values from the parent entity
pub fn is_inherited_prop(prop: &str) -> bool {
    INHERITED_PROPS.contains(&prop)
}

/// Kind of a PRTG object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Plain `<prtg>` record (e.g. getobjectproperty responses)
    Generic,
    Group,
    Device,
    Sensor,
    Status,
}

impl EntityKind {
    /// All kinds, in hierarchy order
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Generic,
        EntityKind::Group,
        EntityKind::Device,
        EntityKind::Sensor,
        EntityKind::Status,
    ];

    /// Content-type tag, which is also the XML envelope tag for the kind
    pub const fn content_type(self) -> &'static str {
        match self {
            EntityKind::Generic => "prtg",
            EntityKind::Group => "groups",
            EntityKind::Device => "devices",
            EntityKind::Sensor => "sensors",
            EntityKind::Status => "status",
        }
    }

    /// Default value of the `type` field
    pub const fn display_name(self) -> &'static str {
        match self {
            EntityKind::Generic => "Entity",
            EntityKind::Group => "Group",
            EntityKind::Device => "Device",
            EntityKind::Sensor => "Sensor",
            EntityKind::Status => "Status",
        }
    }

    /// Kind-specific columns (without the common ones)
    pub const fn columns(self) -> &'static [&'static str] {
        match self {
            EntityKind::Generic => &[],
            EntityKind::Group => GROUP_COLUMNS,
            EntityKind::Device => DEVICE_COLUMNS,
            EntityKind::Sensor => SENSOR_COLUMNS,
            EntityKind::Status => STATUS_COLUMNS,
        }
    }

    /// Whether the schema of this kind knows `field`
    pub fn recognizes(self, field: &str) -> bool {
        COMMON_COLUMNS.contains(&field) || self.columns().contains(&field)
    }

    /// Map an envelope / content-type tag to a kind
    pub fn from_content_type(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.content_type() == tag)
    }

    /// Kinds that can be listed through the table target
    pub const fn is_table_content(self) -> bool {
        matches!(
            self,
            EntityKind::Group | EntityKind::Device | EntityKind::Sensor
        )
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.content_type())
    }
}

impl FromStr for EntityKind {
    type Err = ModelError;

    /// Accepts content-type tags (`devices`) and singular names (`device`)
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        if let Some(kind) = Self::from_content_type(&lower) {
            return Ok(kind);
        }
        match lower.as_str() {
            "generic" | "entity" => Ok(EntityKind::Generic),
            "group" => Ok(EntityKind::Group),
            "device" => Ok(EntityKind::Device),
            "sensor" => Ok(EntityKind::Sensor),
            _ => Err(ModelError::UnknownKind(s.to_string())),
        }
    }
}
