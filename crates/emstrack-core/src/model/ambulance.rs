use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Entity, EntityId, EntityKind, ambulance_status_label};

/// An ambulance as served by `ambulance/` and published on `ambulance/{id}/data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ambulance {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    /// Two-letter status code (`AV`, `PB`, `AH`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_on: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Ambulance {
    pub fn status_label(&self) -> Option<&str> {
        self.status.as_deref().map(ambulance_status_label)
    }
}

impl Entity for Ambulance {
    const KIND: EntityKind = EntityKind::Ambulance;

    fn id(&self) -> &EntityId {
        &self.id
    }
}
