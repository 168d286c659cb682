use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Entity, EntityId, EntityKind};

/// A receiving facility (`hospital/`, `hospital/{id}/data`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hospital {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entity for Hospital {
    const KIND: EntityKind = EntityKind::Hospital;

    fn id(&self) -> &EntityId {
        &self.id
    }
}
