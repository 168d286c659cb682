use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Entity, EntityId, EntityKind};

/// A station location from `location/Base/`. Bases have no live topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Base {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entity for Base {
    const KIND: EntityKind = EntityKind::Base;

    fn id(&self) -> &EntityId {
        &self.id
    }
}
