use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Entity, EntityId, EntityKind, call_status_label};

/// A dispatch call (`call/`, `call/{id}/`, `call/{id}/data`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub id: EntityId,
    /// `P` pending, `S` started, `E` ended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Call {
    pub fn status_label(&self) -> Option<&str> {
        self.status.as_deref().map(call_status_label)
    }
}

impl Entity for Call {
    const KIND: EntityKind = EntityKind::Call;

    fn id(&self) -> &EntityId {
        &self.id
    }
}
