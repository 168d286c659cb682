// ── Domain model ──
//
// Records mirror the server's JSON: a few typed fields the client reads,
// everything else kept in `extra` so re-serializing loses nothing.

mod ambulance;
mod base;
mod call;
mod entity_id;
mod hospital;
mod status;

use serde::Serialize;
use serde::de::DeserializeOwned;
use strum::{Display, EnumString};

pub use ambulance::Ambulance;
pub use base::Base;
pub use call::Call;
pub use entity_id::EntityId;
pub use hospital::Hospital;
pub use status::{AmbulanceCallStatus, ambulance_status_label, call_status_label};

/// The four cached record types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum EntityKind {
    Ambulance,
    Hospital,
    Call,
    Base,
}

/// A record that can be decoded from the API and cached by id.
pub trait Entity:
    Clone + PartialEq + Send + Sync + Serialize + DeserializeOwned + 'static
{
    const KIND: EntityKind;

    fn id(&self) -> &EntityId;

    /// Decode a record from an API body or message payload.
    fn from_value(value: serde_json::Value) -> Result<Self, crate::CoreError> {
        serde_json::from_value(value).map_err(|e| crate::CoreError::Decode {
            entity_type: Self::KIND.to_string(),
            message: e.to_string(),
        })
    }
}
