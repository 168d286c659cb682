//! `ambulances`, `hospitals`, `calls` and `bases` handlers.
//!
//! Every listing seeds the cache from the REST API first, then renders the
//! cached snapshot, so the output matches what a live client would hold.

use std::sync::Arc;

use tabled::Tabled;

use emstrack_core::{Ambulance, Base, Call, Entity, EntityId, EntityKind, Hospital};

use crate::cli::{EntityArgs, EntityCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::Client;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct AmbulanceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Identifier")]
    identifier: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Capability")]
    capability: String,
    #[tabled(rename = "Updated")]
    updated_on: String,
}

impl From<&Arc<Ambulance>> for AmbulanceRow {
    fn from(a: &Arc<Ambulance>) -> Self {
        Self {
            id: a.id.to_string(),
            identifier: a.identifier.clone().unwrap_or_default(),
            status: a.status_label().unwrap_or_default().to_owned(),
            capability: a.capability.clone().unwrap_or_default(),
            updated_on: a.updated_on.clone().unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
struct HospitalRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
}

impl From<&Arc<Hospital>> for HospitalRow {
    fn from(h: &Arc<Hospital>) -> Self {
        Self {
            id: h.id.to_string(),
            name: h.name.clone().unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
struct CallRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "Details")]
    details: String,
}

impl From<&Arc<Call>> for CallRow {
    fn from(c: &Arc<Call>) -> Self {
        Self {
            id: c.id.to_string(),
            status: c.status_label().unwrap_or_default().to_owned(),
            priority: c.priority.clone().unwrap_or_default(),
            details: c.details.clone().unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
struct BaseRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
}

impl From<&Arc<Base>> for BaseRow {
    fn from(b: &Arc<Base>) -> Self {
        Self {
            id: b.id.to_string(),
            name: b.name.clone().unwrap_or_default(),
            kind: b.kind.clone().unwrap_or_default(),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    client: &Client,
    kind: EntityKind,
    args: EntityArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let merged = client.try_retrieve(kind).await?;
    tracing::debug!(%kind, merged, "cache seeded");

    let store = client.store();
    let out = match args.command {
        EntityCommand::List => match kind {
            EntityKind::Ambulance => {
                list(global, &store.ambulances_snapshot()[..], |a| AmbulanceRow::from(a))
            }
            EntityKind::Hospital => {
                list(global, &store.hospitals_snapshot()[..], |h| HospitalRow::from(h))
            }
            EntityKind::Call => list(global, &store.calls_snapshot()[..], |c| CallRow::from(c)),
            EntityKind::Base => list(global, &store.bases_snapshot()[..], |b| BaseRow::from(b)),
        },
        EntityCommand::Get { id } => {
            let key = EntityId::from(id.as_str());
            match kind {
                EntityKind::Ambulance => single(global, kind, &id, store.ambulance(&key))?,
                EntityKind::Hospital => single(global, kind, &id, store.hospital(&key))?,
                EntityKind::Call => single(global, kind, &id, store.call(&key))?,
                EntityKind::Base => single(global, kind, &id, store.base(&key))?,
            }
        }
    };

    output::print_output(&out, global.quiet);
    Ok(())
}

fn list<T: Entity, R: Tabled>(
    global: &GlobalOpts,
    snapshot: &[Arc<T>],
    to_row: impl Fn(&Arc<T>) -> R,
) -> String {
    output::render_list(global.output, snapshot, to_row, |e| e.id().to_string())
}

fn single<T: Entity>(
    global: &GlobalOpts,
    kind: EntityKind,
    id: &str,
    found: Option<Arc<T>>,
) -> Result<String, CliError> {
    let record = found.ok_or_else(|| CliError::NotFound {
        resource_type: kind.to_string(),
        identifier: id.into(),
        list_command: format!("{kind}s list"),
    })?;
    let detail = serde_json::to_value(&*record)?;
    Ok(output::render_single(
        global.output,
        &record,
        |_| output::render_detail(&detail),
        |r| r.id().to_string(),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn ambulance_row_shows_status_label() {
        let amb: Ambulance = serde_json::from_value(json!({
            "id": 7, "identifier": "AMB-7", "status": "PB", "capability": "A"
        }))
        .unwrap();
        let row = AmbulanceRow::from(&Arc::new(amb));
        assert_eq!(row.id, "7");
        assert_eq!(row.status, "Patient bound");
        assert_eq!(row.updated_on, "");
    }

    #[test]
    fn base_row_uses_type_field() {
        let base: Base = serde_json::from_value(json!({"id": 2, "name": "North", "type": "b"}))
            .unwrap();
        let row = BaseRow::from(&Arc::new(base));
        assert_eq!(row.kind, "b");
    }
}
