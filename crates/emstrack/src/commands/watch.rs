//! `watch`: seed the selected caches, then print every record the broker
//! changes until Ctrl-C or `--count` updates.

use std::collections::HashMap;
use std::sync::Arc;

use owo_colors::OwoColorize;
use serde::Serialize;

use emstrack_core::{Ambulance, Call, Entity, EntityId, EntityKind, EntityStream, Hospital};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::Client;

// ── Change tracking ─────────────────────────────────────────────────

/// Remembers the last `Arc` seen per id. The store only swaps the `Arc`
/// when a record actually changed, so pointer identity is the diff.
struct Tracker<T: Entity> {
    stream: EntityStream<T>,
    seen: HashMap<EntityId, Arc<T>>,
}

impl<T: Entity> Tracker<T> {
    fn new(stream: EntityStream<T>) -> Self {
        let seen = stream
            .current()
            .iter()
            .map(|e| (e.id().clone(), Arc::clone(e)))
            .collect();
        Self { stream, seen }
    }

    /// Records that are new or replaced in `snapshot`.
    fn diff(&mut self, snapshot: &[Arc<T>]) -> Vec<Arc<T>> {
        snapshot
            .iter()
            .filter(|e| {
                let fresh = self
                    .seen
                    .get(e.id())
                    .is_none_or(|prev| !Arc::ptr_eq(prev, e));
                if fresh {
                    self.seen.insert(e.id().clone(), Arc::clone(e));
                }
                fresh
            })
            .cloned()
            .collect()
    }
}

// ── Line rendering ──────────────────────────────────────────────────

/// One NDJSON line for structured output.
#[derive(Serialize)]
struct WatchLine<'a, T> {
    time: String,
    kind: String,
    record: &'a T,
}

struct Printer {
    format: OutputFormat,
    color: bool,
    quiet: bool,
    printed: usize,
    limit: Option<usize>,
}

impl Printer {
    fn done(&self) -> bool {
        self.limit.is_some_and(|n| self.printed >= n)
    }

    fn emit<T: Entity>(&mut self, kind: EntityKind, record: &T, summary: &str) {
        if self.done() {
            return;
        }
        self.printed += 1;
        let now = chrono::Local::now();
        let line = match self.format {
            OutputFormat::Json | OutputFormat::JsonCompact | OutputFormat::Yaml => {
                output::render_json_compact(&WatchLine {
                    time: now.to_rfc3339(),
                    kind: kind.to_string(),
                    record,
                })
            }
            OutputFormat::Plain => format!("{kind} {}", record.id()),
            OutputFormat::Table => {
                let time = now.format("%H:%M:%S").to_string();
                let kind = format!("{kind:<9}");
                let id = format!("{:>6}", record.id().to_string());
                if self.color {
                    format!("{} {} {}  {summary}", time.dimmed(), kind.cyan(), id.bold())
                } else {
                    format!("{time} {kind} {id}  {summary}")
                }
            }
        };
        output::print_output(&line, self.quiet);
    }
}

fn ambulance_summary(a: &Ambulance) -> String {
    let name = a.identifier.as_deref().unwrap_or("-");
    match a.status_label() {
        Some(label) => format!("{name}  {label}"),
        None => name.to_owned(),
    }
}

fn hospital_summary(h: &Hospital) -> String {
    h.name.clone().unwrap_or_else(|| "-".into())
}

fn call_summary(c: &Call) -> String {
    let status = c.status_label().unwrap_or("-");
    match c.details.as_deref() {
        Some(details) => format!("{status}  {details}"),
        None => status.to_owned(),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    client: &Client,
    args: &WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let all = args.follows_all();
    let (follow_amb, follow_hosp, follow_calls) = (
        all || args.ambulances,
        all || args.hospitals,
        all || args.calls,
    );

    // Seed before tracking so the initial load is not reported as changes.
    if follow_amb {
        client.try_retrieve(EntityKind::Ambulance).await?;
    }
    if follow_hosp {
        client.try_retrieve(EntityKind::Hospital).await?;
    }
    if follow_calls {
        client.try_retrieve(EntityKind::Call).await?;
    }

    let mut ambulances = Tracker::new(client.ambulances());
    let mut hospitals = Tracker::new(client.hospitals());
    let mut calls = Tracker::new(client.calls());

    let mut printer = Printer {
        format: global.output,
        color: output::should_color(global.color),
        quiet: global.quiet,
        printed: 0,
        limit: args.count,
    };

    if !global.quiet {
        eprintln!(
            "Watching {} topic(s) on the broker (Ctrl-C to stop)",
            client.subscribed_filters().len()
        );
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    while !printer.done() {
        tokio::select! {
            _ = &mut ctrl_c => break,
            Some(snap) = ambulances.stream.changed(), if follow_amb => {
                for a in ambulances.diff(&snap) {
                    printer.emit(EntityKind::Ambulance, &*a, &ambulance_summary(&a));
                }
            }
            Some(snap) = hospitals.stream.changed(), if follow_hosp => {
                for h in hospitals.diff(&snap) {
                    printer.emit(EntityKind::Hospital, &*h, &hospital_summary(&h));
                }
            }
            Some(snap) = calls.stream.changed(), if follow_calls => {
                for c in calls.diff(&snap) {
                    printer.emit(EntityKind::Call, &*c, &call_summary(&c));
                }
            }
            else => break,
        }
    }

    tracing::debug!(updates = printer.printed, "watch finished");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use emstrack_core::DataStore;
    use serde_json::json;

    use super::*;

    fn ambulance(id: i64, status: &str) -> Ambulance {
        serde_json::from_value(json!({
            "id": id,
            "identifier": format!("AMB-{id}"),
            "status": status,
        }))
        .unwrap()
    }

    #[test]
    fn diff_reports_only_replaced_records() {
        let store = DataStore::new();
        let one = Arc::new(ambulance(1, "AV"));
        let two = Arc::new(ambulance(2, "AV"));
        let mut tracker = Tracker::new(store.subscribe_ambulances());

        let first = tracker.diff(&[Arc::clone(&one), Arc::clone(&two)]);
        assert_eq!(first.len(), 2);

        let unchanged = tracker.diff(&[Arc::clone(&one), Arc::clone(&two)]);
        assert!(unchanged.is_empty());

        let moved = Arc::new(ambulance(2, "PB"));
        let changed = tracker.diff(&[Arc::clone(&one), Arc::clone(&moved)]);
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].status.as_deref(), Some("PB"));
    }

    #[test]
    fn summaries_use_labels() {
        assert_eq!(ambulance_summary(&ambulance(3, "AH")), "AMB-3  At hospital");
        let call: Call =
            serde_json::from_value(json!({"id": 9, "status": "S", "details": "fall"})).unwrap();
        assert_eq!(call_summary(&call), "Started  fall");
    }

    #[test]
    fn printer_stops_at_limit() {
        let mut printer = Printer {
            format: OutputFormat::Plain,
            color: false,
            quiet: true,
            printed: 0,
            limit: Some(1),
        };
        let a = ambulance(1, "AV");
        printer.emit(EntityKind::Ambulance, &a, "");
        printer.emit(EntityKind::Ambulance, &a, "");
        assert_eq!(printer.printed, 1);
        assert!(printer.done());
    }
}
