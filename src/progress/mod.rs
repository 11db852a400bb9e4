//! Progress reporting (§4.J): a simple start/advance/finish API and a
//! structured itemized variant, both publishing `progress.*` domain events
//! and replayable from an in-memory store for late subscribers (e.g. an
//! HTTP client that connects mid-task). Grounded on the source's
//! `ProgressReporter`/`ProgressEvent`/`ProgressEventStore`.

use crate::bus::EventBus;
use crate::domain::events::DomainEvent;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
pub struct ProgressEvent {
    pub task_id: String,
    pub kind: &'static str,
    pub task_name: String,
    pub total: Option<u64>,
    pub completed: Option<u64>,
    pub stage_key: Option<String>,
    pub stage_label: Option<String>,
    pub stage_index: Option<u32>,
    pub stage_count: Option<u32>,
    pub success: Option<bool>,
    pub message: Option<String>,
    pub items: Option<Vec<String>>,
    pub item_index: Option<u32>,
    pub item_key: Option<String>,
    pub item_label: Option<String>,
}

impl ProgressEvent {
    fn payload(&self) -> Map<String, Value> {
        match json!({
            "kind": self.kind,
            "task_id": self.task_id,
            "task_name": self.task_name,
            "total": self.total,
            "completed": self.completed,
            "stage_key": self.stage_key,
            "stage_label": self.stage_label,
            "stage_index": self.stage_index,
            "stage_count": self.stage_count,
            "success": self.success,
            "message": self.message,
            "items": self.items,
            "item_index": self.item_index,
            "item_key": self.item_key,
            "item_label": self.item_label,
        }) {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn to_domain_event(&self) -> DomainEvent {
        DomainEvent::new(format!("progress.{}", self.kind), self.payload())
    }
}

/// Publishes `progress.*` events for a set of concurrently-running tasks
/// identified by `task_id`. Holds no per-listener Tk-bridge equivalent
/// (this crate's consumers subscribe to the event bus directly instead).
pub struct ProgressReporter {
    events: Arc<EventBus>,
    totals: Mutex<HashMap<String, Option<u64>>>,
    completed: Mutex<HashMap<String, u64>>,
}

impl ProgressReporter {
    pub fn new(events: Arc<EventBus>) -> ProgressReporter {
        ProgressReporter {
            events,
            totals: Mutex::new(HashMap::new()),
            completed: Mutex::new(HashMap::new()),
        }
    }

    fn total_of(&self, task_id: &str) -> Option<u64> {
        self.totals.lock().unwrap().get(task_id).copied().flatten()
    }

    fn completed_of(&self, task_id: &str) -> Option<u64> {
        self.completed.lock().unwrap().get(task_id).copied()
    }

    pub fn start_task(&self, task_id: &str, task_name: &str, total: Option<u64>, items: Option<Vec<String>>) {
        self.totals.lock().unwrap().insert(task_id.to_string(), total);
        self.completed.lock().unwrap().insert(task_id.to_string(), 0);
        self.emit(ProgressEvent {
            task_id: task_id.to_string(),
            kind: "start",
            task_name: task_name.to_string(),
            total,
            completed: Some(0),
            items,
            ..Default::default()
        });
    }

    pub fn update_total(&self, task_id: &str, total: u64) {
        self.totals.lock().unwrap().insert(task_id.to_string(), Some(total));
        self.emit(ProgressEvent {
            task_id: task_id.to_string(),
            kind: "total",
            total: Some(total),
            completed: self.completed_of(task_id),
            ..Default::default()
        });
    }

    #[allow(clippy::too_many_arguments)]
    pub fn stage(&self, task_id: &str, stage_key: &str, stage_label: &str, index: Option<u32>, count: Option<u32>, message: Option<&str>) {
        self.emit(ProgressEvent {
            task_id: task_id.to_string(),
            kind: "stage",
            total: self.total_of(task_id),
            completed: self.completed_of(task_id),
            stage_key: Some(stage_key.to_string()),
            stage_label: Some(stage_label.to_string()),
            stage_index: index,
            stage_count: count,
            message: message.map(str::to_string),
            ..Default::default()
        });
    }

    pub fn advance(&self, task_id: &str, inc: u64) {
        let completed = {
            let mut map = self.completed.lock().unwrap();
            let entry = map.entry(task_id.to_string()).or_insert(0);
            *entry += inc;
            *entry
        };
        self.emit(ProgressEvent {
            task_id: task_id.to_string(),
            kind: "advance",
            total: self.total_of(task_id),
            completed: Some(completed),
            ..Default::default()
        });
    }

    pub fn finish(&self, task_id: &str, success: bool, message: Option<&str>) {
        self.emit(ProgressEvent {
            task_id: task_id.to_string(),
            kind: "finish",
            total: self.total_of(task_id),
            completed: self.completed_of(task_id),
            success: Some(success),
            message: message.map(str::to_string),
            ..Default::default()
        });
    }

    pub fn init_items(&self, task_id: &str, items: Vec<String>) {
        self.emit(ProgressEvent {
            task_id: task_id.to_string(),
            kind: "items",
            total: self.total_of(task_id),
            completed: self.completed_of(task_id),
            items: Some(items),
            ..Default::default()
        });
    }

    pub fn item_stage(&self, task_id: &str, item_index: u32, stage_key: &str, stage_label: &str, message: Option<&str>) {
        self.emit(ProgressEvent {
            task_id: task_id.to_string(),
            kind: "item_stage",
            total: self.total_of(task_id),
            completed: self.completed_of(task_id),
            item_index: Some(item_index),
            item_key: Some(stage_key.to_string()),
            item_label: Some(stage_label.to_string()),
            message: message.map(str::to_string),
            ..Default::default()
        });
    }

    pub fn item_finish(&self, task_id: &str, item_index: u32, success: bool, message: Option<&str>) {
        self.emit(ProgressEvent {
            task_id: task_id.to_string(),
            kind: "item_finish",
            total: self.total_of(task_id),
            completed: self.completed_of(task_id),
            item_index: Some(item_index),
            success: Some(success),
            message: message.map(str::to_string),
            ..Default::default()
        });
    }

    fn emit(&self, event: ProgressEvent) {
        tracing::info!(kind = event.kind, task_id = %event.task_id, completed = ?event.completed, total = ?event.total, "publishing progress event");
        self.events.publish(event.to_domain_event());
    }
}

/// In-memory replay buffer for progress events (§5 "the progress store
/// uses a single mutex around both its buffer and the active-task set").
/// Lets a late subscriber (e.g. an HTTP poller) catch up on a task already
/// in flight.
pub struct ProgressEventStore {
    max_events: usize,
    inner: Mutex<ProgressEventStoreInner>,
}

struct ProgressEventStoreInner {
    events: Vec<DomainEvent>,
    active_tasks: std::collections::HashSet<String>,
}

impl ProgressEventStore {
    pub fn new(max_events: usize) -> ProgressEventStore {
        ProgressEventStore {
            max_events,
            inner: Mutex::new(ProgressEventStoreInner {
                events: Vec::new(),
                active_tasks: std::collections::HashSet::new(),
            }),
        }
    }

    pub fn record(&self, event: DomainEvent) {
        let mut inner = self.inner.lock().unwrap();
        let kind = event.event_type.strip_prefix("progress.").unwrap_or(&event.event_type).to_string();
        let task_id = event.payload.get("task_id").and_then(Value::as_str).unwrap_or("").to_string();

        if kind == "start" {
            if inner.active_tasks.is_empty() {
                inner.events.clear();
            }
            if !task_id.is_empty() {
                inner.active_tasks.insert(task_id.clone());
            }
        } else if kind == "finish" && !task_id.is_empty() {
            inner.active_tasks.remove(&task_id);
        }

        inner.events.push(event);
        if inner.events.len() > self.max_events {
            let overflow = inner.events.len() - self.max_events;
            inner.events.drain(0..overflow);
        }
    }

    pub fn snapshot(&self) -> Vec<DomainEvent> {
        self.inner.lock().unwrap().events.clone()
    }

    /// Returns events recorded since `cursor`, plus the cursor to pass next
    /// time. An out-of-range cursor (stale client, restarted store) resets
    /// to the beginning rather than erroring.
    pub fn read_since(&self, cursor: usize) -> (Vec<DomainEvent>, usize) {
        let inner = self.inner.lock().unwrap();
        let total = inner.events.len();
        let cursor = if cursor > total { 0 } else { cursor };
        (inner.events[cursor..].to_vec(), total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reporter_publishes_a_start_and_finish_event() {
        let events = Arc::new(EventBus::default());
        let mut sub = events.subscribe(None);
        let reporter = ProgressReporter::new(events);

        reporter.start_task("t1", "edit", Some(3), None);
        reporter.advance("t1", 1);
        reporter.finish("t1", true, None);

        let received = futures::executor::block_on(sub.poll(10));
        assert_eq!(received.len(), 3);
        assert_eq!(received[0].event_type, "progress.start");
        assert_eq!(received[2].event_type, "progress.finish");
    }

    #[test]
    fn store_clears_backlog_when_a_new_task_starts_from_idle() {
        let store = ProgressEventStore::new(500);
        store.record(DomainEvent::new("progress.start", serde_json::from_value(json!({"task_id": "a"})).unwrap()));
        store.record(DomainEvent::new("progress.finish", serde_json::from_value(json!({"task_id": "a"})).unwrap()));
        store.record(DomainEvent::new("progress.start", serde_json::from_value(json!({"task_id": "b"})).unwrap()));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].payload.get("task_id").unwrap(), "b");
    }

    #[test]
    fn read_since_resets_an_out_of_range_cursor() {
        let store = ProgressEventStore::new(500);
        store.record(DomainEvent::new("progress.advance", Map::new()));
        let (events, cursor) = store.read_since(99);
        assert_eq!(events.len(), 1);
        assert_eq!(cursor, 1);
    }
}
