//! Domain events: the dotted-name, structured-payload objects published on
//! the event bus. Grounded on the source's `domain/events/` package, one
//! `DomainEvent` base class with past-tense subclasses carrying their own
//! `EVENT_TYPE`; here a single struct plays both roles, with a payload map
//! in place of per-class fields, since the bus (§4.I) is itself
//! string-keyed and untyped at its boundary.
//!
//! Event type strings follow the specification's naming exactly (no
//! `domain.` prefix, unlike the source) since §6 fixes these names as the
//! wire contract.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use uuid::Uuid;

/// All event type names named in the specification (§6), grouped by topic.
pub mod event_type {
    pub const RECORDING_STARTED: &str = "recording.started";
    pub const RECORDING_PAUSED: &str = "recording.paused";
    pub const RECORDING_RESUMED: &str = "recording.resumed";
    pub const RECORDING_STOPPED: &str = "recording.stopped";
    pub const RECORDING_CANCELLED: &str = "recording.cancelled";
    pub const RECORDING_METADATA_UPDATED: &str = "recording.metadata_updated";
    pub const POWER_OFF_DETECTED: &str = "recording.power_off_detected";

    pub const ASSET_RECORDED_SAVED: &str = "asset.recorded.saved";
    pub const ASSET_RECORDED_DELETED: &str = "asset.recorded.deleted";
    pub const ASSET_RECORDED_METADATA_UPDATED: &str = "asset.recorded.metadata_updated";
    pub const ASSET_RECORDED_SUBTITLE_UPDATED: &str = "asset.recorded.subtitle_updated";
    pub const ASSET_EDITED_SAVED: &str = "asset.edited.saved";
    pub const ASSET_EDITED_DELETED: &str = "asset.edited.deleted";

    pub const BATTLE_MATCHING_STARTED: &str = "battle.matching_started";
    pub const BATTLE_STARTED: &str = "battle.started";
    pub const BATTLE_INTERRUPTED: &str = "battle.interrupted";
    pub const BATTLE_FINISHED: &str = "battle.finished";
    pub const BATTLE_RESULT_DETECTED: &str = "battle.result_detected";
    pub const BATTLE_WEAPONS_DETECTED: &str = "battle.weapons_detected";
    pub const BATTLE_SCHEDULE_CHANGED: &str = "battle.schedule_changed";

    pub const SPEECH_LISTENING: &str = "speech.listening";
    pub const SPEECH_RECOGNIZED: &str = "speech.recognized";

    pub const PROGRESS_START: &str = "progress.start";
    pub const PROGRESS_TOTAL: &str = "progress.total";
    pub const PROGRESS_STAGE: &str = "progress.stage";
    pub const PROGRESS_ADVANCE: &str = "progress.advance";
    pub const PROGRESS_FINISH: &str = "progress.finish";
    pub const PROGRESS_ITEMS: &str = "progress.items";
    pub const PROGRESS_ITEM_STAGE: &str = "progress.item_stage";
    pub const PROGRESS_ITEM_FINISH: &str = "progress.item_finish";

    pub const PROCESS_EDIT_UPLOAD_COMPLETED: &str = "process.edit_upload_completed";
    pub const PROCESS_PENDING: &str = "process.pending";
    pub const PROCESS_STARTED: &str = "process.started";
    pub const PROCESS_SLEEP_PENDING: &str = "process.sleep.pending";
    pub const PROCESS_SLEEP_STARTED: &str = "process.sleep.started";
}

/// A published domain event: a dotted `event_type`, a freeform payload, and
/// the identity/correlation metadata every event carries regardless of kind.
#[derive(Debug, Clone)]
pub struct DomainEvent {
    pub event_type: String,
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub aggregate_id: Option<String>,
    pub correlation_id: Option<String>,
    pub payload: Map<String, Value>,
}

impl DomainEvent {
    pub fn new(event_type: impl Into<String>, payload: Map<String, Value>) -> Self {
        DomainEvent {
            event_type: event_type.into(),
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            aggregate_id: None,
            correlation_id: None,
            payload,
        }
    }

    pub fn with_aggregate_id(mut self, id: impl Into<String>) -> Self {
        self.aggregate_id = Some(id.into());
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }
}

fn obj(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Factory functions for each named event in §6, one per wire name, so
/// producers cannot typo a payload key or forget a required field.
pub mod build {
    use super::*;

    pub fn recording_started(session_id: &str, game_mode: &str, rate: Option<&str>) -> DomainEvent {
        DomainEvent::new(
            event_type::RECORDING_STARTED,
            obj(json!({ "session_id": session_id, "game_mode": game_mode, "rate": rate })),
        )
    }

    pub fn recording_paused(session_id: &str, reason: Option<&str>) -> DomainEvent {
        DomainEvent::new(
            event_type::RECORDING_PAUSED,
            obj(json!({ "session_id": session_id, "reason": reason })),
        )
    }

    pub fn recording_resumed(session_id: &str) -> DomainEvent {
        DomainEvent::new(event_type::RECORDING_RESUMED, obj(json!({ "session_id": session_id })))
    }

    pub fn recording_stopped(
        session_id: &str,
        video_asset_id: Option<&str>,
        duration_seconds: Option<f64>,
    ) -> DomainEvent {
        DomainEvent::new(
            event_type::RECORDING_STOPPED,
            obj(json!({
                "session_id": session_id,
                "video_asset_id": video_asset_id,
                "duration_seconds": duration_seconds,
            })),
        )
    }

    pub fn recording_cancelled(session_id: &str, reason: Option<&str>) -> DomainEvent {
        DomainEvent::new(
            event_type::RECORDING_CANCELLED,
            obj(json!({ "session_id": session_id, "reason": reason })),
        )
    }

    pub fn recording_metadata_updated(metadata: &std::collections::BTreeMap<String, String>) -> DomainEvent {
        DomainEvent::new(event_type::RECORDING_METADATA_UPDATED, obj(json!({ "metadata": metadata })))
    }

    pub fn power_off_detected(consecutive_count: u32, threshold: u32, is_final: bool) -> DomainEvent {
        DomainEvent::new(
            event_type::POWER_OFF_DETECTED,
            obj(json!({
                "consecutive_count": consecutive_count,
                "threshold": threshold,
                "final": is_final,
            })),
        )
    }

    pub fn asset_recorded_saved(video: &str, has_subtitle: bool, has_thumbnail: bool, started_at: Option<&str>) -> DomainEvent {
        DomainEvent::new(
            event_type::ASSET_RECORDED_SAVED,
            obj(json!({
                "video": video,
                "has_subtitle": has_subtitle,
                "has_thumbnail": has_thumbnail,
                "started_at": started_at,
            })),
        )
    }

    pub fn asset_recorded_deleted(video: &str) -> DomainEvent {
        DomainEvent::new(event_type::ASSET_RECORDED_DELETED, obj(json!({ "video": video })))
    }

    pub fn asset_recorded_metadata_updated(video: &str) -> DomainEvent {
        DomainEvent::new(event_type::ASSET_RECORDED_METADATA_UPDATED, obj(json!({ "video": video })))
    }

    pub fn asset_recorded_subtitle_updated(video: &str) -> DomainEvent {
        DomainEvent::new(event_type::ASSET_RECORDED_SUBTITLE_UPDATED, obj(json!({ "video": video })))
    }

    pub fn asset_edited_saved(video: &str) -> DomainEvent {
        DomainEvent::new(event_type::ASSET_EDITED_SAVED, obj(json!({ "video": video })))
    }

    pub fn asset_edited_deleted(video: &str) -> DomainEvent {
        DomainEvent::new(event_type::ASSET_EDITED_DELETED, obj(json!({ "video": video })))
    }

    pub fn battle_matching_started(game_mode: &str, rate: Option<&str>) -> DomainEvent {
        DomainEvent::new(
            event_type::BATTLE_MATCHING_STARTED,
            obj(json!({ "game_mode": game_mode, "rate": rate })),
        )
    }

    pub fn battle_started(game_mode: &str, rate: Option<&str>, stage_name: Option<&str>) -> DomainEvent {
        DomainEvent::new(
            event_type::BATTLE_STARTED,
            obj(json!({ "game_mode": game_mode, "rate": rate, "stage_name": stage_name })),
        )
    }

    pub fn battle_interrupted(reason: &str) -> DomainEvent {
        DomainEvent::new(event_type::BATTLE_INTERRUPTED, obj(json!({ "reason": reason })))
    }

    pub fn battle_finished(duration_seconds: Option<f64>) -> DomainEvent {
        DomainEvent::new(event_type::BATTLE_FINISHED, obj(json!({ "duration_seconds": duration_seconds })))
    }

    pub fn battle_result_detected(result: &str) -> DomainEvent {
        DomainEvent::new(event_type::BATTLE_RESULT_DETECTED, obj(json!({ "result": result })))
    }

    pub fn battle_weapons_detected(
        allies: &[String],
        enemies: &[String],
        elapsed_seconds: f64,
        attempt: u32,
        is_final: bool,
        unmatched_output_dir: Option<&str>,
    ) -> DomainEvent {
        DomainEvent::new(
            event_type::BATTLE_WEAPONS_DETECTED,
            obj(json!({
                "allies": allies,
                "enemies": enemies,
                "elapsed_seconds": elapsed_seconds,
                "attempt": attempt,
                "is_final": is_final,
                "unmatched_output_dir": unmatched_output_dir,
            })),
        )
    }

    pub fn battle_schedule_changed() -> DomainEvent {
        DomainEvent::new(event_type::BATTLE_SCHEDULE_CHANGED, Map::new())
    }

    pub fn speech_listening() -> DomainEvent {
        DomainEvent::new(event_type::SPEECH_LISTENING, Map::new())
    }

    pub fn speech_recognized(text: &str, start_seconds: f64, end_seconds: f64) -> DomainEvent {
        DomainEvent::new(
            event_type::SPEECH_RECOGNIZED,
            obj(json!({ "text": text, "start_seconds": start_seconds, "end_seconds": end_seconds })),
        )
    }

    pub fn edit_upload_completed(success: bool, message: &str, trigger: &str) -> DomainEvent {
        DomainEvent::new(
            event_type::PROCESS_EDIT_UPLOAD_COMPLETED,
            obj(json!({ "success": success, "message": message, "trigger": trigger })),
        )
    }

    pub fn process_pending(timeout_seconds: f64, message: &str) -> DomainEvent {
        DomainEvent::new(
            event_type::PROCESS_PENDING,
            obj(json!({ "timeout_seconds": timeout_seconds, "message": message })),
        )
    }

    pub fn process_started() -> DomainEvent {
        DomainEvent::new(event_type::PROCESS_STARTED, Map::new())
    }

    pub fn auto_sleep_pending(timeout_seconds: f64, message: &str) -> DomainEvent {
        DomainEvent::new(
            event_type::PROCESS_SLEEP_PENDING,
            obj(json!({ "timeout_seconds": timeout_seconds, "message": message })),
        )
    }

    pub fn auto_sleep_started() -> DomainEvent {
        DomainEvent::new(event_type::PROCESS_SLEEP_STARTED, Map::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_names_match_specification() {
        assert_eq!(event_type::RECORDING_STARTED, "recording.started");
        assert_eq!(event_type::ASSET_RECORDED_SAVED, "asset.recorded.saved");
        assert_eq!(event_type::PROCESS_SLEEP_PENDING, "process.sleep.pending");
    }

    #[test]
    fn power_off_detected_carries_final_flag() {
        let event = build::power_off_detected(6, 6, true);
        assert_eq!(event.payload.get("final").unwrap(), &Value::Bool(true));
    }
}
