//! Phase handlers (§4.E): pure-ish per-`RecordState` policies. Each takes the
//! current frame, state, and context and decides what the session service
//! should do next. Side effects (recorder calls, event emission) belong to
//! the use case that drives these, not to the handlers themselves.

use crate::analyzer::FrameAnalyzer;
use crate::domain::state_machine::RecordState;
use crate::ports::WeaponRecognizer;
use crate::recording::commands::{RecordingAction, RecordingCommand};
use crate::recording::context::RecordingContext;
use crate::recording::merger::MetadataMerger;
use chrono::{DateTime, Utc};

/// A battle that has run this long is force-stopped regardless of whether a
/// finish was ever detected (§4.E RECORDING "cap at ten minutes").
const MAX_BATTLE_DURATION_SECS: i64 = 600;
/// Session-abort is only honored in the opening seconds of a battle, so a
/// brief false-positive mid-match connection blip doesn't cancel a real one.
const ABORT_GRACE_PERIOD_SECS: i64 = 60;

#[allow(clippy::too_many_arguments)]
pub async fn handle(
    state: RecordState,
    frame: &crate::domain::frame::Frame,
    context: RecordingContext,
    analyzer: &FrameAnalyzer,
    merger: &MetadataMerger,
    weapon_recognizer: &dyn WeaponRecognizer,
    now: DateTime<Utc>,
) -> RecordingCommand {
    match state {
        RecordState::Stopped => handle_stopped(frame, context, analyzer, merger).await,
        RecordState::Matching => handle_matching(frame, context, analyzer).await,
        RecordState::Recording => handle_recording(frame, context, analyzer, weapon_recognizer, now).await,
        RecordState::Paused => handle_paused(frame, context, analyzer).await,
        RecordState::Finishing | RecordState::Stopping => RecordingCommand::none(context),
    }
}

async fn handle_stopped(frame: &crate::domain::frame::Frame, mut context: RecordingContext, analyzer: &FrameAnalyzer, merger: &MetadataMerger) -> RecordingCommand {
    if let Some(rate) = analyzer.extract_rate(frame).await {
        let mut auto_update = context.metadata.clone();
        auto_update.rate = Some(rate);
        context.metadata = merger.merge_with_auto_update(&context.base_metadata, &auto_update, &context.metadata, &context.manual_fields);
        context.base_metadata = context.metadata.clone();
    }

    if analyzer.detect_schedule_change(frame).await {
        return RecordingCommand::with_reason(RecordingAction::None, context, "schedule changed while idle");
    }

    if analyzer.detect_matching_start(frame).await {
        return RecordingCommand::action(RecordingAction::Start, context);
    }

    RecordingCommand::none(context)
}

async fn handle_matching(frame: &crate::domain::frame::Frame, mut context: RecordingContext, analyzer: &FrameAnalyzer) -> RecordingCommand {
    if analyzer.detect_schedule_change(frame).await {
        return RecordingCommand::with_reason(RecordingAction::CancelAndResetMetadata, context, "schedule changed while matching");
    }

    if analyzer.detect_session_start(frame, context.metadata.game_mode).await {
        context.battle_started_at = Some(Utc::now());
        return RecordingCommand::action(RecordingAction::Start, context);
    }

    RecordingCommand::none(context)
}

async fn handle_recording(
    frame: &crate::domain::frame::Frame,
    mut context: RecordingContext,
    analyzer: &FrameAnalyzer,
    weapon_recognizer: &dyn WeaponRecognizer,
    now: DateTime<Utc>,
) -> RecordingCommand {
    let elapsed = context.elapsed_since_battle_start(now).unwrap_or_else(chrono::Duration::zero);

    if elapsed <= chrono::Duration::seconds(ABORT_GRACE_PERIOD_SECS) && analyzer.detect_session_abort(frame).await {
        return RecordingCommand::with_reason(RecordingAction::Cancel, context, "session aborted shortly after start");
    }

    if elapsed >= chrono::Duration::seconds(MAX_BATTLE_DURATION_SECS) {
        return RecordingCommand::with_reason(RecordingAction::Stop, context, "battle exceeded maximum duration");
    }

    if analyzer.detect_session_finish(frame).await {
        context.finish_detected = true;
        return RecordingCommand::action(RecordingAction::Pause, context);
    }

    if analyzer.detect_communication_error(frame).await {
        return RecordingCommand::with_reason(RecordingAction::Cancel, context, "communication error detected");
    }

    let events = crate::recording::weapon_detection::run(frame, &mut context, weapon_recognizer, now).await;
    RecordingCommand::none(context).with_events(events)
}

async fn handle_paused(frame: &crate::domain::frame::Frame, mut context: RecordingContext, analyzer: &FrameAnalyzer) -> RecordingCommand {
    if context.finish_detected && !context.judgement_captured {
        if let Some(judgement) = analyzer.extract_session_judgement(frame).await {
            context.metadata.judgement = Some(judgement);
            context.judgement_captured = true;
        }
        return RecordingCommand::none(context);
    }

    if analyzer.detect_session_result(frame).await {
        context.result_frame = Some(frame.clone());
        return RecordingCommand::action(RecordingAction::Stop, context);
    }

    if analyzer.detect_loading_end(frame).await {
        return if context.metadata.result.is_none() {
            RecordingCommand::with_reason(RecordingAction::Resume, context, "loading ended without a result, resuming")
        } else {
            RecordingCommand::action(RecordingAction::Stop, context)
        };
    }

    RecordingCommand::none(context)
}
