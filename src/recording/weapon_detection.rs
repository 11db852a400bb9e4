//! Weapon detection (§4.G): a 20-second window starting at
//! `battle_started_at` during which every RECORDING frame is checked for the
//! in-battle HUD and, when visible, run through the 8-slot recognizer. Scores
//! only ever improve within a window; once every slot has a confident label
//! the window closes early. When the window expires with slots still
//! unresolved, one last high-confidence pass runs over the last frame the
//! HUD was visible on, and anything still unresolved is labeled `"unknown"`.

use crate::domain::events::{build, DomainEvent};
use crate::domain::frame::Frame;
use crate::ports::WeaponRecognizer;
use crate::recording::context::RecordingContext;
use chrono::{DateTime, Utc};

const DETECTION_WINDOW_SECONDS: f64 = 20.0;
const UNKNOWN_WEAPON_LABEL: &str = "unknown";
const SLOT_COUNT: usize = 8;
/// Replacement only happens on a strict improvement; this tolerance absorbs
/// floating-point noise between two recognizer calls returning "the same"
/// score for a slot.
const SCORE_EPSILON: f64 = 1e-12;

pub async fn run(frame: &Frame, context: &mut RecordingContext, recognizer: &dyn WeaponRecognizer, now: DateTime<Utc>) -> Vec<DomainEvent> {
    if context.weapon_detection.done {
        return Vec::new();
    }
    let Some(started_at) = context.battle_started_at else {
        return Vec::new();
    };
    let elapsed_seconds = (now - started_at).max(chrono::Duration::zero()).num_milliseconds() as f64 / 1000.0;

    if elapsed_seconds > DETECTION_WINDOW_SECONDS {
        return finalize(context, elapsed_seconds, recognizer).await;
    }

    let is_visible = match recognizer.detect_weapon_display(frame).await {
        Ok(visible) => visible,
        Err(_) => return Vec::new(),
    };
    if !is_visible {
        return Vec::new();
    }

    let recognition = match recognizer.recognize_weapons(frame, false).await {
        Ok(result) => result,
        Err(err) => {
            tracing::warn!(error = %err, "weapon recognition failed");
            return Vec::new();
        }
    };

    context.weapon_detection.attempts += 1;
    let mut labels = normalize_labels(context);
    let mut labels_changed = false;

    for (index, slot) in recognition.slot_results.iter().enumerate() {
        let previous_best = context.weapon_detection.best_scores[index];
        if slot.best_score <= previous_best + SCORE_EPSILON {
            continue;
        }
        context.weapon_detection.best_scores[index] = slot.best_score;
        if labels[index] != slot.predicted_weapon {
            labels[index] = slot.predicted_weapon.clone();
            labels_changed = true;
        }
    }

    let done = !has_unknown_slots(&labels);
    apply_labels(context, &labels);
    context.weapon_detection.done = done;
    context.weapon_detection.last_visible_frame = Some(frame.clone());

    if labels_changed || done {
        publish_updates(context, elapsed_seconds, context.weapon_detection.attempts, done, None)
    } else {
        Vec::new()
    }
}

async fn finalize(context: &mut RecordingContext, elapsed_seconds: f64, recognizer: &dyn WeaponRecognizer) -> Vec<DomainEvent> {
    let mut labels = normalize_labels(context);
    let mut unmatched_output_dir = None;

    if has_unknown_slots(&labels) {
        if let Some(last_frame) = context.weapon_detection.last_visible_frame.clone() {
            match recognizer.recognize_weapons(&last_frame, true).await {
                Ok(result) => {
                    unmatched_output_dir = result.unmatched_output_dir;
                    for (index, slot) in result.slot_results.iter().enumerate() {
                        context.weapon_detection.best_scores[index] = context.weapon_detection.best_scores[index].max(slot.best_score);
                        if !slot.is_unmatched {
                            labels[index] = slot.predicted_weapon.clone();
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "failed to save final unmatched weapon report");
                }
            }
        } else {
            tracing::info!(elapsed_seconds, "weapon HUD never seen this battle, skipping unmatched report");
        }
    }

    for (index, label) in labels.iter_mut().enumerate() {
        if !label.is_empty() {
            continue;
        }
        *label = UNKNOWN_WEAPON_LABEL.to_string();
        if context.weapon_detection.best_scores[index] < 0.0 {
            context.weapon_detection.best_scores[index] = -1.0;
        }
    }

    apply_labels(context, &labels);
    context.weapon_detection.done = true;
    context.weapon_detection.last_visible_frame = None;

    publish_updates(context, elapsed_seconds, context.weapon_detection.attempts, true, unmatched_output_dir)
}

fn publish_updates(
    context: &RecordingContext,
    elapsed_seconds: f64,
    attempts: u32,
    is_final: bool,
    unmatched_output_dir: Option<String>,
) -> Vec<DomainEvent> {
    let allies = context.metadata.allies.clone().unwrap_or_default();
    let enemies = context.metadata.enemies.clone().unwrap_or_default();
    tracing::info!(
        ?allies,
        ?enemies,
        elapsed_seconds,
        attempts,
        is_final,
        unmatched_output_dir = unmatched_output_dir.as_deref(),
        "weapon detection updated"
    );
    vec![
        build::recording_metadata_updated(&context.metadata.to_dict()),
        build::battle_weapons_detected(&allies, &enemies, elapsed_seconds, attempts, is_final, unmatched_output_dir.as_deref()),
    ]
}

/// Flattens `metadata.allies`/`.enemies` into one eight-element vector (allies
/// first), padding with empty strings so every slot has a comparable label
/// even before the first recognition pass.
fn normalize_labels(context: &RecordingContext) -> Vec<String> {
    let mut labels = Vec::with_capacity(SLOT_COUNT);
    match &context.metadata.allies {
        Some(allies) => labels.extend(allies.iter().cloned()),
        None => labels.extend(std::iter::repeat(String::new()).take(4)),
    }
    match &context.metadata.enemies {
        Some(enemies) => labels.extend(enemies.iter().cloned()),
        None => labels.extend(std::iter::repeat(String::new()).take(4)),
    }
    labels
}

fn apply_labels(context: &mut RecordingContext, labels: &[String]) {
    context.metadata.allies = Some(four(&labels[..4]));
    context.metadata.enemies = Some(four(&labels[4..]));
}

fn four(slice: &[String]) -> [String; 4] {
    [slice[0].clone(), slice[1].clone(), slice[2].clone(), slice[3].clone()]
}

fn has_unknown_slots(labels: &[String]) -> bool {
    labels.iter().any(|label| label.is_empty() || label == UNKNOWN_WEAPON_LABEL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::game_mode::GameMode;
    use crate::ports::weapon_recognizer::{SlotResult, WeaponRecognitionResult};
    use crate::recording::context::RecordingContext;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn frame() -> Frame {
        Frame::from_bgr(vec![0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0], 2, 2)
    }

    fn slot(label: &str, score: f64) -> SlotResult {
        SlotResult {
            predicted_weapon: label.to_string(),
            best_score: score,
            is_unmatched: label.is_empty(),
        }
    }

    fn full_result(score: f64) -> WeaponRecognitionResult {
        WeaponRecognitionResult {
            slot_results: [
                slot("splattershot", score),
                slot("splattershot", score),
                slot("splattershot", score),
                slot("splattershot", score),
                slot("splattershot", score),
                slot("splattershot", score),
                slot("splattershot", score),
                slot("splattershot", score),
            ],
            unmatched_output_dir: None,
        }
    }

    struct AlwaysVisible {
        score: f64,
        finalize_called: AtomicBool,
    }

    #[async_trait]
    impl WeaponRecognizer for AlwaysVisible {
        async fn detect_weapon_display(&self, _frame: &Frame) -> Result<bool, crate::error::AppError> {
            Ok(true)
        }

        async fn recognize_weapons(&self, _frame: &Frame, save_unmatched_report: bool) -> Result<WeaponRecognitionResult, crate::error::AppError> {
            if save_unmatched_report {
                self.finalize_called.store(true, Ordering::SeqCst);
            }
            Ok(full_result(self.score))
        }
    }

    fn context_mid_battle() -> RecordingContext {
        let mut context = RecordingContext::new(GameMode::Battle);
        context.battle_started_at = Some(Utc::now());
        context
    }

    #[tokio::test]
    async fn confident_recognition_closes_the_window_and_publishes_once() {
        let mut context = context_mid_battle();
        let recognizer = AlwaysVisible {
            score: 0.99,
            finalize_called: AtomicBool::new(false),
        };

        let events = run(&frame(), &mut context, &recognizer, Utc::now()).await;

        assert!(context.weapon_detection.done);
        assert_eq!(context.metadata.allies.unwrap()[0], "splattershot");
        assert_eq!(events.len(), 2);
        assert!(!recognizer.finalize_called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn lower_score_never_replaces_an_existing_label() {
        let mut context = context_mid_battle();
        let first = AlwaysVisible {
            score: 0.9,
            finalize_called: AtomicBool::new(false),
        };
        run(&frame(), &mut context, &first, Utc::now()).await;

        struct Weaker;
        #[async_trait]
        impl WeaponRecognizer for Weaker {
            async fn detect_weapon_display(&self, _frame: &Frame) -> Result<bool, crate::error::AppError> {
                Ok(true)
            }
            async fn recognize_weapons(&self, _frame: &Frame, _save_unmatched_report: bool) -> Result<WeaponRecognitionResult, crate::error::AppError> {
                let mut result = full_result(0.1);
                result.slot_results[0] = slot("charger", 0.1);
                Ok(result)
            }
        }
        context.weapon_detection.done = false;
        run(&frame(), &mut context, &Weaker, Utc::now()).await;

        assert_eq!(context.metadata.allies.unwrap()[0], "splattershot");
    }

    #[tokio::test]
    async fn window_expiry_finalizes_unresolved_slots_as_unknown() {
        let mut context = context_mid_battle();
        context.battle_started_at = Some(Utc::now() - chrono::Duration::seconds(25));
        let recognizer = AlwaysVisible {
            score: 0.5,
            finalize_called: AtomicBool::new(false),
        };

        let events = run(&frame(), &mut context, &recognizer, Utc::now()).await;

        assert!(context.weapon_detection.done);
        assert_eq!(context.metadata.allies.unwrap()[0], UNKNOWN_WEAPON_LABEL);
        assert_eq!(events.len(), 2);
        assert!(!recognizer.finalize_called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn window_expiry_with_a_prior_sighting_runs_the_final_high_confidence_pass() {
        let mut context = context_mid_battle();
        context.weapon_detection.last_visible_frame = Some(frame());
        context.battle_started_at = Some(Utc::now() - chrono::Duration::seconds(25));
        let recognizer = AlwaysVisible {
            score: 0.8,
            finalize_called: AtomicBool::new(false),
        };

        run(&frame(), &mut context, &recognizer, Utc::now()).await;

        assert!(recognizer.finalize_called.load(Ordering::SeqCst));
        assert_eq!(context.metadata.allies.unwrap()[0], "splattershot");
    }

    #[tokio::test]
    async fn done_window_is_a_no_op() {
        let mut context = context_mid_battle();
        context.weapon_detection.done = true;
        let recognizer = AlwaysVisible {
            score: 1.0,
            finalize_called: AtomicBool::new(false),
        };

        let events = run(&frame(), &mut context, &recognizer, Utc::now()).await;

        assert!(events.is_empty());
    }
}
