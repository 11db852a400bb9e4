//! Setup/system-check state (module N): an immutable, ordered multi-step
//! setup state plus a system-check that verifies every external tool this
//! crate depends on before the recording pipeline is allowed to start.
//! Grounded on the source's `SetupState`/`SetupStep` domain model; each
//! mutator returns a new `SetupState` rather than mutating in place, the
//! same immutable-value style already used by [`crate::domain::metadata`].

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SetupStep {
    HardwareCheck,
    FfmpegSetup,
    ObsSetup,
    TesseractSetup,
    FontInstallation,
    YoutubeSetup,
}

impl SetupStep {
    pub const ALL: [SetupStep; 6] = [
        SetupStep::HardwareCheck,
        SetupStep::FfmpegSetup,
        SetupStep::ObsSetup,
        SetupStep::TesseractSetup,
        SetupStep::FontInstallation,
        SetupStep::YoutubeSetup,
    ];

    pub fn next(self) -> Option<SetupStep> {
        let index = Self::ALL.iter().position(|s| *s == self)?;
        Self::ALL.get(index + 1).copied()
    }

    pub fn previous(self) -> Option<SetupStep> {
        let index = Self::ALL.iter().position(|s| *s == self)?;
        index.checked_sub(1).map(|i| Self::ALL[i])
    }

    pub fn display_name(self) -> &'static str {
        match self {
            SetupStep::HardwareCheck => "Hardware check",
            SetupStep::FfmpegSetup => "ffmpeg setup",
            SetupStep::ObsSetup => "OBS setup",
            SetupStep::TesseractSetup => "Tesseract setup",
            SetupStep::FontInstallation => "Font installation",
            SetupStep::YoutubeSetup => "YouTube API setup",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SetupState {
    pub is_completed: bool,
    pub current_step: SetupStep,
    pub completed_steps: HashSet<SetupStep>,
    pub skipped_steps: HashSet<SetupStep>,
    pub step_details: BTreeMap<SetupStep, BTreeMap<String, bool>>,
    pub installation_date: Option<chrono::DateTime<chrono::Utc>>,
}

impl Default for SetupStep {
    fn default() -> SetupStep {
        SetupStep::HardwareCheck
    }
}

impl SetupState {
    pub fn mark_step_completed(&self, step: SetupStep) -> SetupState {
        if self.completed_steps.contains(&step) {
            return self.clone();
        }
        let mut next = self.clone();
        next.completed_steps.insert(step);
        next.skipped_steps.remove(&step);
        next
    }

    pub fn mark_step_skipped(&self, step: SetupStep) -> SetupState {
        if self.skipped_steps.contains(&step) {
            return self.clone();
        }
        let mut next = self.clone();
        next.skipped_steps.insert(step);
        next.completed_steps.remove(&step);
        next
    }

    pub fn is_step_completed(&self, step: SetupStep) -> bool {
        self.completed_steps.contains(&step)
    }

    pub fn is_step_skipped(&self, step: SetupStep) -> bool {
        self.skipped_steps.contains(&step)
    }

    pub fn mark_substep_completed(&self, step: SetupStep, substep_id: &str, completed: bool) -> SetupState {
        let mut next = self.clone();
        next.step_details.entry(step).or_default().insert(substep_id.to_string(), completed);
        next
    }

    pub fn is_substep_completed(&self, step: SetupStep, substep_id: &str) -> bool {
        self.step_details.get(&step).and_then(|d| d.get(substep_id)).copied().unwrap_or(false)
    }

    pub fn can_proceed_to_next_step(&self) -> bool {
        self.is_step_completed(self.current_step) || self.is_step_skipped(self.current_step)
    }

    /// Advances to the next step, or completes setup if `current_step` was
    /// the last one. Returns `self` unchanged if the current step is
    /// neither completed nor skipped yet.
    pub fn proceed_to_next_step(&self) -> (bool, SetupState) {
        if !self.can_proceed_to_next_step() {
            return (false, self.clone());
        }
        match self.current_step.next() {
            Some(next_step) => {
                let mut next = self.clone();
                next.current_step = next_step;
                (true, next)
            }
            None => (true, self.complete_installation()),
        }
    }

    pub fn go_back_to_previous_step(&self) -> (bool, SetupState) {
        match self.current_step.previous() {
            Some(previous) => {
                let mut next = self.clone();
                next.current_step = previous;
                (true, next)
            }
            None => (false, self.clone()),
        }
    }

    pub fn complete_installation(&self) -> SetupState {
        let mut next = self.clone();
        next.is_completed = true;
        next.installation_date = Some(chrono::Utc::now());
        next
    }

    pub fn progress_percentage(&self) -> f64 {
        let total = SetupStep::ALL.len();
        if total == 0 {
            return 100.0;
        }
        let processed = self.completed_steps.len() + self.skipped_steps.len();
        (processed as f64 / total as f64) * 100.0
    }

    pub fn remaining_steps(&self) -> Vec<SetupStep> {
        SetupStep::ALL
            .into_iter()
            .filter(|step| !self.completed_steps.contains(step) && !self.skipped_steps.contains(step))
            .collect()
    }

    pub fn is_consistent(&self) -> bool {
        if !self.completed_steps.is_disjoint(&self.skipped_steps) {
            return false;
        }
        if self.is_completed && self.installation_date.is_none() {
            return false;
        }
        true
    }
}

/// Result of probing one external dependency (§2 module N: "verifies
/// presence of external tools").
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: &'static str,
    pub present: bool,
    pub detail: Option<String>,
}

/// Runs the dependency checks module N is responsible for before the
/// recording pipeline may start: the recorder's executable, ffmpeg (used by
/// the editor port's concrete adapter), an OCR backend, the font the
/// thumbnail compositor needs, and the YouTube client secret file. Grounded
/// on the source's `SystemCheckService`, which delegates each software
/// check to a `SoftwareChecker` strategy and checks the font/credential
/// files by fixed name under a configured directory; the PATH probe here
/// plays the `SoftwareChecker` role since there is no process-spawning
/// checker abstraction in this crate.
pub struct SystemCheckService {
    obs_executable: Option<std::path::PathBuf>,
    thumbnail_assets_dir: Option<std::path::PathBuf>,
    config_dir: Option<std::path::PathBuf>,
}

const FONT_NAME: &str = "ikamodoki1";
const YOUTUBE_CREDENTIALS_FILE: &str = "client_secret.json";

impl SystemCheckService {
    pub fn new(
        obs_executable: Option<std::path::PathBuf>,
        thumbnail_assets_dir: Option<std::path::PathBuf>,
        config_dir: Option<std::path::PathBuf>,
    ) -> SystemCheckService {
        SystemCheckService { obs_executable, thumbnail_assets_dir, config_dir }
    }

    pub fn check_hardware(&self) -> CheckResult {
        CheckResult { name: "hardware", present: true, detail: None }
    }

    pub fn check_ffmpeg(&self) -> CheckResult {
        let present = which("ffmpeg");
        CheckResult { name: "ffmpeg", present, detail: (!present).then(|| "ffmpeg not found on PATH".to_string()) }
    }

    pub fn check_obs(&self) -> CheckResult {
        let present = match &self.obs_executable {
            Some(path) => path.exists(),
            None => which("obs"),
        };
        CheckResult { name: "obs", present, detail: (!present).then(|| "OBS executable not found".to_string()) }
    }

    pub fn check_tesseract(&self) -> CheckResult {
        let present = which("tesseract");
        CheckResult { name: "tesseract", present, detail: (!present).then(|| "tesseract not found on PATH".to_string()) }
    }

    pub fn check_font(&self) -> CheckResult {
        let font_path = self.thumbnail_assets_dir.as_ref().map(|dir| dir.join(format!("{FONT_NAME}.ttf")));
        let present = font_path.as_deref().is_some_and(Path::exists);
        CheckResult { name: "font", present, detail: (!present).then(|| format!("{FONT_NAME}.ttf not found")) }
    }

    pub fn check_youtube_credentials(&self) -> CheckResult {
        let credentials_path = self.config_dir.as_ref().map(|dir| dir.join(YOUTUBE_CREDENTIALS_FILE));
        let present = credentials_path.as_deref().is_some_and(Path::exists);
        CheckResult { name: "youtube_credentials", present, detail: (!present).then(|| "YouTube client secret file not found".to_string()) }
    }

    pub fn run_all(&self) -> Vec<CheckResult> {
        vec![
            self.check_hardware(),
            self.check_ffmpeg(),
            self.check_obs(),
            self.check_tesseract(),
            self.check_font(),
            self.check_youtube_credentials(),
        ]
    }
}

fn which(executable: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(executable).exists()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proceeding_requires_the_current_step_to_be_resolved() {
        let state = SetupState::default();
        let (advanced, state) = state.proceed_to_next_step();
        assert!(!advanced);
        assert_eq!(state.current_step, SetupStep::HardwareCheck);
    }

    #[test]
    fn completing_the_last_step_marks_setup_complete() {
        let mut state = SetupState::default();
        for step in SetupStep::ALL {
            state = state.mark_step_completed(step);
            state.current_step = step;
            let (advanced, next) = state.proceed_to_next_step();
            assert!(advanced);
            state = next;
        }
        assert!(state.is_completed);
        assert!(state.installation_date.is_some());
    }

    #[test]
    fn marking_completed_clears_a_prior_skip() {
        let state = SetupState::default().mark_step_skipped(SetupStep::FfmpegSetup);
        let state = state.mark_step_completed(SetupStep::FfmpegSetup);
        assert!(state.is_step_completed(SetupStep::FfmpegSetup));
        assert!(!state.is_step_skipped(SetupStep::FfmpegSetup));
    }

    #[test]
    fn inconsistent_when_completed_without_a_date() {
        let mut state = SetupState::default();
        state.is_completed = true;
        assert!(!state.is_consistent());
    }
}
