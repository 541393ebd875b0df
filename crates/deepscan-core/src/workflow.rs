//! Analysis workflow state machine.
//!
//! ```text
//! Idle --select--> FileSelected --analyze--> Analyzing --success--> Succeeded --reset--> Idle
//!                  FileSelected --remove--> Idle      Analyzing --failure--> Failed --reset--> Idle
//! ```
//!
//! Every analysis run gets a generation number. Progress and terminal events
//! carry the generation they belong to; events for any other generation are
//! dropped, so nothing from a cancelled run can land after a reset.

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::models::{AnalysisResult, MediaFile};

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowState {
    Idle,
    FileSelected(MediaFile),
    Analyzing { file: MediaFile, progress: u8 },
    Succeeded(AnalysisResult),
    Failed { file: MediaFile, error: String },
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::FileSelected(_) => "file_selected",
            WorkflowState::Analyzing { .. } => "analyzing",
            WorkflowState::Succeeded(_) => "succeeded",
            WorkflowState::Failed { .. } => "failed",
        }
    }

    pub fn is_analyzing(&self) -> bool {
        matches!(self, WorkflowState::Analyzing { .. })
    }

    pub fn progress(&self) -> Option<u8> {
        match self {
            WorkflowState::Analyzing { progress, .. } => Some(*progress),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            WorkflowState::Succeeded(result) => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            WorkflowState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// The file the state refers to, if any.
    pub fn file(&self) -> Option<&MediaFile> {
        match self {
            WorkflowState::FileSelected(file)
            | WorkflowState::Analyzing { file, .. }
            | WorkflowState::Failed { file, .. } => Some(file),
            WorkflowState::Idle | WorkflowState::Succeeded(_) => None,
        }
    }
}

impl Display for WorkflowState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("No file selected for analysis")]
    NoFileStaged,

    #[error("An analysis is already in progress")]
    AnalysisInProgress,

    #[error("Only video files (mp4/mov/avi) are supported.")]
    UnsupportedType,

    #[error("Cannot {event} while {state}")]
    InvalidTransition {
        event: &'static str,
        state: &'static str,
    },
}

/// Handle for one analysis run, returned by [`Workflow::begin_analysis`].
#[derive(Debug, Clone)]
pub struct AnalysisRun {
    pub generation: u64,
    pub file: MediaFile,
}

#[derive(Debug, Clone)]
pub struct Workflow {
    state: WorkflowState,
    require_video: bool,
    generation: u64,
}

impl Workflow {
    pub fn new(require_video: bool) -> Self {
        Self {
            state: WorkflowState::Idle,
            require_video,
            generation: 0,
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    /// Generation of the most recent run.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Stage a file. Replaces a staged file and clears a previous result or error.
    pub fn select(&mut self, file: MediaFile) -> Result<(), WorkflowError> {
        if self.state.is_analyzing() {
            return Err(WorkflowError::AnalysisInProgress);
        }
        self.state = WorkflowState::FileSelected(file);
        Ok(())
    }

    /// Drop the staged file. A no-op when idle.
    pub fn remove(&mut self) -> Result<(), WorkflowError> {
        match self.state {
            WorkflowState::Idle => Ok(()),
            WorkflowState::FileSelected(_) | WorkflowState::Failed { .. } => {
                self.state = WorkflowState::Idle;
                Ok(())
            }
            WorkflowState::Analyzing { .. } => Err(WorkflowError::AnalysisInProgress),
            WorkflowState::Succeeded(_) => Err(WorkflowError::InvalidTransition {
                event: "remove",
                state: self.state.name(),
            }),
        }
    }

    /// Move `FileSelected` to `Analyzing` and hand out the run handle.
    pub fn begin_analysis(&mut self) -> Result<AnalysisRun, WorkflowError> {
        let file = match &self.state {
            WorkflowState::FileSelected(file) => file.clone(),
            WorkflowState::Analyzing { .. } => return Err(WorkflowError::AnalysisInProgress),
            _ => return Err(WorkflowError::NoFileStaged),
        };

        if self.require_video && !file.is_video() {
            return Err(WorkflowError::UnsupportedType);
        }

        self.generation += 1;
        self.state = WorkflowState::Analyzing {
            file: file.clone(),
            progress: 0,
        };

        Ok(AnalysisRun {
            generation: self.generation,
            file,
        })
    }

    /// Record upload progress. Returns whether the displayed percentage changed.
    ///
    /// Values are clamped to 100 and never move backwards.
    pub fn progress(&mut self, generation: u64, percent: u8) -> bool {
        if generation != self.generation {
            return false;
        }
        match &mut self.state {
            WorkflowState::Analyzing { progress, .. } => {
                let percent = percent.min(100);
                if percent > *progress {
                    *progress = percent;
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }

    /// Terminal success for run `generation`. Returns whether it was applied.
    pub fn succeed(&mut self, generation: u64, result: AnalysisResult) -> bool {
        if generation != self.generation || !self.state.is_analyzing() {
            return false;
        }
        self.state = WorkflowState::Succeeded(result);
        true
    }

    /// Terminal failure for run `generation`. Returns whether it was applied.
    pub fn fail(&mut self, generation: u64, error: impl Into<String>) -> bool {
        if generation != self.generation {
            return false;
        }
        let state = std::mem::replace(&mut self.state, WorkflowState::Idle);
        match state {
            WorkflowState::Analyzing { file, .. } => {
                self.state = WorkflowState::Failed {
                    file,
                    error: error.into(),
                };
                true
            }
            other => {
                self.state = other;
                false
            }
        }
    }

    /// Return to `Idle` from any state. Resetting mid-run retires that run's generation.
    pub fn reset(&mut self) {
        if self.state.is_analyzing() {
            self.generation += 1;
        }
        self.state = WorkflowState::Idle;
    }
}

impl Default for Workflow {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalysisBreakdown, AnalysisId, MediaCandidate, Prediction};
    use crate::validation::UploadPolicy;
    use bytes::Bytes;

    fn video() -> MediaFile {
        UploadPolicy::media()
            .validate(MediaCandidate::new(
                "interview.mp4",
                "video/mp4",
                Bytes::from_static(b"frames"),
            ))
            .unwrap()
    }

    fn image() -> MediaFile {
        UploadPolicy::media()
            .validate(MediaCandidate::new(
                "face.png",
                "image/png",
                Bytes::from_static(b"pixels"),
            ))
            .unwrap()
    }

    fn result_for(file: &MediaFile) -> AnalysisResult {
        AnalysisResult::new(
            AnalysisId(1),
            file,
            Prediction::Fake,
            0.9,
            AnalysisBreakdown::new(),
        )
    }

    #[test]
    fn test_happy_path() {
        let mut wf = Workflow::default();
        assert_eq!(wf.state(), &WorkflowState::Idle);

        wf.select(video()).unwrap();
        assert_eq!(wf.state().name(), "file_selected");

        let run = wf.begin_analysis().unwrap();
        assert_eq!(wf.state().progress(), Some(0));

        assert!(wf.progress(run.generation, 40));
        assert_eq!(wf.state().progress(), Some(40));

        assert!(wf.succeed(run.generation, result_for(&run.file)));
        assert_eq!(wf.state().result().unwrap().prediction, Prediction::Fake);

        wf.reset();
        assert_eq!(wf.state(), &WorkflowState::Idle);
    }

    #[test]
    fn test_failure_then_reset() {
        let mut wf = Workflow::default();
        wf.select(video()).unwrap();
        let run = wf.begin_analysis().unwrap();
        assert!(wf.fail(run.generation, "Model not loaded"));
        assert_eq!(wf.state().error(), Some("Model not loaded"));
        assert_eq!(wf.state().file().unwrap().name(), "interview.mp4");

        wf.reset();
        assert_eq!(wf.state(), &WorkflowState::Idle);
    }

    #[test]
    fn test_analyze_without_file_is_rejected() {
        let mut wf = Workflow::default();
        assert_eq!(wf.begin_analysis().unwrap_err(), WorkflowError::NoFileStaged);
        assert_eq!(wf.state(), &WorkflowState::Idle);
    }

    #[test]
    fn test_reentrant_analyze_is_rejected() {
        let mut wf = Workflow::default();
        wf.select(video()).unwrap();
        let run = wf.begin_analysis().unwrap();
        assert_eq!(
            wf.begin_analysis().unwrap_err(),
            WorkflowError::AnalysisInProgress
        );
        assert_eq!(wf.generation(), run.generation);
        assert!(wf.state().is_analyzing());
    }

    #[test]
    fn test_video_only_guard() {
        let mut wf = Workflow::new(true);
        wf.select(image()).unwrap();
        assert_eq!(
            wf.begin_analysis().unwrap_err(),
            WorkflowError::UnsupportedType
        );
        assert_eq!(wf.state().name(), "file_selected");

        wf.select(video()).unwrap();
        assert!(wf.begin_analysis().is_ok());
    }

    #[test]
    fn test_progress_is_monotonic_and_bounded() {
        let mut wf = Workflow::default();
        wf.select(video()).unwrap();
        let run = wf.begin_analysis().unwrap();

        assert!(wf.progress(run.generation, 50));
        assert!(!wf.progress(run.generation, 30));
        assert_eq!(wf.state().progress(), Some(50));
        assert!(wf.progress(run.generation, 250));
        assert_eq!(wf.state().progress(), Some(100));
    }

    #[test]
    fn test_no_progress_after_terminal() {
        let mut wf = Workflow::default();
        wf.select(video()).unwrap();
        let run = wf.begin_analysis().unwrap();
        wf.succeed(run.generation, result_for(&run.file));

        assert!(!wf.progress(run.generation, 90));
        assert!(!wf.fail(run.generation, "late"));
        assert!(wf.state().result().is_some());
    }

    #[test]
    fn test_stale_generation_is_ignored_after_reset() {
        let mut wf = Workflow::default();
        wf.select(video()).unwrap();
        let run = wf.begin_analysis().unwrap();
        wf.reset();

        assert!(!wf.progress(run.generation, 10));
        assert!(!wf.succeed(run.generation, result_for(&run.file)));
        assert_eq!(wf.state(), &WorkflowState::Idle);
    }

    #[test]
    fn test_select_and_remove_rules() {
        let mut wf = Workflow::default();
        assert!(wf.remove().is_ok());

        wf.select(video()).unwrap();
        wf.remove().unwrap();
        assert_eq!(wf.state(), &WorkflowState::Idle);

        wf.select(video()).unwrap();
        let run = wf.begin_analysis().unwrap();
        assert_eq!(wf.select(image()), Err(WorkflowError::AnalysisInProgress));
        assert_eq!(wf.remove(), Err(WorkflowError::AnalysisInProgress));

        wf.succeed(run.generation, result_for(&run.file));
        assert!(matches!(
            wf.remove(),
            Err(WorkflowError::InvalidTransition { event: "remove", .. })
        ));

        wf.select(image()).unwrap();
        assert_eq!(wf.state().file().unwrap().name(), "face.png");
    }
}
