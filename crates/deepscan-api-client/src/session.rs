//! Analysis session: one upload slot, one workflow, one service.
//!
//! The [`Workflow`] is published through a `watch` channel so observers (the
//! CLI progress bar, tests) see every transition. Each run is tagged with the
//! workflow generation; a `reset` retires the generation and cancels the
//! in-flight call, so late progress or results from that call are dropped.

use deepscan_core::models::{AnalysisResult, MediaCandidate, MediaFile};
use deepscan_core::{
    AppError, ErrorMetadata, LogLevel, Preview, UploadControl, UploadPolicy, Workflow,
    WorkflowError, WorkflowState,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;

use crate::progress::{self, ProgressReceiver};
use crate::service::AnalysisService;

/// Token of the run currently in flight, keyed by its generation.
type ActiveRun = Option<(u64, CancellationToken)>;

pub struct AnalysisSession {
    service: Arc<dyn AnalysisService>,
    upload: Mutex<UploadControl>,
    workflow: watch::Sender<Workflow>,
    active: Mutex<ActiveRun>,
    analysis_timeout: Option<Duration>,
}

impl AnalysisSession {
    pub fn new(service: Arc<dyn AnalysisService>, policy: UploadPolicy) -> Self {
        let (workflow, _) = watch::channel(Workflow::new(policy.requires_video()));
        Self {
            service,
            upload: Mutex::new(UploadControl::new(policy)),
            workflow,
            active: Mutex::new(None),
            analysis_timeout: None,
        }
    }

    /// Fail a run that has not finished within `timeout`.
    pub fn with_analysis_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.analysis_timeout = timeout;
        self
    }

    /// Observe workflow transitions.
    pub fn subscribe(&self) -> watch::Receiver<Workflow> {
        self.workflow.subscribe()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> WorkflowState {
        self.workflow.borrow().state().clone()
    }

    pub async fn preview(&self) -> Option<Preview> {
        self.upload.lock().await.preview().cloned()
    }

    /// Validate and stage a file, replacing any previous selection or result.
    ///
    /// Rejected while an analysis is running. A validation failure keeps the
    /// previous selection and workflow state.
    pub async fn select_file(&self, candidate: MediaCandidate) -> Result<MediaFile, AppError> {
        let mut upload = self.upload.lock().await;
        if self.workflow.borrow().state().is_analyzing() {
            return Err(WorkflowError::AnalysisInProgress.into());
        }

        let file = upload.select_file(candidate)?.clone();

        let mut selected = Ok(());
        self.workflow.send_if_modified(|workflow| {
            selected = workflow.select(file.clone());
            selected.is_ok()
        });
        selected?;
        Ok(file)
    }

    /// Clear the staged file. A no-op when nothing is staged.
    pub async fn remove_file(&self) -> Result<(), AppError> {
        let mut upload = self.upload.lock().await;

        let mut removed = Ok(());
        self.workflow.send_if_modified(|workflow| {
            let before = workflow.state().name();
            removed = workflow.remove();
            removed.is_ok() && before != workflow.state().name()
        });
        removed?;

        upload.remove_file();
        Ok(())
    }

    /// Submit the staged file and wait for the verdict.
    ///
    /// Every failure, including a timeout, leaves the workflow in `Failed`
    /// with the error's client message. A `reset` during the call returns
    /// `AppError::Cancelled` and leaves the workflow `Idle`.
    pub async fn analyze(&self) -> Result<AnalysisResult, AppError> {
        let run = {
            let _upload = self.upload.lock().await;
            let mut begun = Err(WorkflowError::NoFileStaged);
            self.workflow.send_if_modified(|workflow| {
                begun = workflow.begin_analysis();
                begun.is_ok()
            });
            begun?
        };
        let generation = run.generation;

        let token = CancellationToken::new();
        {
            let mut active = self.active.lock().await;
            if self.workflow.borrow().generation() != generation {
                return Err(AppError::Cancelled);
            }
            *active = Some((generation, token.clone()));
        }

        tracing::info!(
            service = self.service.name(),
            generation,
            filename = %run.file.name(),
            size = run.file.size(),
            "Analysis started"
        );

        let (reporter, mut progress_rx) = progress::channel();
        let outcome = self
            .drive(generation, &run.file, reporter, &mut progress_rx, &token)
            .await;

        {
            let mut active = self.active.lock().await;
            if matches!(active.as_ref(), Some((g, _)) if *g == generation) {
                *active = None;
            }
        }

        match outcome {
            Ok(result) => {
                let applied = self
                    .workflow
                    .send_if_modified(|workflow| workflow.succeed(generation, result.clone()));
                if !applied {
                    tracing::debug!(generation, "Dropping result of a retired run");
                    return Err(AppError::Cancelled);
                }
                tracing::info!(
                    generation,
                    id = %result.id,
                    prediction = %result.prediction,
                    "Analysis succeeded"
                );
                Ok(result)
            }
            Err(AppError::Cancelled) => {
                tracing::info!(generation, "Analysis cancelled");
                Err(AppError::Cancelled)
            }
            Err(err) => {
                log_failure(generation, &err);
                let message = err.client_message();
                self.workflow
                    .send_if_modified(|workflow| workflow.fail(generation, message));
                Err(err)
            }
        }
    }

    /// Cancel any running analysis, clear the staged file and return to `Idle`.
    pub async fn reset(&self) {
        {
            let mut active = self.active.lock().await;
            if let Some((generation, token)) = active.take() {
                tracing::info!(generation, "Cancelling in-flight analysis");
                token.cancel();
            }
            self.workflow.send_modify(Workflow::reset);
        }
        self.upload.lock().await.remove_file();
    }

    async fn drive(
        &self,
        generation: u64,
        file: &MediaFile,
        reporter: progress::ProgressReporter,
        progress_rx: &mut ProgressReceiver,
        token: &CancellationToken,
    ) -> Result<AnalysisResult, AppError> {
        let call = self.service.analyze(file, reporter);
        tokio::pin!(call);

        let timeout = self.analysis_timeout;
        let deadline = async move {
            match timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        let mut progress_open = true;
        loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => return Err(AppError::Cancelled),

                update = progress_rx.recv(), if progress_open => match update {
                    Some(percent) => self.apply_progress(generation, percent),
                    None => progress_open = false,
                },

                outcome = &mut call => {
                    // Progress sent just before completion still belongs to this run.
                    while let Ok(percent) = progress_rx.try_recv() {
                        self.apply_progress(generation, percent);
                    }
                    return outcome;
                }

                _ = &mut deadline => {
                    let secs = timeout.map(|t| t.as_secs_f64()).unwrap_or_default();
                    return Err(AppError::transport(format!(
                        "Analysis timed out after {:.1}s",
                        secs
                    )));
                }
            }
        }
    }

    fn apply_progress(&self, generation: u64, percent: u8) {
        self.workflow
            .send_if_modified(|workflow| workflow.progress(generation, percent));
    }
}

fn log_failure(generation: u64, err: &AppError) {
    match err.log_level() {
        LogLevel::Debug => {
            tracing::debug!(generation, error = %err, code = err.error_code(), "Analysis failed")
        }
        LogLevel::Warn => {
            tracing::warn!(generation, error = %err, code = err.error_code(), "Analysis failed")
        }
        LogLevel::Error => {
            tracing::error!(generation, error = %err, code = err.error_code(), "Analysis failed")
        }
    }
}
