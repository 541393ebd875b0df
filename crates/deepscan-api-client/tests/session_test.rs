use async_trait::async_trait;
use bytes::Bytes;
use deepscan_api_client::{
    AnalysisService, AnalysisSession, HistoryStore, InMemoryHistory, MockAnalysisService,
    MockConfig, ProgressReporter,
};
use deepscan_core::models::{
    AnalysisBreakdown, AnalysisId, AnalysisResult, MediaCandidate, MediaFile, Prediction,
};
use deepscan_core::validation::ValidationError;
use deepscan_core::{AcceptPolicy, AppError, UploadPolicy, Workflow, WorkflowState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};

/// How a scripted call ends after reporting its progress steps.
enum Ending {
    Succeed,
    Fail(u16, &'static str),
    /// Wait until notified, then succeed.
    Gate(Arc<Notify>),
    Hang,
}

struct ScriptedService {
    steps: Vec<u8>,
    ending: Ending,
}

impl ScriptedService {
    fn new(steps: &[u8], ending: Ending) -> Arc<Self> {
        Arc::new(Self {
            steps: steps.to_vec(),
            ending,
        })
    }
}

fn result_for(file: &MediaFile) -> AnalysisResult {
    let mut analysis = AnalysisBreakdown::new();
    analysis.insert("Real Confidence", "9.00%");
    analysis.insert("Fake Confidence", "91.00%");
    AnalysisResult::new(AnalysisId(1), file, Prediction::Fake, 0.91, analysis)
}

#[async_trait]
impl AnalysisService for ScriptedService {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn analyze(
        &self,
        file: &MediaFile,
        progress: ProgressReporter,
    ) -> Result<AnalysisResult, AppError> {
        for step in &self.steps {
            progress.report(*step);
            tokio::task::yield_now().await;
        }
        match &self.ending {
            Ending::Succeed => Ok(result_for(file)),
            Ending::Fail(status, message) => {
                Err(AppError::transport_with_status(*message, *status))
            }
            Ending::Gate(notify) => {
                notify.notified().await;
                Ok(result_for(file))
            }
            Ending::Hang => std::future::pending().await,
        }
    }
}

fn video(name: &str) -> MediaCandidate {
    MediaCandidate::new(name, "video/mp4", Bytes::from_static(b"not really a video"))
}

async fn staged_session(service: Arc<dyn AnalysisService>) -> Arc<AnalysisSession> {
    let session = Arc::new(AnalysisSession::new(service, UploadPolicy::media()));
    session.select_file(video("interview.mp4")).await.unwrap();
    session
}

async fn wait_until_analyzing(rx: &mut watch::Receiver<Workflow>) {
    rx.wait_for(|workflow| workflow.state().is_analyzing())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_mock_backend_happy_path() {
    let history = Arc::new(InMemoryHistory::new());
    let service = MockAnalysisService::with_seed(history.clone(), MockConfig::instant(), 9);
    let session = staged_session(Arc::new(service)).await;

    let result = session.analyze().await.unwrap();

    match session.state() {
        WorkflowState::Succeeded(stored) => assert_eq!(stored, result),
        other => panic!("unexpected state: {}", other),
    }
    assert_eq!(result.filename, "interview.mp4");
    assert_eq!(result.analysis.len(), 5);
    assert_eq!(history.get(result.id).await.unwrap(), result);
}

#[tokio::test]
async fn test_observed_progress_is_monotonic() {
    let service = ScriptedService::new(&[0, 25, 10, 50, 50, 75, 100], Ending::Succeed);
    let session = staged_session(service).await;
    let mut rx = session.subscribe();

    let observer = tokio::spawn(async move {
        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            let snapshot = rx.borrow_and_update().state().clone();
            let done = matches!(snapshot, WorkflowState::Succeeded(_));
            if let Some(p) = snapshot.progress() {
                seen.push(p);
            }
            if done {
                break;
            }
        }
        seen
    });

    session.analyze().await.unwrap();
    let seen = observer.await.unwrap();
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{:?}", seen);
    assert!(seen.iter().all(|p| *p <= 100));
}

#[tokio::test]
async fn test_second_analyze_is_rejected_while_pending() {
    let gate = Arc::new(Notify::new());
    let service = ScriptedService::new(&[10], Ending::Gate(gate.clone()));
    let session = staged_session(service).await;
    let mut rx = session.subscribe();

    let first = tokio::spawn({
        let session = session.clone();
        async move { session.analyze().await }
    });
    wait_until_analyzing(&mut rx).await;

    let err = session.analyze().await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let err = session.select_file(video("other.mp4")).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert!(session.remove_file().await.is_err());

    gate.notify_one();
    let result = first.await.unwrap().unwrap();
    assert_eq!(result.prediction, Prediction::Fake);
    assert!(matches!(session.state(), WorkflowState::Succeeded(_)));
}

#[tokio::test]
async fn test_reset_cancels_in_flight_analysis() {
    let service = ScriptedService::new(&[30], Ending::Hang);
    let session = staged_session(service).await;
    let mut rx = session.subscribe();

    let pending = tokio::spawn({
        let session = session.clone();
        async move { session.analyze().await }
    });
    wait_until_analyzing(&mut rx).await;

    session.reset().await;

    let outcome = tokio::time::timeout(Duration::from_secs(5), pending)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(outcome, Err(AppError::Cancelled)));
    assert!(matches!(session.state(), WorkflowState::Idle));
    assert!(session.preview().await.is_none());

    // The session is usable again after a reset.
    session.select_file(video("again.mp4")).await.unwrap();
    assert!(matches!(session.state(), WorkflowState::FileSelected(_)));
}

#[tokio::test]
async fn test_service_error_becomes_failed_state() {
    let service = ScriptedService::new(&[40], Ending::Fail(503, "Model not loaded"));
    let session = staged_session(service).await;

    let err = session.analyze().await.unwrap_err();
    assert!(matches!(err, AppError::Transport { status: Some(503), .. }));

    let state = session.state();
    assert_eq!(state.error(), Some("Model not loaded"));
    assert_eq!(state.file().unwrap().name(), "interview.mp4");

    // A new selection clears the failure.
    session.select_file(video("retry.mp4")).await.unwrap();
    assert!(matches!(session.state(), WorkflowState::FileSelected(_)));
}

#[tokio::test]
async fn test_empty_error_message_uses_generic_text() {
    let service = ScriptedService::new(&[], Ending::Fail(500, ""));
    let session = staged_session(service).await;

    session.analyze().await.unwrap_err();
    assert_eq!(
        session.state().error(),
        Some(deepscan_core::error::GENERIC_ANALYSIS_FAILURE)
    );
}

#[tokio::test]
async fn test_analysis_timeout_fails_run() {
    let service: Arc<dyn AnalysisService> = ScriptedService::new(&[5], Ending::Hang);
    let session = AnalysisSession::new(service, UploadPolicy::media())
        .with_analysis_timeout(Some(Duration::from_millis(50)));
    session.select_file(video("slow.mp4")).await.unwrap();

    let err = session.analyze().await.unwrap_err();
    assert!(matches!(err, AppError::Transport { status: None, .. }));
    assert!(session.state().error().unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_no_progress_after_terminal_event() {
    struct LateReporter;

    #[async_trait]
    impl AnalysisService for LateReporter {
        fn name(&self) -> &'static str {
            "late"
        }

        async fn analyze(
            &self,
            file: &MediaFile,
            progress: ProgressReporter,
        ) -> Result<AnalysisResult, AppError> {
            progress.report(20);
            let late = progress.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                late.report(90);
            });
            Ok(result_for(file))
        }
    }

    let session = staged_session(Arc::new(LateReporter)).await;
    session.analyze().await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;

    let state = session.state();
    assert!(matches!(state, WorkflowState::Succeeded(_)));
    assert_eq!(state.progress(), None);
}

#[tokio::test]
async fn test_oversized_file_never_reaches_service() {
    let service = ScriptedService::new(&[], Ending::Succeed);
    let session = AnalysisSession::new(service, UploadPolicy::new(AcceptPolicy::Media, 1024));

    let big = MediaCandidate::new("huge.mp4", "video/mp4", Bytes::from(vec![0u8; 2048]));
    let err = session.select_file(big).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = session.analyze().await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
    assert!(matches!(session.state(), WorkflowState::Idle));
}

#[tokio::test]
async fn test_150mb_video_rejected_by_default_policy() {
    let service = ScriptedService::new(&[], Ending::Succeed);
    let session = AnalysisSession::new(service, UploadPolicy::media());

    let big = MediaCandidate::new(
        "long_take.mp4",
        "video/mp4",
        Bytes::from(vec![0u8; 150 * 1024 * 1024]),
    );
    let err = session.select_file(big).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Validation(ValidationError::FileTooLarge { .. })
    ));

    let err = session.analyze().await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
    assert!(matches!(session.state(), WorkflowState::Idle));
}
