//! In-process analysis service.
//!
//! Simulates an upload in ten steps plus an inference delay, then returns a
//! random verdict with a fixed indicator set. Successful results are appended
//! to the [`InMemoryHistory`] the service was built with.

use async_trait::async_trait;
use deepscan_core::models::{AnalysisBreakdown, AnalysisId, AnalysisResult, MediaFile, Prediction};
use deepscan_core::{AppError, ClientConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::history::InMemoryHistory;
use crate::progress::ProgressReporter;
use crate::service::AnalysisService;

const PROGRESS_STEP: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockConfig {
    /// Delay before each progress step.
    pub step_delay: Duration,
    /// Simulated inference time after the upload reaches 100%.
    pub processing_delay: Duration,
}

impl MockConfig {
    /// No artificial latency.
    pub fn instant() -> Self {
        Self {
            step_delay: Duration::ZERO,
            processing_delay: Duration::ZERO,
        }
    }
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            step_delay: Duration::from_millis(200),
            processing_delay: Duration::from_millis(1500),
        }
    }
}

impl From<&ClientConfig> for MockConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            step_delay: config.mock_step_delay(),
            processing_delay: config.mock_processing_delay(),
        }
    }
}

pub struct MockAnalysisService {
    history: Arc<InMemoryHistory>,
    config: MockConfig,
    rng: Mutex<StdRng>,
}

impl MockAnalysisService {
    pub fn new(history: Arc<InMemoryHistory>, config: MockConfig) -> Self {
        Self {
            history,
            config,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Deterministic verdicts for a given seed.
    pub fn with_seed(history: Arc<InMemoryHistory>, config: MockConfig, seed: u64) -> Self {
        Self {
            history,
            config,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn history(&self) -> &Arc<InMemoryHistory> {
        &self.history
    }
}

#[async_trait]
impl AnalysisService for MockAnalysisService {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn analyze(
        &self,
        file: &MediaFile,
        progress: ProgressReporter,
    ) -> Result<AnalysisResult, AppError> {
        tracing::info!(filename = %file.name(), size = file.size(), "Mock analysis started");

        for percent in (0..=100).step_by(PROGRESS_STEP) {
            tokio::time::sleep(self.config.step_delay).await;
            progress.report(percent as u8);
        }

        tokio::time::sleep(self.config.processing_delay).await;

        let id = self.history.allocate_id();
        let result = {
            let mut rng = self
                .rng
                .lock()
                .map_err(|_| AppError::Internal("Mock RNG lock poisoned".to_string()))?;
            generate_result(
                id,
                file.name(),
                file.content_type(),
                file.size(),
                &mut *rng,
            )
        };

        self.history.append(result.clone()).await?;

        tracing::info!(
            id = %result.id,
            prediction = %result.prediction,
            confidence = result.confidence,
            "Mock analysis complete"
        );
        Ok(result)
    }
}

/// Random verdict with the fixed mock indicator set.
///
/// Real/fake verdicts get a confidence in `[0.70, 1.00)`, uncertain ones in `[0.30, 0.70)`.
pub(crate) fn generate_result<R: Rng + ?Sized>(
    id: AnalysisId,
    filename: &str,
    file_type: &str,
    file_size: u64,
    rng: &mut R,
) -> AnalysisResult {
    let prediction = Prediction::ALL[rng.random_range(0..Prediction::ALL.len())];
    let confidence = match prediction {
        Prediction::Uncertain => rng.random_range(0.3..0.7),
        Prediction::Real | Prediction::Fake => rng.random_range(0.7..1.0),
    };

    let fake = prediction == Prediction::Fake;
    let mut analysis = AnalysisBreakdown::new();
    analysis.insert(
        "Facial Manipulation",
        if fake { "Detected" } else { "Not Detected" },
    );
    analysis.insert(
        "Temporal Consistency",
        if fake { "Inconsistent" } else { "Consistent" },
    );
    analysis.insert(
        "Compression Artifacts",
        if fake { "Present" } else { "Minimal" },
    );
    analysis.insert("Blending Quality", if fake { "Poor" } else { "Natural" });
    analysis.insert(
        "Eye Movement",
        if file_type.starts_with("video/") {
            "Analyzed"
        } else {
            "N/A"
        },
    );

    AnalysisResult {
        id,
        filename: filename.to_string(),
        file_type: file_type.to_string(),
        file_size,
        prediction,
        confidence,
        analysis,
        timestamp: chrono::Utc::now(),
        processing_time: Some(format!("{:.1}s", rng.random_range(2.0..5.0))),
        frame_urls: Vec::new(),
    }
}
