//! Analysis service seam.

use async_trait::async_trait;
use deepscan_core::models::{AnalysisResult, MediaFile};
use deepscan_core::AppError;

use crate::progress::ProgressReporter;

/// Submits one media file for classification.
///
/// Implementations report upload progress through `progress` while the call is
/// running and never after it returns. Dropping the returned future abandons
/// the call.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Short name used in logs (e.g. "mock", "http").
    fn name(&self) -> &'static str;

    async fn analyze(
        &self,
        file: &MediaFile,
        progress: ProgressReporter,
    ) -> Result<AnalysisResult, AppError>;
}
