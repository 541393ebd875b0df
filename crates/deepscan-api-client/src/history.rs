//! Analysis history.
//!
//! [`HistoryStore`] is the read/delete surface shared by the in-memory store and
//! the remote history service. Only [`InMemoryHistory`] accepts appends; remote
//! history is filled by the backend itself.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use deepscan_core::models::{AnalysisId, AnalysisResult, HistoryPage, IdSequence};
use deepscan_core::AppError;
use rand::Rng;
use std::collections::VecDeque;
use tokio::sync::RwLock;

use crate::mock::generate_result;

/// Default page size for history listings.
pub const DEFAULT_PAGE_SIZE: usize = 10;

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Fetch one analysis. Fails with `NotFound` if the id is unknown.
    async fn get(&self, id: AnalysisId) -> Result<AnalysisResult, AppError>;

    /// One 1-indexed page, most recent first. Pages past the end are empty.
    async fn list(&self, page: usize, page_size: usize) -> Result<HistoryPage, AppError>;

    /// Remove exactly one analysis. Fails with `NotFound` if the id is unknown.
    async fn delete(&self, id: AnalysisId) -> Result<(), AppError>;
}

pub(crate) fn check_page_size(page_size: usize) -> Result<(), AppError> {
    if page_size == 0 {
        return Err(AppError::InvalidInput(
            "Page size must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn not_found(id: AnalysisId) -> AppError {
    AppError::NotFound(format!("Analysis {} not found", id))
}

/// Process-lifetime history held in memory.
///
/// All reads and writes go through one `RwLock`, which serializes mutations.
#[derive(Debug, Default)]
pub struct InMemoryHistory {
    entries: RwLock<VecDeque<AnalysisResult>>,
    ids: IdSequence,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// History pre-populated with three sample analyses from the past week.
    pub fn with_samples() -> Self {
        const SAMPLES: [(&str, &str, u64); 3] = [
            ("video_sample.mp4", "video/mp4", 15_728_640),
            ("profile_photo.jpg", "image/jpeg", 2_097_152),
            ("interview_clip.mov", "video/quicktime", 31_457_280),
        ];
        const WEEK_MILLIS: i64 = 7 * 24 * 60 * 60 * 1000;

        let ids = IdSequence::new();
        let mut rng = rand::rng();
        let entries = SAMPLES
            .iter()
            .map(|(name, content_type, size)| {
                let age = ChronoDuration::milliseconds(rng.random_range(0..WEEK_MILLIS));
                generate_result(ids.next_id(), name, content_type, *size, &mut rng)
                    .with_timestamp(Utc::now() - age)
            })
            .collect();

        Self {
            entries: RwLock::new(entries),
            ids,
        }
    }

    /// Reserve the next analysis id.
    pub fn allocate_id(&self) -> AnalysisId {
        self.ids.next_id()
    }

    /// Add a result at the front (most recent first). Ids must be unique.
    pub async fn append(&self, result: AnalysisResult) -> Result<(), AppError> {
        let mut entries = self.entries.write().await;
        if entries.iter().any(|item| item.id == result.id) {
            return Err(AppError::Conflict(format!(
                "Analysis {} already exists",
                result.id
            )));
        }

        tracing::debug!(id = %result.id, filename = %result.filename, "Saved analysis to history");
        entries.push_front(result);
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistory {
    async fn get(&self, id: AnalysisId) -> Result<AnalysisResult, AppError> {
        self.entries
            .read()
            .await
            .iter()
            .find(|item| item.id == id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    async fn list(&self, page: usize, page_size: usize) -> Result<HistoryPage, AppError> {
        check_page_size(page_size)?;
        let entries = self.entries.read().await;
        Ok(HistoryPage::paginate(entries.iter(), page, page_size))
    }

    async fn delete(&self, id: AnalysisId) -> Result<(), AppError> {
        let mut entries = self.entries.write().await;
        let index = entries
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| not_found(id))?;
        entries.remove(index);
        tracing::debug!(id = %id, "Deleted analysis from history");
        Ok(())
    }
}
