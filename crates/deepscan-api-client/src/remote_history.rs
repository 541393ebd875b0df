//! History backed by the analysis service's listing endpoints.

use async_trait::async_trait;
use deepscan_core::models::{AnalysisId, AnalysisResult, HistoryPage};
use deepscan_core::AppError;

use crate::history::{check_page_size, HistoryStore};
use crate::ApiClient;

pub struct RemoteHistory {
    client: ApiClient,
}

impl RemoteHistory {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn analysis_path(id: AnalysisId) -> String {
        format!("/analysis/{}", id)
    }
}

#[async_trait]
impl HistoryStore for RemoteHistory {
    async fn get(&self, id: AnalysisId) -> Result<AnalysisResult, AppError> {
        tracing::debug!(id = %id, "Fetching remote analysis");
        self.client.get(&Self::analysis_path(id), &[]).await
    }

    async fn list(&self, page: usize, page_size: usize) -> Result<HistoryPage, AppError> {
        check_page_size(page_size)?;
        let page = page.max(1);
        tracing::debug!(page, page_size, "Listing remote history");
        self.client
            .get(
                "/history",
                &[("page", page.to_string()), ("limit", page_size.to_string())],
            )
            .await
    }

    async fn delete(&self, id: AnalysisId) -> Result<(), AppError> {
        self.client.delete(&Self::analysis_path(id)).await?;
        tracing::info!(id = %id, "Deleted remote analysis");
        Ok(())
    }
}
