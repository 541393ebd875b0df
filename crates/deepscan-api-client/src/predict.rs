//! HTTP analysis service backed by the `/api/predict-video` endpoint.
//!
//! The file is sent as a single multipart field whose body is streamed in
//! chunks; progress is reported as each chunk is handed to the transport.

use async_trait::async_trait;
use bytes::Bytes;
use deepscan_core::models::{
    AnalysisBreakdown, AnalysisResult, IdSequence, MediaFile, Prediction,
};
use deepscan_core::AppError;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::time::Instant;

use crate::progress::ProgressReporter;
use crate::service::AnalysisService;
use crate::ApiClient;

pub const PREDICT_PATH: &str = "/api/predict-video";

/// Size of each streamed body chunk.
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Raw body of a successful prediction.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictResponse {
    pub pred: i64,
    pub probs: Vec<f64>,
    #[serde(default, rename = "frameUrls")]
    pub frame_urls: Option<Vec<String>>,
}

/// Verdict derived from a prediction response.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub prediction: Prediction,
    pub confidence: f64,
    pub analysis: AnalysisBreakdown,
    pub frame_urls: Vec<String>,
}

impl PredictResponse {
    /// Map the binary classifier output onto a verdict.
    ///
    /// `pred` 1 is fake and 0 is real; confidence is the probability of the
    /// predicted class. This backend cannot produce `uncertain`.
    pub fn into_verdict(self) -> Result<Verdict, AppError> {
        let prediction = Prediction::from_class_index(self.pred).ok_or_else(|| {
            tracing::debug!(pred = self.pred, "Unexpected class index");
            AppError::transport(deepscan_core::error::MALFORMED_RESPONSE)
        })?;

        let [p_real, p_fake] = <[f64; 2]>::try_from(self.probs.as_slice()).map_err(|_| {
            tracing::debug!(len = self.probs.len(), "Expected two class probabilities");
            AppError::transport(deepscan_core::error::MALFORMED_RESPONSE)
        })?;

        let confidence = match prediction {
            Prediction::Fake => p_fake,
            _ => p_real,
        };

        let mut analysis = AnalysisBreakdown::new();
        analysis.insert("Real Confidence", format!("{:.2}%", p_real * 100.0));
        analysis.insert("Fake Confidence", format!("{:.2}%", p_fake * 100.0));

        Ok(Verdict {
            prediction,
            confidence,
            analysis,
            frame_urls: self.frame_urls.unwrap_or_default(),
        })
    }
}

/// Analysis service talking to the remote prediction endpoint.
///
/// The endpoint does not return an id, so results get ids from a per-instance
/// monotonic sequence.
pub struct HttpAnalysisService {
    client: ApiClient,
    ids: IdSequence,
}

impl HttpAnalysisService {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            ids: IdSequence::new(),
        }
    }

    fn multipart_form(file: &MediaFile, progress: ProgressReporter) -> Result<reqwest::multipart::Form, AppError> {
        let data = file.data().clone();
        let total = data.len() as u64;

        let chunks: Vec<Bytes> = (0..data.len())
            .step_by(UPLOAD_CHUNK_SIZE)
            .map(|start| data.slice(start..(start + UPLOAD_CHUNK_SIZE).min(data.len())))
            .collect();

        progress.report(0);
        let mut sent: u64 = 0;
        let body = stream::iter(chunks).map(move |chunk| {
            sent += chunk.len() as u64;
            progress.report_bytes(sent, total);
            Ok::<Bytes, std::io::Error>(chunk)
        });

        let part = reqwest::multipart::Part::stream_with_length(
            reqwest::Body::wrap_stream(body),
            total,
        )
        .file_name(file.name().to_string())
        .mime_str(file.content_type())
        .map_err(|e| AppError::InvalidInput(format!("Invalid content type: {}", e)))?;

        Ok(reqwest::multipart::Form::new().part("file", part))
    }
}

#[async_trait]
impl AnalysisService for HttpAnalysisService {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn analyze(
        &self,
        file: &MediaFile,
        progress: ProgressReporter,
    ) -> Result<AnalysisResult, AppError> {
        tracing::info!(
            filename = %file.name(),
            size = file.size(),
            url = %self.client.build_url(PREDICT_PATH),
            "Submitting file for prediction"
        );

        let started = Instant::now();
        let form = Self::multipart_form(file, progress)?;
        let response: PredictResponse = self.client.post_multipart(PREDICT_PATH, form).await?;
        let verdict = response.into_verdict()?;
        let elapsed = started.elapsed();

        let result = AnalysisResult::new(
            self.ids.next_id(),
            file,
            verdict.prediction,
            verdict.confidence,
            verdict.analysis,
        )
        .with_processing_time(format!("{:.1}s", elapsed.as_secs_f64()))
        .with_frame_urls(verdict.frame_urls);

        tracing::info!(
            id = %result.id,
            prediction = %result.prediction,
            confidence = result.confidence,
            elapsed_ms = elapsed.as_millis() as u64,
            "Prediction complete"
        );
        Ok(result)
    }
}
