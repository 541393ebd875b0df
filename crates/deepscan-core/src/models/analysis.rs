use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use super::media::MediaFile;
use crate::error::AppError;

/// Numeric identifier of an analysis.
///
/// Ids are numeric everywhere (storage, lookup, wire), so a lookup argument
/// read from text must go through [`FromStr`] first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisId(pub u64);

impl Display for AnalysisId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AnalysisId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(AnalysisId)
            .map_err(|_| AppError::InvalidInput(format!("Invalid analysis id: {}", s)))
    }
}

impl From<u64> for AnalysisId {
    fn from(value: u64) -> Self {
        AnalysisId(value)
    }
}

/// Monotonic id allocator.
#[derive(Debug)]
pub struct IdSequence {
    next: AtomicU64,
}

impl IdSequence {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    pub fn next_id(&self) -> AnalysisId {
        AnalysisId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdSequence {
    fn default() -> Self {
        Self::new()
    }
}

/// Verdict for a submitted media file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prediction {
    Real,
    Fake,
    Uncertain,
}

impl Prediction {
    pub const ALL: [Prediction; 3] = [Prediction::Real, Prediction::Fake, Prediction::Uncertain];

    /// Map the binary class index of the prediction endpoint (0 = real, 1 = fake).
    pub fn from_class_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(Prediction::Real),
            1 => Some(Prediction::Fake),
            _ => None,
        }
    }
}

impl Display for Prediction {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Prediction::Real => write!(f, "real"),
            Prediction::Fake => write!(f, "fake"),
            Prediction::Uncertain => write!(f, "uncertain"),
        }
    }
}

impl FromStr for Prediction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "real" => Ok(Prediction::Real),
            "fake" => Ok(Prediction::Fake),
            "uncertain" => Ok(Prediction::Uncertain),
            _ => Err(AppError::InvalidInput(format!("Invalid prediction: {}", s))),
        }
    }
}

/// Ordered indicator → value breakdown accompanying a verdict.
///
/// Serialized as a JSON object; key order is preserved both ways.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisBreakdown(Vec<(String, String)>);

impl AnalysisBreakdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an indicator. Replacing keeps the original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AnalysisBreakdown {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut breakdown = AnalysisBreakdown::new();
        for (k, v) in iter {
            breakdown.insert(k, v);
        }
        breakdown
    }
}

impl Serialize for AnalysisBreakdown {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for AnalysisBreakdown {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BreakdownVisitor;

        impl<'de> Visitor<'de> for BreakdownVisitor {
            type Value = AnalysisBreakdown;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of indicator names to descriptions")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut breakdown = AnalysisBreakdown::new();
                while let Some((k, v)) = access.next_entry::<String, String>()? {
                    breakdown.insert(k, v);
                }
                Ok(breakdown)
            }
        }

        deserializer.deserialize_map(BreakdownVisitor)
    }
}

/// Result of analyzing one media file. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub id: AnalysisId,
    pub filename: String,
    pub file_type: String,
    pub file_size: u64,
    pub prediction: Prediction,
    pub confidence: f64,
    pub analysis: AnalysisBreakdown,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub frame_urls: Vec<String>,
}

impl AnalysisResult {
    /// Build a result for `file`, stamped with the current time.
    /// Confidence is clamped into `[0, 1]`; NaN becomes 0.
    pub fn new(
        id: AnalysisId,
        file: &MediaFile,
        prediction: Prediction,
        confidence: f64,
        analysis: AnalysisBreakdown,
    ) -> Self {
        Self {
            id,
            filename: file.name().to_string(),
            file_type: file.content_type().to_string(),
            file_size: file.size(),
            prediction,
            confidence: clamp_confidence(confidence),
            analysis,
            timestamp: Utc::now(),
            processing_time: None,
            frame_urls: Vec::new(),
        }
    }

    pub fn with_processing_time(mut self, processing_time: impl Into<String>) -> Self {
        self.processing_time = Some(processing_time.into());
        self
    }

    pub fn with_frame_urls(mut self, frame_urls: Vec<String>) -> Self {
        self.frame_urls = frame_urls;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

/// One page of analysis history. Field names follow the history listing contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub results: Vec<AnalysisResult>,
    pub total: usize,
    pub page: usize,
    pub total_pages: usize,
}

impl HistoryPage {
    /// Slice `[(page-1)*page_size, page*page_size)` out of an ordered collection.
    ///
    /// Pages are 1-indexed; a page past the end yields no results. `page_size`
    /// must be non-zero.
    pub fn paginate<'a, I>(items: I, page: usize, page_size: usize) -> Self
    where
        I: IntoIterator<Item = &'a AnalysisResult>,
        I::IntoIter: ExactSizeIterator,
    {
        let iter = items.into_iter();
        let total = iter.len();
        let page = page.max(1);
        let start = (page - 1).saturating_mul(page_size);
        let results = iter.skip(start).take(page_size).cloned().collect();

        Self {
            results,
            total,
            page,
            total_pages: total.div_ceil(page_size.max(1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: u64) -> AnalysisResult {
        AnalysisResult {
            id: AnalysisId(id),
            filename: format!("clip_{}.mp4", id),
            file_type: "video/mp4".to_string(),
            file_size: 1024,
            prediction: Prediction::Real,
            confidence: 0.9,
            analysis: AnalysisBreakdown::new(),
            timestamp: Utc::now(),
            processing_time: None,
            frame_urls: Vec::new(),
        }
    }

    #[test]
    fn test_analysis_id_from_str() {
        assert_eq!("42".parse::<AnalysisId>().unwrap(), AnalysisId(42));
        assert_eq!(" 7 ".parse::<AnalysisId>().unwrap(), AnalysisId(7));
        assert!("abc".parse::<AnalysisId>().is_err());
        assert!("-1".parse::<AnalysisId>().is_err());
    }

    #[test]
    fn test_id_sequence_is_monotonic() {
        let ids = IdSequence::new();
        assert_eq!(ids.next_id(), AnalysisId(1));
        assert_eq!(ids.next_id(), AnalysisId(2));
        let ids = IdSequence::starting_at(10);
        assert_eq!(ids.next_id(), AnalysisId(10));
    }

    #[test]
    fn test_prediction_display_and_parse() {
        for prediction in Prediction::ALL {
            assert_eq!(
                prediction.to_string().parse::<Prediction>().unwrap(),
                prediction
            );
        }
        assert_eq!("FAKE".parse::<Prediction>().unwrap(), Prediction::Fake);
        assert!("maybe".parse::<Prediction>().is_err());
    }

    #[test]
    fn test_prediction_from_class_index() {
        assert_eq!(Prediction::from_class_index(0), Some(Prediction::Real));
        assert_eq!(Prediction::from_class_index(1), Some(Prediction::Fake));
        assert_eq!(Prediction::from_class_index(2), None);
        assert_eq!(Prediction::from_class_index(-1), None);
    }

    #[test]
    fn test_breakdown_preserves_order() {
        let breakdown: AnalysisBreakdown = vec![
            ("Temporal Consistency", "Consistent"),
            ("Facial Manipulation", "Not Detected"),
            ("Blending Quality", "Natural"),
        ]
        .into_iter()
        .collect();

        let json = serde_json::to_string(&breakdown).unwrap();
        assert_eq!(
            json,
            r#"{"Temporal Consistency":"Consistent","Facial Manipulation":"Not Detected","Blending Quality":"Natural"}"#
        );

        let parsed: AnalysisBreakdown = serde_json::from_str(&json).unwrap();
        let keys: Vec<&str> = parsed.iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![
                "Temporal Consistency",
                "Facial Manipulation",
                "Blending Quality"
            ]
        );
    }

    #[test]
    fn test_breakdown_insert_replaces_in_place() {
        let mut breakdown = AnalysisBreakdown::new();
        breakdown.insert("a", "1");
        breakdown.insert("b", "2");
        breakdown.insert("a", "3");
        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown.get("a"), Some("3"));
        assert_eq!(breakdown.iter().next(), Some(("a", "3")));
    }

    #[test]
    fn test_result_wire_format() {
        let result = sample(3).with_processing_time("2.5s");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["fileType"], "video/mp4");
        assert_eq!(json["fileSize"], 1024);
        assert_eq!(json["prediction"], "real");
        assert_eq!(json["processingTime"], "2.5s");
        assert!(json.get("frameUrls").is_none());
    }

    #[test]
    fn test_paginate_first_and_last_page() {
        let items: Vec<AnalysisResult> = (1..=25).map(sample).collect();

        let page = HistoryPage::paginate(&items, 1, 10);
        assert_eq!(page.results.len(), 10);
        assert_eq!(page.total, 25);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.results[0].id, AnalysisId(1));

        let page = HistoryPage::paginate(&items, 3, 10);
        assert_eq!(page.results.len(), 5);
        assert_eq!(page.results[0].id, AnalysisId(21));
    }

    #[test]
    fn test_paginate_out_of_range_is_empty() {
        let items: Vec<AnalysisResult> = (1..=3).map(sample).collect();
        let page = HistoryPage::paginate(&items, 9, 10);
        assert!(page.results.is_empty());
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.page, 9);
    }

    #[test]
    fn test_paginate_empty_collection() {
        let items: Vec<AnalysisResult> = Vec::new();
        let page = HistoryPage::paginate(&items, 1, 10);
        assert!(page.results.is_empty());
        assert_eq!(page.total, 0);
        assert_eq!(page.total_pages, 0);
    }
}
