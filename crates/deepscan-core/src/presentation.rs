//! Plain-text rendering of verdicts.

use crate::models::{AnalysisResult, Prediction};

/// Headline shown for a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerdictDisplay {
    pub label: &'static str,
    pub message: &'static str,
}

impl VerdictDisplay {
    pub fn for_prediction(prediction: Prediction) -> Self {
        match prediction {
            Prediction::Real => VerdictDisplay {
                label: "Authentic",
                message: "This media appears to be genuine",
            },
            Prediction::Fake => VerdictDisplay {
                label: "Deepfake Detected",
                message: "This media shows signs of manipulation",
            },
            Prediction::Uncertain => VerdictDisplay {
                label: "Uncertain",
                message: "Unable to determine with confidence",
            },
        }
    }
}

/// Confidence as a percentage with one decimal, e.g. `"88.0%"`.
pub fn format_confidence(confidence: f64) -> String {
    format!("{:.1}%", confidence * 100.0)
}

/// Fixed-width text meter, e.g. `[#######---]` for 0.7 at width 10.
pub fn confidence_meter(confidence: f64, width: usize) -> String {
    let ratio = if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    };
    let filled = ((ratio * width as f64).round() as usize).min(width);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

/// Multi-line summary: verdict, confidence and the analysis breakdown in order.
pub fn render_summary(result: &AnalysisResult) -> String {
    let display = VerdictDisplay::for_prediction(result.prediction);
    let mut out = String::new();

    out.push_str(&format!("{}\n", display.label));
    out.push_str(&format!("{}\n\n", display.message));
    out.push_str(&format!(
        "Confidence Score  {} {}\n",
        confidence_meter(result.confidence, 20),
        format_confidence(result.confidence)
    ));

    if !result.analysis.is_empty() {
        out.push_str("\nAnalysis Details\n");
        for (key, value) in result.analysis.iter() {
            out.push_str(&format!("  {}: {}\n", key, value));
        }
    }

    if let Some(processing_time) = &result.processing_time {
        out.push_str(&format!("\nProcessing time: {}\n", processing_time));
    }

    out
}
