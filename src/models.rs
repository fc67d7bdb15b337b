use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Marker stored in place of a note that could not be generated
pub const FAILED_PREDICTION: &str = "[FAILED]";

/// Dialogue characters kept in the detail records
pub const DIALOGUE_EXCERPT_CHARS: usize = 500;

/// Averaged or single-pair ROUGE F-measures
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    pub rouge1: f64,
    pub rouge2: f64,
    #[serde(rename = "rougeL")]
    pub rouge_l: f64,
}

/// Per-pair scores, one entry per scored sample
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerSampleScores {
    pub rouge1: Vec<f64>,
    pub rouge2: Vec<f64>,
    #[serde(rename = "rougeL")]
    pub rouge_l: Vec<f64>,
}

/// Detail record for one attempted sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    /// Sample identifier
    pub file: String,
    /// Dialogue excerpt
    pub dialogue: String,
    pub reference: String,
    /// Generated note, or [`FAILED_PREDICTION`]
    pub prediction: String,
}

impl PredictionRecord {
    pub fn new(file: &str, dialogue: &str, reference: &str, prediction: Option<&str>) -> Self {
        Self {
            file: file.to_string(),
            dialogue: excerpt(dialogue),
            reference: reference.to_string(),
            prediction: prediction.unwrap_or(FAILED_PREDICTION).to_string(),
        }
    }
}

/// First [`DIALOGUE_EXCERPT_CHARS`] characters, with `...` when cut
pub fn excerpt(text: &str) -> String {
    match text.char_indices().nth(DIALOGUE_EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Results of one model over one split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Provider model identifier
    pub model: String,
    pub model_name: String,
    pub num_samples: usize,
    pub num_successful: usize,
    pub timestamp: String,
    pub metrics: MetricSet,
    pub per_sample_scores: PerSampleScores,
    pub predictions: Vec<PredictionRecord>,
}

/// Averaged metrics of every model in a multi-model run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub data_split: String,
    pub num_samples: usize,
    pub timestamp: String,
    /// Keyed by model name, in run order
    pub models: IndexMap<String, MetricSet>,
}

impl ComparisonReport {
    pub fn from_reports(data_split: &str, num_samples: usize, reports: &[EvaluationReport]) -> Self {
        Self {
            data_split: data_split.to_string(),
            num_samples,
            timestamp: timestamp_now(),
            models: reports
                .iter()
                .map(|r| (r.model_name.clone(), r.metrics))
                .collect(),
        }
    }
}

/// Local time, ISO-8601 with microseconds
pub fn timestamp_now() -> String {
    chrono::Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}
