use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Instruction prepended to every dialogue
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a medical scribe assistant. Your task is to convert a doctor-patient conversation into a structured clinical note.

The clinical note should include:
- CHIEF COMPLAINT: The main reason for the visit
- HISTORY OF PRESENT ILLNESS: Detailed description of the current problem
- REVIEW OF SYSTEMS: Relevant symptoms mentioned
- PHYSICAL EXAMINATION: Any examination findings discussed
- ASSESSMENT AND PLAN: Diagnosis and treatment plan

Generate a professional clinical note based on the conversation provided. Be concise but thorough.";

/// Upper bound on attempts per sample
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Seconds as a duration; invalid values (negative, NaN) become zero
fn seconds(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

/// A named model and the provider identifier used to invoke it
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ModelEntry {
    /// Short name used on the command line and in output file names
    pub name: String,
    /// Provider model identifier
    pub id: String,
}

impl ModelEntry {
    fn new(name: &str, id: &str) -> Self {
        Self {
            name: name.to_string(),
            id: id.to_string(),
        }
    }
}

/// Root configuration, immutable once the run starts
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Ordered model table
    pub models: Vec<ModelEntry>,
    /// Split name to file name under `data_subdir`
    pub splits: BTreeMap<String, String>,
    /// Directory under the data dir holding the split files
    pub data_subdir: String,
    /// Region used to derive the default endpoint
    pub region: String,
    /// Explicit inference endpoint, overrides the region-derived one
    pub endpoint: Option<String>,
    /// Environment variable name containing the API key
    pub api_key_env: String,
    /// Temperature for note generation
    pub temperature: f64,
    /// Maximum tokens for note generation
    pub max_tokens: u32,
    /// Attempts per sample when throttled
    pub max_retries: u32,
    /// Base backoff delay in seconds
    pub retry_delay_secs: f64,
    /// Fixed pause after every request
    pub request_delay_secs: f64,
    /// Instruction prepended to every dialogue
    pub system_prompt: String,
}

impl Default for Config {
    fn default() -> Self {
        let models = vec![
            ModelEntry::new("gpt-oss-20b", "openai.gpt-oss-20b-1:0"),
            ModelEntry::new("gpt-oss-120b", "openai.gpt-oss-120b-1:0"),
            ModelEntry::new("ministral-3b", "mistral.ministral-3-3b-instruct"),
            ModelEntry::new("ministral-8b", "mistral.ministral-3-8b-instruct"),
        ];

        let splits = [
            ("train", "train.json"),
            ("valid", "valid.json"),
            ("test1", "clinicalnlp_taskB_test1.json"),
            ("test2", "clinicalnlp_taskC_test2.json"),
            ("test3", "clef_taskC_test3.json"),
        ]
        .into_iter()
        .map(|(split, file)| (split.to_string(), file.to_string()))
        .collect();

        Self {
            models,
            splits,
            data_subdir: "challenge_data_json".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            api_key_env: "AWS_BEARER_TOKEN_BEDROCK".to_string(),
            temperature: 0.3,
            max_tokens: 1024,
            max_retries: 3,
            retry_delay_secs: 2.0,
            request_delay_secs: 0.5,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl Config {
    /// Load configuration overrides from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config: {}", path.display()))?;
        Ok(config)
    }

    /// Reject settings that cannot be turned into delays
    pub fn validate(&self) -> Result<()> {
        for (name, secs) in [
            ("retry_delay_secs", self.retry_delay_secs),
            ("request_delay_secs", self.request_delay_secs),
        ] {
            if !secs.is_finite() || secs < 0.0 {
                bail!("{} must be a non-negative number of seconds, got {}", name, secs);
            }
        }
        if self.max_retries > MAX_RETRIES_LIMIT {
            bail!(
                "max_retries must be at most {}, got {}",
                MAX_RETRIES_LIMIT,
                self.max_retries
            );
        }
        Ok(())
    }

    /// Inference endpoint, explicit or derived from the region
    pub fn endpoint(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://bedrock-runtime.{}.amazonaws.com", self.region),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, seconds(self.retry_delay_secs))
    }

    pub fn request_delay(&self) -> Duration {
        seconds(self.request_delay_secs)
    }

    /// File name for a split
    pub fn split_file(&self, split: &str) -> Result<&str> {
        match self.splits.get(split) {
            Some(file) => Ok(file),
            None => bail!(
                "Unknown data split '{}', expected one of: {}",
                split,
                self.splits.keys().cloned().collect::<Vec<_>>().join(", ")
            ),
        }
    }

    /// Resolve the selector to models, in table order
    pub fn select_models(&self, selector: &ModelSelector) -> Result<Vec<ModelEntry>> {
        let selected: Vec<ModelEntry> = match selector {
            ModelSelector::Both => self.models_with_prefix("gpt-oss"),
            ModelSelector::Ministral => self.models_with_prefix("ministral"),
            ModelSelector::Named(name) => self
                .models
                .iter()
                .filter(|m| &m.name == name)
                .cloned()
                .collect(),
        };

        if selected.is_empty() {
            bail!(
                "No configured model matches '{}', known models: {}",
                selector,
                self.models
                    .iter()
                    .map(|m| m.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        Ok(selected)
    }

    fn models_with_prefix(&self, prefix: &str) -> Vec<ModelEntry> {
        self.models
            .iter()
            .filter(|m| m.name.starts_with(prefix))
            .cloned()
            .collect()
    }
}

/// Which models a run evaluates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSelector {
    /// Every `gpt-oss` model
    Both,
    /// Every `ministral` model
    Ministral,
    Named(String),
}

impl FromStr for ModelSelector {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "both" => Self::Both,
            "ministral" => Self::Ministral,
            name => Self::Named(name.to_string()),
        })
    }
}

impl std::fmt::Display for ModelSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Both => write!(f, "both"),
            Self::Ministral => write!(f, "ministral"),
            Self::Named(name) => write!(f, "{}", name),
        }
    }
}
