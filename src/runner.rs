use crate::config::{Config, ModelEntry, ModelSelector};
use crate::dataset::Sample;
use crate::inference::{InferenceBackend, NoteGenerator};
use crate::models::{ComparisonReport, EvaluationReport, PredictionRecord, timestamp_now};
use crate::output;
use crate::scoring::RougeScorer;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const COMPARISON_FILE: &str = "comparison_results.json";

/// Everything a finished run produced
#[derive(Debug)]
pub struct RunOutcome {
    pub reports: Vec<EvaluationReport>,
    /// Present when more than one model ran
    pub comparison: Option<(ComparisonReport, PathBuf)>,
}

/// Main runner that orchestrates the evaluation process
pub struct Runner<B> {
    config: Config,
    generator: NoteGenerator<B>,
    scorer: RougeScorer,
    output_dir: PathBuf,
}

impl<B: InferenceBackend> Runner<B> {
    pub fn new(config: Config, backend: B, output_dir: &Path) -> Self {
        let generator = NoteGenerator::new(backend, &config);
        Self {
            config,
            generator,
            scorer: RougeScorer::new(),
            output_dir: output_dir.to_path_buf(),
        }
    }

    /// Evaluate every selected model on the samples, one after another
    pub async fn run(
        &self,
        selector: &ModelSelector,
        data_split: &str,
        samples: &[Sample],
    ) -> Result<RunOutcome> {
        let models = self.config.select_models(selector)?;
        info!(
            models = models.len(),
            samples = samples.len(),
            data_split,
            "starting evaluation run"
        );

        let mut reports = Vec::new();
        for (index, model) in models.iter().enumerate() {
            info!(
                model = %model.name,
                "evaluating model {}/{}",
                index + 1,
                models.len()
            );
            reports.push(self.evaluate_model(model, samples).await?);
        }

        let comparison = if reports.len() > 1 {
            let comparison = ComparisonReport::from_reports(data_split, samples.len(), &reports);
            let path = self.output_dir.join(COMPARISON_FILE);
            self.store_json(&comparison, &path)?;
            Some((comparison, path))
        } else {
            None
        };

        Ok(RunOutcome {
            reports,
            comparison,
        })
    }

    /// Evaluate one model, write its report and print a summary
    pub async fn evaluate_model(
        &self,
        model: &ModelEntry,
        samples: &[Sample],
    ) -> Result<EvaluationReport> {
        output::print_model_header(model);

        let mut predictions = Vec::with_capacity(samples.len());
        let mut references = Vec::with_capacity(samples.len());
        let mut details = Vec::with_capacity(samples.len());

        for (index, sample) in samples.iter().enumerate() {
            debug!(
                model = %model.name,
                sample = %sample.identifier,
                "processing sample {}/{}",
                index + 1,
                samples.len()
            );

            let note = self.generator.generate_note(&model.id, &sample.dialogue).await;
            if note.is_none() {
                warn!(model = %model.name, sample = %sample.identifier, "failed to generate for sample {}", index);
            }

            details.push(PredictionRecord::new(
                &sample.identifier,
                &sample.dialogue,
                &sample.reference,
                note.as_deref(),
            ));
            predictions.push(note.unwrap_or_default());
            references.push(sample.reference.clone());
        }

        let (metrics, per_sample_scores) = self.scorer.score_all(&predictions, &references);

        let report = EvaluationReport {
            model: model.id.clone(),
            model_name: model.name.clone(),
            num_samples: samples.len(),
            num_successful: predictions.iter().filter(|p| !p.is_empty()).count(),
            timestamp: timestamp_now(),
            metrics,
            per_sample_scores,
            predictions: details,
        };

        let path = self.report_path(&model.name);
        self.store_json(&report, &path)?;
        output::print_model_summary(&report, &path);

        Ok(report)
    }

    pub fn report_path(&self, model_name: &str) -> PathBuf {
        self.output_dir.join(format!("{}_results.json", model_name))
    }

    /// Store a value as pretty JSON, creating the directory
    fn store_json<T: Serialize>(&self, value: &T, path: &Path) -> Result<()> {
        let json_content = serde_json::to_string_pretty(value)
            .context("Failed to serialize results to JSON")?;
        ensure_directory_exists(path)?;
        std::fs::write(path, json_content)
            .with_context(|| format!("Failed to write results to: {}", path.display()))?;
        info!(path = %path.display(), "results stored");
        Ok(())
    }
}

/// Ensure the directory for a results file exists
fn ensure_directory_exists(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}
