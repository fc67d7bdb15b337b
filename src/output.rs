use crate::config::ModelEntry;
use crate::models::{EvaluationReport, MetricSet};
use crate::runner::RunOutcome;
use clap::ValueEnum;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Output format options for the final summary
#[derive(Debug, Clone, ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    Plain,
    Json,
}

/// Banner printed before a model's samples are processed
pub fn print_model_header(model: &ModelEntry) {
    println!();
    println!("{}", "=".repeat(60));
    println!("Evaluating: {} ({})", model.name, model.id);
    println!("{}", "=".repeat(60));
}

/// Averaged metrics of one finished model
pub fn print_model_summary(report: &EvaluationReport, path: &Path) {
    println!();
    println!("Results for {}:", report.model_name);
    println!(
        "  Successful: {}/{}",
        report.num_successful, report.num_samples
    );
    println!("  ROUGE-1: {:.4}", report.metrics.rouge1);
    println!("  ROUGE-2: {:.4}", report.metrics.rouge2);
    println!("  ROUGE-L: {:.4}", report.metrics.rouge_l);
    println!("  Saved to: {}", path.display());
}

/// Print the run's final summary in the specified format
pub fn print_results(outcome: &RunOutcome, format: OutputFormat) {
    match format {
        OutputFormat::Plain => print_plain(outcome),
        OutputFormat::Json => print_json(outcome),
    }
}

fn print_plain(outcome: &RunOutcome) {
    let Some((_, path)) = &outcome.comparison else {
        return;
    };

    println!();
    println!("{}", "=".repeat(60));
    println!("COMPARISON SUMMARY");
    println!("{}", "=".repeat(60));
    for line in comparison_table(&outcome.reports) {
        println!("{}", line);
    }
    println!();
    println!("Comparison saved to: {}", path.display());
}

/// Header, rule and one row per model
fn comparison_table(reports: &[EvaluationReport]) -> Vec<String> {
    let mut lines = vec![
        format!(
            "{:<20} {:<10} {:<10} {:<10}",
            "Model", "ROUGE-1", "ROUGE-2", "ROUGE-L"
        ),
        "-".repeat(50),
    ];
    for report in reports {
        let m = &report.metrics;
        lines.push(format!(
            "{:<20} {:<10.4} {:<10.4} {:<10.4}",
            report.model_name, m.rouge1, m.rouge2, m.rouge_l
        ));
    }
    lines
}

fn print_json(outcome: &RunOutcome) {
    match json_summary(outcome) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing results to JSON: {}", e),
    }
}

/// The comparison report when there is one, otherwise the metrics by model
fn json_summary(outcome: &RunOutcome) -> serde_json::Result<String> {
    match &outcome.comparison {
        Some((comparison, _)) => serde_json::to_string_pretty(comparison),
        None => {
            let metrics: IndexMap<&str, MetricSet> = outcome
                .reports
                .iter()
                .map(|r| (r.model_name.as_str(), r.metrics))
                .collect();
            serde_json::to_string_pretty(&metrics)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ComparisonReport, PerSampleScores};
    use std::path::PathBuf;

    fn report(name: &str, rouge1: f64) -> EvaluationReport {
        EvaluationReport {
            model: format!("openai.{}", name),
            model_name: name.to_string(),
            num_samples: 2,
            num_successful: 2,
            timestamp: "2026-01-01T00:00:00.000000".to_string(),
            metrics: MetricSet {
                rouge1,
                rouge2: 0.25,
                rouge_l: 0.5,
            },
            per_sample_scores: PerSampleScores::default(),
            predictions: vec![],
        }
    }

    fn outcome_with_comparison() -> RunOutcome {
        let reports = vec![report("gpt-oss-20b", 0.51234), report("gpt-oss-120b", 0.6)];
        let comparison = ComparisonReport::from_reports("valid", 2, &reports);
        RunOutcome {
            reports,
            comparison: Some((comparison, PathBuf::from("results/comparison_results.json"))),
        }
    }

    #[test]
    fn test_comparison_table_rows() {
        let outcome = outcome_with_comparison();
        let lines = comparison_table(&outcome.reports);
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Model"));
        assert_eq!(lines[1], "-".repeat(50));
        assert!(lines[2].starts_with("gpt-oss-20b"));
        assert!(lines[2].contains("0.5123"));
        assert!(lines[3].contains("0.6000"));
    }

    #[test]
    fn test_json_summary_with_comparison() {
        let outcome = outcome_with_comparison();
        let json = json_summary(&outcome).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["data_split"], "valid");
        assert_eq!(value["num_samples"], 2);
        assert_eq!(value["models"]["gpt-oss-20b"]["rouge1"], 0.51234);
        assert_eq!(value["models"]["gpt-oss-120b"]["rougeL"], 0.5);
        assert!(json.find("gpt-oss-20b").unwrap() < json.find("gpt-oss-120b").unwrap());

        print_results(&outcome, OutputFormat::Json);
    }

    #[test]
    fn test_json_summary_single_model() {
        let outcome = RunOutcome {
            reports: vec![report("ministral-3b", 0.4)],
            comparison: None,
        };
        let value: serde_json::Value =
            serde_json::from_str(&json_summary(&outcome).unwrap()).unwrap();

        let models = value.as_object().unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(value["ministral-3b"]["rouge1"], 0.4);
        assert_eq!(value["ministral-3b"]["rouge2"], 0.25);
        assert_eq!(value["ministral-3b"]["rougeL"], 0.5);
        assert!(value.get("data_split").is_none());

        print_plain(&outcome);
    }

    #[test]
    fn test_model_summary() {
        let entry = ModelEntry {
            name: "gpt-oss-20b".to_string(),
            id: "openai.gpt-oss-20b-1:0".to_string(),
        };
        print_model_header(&entry);
        print_model_summary(&report("gpt-oss-20b", 0.3), Path::new("results/gpt-oss-20b_results.json"));
    }
}
