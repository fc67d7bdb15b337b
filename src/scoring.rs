//! ROUGE-1, ROUGE-2 and ROUGE-L F-measures over stemmed tokens.

use crate::models::{MetricSet, PerSampleScores};
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashMap;

/// Precision, recall and F-measure for one metric on one pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub precision: f64,
    pub recall: f64,
    pub fmeasure: f64,
}

impl Score {
    fn from_counts(overlap: usize, prediction_total: usize, reference_total: usize) -> Self {
        let precision = overlap as f64 / prediction_total.max(1) as f64;
        let recall = overlap as f64 / reference_total.max(1) as f64;
        let fmeasure = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            precision,
            recall,
            fmeasure,
        }
    }
}

/// Scores a prediction against a reference
pub struct RougeScorer {
    stemmer: Option<Stemmer>,
}

impl RougeScorer {
    /// Scorer that stems tokens longer than three characters
    pub fn new() -> Self {
        Self {
            // Snowball English (Porter2). The Python rouge-score package uses
            // the older Porter stemmer; the two disagree on some suffixes, so
            // scores can drift from published numbers in the third decimal.
            stemmer: Some(Stemmer::create(Algorithm::English)),
        }
    }

    #[cfg(test)]
    fn without_stemming() -> Self {
        Self { stemmer: None }
    }

    /// Lowercase, split on anything outside `[a-z0-9]`, stem
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let normalized: String = text
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { ' ' })
            .collect();

        normalized
            .split_whitespace()
            .map(|token| match &self.stemmer {
                Some(stemmer) if token.len() > 3 => stemmer.stem(token).into_owned(),
                _ => token.to_string(),
            })
            .filter(|token| !token.is_empty())
            .collect()
    }

    /// F-measures of all three metrics
    pub fn score(&self, reference: &str, prediction: &str) -> MetricSet {
        let reference_tokens = self.tokenize(reference);
        let prediction_tokens = self.tokenize(prediction);

        MetricSet {
            rouge1: rouge_n(&reference_tokens, &prediction_tokens, 1).fmeasure,
            rouge2: rouge_n(&reference_tokens, &prediction_tokens, 2).fmeasure,
            rouge_l: rouge_l(&reference_tokens, &prediction_tokens).fmeasure,
        }
    }

    /// Score every pair with both sides non-empty; returns the means and the
    /// per-pair values. Means are 0.0 when no pair qualifies.
    pub fn score_all(
        &self,
        predictions: &[String],
        references: &[String],
    ) -> (MetricSet, PerSampleScores) {
        let mut per_sample = PerSampleScores::default();

        for (prediction, reference) in predictions.iter().zip(references) {
            if prediction.is_empty() || reference.is_empty() {
                continue;
            }
            let scores = self.score(reference, prediction);
            per_sample.rouge1.push(scores.rouge1);
            per_sample.rouge2.push(scores.rouge2);
            per_sample.rouge_l.push(scores.rouge_l);
        }

        let averages = MetricSet {
            rouge1: mean(&per_sample.rouge1),
            rouge2: mean(&per_sample.rouge2),
            rouge_l: mean(&per_sample.rouge_l),
        };

        (averages, per_sample)
    }
}

fn mean(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().sum::<f64>() / scores.len() as f64
}

fn ngram_counts(tokens: &[String], n: usize) -> HashMap<&[String], usize> {
    let mut counts = HashMap::new();
    if n == 0 || tokens.len() < n {
        return counts;
    }
    for window in tokens.windows(n) {
        *counts.entry(window).or_insert(0) += 1;
    }
    counts
}

/// Clipped n-gram overlap
pub fn rouge_n(reference: &[String], prediction: &[String], n: usize) -> Score {
    let reference_counts = ngram_counts(reference, n);
    let prediction_counts = ngram_counts(prediction, n);

    let overlap: usize = reference_counts
        .iter()
        .map(|(ngram, &count)| count.min(*prediction_counts.get(ngram).unwrap_or(&0)))
        .sum();

    Score::from_counts(
        overlap,
        prediction_counts.values().sum(),
        reference_counts.values().sum(),
    )
}

/// Longest-common-subsequence overlap
pub fn rouge_l(reference: &[String], prediction: &[String]) -> Score {
    if reference.is_empty() || prediction.is_empty() {
        return Score {
            precision: 0.0,
            recall: 0.0,
            fmeasure: 0.0,
        };
    }
    let lcs = lcs_length(reference, prediction);
    Score::from_counts(lcs, prediction.len(), reference.len())
}

fn lcs_length(a: &[String], b: &[String]) -> usize {
    // two rolling rows of the DP table
    let mut previous = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];

    for token_a in a {
        for (j, token_b) in b.iter().enumerate() {
            current[j + 1] = if token_a == token_b {
                previous[j] + 1
            } else {
                current[j].max(previous[j + 1])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Vec<String> {
        RougeScorer::without_stemming().tokenize(text)
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_tokenize_normalizes() {
        assert_eq!(
            tokens("Chief Complaint: knee-pain, 3 days."),
            vec!["chief", "complaint", "knee", "pain", "3", "days"]
        );
    }

    #[test]
    fn test_tokenize_stems_long_tokens_only() {
        let scorer = RougeScorer::new();
        assert_eq!(scorer.tokenize("running was"), vec!["run", "was"]);
        assert_eq!(scorer.tokenize("pains"), vec!["pain"]);
    }

    #[test]
    fn test_clinical_stems() {
        let scorer = RougeScorer::new();
        assert_eq!(
            scorer.tokenize("headaches reports reported"),
            vec!["headach", "report", "report"]
        );
    }

    #[test]
    fn test_stemmed_matching() {
        let scorer = RougeScorer::new();
        let scores = scorer.score("the patient reports headaches", "patient reported headache");
        assert!(scores.rouge1 > 0.8);
    }

    #[test]
    fn test_rouge_n_counts() {
        let reference = tokens("the cat sat on the mat");
        let prediction = tokens("the cat lay on the mat");

        let unigram = rouge_n(&reference, &prediction, 1);
        assert_close(unigram.precision, 5.0 / 6.0);
        assert_close(unigram.recall, 5.0 / 6.0);

        let bigram = rouge_n(&reference, &prediction, 2);
        // "the cat", "on the", "the mat"
        assert_close(bigram.precision, 3.0 / 5.0);
        assert_close(bigram.fmeasure, 3.0 / 5.0);
    }

    #[test]
    fn test_rouge_n_clips_repeats() {
        let reference = tokens("pain");
        let prediction = tokens("pain pain pain");
        let score = rouge_n(&reference, &prediction, 1);
        assert_close(score.precision, 1.0 / 3.0);
        assert_close(score.recall, 1.0);
        assert_close(score.fmeasure, 0.5);
    }

    #[test]
    fn test_rouge_l() {
        let reference = tokens("a b c d e");
        let prediction = tokens("a x c y e");
        let score = rouge_l(&reference, &prediction);
        assert_close(score.precision, 3.0 / 5.0);
        assert_close(score.recall, 3.0 / 5.0);

        assert_eq!(rouge_l(&reference, &[]).fmeasure, 0.0);
    }

    #[test]
    fn test_identical_texts_score_one() {
        let scorer = RougeScorer::new();
        let note = "ASSESSMENT AND PLAN: Right knee strain. Ice and ibuprofen.";
        let scores = scorer.score(note, note);
        assert_close(scores.rouge1, 1.0);
        assert_close(scores.rouge2, 1.0);
        assert_close(scores.rouge_l, 1.0);
    }

    #[test]
    fn test_scores_in_unit_range() {
        let scorer = RougeScorer::new();
        let pairs = [
            ("history of present illness", "physical examination"),
            ("the the the", "the"),
            ("!!!", "knee pain"),
            ("fever and chills for two days", "two days of chills and fever"),
        ];
        for (reference, prediction) in pairs {
            let scores = scorer.score(reference, prediction);
            for value in [scores.rouge1, scores.rouge2, scores.rouge_l] {
                assert!((0.0..=1.0).contains(&value));
            }
        }
    }

    #[test]
    fn test_score_all_skips_empty_pairs() {
        let scorer = RougeScorer::new();
        let predictions = vec![String::new(), String::new()];
        let references = vec!["note one".to_string(), "note two".to_string()];

        let (averages, per_sample) = scorer.score_all(&predictions, &references);
        assert_eq!(averages, MetricSet::default());
        assert!(per_sample.rouge1.is_empty());
        assert!(per_sample.rouge_l.is_empty());
    }

    #[test]
    fn test_score_all_single_pair_equals_pair_score() {
        let scorer = RougeScorer::new();
        let predictions = vec![
            String::new(),
            "patient has knee pain".to_string(),
        ];
        let references = vec![
            "unused".to_string(),
            "the patient reports knee pain".to_string(),
        ];

        let (averages, per_sample) = scorer.score_all(&predictions, &references);
        let direct = scorer.score(&references[1], &predictions[1]);
        assert_eq!(per_sample.rouge1.len(), 1);
        assert_eq!(averages, direct);
    }

    #[test]
    fn test_score_all_identical_pairs_average_one() {
        let scorer = RougeScorer::new();
        let notes = vec![
            "CHIEF COMPLAINT: Cough.".to_string(),
            "ASSESSMENT AND PLAN: Viral infection, rest and fluids.".to_string(),
        ];

        let (averages, per_sample) = scorer.score_all(&notes, &notes);
        assert_eq!(per_sample.rouge2.len(), 2);
        assert_close(averages.rouge1, 1.0);
        assert_close(averages.rouge2, 1.0);
        assert_close(averages.rouge_l, 1.0);
    }
}
