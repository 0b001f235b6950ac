use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};

use crate::logging::ReportLogRecord;
use crate::parser::ParseStage;

/// Aggregate view over a completion log.
#[derive(Debug, Default, Clone)]
pub struct EvaluationMetrics {
    pub total_sessions: usize,
    pub strict_decodes: usize,
    pub heuristic_extractions: usize,
    pub plain_text_salvages: usize,
    pub average_enhanced_fields: f32,
    pub regenerated: Vec<String>,
    pub distinct_topics: usize,
}

impl EvaluationMetrics {
    fn record(&mut self, entry: &ReportLogRecord) {
        self.total_sessions += 1;
        match entry.stage {
            ParseStage::StrictDecode => self.strict_decodes += 1,
            ParseStage::HeuristicExtraction => self.heuristic_extractions += 1,
            ParseStage::PlainTextSalvage => self.plain_text_salvages += 1,
        }
        self.average_enhanced_fields = ((self.average_enhanced_fields
            * (self.total_sessions - 1) as f32)
            + entry.enhanced.len() as f32)
            / self.total_sessions as f32;
        if entry.regenerated {
            self.regenerated.push(entry.session_id.clone());
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} session(s) • strict {} / heuristic {} / salvage {} • avg enhanced fields {:.2} • {} regenerated • {} topic(s)",
            self.total_sessions,
            self.strict_decodes,
            self.heuristic_extractions,
            self.plain_text_salvages,
            self.average_enhanced_fields,
            self.regenerated.len(),
            self.distinct_topics
        )
    }
}

pub struct EvaluationHarness;

impl EvaluationHarness {
    /// Read a `session.jsonl` completion log; malformed lines are skipped.
    pub fn analyze_log(path: impl AsRef<Path>) -> Result<EvaluationMetrics> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        let mut metrics = EvaluationMetrics::default();
        let mut topics = HashSet::new();

        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ReportLogRecord>(&line) {
                Ok(entry) => {
                    metrics.record(&entry);
                    topics.insert(entry.topic.to_lowercase());
                }
                Err(err) => {
                    tracing::debug!(%err, "skipping malformed evaluation log entry");
                }
            }
        }

        metrics.distinct_topics = topics.len();
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn evaluation_harness_aggregates_stages() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            r#"{{"timestamp":"t","session_id":"a","topic":"Reefs","stage":"strict_decode","enhanced":[]}}"#
        )
        .unwrap();
        writeln!(file, "not json").unwrap();
        writeln!(
            file,
            r#"{{"timestamp":"t","session_id":"b","topic":"reefs","stage":"plain_text_salvage","enhanced":["abstract","sources"],"regenerated":true}}"#
        )
        .unwrap();
        file.flush().unwrap();

        let metrics = EvaluationHarness::analyze_log(file.path()).expect("metrics");

        assert_eq!(metrics.total_sessions, 2);
        assert_eq!(metrics.strict_decodes, 1);
        assert_eq!(metrics.plain_text_salvages, 1);
        assert!((metrics.average_enhanced_fields - 1.0).abs() < f32::EPSILON);
        assert_eq!(metrics.regenerated, vec!["b".to_string()]);
        assert_eq!(metrics.distinct_topics, 1);
        assert!(metrics.summary().starts_with("2 session(s)"));
    }

    #[test]
    fn missing_log_is_an_error() {
        assert!(EvaluationHarness::analyze_log("/nonexistent/session.jsonl").is_err());
    }
}
