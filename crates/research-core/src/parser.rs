//! Turn raw agent output into a [`StructuredReport`].
//!
//! The parser never fails. Strict decoding is attempted first, then
//! heuristic object extraction, then plain-text salvage; whatever comes out
//! is passed through the enhancer so the report invariants always hold.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

use crate::enhancer::enhance_with_report;
use crate::extract::{JsonObject, extract_object};
use crate::report::{ReportField, StructuredReport};
use crate::synthesizer::{SectionKind, assemble_findings, synthesize};

const MIN_SALVAGE_PARAGRAPH_WORDS: usize = 10;
const MIN_SALVAGE_PARAGRAPHS: usize = 4;
const MIN_SALVAGE_CHARS: usize = 200;
const MIN_SALVAGED_ABSTRACT_WORDS: usize = 50;

static BLANK_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t\r]*\n").expect("invalid blank line regex"));

/// Which stage of the fallback chain produced the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStage {
    StrictDecode,
    HeuristicExtraction,
    PlainTextSalvage,
}

impl ParseStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseStage::StrictDecode => "strict_decode",
            ParseStage::HeuristicExtraction => "heuristic_extraction",
            ParseStage::PlainTextSalvage => "plain_text_salvage",
        }
    }
}

impl fmt::Display for ParseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed report plus how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOutcome {
    pub report: StructuredReport,
    pub stage: ParseStage,
    pub enhanced: Vec<ReportField>,
}

/// Parse `raw_text` into an enhanced report about `topic`.
pub fn parse(raw_text: &str, topic: &str) -> StructuredReport {
    parse_with_outcome(raw_text, topic).report
}

/// Parse and report which stage succeeded and which fields were synthesized.
pub fn parse_with_outcome(raw_text: &str, topic: &str) -> ParseOutcome {
    let (draft, stage) = decode_draft(raw_text, topic);
    let (report, enhanced) = enhance_with_report(draft, topic);
    debug!(%stage, enhanced = enhanced.len(), "parsed agent output");
    ParseOutcome {
        report,
        stage,
        enhanced,
    }
}

/// Parse then apply [`guard_leakage`]; the full pipeline front ends run.
pub fn normalize(raw_text: &str, topic: &str) -> StructuredReport {
    guard_leakage(parse(raw_text, topic), topic).0
}

/// True when findings text looks like a serialized payload rather than prose.
pub fn has_leakage(findings: &str) -> bool {
    findings.trim_start().starts_with('{')
        || findings.contains("\"topic\"")
        || findings.contains("\"abstract\"")
}

/// Discard a report whose findings carry a leaked payload and rebuild it once
/// from an empty report with the same topic.
///
/// Returns the report to keep and, when it was regenerated, the fields the
/// rebuild synthesized.
pub fn guard_leakage(
    report: StructuredReport,
    topic: &str,
) -> (StructuredReport, Option<Vec<ReportField>>) {
    if !has_leakage(&report.detailed_findings) {
        return (report, None);
    }

    warn!(%topic, "serialized payload leaked into detailed findings; regenerating report");
    let (rebuilt, replaced) = enhance_with_report(StructuredReport::empty(topic.trim()), topic);
    (rebuilt, Some(replaced))
}

fn decode_draft(raw_text: &str, topic: &str) -> (StructuredReport, ParseStage) {
    if let Ok(report) = serde_json::from_str::<StructuredReport>(raw_text) {
        return (report, ParseStage::StrictDecode);
    }

    if let Some((strategy, object)) = extract_object(raw_text) {
        debug!(strategy, "strict decode failed; using extracted object");
        return (report_from_object(&object), ParseStage::HeuristicExtraction);
    }

    (salvage_plain_text(raw_text, topic), ParseStage::PlainTextSalvage)
}

/// Map a loosely shaped object onto the report, defaulting per field.
///
/// Text fields take strings as-is and stringify numbers or booleans; any
/// other shape becomes empty. List fields keep string elements (scalars are
/// stringified, nested values dropped), wrap a lone non-empty string into a
/// one-element list, and treat every other shape as empty.
pub fn report_from_object(object: &JsonObject) -> StructuredReport {
    StructuredReport {
        topic: text_field(object.get("topic")),
        abstract_text: text_field(object.get("abstract")),
        detailed_findings: text_field(object.get("detailed_findings")),
        sources: list_field(object.get("sources")),
        tools_used: list_field(object.get("tools_used")),
        key_insights: list_field(object.get("key_insights")),
    }
}

fn text_field(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        _ => String::new(),
    }
}

fn list_field(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text.clone()),
                Value::Number(number) => Some(number.to_string()),
                Value::Bool(flag) => Some(flag.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(text)) if !text.trim().is_empty() => vec![text.clone()],
        _ => Vec::new(),
    }
}

/// Rebuild abstract and findings from prose paragraphs.
fn salvage_plain_text(raw_text: &str, topic: &str) -> StructuredReport {
    let mut report = StructuredReport::empty(topic.trim());

    let paragraphs: Vec<&str> = BLANK_LINE
        .split(raw_text)
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .filter(|paragraph| !looks_serialized(paragraph))
        .filter(|paragraph| paragraph.split_whitespace().count() >= MIN_SALVAGE_PARAGRAPH_WORDS)
        .collect();

    let combined_chars: usize = paragraphs.iter().map(|p| p.chars().count()).sum();
    if paragraphs.len() < MIN_SALVAGE_PARAGRAPHS || combined_chars <= MIN_SALVAGE_CHARS {
        debug!(
            paragraphs = paragraphs.len(),
            combined_chars, "nothing salvageable in plain text"
        );
        return report;
    }

    let candidate = paragraphs[0];
    if candidate.split_whitespace().count() >= MIN_SALVAGED_ABSTRACT_WORDS {
        report.abstract_text = candidate.to_string();
    }

    let mut bodies = paragraphs[1..].iter();
    let sections: Vec<(SectionKind, String)> = SectionKind::FINDINGS
        .iter()
        .map(|kind| {
            let body = bodies
                .next()
                .map(|paragraph| paragraph.to_string())
                .unwrap_or_else(|| synthesize(topic, *kind));
            (*kind, body)
        })
        .collect();
    report.detailed_findings = assemble_findings(&sections);

    report
}

fn looks_serialized(paragraph: &str) -> bool {
    paragraph.starts_with('{') || paragraph.contains("\"topic\"") || paragraph.contains("\"abstract\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(count: usize, stem: &str) -> String {
        (0..count)
            .map(|idx| format!("{stem}{idx}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn full_report_json() -> (StructuredReport, String) {
        let report = StructuredReport {
            topic: "Soil carbon sequestration".into(),
            abstract_text: words(130, "abs"),
            detailed_findings: format!(
                "## Background\n\n{}\n\n## Current Developments\n\n{}\n\n## Challenges\n\n{}\n\n## Future Outlook\n\n{}",
                words(30, "bg"),
                words(30, "cd"),
                words(30, "ch"),
                words(30, "fo")
            ),
            sources: (0..8).map(|idx| format!("Author {idx}. (2024). Title.")).collect(),
            tools_used: vec!["search".into(), "encyclopedia".into(), "agent".into()],
            key_insights: (0..4).map(|idx| format!("Insight {idx}")).collect(),
        };
        let json = serde_json::to_string(&report).unwrap();
        (report, json)
    }

    #[test]
    fn strict_decode_keeps_agent_content() {
        let (expected, json) = full_report_json();
        let outcome = parse_with_outcome(&json, "soil carbon");
        assert_eq!(outcome.stage, ParseStage::StrictDecode);
        assert!(outcome.enhanced.is_empty());
        assert_eq!(outcome.report, expected);
    }

    #[test]
    fn wrapped_json_is_extracted() {
        let (expected, json) = full_report_json();
        let raw = format!("Thought: I now know the final answer.\nFinal Answer: {json}\nDone.");
        let outcome = parse_with_outcome(&raw, "soil carbon");
        assert_eq!(outcome.stage, ParseStage::HeuristicExtraction);
        assert_eq!(outcome.report, expected);
    }

    #[test]
    fn nested_braces_decode_topic() {
        let raw = r#"noise {"topic":"A","abstract":"B","detailed_findings":"C {nested} D"} trailing"#;
        let outcome = parse_with_outcome(raw, "fallback topic");
        assert_eq!(outcome.stage, ParseStage::HeuristicExtraction);
        assert_eq!(outcome.report.topic, "A");
        assert!(outcome.enhanced.contains(&ReportField::Abstract));
        assert!(outcome.enhanced.contains(&ReportField::DetailedFindings));
    }

    #[test]
    fn object_fields_default_per_shape() {
        let object: JsonObject = serde_json::from_str(
            r#"{"topic": 42, "abstract": ["a"], "sources": "single source",
                "tools_used": ["x", 1, true, null, {"k": "v"}], "key_insights": {"a": 1}}"#,
        )
        .unwrap();
        let report = report_from_object(&object);
        assert_eq!(report.topic, "42");
        assert_eq!(report.abstract_text, "");
        assert_eq!(report.detailed_findings, "");
        assert_eq!(report.sources, vec!["single source".to_string()]);
        assert_eq!(report.tools_used, vec!["x", "1", "true"]);
        assert!(report.key_insights.is_empty());
    }

    #[test]
    fn prose_paragraphs_are_salvaged_into_sections() {
        let raw = [
            words(110, "intro"),
            words(15, "history"),
            "{\"topic\": \"ignored fragment\"".to_string(),
            "too short to keep".to_string(),
            words(15, "today"),
            words(15, "hurdles"),
        ]
        .join("\n\n");

        let outcome = parse_with_outcome(&raw, "urban forestry");
        assert_eq!(outcome.stage, ParseStage::PlainTextSalvage);
        assert_eq!(outcome.report.abstract_text, words(110, "intro"));
        let findings = &outcome.report.detailed_findings;
        assert!(findings.contains(&format!("## Background\n\n{}", words(15, "history"))));
        assert!(findings.contains(&format!("## Current Developments\n\n{}", words(15, "today"))));
        assert!(findings.contains(&format!("## Challenges\n\n{}", words(15, "hurdles"))));
        assert!(findings.contains("## Future Outlook\n\nLooking ahead"));
        assert!(!findings.contains("ignored fragment"));
    }

    #[test]
    fn short_abstract_candidate_is_dropped() {
        let raw = [
            words(12, "lead"),
            words(20, "a"),
            words(20, "b"),
            words(20, "c"),
        ]
        .join("\n\n");
        let outcome = parse_with_outcome(&raw, "tidal energy");
        assert!(outcome.enhanced.contains(&ReportField::Abstract));
        assert!(!outcome.report.abstract_text.contains("lead0"));
        assert!(outcome.report.detailed_findings.contains("a0"));
    }

    #[test]
    fn too_little_prose_synthesizes_everything() {
        let outcome = parse_with_outcome("I could not find anything useful.", "tidal energy");
        assert_eq!(outcome.stage, ParseStage::PlainTextSalvage);
        assert_eq!(outcome.enhanced.len(), 5);
        assert_eq!(outcome.report.topic, "tidal energy");
    }

    #[test]
    fn empty_input_scenario() {
        let report = parse("", "quantum computing");
        assert!(report.abstract_text.split_whitespace().count() >= 100);
        assert!(report.sources.len() >= 5);
        assert!(report.key_insights.len() >= 4);
        assert!(report.tools_used.len() >= 3);
        for heading in ["Background", "Current Developments", "Challenges", "Future Outlook"] {
            assert!(report.detailed_findings.contains(&format!("## {heading}")));
        }
    }

    #[test]
    fn leaked_findings_are_regenerated() {
        let mut report = parse("", "graph databases");
        report.detailed_findings = r#"{"topic":"x"}"#.to_string();
        let (guarded, replaced) = guard_leakage(report, "graph databases");
        let replaced = replaced.expect("leaked report should be regenerated");
        assert!(!replaced.contains(&ReportField::Topic));
        assert_eq!(replaced.len(), 5);
        assert!(!guarded.detailed_findings.starts_with('{'));
        assert!(!guarded.detailed_findings.contains("\"topic\""));
        assert_eq!(guarded.topic, "graph databases");
    }

    #[test]
    fn clean_reports_pass_the_guard() {
        let report = parse("", "graph databases");
        let (guarded, replaced) = guard_leakage(report.clone(), "graph databases");
        assert!(replaced.is_none());
        assert_eq!(guarded, report);
    }

    #[test]
    fn leaked_payload_in_decoded_object_is_caught_by_normalize() {
        let inner = format!(
            r#"{{\"topic\": \"inner\", \"abstract\": \"{}\"}}"#,
            words(10, "w")
        );
        let raw = format!(
            r#"{{"topic":"T","abstract":"{}","detailed_findings":"{} {}","sources":[],"tools_used":[],"key_insights":[]}}"#,
            words(120, "a"),
            inner,
            words(80, "pad")
        );
        let parsed = parse(&raw, "T");
        assert!(has_leakage(&parsed.detailed_findings));

        let report = normalize(&raw, "T");
        assert!(!has_leakage(&report.detailed_findings));
        assert!(report.detailed_findings.starts_with("## Background"));
    }
}
