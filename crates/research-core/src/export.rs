//! Rendering and persistence of finished reports.
//!
//! Three presentations are supported: the flat text document appended to
//! the save file, markdown for the terminal, and a standalone HTML page.

use std::fmt::{self, Write as _};
use std::fs::{OpenOptions, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{info, warn};

use crate::parser::report_from_object;
use crate::report::StructuredReport;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const RULE: &str = "===============================================================================";
const MISSING: &str = "N/A";

static SECTION_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*##\s*(.+?)\s*$").expect("invalid section heading regex"));

static BLANK_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t\r]*\n").expect("invalid blank line regex"));

/// Output format selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    Text,
    #[default]
    Markdown,
    Html,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Text => "text",
            ExportFormat::Markdown => "markdown",
            ExportFormat::Html => "html",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(ExportFormat::Text),
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            "html" => Ok(ExportFormat::Html),
            other => Err(format!(
                "unknown format `{other}` (expected text, markdown or html)"
            )),
        }
    }
}

/// Render `report` in `format`, stamping text output with the local time.
pub fn render(report: &StructuredReport, format: ExportFormat) -> String {
    match format {
        ExportFormat::Text => render_text(report, Local::now().naive_local()),
        ExportFormat::Markdown => render_markdown(report),
        ExportFormat::Html => render_html(report),
    }
}

/// Escape text for inclusion in HTML element bodies and attribute values.
pub fn escape_markup(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// One `## Heading` block of the detailed findings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindingsSection {
    /// Empty for prose that precedes the first heading.
    pub title: String,
    pub paragraphs: Vec<String>,
}

/// Split findings into headed sections of blank-line separated paragraphs.
pub fn findings_sections(text: &str) -> Vec<FindingsSection> {
    let mut sections = Vec::new();
    let mut title = String::new();
    let mut body = String::new();

    for line in text.lines() {
        if let Some(caps) = SECTION_HEADING.captures(line) {
            push_section(&mut sections, std::mem::take(&mut title), &body);
            body.clear();
            title = caps[1].to_string();
        } else {
            body.push_str(line);
            body.push('\n');
        }
    }
    push_section(&mut sections, title, &body);
    sections
}

fn push_section(sections: &mut Vec<FindingsSection>, title: String, body: &str) {
    let paragraphs: Vec<String> = BLANK_LINE
        .split(body)
        .map(|paragraph| paragraph.trim().to_string())
        .filter(|paragraph| !paragraph.is_empty())
        .collect();
    if title.is_empty() && paragraphs.is_empty() {
        return;
    }
    sections.push(FindingsSection { title, paragraphs });
}

fn or_missing(text: &str) -> &str {
    if text.trim().is_empty() { MISSING } else { text }
}

/// Flat text document in the save-file layout.
pub fn render_text(report: &StructuredReport, generated_at: NaiveDateTime) -> String {
    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "                        COMPREHENSIVE RESEARCH REPORT");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Generated: {}", generated_at.format(TIMESTAMP_FORMAT));
    let _ = writeln!(out);
    let _ = writeln!(out, "RESEARCH TOPIC:\n{}\n", or_missing(&report.topic));
    let _ = writeln!(
        out,
        "ABSTRACT / EXECUTIVE SUMMARY:\n{}\n",
        or_missing(&report.abstract_text)
    );
    let _ = writeln!(
        out,
        "DETAILED FINDINGS:\n{}\n",
        or_missing(&report.detailed_findings)
    );

    let _ = writeln!(out, "SOURCES / REFERENCES:");
    for (idx, source) in report.sources.iter().enumerate() {
        let _ = writeln!(out, "{}. {source}", idx + 1);
    }

    let _ = writeln!(out, "\nRESEARCH METHODOLOGY & TOOLS USED:");
    for tool in &report.tools_used {
        let _ = writeln!(out, "• {tool}");
    }

    let _ = writeln!(out, "\nKEY INSIGHTS:");
    for insight in &report.key_insights {
        let _ = writeln!(out, "• {insight}");
    }

    let _ = writeln!(out, "\n{RULE}");
    let _ = writeln!(out, "End of Research Report");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out);
    out
}

/// [`escape_markup`] plus backslash escapes for inline markdown syntax.
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in escape_markup(text).chars() {
        if matches!(ch, '\\' | '`' | '*' | '_' | '[' | ']') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// On-screen sections. Every report string is escaped.
pub fn render_markdown(report: &StructuredReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}\n", escape_markdown(&report.topic));
    let _ = writeln!(
        out,
        "## Abstract\n\n{}\n",
        escape_markdown(report.abstract_text.trim())
    );

    let _ = writeln!(out, "## Detailed Findings\n");
    for section in findings_sections(&report.detailed_findings) {
        if !section.title.is_empty() {
            let _ = writeln!(out, "### {}\n", escape_markdown(&section.title));
        }
        for paragraph in &section.paragraphs {
            let _ = writeln!(out, "{}\n", escape_markdown(paragraph));
        }
    }

    let _ = writeln!(out, "## Sources\n");
    for (idx, source) in report.sources.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", idx + 1, escape_markdown(source));
    }
    let _ = writeln!(out, "\n## Tools Used\n");
    for tool in &report.tools_used {
        let _ = writeln!(out, "- {}", escape_markdown(tool));
    }
    let _ = writeln!(out, "\n## Key Insights\n");
    for insight in &report.key_insights {
        let _ = writeln!(out, "- {}", escape_markdown(insight));
    }
    out
}

/// Standalone HTML page; every report string is escaped.
pub fn render_html(report: &StructuredReport) -> String {
    let topic = escape_markup(&report.topic);
    let mut out = String::new();
    let _ = writeln!(out, "<!DOCTYPE html>");
    let _ = writeln!(out, "<html lang=\"en\">");
    let _ = writeln!(out, "<head>\n<meta charset=\"utf-8\">\n<title>{topic}</title>\n</head>");
    let _ = writeln!(out, "<body>\n<h1>{topic}</h1>");

    let _ = writeln!(out, "<h2>Abstract</h2>");
    let _ = writeln!(out, "<p>{}</p>", escape_markup(report.abstract_text.trim()));

    let _ = writeln!(out, "<h2>Detailed Findings</h2>");
    for section in findings_sections(&report.detailed_findings) {
        if !section.title.is_empty() {
            let _ = writeln!(out, "<h3>{}</h3>", escape_markup(&section.title));
        }
        for paragraph in &section.paragraphs {
            let _ = writeln!(out, "<p>{}</p>", escape_markup(paragraph));
        }
    }

    write_html_list(&mut out, "Sources", "ol", &report.sources);
    write_html_list(&mut out, "Tools Used", "ul", &report.tools_used);
    write_html_list(&mut out, "Key Insights", "ul", &report.key_insights);

    let _ = writeln!(out, "</body>\n</html>");
    out
}

fn write_html_list(out: &mut String, heading: &str, tag: &str, items: &[String]) {
    let _ = writeln!(out, "<h2>{heading}</h2>\n<{tag}>");
    for item in items {
        let _ = writeln!(out, "<li>{}</li>", escape_markup(item));
    }
    let _ = writeln!(out, "</{tag}>");
}

/// Outcome of a save, phrased for the agent that asked for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReceipt {
    pub path: PathBuf,
    pub saved: bool,
    pub message: String,
}

/// Append `data` to `path`.
///
/// A JSON object is laid out as a full text report; anything else is
/// written as a timestamped raw record. Failures are described in the
/// receipt rather than returned.
pub fn append_record(data: &str, path: impl AsRef<Path>) -> SaveReceipt {
    let now = Local::now().naive_local();
    let formatted = match serde_json::from_str::<Value>(data) {
        Ok(Value::Object(object)) => render_text(&report_from_object(&object), now),
        _ => format!(
            "--- Research Output ---\nTimestamp: {}\n\n{data}\n\n",
            now.format(TIMESTAMP_FORMAT)
        ),
    };
    receipt(path.as_ref(), append_to(path.as_ref(), &formatted))
}

/// Append an already normalized report in the text layout.
pub fn append_report(report: &StructuredReport, path: impl AsRef<Path>) -> SaveReceipt {
    let formatted = render_text(report, Local::now().naive_local());
    receipt(path.as_ref(), append_to(path.as_ref(), &formatted))
}

fn append_to(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.write_all(text.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn receipt(path: &Path, outcome: Result<()>) -> SaveReceipt {
    match outcome {
        Ok(()) => {
            info!(path = %path.display(), "appended research report");
            SaveReceipt {
                path: path.to_path_buf(),
                saved: true,
                message: format!("Research report successfully saved to {}", path.display()),
            }
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to save research report");
            SaveReceipt {
                path: path.to_path_buf(),
                saved: false,
                message: format!("Could not save research report to {}: {err:#}", path.display()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> StructuredReport {
        StructuredReport {
            topic: "Tides & <currents>".into(),
            abstract_text: "Short abstract.".into(),
            detailed_findings: "Lead-in.\n\n## Background\n\nFirst para.\n\nSecond para.\n\n## Challenges\n\nHard \"parts\".".into(),
            sources: vec!["Journal A".into(), "Book B".into()],
            tools_used: vec!["Search".into()],
            key_insights: vec!["Insight one".into()],
        }
    }

    fn fixed_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|date| date.and_hms_opt(14, 5, 0))
            .expect("valid timestamp")
    }

    #[test]
    fn findings_split_into_titled_sections() {
        let sections = findings_sections(&sample().detailed_findings);
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].title, "");
        assert_eq!(sections[0].paragraphs, vec!["Lead-in."]);
        assert_eq!(sections[1].title, "Background");
        assert_eq!(sections[1].paragraphs, vec!["First para.", "Second para."]);
        assert_eq!(sections[2].title, "Challenges");
    }

    #[test]
    fn text_layout_numbers_sources_and_bullets_lists() {
        let text = render_text(&sample(), fixed_time());
        assert!(text.contains("COMPREHENSIVE RESEARCH REPORT"));
        assert!(text.contains("Generated: 2024-03-09 14:05:00"));
        assert!(text.contains("RESEARCH TOPIC:\nTides & <currents>\n"));
        assert!(text.contains("SOURCES / REFERENCES:\n1. Journal A\n2. Book B\n"));
        assert!(text.contains("RESEARCH METHODOLOGY & TOOLS USED:\n• Search\n"));
        assert!(text.contains("KEY INSIGHTS:\n• Insight one\n"));
        assert!(text.contains("End of Research Report"));
    }

    #[test]
    fn blank_text_fields_print_as_missing() {
        let text = render_text(&StructuredReport::empty(""), fixed_time());
        assert!(text.contains("RESEARCH TOPIC:\nN/A\n"));
        assert!(text.contains("ABSTRACT / EXECUTIVE SUMMARY:\nN/A\n"));
    }

    #[test]
    fn html_escapes_every_field() {
        let html = render_html(&sample());
        assert!(html.contains("<h1>Tides &amp; &lt;currents&gt;</h1>"));
        assert!(html.contains("<h3>Background</h3>"));
        assert!(html.contains("<p>Hard &quot;parts&quot;.</p>"));
        assert!(html.contains("<ol>\n<li>Journal A</li>"));
        assert!(!html.contains("<currents>"));
    }

    #[test]
    fn markdown_demotes_findings_headings() {
        let markdown = render_markdown(&sample());
        assert!(markdown.starts_with("# Tides &amp; &lt;currents&gt;"));
        assert!(markdown.contains("### Background\n\nFirst para."));
        assert!(markdown.contains("1. Journal A\n2. Book B"));
        assert!(markdown.contains("- Insight one"));
        assert!(!markdown.contains("<currents>"));
    }

    #[test]
    fn markdown_escapes_markup_in_every_field() {
        let report = StructuredReport {
            topic: "<script>alert(1)</script>".into(),
            abstract_text: "Uses *bold* and [links](x).".into(),
            detailed_findings: "## <b>Heading</b>\n\nBody with `code` & <i>tags</i>.".into(),
            sources: vec!["<a href=\"x\">src</a>".into()],
            tools_used: vec!["snake_case_tool".into()],
            key_insights: vec!["<img src=x>".into()],
        };
        let markdown = render_markdown(&report);

        assert!(markdown.starts_with("# &lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!markdown.contains("<script>"));
        assert!(!markdown.contains('<'));
        assert!(markdown.contains("Uses \\*bold\\* and \\[links\\](x)."));
        assert!(markdown.contains("### &lt;b&gt;Heading&lt;/b&gt;"));
        assert!(markdown.contains("Body with \\`code\\` &amp; &lt;i&gt;tags&lt;/i&gt;."));
        assert!(markdown.contains("- snake\\_case\\_tool"));
    }

    #[test]
    fn formats_parse_from_cli_names() {
        assert_eq!("md".parse::<ExportFormat>(), Ok(ExportFormat::Markdown));
        assert_eq!("HTML".parse::<ExportFormat>(), Ok(ExportFormat::Html));
        assert_eq!("txt".parse::<ExportFormat>(), Ok(ExportFormat::Text));
        assert!("pdf".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn append_record_formats_json_and_raw_text() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("nested").join("research_output.txt");

        let receipt = append_record(
            r#"{"topic":"Reefs","abstract":"A","sources":["S1","S2"]}"#,
            &path,
        );
        assert!(receipt.saved);
        assert_eq!(
            receipt.message,
            format!("Research report successfully saved to {}", path.display())
        );

        append_record("just some notes", &path);
        let written = std::fs::read_to_string(&path).expect("saved file");
        assert!(written.contains("RESEARCH TOPIC:\nReefs"));
        assert!(written.contains("DETAILED FINDINGS:\nN/A"));
        assert!(written.contains("2. S2"));
        assert!(written.contains("--- Research Output ---\nTimestamp: "));
        assert!(written.ends_with("just some notes\n\n"));
    }

    #[test]
    fn unwritable_destination_is_reported_not_raised() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let receipt = append_report(&sample(), dir.path());
        assert!(!receipt.saved);
        assert!(receipt.message.starts_with("Could not save research report"));
    }
}
