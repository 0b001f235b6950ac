//! Append-only JSONL log of completed report sessions.
//!
//! Records land in `<base>/YYYY/MM/session.jsonl`; anything that looks like
//! a credential is redacted first and the redaction noted in `audit.jsonl`.

use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{self, OpenOptions, create_dir_all};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::warn;

use crate::parser::ParseStage;
use crate::report::ReportField;

const LOG_DIR_ENV: &str = "RESEARCH_LOG_DIR";
const RETENTION_ENV: &str = "RESEARCH_LOG_RETENTION_DAYS";
const DEFAULT_LOG_DIR: &str = "data/logs";
const DEFAULT_RETENTION_DAYS: u64 = 90;

pub const SESSION_LOG_FILE: &str = "session.jsonl";
pub const AUDIT_LOG_FILE: &str = "audit.jsonl";

static REDACTION_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        (
            "api_key",
            Regex::new(r"(?i)(api[_-]?key\s*[:=]\s*)([A-Za-z0-9\-_.+/]+)")
                .expect("invalid api_key regex"),
        ),
        (
            "secret",
            Regex::new(r"(?i)(secret\s*[:=]\s*)([A-Za-z0-9\-_.+/]+)")
                .expect("invalid secret regex"),
        ),
        (
            "bearer",
            Regex::new(r"(?i)(bearer\s+)([A-Za-z0-9\-_.+=/]+)").expect("invalid bearer regex"),
        ),
        (
            "google_key",
            Regex::new(r"(AIza[0-9A-Za-z\-_]{35})").expect("invalid google_key regex"),
        ),
    ]
});

/// What gets recorded about one finished session.
#[derive(Debug, Clone)]
pub struct ReportLogInput {
    pub session_id: String,
    pub topic: String,
    pub stage: ParseStage,
    pub enhanced: Vec<ReportField>,
    pub regenerated: bool,
    pub sources: Vec<String>,
    pub trace_path: Option<String>,
}

/// One line of `session.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportLogRecord {
    pub timestamp: String,
    pub session_id: String,
    pub topic: String,
    pub stage: ParseStage,
    #[serde(default)]
    pub enhanced: Vec<ReportField>,
    #[serde(default)]
    pub regenerated: bool,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub trace_path: Option<String>,
    #[serde(default)]
    pub redactions: Vec<String>,
}

#[derive(Serialize)]
struct AuditLogRecord<'a> {
    timestamp: &'a str,
    session_id: &'a str,
    redactions: &'a [String],
}

fn log_base_dir() -> PathBuf {
    std::env::var(LOG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_LOG_DIR))
}

fn retention_days() -> u64 {
    std::env::var(RETENTION_ENV)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETENTION_DAYS)
}

fn append_json_line<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)
            .with_context(|| format!("failed to create log directory {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let line = serde_json::to_string(value)?;
    writeln!(writer, "{line}")
        .with_context(|| format!("failed to append log entry to {}", path.display()))?;
    writer.flush()?;
    Ok(())
}

/// Replace credential-looking substrings, remembering which patterns fired.
pub fn sanitize_text(input: &str, redactions: &mut BTreeSet<String>) -> String {
    let mut output = input.to_string();
    for (name, regex) in REDACTION_PATTERNS.iter() {
        let mut matched = false;
        output = regex
            .replace_all(&output, |caps: &Captures| {
                matched = true;
                if caps.len() > 2 {
                    format!("{}[REDACTED]", &caps[1])
                } else {
                    "[REDACTED]".to_string()
                }
            })
            .to_string();
        if matched {
            redactions.insert((*name).to_string());
        }
    }
    output
}

/// Log a completed session under `RESEARCH_LOG_DIR` (default `data/logs`).
pub fn log_report_completion(input: ReportLogInput) -> Result<PathBuf> {
    let base_dir = log_base_dir();
    let path = log_report_completion_in(&base_dir, input)?;
    enforce_retention(&base_dir, retention_days())?;
    Ok(path)
}

/// Like [`log_report_completion`] with an explicit base directory and no
/// retention pass. Returns the session log path written to.
pub fn log_report_completion_in(base_dir: &Path, input: ReportLogInput) -> Result<PathBuf> {
    let timestamp = Utc::now();
    let mut redactions = BTreeSet::new();

    let topic = sanitize_text(&input.topic, &mut redactions);
    let sources: Vec<String> = input
        .sources
        .iter()
        .map(|source| sanitize_text(source, &mut redactions))
        .collect();

    let record = ReportLogRecord {
        timestamp: timestamp.to_rfc3339(),
        session_id: input.session_id,
        topic,
        stage: input.stage,
        enhanced: input.enhanced,
        regenerated: input.regenerated,
        sources,
        trace_path: input.trace_path,
        redactions: redactions.into_iter().collect(),
    };

    let month_dir = base_dir
        .join(format!("{:04}", timestamp.year()))
        .join(format!("{:02}", timestamp.month()));
    let session_log_path = month_dir.join(SESSION_LOG_FILE);
    append_json_line(&session_log_path, &record)?;

    if !record.redactions.is_empty() {
        let audit = AuditLogRecord {
            timestamp: &record.timestamp,
            session_id: &record.session_id,
            redactions: &record.redactions,
        };
        append_json_line(&month_dir.join(AUDIT_LOG_FILE), &audit)?;
        warn!(
            session_id = %record.session_id,
            fields = ?record.redactions,
            "redacted potential secrets from session log"
        );
    }

    Ok(session_log_path)
}

fn enforce_retention(base_dir: &Path, retention: u64) -> Result<()> {
    if retention == 0 || !base_dir.exists() {
        return Ok(());
    }
    let cutoff = SystemTime::now()
        .checked_sub(Duration::from_secs(retention.saturating_mul(86_400)))
        .unwrap_or(SystemTime::UNIX_EPOCH);

    prune_directory(base_dir, cutoff)
}

fn prune_directory(dir: &Path, cutoff: SystemTime) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let metadata = entry.metadata()?;
        if metadata.is_dir() {
            prune_directory(&path, cutoff)?;
            if path.read_dir()?.next().is_none() {
                fs::remove_dir(&path).ok();
            }
        } else if metadata.is_file()
            && metadata
                .modified()
                .map(|time| time < cutoff)
                .unwrap_or(false)
        {
            fs::remove_file(&path).ok();
        }
    }

    Ok(())
}
