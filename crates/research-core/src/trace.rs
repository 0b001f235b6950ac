//! Timeline of the decisions each workflow task made for one session.
//!
//! Tasks append [`TraceEvent`]s to the graph context; once a session ends
//! they are wrapped in a [`SessionTrace`] for `--explain` output or written
//! next to the completion log as JSON Lines.

use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub task: String,
    pub note: String,
    pub at: DateTime<Utc>,
}

impl TraceEvent {
    pub fn new(task: impl Into<String>, note: impl Into<String>) -> Self {
        Self::at(task, note, Utc::now())
    }

    pub fn at(task: impl Into<String>, note: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            task: task.into(),
            note: note.into(),
            at,
        }
    }
}

/// One rendered line of a trace: the event plus its offset from the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceStep<'a> {
    pub task: &'a str,
    pub note: &'a str,
    pub offset_ms: i64,
}

/// Events of a finished session, in recording order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTrace {
    events: Vec<TraceEvent>,
}

impl From<Vec<TraceEvent>> for SessionTrace {
    fn from(events: Vec<TraceEvent>) -> Self {
        Self { events }
    }
}

impl SessionTrace {
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Tasks in the order they ran, repeats included.
    pub fn tasks(&self) -> Vec<&str> {
        self.events.iter().map(|event| event.task.as_str()).collect()
    }

    pub fn visited(&self, task: &str) -> bool {
        self.events.iter().any(|event| event.task == task)
    }

    pub fn steps(&self) -> Vec<TraceStep<'_>> {
        let Some(start) = self.events.first().map(|event| event.at) else {
            return Vec::new();
        };
        self.events
            .iter()
            .map(|event| TraceStep {
                task: &event.task,
                note: &event.note,
                offset_ms: (event.at - start).num_milliseconds().max(0),
            })
            .collect()
    }

    /// Numbered list with each step's offset from session start.
    pub fn render_markdown(&self) -> String {
        let steps = self.steps();
        if steps.is_empty() {
            return "No trace events recorded.".to_string();
        }
        let mut output = String::from("### Normalization Trace\n");
        for (idx, step) in steps.iter().enumerate() {
            let _ = writeln!(
                output,
                "{}. `{}` (+{} ms): {}",
                idx + 1,
                step.task,
                step.offset_ms,
                step.note
            );
        }
        output
    }
}

/// Write `events` to `<dir>/<session_id>.trace.jsonl`, one event per line.
pub fn persist_trace<P: AsRef<Path>>(
    dir: P,
    session_id: &str,
    events: &[TraceEvent],
) -> Result<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create trace directory {}", dir.display()))?;
    let path = dir.join(format!("{session_id}.trace.jsonl"));
    let file = File::create(&path)
        .with_context(|| format!("failed to create trace file {}", path.display()))?;

    let mut writer = BufWriter::new(file);
    for event in events {
        serde_json::to_writer(&mut writer, event)?;
        writer.write_all(b"\n")?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to write trace file {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn timeline() -> SessionTrace {
        let start = Utc::now();
        SessionTrace::from(vec![
            TraceEvent::at("agent", "received 512 bytes", start),
            TraceEvent::at(
                "normalize",
                "stage strict_decode, 0 field(s) enhanced",
                start + Duration::milliseconds(40),
            ),
            TraceEvent::at("finalize", "report ready", start + Duration::milliseconds(41)),
        ])
    }

    #[test]
    fn markdown_lists_steps_with_offsets() {
        let markdown = timeline().render_markdown();
        assert!(markdown.starts_with("### Normalization Trace\n"));
        assert!(markdown.contains("1. `agent` (+0 ms): received 512 bytes"));
        assert!(markdown.contains("2. `normalize` (+40 ms): stage strict_decode"));
        assert!(markdown.contains("3. `finalize` (+41 ms)"));
    }

    #[test]
    fn tasks_keep_recording_order() {
        let trace = timeline();
        assert_eq!(trace.tasks(), vec!["agent", "normalize", "finalize"]);
        assert!(trace.visited("normalize"));
        assert!(!trace.visited("regenerate"));
    }

    #[test]
    fn empty_trace_says_so() {
        let trace = SessionTrace::default();
        assert!(trace.steps().is_empty());
        assert_eq!(trace.render_markdown(), "No trace events recorded.");
    }

    #[test]
    fn persisted_trace_is_one_event_per_line() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let trace = timeline();
        let path = persist_trace(dir.path().join("traces"), "session-1", trace.events())?;
        assert!(path.ends_with("session-1.trace.jsonl"));

        let loaded = fs::read_to_string(&path)?
            .lines()
            .map(serde_json::from_str::<TraceEvent>)
            .collect::<Result<Vec<_>, _>>()?;
        assert_eq!(loaded, trace.events());
        Ok(())
    }
}
