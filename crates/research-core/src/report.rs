//! The structured research report every normalization stage converges on.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Default number of reports retained by [`ReportHistory`].
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// Six-field research report produced by the normalization pipeline.
///
/// Deserialization is strict: all six keys must be present with the right
/// shapes. Lenient decoding of partial objects lives in the parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredReport {
    pub topic: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub detailed_findings: String,
    pub sources: Vec<String>,
    pub tools_used: Vec<String>,
    pub key_insights: Vec<String>,
}

impl StructuredReport {
    /// A report carrying only its topic; every other field starts empty.
    pub fn empty(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            abstract_text: String::new(),
            detailed_findings: String::new(),
            sources: Vec::new(),
            tools_used: Vec::new(),
            key_insights: Vec::new(),
        }
    }

    /// True when any field is blank or any list is empty.
    pub fn has_empty_field(&self) -> bool {
        self.topic.trim().is_empty()
            || self.abstract_text.trim().is_empty()
            || self.detailed_findings.trim().is_empty()
            || self.sources.is_empty()
            || self.tools_used.is_empty()
            || self.key_insights.is_empty()
    }
}

/// Names a report field, used when reporting which fields were synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportField {
    Topic,
    Abstract,
    DetailedFindings,
    Sources,
    ToolsUsed,
    KeyInsights,
}

impl ReportField {
    pub const ALL: [ReportField; 6] = [
        ReportField::Topic,
        ReportField::Abstract,
        ReportField::DetailedFindings,
        ReportField::Sources,
        ReportField::ToolsUsed,
        ReportField::KeyInsights,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportField::Topic => "topic",
            ReportField::Abstract => "abstract",
            ReportField::DetailedFindings => "detailed_findings",
            ReportField::Sources => "sources",
            ReportField::ToolsUsed => "tools_used",
            ReportField::KeyInsights => "key_insights",
        }
    }
}

impl fmt::Display for ReportField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bounded recency list of finished reports, owned by the caller.
///
/// The normalization pipeline never touches it; front ends push each
/// finished report so recent topics can be listed.
#[derive(Debug, Clone)]
pub struct ReportHistory {
    entries: VecDeque<StructuredReport>,
    capacity: usize,
}

impl ReportHistory {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// Capacity is clamped to at least one entry.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a report, evicting the oldest entry once capacity is exceeded.
    pub fn push(&mut self, report: StructuredReport) {
        self.entries.push_back(report);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Iterate newest first.
    pub fn iter(&self) -> impl Iterator<Item = &StructuredReport> {
        self.entries.iter().rev()
    }

    pub fn latest(&self) -> Option<&StructuredReport> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ReportHistory {
    fn default() -> Self {
        Self::new()
    }
}
