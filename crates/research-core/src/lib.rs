//! Research report normalization built on top of `graph_flow`.
//!
//! Raw agent output goes through strict decoding, heuristic object
//! extraction or plain-text salvage, then an enhancer that replaces weak
//! fields with synthesized content. The result is always a complete
//! [`StructuredReport`].

mod agent;
mod config;
mod enhancer;
mod error;
mod eval;
mod export;
mod extract;
mod logging;
mod metrics;
mod parser;
mod report;
mod security;
mod synthesizer;
mod tasks;
mod telemetry;
mod trace;
mod workflow;

pub use agent::{
    AgentRequest, AgentResponse, CommandAgent, CommandAgentConfig, DynAgent, ResearchAgent,
    SAVE_TOOL_NAME, SEARCH_TOOL_NAME, StaticAgent, ToolDescriptor, WIKI_TOOL_NAME, default_tools,
};
pub use config::{
    AgentConfig, Config, ConfigLoader, ExportConfig, HistoryConfig, LlmConfig, LoggingConfig,
    SearchConfig,
};
pub use enhancer::{
    FALLBACK_TOPIC, MIN_ABSTRACT_WORDS, MIN_FINDINGS_CHARS, MIN_KEY_INSIGHTS, MIN_SOURCES,
    MIN_TOOLS_USED, enhance, enhance_with_report,
};
pub use error::ResearchError;
pub use eval::{EvaluationHarness, EvaluationMetrics};
pub use export::{
    ExportFormat, FindingsSection, SaveReceipt, append_record, append_report, escape_markup,
    findings_sections, render, render_html, render_markdown, render_text,
};
pub use extract::{ExtractionStrategy, JsonObject, STRATEGIES, balanced_object_end, extract_object};
pub use logging::{ReportLogInput, ReportLogRecord, log_report_completion, log_report_completion_in};
pub use metrics::{init_metrics_from_env, record_normalization_metrics};
pub use parser::{
    ParseOutcome, ParseStage, guard_leakage, has_leakage, normalize, parse, parse_with_outcome,
    report_from_object,
};
pub use report::{DEFAULT_HISTORY_CAPACITY, ReportField, ReportHistory, StructuredReport};
pub use security::{SearchCredentials, SecretValue, require_env};
pub use synthesizer::{
    SectionKind, assemble_findings, default_tools_used, synthesize, synthesize_findings,
    synthesize_insights, synthesize_sources,
};
pub use telemetry::{TelemetryOptions, init_telemetry};
pub use trace::{SessionTrace, TraceEvent, TraceStep, persist_trace};
pub use workflow::{ReportSessionOptions, ReportSessionOutcome, run_report_session};
