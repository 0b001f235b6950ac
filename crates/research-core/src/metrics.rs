use anyhow::Result;
use once_cell::sync::OnceCell;
use opentelemetry::metrics::{Counter, Meter};
use opentelemetry::{KeyValue, global};
use tracing::info;

use crate::parser::ParseStage;
use crate::report::ReportField;

const METRICS_ENDPOINT_ENV: &str = "RESEARCH_OTEL_METRICS_ENDPOINT";

struct NormalizationMetrics {
    reports: Counter<u64>,
    enhanced_fields: Counter<u64>,
    regenerations: Counter<u64>,
}

static METRICS: OnceCell<NormalizationMetrics> = OnceCell::new();

fn handles() -> &'static NormalizationMetrics {
    METRICS.get_or_init(|| {
        let meter: Meter = global::meter("research.normalize");
        NormalizationMetrics {
            reports: meter
                .u64_counter("reports_normalized_total")
                .with_description("Reports normalized, by the parse stage that produced them")
                .init(),
            enhanced_fields: meter
                .u64_counter("report_fields_enhanced_total")
                .with_description("Report fields replaced with synthesized content")
                .init(),
            regenerations: meter
                .u64_counter("report_leakage_regenerations_total")
                .with_description("Reports discarded because findings contained serialized data")
                .init(),
        }
    })
}

/// Hint to operators that OTEL metrics export can be configured externally.
pub fn init_metrics_from_env(service_name: &str) -> Result<()> {
    if std::env::var(METRICS_ENDPOINT_ENV).is_ok() {
        info!(
            target = "telemetry",
            "{METRICS_ENDPOINT_ENV} detected for {service_name}. Configure an OTLP meter provider in your deployment to export normalization metrics."
        );
    }
    Ok(())
}

/// Record OTEL metrics for one normalized report (no-op if no provider installed).
pub fn record_normalization_metrics(stage: ParseStage, enhanced: &[ReportField], regenerated: bool) {
    let metrics = handles();
    let stage_attr = KeyValue::new("stage", stage.as_str());

    metrics.reports.add(1, &[stage_attr.clone()]);
    for field in enhanced {
        metrics
            .enhanced_fields
            .add(1, &[stage_attr.clone(), KeyValue::new("field", field.as_str())]);
    }
    if regenerated {
        metrics.regenerations.add(1, &[stage_attr]);
    }
}
