//! Response-side metric emission across the aggregation tiers.
//!
//! # Responsibilities
//! - Emit the per-route and overall counters for one completed request
//! - Apply the conditional shard/cluster rollup rule
//! - Record latency and total time when a start timestamp is known
//!
//! # Data Flow
//! ```text
//! RequestOutcome
//!     → response.<name>.<status>.cumulative            (counter, full tags)
//!     → response.<name>.<status>.aggregated_per_<tier> (delta counters)
//!     → response.<name>.errors, response.errors, ...  (4xx/5xx only)
//!     → response.completed.aggregated_per_<tier>
//!     → response.<name>.<status>.latency / total_time  (latency known)
//! ```
//!
//! # Design Decisions
//! - Emission order is fixed, and each sink failure is logged without
//!   stopping the remaining emissions
//! - Overall tier tags are computed once at construction

use std::sync::Arc;

use crate::naming::MetricName;
use crate::sink::{MetricKey, MetricsSink, SinkError, Unit};
use crate::tags::{TagSet, TagSetBuilder, Tier, TierTags};
use crate::tracer::is_error_status;

const CUMULATIVE_SUFFIX: &str = "cumulative";
const ERRORS_SUFFIX: &str = "errors";
const LATENCY_SUFFIX: &str = "latency";
const TOTAL_TIME_SUFFIX: &str = "total_time";
const RESPONSE_ERRORS: &str = "response.errors";
const RESPONSE_COMPLETED: &str = "response.completed";

/// Everything the emitter needs about one finished request.
#[derive(Debug, Clone, Copy)]
pub struct RequestOutcome<'a> {
    pub metric_name: &'a MetricName,
    pub status: u16,
    pub tier_tags: &'a TierTags,
    pub latency_ms: Option<u64>,
}

pub struct AggregationEmitter {
    sink: Arc<dyn MetricsSink>,
    context: String,
    overall: TierTags,
    rollups: Vec<Tier>,
}

impl AggregationEmitter {
    pub fn new(sink: Arc<dyn MetricsSink>, builder: &TagSetBuilder, context: impl Into<String>) -> Self {
        let rollups = Tier::ALL
            .into_iter()
            .filter(|t| *t != Tier::Source && t.applies_to(builder.identity()))
            .collect();
        Self {
            sink,
            context: context.into(),
            overall: builder.overall(),
            rollups,
        }
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    /// Rollup tiers (excluding the per-source tier) that this identity emits.
    pub fn rollup_tiers(&self) -> &[Tier] {
        &self.rollups
    }

    /// Emit every response-side metric for one request, in order.
    pub fn emit(&self, outcome: &RequestOutcome<'_>) {
        let with_status = outcome.metric_name.with_status(outcome.status);
        let full = outcome.tier_tags.full();

        self.counter(
            MetricKey::counter(&self.context, format!("{with_status}.{CUMULATIVE_SUFFIX}"), Unit::Responses),
            full,
            1,
        );
        for &tier in &self.rollups {
            self.counter(
                MetricKey::delta_counter(
                    &self.context,
                    format!("{with_status}.{}", tier.metric_suffix()),
                    Unit::Responses,
                ),
                outcome.tier_tags.get(tier),
                1,
            );
        }

        if is_error_status(outcome.status) {
            let route_errors = format!("{}.{ERRORS_SUFFIX}", outcome.metric_name.response_prefix());
            self.counter(MetricKey::counter(&self.context, route_errors, Unit::Errors), full, 1);
            self.counter(MetricKey::counter(&self.context, RESPONSE_ERRORS, Unit::Errors), full, 1);
            self.overall_rollup(RESPONSE_ERRORS, Unit::Errors);
        }

        self.overall_rollup(RESPONSE_COMPLETED, Unit::Responses);

        if let Some(latency) = outcome.latency_ms {
            self.histogram(
                MetricKey::histogram(&self.context, format!("{with_status}.{LATENCY_SUFFIX}"), Unit::Milliseconds),
                full,
                latency as f64,
            );
            self.counter(
                MetricKey::counter(&self.context, format!("{with_status}.{TOTAL_TIME_SUFFIX}"), Unit::Milliseconds),
                full,
                latency,
            );
        }
    }

    /// `<prefix>.aggregated_per_source` followed by the applicable rollups.
    fn overall_rollup(&self, prefix: &str, unit: Unit) {
        let source = Tier::Source;
        self.counter(
            MetricKey::counter(&self.context, format!("{prefix}.{}", source.metric_suffix()), unit),
            self.overall.get(source),
            1,
        );
        for &tier in &self.rollups {
            self.counter(
                MetricKey::delta_counter(&self.context, format!("{prefix}.{}", tier.metric_suffix()), unit),
                self.overall.get(tier),
                1,
            );
        }
    }

    fn counter(&self, key: MetricKey, tags: &TagSet, amount: u64) {
        let result = self.sink.increment_counter(&key, tags, amount);
        log_failure(&key, result);
    }

    fn histogram(&self, key: MetricKey, tags: &TagSet, value: f64) {
        let result = self.sink.record_histogram(&key, tags, value);
        log_failure(&key, result);
    }
}

fn log_failure(key: &MetricKey, result: Result<(), SinkError>) {
    if let Err(e) = result {
        tracing::warn!(metric = %key, error = %e, "Failed to report metric");
    }
}
