//! Metric naming for routed requests.
//!
//! # Responsibilities
//! - Turn an HTTP method and a route template into a metric name segment
//! - Derive the request/response prefixed names used by gauges and counters
//!
//! # Design Decisions
//! - Pure and deterministic: same (method, template) always yields the same name
//! - Unmetricable templates (empty, `/`, whitespace) yield `None`; callers skip
//!   all telemetry for the request instead of emitting a malformed name
//!
//! ```text
//! GET  /api/v2/alert/{id}/   →  api.v2.alert._id_.GET
//! POST api/orders/{id:int}   →  api.orders._idint_.POST
//! GET  /                     →  None
//! ```

use std::fmt;

const PATH_SEPARATOR: char = '/';
const SEGMENT_SEPARATOR: char = '.';
const REQUEST_PREFIX: &str = "request";
const RESPONSE_PREFIX: &str = "response";

/// Canonical metric name segment for one route and method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricName(String);

impl MetricName {
    /// Name used by request-side metrics (in-flight gauges).
    pub fn request_prefix(&self) -> String {
        format!("{REQUEST_PREFIX}.{}", self.0)
    }

    /// Name used by response-side metrics, without the status code.
    pub fn response_prefix(&self) -> String {
        format!("{RESPONSE_PREFIX}.{}", self.0)
    }

    /// Response-side name decomposed by status code.
    pub fn with_status(&self, status: u16) -> String {
        format!("{}.{status}", self.response_prefix())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build the metric name segment for a route template.
///
/// Returns `None` when nothing metric-friendly remains of the template.
pub fn metric_name(http_method: &str, route_template: &str) -> Option<MetricName> {
    let trimmed = route_template.trim_matches(PATH_SEPARATOR);

    let mut id = String::with_capacity(trimmed.len() + http_method.len() + 1);
    for c in trimmed.chars() {
        match c {
            PATH_SEPARATOR => id.push(SEGMENT_SEPARATOR),
            ':' => {}
            '{' | '}' => id.push('_'),
            other => id.push(other),
        }
    }

    if id.trim().is_empty() {
        return None;
    }

    id.push(SEGMENT_SEPARATOR);
    id.push_str(http_method);
    Some(MetricName(id))
}
