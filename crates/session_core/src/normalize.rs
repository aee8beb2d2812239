//! Defensive boundary between backend JSON and the canonical model. The
//! backend's shape has drifted across versions (camelCase vs snake_case
//! explanation fields, optional metric channels), so everything is decoded
//! leniently from `serde_json::Value` with safe defaults. Nothing in this
//! module can fail.

use serde_json::Value;
use shared::domain::{
    DependencyEdge, Explanation, MetricPoint, MetricsBundle, MitigationSuggestion, ServiceNode,
    SimulationState, SystemMode, SystemTopology,
};
use tracing::debug;

/// Canonicalize a simulate response. Missing or malformed sections become
/// empty; downstream consumers never observe "missing", only "empty".
pub fn normalize_simulation(raw: &Value) -> SimulationState {
    SimulationState {
        system_mode: system_mode(raw.get("system_mode")),
        topology: normalize_topology(raw.get("topology")),
        metrics: normalize_metrics(raw.get("metrics")),
    }
}

/// Canonicalize an explain response. Accepts both historically observed
/// spellings for the factor and mitigation fields; snake_case is canonical
/// and wins when both are present.
pub fn normalize_explanation(raw: &Value) -> Explanation {
    Explanation {
        text: string_seq(field(raw, &["text"])),
        identified_factors: string_seq(field(raw, &["identified_factors", "identifiedFactors"])),
        mitigation_suggestions: mitigation_seq(field(
            raw,
            &["mitigation_suggestions", "mitigationSuggestions"],
        )),
    }
}

fn field<'a>(raw: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| raw.get(name))
}

fn system_mode(value: Option<&Value>) -> SystemMode {
    match value.and_then(Value::as_str) {
        Some("healthy") | None => SystemMode::Healthy,
        Some("degraded") => SystemMode::Degraded,
        Some("unhealthy") => SystemMode::Unhealthy,
        Some(other) => {
            debug!(mode = other, "unrecognized system mode, keeping healthy");
            SystemMode::Healthy
        }
    }
}

fn normalize_topology(value: Option<&Value>) -> SystemTopology {
    SystemTopology {
        services: elements(value, "services")
            .iter()
            .filter_map(service_entry)
            .collect(),
        dependencies: elements(value, "dependencies")
            .iter()
            .filter_map(dependency_entry)
            .collect(),
    }
}

fn normalize_metrics(value: Option<&Value>) -> MetricsBundle {
    MetricsBundle {
        latency_ms: metric_series(value, "latency_ms"),
        error_rate_pct: metric_series(value, "error_rate_pct"),
        request_volume: metric_series(value, "request_volume"),
        queue_depth: metric_series(value, "queue_depth"),
    }
}

fn elements<'a>(value: Option<&'a Value>, key: &str) -> &'a [Value] {
    value
        .and_then(|v| v.get(key))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn service_entry(entry: &Value) -> Option<ServiceNode> {
    if !entry.is_object() {
        debug!(%entry, "dropping non-object service entry");
        return None;
    }
    Some(ServiceNode {
        id: string_or_empty(entry.get("id")),
        name: string_or_empty(entry.get("name")),
        status: system_mode(entry.get("status")),
        latency_ms: number_or_zero(entry.get("latency_ms")),
        error_rate_pct: number_or_zero(entry.get("error_rate_pct")),
    })
}

fn dependency_entry(entry: &Value) -> Option<DependencyEdge> {
    if !entry.is_object() {
        debug!(%entry, "dropping non-object dependency entry");
        return None;
    }
    Some(DependencyEdge {
        source: string_or_empty(entry.get("source")),
        target: string_or_empty(entry.get("target")),
    })
}

fn metric_series(value: Option<&Value>, channel: &str) -> Vec<MetricPoint> {
    elements(value, channel)
        .iter()
        .filter_map(|entry| {
            if !entry.is_object() {
                debug!(channel, %entry, "dropping non-object metric point");
                return None;
            }
            Some(MetricPoint {
                time: number_or_zero(entry.get("time")),
                value: number_or_zero(entry.get("value")),
            })
        })
        .collect()
}

fn string_seq(value: Option<&Value>) -> Vec<String> {
    let Some(entries) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| match entry {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            other => {
                debug!(%other, "dropping non-scalar string entry");
                None
            }
        })
        .collect()
}

fn mitigation_seq(value: Option<&Value>) -> Vec<MitigationSuggestion> {
    let Some(entries) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            if !entry.is_object() {
                debug!(%entry, "dropping non-object mitigation entry");
                return None;
            }
            Some(MitigationSuggestion {
                action: string_or_empty(entry.get("action")),
                description: string_or_empty(entry.get("description")),
            })
        })
        .collect()
}

fn string_or_empty(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}

fn number_or_zero(value: Option<&Value>) -> f64 {
    value.and_then(Value::as_f64).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn empty_object_yields_fully_defaulted_simulation() {
        let state = normalize_simulation(&json!({}));
        assert_eq!(state.system_mode, SystemMode::Healthy);
        assert!(state.topology.services.is_empty());
        assert!(state.topology.dependencies.is_empty());
        assert!(state.metrics.latency_ms.is_empty());
        assert!(state.metrics.queue_depth.is_empty());
    }

    #[test]
    fn non_object_payloads_do_not_panic() {
        for raw in [json!(null), json!(42), json!("nope"), json!([1, 2, 3])] {
            let state = normalize_simulation(&raw);
            assert_eq!(state, SimulationState::default());
            let explanation = normalize_explanation(&raw);
            assert_eq!(explanation, Explanation::default());
        }
    }

    #[test]
    fn partial_metrics_channels_default_to_empty() {
        let state = normalize_simulation(&json!({
            "metrics": {
                "latency_ms": [{"time": 0, "value": 120.5}, {"time": 1, "value": 130.0}],
                "queue_depth": "not-a-series",
            }
        }));
        assert_eq!(state.metrics.latency_ms.len(), 2);
        assert_eq!(state.metrics.latency_ms[1].value, 130.0);
        assert!(state.metrics.error_rate_pct.is_empty());
        assert!(state.metrics.request_volume.is_empty());
        assert!(state.metrics.queue_depth.is_empty());
    }

    #[test]
    fn service_fields_get_safe_defaults() {
        let state = normalize_simulation(&json!({
            "system_mode": "degraded",
            "topology": {
                "services": [
                    {"id": "database", "name": "Database", "status": "unhealthy",
                     "latency_ms": 1450.0, "error_rate_pct": 6.5},
                    {"id": "api_gateway"},
                    "garbage",
                ],
                "dependencies": [
                    {"source": "api_gateway", "target": "database"},
                    {"source": "api_gateway"},
                ],
            }
        }));
        assert_eq!(state.system_mode, SystemMode::Degraded);
        assert_eq!(state.topology.services.len(), 2);
        assert_eq!(state.topology.services[0].status, SystemMode::Unhealthy);
        assert_eq!(state.topology.services[1].name, "");
        assert_eq!(state.topology.services[1].latency_ms, 0.0);
        assert_eq!(state.topology.services[1].status, SystemMode::Healthy);
        assert_eq!(state.topology.dependencies.len(), 2);
        assert_eq!(state.topology.dependencies[1].target, "");
    }

    #[test]
    fn unknown_system_mode_falls_back_to_healthy() {
        let state = normalize_simulation(&json!({"system_mode": "on_fire"}));
        assert_eq!(state.system_mode, SystemMode::Healthy);
    }

    #[test]
    fn explanation_missing_fields_become_empty_sequences() {
        for raw in [
            json!({}),
            json!({"text": null}),
            json!({"text": "not-an-array", "identified_factors": 7}),
            json!({"mitigation_suggestions": {"action": "scale"}}),
        ] {
            let explanation = normalize_explanation(&raw);
            assert!(explanation.text.is_empty());
            assert!(explanation.identified_factors.is_empty());
            assert!(explanation.mitigation_suggestions.is_empty());
        }
    }

    #[test]
    fn explanation_accepts_snake_case_wire_fields() {
        let explanation = normalize_explanation(&json!({
            "text": ["System is degraded.", "Database latency is propagating."],
            "identified_factors": ["database latency", "queue growth"],
            "mitigation_suggestions": [
                {"action": "Add read replicas", "description": "Spread query load."},
            ],
        }));
        assert_eq!(explanation.text.len(), 2);
        assert_eq!(explanation.identified_factors.len(), 2);
        assert_eq!(explanation.mitigation_suggestions[0].action, "Add read replicas");
    }

    #[test]
    fn explanation_accepts_camel_case_wire_fields() {
        let explanation = normalize_explanation(&json!({
            "text": ["System is degraded."],
            "identifiedFactors": ["retry storm"],
            "mitigationSuggestions": [
                {"action": "Add jitter", "description": "Back off retries."},
            ],
        }));
        assert_eq!(explanation.identified_factors, vec!["retry storm"]);
        assert_eq!(explanation.mitigation_suggestions.len(), 1);
    }

    #[test]
    fn snake_case_wins_when_both_spellings_are_present() {
        let explanation = normalize_explanation(&json!({
            "identified_factors": ["canonical"],
            "identifiedFactors": ["deprecated"],
        }));
        assert_eq!(explanation.identified_factors, vec!["canonical"]);
    }

    #[test]
    fn scalar_factors_are_stringified_and_structural_entries_dropped() {
        let explanation = normalize_explanation(&json!({
            "identified_factors": ["queue growth", 42, true, {"nested": "object"}, null],
        }));
        assert_eq!(explanation.identified_factors, vec!["queue growth", "42", "true"]);
    }

    #[test]
    fn mitigation_entries_tolerate_missing_subfields() {
        let explanation = normalize_explanation(&json!({
            "mitigation_suggestions": [
                {"action": "Add capacity"},
                {"description": "orphan description"},
                "free-floating string",
            ],
        }));
        assert_eq!(explanation.mitigation_suggestions.len(), 2);
        assert_eq!(explanation.mitigation_suggestions[0].description, "");
        assert_eq!(explanation.mitigation_suggestions[1].action, "");
    }
}
