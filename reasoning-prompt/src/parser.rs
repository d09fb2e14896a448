//! [`ResponseParser`] — extracts the first well-formed JSON object from
//! free-form LLM output and coerces it into a typed [`AnalysisResult`]
//! (spec §4.2). Never panics, never returns an `Err` — on any trouble it
//! degrades to a `partial` result carrying diagnostics.

use reasoning_core::location::CodeLocation;
use reasoning_core::model::*;
use serde_json::Value;

/// Find the first balanced `{ ... }` substring, honoring string literals
/// and escapes so braces inside JSON strings don't confuse the scan.
pub fn extract_first_json_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + 1;
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }
    None
}

fn str_field(v: &Value, key: &str) -> String {
    v.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

fn opt_str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(Value::as_str).map(str::to_string)
}

fn str_array(v: &Value, key: &str) -> Vec<String> {
    v.get(key)
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(|x| x.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

fn f64_field(v: &Value, key: &str) -> f64 {
    v.get(key).and_then(Value::as_f64).unwrap_or(0.0).clamp(0.0, 1.0)
}

fn location_array(v: &Value, key: &str) -> Vec<CodeLocation> {
    v.get(key)
        .and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .filter_map(|x| x.as_str())
                .map(|s| s.parse::<CodeLocation>().unwrap())
                .collect()
        })
        .unwrap_or_default()
}

fn single_location(v: &Value, key: &str) -> CodeLocation {
    v.get(key)
        .and_then(Value::as_str)
        .map(|s| s.parse::<CodeLocation>().unwrap())
        .unwrap_or_else(CodeLocation::unknown)
}

fn parse_status(v: &Value) -> ResultStatus {
    match v.get("status").and_then(Value::as_str) {
        Some("success") => ResultStatus::Success,
        Some("need-more-context") => ResultStatus::NeedMoreContext,
        _ => ResultStatus::Partial,
    }
}

fn parse_bottleneck_kind(s: &str) -> Option<BottleneckKind> {
    match s {
        "n-plus-one" => Some(BottleneckKind::NPlusOne),
        "inefficient-algorithm" => Some(BottleneckKind::InefficientAlgorithm),
        "excessive-io" => Some(BottleneckKind::ExcessiveIo),
        "memory-leak" => Some(BottleneckKind::MemoryLeak),
        _ => None,
    }
}

fn parse_impact_kind(s: &str) -> ImpactKind {
    match s {
        "breaking" => ImpactKind::Breaking,
        "performance" => ImpactKind::Performance,
        _ => ImpactKind::Behavioral,
    }
}

fn parse_priority(s: &str) -> Priority {
    match s {
        "low" => Priority::Low,
        "high" => Priority::High,
        _ => Priority::Medium,
    }
}

fn parse_action_kind(s: &str) -> ActionKind {
    match s {
        "fix" => ActionKind::Fix,
        "refactor" => ActionKind::Refactor,
        "monitor" => ActionKind::Monitor,
        _ => ActionKind::Investigate,
    }
}

fn parse_change_type(s: &str) -> ChangeType {
    match s {
        "create" => ChangeType::Create,
        "delete" => ChangeType::Delete,
        _ => ChangeType::Modify,
    }
}

fn parse_root_causes(v: &Value) -> Vec<RootCause> {
    v.get("rootCauses")
        .and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .map(|rc| RootCause {
                    kind: str_field(rc, "kind"),
                    description: str_field(rc, "description"),
                    evidence: location_array(rc, "evidence"),
                    confidence: f64_field(rc, "confidence"),
                    fix_strategy: str_field(rc, "fixStrategy"),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_execution_paths(v: &Value) -> Vec<ExecutionPath> {
    v.get("executionPaths")
        .and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .map(|ep| {
                    let steps = ep
                        .get("steps")
                        .and_then(Value::as_array)
                        .map(|arr| {
                            arr.iter()
                                .map(|s| ExecutionStep {
                                    location: single_location(s, "location"),
                                    operation: str_field(s, "operation"),
                                    inputs: str_array(s, "inputs"),
                                    outputs: str_array(s, "outputs"),
                                    state_changes: str_array(s, "stateChanges"),
                                })
                                .collect()
                        })
                        .unwrap_or_default();
                    ExecutionPath {
                        id: str_field(ep, "id"),
                        steps,
                        complexity: ComplexityInfo {
                            time: ep.get("complexity").and_then(|c| opt_str_field(c, "time")),
                            space: ep.get("complexity").and_then(|c| opt_str_field(c, "space")),
                            notes: ep.get("complexity").and_then(|c| opt_str_field(c, "notes")),
                        },
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_bottlenecks(v: &Value) -> Vec<PerformanceBottleneck> {
    v.get("performanceBottlenecks")
        .and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .filter_map(|b| {
                    let kind = parse_bottleneck_kind(&str_field(b, "kind"))?;
                    Some(PerformanceBottleneck {
                        kind,
                        location: single_location(b, "location"),
                        impact: BottleneckImpact {
                            estimated_latency: b
                                .get("impact")
                                .and_then(|i| opt_str_field(i, "estimatedLatency")),
                            affected_operations: b
                                .get("impact")
                                .map(|i| str_array(i, "affectedOperations"))
                                .unwrap_or_default(),
                            frequency: b.get("impact").and_then(|i| opt_str_field(i, "frequency")),
                        },
                        suggestion: str_field(b, "suggestion"),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_cross_system(v: &Value) -> Vec<CrossSystemImpact> {
    v.get("crossSystemImpacts")
        .and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .map(|c| CrossSystemImpact {
                    service: str_field(c, "service"),
                    impact_kind: parse_impact_kind(&str_field(c, "impactKind")),
                    affected_endpoints: str_array(c, "affectedEndpoints"),
                    downstream_effects: str_array(c, "downstreamEffects"),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_immediate_actions(v: &Value) -> Vec<ImmediateAction> {
    v.get("immediateActions")
        .and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .map(|ia| ImmediateAction {
                    kind: parse_action_kind(&str_field(ia, "kind")),
                    description: str_field(ia, "description"),
                    priority: parse_priority(&str_field(ia, "priority")),
                    estimated_effort: str_field(ia, "estimatedEffort"),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_code_changes(v: &Value) -> Vec<CodeChange> {
    v.get("codeChangesNeeded")
        .and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .map(|cc| CodeChange {
                    file: str_field(cc, "file"),
                    change_type: parse_change_type(&str_field(cc, "changeType")),
                    description: str_field(cc, "description"),
                    suggested_code: opt_str_field(cc, "suggestedCode"),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Parses raw LLM output into a typed [`AnalysisResult`]. Never throws.
pub struct ResponseParser;

impl ResponseParser {
    /// Parse `raw` model output, falling back to a `partial` result with
    /// diagnostics if no usable JSON object can be found.
    pub fn parse(raw: &str, attempted_approaches: &[String]) -> AnalysisResult {
        let json_text = match extract_first_json_object(raw) {
            Some(t) => t,
            None => {
                tracing::warn!("response parser found no JSON object in provider output");
                return Self::parse_failure_result(
                    "provider output contained no JSON object",
                    attempted_approaches,
                );
            }
        };

        let value: Value = match serde_json::from_str(json_text) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "response parser could not parse extracted JSON");
                return Self::parse_failure_result(
                    &format!("provider JSON failed to parse: {e}"),
                    attempted_approaches,
                );
            }
        };

        let mut enriched = EnrichedContext {
            new_insights: str_array(&value, "newInsights"),
            validated_hypotheses: str_array(&value, "validatedHypotheses"),
            ruled_out_approaches: attempted_approaches.to_vec(),
        };
        if let Some(ec) = value.get("enrichedContext") {
            if enriched.new_insights.is_empty() {
                enriched.new_insights = str_array(ec, "newInsights");
            }
            if enriched.validated_hypotheses.is_empty() {
                enriched.validated_hypotheses = str_array(ec, "validatedHypotheses");
            }
        }

        let recommendations = value
            .get("recommendations")
            .map(|r| Recommendations {
                immediate_actions: parse_immediate_actions(r),
                investigation_next_steps: str_array(r, "investigationNextSteps"),
                code_changes_needed: parse_code_changes(r),
            })
            .unwrap_or_default();

        let findings = value
            .get("findings")
            .map(|f| Findings {
                root_causes: parse_root_causes(f),
                execution_paths: parse_execution_paths(f),
                performance_bottlenecks: parse_bottlenecks(f),
                cross_system_impacts: parse_cross_system(f),
            })
            .unwrap_or_else(|| Findings {
                root_causes: parse_root_causes(&value),
                execution_paths: parse_execution_paths(&value),
                performance_bottlenecks: parse_bottlenecks(&value),
                cross_system_impacts: parse_cross_system(&value),
            });

        let mut result = AnalysisResult {
            status: parse_status(&value),
            findings,
            recommendations,
            enriched_context: enriched,
            metadata: ResultMetadata::default(),
        };
        result.clamp_confidences();
        result
    }

    fn parse_failure_result(diagnostic: &str, attempted_approaches: &[String]) -> AnalysisResult {
        AnalysisResult {
            status: ResultStatus::Partial,
            findings: Findings::default(),
            recommendations: Recommendations {
                immediate_actions: vec![ImmediateAction {
                    kind: ActionKind::Investigate,
                    description: format!("response parsing failed: {diagnostic}"),
                    priority: Priority::Medium,
                    estimated_effort: "unknown".into(),
                }],
                investigation_next_steps: vec![format!(
                    "provider diagnostics: {diagnostic}"
                )],
                code_changes_needed: vec![],
            },
            enriched_context: EnrichedContext {
                new_insights: vec![],
                validated_hypotheses: vec![],
                ruled_out_approaches: attempted_approaches.to_vec(),
            },
            metadata: ResultMetadata::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_json_preceded_and_followed_by_prose() {
        let raw = "Here is the analysis:\n{ \"rootCauses\": [], \"status\": \"success\" } extra text";
        let obj = extract_first_json_object(raw).unwrap();
        assert_eq!(obj, "{ \"rootCauses\": [], \"status\": \"success\" }");
    }

    #[test]
    fn extracts_ignores_braces_inside_strings() {
        let raw = "{\"description\": \"a { weird } string\", \"status\": \"success\"}";
        let obj = extract_first_json_object(raw).unwrap();
        let v: Value = serde_json::from_str(obj).unwrap();
        assert_eq!(v["status"], "success");
    }

    #[test]
    fn no_json_object_returns_partial_without_panic() {
        let result = ResponseParser::parse("just prose, no braces here", &[]);
        assert_eq!(result.status, ResultStatus::Partial);
        assert!(!result.recommendations.immediate_actions.is_empty());
        assert!(!result
            .recommendations
            .investigation_next_steps
            .is_empty());
    }

    #[test]
    fn tolerant_parse_fills_defaults_and_status_success() {
        let raw = "Here is the analysis:\n{ \"rootCauses\": [], \"status\": \"success\" } extra text";
        let result = ResponseParser::parse(raw, &["tried x".into()]);
        assert_eq!(result.status, ResultStatus::Success);
        assert!(result.findings.root_causes.is_empty());
        assert_eq!(result.enriched_context.ruled_out_approaches, vec!["tried x".to_string()]);
    }

    #[test]
    fn confidence_outside_range_is_clamped() {
        let raw = r#"{"status": "success", "findings": {"rootCauses": [{"kind":"bug","description":"d","evidence":["a.rs:1"],"confidence": 5.0,"fixStrategy":"f"}]}}"#;
        let result = ResponseParser::parse(raw, &[]);
        assert_eq!(result.findings.root_causes[0].confidence, 1.0);
    }

    #[test]
    fn unknown_enum_value_is_dropped_not_panicking() {
        let raw = r#"{"status": "success", "findings": {"performanceBottlenecks": [{"kind":"not-a-real-kind","location":"a.rs:1","suggestion":"x"}]}}"#;
        let result = ResponseParser::parse(raw, &[]);
        assert!(result.findings.performance_bottlenecks.is_empty());
    }

    #[test]
    fn evidence_locations_parse_tolerantly() {
        let raw = r#"{"status": "success", "findings": {"rootCauses": [{"kind":"bug","description":"d","evidence":["weird-no-line"],"confidence":0.5,"fixStrategy":"f"}]}}"#;
        let result = ResponseParser::parse(raw, &[]);
        assert_eq!(result.findings.root_causes[0].evidence[0].line, 0);
    }

    proptest::proptest! {
        #[test]
        fn parser_never_panics_on_arbitrary_bytes(s in ".*") {
            let _ = ResponseParser::parse(&s, &[]);
        }
    }
}
