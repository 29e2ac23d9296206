//! Document query and aggregation pipeline risk classification.
//!
//! Works on `serde_json` values, the shape the response parser produces.
//! The collection allow-list is a hard block here, unlike the SQL
//! validator's warning-only table list: collection names are not
//! user-visible business nouns, so an unknown collection in a candidate is
//! evidence of a misbehaving interpretation, not of a user asking about a
//! new table.
//!
//! ReDoS detection is a linear structural scan over the regex literal -
//! counting quantified groups that are themselves quantified - and never a
//! regex match against the pattern, which would reintroduce the exact
//! blowup it exists to catch.

use crate::models::{Findings, Operation, RequiredOperations, RiskLevel, ValidationResult};
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;

/// Limits for document validation.
#[derive(Debug, Clone)]
pub struct DocumentValidatorConfig {
    /// Maximum document nesting depth.
    pub max_depth: usize,
    /// Maximum regex literal length in characters.
    pub max_regex_length: usize,
    /// Maximum number of pipeline stages.
    pub max_pipeline_stages: usize,
    /// Join-like stage count above which a warning is issued.
    pub max_join_stages: usize,
    /// Array element count above which a warning is issued.
    pub max_array_elements: usize,
    /// Optional collection allow-list. Unknown collections are blocked.
    pub allowed_collections: Option<BTreeSet<String>>,
}

impl Default for DocumentValidatorConfig {
    fn default() -> Self {
        Self {
            max_depth: 16,
            max_regex_length: 256,
            max_pipeline_stages: 20,
            max_join_stages: 3,
            max_array_elements: 100,
            allowed_collections: None,
        }
    }
}

/// Operators that run server-side code.
const CODE_EXECUTION_OPERATORS: &[&str] = &["$where", "$function", "$accumulator"];

/// Stages that join or pull in other collections.
const JOIN_STAGES: &[&str] = &["$lookup", "$graphLookup", "$unionWith"];

/// Stages that write pipeline output back into a collection.
const WRITE_STAGES: &[&str] = &["$out", "$merge"];

/// Classify a filter document against a collection.
pub fn validate_query(
    doc: &JsonValue,
    collection: &str,
    config: &DocumentValidatorConfig,
) -> ValidationResult {
    let mut findings = Findings::new();
    check_collection(collection, config, &mut findings);
    walk(doc, 0, config, &mut findings);
    findings.finish()
}

/// Classify an aggregation pipeline against a collection.
pub fn validate_pipeline(
    stages: &[JsonValue],
    collection: &str,
    config: &DocumentValidatorConfig,
) -> ValidationResult {
    let mut findings = Findings::new();
    check_collection(collection, config, &mut findings);

    if stages.len() > config.max_pipeline_stages {
        findings.block(
            RiskLevel::High,
            format!(
                "pipeline-too-long:{} stages (max {})",
                stages.len(),
                config.max_pipeline_stages
            ),
        );
    }

    let join_stages = stages
        .iter()
        .filter_map(stage_name)
        .filter(|name| JOIN_STAGES.contains(&name.as_str()))
        .count();
    if join_stages > config.max_join_stages {
        findings.warn(
            RiskLevel::Medium,
            format!(
                "join-like stage count {join_stages} exceeds {}",
                config.max_join_stages
            ),
        );
    }

    for stage in stages {
        walk(stage, 0, config, &mut findings);
    }

    findings.finish()
}

/// Infer which operations a pipeline requires: `$out`/`$merge` write the
/// result back into a collection, everything else only reads.
pub fn required_operations(stages: &[JsonValue]) -> RequiredOperations {
    let mut ops = RequiredOperations::read_only();
    for stage in stages {
        if let Some(name) = stage_name(stage) {
            if WRITE_STAGES.contains(&name.as_str()) {
                ops.insert(Operation::Insert);
            }
        }
    }
    ops
}

/// Strip known-dangerous operator keys recursively.
///
/// Defense-in-depth only: the output must still be re-validated, because
/// sanitizing cannot prove the remaining document safe (regex shapes, depth
/// and collection checks still apply).
pub fn sanitize(doc: &JsonValue) -> JsonValue {
    match doc {
        JsonValue::Object(map) => JsonValue::Object(
            map.iter()
                .filter(|(key, _)| !CODE_EXECUTION_OPERATORS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), sanitize(value)))
                .collect(),
        ),
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(sanitize).collect()),
        other => other.clone(),
    }
}

fn check_collection(
    collection: &str,
    config: &DocumentValidatorConfig,
    findings: &mut Findings,
) {
    if let Some(allowed) = &config.allowed_collections {
        if !allowed.contains(collection) {
            findings.block(
                RiskLevel::Critical,
                format!("collection-not-allowed:{collection}"),
            );
        }
    }
}

fn stage_name(stage: &JsonValue) -> Option<String> {
    stage
        .as_object()
        .and_then(|map| map.keys().next())
        .cloned()
}

/// Recursive scan of one value. Recursion stops once depth is exceeded, so
/// adversarially deep documents cost no more than `max_depth` frames.
fn walk(value: &JsonValue, depth: usize, config: &DocumentValidatorConfig, findings: &mut Findings) {
    if depth > config.max_depth {
        findings.block(RiskLevel::High, "nesting-too-deep");
        return;
    }

    match value {
        JsonValue::Object(map) => {
            for (key, child) in map {
                if CODE_EXECUTION_OPERATORS.contains(&key.as_str()) {
                    findings.block(
                        RiskLevel::Critical,
                        format!("code-execution-operator:{key}"),
                    );
                }
                if key == "$regex" {
                    if let Some(pattern) = child.as_str() {
                        check_regex(pattern, config, findings);
                    }
                }
                walk(child, depth + 1, config, findings);
            }
        }
        JsonValue::Array(items) => {
            if items.len() > config.max_array_elements {
                findings.warn(
                    RiskLevel::Medium,
                    format!(
                        "array of {} elements exceeds {}",
                        items.len(),
                        config.max_array_elements
                    ),
                );
            }
            for item in items {
                walk(item, depth + 1, config, findings);
            }
        }
        _ => {}
    }
}

fn check_regex(pattern: &str, config: &DocumentValidatorConfig, findings: &mut Findings) {
    if pattern.chars().count() > config.max_regex_length {
        findings.block(RiskLevel::High, "regex-too-long");
        return;
    }
    if regex_is_explosive(pattern) {
        findings.block(RiskLevel::Critical, "regex-catastrophic-backtracking");
    }
}

/// Structural check for catastrophic-backtracking shape: a group containing
/// an unbounded quantifier that is itself quantified (`(a+)+`, `(\d*)*`,
/// `((ab)+c)*`). Linear scan; escapes and character classes are skipped so
/// literal parentheses and quantifier characters do not count.
fn regex_is_explosive(pattern: &str) -> bool {
    let chars: Vec<char> = pattern.chars().collect();
    // One frame per open group: has the group seen a quantifier so far?
    let mut stack: Vec<bool> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '[' => {
                i += 1;
                while i < chars.len() && chars[i] != ']' {
                    if chars[i] == '\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            '(' => stack.push(false),
            ')' => {
                let inner_quantified = stack.pop().unwrap_or(false);
                let group_quantified = matches!(chars.get(i + 1), Some('+' | '*' | '{'));
                if group_quantified && inner_quantified {
                    return true;
                }
                if let Some(parent) = stack.last_mut() {
                    *parent |= inner_quantified || group_quantified;
                }
            }
            '+' | '*' | '{' => {
                if let Some(frame) = stack.last_mut() {
                    *frame = true;
                }
            }
            _ => {}
        }
        i += 1;
    }
    false
}
