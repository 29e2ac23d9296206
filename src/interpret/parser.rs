//! Robust extraction of structured values from interpreter output.
//!
//! Interpretation models return free-form text that usually, but not
//! always, contains a structured payload. Extraction is a chain of
//! strategies, each a pure `fn(&str) -> Option<Value>`, tried in order
//! until one succeeds. Adding a new fallback is a one-line change to
//! the chain.
//!
//! Every successful parse that did not use the direct strategy carries a
//! warning naming the fallback that fired, so drifting interpreter output
//! shows up in the logs long before it becomes an outage.

use crate::error::{GatewayError, GatewayResult};
use serde_json::{Map, Value as JsonValue};

/// Minimal shape expectation for interpreter output.
///
/// `required` keys must be present; `defaults` fill absent optional keys
/// during coercion (strategy 4 only).
#[derive(Debug, Clone, Default)]
pub struct ResponseSchema {
    pub required: Vec<String>,
    pub defaults: Map<String, JsonValue>,
}

impl ResponseSchema {
    pub fn required(keys: &[&str]) -> Self {
        Self {
            required: keys.iter().map(|k| k.to_string()).collect(),
            defaults: Map::new(),
        }
    }

    pub fn with_default(mut self, key: &str, value: JsonValue) -> Self {
        self.defaults.insert(key.to_string(), value);
        self
    }

    fn missing_required(&self, value: &JsonValue) -> Option<&str> {
        let object = value.as_object()?;
        self.required
            .iter()
            .find(|key| !object.contains_key(*key))
            .map(String::as_str)
    }

    fn satisfied_by(&self, value: &JsonValue) -> bool {
        if self.required.is_empty() {
            return true;
        }
        value.is_object() && self.missing_required(value).is_none()
    }
}

/// Which extraction strategy produced a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStrategy {
    /// The whole text parsed directly.
    Direct,
    /// A fenced ```json block.
    FencedBlock,
    /// The first balanced `{...}`/`[...]` span.
    BalancedSpan,
    /// Relaxed repair coerced into the supplied schema.
    SchemaCoercion,
    /// Nothing structured found; plain text only.
    TextFallback,
}

impl ParseStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::FencedBlock => "fenced-block",
            Self::BalancedSpan => "balanced-span",
            Self::SchemaCoercion => "schema-coercion",
            Self::TextFallback => "text-fallback",
        }
    }
}

/// A successfully extracted value, with provenance.
#[derive(Debug, Clone)]
pub struct Parsed {
    pub value: JsonValue,
    pub strategy: ParseStrategy,
    pub warnings: Vec<String>,
}

/// Extract a structured value from raw interpreter output.
///
/// Strategies are tried in order; with a schema supplied, a strategy only
/// succeeds if its value satisfies the schema's required keys.
pub fn parse(raw: &str, schema: Option<&ResponseSchema>) -> GatewayResult<Parsed> {
    let accepts = |value: &JsonValue| schema.is_none_or(|s| s.satisfied_by(value));

    let strategies: [(ParseStrategy, fn(&str) -> Option<JsonValue>); 3] = [
        (ParseStrategy::Direct, parse_direct),
        (ParseStrategy::FencedBlock, parse_fenced_block),
        (ParseStrategy::BalancedSpan, parse_balanced_span),
    ];

    for (strategy, extract) in strategies {
        if let Some(value) = extract(raw) {
            if accepts(&value) {
                return Ok(finish(value, strategy));
            }
        }
    }

    if let Some(schema) = schema {
        if let Some(value) = coerce_with_schema(raw, schema) {
            return Ok(finish(value, ParseStrategy::SchemaCoercion));
        }
    }

    Err(GatewayError::parse_failure(
        "no structured payload found in interpreter output",
    ))
}

/// Like [`parse`], but never fails: exhausts the chain and falls back to the
/// supplied default.
pub fn parse_safe(raw: &str, schema: Option<&ResponseSchema>, default: JsonValue) -> Parsed {
    match parse(raw, schema) {
        Ok(parsed) => parsed,
        Err(_) => finish(default, ParseStrategy::TextFallback),
    }
}

/// Last-resort plain-text extraction: fences stripped, whitespace collapsed.
pub fn extract_text_fallback(raw: &str) -> String {
    raw.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn finish(value: JsonValue, strategy: ParseStrategy) -> Parsed {
    let warnings = if strategy == ParseStrategy::Direct {
        Vec::new()
    } else {
        vec![format!("parsed via {} fallback", strategy.name())]
    };
    Parsed {
        value,
        strategy,
        warnings,
    }
}

// =============================================================================
// Strategies
// =============================================================================

/// Strategy 1: the whole text is the payload. Scalars are rejected - a bare
/// number or string is never a query specification.
fn parse_direct(raw: &str) -> Option<JsonValue> {
    let value: JsonValue = serde_json::from_str(raw.trim()).ok()?;
    (value.is_object() || value.is_array()).then_some(value)
}

/// Strategy 2: a fenced block tagged as structured data.
fn parse_fenced_block(raw: &str) -> Option<JsonValue> {
    for tag in ["```json", "```JSON", "```"] {
        let Some(start) = raw.find(tag) else { continue };
        let body_start = start + tag.len();
        let Some(end) = raw[body_start..].find("```") else {
            continue;
        };
        let body = raw[body_start..body_start + end].trim();
        if let Some(value) = parse_direct(body) {
            return Some(value);
        }
    }
    None
}

/// Strategy 3: the first balanced `{...}` or `[...]` span, tracking brace
/// depth and ignoring braces inside string literals.
fn parse_balanced_span(raw: &str) -> Option<JsonValue> {
    let start = raw.find(['{', '['])?;
    let span = balanced_span(&raw[start..])?;
    serde_json::from_str(span).ok()
}

fn balanced_span(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let (open, close) = match bytes.first()? {
        b'{' => (b'{', b'}'),
        b'[' => (b'[', b']'),
        _ => return None,
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            _ if in_string => {}
            _ if b == open => depth += 1,
            _ if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Strategy 4: relaxed repair of almost-JSON (single quotes, unquoted keys,
/// trailing commas), then coercion into the schema - defaults fill absent
/// optional keys, missing required keys fail.
fn coerce_with_schema(raw: &str, schema: &ResponseSchema) -> Option<JsonValue> {
    let start = raw.find(['{', '['])?;
    let span = balanced_span_lenient(&raw[start..])?;
    let repaired = repair_relaxed_json(span);
    let mut value: JsonValue = serde_json::from_str(&repaired).ok()?;

    if let Some(object) = value.as_object_mut() {
        for (key, default) in &schema.defaults {
            object.entry(key.clone()).or_insert_with(|| default.clone());
        }
    }

    schema.satisfied_by(&value).then_some(value)
}

/// Balanced-span scan that also treats single quotes as string delimiters,
/// for the relaxed repair path.
fn balanced_span_lenient(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let (open, close) = match bytes.first()? {
        b'{' => (b'{', b'}'),
        b'[' => (b'[', b']'),
        _ => return None,
    };

    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match quote {
            Some(q) => match b {
                b'\\' => escaped = true,
                _ if b == q => quote = None,
                _ => {}
            },
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                _ if b == open => depth += 1,
                _ if b == close => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(&text[..=i]);
                    }
                }
                _ => {}
            },
        }
    }
    None
}

/// Rewrite relaxed almost-JSON into strict JSON: single-quoted strings
/// become double-quoted, bare object keys are quoted, trailing commas are
/// dropped.
fn repair_relaxed_json(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    let mut i = 0;
    let mut quote: Option<char> = None;

    while i < chars.len() {
        let c = chars[i];
        match quote {
            Some(q) => {
                if c == '\\' {
                    out.push(c);
                    if let Some(&next) = chars.get(i + 1) {
                        out.push(next);
                        i += 1;
                    }
                } else if c == q {
                    out.push('"');
                    quote = None;
                } else if c == '"' && q == '\'' {
                    // A double quote inside a single-quoted string needs
                    // escaping once the delimiters are rewritten.
                    out.push('\\');
                    out.push('"');
                } else {
                    out.push(c);
                }
            }
            None => match c {
                '\'' | '"' => {
                    out.push('"');
                    quote = Some(c);
                }
                ',' => {
                    // Drop the comma if the next non-space char closes a scope.
                    let mut j = i + 1;
                    while j < chars.len() && chars[j].is_whitespace() {
                        j += 1;
                    }
                    if !matches!(chars.get(j), Some('}' | ']')) {
                        out.push(c);
                    }
                }
                _ if c.is_alphabetic() || c == '_' || c == '$' => {
                    // Possibly a bare key: consume the word and quote it if
                    // a colon follows. Bare literals stay as-is.
                    let start = i;
                    while i < chars.len()
                        && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$')
                    {
                        i += 1;
                    }
                    let word: String = chars[start..i].iter().collect();
                    let mut j = i;
                    while j < chars.len() && chars[j].is_whitespace() {
                        j += 1;
                    }
                    let is_key = matches!(chars.get(j), Some(':'));
                    let is_literal = matches!(word.as_str(), "true" | "false" | "null");
                    if is_key && !is_literal {
                        out.push('"');
                        out.push_str(&word);
                        out.push('"');
                    } else {
                        out.push_str(&word);
                    }
                    continue;
                }
                _ => out.push(c),
            },
        }
        i += 1;
    }
    out
}
