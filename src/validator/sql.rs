//! SQL query risk classification.
//!
//! Statement-level hazards (DDL, privilege grants, missing WHERE clauses,
//! injection-shaped UNIONs) are detected on the AST via
//! [sqlparser](https://docs.rs/sqlparser/), the same way the execute guard
//! in db-mcp-server does, so formatting tricks and dialect variations cannot
//! bypass them. Lexical hazards that live below the statement level
//! (statement stacking, comment truncation, file-system primitives) are
//! detected with a quote-aware linear scan, because they are exactly the
//! inputs an SQL parser either rejects or normalizes away.

use crate::models::{Findings, Operation, RequiredOperations, RiskLevel, ValidationResult};
use sqlparser::ast::{
    Expr, Join, Query, SetExpr, SetOperator, Statement, TableFactor, TableWithJoins,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::collections::BTreeSet;

/// Limits for SQL validation.
#[derive(Debug, Clone)]
pub struct SqlValidatorConfig {
    /// Hard ceiling on input length in characters.
    pub max_length: usize,
    /// Join count above which a warning is issued.
    pub max_joins: usize,
    /// Subquery nesting depth above which a warning is issued.
    pub max_subquery_depth: usize,
    /// Row ceiling used by [`enforce_row_limit`].
    pub max_rows: u32,
    /// Optional table allow-list (lowercase names). Tables outside the list
    /// warn but do not block: SQL table names are user-visible business
    /// nouns and false positives here would be constant.
    pub allowed_tables: Option<BTreeSet<String>>,
}

impl Default for SqlValidatorConfig {
    fn default() -> Self {
        Self {
            max_length: 8192,
            max_joins: 4,
            max_subquery_depth: 3,
            max_rows: 500,
            allowed_tables: None,
        }
    }
}

/// Function-level primitives that reach the file system.
const FILESYSTEM_TOKENS: &[&str] = &["load_file", "outfile", "dumpfile"];

/// Statement keywords that control server processes.
const PROCESS_TOKENS: &[&str] = &["kill", "shutdown"];

/// Classify an SQL string by risk.
pub fn validate(sql: &str, config: &SqlValidatorConfig) -> ValidationResult {
    let mut findings = Findings::new();

    if sql.chars().count() > config.max_length {
        // Do not even tokenize oversized input.
        findings.block(RiskLevel::Critical, "input-too-long");
        return findings.finish();
    }

    scan_lexical(sql, &mut findings);
    if findings.has_blocks() {
        // Stacked or comment-truncated input is not worth parsing; the AST
        // would only see the prefix the attacker wanted us to see.
        return findings.finish();
    }

    let statements = match Parser::parse_sql(&GenericDialect {}, sql) {
        Ok(statements) if !statements.is_empty() => statements,
        _ => {
            findings.block(RiskLevel::High, "unparseable");
            return findings.finish();
        }
    };

    for stmt in &statements {
        check_statement(stmt, config, &mut findings);
    }

    if statements.iter().any(|s| matches!(s, Statement::Query(_)))
        && find_limit_clause(sql).is_none()
    {
        findings.warn(RiskLevel::Low, "select without row limit");
    }

    findings.finish()
}

/// Infer which operations an SQL statement requires of its target.
///
/// Unparseable input maps to read-only; the validator has already blocked
/// it by the time the permission gate asks.
pub fn required_operations(sql: &str) -> RequiredOperations {
    let mut ops = RequiredOperations::read_only();
    let Ok(statements) = Parser::parse_sql(&GenericDialect {}, sql) else {
        return ops;
    };
    for stmt in &statements {
        match stmt {
            Statement::Insert(_) => ops.insert(Operation::Insert),
            Statement::Update(_) => ops.insert(Operation::Update),
            Statement::Delete(_) => ops.insert(Operation::Delete),
            Statement::CreateTable { .. }
            | Statement::CreateView { .. }
            | Statement::CreateIndex(_)
            | Statement::AlterTable(_)
            | Statement::Drop { .. }
            | Statement::Truncate { .. } => ops.insert(Operation::SchemaChange),
            _ => {}
        }
    }
    ops
}

// =============================================================================
// Lexical scan
// =============================================================================

/// Quote-aware linear scan for hazards below the statement level.
fn scan_lexical(sql: &str, findings: &mut Findings) {
    let chars: Vec<char> = sql.chars().collect();
    let mut i = 0;
    let mut quote: Option<char> = None;
    let mut bare = String::new();

    while i < chars.len() {
        let c = chars[i];
        match quote {
            Some(q) => {
                if c == '\\' {
                    i += 1; // skip escaped character
                } else if c == q {
                    // Doubled quote is an escaped quote inside the literal.
                    if chars.get(i + 1) == Some(&q) {
                        i += 1;
                    } else {
                        quote = None;
                    }
                }
            }
            None => match c {
                '\'' | '"' | '`' => {
                    quote = Some(c);
                    bare.push(' ');
                }
                ';' => {
                    if chars[i + 1..].iter().any(|c| !c.is_whitespace()) {
                        findings.block(RiskLevel::Critical, "statement-stacking");
                    }
                    bare.push(c);
                }
                '-' if chars.get(i + 1) == Some(&'-') => {
                    findings.block(RiskLevel::Critical, "comment-injection");
                    bare.push(' ');
                    i += 1;
                }
                '#' => {
                    findings.block(RiskLevel::Critical, "comment-injection");
                    bare.push(' ');
                }
                '/' if chars.get(i + 1) == Some(&'*') => {
                    findings.block(RiskLevel::Critical, "comment-injection");
                    bare.push(' ');
                    i += 1;
                }
                _ => bare.push(c),
            },
        }
        i += 1;
    }

    let words: BTreeSet<String> = bare
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect();

    for token in FILESYSTEM_TOKENS {
        if words.contains(*token) {
            findings.block(RiskLevel::Critical, format!("filesystem-access:{token}"));
        }
    }
    // LOAD DATA [LOCAL] INFILE reads server/client files.
    if words.contains("load") && words.contains("infile") {
        findings.block(RiskLevel::Critical, "filesystem-access:load_data");
    }
    for token in PROCESS_TOKENS {
        if words.contains(*token) {
            findings.block(RiskLevel::Critical, format!("process-control:{token}"));
        }
    }
}

// =============================================================================
// Statement classification
// =============================================================================

fn check_statement(stmt: &Statement, config: &SqlValidatorConfig, findings: &mut Findings) {
    match stmt {
        Statement::Query(query) => check_query(query, config, findings),

        Statement::Insert(_) => {}

        Statement::Update(update) => {
            if update.selection.is_none() {
                findings.block(RiskLevel::Critical, "missing-where:update");
            }
        }

        Statement::Delete(delete) => {
            if delete.selection.is_none() {
                findings.block(RiskLevel::Critical, "missing-where:delete");
            }
        }

        Statement::CreateTable { .. }
        | Statement::CreateView { .. }
        | Statement::CreateIndex(_)
        | Statement::CreateSchema { .. }
        | Statement::CreateDatabase { .. }
        | Statement::AlterTable(_)
        | Statement::AlterView { .. }
        | Statement::Drop { .. }
        | Statement::Truncate { .. } => {
            findings.block(RiskLevel::Critical, "ddl-statement");
        }

        Statement::Grant { .. } | Statement::Revoke { .. } => {
            findings.block(RiskLevel::Critical, "privilege-statement");
        }

        Statement::Kill { .. } => {
            findings.block(RiskLevel::Critical, "process-control:kill");
        }

        // Conservative default: a statement this validator does not
        // understand is not allowed through.
        _ => {
            findings.block(RiskLevel::High, "unrecognized-statement");
        }
    }
}

fn check_query(query: &Query, config: &SqlValidatorConfig, findings: &mut Findings) {
    check_set_expr(&query.body, findings);

    let joins = count_joins(&query.body);
    if joins > config.max_joins {
        findings.warn(
            RiskLevel::Medium,
            format!("join count {joins} exceeds {}", config.max_joins),
        );
    }

    let depth = subquery_depth(&query.body);
    if depth > config.max_subquery_depth {
        findings.warn(
            RiskLevel::Medium,
            format!(
                "subquery nesting {depth} exceeds {}",
                config.max_subquery_depth
            ),
        );
    }

    if let Some(allowed) = &config.allowed_tables {
        for table in referenced_tables(&query.body) {
            if !allowed.contains(&table) {
                findings.warn(RiskLevel::Medium, format!("table '{table}' not in allow-list"));
            }
        }
    }
}

/// UNION whose right-hand side selects constants (no FROM) is the classic
/// injection shape for exfiltrating values into a result set.
fn check_set_expr(expr: &SetExpr, findings: &mut Findings) {
    match expr {
        SetExpr::SetOperation {
            op: SetOperator::Union,
            left,
            right,
            ..
        } => {
            if let SetExpr::Select(select) = right.as_ref() {
                if select.from.is_empty() {
                    findings.block(RiskLevel::Critical, "suspicious-union");
                }
            }
            check_set_expr(left, findings);
            check_set_expr(right, findings);
        }
        SetExpr::SetOperation { left, right, .. } => {
            check_set_expr(left, findings);
            check_set_expr(right, findings);
        }
        SetExpr::Query(query) => check_set_expr(&query.body, findings),
        _ => {}
    }
}

fn count_joins(expr: &SetExpr) -> usize {
    match expr {
        SetExpr::Select(select) => select
            .from
            .iter()
            .map(|t| t.joins.len())
            .sum::<usize>(),
        SetExpr::SetOperation { left, right, .. } => count_joins(left) + count_joins(right),
        SetExpr::Query(query) => count_joins(&query.body),
        _ => 0,
    }
}

fn subquery_depth(expr: &SetExpr) -> usize {
    match expr {
        SetExpr::Select(select) => {
            let from_depth = select
                .from
                .iter()
                .map(table_with_joins_depth)
                .max()
                .unwrap_or(0);
            let where_depth = select
                .selection
                .as_ref()
                .map(expr_subquery_depth)
                .unwrap_or(0);
            from_depth.max(where_depth)
        }
        SetExpr::SetOperation { left, right, .. } => {
            subquery_depth(left).max(subquery_depth(right))
        }
        SetExpr::Query(query) => subquery_depth(&query.body),
        _ => 0,
    }
}

fn table_with_joins_depth(table: &TableWithJoins) -> usize {
    let relation_depth = table_factor_depth(&table.relation);
    let join_depth = table
        .joins
        .iter()
        .map(|join: &Join| table_factor_depth(&join.relation))
        .max()
        .unwrap_or(0);
    relation_depth.max(join_depth)
}

fn table_factor_depth(factor: &TableFactor) -> usize {
    match factor {
        TableFactor::Derived { subquery, .. } => 1 + subquery_depth(&subquery.body),
        _ => 0,
    }
}

/// Depth of subqueries nested inside an expression. Only the containers
/// that can actually hold a subquery are walked.
fn expr_subquery_depth(expr: &Expr) -> usize {
    match expr {
        Expr::Subquery(query) | Expr::Exists { subquery: query, .. } => {
            1 + subquery_depth(&query.body)
        }
        Expr::InSubquery { subquery, expr, .. } => {
            (1 + subquery_depth(&subquery.body)).max(expr_subquery_depth(expr))
        }
        Expr::BinaryOp { left, right, .. } => {
            expr_subquery_depth(left).max(expr_subquery_depth(right))
        }
        Expr::UnaryOp { expr, .. } | Expr::Nested(expr) => expr_subquery_depth(expr),
        _ => 0,
    }
}

fn referenced_tables(expr: &SetExpr) -> Vec<String> {
    let mut tables = Vec::new();
    collect_tables(expr, &mut tables);
    tables
}

fn collect_tables(expr: &SetExpr, out: &mut Vec<String>) {
    match expr {
        SetExpr::Select(select) => {
            for table in &select.from {
                collect_table_factor(&table.relation, out);
                for join in &table.joins {
                    collect_table_factor(&join.relation, out);
                }
            }
        }
        SetExpr::SetOperation { left, right, .. } => {
            collect_tables(left, out);
            collect_tables(right, out);
        }
        SetExpr::Query(query) => collect_tables(&query.body, out),
        _ => {}
    }
}

fn collect_table_factor(factor: &TableFactor, out: &mut Vec<String>) {
    match factor {
        TableFactor::Table { name, .. } => out.push(name.to_string().to_lowercase()),
        TableFactor::Derived { subquery, .. } => collect_tables(&subquery.body, out),
        _ => {}
    }
}

// =============================================================================
// Row limit enforcement
// =============================================================================

/// Append or clamp a trailing LIMIT clause so no more than `max_rows` rows
/// can come back. Leaves the rest of the query untouched and is idempotent:
/// applying it twice produces the same clamped limit.
pub fn enforce_row_limit(sql: &str, max_rows: u32) -> String {
    let trimmed = sql.trim_end().trim_end_matches(';').trim_end();

    match find_limit_clause(trimmed) {
        Some((value_start, value_end, value)) => {
            if value > max_rows as u64 {
                format!(
                    "{}{}{}",
                    &trimmed[..value_start],
                    max_rows,
                    &trimmed[value_end..]
                )
            } else {
                trimmed.to_string()
            }
        }
        None => format!("{trimmed} LIMIT {max_rows}"),
    }
}

/// Locate the row-count value of a trailing LIMIT clause, outside string
/// literals. Returns the byte span of the count and its parsed value.
/// Handles both `LIMIT n` and the MySQL `LIMIT offset, n` form.
fn find_limit_clause(sql: &str) -> Option<(usize, usize, u64)> {
    // ASCII lowering keeps byte offsets aligned with the original string.
    let lower = sql.to_ascii_lowercase();
    let bytes = lower.as_bytes();
    let mut search = 0;
    let mut candidate = None;

    while let Some(pos) = lower[search..].find("limit") {
        let at = search + pos;
        let before_ok = at == 0 || !bytes[at - 1].is_ascii_alphanumeric() && bytes[at - 1] != b'_';
        let after = at + 5;
        let after_ok = after >= bytes.len()
            || (!bytes[after].is_ascii_alphanumeric() && bytes[after] != b'_');
        if before_ok && after_ok && !inside_string_literal(sql, at) {
            candidate = Some(at);
        }
        search = at + 5;
    }

    let keyword_at = candidate?;
    let rest = &sql[keyword_at + 5..];

    let mut numbers = Vec::new();
    let mut chars = rest.char_indices().peekable();
    while let Some((idx, c)) = chars.peek().copied() {
        if c.is_whitespace() || c == ',' {
            chars.next();
            continue;
        }
        if c.is_ascii_digit() {
            let start = idx;
            let mut end = idx;
            while let Some((i, d)) = chars.peek().copied() {
                if d.is_ascii_digit() {
                    end = i + d.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let abs_start = keyword_at + 5 + start;
            let abs_end = keyword_at + 5 + end;
            let value = sql[abs_start..abs_end].parse::<u64>().ok()?;
            numbers.push((abs_start, abs_end, value));
            if numbers.len() == 2 {
                break;
            }
        } else {
            break;
        }
    }

    // `LIMIT offset, count`: the count is the last number either way.
    numbers.pop()
}

/// Whether the byte offset falls inside a quoted string literal.
fn inside_string_literal(sql: &str, offset: usize) -> bool {
    let mut quote: Option<char> = None;
    for (i, c) in sql.char_indices() {
        if i >= offset {
            break;
        }
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' || c == '`' => quote = Some(c),
            None => {}
        }
    }
    quote.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SqlValidatorConfig {
        SqlValidatorConfig::default()
    }

    // =========================================================================
    // Hard blocks
    // =========================================================================

    #[test]
    fn test_drop_table_blocked_as_ddl() {
        let result = validate("DROP TABLE pharmacies", &config());
        assert!(!result.is_safe());
        assert_eq!(result.risk, RiskLevel::Critical);
        assert!(result.blocked.iter().any(|r| r.contains("ddl")));
    }

    #[test]
    fn test_create_alter_truncate_blocked() {
        for sql in [
            "CREATE TABLE t (id INT)",
            "ALTER TABLE users ADD COLUMN age INT",
            "TRUNCATE TABLE users",
        ] {
            let result = validate(sql, &config());
            assert!(!result.is_safe(), "should block: {sql}");
            assert_eq!(result.risk, RiskLevel::Critical);
        }
    }

    #[test]
    fn test_grant_revoke_blocked() {
        let result = validate("GRANT SELECT ON sales TO analyst", &config());
        assert!(!result.is_safe());
        assert!(result.blocked.iter().any(|r| r.contains("privilege")));

        let result = validate("REVOKE SELECT ON sales FROM analyst", &config());
        assert!(!result.is_safe());
    }

    #[test]
    fn test_statement_stacking_blocked() {
        let result = validate("SELECT 1; DROP TABLE users", &config());
        assert!(!result.is_safe());
        assert_eq!(result.risk, RiskLevel::Critical);
        assert!(result.blocked.iter().any(|r| r == "statement-stacking"));
    }

    #[test]
    fn test_trailing_semicolon_alone_is_fine() {
        let result = validate("SELECT id FROM users WHERE id = 1 LIMIT 10;", &config());
        assert!(result.is_safe(), "{:?}", result.blocked);
    }

    #[test]
    fn test_semicolon_inside_string_is_fine() {
        let result = validate(
            "SELECT id FROM notes WHERE body = 'a; DROP TABLE x' LIMIT 5",
            &config(),
        );
        assert!(result.is_safe(), "{:?}", result.blocked);
    }

    #[test]
    fn test_comment_truncation_blocked() {
        for sql in [
            "SELECT * FROM users WHERE name = 'x' -- AND hidden = 1",
            "SELECT * FROM users /* hide */ WHERE id = 1",
            "SELECT * FROM users # tail",
        ] {
            let result = validate(sql, &config());
            assert!(!result.is_safe(), "should block: {sql}");
            assert!(result.blocked.iter().any(|r| r == "comment-injection"));
        }
    }

    #[test]
    fn test_comment_tokens_inside_strings_are_fine() {
        let result = validate(
            "SELECT id FROM notes WHERE body = 'a -- not a comment' LIMIT 5",
            &config(),
        );
        assert!(result.is_safe(), "{:?}", result.blocked);
    }

    #[test]
    fn test_filesystem_primitives_blocked() {
        for sql in [
            "SELECT LOAD_FILE('/etc/passwd')",
            "SELECT * FROM users INTO OUTFILE '/tmp/x'",
            "LOAD DATA INFILE '/tmp/x' INTO TABLE users",
        ] {
            let result = validate(sql, &config());
            assert!(!result.is_safe(), "should block: {sql}");
            assert!(
                result.blocked.iter().any(|r| r.contains("filesystem")),
                "{:?}",
                result.blocked
            );
        }
    }

    #[test]
    fn test_process_control_blocked() {
        let result = validate("KILL 42", &config());
        assert!(!result.is_safe());
        assert!(result.blocked.iter().any(|r| r.contains("process-control")));
    }

    #[test]
    fn test_delete_update_without_where_blocked() {
        let result = validate("DELETE FROM users", &config());
        assert!(result.blocked.iter().any(|r| r == "missing-where:delete"));

        let result = validate("UPDATE users SET active = 0", &config());
        assert!(result.blocked.iter().any(|r| r == "missing-where:update"));

        let result = validate("DELETE FROM users WHERE id = 1", &config());
        assert!(result.is_safe());
    }

    #[test]
    fn test_suspicious_union_blocked() {
        let result = validate(
            "SELECT name FROM users WHERE id = 1 UNION SELECT password, 1",
            &config(),
        );
        assert!(!result.is_safe());
        assert!(result.blocked.iter().any(|r| r == "suspicious-union"));
    }

    #[test]
    fn test_legitimate_union_allowed() {
        let result = validate(
            "SELECT a FROM t1 UNION SELECT b FROM t2 LIMIT 10",
            &config(),
        );
        assert!(result.is_safe(), "{:?}", result.blocked);
    }

    #[test]
    fn test_oversized_input_blocked() {
        let sql = format!("SELECT '{}'", "x".repeat(9000));
        let result = validate(&sql, &config());
        assert!(!result.is_safe());
        assert_eq!(result.risk, RiskLevel::Critical);
        assert!(result.blocked.iter().any(|r| r == "input-too-long"));
    }

    #[test]
    fn test_unparseable_blocked() {
        let result = validate("NOT VALID SQL AT ALL !!!", &config());
        assert!(!result.is_safe());
        assert!(result.blocked.iter().any(|r| r == "unparseable"));
    }

    // =========================================================================
    // Warnings
    // =========================================================================

    #[test]
    fn test_select_without_limit_warns() {
        let result = validate("SELECT id FROM users WHERE active = 1", &config());
        assert!(result.is_safe());
        assert!(!result.warnings.is_empty());
        assert!(result.risk <= RiskLevel::Medium);
    }

    #[test]
    fn test_too_many_joins_warns() {
        let sql = "SELECT * FROM a \
                   JOIN b ON a.id = b.a JOIN c ON b.id = c.b \
                   JOIN d ON c.id = d.c JOIN e ON d.id = e.d \
                   JOIN f ON e.id = f.e LIMIT 10";
        let result = validate(sql, &config());
        assert!(result.is_safe());
        assert!(result.warnings.iter().any(|w| w.contains("join count")));
    }

    #[test]
    fn test_table_allow_list_warns_only() {
        let cfg = SqlValidatorConfig {
            allowed_tables: Some(["users".to_string()].into_iter().collect()),
            ..config()
        };
        let result = validate("SELECT * FROM secrets LIMIT 1", &cfg);
        assert!(result.is_safe());
        assert!(result.warnings.iter().any(|w| w.contains("secrets")));
    }

    #[test]
    fn test_deep_subquery_warns() {
        let sql = "SELECT * FROM t WHERE a IN \
                   (SELECT a FROM u WHERE b IN \
                   (SELECT b FROM v WHERE c IN \
                   (SELECT c FROM w WHERE d IN (SELECT d FROM x)))) LIMIT 1";
        let result = validate(sql, &config());
        assert!(result.is_safe(), "{:?}", result.blocked);
        assert!(result.warnings.iter().any(|w| w.contains("nesting")));
    }

    // =========================================================================
    // Monotonicity
    // =========================================================================

    #[test]
    fn test_risk_never_safe_with_blocked_reasons() {
        for sql in [
            "DROP TABLE x",
            "SELECT 1; SELECT 2",
            "DELETE FROM users",
            "NOT SQL",
        ] {
            let result = validate(sql, &config());
            if !result.blocked.is_empty() {
                assert!(result.risk > RiskLevel::Safe, "sql: {sql}");
            }
        }
    }

    // =========================================================================
    // Row limit enforcement
    // =========================================================================

    #[test]
    fn test_limit_appended_when_absent() {
        assert_eq!(
            enforce_row_limit("SELECT id FROM users", 500),
            "SELECT id FROM users LIMIT 500"
        );
    }

    #[test]
    fn test_limit_clamped_when_too_large() {
        assert_eq!(
            enforce_row_limit("SELECT id FROM users LIMIT 9999", 500),
            "SELECT id FROM users LIMIT 500"
        );
    }

    #[test]
    fn test_limit_kept_when_small_enough() {
        assert_eq!(
            enforce_row_limit("SELECT id FROM users LIMIT 10", 500),
            "SELECT id FROM users LIMIT 10"
        );
    }

    #[test]
    fn test_limit_offset_count_form_clamped() {
        assert_eq!(
            enforce_row_limit("SELECT id FROM users LIMIT 20, 9999", 500),
            "SELECT id FROM users LIMIT 20, 500"
        );
    }

    #[test]
    fn test_limit_in_string_literal_not_confused() {
        let sql = "SELECT id FROM notes WHERE body = 'no limit here'";
        assert_eq!(
            enforce_row_limit(sql, 100),
            format!("{sql} LIMIT 100")
        );
    }

    #[test]
    fn test_enforce_row_limit_idempotent() {
        for sql in [
            "SELECT id FROM users",
            "SELECT id FROM users LIMIT 9999",
            "SELECT id FROM users LIMIT 10",
            "SELECT id FROM users LIMIT 20, 9999",
            "SELECT id FROM users;",
        ] {
            let once = enforce_row_limit(sql, 500);
            let twice = enforce_row_limit(&once, 500);
            assert_eq!(once, twice, "sql: {sql}");
        }
    }

    // =========================================================================
    // Required operations
    // =========================================================================

    #[test]
    fn test_required_operations_inference() {
        assert!(required_operations("SELECT 1").is_read_only());
        assert!(
            required_operations("INSERT INTO t VALUES (1)").contains(Operation::Insert)
        );
        assert!(
            required_operations("UPDATE t SET a = 1 WHERE id = 1").contains(Operation::Update)
        );
        assert!(
            required_operations("DELETE FROM t WHERE id = 1").contains(Operation::Delete)
        );
        assert!(
            required_operations("DROP TABLE t").contains(Operation::SchemaChange)
        );
    }
}
