//! SQL text helpers shared by the adapters and ledgers

use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

/// SQL flavor a statement is rendered for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    ClickHouse,
}

impl Dialect {
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::ClickHouse => "clickhouse",
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Split a script into the statements to execute one at a time
///
/// PostgreSQL scripts go through proper SQL parsing. ClickHouse DDL is only
/// partially understood by the parser, so its statements are split lexically
/// and sent verbatim.
pub fn split_statements(sql: &str, dialect: Dialect) -> Vec<String> {
    match dialect {
        Dialect::Postgres => match Parser::parse_sql(&PostgreSqlDialect {}, sql) {
            Ok(statements) => statements.iter().map(|stmt| stmt.to_string()).collect(),
            Err(e) => {
                tracing::warn!("SQL parsing failed, using lexical splitting: {}", e);
                split_on_semicolons(sql, dialect)
            }
        },
        Dialect::ClickHouse => split_on_semicolons(sql, dialect),
    }
}

/// Split on `;` outside string literals, quoted identifiers, dollar-quoted
/// bodies and comments
///
/// Comments are dropped. Backslash escapes apply inside every ClickHouse
/// literal but only inside `E'...'` strings on PostgreSQL, where
/// `standard_conforming_strings` is on by default. Block comments nest on
/// PostgreSQL only.
pub fn split_on_semicolons(sql: &str, dialect: Dialect) -> Vec<String> {
    let chars: Vec<char> = sql.chars().collect();
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' | '`' => {
                let escapes = match dialect {
                    Dialect::ClickHouse => true,
                    Dialect::Postgres => c == '\'' && is_escape_string_prefix(&chars, i),
                };
                i = copy_quoted(&chars, i, escapes, &mut current);
            }
            '$' => match dollar_tag_end(&chars, i) {
                Some(tag_end) => {
                    let tag: Vec<char> = chars[i..=tag_end].to_vec();
                    let body_end = find_sequence(&chars, tag_end + 1, &tag)
                        .map_or(chars.len(), |pos| pos + tag.len());
                    current.extend(&chars[i..body_end]);
                    i = body_end;
                }
                None => {
                    current.push(c);
                    i += 1;
                }
            },
            '-' if chars.get(i + 1) == Some(&'-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i = skip_block_comment(&chars, i, dialect == Dialect::Postgres);
                current.push(' ');
            }
            ';' => {
                push_statement(&mut statements, &mut current);
                i += 1;
            }
            _ => {
                current.push(c);
                i += 1;
            }
        }
    }
    push_statement(&mut statements, &mut current);

    statements
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// `E'...'` / `e'...'`, with the `E` not part of a longer identifier
fn is_escape_string_prefix(chars: &[char], quote: usize) -> bool {
    quote >= 1
        && matches!(chars[quote - 1], 'E' | 'e')
        && (quote < 2 || !is_identifier_char(chars[quote - 2]))
}

/// Copy a quoted literal starting at `start`; returns the index after it
fn copy_quoted(chars: &[char], start: usize, escapes: bool, out: &mut String) -> usize {
    let quote = chars[start];
    out.push(quote);
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        out.push(c);
        i += 1;
        if escapes && c == '\\' {
            if let Some(&escaped) = chars.get(i) {
                out.push(escaped);
                i += 1;
            }
        } else if c == quote {
            // a doubled quote stays inside the literal
            if chars.get(i) == Some(&quote) {
                out.push(quote);
                i += 1;
            } else {
                return i;
            }
        }
    }
    i
}

/// Index of the closing `$` of a `$tag$` opener at `start`, if there is one
///
/// `$1` parameters and `$` inside identifiers are not openers.
fn dollar_tag_end(chars: &[char], start: usize) -> Option<usize> {
    if start > 0 && is_identifier_char(chars[start - 1]) {
        return None;
    }
    let mut j = start + 1;
    while j < chars.len() && (chars[j].is_alphanumeric() || chars[j] == '_') {
        j += 1;
    }
    let tag_starts_with_digit = j > start + 1 && chars[start + 1].is_ascii_digit();
    (chars.get(j) == Some(&'$') && !tag_starts_with_digit).then_some(j)
}

fn find_sequence(chars: &[char], from: usize, needle: &[char]) -> Option<usize> {
    if from > chars.len() {
        return None;
    }
    chars[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| from + pos)
}

/// Skip a `/* ... */` comment at `start`; returns the index after it
fn skip_block_comment(chars: &[char], start: usize, nested: bool) -> usize {
    let mut depth = 0;
    let mut i = start;
    while i < chars.len() {
        if chars[i] == '/' && chars.get(i + 1) == Some(&'*') && (nested || depth == 0) {
            depth += 1;
            i += 2;
        } else if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
            depth -= 1;
            i += 2;
            if depth == 0 {
                return i;
            }
        } else {
            i += 1;
        }
    }
    i
}

fn push_statement(statements: &mut Vec<String>, current: &mut String) {
    let statement = current.trim();
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }
    current.clear();
}

/// Quote a ClickHouse string literal for inline use
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}
