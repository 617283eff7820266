//! Split a migration payload into individual statements.
//!
//! Splitting is token based, so semicolons inside string literals, quoted
//! identifiers, comments and dollar-quoted bodies never end a statement.
//! Each statement is sliced out of the input at the semicolon spans, so its
//! text is exactly what was written, escapes included.

use sqlparser::tokenizer::{Location, Token, TokenWithSpan, Tokenizer};

use crate::dialect::{parse_location_from_error, SqlDialect};
use crate::error::{SqlError, SqlResult};

/// Split `sql` into executable statements, dropping segments that hold only
/// whitespace or comments. The terminating semicolon is not included.
pub fn split_statements(dialect: &dyn SqlDialect, sql: &str) -> SqlResult<Vec<String>> {
    let tokens = Tokenizer::new(dialect.parser_dialect(), sql)
        .with_unescape(false)
        .tokenize_with_location()
        .map_err(|e| {
            let message = e.to_string();
            let (line, column) = parse_location_from_error(&message);
            SqlError::TokenizeError {
                message,
                line,
                column,
            }
        })?;

    let index = LineIndex::new(sql);
    let mut statements = Vec::new();
    let mut start = 0;
    let mut has_code = false;

    for item in &tokens {
        match &item.token {
            Token::SemiColon => {
                let end = index.offset(item.span.start);
                push_segment(&mut statements, &sql[start..end], has_code);
                start = index.offset(item.span.end);
                has_code = false;
            }
            Token::Whitespace(_) | Token::EOF => {}
            _ => has_code = true,
        }
    }
    push_segment(&mut statements, &sql[start..], has_code);

    Ok(statements)
}

fn push_segment(statements: &mut Vec<String>, segment: &str, has_code: bool) {
    if has_code {
        statements.push(segment.trim().to_string());
    }
}

/// Maps tokenizer locations (1-based line, 1-based char column) to byte
/// offsets into the source text.
struct LineIndex<'a> {
    sql: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(sql: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(sql.match_indices('\n').map(|(i, _)| i + 1));
        Self { sql, line_starts }
    }

    fn offset(&self, location: Location) -> usize {
        let (Ok(line), Ok(column)) = (
            usize::try_from(location.line),
            usize::try_from(location.column),
        ) else {
            return self.sql.len();
        };
        let Some(&line_start) = line.checked_sub(1).and_then(|l| self.line_starts.get(l)) else {
            return self.sql.len();
        };
        self.sql[line_start..]
            .char_indices()
            .nth(column.saturating_sub(1))
            .map_or(self.sql.len(), |(i, _)| line_start + i)
    }
}

#[cfg(test)]
#[path = "splitter_test.rs"]
mod tests;
