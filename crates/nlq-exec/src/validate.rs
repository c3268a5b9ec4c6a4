//! Safety validation of generated SQL.

use std::collections::HashSet;

use sqlparser::ast::Statement;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::keywords::Keyword;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer};
use tracing::debug;

use nlq_core::{NlqError, Result, SchemaInfo};

/// Keywords that must never appear in a candidate, even inside text
/// the parser would accept.
const DENYLIST: &[&str] = &[
    "DROP", "DELETE", "UPDATE", "INSERT", "ALTER", "TRUNCATE", "CREATE", "GRANT", "REVOKE",
    "EXEC", "EXECUTE", "CALL", "COPY", "VACUUM",
];

/// Gate between model output and the database.
///
/// Checks, in order: the candidate parses as exactly one statement,
/// that statement is a query, no denylisted keyword appears anywhere,
/// and every identifier resolves against the schema snapshot. Any
/// failure is `SqlRejected` with the reason, which the workflow folds
/// into the next generation attempt.
pub struct SqlSafetyValidator;

impl SqlSafetyValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a candidate, returning the canonical statement text.
    pub fn validate(&self, sql: &str, schema: &SchemaInfo) -> Result<String> {
        let dialect = PostgreSqlDialect {};

        let statements = Parser::parse_sql(&dialect, sql)
            .map_err(|e| NlqError::rejected(format!("statement does not parse: {}", e)))?;

        match statements.len() {
            0 => return Err(NlqError::rejected("empty statement")),
            1 => {}
            n => {
                return Err(NlqError::rejected(format!(
                    "expected a single statement, found {}",
                    n
                )))
            }
        }

        if !matches!(statements[0], Statement::Query(_)) {
            return Err(NlqError::rejected(
                "only SELECT statements are allowed",
            ));
        }

        let tokens: Vec<Token> = Tokenizer::new(&dialect, sql)
            .tokenize()
            .map_err(|e| NlqError::rejected(format!("tokenization failed: {}", e)))?
            .into_iter()
            .filter(|t| !matches!(t, Token::Whitespace(_)))
            .collect();

        self.check_denylist(sql)?;
        self.check_identifiers(&tokens, schema)?;

        debug!("SQL candidate passed validation ({} chars)", sql.len());
        Ok(sql.trim().to_string())
    }

    /// Raw-text scan, deliberately stricter than the parse: denylisted
    /// keywords are rejected even inside string literals, because a
    /// literal carrying one is an injection attempt being smuggled
    /// through as a value.
    fn check_denylist(&self, sql: &str) -> Result<()> {
        let upper = sql.to_uppercase();

        if upper.contains(";--") || upper.contains("; --") {
            return Err(NlqError::rejected(
                "statement terminator followed by a comment",
            ));
        }

        let bytes = upper.as_bytes();
        for keyword in DENYLIST {
            for (i, _) in upper.match_indices(keyword) {
                let before_ok = i == 0 || !is_ident_byte(bytes[i - 1]);
                let after = i + keyword.len();
                let after_ok = after >= bytes.len() || !is_ident_byte(bytes[after]);
                if before_ok && after_ok {
                    return Err(NlqError::rejected(format!(
                        "denylisted keyword '{}'",
                        keyword
                    )));
                }
            }
        }
        Ok(())
    }

    /// Every plain identifier must be a table or column in the schema
    /// snapshot, an alias defined in the statement itself, or a
    /// function name. Keywords and literals are the tokenizer's
    /// problem, not ours.
    fn check_identifiers(&self, tokens: &[Token], schema: &SchemaInfo) -> Result<()> {
        let known = schema.identifier_set();
        let mut defined: HashSet<String> = HashSet::new();

        // First pass: names the statement itself introduces. Aliases
        // after AS or directly after another identifier or a closing
        // paren, and definition names in `name AS (...)` position. A
        // plain reference on the left of AS, as in `secret AS s`, is
        // not a definition and stays subject to the schema check.
        for (i, token) in tokens.iter().enumerate() {
            let Token::Word(word) = token else { continue };
            if word.keyword != Keyword::NoKeyword && word.quote_style.is_none() {
                continue;
            }
            let introduces = match (tokens.get(i.wrapping_sub(1)), tokens.get(i + 1)) {
                (Some(Token::Word(prev)), _) if prev.keyword == Keyword::AS => true,
                (Some(Token::Word(prev)), _)
                    if prev.keyword == Keyword::NoKeyword || prev.quote_style.is_some() =>
                {
                    true
                }
                (Some(Token::RParen), _) => true,
                (_, Some(Token::Word(next)))
                    if next.keyword == Keyword::AS
                        && matches!(tokens.get(i + 2), Some(Token::LParen)) =>
                {
                    true
                }
                _ => false,
            };
            if introduces {
                defined.insert(word.value.to_lowercase());
            }
        }

        for (i, token) in tokens.iter().enumerate() {
            let Token::Word(word) = token else { continue };
            if word.keyword != Keyword::NoKeyword && word.quote_style.is_none() {
                continue;
            }
            // Named parameter.
            if matches!(tokens.get(i.wrapping_sub(1)), Some(Token::Colon)) {
                continue;
            }
            // Function call.
            if matches!(tokens.get(i + 1), Some(Token::LParen)) {
                continue;
            }
            let lower = word.value.to_lowercase();
            if known.contains(&lower) || defined.contains(&lower) {
                continue;
            }
            return Err(NlqError::rejected(format!(
                "unknown identifier '{}'",
                word.value
            )));
        }

        Ok(())
    }
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

impl Default for SqlSafetyValidator {
    fn default() -> Self {
        Self::new()
    }
}
