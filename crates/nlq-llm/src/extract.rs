//! Pulling a SQL statement out of free-form model output.

use nlq_core::{GeneratedSql, NlqError, Result};

/// Extract the first SQL statement from model output.
///
/// Preference order: the first ```sql fenced block, then any fenced
/// block whose body starts with SELECT or WITH, then the first bare
/// line starting with SELECT or WITH taken through its terminating
/// semicolon or end of text. Named `:param` placeholders are collected
/// in order of first appearance.
pub fn extract_sql(response: &str) -> Result<GeneratedSql> {
    let candidate = fenced_block(response, true)
        .or_else(|| fenced_block(response, false))
        .or_else(|| bare_statement(response));

    let sql = candidate
        .map(|s| s.trim().trim_end_matches(';').trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| NlqError::no_sql("response contained no SELECT or WITH statement"))?;

    let params = collect_params(&sql);
    Ok(GeneratedSql { sql, params })
}

/// First fenced code block. With `sql_tag` set, only blocks opened
/// with ```sql qualify; otherwise any block whose body looks like a
/// query does.
fn fenced_block(text: &str, sql_tag: bool) -> Option<String> {
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        let after_open = &rest[open + 3..];
        let (tag, body_start) = match after_open.find('\n') {
            Some(nl) => (after_open[..nl].trim(), nl + 1),
            None => return None,
        };
        let body_and_rest = &after_open[body_start..];
        let close = body_and_rest.find("```")?;
        let body = &body_and_rest[..close];

        let tag_ok = if sql_tag {
            tag.eq_ignore_ascii_case("sql")
        } else {
            looks_like_query(body)
        };
        if tag_ok {
            return Some(body.to_string());
        }
        rest = &body_and_rest[close + 3..];
    }
    None
}

/// First SELECT/WITH found at a word boundary, through its semicolon
/// or to end of text.
fn bare_statement(text: &str) -> Option<String> {
    let upper = text.to_uppercase();
    let start = ["SELECT", "WITH"]
        .iter()
        .filter_map(|kw| {
            upper.match_indices(kw).find_map(|(i, _)| {
                let before_ok = i == 0
                    || !upper.as_bytes()[i - 1].is_ascii_alphanumeric()
                        && upper.as_bytes()[i - 1] != b'_';
                let after = i + kw.len();
                let after_ok = after >= upper.len()
                    || !upper.as_bytes()[after].is_ascii_alphanumeric()
                        && upper.as_bytes()[after] != b'_';
                (before_ok && after_ok).then_some(i)
            })
        })
        .min()?;

    let tail = &text[start..];
    let end = tail.find(';').map(|i| i + 1).unwrap_or(tail.len());
    Some(tail[..end].to_string())
}

fn looks_like_query(body: &str) -> bool {
    let upper = body.trim_start().to_uppercase();
    upper.starts_with("SELECT") || upper.starts_with("WITH")
}

/// Named `:param` placeholders in order of first appearance.
/// `::type` casts do not count.
fn collect_params(sql: &str) -> Vec<String> {
    let bytes = sql.as_bytes();
    let mut params = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b':' {
            let cast = i > 0 && bytes[i - 1] == b':' || i + 1 < bytes.len() && bytes[i + 1] == b':';
            if !cast {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len()
                    && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
                {
                    end += 1;
                }
                if end > start && bytes[start].is_ascii_alphabetic() {
                    let name = sql[start..end].to_string();
                    if !params.contains(&name) {
                        params.push(name);
                    }
                    i = end;
                    continue;
                }
            }
        }
        i += 1;
    }
    params
}
