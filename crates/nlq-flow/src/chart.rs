//! Chart selection from result shape.

use chrono::NaiveDate;
use serde_json::Value;

use nlq_core::{ChartKind, ChartSpec, ResultSet};

/// Category axes wider than this read better as a table.
const MAX_BAR_CATEGORIES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Numeric,
    Temporal,
    Categorical,
    Empty,
}

/// Picks a visualization from the shape of the result set.
///
/// Total: every result maps to some chart, with a table as the
/// fallback for anything that does not fit a cleaner shape.
pub struct ChartSelector;

impl ChartSelector {
    pub fn new() -> Self {
        Self
    }

    pub fn select(&self, results: &ResultSet) -> ChartSpec {
        if results.rows.is_empty() || results.columns.is_empty() {
            return ChartSpec::table();
        }

        let kinds: Vec<ColumnKind> = (0..results.columns.len())
            .map(|idx| infer_kind(results.rows.iter().map(|row| &row[idx])))
            .collect();

        if results.rows.len() == 1 && kinds.len() == 1 && kinds[0] == ColumnKind::Numeric {
            return ChartSpec {
                kind: ChartKind::SingleValue,
                x: None,
                y: Some(results.columns[0].clone()),
            };
        }

        if kinds.len() == 2 {
            let (x, y) = (results.columns[0].clone(), results.columns[1].clone());
            match (kinds[0], kinds[1]) {
                (ColumnKind::Temporal, ColumnKind::Numeric) => {
                    return ChartSpec {
                        kind: ChartKind::Line,
                        x: Some(x),
                        y: Some(y),
                    }
                }
                (ColumnKind::Categorical, ColumnKind::Numeric)
                    if results.rows.len() <= MAX_BAR_CATEGORIES =>
                {
                    return ChartSpec {
                        kind: ChartKind::Bar,
                        x: Some(x),
                        y: Some(y),
                    }
                }
                (ColumnKind::Numeric, ColumnKind::Numeric) => {
                    return ChartSpec {
                        kind: ChartKind::Scatter,
                        x: Some(x),
                        y: Some(y),
                    }
                }
                _ => {}
            }
        }

        ChartSpec::table()
    }
}

impl Default for ChartSelector {
    fn default() -> Self {
        Self::new()
    }
}

/// Infer a column's kind from its non-null values. Mixed or all-null
/// columns are categorical by default.
fn infer_kind<'a>(values: impl Iterator<Item = &'a Value>) -> ColumnKind {
    let mut seen = ColumnKind::Empty;
    for value in values {
        let kind = match value {
            Value::Null => continue,
            Value::Number(_) => ColumnKind::Numeric,
            Value::Bool(_) => ColumnKind::Categorical,
            Value::String(s) if is_temporal(s) => ColumnKind::Temporal,
            _ => ColumnKind::Categorical,
        };
        match seen {
            ColumnKind::Empty => seen = kind,
            k if k == kind => {}
            _ => return ColumnKind::Categorical,
        }
    }
    seen
}

fn is_temporal(s: &str) -> bool {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
        || NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d").is_ok()
        || chrono::DateTime::parse_from_rfc3339(s).is_ok()
        || chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").is_ok()
}
