use chrono::NaiveDate;
use strata_core::{AppError, AppResult};

/// Parses a `pg_get_expr(relpartbound)` range bound into `[lower, upper)`.
///
/// `MINVALUE`, `MAXVALUE` and `DEFAULT` map to open ends. Only the first key
/// column is read.
pub(super) fn parse_range_bound(expression: &str) -> AppResult<(Option<NaiveDate>, Option<NaiveDate>)> {
    let expression = expression.trim();
    if expression.eq_ignore_ascii_case("DEFAULT") {
        return Ok((None, None));
    }

    let invalid = || AppError::Internal(format!("unsupported partition bound '{expression}'"));
    let from_start = expression.find("FROM (").ok_or_else(invalid)? + "FROM (".len();
    let to_marker = expression.find(") TO (").ok_or_else(invalid)?;
    if to_marker < from_start {
        return Err(invalid());
    }
    let to_start = to_marker + ") TO (".len();
    let to_end = expression.rfind(')').ok_or_else(invalid)?;
    if to_end < to_start {
        return Err(invalid());
    }

    let lower = parse_bound_value(&expression[from_start..to_marker])?;
    let upper = parse_bound_value(&expression[to_start..to_end])?;
    Ok((lower, upper))
}

fn parse_bound_value(values: &str) -> AppResult<Option<NaiveDate>> {
    let first = values.split(',').next().unwrap_or_default().trim();
    if first.eq_ignore_ascii_case("MINVALUE") || first.eq_ignore_ascii_case("MAXVALUE") {
        return Ok(None);
    }

    let literal = first.trim_start_matches('\'');
    let date = literal.get(..10).unwrap_or(literal);
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(Some)
        .map_err(|error| AppError::Internal(format!("unsupported bound value '{first}': {error}")))
}

/// Renders one bound value for `FOR VALUES FROM (..) TO (..)`.
pub(super) fn render_bound_value(bound: Option<NaiveDate>, open_end: &str) -> String {
    bound.map_or_else(
        || open_end.to_owned(),
        |date| format!("'{}'", date.format("%Y-%m-%d")),
    )
}

/// Quotes one identifier after folding it to PostgreSQL's lower case.
pub(super) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.to_ascii_lowercase().replace('"', "\"\""))
}

/// Returns `"schema"."table"`.
pub(super) fn qualified_name(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_identifier(schema), quote_identifier(table))
}
