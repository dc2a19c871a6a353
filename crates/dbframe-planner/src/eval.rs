//! In-memory reference evaluation of predicates with SQL three-valued logic.
//!
//! `None` is SQL's UNKNOWN: any comparison involving NULL yields it, `AND`
//! and `OR` propagate it unless the other side decides the result, and a row
//! is selected only when the whole predicate is `Some(true)`.

use std::cmp::Ordering;

use dbframe_core::schema::TableSchema;
use dbframe_core::types::{Row, Value};
use dbframe_core::{Error, Result};

use crate::predicate::{BoolOp, CompareOp, Condition, Predicate};

/// Evaluate `predicate` against one row of `table`.
pub fn evaluate(predicate: &Predicate, table: &TableSchema, row: &Row) -> Result<Option<bool>> {
    match predicate {
        Predicate::Comparison { column, condition } => {
            let idx = table
                .index_of(column.name())
                .ok_or_else(|| Error::unknown_column(table.name(), column.name(), table.column_names()))?;
            let cell = row.get(idx).ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "row has {} values, column '{}' is at position {idx}",
                    row.len(),
                    column.name()
                ))
            })?;
            Ok(eval_condition(cell, condition))
        }
        Predicate::Boolean { op: BoolOp::Not, children } => {
            let inner = match children.first() {
                Some(c) => evaluate(c, table, row)?,
                None => Some(true),
            };
            Ok(inner.map(|b| !b))
        }
        Predicate::Boolean { op, children } => {
            let decisive = *op == BoolOp::Or;
            let mut unknown = false;
            for c in children {
                match evaluate(c, table, row)? {
                    Some(b) if b == decisive => return Ok(Some(decisive)),
                    Some(_) => {}
                    None => unknown = true,
                }
            }
            Ok(if unknown { None } else { Some(!decisive) })
        }
    }
}

/// Whether `row` is selected by `predicate`.
pub fn matches(predicate: &Predicate, table: &TableSchema, row: &Row) -> Result<bool> {
    Ok(evaluate(predicate, table, row)? == Some(true))
}

fn eval_condition(cell: &Value, condition: &Condition) -> Option<bool> {
    if cell.is_null() {
        return match condition {
            Condition::IsNull => Some(true),
            Condition::NotNull => Some(false),
            // compiled to the constant `(1 = 0)`
            Condition::In(set) if set.is_empty() => Some(false),
            _ => None,
        };
    }
    Some(match condition {
        Condition::IsNull => false,
        Condition::NotNull => true,
        Condition::Compare(op, lit) => {
            let ord = sql_cmp(cell, lit);
            match op {
                CompareOp::Eq => ord == Ordering::Equal,
                CompareOp::Ne => ord != Ordering::Equal,
                CompareOp::Lt => ord == Ordering::Less,
                CompareOp::Le => ord != Ordering::Greater,
                CompareOp::Gt => ord == Ordering::Greater,
                CompareOp::Ge => ord != Ordering::Less,
            }
        }
        Condition::Between(lo, hi) => {
            sql_cmp(cell, lo) != Ordering::Less && sql_cmp(cell, hi) != Ordering::Greater
        }
        Condition::In(set) => set.iter().any(|v| sql_cmp(cell, v) == Ordering::Equal),
        Condition::Like(pattern) => like_match(&sql_text(cell), pattern),
    })
}

/// SQLite comparison between two non-null values: numbers compare
/// numerically, otherwise storage classes order numeric < text < blob.
pub fn sql_cmp(a: &Value, b: &Value) -> Ordering {
    if a.is_numeric() && b.is_numeric() {
        if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
            return x.cmp(&y);
        }
        if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
            return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
        }
    }
    let rank = |v: &Value| match v {
        Value::Null => 0,
        Value::Bool(_) | Value::Int(_) | Value::Float(_) => 1,
        Value::Text(_) => 2,
        Value::Blob(_) => 3,
    };
    match (a, b) {
        (Value::Text(x), Value::Text(y)) => x.as_bytes().cmp(y.as_bytes()),
        (Value::Blob(x), Value::Blob(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// A cell as SQLite renders it when a text operand is needed.
pub fn sql_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => i64::from(*b).to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => real_text(*f),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => String::from_utf8_lossy(b).into_owned(),
    }
}

/// `printf("%!.15g")`: 15 significant digits, always a fraction digit.
fn real_text(f: f64) -> String {
    if f.is_infinite() {
        return if f > 0.0 { "Inf".into() } else { "-Inf".into() };
    }
    let sci = format!("{f:.14e}");
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let exp: i32 = exp.parse().unwrap_or(0);
    if (-4..15).contains(&exp) {
        let decimals = (14 - exp).max(0) as usize;
        keep_one_fraction_digit(format!("{f:.decimals$}"))
    } else {
        let sign = if exp < 0 { '-' } else { '+' };
        format!(
            "{}e{sign}{:02}",
            keep_one_fraction_digit(mantissa.to_string()),
            exp.abs()
        )
    }
}

fn keep_one_fraction_digit(mut s: String) -> String {
    match s.find('.') {
        Some(dot) => {
            let end = s.trim_end_matches('0').len().max(dot + 2);
            s.truncate(end);
        }
        None => s.push_str(".0"),
    }
    s
}

/// SQLite `LIKE`: `%` matches any run, `_` one character, ASCII case-insensitive.
pub fn like_match(text: &str, pattern: &str) -> bool {
    let t: Vec<char> = text.chars().map(|c| c.to_ascii_lowercase()).collect();
    let p: Vec<char> = pattern.chars().map(|c| c.to_ascii_lowercase()).collect();

    // dp[j]: pattern prefix of length j matches the text prefix seen so far
    let mut dp = vec![false; p.len() + 1];
    dp[0] = true;
    for j in 1..=p.len() {
        dp[j] = dp[j - 1] && p[j - 1] == '%';
    }
    for &tc in &t {
        let mut next = vec![false; p.len() + 1];
        for j in 1..=p.len() {
            next[j] = match p[j - 1] {
                '%' => next[j - 1] || dp[j],
                '_' => dp[j - 1],
                pc => dp[j - 1] && pc == tc,
            };
        }
        dp = next;
    }
    dp[p.len()]
}
