//! Predicate expression trees over column handles.
//!
//! A [`Predicate`] is either a single-column [`Condition`] or a boolean
//! combination of sub-predicates. Leaves are type-checked when they are
//! built; table identity is checked by [`Predicate::and`]/[`Predicate::or`]
//! and again when the tree is compiled against a query's base table.
//!
//! Compilation is a recursive descent that returns `(sql, params)` for every
//! node and concatenates children left to right, so the parameter list always
//! lines up with the `?` placeholders. Literal values never appear in the SQL
//! text.

use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

use dbframe_core::schema::{ColumnRef, TableSchema, ValueKind};
use dbframe_core::types::Value;
use dbframe_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::sql::{placeholders, quote_ident};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    /// Accepts the usual spellings: `==`, `=`, `eq`, `<>`, `ne`, `lt`, ...
    pub fn parse(token: &str) -> Option<Self> {
        Some(match token.trim().to_ascii_lowercase().as_str() {
            "==" | "=" | "eq" => CompareOp::Eq,
            "!=" | "<>" | "ne" => CompareOp::Ne,
            "<" | "lt" => CompareOp::Lt,
            "<=" | "le" => CompareOp::Le,
            ">" | "gt" => CompareOp::Gt,
            ">=" | "ge" => CompareOp::Ge,
            _ => return None,
        })
    }
}

/// What a leaf tests about its column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Compare(CompareOp, Value),
    IsNull,
    NotNull,
    /// Inclusive on both ends.
    Between(Value, Value),
    /// Sorted and deduplicated.
    In(Vec<Value>),
    Like(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoolOp {
    And,
    Or,
    Not,
}

impl BoolOp {
    fn keyword(self) -> &'static str {
        match self {
            BoolOp::And => "AND",
            BoolOp::Or => "OR",
            BoolOp::Not => "NOT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Comparison {
        column: ColumnRef,
        condition: Condition,
    },
    Boolean {
        op: BoolOp,
        children: Vec<Predicate>,
    },
}

/// A compiled WHERE fragment and its bound parameters, in placeholder order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<Value>,
}

impl SqlFragment {
    fn new(sql: String, params: Vec<Value>) -> Self {
        Self { sql, params }
    }
}

impl Predicate {
    fn leaf(column: &ColumnRef, condition: Condition) -> Self {
        Predicate::Comparison {
            column: column.clone(),
            condition,
        }
    }

    /// `column <op> value`. Comparing with NULL turns `==`/`!=` into
    /// `IS NULL`/`IS NOT NULL`; any other operator against NULL is a type error.
    pub fn compare(column: &ColumnRef, op: CompareOp, value: impl Into<Value>) -> Result<Self> {
        let value = value.into();
        if value.is_null() {
            return match op {
                CompareOp::Eq => Ok(Self::leaf(column, Condition::IsNull)),
                CompareOp::Ne => Ok(Self::leaf(column, Condition::NotNull)),
                _ => Err(Error::TypeMismatch(format!(
                    "cannot apply '{}' to {} and NULL",
                    op.sql(),
                    column.qualified_name()
                ))),
            };
        }
        check_accepts(column, &value, op.sql())?;
        Ok(Self::leaf(column, Condition::Compare(op, value)))
    }

    pub fn eq(column: &ColumnRef, value: impl Into<Value>) -> Result<Self> {
        Self::compare(column, CompareOp::Eq, value)
    }

    pub fn ne(column: &ColumnRef, value: impl Into<Value>) -> Result<Self> {
        Self::compare(column, CompareOp::Ne, value)
    }

    pub fn lt(column: &ColumnRef, value: impl Into<Value>) -> Result<Self> {
        Self::compare(column, CompareOp::Lt, value)
    }

    pub fn le(column: &ColumnRef, value: impl Into<Value>) -> Result<Self> {
        Self::compare(column, CompareOp::Le, value)
    }

    pub fn gt(column: &ColumnRef, value: impl Into<Value>) -> Result<Self> {
        Self::compare(column, CompareOp::Gt, value)
    }

    pub fn ge(column: &ColumnRef, value: impl Into<Value>) -> Result<Self> {
        Self::compare(column, CompareOp::Ge, value)
    }

    pub fn is_null(column: &ColumnRef) -> Self {
        Self::leaf(column, Condition::IsNull)
    }

    pub fn not_null(column: &ColumnRef) -> Self {
        Self::leaf(column, Condition::NotNull)
    }

    /// `low <= column <= high`. Numeric columns and numeric bounds only.
    pub fn between(
        column: &ColumnRef,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Result<Self> {
        let (low, high) = (low.into(), high.into());
        let kind = column.kind();
        if !(kind.is_numeric() || kind == ValueKind::Any) {
            return Err(Error::TypeMismatch(format!(
                "between needs a numeric column, {} is {}",
                column.qualified_name(),
                kind
            )));
        }
        let (Some(lo), Some(hi)) = (low.as_f64(), high.as_f64()) else {
            return Err(Error::TypeMismatch(format!(
                "between bounds on {} must be numeric, got {} and {}",
                column.qualified_name(),
                low.type_name(),
                high.type_name()
            )));
        };
        if lo > hi {
            return Err(Error::InvalidArgument(format!(
                "between bounds on {} are reversed: {low} > {high}",
                column.qualified_name()
            )));
        }
        Ok(Self::leaf(column, Condition::Between(low, high)))
    }

    /// Membership test. The set is canonicalized; an empty set matches nothing.
    pub fn is_in<I, V>(column: &ColumnRef, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut set = Vec::new();
        for v in values {
            let v = v.into();
            if v.is_null() {
                return Err(Error::TypeMismatch(format!(
                    "NULL cannot be a member of an IN set on {}",
                    column.qualified_name()
                )));
            }
            check_accepts(column, &v, "IN")?;
            set.push(v);
        }
        set.sort();
        set.dedup();
        Ok(Self::leaf(column, Condition::In(set)))
    }

    /// SQL `LIKE` with `%` and `_` wildcards, text columns only.
    pub fn like(column: &ColumnRef, pattern: impl Into<String>) -> Result<Self> {
        match column.kind() {
            ValueKind::Text | ValueKind::Any => {
                Ok(Self::leaf(column, Condition::Like(pattern.into())))
            }
            kind => Err(Error::TypeMismatch(format!(
                "LIKE needs a text column, {} is {kind}",
                column.qualified_name()
            ))),
        }
    }

    /// Conjunction, rejecting operands from different tables.
    pub fn and(self, other: Predicate) -> Result<Self> {
        self.check_compatible(&other)?;
        Ok(combine(BoolOp::And, self, other))
    }

    /// Disjunction, rejecting operands from different tables.
    pub fn or(self, other: Predicate) -> Result<Self> {
        self.check_compatible(&other)?;
        Ok(combine(BoolOp::Or, self, other))
    }

    pub fn negate(self) -> Self {
        Predicate::Boolean {
            op: BoolOp::Not,
            children: vec![self],
        }
    }

    /// Every leaf column, left to right.
    pub fn columns(&self) -> Vec<&ColumnRef> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a ColumnRef>) {
        match self {
            Predicate::Comparison { column, .. } => out.push(column),
            Predicate::Boolean { children, .. } => {
                for c in children {
                    c.collect_columns(out);
                }
            }
        }
    }

    /// Table of the left-most leaf.
    pub fn table(&self) -> Option<&str> {
        match self {
            Predicate::Comparison { column, .. } => Some(column.table()),
            Predicate::Boolean { children, .. } => children.iter().find_map(|c| c.table()),
        }
    }

    fn check_compatible(&self, other: &Predicate) -> Result<()> {
        let Some(expected) = self.table().or_else(|| other.table()) else {
            return Ok(());
        };
        for col in self.columns().into_iter().chain(other.columns()) {
            if col.table() != expected {
                return Err(Error::CrossTablePredicate {
                    expected: expected.to_string(),
                    found: col.table().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Check every leaf belongs to `table` and names one of its columns.
    pub fn validate(&self, table: &TableSchema) -> Result<()> {
        match self {
            Predicate::Comparison { column, .. } => {
                if column.table() != table.name() {
                    return Err(Error::CrossTablePredicate {
                        expected: table.name().to_string(),
                        found: column.table().to_string(),
                    });
                }
                table.column(column.name()).map(|_| ())
            }
            Predicate::Boolean { op, children } => {
                if *op == BoolOp::Not && children.len() != 1 {
                    return Err(Error::InvalidArgument(format!(
                        "NOT takes exactly one operand, got {}",
                        children.len()
                    )));
                }
                children.iter().try_for_each(|c| c.validate(table))
            }
        }
    }

    /// Validate against `table`, then lower to a WHERE fragment.
    pub fn compile(&self, table: &TableSchema) -> Result<SqlFragment> {
        self.validate(table)?;
        Ok(self.lower())
    }

    fn lower(&self) -> SqlFragment {
        match self {
            Predicate::Comparison { column, condition } => lower_condition(column, condition),
            Predicate::Boolean { op: BoolOp::Not, children } => {
                let inner = children
                    .first()
                    .map(Predicate::lower)
                    .unwrap_or_else(|| SqlFragment::new("(1 = 1)".into(), Vec::new()));
                SqlFragment::new(format!("(NOT {})", inner.sql), inner.params)
            }
            Predicate::Boolean { op, children } if children.is_empty() => {
                let neutral = if *op == BoolOp::And { "(1 = 1)" } else { "(1 = 0)" };
                SqlFragment::new(neutral.into(), Vec::new())
            }
            Predicate::Boolean { op, children } => {
                let mut parts = Vec::with_capacity(children.len());
                let mut params = Vec::new();
                for child in children {
                    let frag = child.lower();
                    parts.push(frag.sql);
                    params.extend(frag.params);
                }
                let joiner = format!(" {} ", op.keyword());
                SqlFragment::new(format!("({})", parts.join(&joiner)), params)
            }
        }
    }
}

fn lower_condition(column: &ColumnRef, condition: &Condition) -> SqlFragment {
    let col = quote_ident(column.name());
    match condition {
        Condition::Compare(op, v) => {
            SqlFragment::new(format!("{col} {} ?", op.sql()), vec![v.clone()])
        }
        Condition::IsNull => SqlFragment::new(format!("{col} IS NULL"), Vec::new()),
        Condition::NotNull => SqlFragment::new(format!("{col} IS NOT NULL"), Vec::new()),
        Condition::Between(lo, hi) => SqlFragment::new(
            format!("({col} >= ? AND {col} <= ?)"),
            vec![lo.clone(), hi.clone()],
        ),
        Condition::In(set) if set.is_empty() => SqlFragment::new("(1 = 0)".into(), Vec::new()),
        Condition::In(set) => SqlFragment::new(
            format!("{col} IN ({})", placeholders(set.len())),
            set.clone(),
        ),
        Condition::Like(pattern) => SqlFragment::new(
            format!("{col} LIKE ?"),
            vec![Value::Text(pattern.clone())],
        ),
    }
}

fn check_accepts(column: &ColumnRef, value: &Value, op: &str) -> Result<()> {
    if column.kind().accepts(value) {
        Ok(())
    } else {
        Err(Error::TypeMismatch(format!(
            "cannot apply '{op}' to {} ({}) and a {} value",
            column.qualified_name(),
            column.kind(),
            value.type_name()
        )))
    }
}

/// Build `lhs <op> rhs`, flattening operands that already use `op`.
fn combine(op: BoolOp, lhs: Predicate, rhs: Predicate) -> Predicate {
    let mut children = Vec::new();
    for side in [lhs, rhs] {
        match side {
            Predicate::Boolean { op: inner, children: c } if inner == op => children.extend(c),
            other => children.push(other),
        }
    }
    Predicate::Boolean { op, children }
}

/// Unchecked conjunction; table identity is verified at compile time.
impl BitAnd for Predicate {
    type Output = Predicate;

    fn bitand(self, rhs: Predicate) -> Predicate {
        combine(BoolOp::And, self, rhs)
    }
}

/// Unchecked disjunction; table identity is verified at compile time.
impl BitOr for Predicate {
    type Output = Predicate;

    fn bitor(self, rhs: Predicate) -> Predicate {
        combine(BoolOp::Or, self, rhs)
    }
}

impl Not for Predicate {
    type Output = Predicate;

    fn not(self) -> Predicate {
        self.negate()
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frag = self.lower();
        write!(f, "{}", frag.sql)?;
        if !frag.params.is_empty() {
            let params: Vec<String> = frag.params.iter().map(|p| p.to_string()).collect();
            write!(f, " [{}]", params.join(", "))?;
        }
        Ok(())
    }
}
