use crate::error::{OrmError, OrmResult};
use crate::value::Value;

/// Comparison operators accepted in WHERE conditions.
pub const OPERATORS: [&str; 11] = [
    "=", "!=", "<>", "<", "<=", ">", ">=", "LIKE", "NOT LIKE", "IS", "IS NOT",
];

/// Default comparison operator.
pub const DEFAULT_OPERATOR: &str = "=";

/// Map an operator to its canonical spelling, or fail if it is not allowed.
pub(crate) fn normalize_operator(operator: &str) -> OrmResult<&'static str> {
    let normalized = operator.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
    OPERATORS
        .into_iter()
        .find(|op| *op == normalized)
        .ok_or_else(|| {
            OrmError::validation(format!(
                "unsupported where operator '{operator}', expected one of: {}",
                OPERATORS.join(", ")
            ))
        })
}

/// A loosely specified condition, as passed to [`Select::where_`](super::Select::where_).
///
/// Entries without a table, column or value are dropped by `where_` instead of failing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereCondition {
    pub table: Option<String>,
    pub column: Option<String>,
    /// Defaults to `=`.
    pub operator: Option<String>,
    pub value: Option<Value>,
}

impl WhereCondition {
    /// `table.column = value`
    pub fn eq(table: impl Into<String>, column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            table: Some(table.into()),
            column: Some(column.into()),
            operator: None,
            value: Some(value.into()),
        }
    }

    /// `table.column <operator> value`
    pub fn compare(
        table: impl Into<String>,
        column: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            operator: Some(operator.into()),
            ..Self::eq(table, column, value)
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = Some(operator.into());
        self
    }

    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Resolve into a renderable condition.
    ///
    /// `Ok(None)` means the entry is incomplete and gets dropped.
    /// The operator is only checked on complete entries.
    pub(crate) fn resolve(self) -> OrmResult<Option<ConditionSpec>> {
        let table = self.table.filter(|t| !t.is_empty());
        let column = self.column.filter(|c| !c.is_empty());
        let (Some(table), Some(column), Some(value)) = (table, column, self.value) else {
            return Ok(None);
        };
        let operator = match &self.operator {
            Some(op) => normalize_operator(op)?,
            None => DEFAULT_OPERATOR,
        };
        Ok(Some(ConditionSpec {
            table,
            column,
            operator,
            value,
        }))
    }
}

/// A validated condition: `table.column operator value`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionSpec {
    pub table: String,
    pub column: String,
    pub operator: &'static str,
    pub value: Value,
}

/// Conditions joined with `AND`. Groups are joined with `OR`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereGroup {
    pub conditions: Vec<ConditionSpec>,
}

impl WhereGroup {
    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}
