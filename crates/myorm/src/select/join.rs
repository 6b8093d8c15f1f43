use super::ColumnSpec;
use crate::error::OrmError;
use crate::table::Table;
use std::fmt;
use std::str::FromStr;

/// Supported join kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinType {
    Join,
    LeftJoin,
    RightJoin,
    OuterJoin,
    InnerJoin,
}

impl JoinType {
    pub const ALL: [JoinType; 5] = [
        JoinType::Join,
        JoinType::LeftJoin,
        JoinType::RightJoin,
        JoinType::OuterJoin,
        JoinType::InnerJoin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JoinType::Join => "JOIN",
            JoinType::LeftJoin => "LEFT JOIN",
            JoinType::RightJoin => "RIGHT JOIN",
            JoinType::OuterJoin => "OUTER JOIN",
            JoinType::InnerJoin => "INNER JOIN",
        }
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JoinType {
    type Err = OrmError;

    /// Case-insensitive; runs of whitespace count as one space.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| {
                OrmError::validation(format!(
                    "unknown join type '{s}', expected one of: JOIN, LEFT JOIN, RIGHT JOIN, OUTER JOIN, INNER JOIN"
                ))
            })
    }
}

/// One rendered join.
#[derive(Debug, Clone)]
pub struct JoinSpec {
    pub join_type: JoinType,
    pub table: Table,
    /// Raw boolean expression, inserted verbatim.
    pub on: String,
    /// Columns this join added to the projection.
    pub columns: Vec<ColumnSpec>,
}
