//! SELECT builder.
//!
//! A [`Select`] projects columns of one base table and any joined tables, labelling each
//! output column `<table><sep><column>` so result rows can be split back per table.
//!
//! ## Rendering
//!
//! ```text
//! SELECT <cols> FROM <base>[ <joins>][ WHERE <groups>];
//! ```
//!
//! - every identifier goes through the adapter's identifier escaping, every value through
//!   its value escaping;
//! - each call to [`Select::where_`] adds one AND-group; groups are joined with `OR`, and a
//!   group is parenthesized only when it holds more than one condition;
//! - columns, joins and groups render in insertion order.

mod column;
mod condition;
mod join;

pub use column::{ColumnEntry, ColumnSpec};
pub use condition::{ConditionSpec, DEFAULT_OPERATOR, OPERATORS, WhereCondition, WhereGroup};
pub use join::{JoinSpec, JoinType};

use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::model::Model;
use crate::registry::AdapterRegistry;
use crate::row::Row;
use crate::table::Table;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;

/// SELECT statement builder bound to one base table and one adapter's escaping rules.
#[derive(Debug, Clone)]
pub struct Select {
    registry: AdapterRegistry,
    table: Table,
    dialect: Arc<dyn Dialect>,
    columns: Vec<ColumnSpec>,
    joins: Vec<JoinSpec>,
    where_groups: Vec<WhereGroup>,
    dropped_conditions: usize,
}

impl Select {
    /// An empty select on `table`. Most callers go through [`Adapter::select`](crate::Adapter::select)
    /// or [`Table::select`], which project every column by default.
    pub fn new(registry: AdapterRegistry, table: Table, dialect: Arc<dyn Dialect>) -> Self {
        Self {
            registry,
            table,
            dialect,
            columns: Vec::new(),
            joins: Vec::new(),
            where_groups: Vec::new(),
            dropped_conditions: 0,
        }
    }

    /// The base table.
    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn joins(&self) -> &[JoinSpec] {
        &self.joins
    }

    pub fn where_groups(&self) -> &[WhereGroup] {
        &self.where_groups
    }

    /// Number of WHERE entries discarded because they lacked a table, column or value.
    pub fn dropped_conditions(&self) -> usize {
        self.dropped_conditions
    }

    fn column_spec(&self, entry: ColumnEntry) -> OrmResult<ColumnSpec> {
        let (table, column) = match entry {
            ColumnEntry::Bare(column) => (self.table.name().to_string(), column),
            ColumnEntry::Qualified { table, column } => (table, column),
        };
        if column.trim().is_empty() {
            return Err(OrmError::validation(
                "you have to pass the column you want to add as a name or a table/column pair",
            ));
        }
        if table.trim().is_empty() {
            return Err(OrmError::validation(format!(
                "column \"{column}\" has an empty table name"
            )));
        }
        // Aliases are split on the last separator, so it must not occur in the column.
        let separator = self.table.separator();
        if column.contains(separator) {
            return Err(OrmError::validation(format!(
                "column \"{column}\" of table \"{table}\" contains the column separator \"{separator}\""
            )));
        }
        Ok(ColumnSpec { table, column })
    }

    // ==================== Columns ====================

    /// Append one column to the projection. A bare name belongs to the base table.
    pub fn add_column(&mut self, entry: impl Into<ColumnEntry>) -> OrmResult<&mut Self> {
        let spec = self.column_spec(entry.into())?;
        self.columns.push(spec);
        Ok(self)
    }

    /// Replace the projection with `entries`, in order.
    ///
    /// This also replaces columns contributed by earlier joins; the joins themselves stay.
    /// Nothing changes if any entry is invalid.
    pub fn set_columns<I, E>(&mut self, entries: I) -> OrmResult<&mut Self>
    where
        I: IntoIterator<Item = E>,
        E: Into<ColumnEntry>,
    {
        let specs = entries
            .into_iter()
            .map(|e| self.column_spec(e.into()))
            .collect::<OrmResult<Vec<_>>>()?;
        self.columns = specs;
        Ok(self)
    }

    // ==================== Joins ====================

    /// Join `table` on a raw `on` expression.
    ///
    /// Without `columns`, every column of the joined table is projected (introspected through
    /// the joined table's own adapter). Each column is labelled with the joined table's name.
    pub async fn add_join(
        &mut self,
        join_type: JoinType,
        table: &Table,
        on: &str,
        columns: Option<Vec<String>>,
    ) -> OrmResult<&mut Self> {
        if on.trim().is_empty() {
            return Err(OrmError::validation(format!(
                "you have to pass the on criteria to join \"{}\"",
                table.name()
            )));
        }
        let names = match columns {
            Some(names) => names,
            None => table.column_names(&self.registry).await?,
        };
        let specs = names
            .into_iter()
            .map(|column| {
                self.column_spec(ColumnEntry::Qualified {
                    table: table.name().to_string(),
                    column,
                })
            })
            .collect::<OrmResult<Vec<_>>>()?;

        self.columns.extend(specs.iter().cloned());
        self.joins.push(JoinSpec {
            join_type,
            table: table.clone(),
            on: on.to_string(),
            columns: specs,
        });
        Ok(self)
    }

    /// `LEFT JOIN` shortcut for [`add_join`](Self::add_join).
    pub async fn join_left(
        &mut self,
        table: &Table,
        on: &str,
        columns: Option<Vec<String>>,
    ) -> OrmResult<&mut Self> {
        self.add_join(JoinType::LeftJoin, table, on, columns).await
    }

    // ==================== Conditions ====================

    /// Add one AND-group of conditions; separate calls are ORed together.
    ///
    /// Entries missing a table, column or value are dropped (and counted in
    /// [`dropped_conditions`](Self::dropped_conditions)). An unsupported operator fails the
    /// whole call without changing the select. A group left empty is not added.
    pub fn where_<I>(&mut self, conditions: I) -> OrmResult<&mut Self>
    where
        I: IntoIterator<Item = WhereCondition>,
    {
        let mut group = WhereGroup::default();
        let mut dropped = 0;
        for condition in conditions {
            match condition.resolve()? {
                Some(spec) => group.conditions.push(spec),
                None => dropped += 1,
            }
        }

        if dropped > 0 {
            tracing::warn!(
                target: "myorm.adapter",
                table = %self.table.name(),
                dropped,
                "dropped incomplete where conditions"
            );
            self.dropped_conditions += dropped;
        }
        if !group.is_empty() {
            self.where_groups.push(group);
        }
        Ok(self)
    }

    // ==================== Rendering ====================

    /// Check that the select can be rendered into a runnable statement.
    pub fn validate(&self) -> OrmResult<()> {
        if self.columns.is_empty() {
            return Err(OrmError::validation(format!(
                "select on \"{}\" has no columns",
                self.table.name()
            )));
        }
        for spec in &self.columns {
            let known = spec.table == self.table.name()
                || self.joins.iter().any(|j| j.table.name() == spec.table);
            if !known {
                return Err(OrmError::validation(format!(
                    "column \"{}\" belongs to table \"{}\", which is neither \"{}\" nor joined",
                    spec.column,
                    spec.table,
                    self.table.name()
                )));
            }
        }
        Ok(())
    }

    /// Render the statement without validating it.
    pub fn to_sql(&self) -> String {
        let d = self.dialect.as_ref();
        let separator = self.table.separator();

        let columns = self
            .columns
            .iter()
            .map(|c| {
                format!(
                    "{}.{} AS {}",
                    d.escape_identifier(&c.table),
                    d.escape_identifier(&c.column),
                    d.quote_alias(&c.alias(separator))
                )
            })
            .collect::<Vec<_>>()
            .join(", ");

        let mut sql = format!(
            "SELECT {} FROM {}",
            columns,
            d.escape_identifier(self.table.name())
        );

        if !self.joins.is_empty() {
            let joins = self
                .joins
                .iter()
                .map(|j| {
                    format!(
                        "{} {} ON {}",
                        j.join_type,
                        d.escape_identifier(j.table.name()),
                        j.on
                    )
                })
                .collect::<Vec<_>>()
                .join(" ");
            sql.push(' ');
            sql.push_str(&joins);
        }

        if !self.where_groups.is_empty() {
            let groups = self
                .where_groups
                .iter()
                .map(|group| {
                    let rendered = group
                        .conditions
                        .iter()
                        .map(|c| {
                            format!(
                                "{}.{} {} {}",
                                d.escape_identifier(&c.table),
                                d.escape_identifier(&c.column),
                                c.operator,
                                d.escape(&c.value)
                            )
                        })
                        .collect::<Vec<_>>()
                        .join(" AND ");
                    if group.len() > 1 {
                        format!("({rendered})")
                    } else {
                        rendered
                    }
                })
                .collect::<Vec<_>>()
                .join(" OR ");
            sql.push_str(" WHERE ");
            sql.push_str(&groups);
        }

        sql.push(';');
        sql
    }

    /// Validate, then render.
    pub fn build(&self) -> OrmResult<String> {
        self.validate()?;
        Ok(self.to_sql())
    }

    // ==================== Execution ====================

    /// Run the statement on the base table's adapter.
    pub async fn fetch(&self) -> OrmResult<Vec<Row>> {
        let sql = self.build()?;
        let adapter = self.table.adapter(&self.registry)?;
        adapter.query(&sql, &[]).await
    }

    /// Run the statement and hydrate one `table` model per row.
    pub async fn fetch_models(&self, table: &Table) -> OrmResult<Vec<Model>> {
        self.fetch()
            .await?
            .iter()
            .map(|row| Model::new(table, row))
            .collect()
    }

    /// Run the statement and deserialize the base table's slice of every row into `T`.
    pub async fn fetch_as<T: DeserializeOwned>(&self) -> OrmResult<Vec<T>> {
        self.fetch_models(&self.table)
            .await?
            .iter()
            .map(|model| model.deserialize())
            .collect()
    }
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}
