//! Row → model hydration.

use crate::error::{OrmError, OrmResult};
use crate::row::{Attributes, ModelData, Row};
use crate::table::Table;
use crate::value::Value;
use serde::de::DeserializeOwned;

/// One table's slice of a result row.
///
/// Columns of joined tables are not copied onto the model; hydrate them separately with
/// [`Model::related`].
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    table: Table,
    attributes: Attributes,
}

impl Model {
    /// Split `row` with the table's separator and keep the slice of `table`.
    pub fn new(table: &Table, row: &Row) -> OrmResult<Self> {
        let data = table.prepare_data_for_model(row)?;
        Self::from_data(table, &data)
    }

    /// Keep the slice of `table` from already split data.
    pub fn from_data(table: &Table, data: &ModelData) -> OrmResult<Self> {
        let attributes = data.get(table.name()).cloned().ok_or_else(|| {
            OrmError::mapping(format!(
                "no data for mapping on the model \"{}\" found",
                table.name()
            ))
        })?;
        Ok(Self {
            table: table.clone(),
            attributes,
        })
    }

    /// Hydrate a joined table's model from the same data.
    ///
    /// `None` when the slice is missing or every value is NULL (an outer join without match).
    pub fn related(table: &Table, data: &ModelData) -> Option<Self> {
        let attributes = data.get(table.name())?;
        if attributes.values().all(Value::is_null) {
            return None;
        }
        Some(Self {
            table: table.clone(),
            attributes: attributes.clone(),
        })
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.attributes.get(column)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn into_attributes(self) -> Attributes {
        self.attributes
    }

    /// Deserialize the attributes into `T` (through JSON).
    pub fn deserialize<T: DeserializeOwned>(&self) -> OrmResult<T> {
        let object: serde_json::Map<String, serde_json::Value> = self
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        serde_json::from_value(serde_json::Value::Object(object)).map_err(|e| {
            OrmError::mapping(format!("cannot deserialize \"{}\" model: {e}", self.table.name()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn joined_row() -> Row {
        [
            ("users.id", Value::from(1)),
            ("users.name", Value::from("ada")),
            ("roles.id", Value::Null),
            ("roles.name", Value::Null),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn copies_only_own_slice() {
        let users = Table::new("users").unwrap();
        let model = Model::new(&users, &joined_row()).unwrap();
        assert_eq!(model.get("id"), Some(&Value::Int(1)));
        assert_eq!(model.get("name"), Some(&Value::from("ada")));
        assert_eq!(model.attributes().len(), 2);
        assert_eq!(model.table().name(), "users");
    }

    #[test]
    fn missing_slice_is_mapping_error() {
        let posts = Table::new("posts").unwrap();
        let err = Model::new(&posts, &joined_row()).unwrap_err();
        assert!(err.is_mapping());
        assert!(err.to_string().contains("posts"));
    }

    #[test]
    fn malformed_key_is_mapping_error() {
        let users = Table::new("users").unwrap();
        let row: Row = [("id", Value::from(1))].into_iter().collect();
        assert!(Model::new(&users, &row).unwrap_err().is_mapping());
    }

    #[test]
    fn related_skips_null_slices() {
        let users = Table::new("users").unwrap();
        let roles = Table::new("roles").unwrap();
        let data = users.prepare_data_for_model(&joined_row()).unwrap();
        assert!(Model::related(&roles, &data).is_none());
        assert!(Model::related(&Table::new("posts").unwrap(), &data).is_none());

        let row: Row = [("users.id", Value::from(1)), ("roles.id", Value::from(3))]
            .into_iter()
            .collect();
        let data = users.prepare_data_for_model(&row).unwrap();
        let role = Model::related(&roles, &data).unwrap();
        assert_eq!(role.get("id"), Some(&Value::Int(3)));
    }

    #[test]
    fn deserializes_into_struct() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct User {
            id: i64,
            name: String,
            email: Option<String>,
        }

        let users = Table::new("users").unwrap();
        let row: Row = [
            ("users.id", Value::from(1)),
            ("users.name", Value::from("ada")),
            ("users.email", Value::Null),
        ]
        .into_iter()
        .collect();
        let user: User = Model::new(&users, &row).unwrap().deserialize().unwrap();
        assert_eq!(
            user,
            User {
                id: 1,
                name: "ada".into(),
                email: None
            }
        );

        let err = Model::new(&users, &[("users.id", Value::from("x"))].into_iter().collect())
            .unwrap()
            .deserialize::<User>()
            .unwrap_err();
        assert!(err.is_mapping());
    }
}
