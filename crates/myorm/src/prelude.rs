//! Common imports.
//!
//! ```ignore
//! use myorm::prelude::*;
//! ```

pub use crate::{
    Adapter, AdapterConfig, AdapterRegistry, ConnectionSettings, Model, OrmError, OrmResult, Row,
    Select, Table, Value, WhereCondition, build_adapter,
};

#[cfg(feature = "mysql")]
pub use crate::{LiveMySqlAdapter, MySqlAdapter};
