//! Named adapter storage.
//!
//! An [`AdapterRegistry`] is created once at startup and handed to everything that needs to
//! resolve a table's adapter. Clones share the same storage.

use crate::adapter::{Adapter, build_adapter};
use crate::config::RegistryConfig;
use crate::error::{OrmError, OrmResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Adapter name used when a table does not name one.
pub const DEFAULT_ADAPTER_NAME: &str = "mysql";

/// Name → adapter mapping shared by every [`Table`](crate::Table) and [`Select`](crate::Select).
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: Arc<RwLock<HashMap<String, Arc<dyn Adapter>>>>,
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("adapters", &self.names())
            .finish()
    }
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and register every adapter of `config`.
    pub fn from_config(config: &RegistryConfig) -> OrmResult<Self> {
        let registry = Self::new();
        for adapter in &config.adapters {
            registry.add_adapter(adapter.name.clone(), build_adapter(adapter)?)?;
        }
        Ok(registry)
    }

    /// Register `adapter` under `name`.
    ///
    /// Fails when the name is empty or already taken; the existing entry stays untouched.
    pub fn add_adapter(&self, name: impl Into<String>, adapter: Arc<dyn Adapter>) -> OrmResult<&Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(OrmError::validation("adapter name must not be empty"));
        }
        let mut adapters = self.adapters.write().unwrap_or_else(PoisonError::into_inner);
        if adapters.contains_key(&name) {
            return Err(OrmError::validation(format!(
                "there is already an adapter with the name \"{name}\" in the registry"
            )));
        }
        tracing::debug!(target: "myorm.adapter", adapter = %name, "adapter registered");
        adapters.insert(name, adapter);
        Ok(self)
    }

    /// Register `adapter` under its own [`Adapter::name`].
    pub fn register(&self, adapter: Arc<dyn Adapter>) -> OrmResult<&Self> {
        let name = adapter.name().to_string();
        self.add_adapter(name, adapter)
    }

    /// Adapter registered under `name`.
    pub fn get_adapter(&self, name: &str) -> OrmResult<Arc<dyn Adapter>> {
        self.adapters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| {
                OrmError::lookup(format!("no adapter with the name \"{name}\" was found in the registry"))
            })
    }

    pub fn has_adapter(&self, name: &str) -> bool {
        self.adapters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Name used by tables that do not name an adapter.
    pub fn standard_adapter_name(&self) -> &'static str {
        DEFAULT_ADAPTER_NAME
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .adapters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Close every registered adapter, returning the first failure.
    pub async fn close_all(&self) -> OrmResult<()> {
        let adapters: Vec<Arc<dyn Adapter>> = self
            .adapters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        let mut first_error = None;
        for adapter in adapters {
            if let Err(err) = adapter.close().await {
                tracing::warn!(target: "myorm.adapter", adapter = %adapter.name(), error = %err, "close failed");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AdapterConfig, AdapterKind, ConnectionSettings};
    use crate::testing::StubAdapter;

    #[test]
    fn add_and_get() {
        let registry = AdapterRegistry::new();
        registry
            .add_adapter("mysql", StubAdapter::arc("mysql"))
            .unwrap()
            .add_adapter("replica", StubAdapter::arc("replica"))
            .unwrap();

        assert!(registry.has_adapter("mysql"));
        assert_eq!(registry.get_adapter("replica").unwrap().name(), "replica");
        assert_eq!(registry.names(), vec!["mysql", "replica"]);
    }

    #[test]
    fn duplicate_name_is_rejected_and_first_kept() {
        let registry = AdapterRegistry::new();
        let first = StubAdapter::arc("m");
        let second = StubAdapter::arc("m");
        registry.add_adapter("m", first.clone()).unwrap();
        let err = registry.add_adapter("m", second.clone()).unwrap_err();
        assert!(err.is_validation());

        let found = registry.get_adapter("m").unwrap();
        assert!(std::ptr::addr_eq(Arc::as_ptr(&found), Arc::as_ptr(&first)));
        assert!(!std::ptr::addr_eq(Arc::as_ptr(&found), Arc::as_ptr(&second)));
    }

    #[test]
    fn unknown_name_is_lookup_error() {
        let registry = AdapterRegistry::new();
        let Err(err) = registry.get_adapter("nope") else {
            panic!("unknown adapter name resolved");
        };
        assert!(err.is_lookup());
        assert!(!registry.has_adapter("nope"));
    }

    #[test]
    fn clones_share_storage() {
        let registry = AdapterRegistry::new();
        let other = registry.clone();
        other.register(StubAdapter::arc("mysql")).unwrap();
        assert!(registry.has_adapter(DEFAULT_ADAPTER_NAME));
        assert_eq!(registry.standard_adapter_name(), "mysql");
    }

    #[test]
    fn from_config_requires_settings() {
        let config = RegistryConfig {
            adapters: vec![AdapterConfig {
                settings: None,
                ..AdapterConfig::new("pg", AdapterKind::Mysql, ConnectionSettings::new("h"))
            }],
        };
        assert!(AdapterRegistry::from_config(&config).unwrap_err().is_configuration());
    }

    #[cfg(feature = "mysql")]
    #[test]
    fn from_config_registers_every_adapter() {
        let config = RegistryConfig::from_toml_str(
            r#"
            [[adapter]]
            kind = "mysql"
            url = "mysql://root@localhost/app"

            [[adapter]]
            name = "live"
            kind = "live_mysql"
            url = "mysql://root@localhost/app"
            "#,
        )
        .unwrap();
        let registry = AdapterRegistry::from_config(&config).unwrap();
        assert_eq!(registry.names(), vec!["live", "mysql"]);
        assert!(!registry.get_adapter("mysql").unwrap().init_done());
    }

    #[cfg(feature = "mysql")]
    #[test]
    fn from_config_rejects_duplicates() {
        let config = RegistryConfig::from_toml_str(
            r#"
            [[adapter]]
            kind = "mysql"
            url = "mysql://root@localhost/app"

            [[adapter]]
            kind = "live_mysql"
            url = "mysql://root@localhost/app"
            "#,
        )
        .unwrap();
        assert!(AdapterRegistry::from_config(&config).unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn close_all_closes_everything() {
        let registry = AdapterRegistry::new();
        let a = StubAdapter::arc("a");
        registry.register(a.clone()).unwrap();
        a.connect().await.unwrap();
        assert!(a.init_done());
        registry.close_all().await.unwrap();
        assert!(!a.init_done());
    }
}
