//! Named capabilities injected into every sandbox.
//!
//! Assertion and mock DSL entry points live outside the engine. Embedders
//! register them here by name and sandboxed code looks them up with a typed
//! [`Extensions::get`].

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

type Capability = Arc<dyn Any + Send + Sync>;

/// Enumerated capability table. Cloning shares the values, not the table.
#[derive(Clone, Default)]
pub struct Extensions {
    entries: BTreeMap<String, Capability>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value` under `name`, returning `true` if it replaced one.
    pub fn insert<T>(&mut self, name: impl Into<String>, value: T) -> bool
    where
        T: Any + Send + Sync,
    {
        self.entries.insert(name.into(), Arc::new(value)).is_some()
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with<T>(mut self, name: impl Into<String>, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        self.insert(name, value);
        self
    }

    /// Typed lookup. `None` when absent or registered with another type.
    pub fn get<T>(&self, name: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let value = Arc::clone(self.entries.get(name)?);
        value.downcast::<T>().ok()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Assert {
        strict: bool,
    }

    #[test]
    fn test_typed_lookup() {
        let ext = Extensions::new().with("assert", Assert { strict: true });
        assert!(ext.get::<Assert>("assert").unwrap().strict);
        assert!(ext.get::<String>("assert").is_none());
        assert!(ext.get::<Assert>("is").is_none());
    }

    #[test]
    fn test_clone_shares_values_but_not_table() {
        let base = Extensions::new().with("is", 7_u32);
        let mut per_file = base.clone();
        per_file.insert("spyOn", "spy".to_string());

        assert!(Arc::ptr_eq(
            &base.get::<u32>("is").unwrap(),
            &per_file.get::<u32>("is").unwrap()
        ));
        assert!(!base.contains("spyOn"));
        assert_eq!(per_file.names().collect::<Vec<_>>(), vec!["is", "spyOn"]);
    }

    #[test]
    fn test_insert_reports_replacement() {
        let mut ext = Extensions::new();
        assert!(!ext.insert("Fn", 1_u8));
        assert!(ext.insert("Fn", 2_u8));
        assert_eq!(*ext.get::<u8>("Fn").unwrap(), 2);
    }
}
