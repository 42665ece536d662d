//! Friendly-name substitution for properties and values.
//!
//! Backend identifiers are opaque (`f3a9...`), so query strings shown to
//! people use registered display names instead. The parser swaps names for ids
//! and the query-string renderer swaps them back; JSON always carries ids.
//!
//! The registry is populated by the host before parsing and passed explicitly
//! to every parse and render call. It holds no interior mutability; share it
//! across threads behind an `Arc` once populated, or wrap it in a lock if it
//! has to change while queries are in flight.

use std::collections::HashMap;

use serde::Deserialize;

/// Bidirectional name <-> id table.
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    by_name: HashMap<String, String>,
    by_id: HashMap<String, String>,
}

impl NameTable {
    pub fn insert(&mut self, name: impl Into<String>, id: impl Into<String>) {
        let (name, id) = (name.into(), id.into());
        if let Some(old_id) = self.by_name.insert(name.clone(), id.clone()) {
            self.by_id.remove(&old_id);
        }
        if let Some(old_name) = self.by_id.insert(id, name) {
            self.by_name.remove(&old_name);
        }
    }

    pub fn id(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(String::as_str)
    }

    pub fn name(&self, id: &str) -> Option<&str> {
        self.by_id.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Named-entity registry: one table for properties, one for values.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    properties: NameTable,
    values: NameTable,
}

#[derive(Deserialize)]
struct RegistryFile {
    #[serde(default)]
    properties: HashMap<String, String>,
    #[serde(default)]
    values: HashMap<String, String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `{"properties": {name: id}, "values": {name: id}}`.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let file: RegistryFile = serde_json::from_str(json)?;
        let mut registry = Registry::new();
        for (name, id) in file.properties {
            registry.register_property(name, id);
        }
        for (name, id) in file.values {
            registry.register_value(name, id);
        }
        Ok(registry)
    }

    pub fn register_property(&mut self, name: impl Into<String>, id: impl Into<String>) {
        self.properties.insert(name, id);
    }

    pub fn register_value(&mut self, name: impl Into<String>, id: impl Into<String>) {
        self.values.insert(name, id);
    }

    pub fn property_id(&self, name: &str) -> Option<&str> {
        self.properties.id(name)
    }

    pub fn property_name(&self, id: &str) -> Option<&str> {
        self.properties.name(id)
    }

    pub fn value_id(&self, name: &str) -> Option<&str> {
        self.values.id(name)
    }

    pub fn value_name(&self, id: &str) -> Option<&str> {
        self.values.name(id)
    }

    pub fn properties(&self) -> &NameTable {
        &self.properties
    }

    pub fn values(&self) -> &NameTable {
        &self.values
    }
}

#[test]
fn test_rebinding_drops_stale_reverse_entry() {
    let mut table = NameTable::default();
    table.insert("Production", "env-1");
    table.insert("Production", "env-2");
    assert_eq!(table.id("Production"), Some("env-2"));
    assert_eq!(table.name("env-1"), None);
    assert_eq!(table.name("env-2"), Some("Production"));
}

#[test]
fn test_load_from_json() {
    let registry =
        Registry::from_json_str(r#"{"properties": {"Source IP": "src_ip"}, "values": {"Prod": "env-1"}}"#)
            .unwrap();
    assert_eq!(registry.property_id("Source IP"), Some("src_ip"));
    assert_eq!(registry.value_name("env-1"), Some("Prod"));
}
