use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Value, json};

use crate::{ast::operators::is_reserved, error::ParseError, registry::Registry};

/// Namespace assumed when a property is written without one.
pub const DEFAULT_NAMESPACE: &str = "default";

static BARE_PROPERTY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").expect("valid property pattern"));

/// Reference to a property of the searched records, or to an alias declared with `AS`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PropertyRef {
    pub namespace: Option<String>,
    pub id: String,
    pub alias: bool,
}

impl PropertyRef {
    pub fn new(id: impl Into<String>) -> Self {
        PropertyRef {
            namespace: None,
            id: id.into(),
            alias: false,
        }
    }

    pub fn namespaced(namespace: impl Into<String>, id: impl Into<String>) -> Self {
        let namespace = namespace.into();
        PropertyRef {
            namespace: (namespace != DEFAULT_NAMESPACE).then_some(namespace),
            id: id.into(),
            alias: false,
        }
    }

    pub fn alias(name: impl Into<String>) -> Self {
        PropertyRef {
            namespace: None,
            id: name.into(),
            alias: true,
        }
    }

    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }

    /// Interpret property text as typed in a query (`id`, `ns:id`), swapping a
    /// registered friendly name for its id.
    pub fn from_text(text: &str, registry: &Registry) -> Self {
        let (namespace, name) = match text.split_once(':') {
            Some((ns, name)) if !ns.is_empty() && !name.is_empty() => (Some(ns), name),
            _ => (None, text),
        };
        let id = registry.property_id(name).unwrap_or(name);
        match namespace {
            Some(ns) => Self::namespaced(ns, id),
            None => Self::new(id),
        }
    }

    pub fn to_json(&self) -> Value {
        if self.alias {
            return json!({ "alias": self.id });
        }
        match &self.namespace {
            Some(ns) => json!({ "source": { "ns": ns, "id": self.id } }),
            None => json!({ "source": self.id }),
        }
    }

    pub fn from_json(value: &Value) -> Result<Self, ParseError> {
        let object = value
            .as_object()
            .ok_or_else(|| ParseError::json(format!("expected a property descriptor, found {value}")))?;

        if let Some(name) = object.get("alias") {
            return name
                .as_str()
                .map(PropertyRef::alias)
                .ok_or_else(|| ParseError::json("alias reference must be a string"));
        }

        match object.get("source") {
            Some(Value::String(id)) => Ok(PropertyRef::new(id.as_str())),
            Some(Value::Object(source)) => {
                let id = source
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ParseError::json("property source is missing 'id'"))?;
                match source.get("ns").and_then(Value::as_str) {
                    Some(ns) => Ok(PropertyRef::namespaced(ns, id)),
                    None => Ok(PropertyRef::new(id)),
                }
            }
            _ => Err(ParseError::json(format!(
                "expected a property descriptor, found {value}"
            ))),
        }
    }

    /// Render for the query string, using the friendly name when one is registered.
    pub fn to_query_string(&self, registry: &Registry) -> String {
        let name = if self.alias {
            self.id.as_str()
        } else {
            registry.property_name(&self.id).unwrap_or(&self.id)
        };
        let text = match &self.namespace {
            Some(ns) => format!("{ns}:{name}"),
            // Spell out the namespace so the first `:` is not read as one.
            None if !self.alias && name.contains(':') => format!("{DEFAULT_NAMESPACE}:{name}"),
            None => name.to_string(),
        };
        let plain = self.namespace.as_deref().is_none_or(|ns| BARE_PROPERTY.is_match(ns))
            && BARE_PROPERTY.is_match(name)
            && !is_reserved(name);
        if plain { text } else { format!("[{text}]") }
    }

    /// Column label used for default aggregate aliases (`bytes` -> `bytesCount`).
    pub fn label(&self) -> &str {
        &self.id
    }
}

impl From<&str> for PropertyRef {
    fn from(id: &str) -> Self {
        PropertyRef::new(id)
    }
}

impl From<String> for PropertyRef {
    fn from(id: String) -> Self {
        PropertyRef::new(id)
    }
}

#[test]
fn test_namespace_split() {
    let registry = Registry::default();
    let p = PropertyRef::from_text("flow:bytes", &registry);
    assert_eq!(p.namespace.as_deref(), Some("flow"));
    assert_eq!(p.id, "bytes");
    assert_eq!(p.to_json(), json!({"source": {"ns": "flow", "id": "bytes"}}));

    let p = PropertyRef::from_text("default:bytes", &registry);
    assert_eq!(p.namespace, None);
}

#[test]
fn test_brackets_for_awkward_names() {
    let registry = Registry::default();
    assert_eq!(PropertyRef::new("src ip").to_query_string(&registry), "[src ip]");
    assert_eq!(PropertyRef::new("count").to_query_string(&registry), "[count]");
    assert_eq!(PropertyRef::new("src_ip").to_query_string(&registry), "src_ip");
}
