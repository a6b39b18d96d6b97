//! Composite extraction rules
//!
//! A [`Schema`] locates its item container(s) below a starting element and builds
//! one mapping per container from its selectors and nested schemas. A mandatory
//! child that comes back absent voids the whole mapping, and the void travels up
//! through every ancestor that marked that schema mandatory.

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::selector::Selector;
use crate::dom::DomNode;
use crate::error::{ExtractError, Result};

/// Key under which typed schemas store their type
pub const TYPE_KEY: &str = "@type";

/// How a schema finds its container and shapes its result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaKind {
    #[default]
    Plain,
    /// Each mapping starts with `"@type": schema_type`
    Typed { schema_type: String },
    /// The container is the nearest ancestor of the starting element, as for a
    /// click target looking up its product tile. `as_array` wraps the mapping in a
    /// one-element list.
    Event {
        #[serde(default = "default_as_array")]
        as_array: bool,
    },
}

fn default_as_array() -> bool {
    true
}

/// A named composite rule
///
/// Children are owned, so a schema tree is always finite and acyclic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    /// Relative CSS locator of the item container; empty means the starting element
    #[serde(default)]
    pub container_locator: String,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default)]
    pub selectors: Vec<Selector>,
    #[serde(default)]
    pub schemas: Vec<Schema>,
    /// One mapping per container, in a list. Ignored for event schemas, which
    /// always resolve a single ancestor.
    #[serde(default)]
    pub is_collection: bool,
    #[serde(default)]
    pub kind: SchemaKind,
}

impl Schema {
    pub fn new(name: impl Into<String>, container_locator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            container_locator: container_locator.into(),
            mandatory: false,
            selectors: Vec::new(),
            schemas: Vec::new(),
            is_collection: false,
            kind: SchemaKind::Plain,
        }
    }

    /// A schema.org typed schema, e.g. `Schema::typed("Product", "product", ".product")`
    pub fn typed(
        schema_type: impl Into<String>,
        name: impl Into<String>,
        container_locator: impl Into<String>,
    ) -> Self {
        Self {
            kind: SchemaKind::Typed {
                schema_type: schema_type.into(),
            },
            ..Self::new(name, container_locator)
        }
    }

    /// A schema evaluated from an event target upward
    pub fn event(
        name: impl Into<String>,
        container_locator: impl Into<String>,
        as_array: bool,
    ) -> Self {
        Self {
            kind: SchemaKind::Event { as_array },
            ..Self::new(name, container_locator)
        }
    }

    /// Builder method: an absent result invalidates the enclosing schema
    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    /// Builder method: one mapping per matching container
    pub fn collection(mut self) -> Self {
        self.is_collection = true;
        self
    }

    pub fn with_selectors(mut self, selectors: Vec<Selector>) -> Self {
        self.selectors = selectors;
        self
    }

    /// Builder method: attach fully built child schemas
    pub fn with_schemas(mut self, schemas: Vec<Schema>) -> Self {
        self.schemas = schemas;
        self
    }

    /// Evaluate the schema below `start`.
    ///
    /// Returns `Ok(None)` when no container was found, a collection came back
    /// empty, or a mandatory child was absent.
    pub fn evaluate<N: DomNode>(&self, start: &N) -> Result<Option<Value>> {
        if let SchemaKind::Event { as_array } = self.kind {
            return self.evaluate_event(start, as_array);
        }

        if !self.is_collection {
            let container = if self.container_locator.is_empty() {
                Some(start.clone())
            } else {
                start.query_first(&self.container_locator)?
            };

            let Some(container) = container else {
                debug!(
                    "The data schema '{}', using selector '{}', did not find an element.",
                    self.name, self.container_locator
                );
                return Ok(None);
            };

            return Ok(self.aggregate(&container)?.map(Value::Object));
        }

        if self.container_locator.is_empty() {
            return Err(ExtractError::EmptyCollectionLocator {
                name: self.name.clone(),
            });
        }

        let mut items = Vec::new();
        for container in start.query_all(&self.container_locator)? {
            if let Some(data) = self.aggregate(&container)? {
                items.push(Value::Object(data));
            }
        }

        if items.is_empty() {
            debug!(
                "The data schema '{}', using selector '{}', had no results for the collection.",
                self.name, self.container_locator
            );
            return Ok(None);
        }
        Ok(Some(Value::Array(items)))
    }

    fn evaluate_event<N: DomNode>(&self, start: &N, as_array: bool) -> Result<Option<Value>> {
        let container = if self.container_locator.is_empty() {
            Some(start.clone())
        } else {
            start.closest(&self.container_locator)?
        };

        let Some(container) = container else {
            debug!(
                "The event schema '{}', using selector '{}', has no matching ancestor.",
                self.name, self.container_locator
            );
            return Ok(None);
        };

        Ok(self.aggregate(&container)?.map(|data| {
            if as_array {
                Value::Array(vec![Value::Object(data)])
            } else {
                Value::Object(data)
            }
        }))
    }

    /// Build the mapping for one item container
    fn aggregate<N: DomNode>(&self, container: &N) -> Result<Option<Map<String, Value>>> {
        let mut data = Map::new();
        let mut invalid = false;

        for selector in &self.selectors {
            match selector.evaluate(container)? {
                Some(value) => {
                    data.insert(selector.name.clone(), value);
                }
                None if selector.mandatory => invalid = true,
                None => {}
            }
        }

        if invalid {
            debug!(
                "The data schema '{}', using selector '{}', missed mandatory data.",
                self.name, self.container_locator
            );
            return Ok(None);
        }

        for schema in &self.schemas {
            match schema.evaluate(container)? {
                Some(value) => {
                    data.insert(schema.name.clone(), value);
                }
                None if schema.mandatory => invalid = true,
                None => {}
            }
        }

        if invalid {
            debug!(
                "The data schema '{}', using selector '{}', missed mandatory schema.",
                self.name, self.container_locator
            );
            return Ok(None);
        }

        if let SchemaKind::Typed { schema_type } = &self.kind {
            let mut typed = Map::with_capacity(data.len() + 1);
            typed.insert(TYPE_KEY.to_string(), Value::String(schema_type.clone()));
            typed.extend(data);
            return Ok(Some(typed));
        }

        Ok(Some(data))
    }
}
