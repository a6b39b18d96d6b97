//! Leaf extraction rules
//!
//! A [`Selector`] reads one value (or one value per match, for collections) from an
//! item container and coerces it to its [`ValueKind`].

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::number::parse_number;
use crate::dom::DomNode;
use crate::error::{ExtractError, Result};

/// Target type of a located value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    #[default]
    Text,
    Number,
    /// The `src` of an image
    Image,
    /// The current value of a form control
    Value,
    /// The `href` of a link
    Url,
}

/// Where a selector takes its value from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum SelectorSource {
    Locator {
        /// Relative CSS locator; empty means the container itself
        #[serde(default)]
        locator: String,
        #[serde(default)]
        kind: ValueKind,
        /// Data attribute to read instead of the inner HTML, in dataset naming (`productId`)
        #[serde(default)]
        attribute: String,
        #[serde(default)]
        is_collection: bool,
    },
    Fixed {
        value: Value,
    },
    /// Position of the container among its siblings
    Index,
}

/// A named leaf rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selector {
    pub name: String,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(flatten)]
    pub source: SelectorSource,
}

impl Selector {
    /// Read a value of `kind` from the first element matching `locator`
    pub fn new(name: impl Into<String>, locator: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            mandatory: false,
            source: SelectorSource::Locator {
                locator: locator.into(),
                kind,
                attribute: String::new(),
                is_collection: false,
            },
        }
    }

    pub fn text(name: impl Into<String>, locator: impl Into<String>) -> Self {
        Self::new(name, locator, ValueKind::Text)
    }

    pub fn number(name: impl Into<String>, locator: impl Into<String>) -> Self {
        Self::new(name, locator, ValueKind::Number)
    }

    /// A constant value, present for every container
    pub fn fixed(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            mandatory: true,
            source: SelectorSource::Fixed {
                value: value.into(),
            },
        }
    }

    /// The container's zero-based position in its parent
    pub fn index(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mandatory: true,
            source: SelectorSource::Index,
        }
    }

    /// Builder method: an absent value invalidates the enclosing schema
    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    /// Builder method: read the named data attribute instead of the inner HTML
    pub fn with_attribute(mut self, key: impl Into<String>) -> Self {
        if let SelectorSource::Locator { attribute, .. } = &mut self.source {
            *attribute = key.into();
        }
        self
    }

    /// Builder method: collect every match into an array
    pub fn collection(mut self) -> Self {
        if let SelectorSource::Locator { is_collection, .. } = &mut self.source {
            *is_collection = true;
        }
        self
    }

    /// The locator used in diagnostics, empty for fixed and index selectors
    pub fn locator(&self) -> &str {
        match &self.source {
            SelectorSource::Locator { locator, .. } => locator,
            _ => "",
        }
    }

    /// Evaluate against an item container.
    ///
    /// `Ok(None)` means no usable value was found; errors are reserved for
    /// malformed definitions.
    pub fn evaluate<N: DomNode>(&self, container: &N) -> Result<Option<Value>> {
        match &self.source {
            SelectorSource::Fixed { value } => Ok(Some(value.clone())),
            SelectorSource::Index => {
                let index = container.sibling_index();
                if index.is_none() {
                    debug!("The data selector '{}' has a container without a parent.", self.name);
                }
                Ok(index.map(Value::from))
            }
            SelectorSource::Locator {
                locator,
                kind,
                attribute,
                is_collection: false,
            } => {
                let item = if locator.is_empty() {
                    if attribute.is_empty() {
                        return Err(ExtractError::MissingAttributeKey {
                            name: self.name.clone(),
                        });
                    }
                    Some(container.clone())
                } else {
                    container.query_first(locator)?
                };

                match item {
                    Some(item) => Ok(self.read_item(&item, locator, *kind, attribute)),
                    None => {
                        debug!(
                            "The data selector '{}', using selector '{}', had no item to retrieve data from.",
                            self.name, locator
                        );
                        Ok(None)
                    }
                }
            }
            SelectorSource::Locator {
                locator,
                kind,
                attribute,
                is_collection: true,
            } => {
                if locator.is_empty() {
                    return Err(ExtractError::EmptyCollectionLocator {
                        name: self.name.clone(),
                    });
                }

                let values: Vec<Value> = container
                    .query_all(locator)?
                    .iter()
                    .filter_map(|item| self.read_item(item, locator, *kind, attribute))
                    .collect();

                if values.is_empty() {
                    debug!(
                        "The data selector '{}', using selector '{}', had no results for the collection.",
                        self.name, locator
                    );
                    return Ok(None);
                }
                Ok(Some(Value::Array(values)))
            }
        }
    }

    fn read_item<N: DomNode>(
        &self,
        item: &N,
        locator: &str,
        kind: ValueKind,
        attribute: &str,
    ) -> Option<Value> {
        // Links and form values read as empty strings when the attribute is missing
        match kind {
            ValueKind::Image => return Some(Value::String(item.url_attr("src").unwrap_or_default())),
            ValueKind::Url => return Some(Value::String(item.url_attr("href").unwrap_or_default())),
            ValueKind::Value => {
                let value = item.form_value();
                if value.is_none() {
                    debug!(
                        "The data selector '{}', using selector '{}', matched an element without a form value.",
                        self.name, locator
                    );
                }
                return value.map(Value::String);
            }
            ValueKind::Text | ValueKind::Number => {}
        }

        let raw = if locator.contains("[itemprop=") {
            item.attr("content")
        } else if attribute.is_empty() {
            Some(item.inner_html())
        } else {
            item.attr(&dataset_attribute(attribute))
        };

        let Some(raw) = raw else {
            debug!(
                "The data selector '{}', using selector '{}', matched an element without the requested attribute.",
                self.name, locator
            );
            return None;
        };

        match kind {
            ValueKind::Number => match parse_number(&raw) {
                Ok(number) => Some(Value::Number(number)),
                Err(e) => {
                    debug!(
                        "The data selector '{}', using selector '{}', had {} converted to a number.",
                        self.name, locator, e
                    );
                    None
                }
            },
            _ => Some(Value::String(raw)),
        }
    }
}

/// Map a dataset key (`productId`) to its attribute name (`data-product-id`)
fn dataset_attribute(key: &str) -> String {
    let mut name = String::with_capacity(key.len() + 8);
    name.push_str("data-");
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            name.push('-');
            name.push(c.to_ascii_lowercase());
        } else {
            name.push(c);
        }
    }
    name
}
