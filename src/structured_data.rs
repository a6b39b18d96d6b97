//! schema.org JSON-LD generation

use log::warn;
use serde_json::{Map, Value};

use crate::dom::DomNode;
use crate::error::Result;
use crate::extractors::Schema;
use crate::settings::Settings;

/// Turns schema results into JSON-LD documents
#[derive(Debug, Clone, Default)]
pub struct StructuredDataService {
    settings: Settings,
}

impl StructuredDataService {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Evaluate `schema` from the document root and prefix the `@context`.
    ///
    /// Returns `None` when the schema produced nothing; a non-mapping result
    /// (a collection schema at the top) is placed under the schema name.
    pub fn generate<N: DomNode>(&self, schema: &Schema, root: &N) -> Result<Option<Value>> {
        let Some(data) = schema.evaluate(root)? else {
            if self.settings.debug_mode {
                warn!("Structured data '{}' failed to generate.", schema.name);
            }
            return Ok(None);
        };

        let mut document = Map::new();
        document.insert("@context".to_string(), Value::String(self.settings.context.clone()));
        match data {
            Value::Object(fields) => document.extend(fields),
            other => {
                document.insert(schema.name.clone(), other);
            }
        }
        Ok(Some(Value::Object(document)))
    }

    /// Render structured data as a `<script type="application/ld+json">` tag for the head
    pub fn script_tag(&self, structured_data: Option<&Value>) -> Result<Option<String>> {
        let Some(data) = structured_data else {
            if self.settings.debug_mode {
                warn!("Provided structured data was empty, no script tag rendered.");
            }
            return Ok(None);
        };

        // "</" would close the script element early
        let json = serde_json::to_string_pretty(data)?.replace("</", "<\\/");
        Ok(Some(format!(
            "<script type=\"application/ld+json\">\n{}\n</script>",
            json
        )))
    }
}
