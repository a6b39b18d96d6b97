//! Runtime settings shared by the services
//!
//! Settings come from the host page, either as JSON or from the environment.

use serde::{Deserialize, Serialize};

/// Host supplied settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Report absent results and cancelled pushes as warnings
    pub debug_mode: bool,
    /// Name of the analytics data layer
    pub data_layer_name: String,
    /// Upper bound for ecommerce item lists
    pub max_items: usize,
    /// `@context` of generated structured data
    pub context: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug_mode: false,
            data_layer_name: "dataLayer".to_string(),
            // analytics rejects item lists longer than this
            max_items: 200,
            context: "https://schema.org".to_string(),
        }
    }
}

impl Settings {
    /// Defaults, overridden by `SCHEMA_EXTRACT_DEBUG` and `SCHEMA_EXTRACT_DATA_LAYER`
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Ok(debug) = std::env::var("SCHEMA_EXTRACT_DEBUG") {
            settings.debug_mode = matches!(debug.trim(), "1" | "true" | "TRUE" | "yes");
        }
        if let Ok(name) = std::env::var("SCHEMA_EXTRACT_DATA_LAYER") {
            if !name.trim().is_empty() {
                settings.data_layer_name = name.trim().to_string();
            }
        }
        settings
    }

    pub fn with_debug_mode(mut self, debug_mode: bool) -> Self {
        self.debug_mode = debug_mode;
        self
    }
}
