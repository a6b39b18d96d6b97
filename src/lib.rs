//! Schema-driven structured data extraction from HTML
//!
//! A rule tree of [`Schema`]s and [`Selector`]s is evaluated against a parsed page:
//! - typed, named selectors with number/text/link/form-value coercion
//! - singular or collection cardinality at every level
//! - mandatory fields that void the enclosing record
//! - schema.org JSON-LD output and analytics data layer events
//! - FFI interface taking schemas as JSON
//!
//! ```
//! use schema_extract::{Page, Schema, Selector};
//!
//! let page = Page::parse(r#"<div class="offer"><span class="price">12,99</span></div>"#);
//! let offer = Schema::new("offer", ".offer").with_selectors(vec![
//!     Selector::number("price", ".price").mandatory(),
//!     Selector::text("label", ".label"),
//! ]);
//!
//! let data = offer.evaluate(&page.root()).unwrap();
//! assert_eq!(data, Some(serde_json::json!({ "price": 12.99 })));
//! ```

pub mod configurator;
pub mod dom;
pub mod ecommerce;
pub mod error;
pub mod extractors;
pub mod ffi;
pub mod settings;
pub mod structured_data;

pub use configurator::{ConfiguratorSchemas, ConfiguratorTracker, EventNames};
pub use dom::{DomNode, Page, PageNode};
pub use ecommerce::{ClickBindings, ClickOutcome, DataLayer, EcommerceEvent, EcommerceTracker};
pub use error::{ExtractError, Result};
pub use extractors::*;
pub use ffi::*;
pub use settings::Settings;
pub use structured_data::StructuredDataService;
