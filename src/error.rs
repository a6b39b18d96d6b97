//! Error types
//!
//! Only faults in the rule definitions or in the caller's configuration are errors.
//! A rule that finds no usable value evaluates to `Ok(None)` instead.

use thiserror::Error;

/// Errors surfaced to the caller of an extraction
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("invalid locator '{locator}': {reason}")]
    InvalidLocator { locator: String, reason: String },

    #[error("selector '{name}' has an empty locator and no attribute key")]
    MissingAttributeKey { name: String },

    #[error("collection rule '{name}' has an empty locator")]
    EmptyCollectionLocator { name: String },

    #[error("invalid base url: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    #[error("invalid page location '{location}': {reason}")]
    InvalidLocation { location: String, reason: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ExtractError>;
