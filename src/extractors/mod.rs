//! Schema-driven extraction
//!
//! Selectors are the leaves, schemas the composite nodes of a rule tree.

mod number;
mod schema;
mod selector;

pub use number::*;
pub use schema::*;
pub use selector::*;
