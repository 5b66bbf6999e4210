//! Extraction schemas
//!
//! A schema names the element path that delimits records, an optional path
//! used to split documents, and the fields computed for every record. Schemas
//! are built in code with [`SchemaBuilder`] or loaded from JSON files.

pub mod builder;
pub mod config;
pub mod rules;
pub mod types;

pub use builder::SchemaBuilder;
pub use rules::{Rewrite, ValueFilter, ValueTest};
pub use types::{
    FieldDef, FieldSource, FieldSpec, FieldTransform, FieldType, NodePredicate, ScalarKind, Schema,
};
