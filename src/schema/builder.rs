//! Programmatic schema construction.
//!
//! ```rust
//! use smelt::schema::{FieldSpec, ScalarKind, Schema};
//!
//! let schema = Schema::builder("ReleaseSet/ClinVarSet/ReferenceClinVarAssertion")
//!     .split_path("ReleaseSet/ClinVarSet")
//!     .field("accession", FieldSpec::path("ClinVarAccession").attribute("Acc"))
//!     .field(
//!         "version",
//!         FieldSpec::path("ClinVarAccession")
//!             .attribute("Version")
//!             .scalar(ScalarKind::Integer),
//!     )
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(schema.fields().len(), 2);
//! ```

use super::types::{FieldDef, FieldSpec, Schema};
use crate::error::ConfigError;
use crate::path::TagPath;
use std::collections::HashSet;

#[derive(Debug)]
pub struct SchemaBuilder {
    record_path: TagPath,
    split_path: Option<TagPath>,
    fields: Vec<FieldDef>,
}

impl SchemaBuilder {
    pub fn new(record_path: TagPath) -> Self {
        SchemaBuilder {
            record_path,
            split_path: None,
            fields: Vec::new(),
        }
    }

    pub fn split_path(mut self, path: impl Into<TagPath>) -> Self {
        self.split_path = Some(path.into());
        self
    }

    /// Append a field. Declaration order is kept and breaks ties when fields
    /// are ordered by dependency.
    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            spec,
        });
        self
    }

    pub fn build(self) -> Result<Schema, ConfigError> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(ConfigError::DuplicateField(field.name.clone()));
            }
        }

        Ok(Schema {
            record_path: self.record_path,
            split_path: self.split_path,
            fields: self.fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_field_rejected() {
        let err = Schema::builder("a/b")
            .field("x", FieldSpec::path("c"))
            .field("x", FieldSpec::path("d"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateField(name) if name == "x"));
    }

    #[test]
    fn test_keeps_declaration_order() {
        let schema = Schema::builder("a/b")
            .field("z", FieldSpec::path("c"))
            .field("a", FieldSpec::path("d"))
            .build()
            .unwrap();
        let names: Vec<_> = schema.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["z", "a"]);
        assert!(schema.split_path().is_none());
    }
}
