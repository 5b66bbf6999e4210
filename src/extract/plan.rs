//! Compiled extraction plans
//!
//! Ordering fields by dependency happens once per schema, not once per
//! record. The plan is immutable and shared by reference across workers.

use super::order::order_fields;
use crate::error::ConfigError;
use crate::path::TagPath;
use crate::schema::{FieldDef, Schema};
use tracing::debug;

/// A schema with its fields in evaluation order.
#[derive(Debug, Clone)]
pub struct ExtractionPlan {
    record_path: TagPath,
    split_path: Option<TagPath>,
    fields: Vec<FieldDef>,
}

impl ExtractionPlan {
    /// Validate the schema's dependencies and order its fields.
    ///
    /// # Errors
    /// `UnknownDependency` or `CyclicDependency` when the dependency graph is
    /// not a DAG over declared fields.
    pub fn new(schema: &Schema) -> Result<Self, ConfigError> {
        let fields: Vec<FieldDef> = order_fields(schema.fields())?
            .into_iter()
            .cloned()
            .collect();

        debug!(
            record_path = %schema.record_path(),
            order = ?fields.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
            "ordered fields by dependency"
        );

        Ok(ExtractionPlan {
            record_path: schema.record_path().clone(),
            split_path: schema.split_path().cloned(),
            fields,
        })
    }

    pub fn record_path(&self) -> &TagPath {
        &self.record_path
    }

    /// The split path, required when documents are split.
    pub fn split_path(&self) -> Result<&TagPath, ConfigError> {
        self.split_path.as_ref().ok_or(ConfigError::MissingSplitPath)
    }

    /// Fields in evaluation order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }
}

impl Schema {
    pub fn compile(&self) -> Result<ExtractionPlan, ConfigError> {
        ExtractionPlan::new(self)
    }
}
