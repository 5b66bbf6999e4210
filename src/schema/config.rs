//! Loading a [`Schema`] from a JSON schema file.
//!
//! ```json
//! {
//!   "path": "ReleaseSet/ClinVarSet/ReferenceClinVarAssertion",
//!   "split_path": "ReleaseSet/ClinVarSet",
//!   "fields": {
//!     "version": { "path": "ClinVarAccession", "attribute": "Version", "type": "integer" },
//!     "genes": {
//!       "path": "MeasureSet/Measure/MeasureRelationship/XRef",
//!       "attribute": "ID",
//!       "type": ["string"],
//!       "filter": { "attribute": "DB", "equals": "Gene" }
//!     },
//!     "full": { "dependencies": ["acc", "version"], "transform": { "format": "{0}.{1}" } }
//!   }
//! }
//! ```
//!
//! Fields keep the order they have in the file.

use super::rules::{Rewrite, ValueFilter, ValueTest};
use super::types::{FieldSpec, FieldType, ScalarKind, Schema};
use crate::error::ConfigError;
use crate::path::TagPath;
use regex::Regex;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaFile {
    path: TagPath,
    #[serde(default)]
    split_path: Option<TagPath>,
    fields: FieldList,
}

/// Field entries in file order.
#[derive(Debug)]
struct FieldList(Vec<(String, FieldEntry)>);

impl<'de> Deserialize<'de> for FieldList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldListVisitor;

        impl<'de> Visitor<'de> for FieldListVisitor {
            type Value = FieldList;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of field names to field definitions")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<FieldList, A::Error> {
                let mut fields = Vec::new();
                while let Some(entry) = map.next_entry::<String, FieldEntry>()? {
                    fields.push(entry);
                }
                Ok(FieldList(fields))
            }
        }

        deserializer.deserialize_map(FieldListVisitor)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldEntry {
    path: Option<TagPath>,
    absolute_path: Option<TagPath>,
    attribute: Option<String>,
    #[serde(rename = "type", default)]
    field_type: TypeEntry,
    filter: Option<FilterEntry>,
    transform: Option<TransformEntry>,
    #[serde(default)]
    dependencies: Vec<String>,
}

/// `"integer"` is a scalar, `["integer"]` a list of integers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TypeEntry {
    Scalar(ScalarKind),
    List(Vec<ScalarKind>),
}

impl Default for TypeEntry {
    fn default() -> Self {
        TypeEntry::Scalar(ScalarKind::String)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FilterEntry {
    attribute: Option<String>,
    equals: Option<String>,
    contains: Option<String>,
    matches: Option<String>,
    exists: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TransformEntry {
    Format(String),
    Dependency(usize),
    Prefix(String),
    Suffix(String),
}

impl Schema {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Schema, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Schema, ConfigError> {
        let file: SchemaFile = serde_json::from_str(raw)?;

        let mut builder = Schema::builder(file.path);
        if let Some(split) = file.split_path {
            builder = builder.split_path(split);
        }
        for (name, entry) in file.fields.0 {
            let spec = entry.into_spec(&name)?;
            builder = builder.field(name, spec);
        }
        builder.build()
    }
}

impl FieldEntry {
    fn into_spec(self, name: &str) -> Result<FieldSpec, ConfigError> {
        let mut spec = match (self.path, self.absolute_path) {
            (Some(_), Some(_)) => return Err(ConfigError::AmbiguousSource(name.to_string())),
            (Some(path), None) => FieldSpec::path(path),
            (None, Some(path)) => FieldSpec::absolute(path),
            (None, None) => FieldSpec::derived(),
        };

        spec = spec.of_type(self.field_type.resolve(name)?);
        if let Some(attribute) = self.attribute {
            spec = spec.attribute(attribute);
        }
        if let Some(filter) = self.filter {
            spec = spec.filter_with(Arc::new(filter.resolve(name)?));
        }
        if let Some(transform) = self.transform {
            let rewrite = transform.resolve(name, self.dependencies.len())?;
            spec = spec.transform_with(Arc::new(rewrite));
        }
        Ok(spec.depends_on(self.dependencies))
    }
}

impl TypeEntry {
    fn resolve(self, field: &str) -> Result<FieldType, ConfigError> {
        match self {
            TypeEntry::Scalar(kind) => Ok(FieldType::Scalar(kind)),
            TypeEntry::List(kinds) => match kinds.as_slice() {
                [kind] => Ok(FieldType::List(*kind)),
                _ => Err(ConfigError::InvalidType {
                    field: field.to_string(),
                    reason: format!("list type needs exactly one element type, got {}", kinds.len()),
                }),
            },
        }
    }
}

impl FilterEntry {
    fn resolve(self, field: &str) -> Result<ValueFilter, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidFilter {
            field: field.to_string(),
            reason,
        };

        let mut conditions = Vec::new();
        if let Some(s) = self.equals {
            conditions.push(ValueTest::Equals(s));
        }
        if let Some(s) = self.contains {
            conditions.push(ValueTest::Contains(s));
        }
        if let Some(pattern) = self.matches {
            let re = Regex::new(&pattern).map_err(|e| invalid(e.to_string()))?;
            conditions.push(ValueTest::Matches(re));
        }
        if let Some(flag) = self.exists {
            conditions.push(ValueTest::Exists(flag));
        }

        if conditions.len() != 1 {
            return Err(invalid(format!(
                "expected exactly one of equals/contains/matches/exists, got {}",
                conditions.len()
            )));
        }

        Ok(ValueFilter {
            attribute: self.attribute,
            condition: conditions.remove(0),
        })
    }
}

impl TransformEntry {
    fn resolve(self, field: &str, dependency_count: usize) -> Result<Rewrite, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidTransform {
            field: field.to_string(),
            reason,
        };

        match self {
            TransformEntry::Format(template) => {
                let unknown = Rewrite::unknown_placeholders(&template, dependency_count);
                if !unknown.is_empty() {
                    return Err(invalid(format!("unknown placeholders: {}", unknown.join(", "))));
                }
                Ok(Rewrite::Format(template))
            }
            TransformEntry::Dependency(index) if index >= dependency_count => Err(invalid(format!(
                "dependency index {index} out of range ({dependency_count} declared)"
            ))),
            TransformEntry::Dependency(index) => Ok(Rewrite::Dependency(index)),
            TransformEntry::Prefix(s) => Ok(Rewrite::Prefix(s)),
            TransformEntry::Suffix(s) => Ok(Rewrite::Suffix(s)),
        }
    }
}
