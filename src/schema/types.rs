use crate::path::TagPath;
use crate::tree::NodeRef;
use serde::Deserialize;
use serde_json::{Number, Value};
use std::fmt;
use std::sync::Arc;

/// Scalar type a raw text or attribute value is converted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    #[default]
    #[serde(alias = "str")]
    String,
    #[serde(alias = "int")]
    Integer,
    Float,
}

impl ScalarKind {
    /// Convert a raw value, or `None` if it does not parse as this kind.
    pub fn cast(self, raw: &str) -> Option<Value> {
        match self {
            ScalarKind::String => Some(Value::String(raw.to_string())),
            ScalarKind::Integer => raw.trim().parse::<i64>().ok().map(Value::from),
            ScalarKind::Float => raw
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarKind::String => "string",
            ScalarKind::Integer => "integer",
            ScalarKind::Float => "float",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Scalar(ScalarKind),
    List(ScalarKind),
}

impl Default for FieldType {
    fn default() -> Self {
        FieldType::Scalar(ScalarKind::String)
    }
}

/// Where a field's source elements are looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSource {
    /// Relative to the record root.
    Relative(TagPath),
    /// From the document root, resolved through the record's ancestors.
    Absolute(TagPath),
    /// No source elements; the value comes from a transform.
    Derived,
}

/// Decides whether a candidate element takes part in a field.
pub trait NodePredicate: Send + Sync {
    fn test(&self, node: NodeRef<'_>) -> bool;
}

impl<F> NodePredicate for F
where
    F: Fn(NodeRef<'_>) -> bool + Send + Sync,
{
    fn test(&self, node: NodeRef<'_>) -> bool {
        self(node)
    }
}

/// Rewrites a field value given the values of its dependencies, in the order
/// they were declared.
pub trait FieldTransform: Send + Sync {
    fn apply(&self, value: Value, dependencies: &[Value]) -> Value;
}

impl<F> FieldTransform for F
where
    F: Fn(Value, &[Value]) -> Value + Send + Sync,
{
    fn apply(&self, value: Value, dependencies: &[Value]) -> Value {
        self(value, dependencies)
    }
}

/// How one output field is computed.
#[derive(Clone)]
pub struct FieldSpec {
    pub source: FieldSource,
    /// Read this attribute instead of the element text.
    pub attribute: Option<String>,
    pub field_type: FieldType,
    pub filter: Option<Arc<dyn NodePredicate>>,
    pub transform: Option<Arc<dyn FieldTransform>>,
    pub dependencies: Vec<String>,
}

impl FieldSpec {
    fn with_source(source: FieldSource) -> Self {
        FieldSpec {
            source,
            attribute: None,
            field_type: FieldType::default(),
            filter: None,
            transform: None,
            dependencies: Vec::new(),
        }
    }

    pub fn path(path: impl Into<TagPath>) -> Self {
        Self::with_source(FieldSource::Relative(path.into()))
    }

    pub fn absolute(path: impl Into<TagPath>) -> Self {
        Self::with_source(FieldSource::Absolute(path.into()))
    }

    pub fn derived() -> Self {
        Self::with_source(FieldSource::Derived)
    }

    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        self.attribute = Some(name.into());
        self
    }

    pub fn of_type(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }

    pub fn scalar(self, kind: ScalarKind) -> Self {
        self.of_type(FieldType::Scalar(kind))
    }

    pub fn list_of(self, kind: ScalarKind) -> Self {
        self.of_type(FieldType::List(kind))
    }

    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(NodeRef<'_>) -> bool + Send + Sync + 'static,
    {
        self.filter_with(Arc::new(predicate))
    }

    pub fn filter_with(mut self, predicate: Arc<dyn NodePredicate>) -> Self {
        self.filter = Some(predicate);
        self
    }

    pub fn transform<F>(self, transform: F) -> Self
    where
        F: Fn(Value, &[Value]) -> Value + Send + Sync + 'static,
    {
        self.transform_with(Arc::new(transform))
    }

    pub fn transform_with(mut self, transform: Arc<dyn FieldTransform>) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn depends_on<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = fields.into_iter().map(Into::into).collect();
        self
    }
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("source", &self.source)
            .field("attribute", &self.attribute)
            .field("field_type", &self.field_type)
            .field("filter", &self.filter.is_some())
            .field("transform", &self.transform.is_some())
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// A named field, in declaration order within its schema.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub spec: FieldSpec,
}

/// Declarative description of which subtrees become records and how each
/// record field is computed. Immutable once built.
#[derive(Debug, Clone)]
pub struct Schema {
    pub(crate) record_path: TagPath,
    pub(crate) split_path: Option<TagPath>,
    pub(crate) fields: Vec<FieldDef>,
}

impl Schema {
    pub fn builder(record_path: impl Into<TagPath>) -> super::SchemaBuilder {
        super::SchemaBuilder::new(record_path.into())
    }

    pub fn record_path(&self) -> &TagPath {
        &self.record_path
    }

    pub fn split_path(&self) -> Option<&TagPath> {
        self.split_path.as_ref()
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }
}
