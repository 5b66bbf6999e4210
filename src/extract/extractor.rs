use super::plan::ExtractionPlan;
use super::Record;
use crate::error::CastError;
use crate::path::{resolve_absolute, resolve_absolute_all, resolve_relative, resolve_relative_all};
use crate::schema::{FieldDef, FieldSource, FieldSpec, FieldType, ScalarKind};
use crate::tree::NodeRef;
use serde_json::Value;

/// Turns one record subtree into a [`Record`] following a plan.
#[derive(Debug, Clone, Copy)]
pub struct RecordExtractor<'p> {
    plan: &'p ExtractionPlan,
}

impl<'p> RecordExtractor<'p> {
    pub fn new(plan: &'p ExtractionPlan) -> Self {
        RecordExtractor { plan }
    }

    /// Compute every field of the plan for the subtree rooted at `root`.
    ///
    /// Missing elements give `null` (or `[]` for list fields). A field's
    /// transform only runs when all of its dependencies are non-null;
    /// otherwise the untransformed value is kept.
    ///
    /// # Errors
    /// A value that does not parse as its declared type. The caller is
    /// expected to abort the run.
    pub fn extract(&self, root: NodeRef<'_>) -> Result<Record, CastError> {
        let mut record = Record::new();

        for field in self.plan.fields() {
            let spec = &field.spec;
            let mut value = match spec.field_type {
                FieldType::List(kind) => Self::list_value(root, field, kind)?,
                FieldType::Scalar(kind) => Self::scalar_value(root, field, kind)?,
            };

            if let Some(transform) = &spec.transform {
                let dependencies: Vec<Value> = spec
                    .dependencies
                    .iter()
                    .map(|name| record.get(name).cloned().unwrap_or(Value::Null))
                    .collect();
                if dependencies.iter().all(|v| !v.is_null()) {
                    value = transform.apply(value, &dependencies);
                }
            }

            record.insert(field.name.clone(), value);
        }

        Ok(record)
    }

    fn list_value(root: NodeRef<'_>, field: &FieldDef, kind: ScalarKind) -> Result<Value, CastError> {
        let spec = &field.spec;
        let mut values = Vec::new();
        for node in candidates(root, spec) {
            if spec.filter.as_ref().is_some_and(|f| !f.test(node)) {
                continue;
            }
            if let Some(raw) = raw_value(node, spec) {
                values.push(cast(field, kind, raw)?);
            }
        }
        Ok(Value::Array(values))
    }

    fn scalar_value(root: NodeRef<'_>, field: &FieldDef, kind: ScalarKind) -> Result<Value, CastError> {
        let spec = &field.spec;
        let node = match &spec.filter {
            Some(filter) => candidates(root, spec).into_iter().find(|n| filter.test(*n)),
            None => first_candidate(root, spec),
        };

        match node.and_then(|n| raw_value(n, spec)) {
            Some(raw) => cast(field, kind, raw),
            None => Ok(Value::Null),
        }
    }
}

fn candidates<'a>(root: NodeRef<'a>, spec: &FieldSpec) -> Vec<NodeRef<'a>> {
    match &spec.source {
        FieldSource::Relative(path) => resolve_relative_all(root, path),
        FieldSource::Absolute(path) => resolve_absolute_all(root, path),
        FieldSource::Derived => Vec::new(),
    }
}

fn first_candidate<'a>(root: NodeRef<'a>, spec: &FieldSpec) -> Option<NodeRef<'a>> {
    match &spec.source {
        FieldSource::Relative(path) => resolve_relative(root, path),
        FieldSource::Absolute(path) => resolve_absolute(root, path),
        FieldSource::Derived => None,
    }
}

fn raw_value<'a>(node: NodeRef<'a>, spec: &FieldSpec) -> Option<&'a str> {
    match &spec.attribute {
        Some(name) => node.attribute(name),
        None => node.text(),
    }
}

fn cast(field: &FieldDef, kind: ScalarKind, raw: &str) -> Result<Value, CastError> {
    kind.cast(raw).ok_or_else(|| CastError {
        field: field.name.clone(),
        kind,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use crate::tree::{Arena, NodeId};
    use serde_json::json;

    // Set (id="S1")
    //   Title "Shared title"
    //   Entry
    //     Acc (Acc="RCV1", Version="2")
    //     Value "1" / Value "2" (skip="yes") / Value "3"
    //     XRef (DB="Gene", ID="672") / XRef (DB="OMIM", ID="113705")
    fn sample() -> (Arena, NodeId) {
        let mut arena = Arena::new();
        let set = arena.open("Set".into(), vec![("id".into(), "S1".into())], None);
        let title = arena.open("Title".into(), vec![], Some(set));
        arena.push_text(title, "Shared title");
        let entry = arena.open("Entry".into(), vec![], Some(set));
        arena.open(
            "Acc".into(),
            vec![("Acc".into(), "RCV1".into()), ("Version".into(), "2".into())],
            Some(entry),
        );
        for (text, skip) in [("1", false), ("2", true), ("3", false)] {
            let attrs = if skip { vec![("skip".into(), "yes".into())] } else { vec![] };
            let v = arena.open("Value".into(), attrs, Some(entry));
            arena.push_text(v, text);
        }
        for (db, id) in [("Gene", "672"), ("OMIM", "113705")] {
            arena.open(
                "XRef".into(),
                vec![("DB".into(), db.into()), ("ID".into(), id.into())],
                Some(entry),
            );
        }
        (arena, entry)
    }

    fn extract(schema: Schema) -> Record {
        let (arena, entry) = sample();
        let plan = schema.compile().unwrap();
        RecordExtractor::new(&plan).extract(arena.get(entry)).unwrap()
    }

    #[test]
    fn test_list_of_integers() {
        let record = extract(
            Schema::builder("Set/Entry")
                .field("values", FieldSpec::path("Value").list_of(ScalarKind::Integer))
                .build()
                .unwrap(),
        );
        assert_eq!(record["values"], json!([1, 2, 3]));
    }

    #[test]
    fn test_list_filter_drops_candidates() {
        let record = extract(
            Schema::builder("Set/Entry")
                .field(
                    "values",
                    FieldSpec::path("Value")
                        .list_of(ScalarKind::Integer)
                        .filter(|n| n.attribute("skip").is_none()),
                )
                .build()
                .unwrap(),
        );
        assert_eq!(record["values"], json!([1, 3]));
    }

    #[test]
    fn test_scalar_attribute_and_missing_values() {
        let record = extract(
            Schema::builder("Set/Entry")
                .field("acc", FieldSpec::path("Acc").attribute("Acc"))
                .field(
                    "version",
                    FieldSpec::path("Acc").attribute("Version").scalar(ScalarKind::Integer),
                )
                .field("absent", FieldSpec::path("Nope"))
                .field("no_attr", FieldSpec::path("Acc").attribute("Nope"))
                .field("none_listed", FieldSpec::path("Nope").list_of(ScalarKind::String))
                .field(
                    "gene",
                    FieldSpec::path("XRef")
                        .attribute("ID")
                        .filter(|n| n.attribute("DB") == Some("OMIM")),
                )
                .build()
                .unwrap(),
        );
        assert_eq!(record["acc"], json!("RCV1"));
        assert_eq!(record["version"], json!(2));
        assert_eq!(record["absent"], Value::Null);
        assert_eq!(record["no_attr"], Value::Null);
        assert_eq!(record["none_listed"], json!([]));
        assert_eq!(record["gene"], json!("113705"));
        assert_eq!(record.len(), 6);
    }

    #[test]
    fn test_absolute_paths_reach_ancestors_and_siblings() {
        let record = extract(
            Schema::builder("Set/Entry")
                .field("title", FieldSpec::absolute("Set/Title"))
                .field("set_id", FieldSpec::absolute("Set").attribute("id"))
                .field("elsewhere", FieldSpec::absolute("Other/Title"))
                .build()
                .unwrap(),
        );
        assert_eq!(record["title"], json!("Shared title"));
        assert_eq!(record["set_id"], json!("S1"));
        assert_eq!(record["elsewhere"], Value::Null);
    }

    #[test]
    fn test_transform_runs_when_dependencies_present() {
        let record = extract(
            Schema::builder("Set/Entry")
                .field("acc", FieldSpec::path("Acc").attribute("Acc"))
                .field(
                    "version",
                    FieldSpec::path("Acc").attribute("Version").scalar(ScalarKind::Integer),
                )
                .field(
                    "full",
                    FieldSpec::derived()
                        .depends_on(["acc", "version"])
                        .transform(|_, deps| json!(format!("{}.{}", deps[0].as_str().unwrap(), deps[1]))),
                )
                .build()
                .unwrap(),
        );
        assert_eq!(record["full"], json!("RCV1.2"));
    }

    #[test]
    fn test_transform_skipped_when_a_dependency_is_null() {
        let record = extract(
            Schema::builder("Set/Entry")
                .field("acc", FieldSpec::path("Acc").attribute("Acc"))
                .field("missing", FieldSpec::path("Nope"))
                .field(
                    "joined",
                    FieldSpec::path("Acc")
                        .attribute("Acc")
                        .depends_on(["acc", "missing"])
                        .transform(|_, _| json!("transformed")),
                )
                .field(
                    "derived",
                    FieldSpec::derived()
                        .depends_on(["acc", "missing"])
                        .transform(|_, _| json!("transformed")),
                )
                .build()
                .unwrap(),
        );
        assert_eq!(record["joined"], json!("RCV1"));
        assert_eq!(record["derived"], Value::Null);
    }

    #[test]
    fn test_transform_without_dependencies_always_runs() {
        let record = extract(
            Schema::builder("Set/Entry")
                .field(
                    "values",
                    FieldSpec::path("Value").transform(|v, _| json!(format!("{}!", v.as_str().unwrap_or("")))),
                )
                .build()
                .unwrap(),
        );
        assert_eq!(record["values"], json!("1!"));
    }

    #[test]
    fn test_cast_failure_names_the_field() {
        let (arena, entry) = sample();
        let plan = Schema::builder("Set/Entry")
            .field("acc", FieldSpec::path("Acc").attribute("Acc").scalar(ScalarKind::Integer))
            .build()
            .unwrap()
            .compile()
            .unwrap();

        let err = RecordExtractor::new(&plan).extract(arena.get(entry)).unwrap_err();
        assert_eq!(err.field, "acc");
        assert_eq!(err.value, "RCV1");
        assert_eq!(err.kind, ScalarKind::Integer);
    }
}
