use crate::error::ConfigError;
use crate::schema::FieldDef;
use std::collections::{HashMap, HashSet, VecDeque};

/// Order fields so that each one comes after all of its dependencies.
///
/// Kahn's algorithm over dependency -> dependent edges. Ready fields are taken
/// first-in first-out, seeded in declaration order, so the result only depends
/// on the schema.
pub fn order_fields(fields: &[FieldDef]) -> Result<Vec<&FieldDef>, ConfigError> {
    let index: HashMap<&str, usize> = fields
        .iter()
        .enumerate()
        .map(|(i, f)| (f.name.as_str(), i))
        .collect();

    let mut remaining = vec![0usize; fields.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); fields.len()];

    for (i, field) in fields.iter().enumerate() {
        let mut seen = HashSet::new();
        for dependency in &field.spec.dependencies {
            let &j = index
                .get(dependency.as_str())
                .ok_or_else(|| ConfigError::UnknownDependency {
                    field: field.name.clone(),
                    dependency: dependency.clone(),
                })?;
            if seen.insert(j) {
                remaining[i] += 1;
                dependents[j].push(i);
            }
        }
    }

    let mut ready: VecDeque<usize> = (0..fields.len()).filter(|&i| remaining[i] == 0).collect();
    let mut ordered = Vec::with_capacity(fields.len());

    while let Some(i) = ready.pop_front() {
        ordered.push(&fields[i]);
        for &dependent in &dependents[i] {
            remaining[dependent] -= 1;
            if remaining[dependent] == 0 {
                ready.push_back(dependent);
            }
        }
    }

    if ordered.len() < fields.len() {
        let stuck = fields
            .iter()
            .zip(&remaining)
            .filter(|(_, &left)| left > 0)
            .map(|(f, _)| f.name.clone())
            .collect();
        return Err(ConfigError::CyclicDependency { fields: stuck });
    }

    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSpec;

    fn field(name: &str, deps: &[&str]) -> FieldDef {
        FieldDef {
            name: name.to_string(),
            spec: FieldSpec::derived().depends_on(deps.iter().copied()),
        }
    }

    fn names(ordered: &[&FieldDef]) -> Vec<String> {
        ordered.iter().map(|f| f.name.clone()).collect()
    }

    #[test]
    fn test_every_field_after_its_dependencies() {
        let fields = vec![
            field("uuid", &["full"]),
            field("full", &["acc", "version"]),
            field("acc", &[]),
            field("version", &[]),
            field("title", &[]),
        ];

        let ordered = order_fields(&fields).unwrap();
        let order = names(&ordered);
        assert_eq!(order.len(), fields.len());

        let pos = |n: &str| order.iter().position(|x| x == n).unwrap();
        for f in &fields {
            for dep in &f.spec.dependencies {
                assert!(pos(dep.as_str()) < pos(f.name.as_str()), "{} must follow {}", f.name, dep);
            }
        }
    }

    #[test]
    fn test_ties_follow_declaration_order() {
        let fields = vec![field("b", &[]), field("c", &["b"]), field("a", &[])];
        let ordered = order_fields(&fields).unwrap();
        assert_eq!(names(&ordered), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let fields = vec![field("a", &["c"]), field("b", &["a"]), field("c", &["b"]), field("d", &[])];
        match order_fields(&fields) {
            Err(ConfigError::CyclicDependency { fields }) => {
                assert_eq!(fields, vec!["a", "b", "c"]);
            }
            other => panic!("expected cycle error, got {:?}", other.map(|o| names(&o))),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let fields = vec![field("a", &["a"])];
        assert!(matches!(
            order_fields(&fields),
            Err(ConfigError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn test_unknown_dependency() {
        let fields = vec![field("a", &["missing"])];
        assert!(matches!(
            order_fields(&fields),
            Err(ConfigError::UnknownDependency { dependency, .. }) if dependency == "missing"
        ));
    }

    #[test]
    fn test_repeated_dependency_counts_once() {
        let fields = vec![field("a", &[]), field("b", &["a", "a"])];
        let ordered = order_fields(&fields).unwrap();
        assert_eq!(names(&ordered), vec!["a", "b"]);
    }
}
