//! Ready-made predicates and transforms for schemas loaded from files.

use super::types::{FieldTransform, NodePredicate};
use crate::tree::NodeRef;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

static PLACEHOLDER_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{(\w+)\}").unwrap());

#[derive(Debug, Clone)]
pub enum ValueTest {
    Equals(String),
    Contains(String),
    Matches(Regex),
    /// Passes when presence of the value equals the flag.
    Exists(bool),
}

/// Tests an attribute (or the element text when `attribute` is `None`).
#[derive(Debug, Clone)]
pub struct ValueFilter {
    pub attribute: Option<String>,
    pub condition: ValueTest,
}

impl NodePredicate for ValueFilter {
    fn test(&self, node: NodeRef<'_>) -> bool {
        let value = match &self.attribute {
            Some(name) => node.attribute(name),
            None => node.text(),
        };
        match (&self.condition, value) {
            (ValueTest::Exists(expected), v) => v.is_some() == *expected,
            (_, None) => false,
            (ValueTest::Equals(s), Some(v)) => v == s,
            (ValueTest::Contains(s), Some(v)) => v.contains(s.as_str()),
            (ValueTest::Matches(re), Some(v)) => re.is_match(v),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Rewrite {
    /// Render a template; `{N}` is the N-th dependency, `{value}` the field's
    /// own value.
    Format(String),
    /// Replace the value with the N-th dependency.
    Dependency(usize),
    Prefix(String),
    Suffix(String),
}

impl Rewrite {
    /// Placeholders in a template that are neither `value` nor a dependency
    /// index below `dependency_count`.
    pub fn unknown_placeholders(template: &str, dependency_count: usize) -> Vec<String> {
        PLACEHOLDER_REGEX
            .captures_iter(template)
            .map(|c| c[1].to_string())
            .filter(|name| {
                name != "value" && !matches!(name.parse::<usize>(), Ok(i) if i < dependency_count)
            })
            .collect()
    }
}

impl FieldTransform for Rewrite {
    fn apply(&self, value: Value, dependencies: &[Value]) -> Value {
        match self {
            Rewrite::Format(template) => {
                let rendered = PLACEHOLDER_REGEX.replace_all(template, |caps: &Captures| {
                    let name = &caps[1];
                    if name == "value" {
                        return render(&value);
                    }
                    match name.parse::<usize>().ok().and_then(|i| dependencies.get(i)) {
                        Some(dep) => render(dep),
                        None => caps[0].to_string(),
                    }
                });
                Value::String(rendered.into_owned())
            }
            Rewrite::Dependency(index) => dependencies.get(*index).cloned().unwrap_or(value),
            Rewrite::Prefix(prefix) => affix(value, &|s: &str| format!("{prefix}{s}")),
            Rewrite::Suffix(suffix) => affix(value, &|s: &str| format!("{s}{suffix}")),
        }
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn affix(value: Value, f: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Array(items) => Value::Array(items.into_iter().map(|v| affix(v, f)).collect()),
        other => Value::String(f(&render(&other))),
    }
}
