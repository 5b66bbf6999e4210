//! Tag paths and their resolution against the in-memory part of the tree.

use crate::tree::NodeRef;
use serde::{Deserialize, Deserializer};
use std::fmt;

/// Slash-delimited sequence of tag names, e.g. `ReleaseSet/ClinVarSet`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TagPath(Vec<String>);

impl TagPath {
    pub fn parse(path: &str) -> Self {
        TagPath(
            path.split('/')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Tag-wise prefix test: `a/b` is a prefix of `a/b/c` but not of `a/bc`.
    pub fn starts_with(&self, prefix: &TagPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Whether a stack of open tags spells exactly this path.
    pub fn matches_stack<S: AsRef<str>>(&self, stack: &[S]) -> bool {
        self.0.len() == stack.len() && self.0.iter().zip(stack).all(|(a, b)| a == b.as_ref())
    }

    fn suffix(&self, from: usize) -> &[String] {
        &self.0[from..]
    }
}

impl From<&str> for TagPath {
    fn from(path: &str) -> Self {
        TagPath::parse(path)
    }
}

impl fmt::Display for TagPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

impl<'de> Deserialize<'de> for TagPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(TagPath::parse(&raw))
    }
}

/// Full path of `node` from the document root, root first.
pub fn compute_path(node: NodeRef<'_>) -> TagPath {
    let mut tags = vec![node.tag().to_string()];
    let mut current = node;
    while let Some(parent) = current.parent() {
        tags.push(parent.tag().to_string());
        current = parent;
    }
    tags.reverse();
    TagPath(tags)
}

/// Equivalent to `compute_path(node) == *path` without allocating.
pub fn path_matches(node: NodeRef<'_>, path: &TagPath) -> bool {
    let mut current = Some(node);
    for tag in path.0.iter().rev() {
        match current {
            Some(n) if n.tag() == tag => current = n.parent(),
            _ => return false,
        }
    }
    current.is_none()
}

/// Whether `path` continues below `node`: the full path of `node` is a
/// proper prefix of `path`.
pub fn leads_to(node: NodeRef<'_>, path: &TagPath) -> bool {
    let lineage = || std::iter::successors(Some(node), |n| n.parent());
    let depth = lineage().count();
    depth < path.len()
        && lineage()
            .zip(path.0[..depth].iter().rev())
            .all(|(n, tag)| n.tag() == tag)
}

/// First node reached from `node` by following `path` child by child.
/// An empty path resolves to `node` itself.
pub fn resolve_relative<'a>(node: NodeRef<'a>, path: &TagPath) -> Option<NodeRef<'a>> {
    first_match(node, &path.0)
}

/// Every node reached from `node` by following `path`, in document order.
pub fn resolve_relative_all<'a>(node: NodeRef<'a>, path: &TagPath) -> Vec<NodeRef<'a>> {
    let mut out = Vec::new();
    collect_matches(node, &path.0, &mut out);
    out
}

/// Resolve a path given from the document root.
///
/// Only the part of the tree still in memory is searched: the walk goes up
/// from `node` to the first ancestor whose own path is a prefix of
/// `absolute`, then down along the rest of the path.
pub fn resolve_absolute<'a>(node: NodeRef<'a>, absolute: &TagPath) -> Option<NodeRef<'a>> {
    let (anchor, depth) = find_anchor(node, absolute)?;
    first_match(anchor, absolute.suffix(depth))
}

/// Multi-match counterpart of [`resolve_absolute`].
pub fn resolve_absolute_all<'a>(node: NodeRef<'a>, absolute: &TagPath) -> Vec<NodeRef<'a>> {
    let mut out = Vec::new();
    if let Some((anchor, depth)) = find_anchor(node, absolute) {
        collect_matches(anchor, absolute.suffix(depth), &mut out);
    }
    out
}

fn find_anchor<'a>(node: NodeRef<'a>, absolute: &TagPath) -> Option<(NodeRef<'a>, usize)> {
    let mut current = Some(node);
    while let Some(candidate) = current {
        let path = compute_path(candidate);
        if absolute.starts_with(&path) {
            return Some((candidate, path.len()));
        }
        current = candidate.parent();
    }
    None
}

fn first_match<'a>(node: NodeRef<'a>, path: &[String]) -> Option<NodeRef<'a>> {
    let Some((head, rest)) = path.split_first() else {
        return Some(node);
    };
    node.children()
        .filter(|c| c.tag() == head)
        .find_map(|c| first_match(c, rest))
}

fn collect_matches<'a>(node: NodeRef<'a>, path: &[String], out: &mut Vec<NodeRef<'a>>) {
    let Some((head, rest)) = path.split_first() else {
        out.push(node);
        return;
    };
    for child in node.children().filter(|c| c.tag() == head) {
        collect_matches(child, rest, out);
    }
}
