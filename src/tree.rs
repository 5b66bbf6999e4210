//! Arena-backed element tree built incrementally by the streaming walker.
//!
//! Children are owned by their parent through the arena; the parent link is a
//! plain [`NodeId`] and never keeps anything alive. Released nodes go to a free
//! list and their slots are reused, so the arena's footprint follows the part
//! of the document currently in flight rather than the whole document.

/// Index of a node inside an [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Default)]
struct NodeData {
    tag: String,
    text: Option<String>,
    /// Set when the first child opens; later character data is not text of
    /// this node.
    text_closed: bool,
    attributes: Vec<(String, String)>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

#[derive(Debug, Default)]
pub struct Arena {
    nodes: Vec<NodeData>,
    free: Vec<NodeId>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a node and append it to `parent`'s children.
    pub fn open(
        &mut self,
        tag: String,
        attributes: Vec<(String, String)>,
        parent: Option<NodeId>,
    ) -> NodeId {
        let data = NodeData {
            tag,
            text: None,
            text_closed: false,
            attributes,
            children: Vec::new(),
            parent,
        };

        let id = match self.free.pop() {
            Some(id) => {
                self.nodes[id.0] = data;
                id
            }
            None => {
                self.nodes.push(data);
                NodeId(self.nodes.len() - 1)
            }
        };

        if let Some(p) = parent {
            let parent = &mut self.nodes[p.0];
            parent.children.push(id);
            parent.text_closed = true;
        }
        id
    }

    /// Append character data to the node's text. Only data before the node's
    /// first child counts.
    pub fn push_text(&mut self, id: NodeId, chunk: &str) {
        let node = &mut self.nodes[id.0];
        if chunk.is_empty() || node.text_closed {
            return;
        }
        node.text.get_or_insert_with(String::new).push_str(chunk);
    }

    pub fn get(&self, id: NodeId) -> NodeRef<'_> {
        NodeRef { arena: self, id }
    }

    /// Detach `id` from its parent and free it together with its subtree.
    pub fn release(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent {
            let siblings = &mut self.nodes[parent.0].children;
            if siblings.last() == Some(&id) {
                siblings.pop();
            } else {
                siblings.retain(|c| *c != id);
            }
        }
        self.free_subtree(id);
    }

    fn free_subtree(&mut self, id: NodeId) {
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            let data = std::mem::take(&mut self.nodes[next.0]);
            pending.extend(data.children);
            self.free.push(next);
        }
    }

    /// Number of slots ever allocated; the arena's high-water mark.
    pub fn slots(&self) -> usize {
        self.nodes.len()
    }

    /// Number of nodes currently alive.
    pub fn live(&self) -> usize {
        self.nodes.len() - self.free.len()
    }
}

/// Borrowed view of one node. This is what filter predicates receive.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    arena: &'a Arena,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    fn data(&self) -> &'a NodeData {
        &self.arena.nodes[self.id.0]
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tag(&self) -> &'a str {
        &self.data().tag
    }

    pub fn text(&self) -> Option<&'a str> {
        self.data().text.as_deref()
    }

    pub fn attribute(&self, name: &str) -> Option<&'a str> {
        self.data()
            .attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.data()
            .attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn parent(&self) -> Option<NodeRef<'a>> {
        let arena = self.arena;
        self.data().parent.map(|id| NodeRef { arena, id })
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let arena = self.arena;
        self.data()
            .children
            .iter()
            .map(move |&id| NodeRef { arena, id })
    }
}

impl std::fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("tag", &self.tag())
            .field("text", &self.text())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_recycles_slots() {
        let mut arena = Arena::new();
        let root = arena.open("root".into(), vec![], None);

        for _ in 0..100 {
            let item = arena.open("item".into(), vec![], Some(root));
            let leaf = arena.open("leaf".into(), vec![], Some(item));
            arena.push_text(leaf, "x");
            arena.release(item);
        }

        assert_eq!(arena.live(), 1);
        assert_eq!(arena.slots(), 3);
        assert_eq!(arena.get(root).children().count(), 0);
    }

    #[test]
    fn test_text_stops_at_first_child() {
        let mut arena = Arena::new();
        let name = arena.open("Name".into(), vec![("id".into(), "7".into())], None);
        arena.push_text(name, "lead");
        arena.push_text(name, "ing");
        let child = arena.open("X".into(), vec![], Some(name));
        arena.push_text(child, "inner");
        arena.push_text(name, "tail");

        let node = arena.get(name);
        assert_eq!(node.text(), Some("leading"));
        assert_eq!(node.attribute("id"), Some("7"));
        assert_eq!(arena.get(child).text(), Some("inner"));

        let bare = arena.open("Empty".into(), vec![], None);
        arena.open("X".into(), vec![], Some(bare));
        arena.push_text(bare, "\n");
        assert_eq!(arena.get(bare).text(), None);
    }
}
