use std::collections::HashMap;
use std::sync::Arc;

use crate::compiled::CompiledComposition;
use crate::config::ConfigurationScopes;
use crate::errors::GenerationError;

pub type NodeId = usize;

/// Composition state for one dotted path below the root.
#[derive(Debug, Clone)]
pub struct PathNode {
    pub id: NodeId,
    pub segment: String,
    pub path: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Concrete type of the object at this path, once composition reached it.
    pub bound_type: Option<String>,
    /// Settings applied to this node's object and inherited below it.
    pub scopes: ConfigurationScopes,
    /// Last composition compiled for this node.
    pub compiled: Option<Arc<CompiledComposition>>,
}

/// Arena of [`PathNode`]s with one node per distinct path. Nodes appear the
/// first time a path is addressed, whether by configuration or by
/// composition, and are never removed.
#[derive(Debug, Clone)]
pub struct PathTree {
    nodes: Vec<PathNode>,
    index: HashMap<String, NodeId>,
}

impl Default for PathTree {
    fn default() -> Self {
        Self::new()
    }
}

pub const ROOT: NodeId = 0;

impl PathTree {
    pub fn new() -> Self {
        let root = PathNode {
            id: ROOT,
            segment: String::new(),
            path: String::new(),
            parent: None,
            children: Vec::new(),
            bound_type: None,
            scopes: ConfigurationScopes::default(),
            compiled: None,
        };
        Self {
            nodes: vec![root],
            index: HashMap::from([(String::new(), ROOT)]),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn find(&self, path: &str) -> Option<NodeId> {
        self.index.get(path).copied()
    }

    /// Walk from the root, creating missing nodes on the way. The empty
    /// path is the root.
    pub fn get_or_create(&mut self, path: &str) -> Result<NodeId, GenerationError> {
        if let Some(id) = self.find(path) {
            return Ok(id);
        }
        if path.split('.').any(str::is_empty) {
            return Err(GenerationError::InvalidConfig(format!(
                "field path '{path}' has an empty segment"
            )));
        }
        let mut current = ROOT;
        let mut current_path = String::new();
        for segment in path.split('.') {
            if !current_path.is_empty() {
                current_path.push('.');
            }
            current_path.push_str(segment);
            current = match self.find(&current_path) {
                Some(id) => id,
                None => self.push_child(current, segment, &current_path),
            };
        }
        Ok(current)
    }

    fn push_child(&mut self, parent: NodeId, segment: &str, path: &str) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(PathNode {
            id,
            segment: segment.to_string(),
            path: path.to_string(),
            parent: Some(parent),
            children: Vec::new(),
            bound_type: None,
            scopes: ConfigurationScopes::default(),
            compiled: None,
        });
        self.nodes[parent].children.push(id);
        self.index.insert(path.to_string(), id);
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&PathNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut PathNode> {
        self.nodes.get_mut(id)
    }

    pub fn bind_type(&mut self, id: NodeId, type_name: &str) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.bound_type = Some(type_name.to_string());
        }
    }

    pub fn set_compiled(&mut self, id: NodeId, compiled: Arc<CompiledComposition>) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.compiled = Some(compiled);
        }
    }

    pub fn clear_compiled(&mut self) {
        for node in &mut self.nodes {
            node.compiled = None;
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &PathNode> {
        self.nodes.iter()
    }
}

/// Join a parent path and a field name.
pub fn child_path(parent: &str, field: &str) -> String {
    if parent.is_empty() {
        field.to_string()
    } else {
        format!("{parent}.{field}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_path_resolves_to_same_node() {
        let mut tree = PathTree::new();
        let first = tree.get_or_create("b.c").expect("create");
        let second = tree.get_or_create("b.c").expect("lookup");
        assert_eq!(first, second);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn intermediate_nodes_are_created_and_linked() {
        let mut tree = PathTree::new();
        let leaf = tree.get_or_create("a.b.c").expect("create");
        let b = tree.find("a.b").expect("intermediate");
        let node = tree.node(leaf).expect("leaf");
        assert_eq!(node.parent, Some(b));
        assert_eq!(node.segment, "c");
        assert_eq!(tree.node(b).expect("b").children, vec![leaf]);
        assert_eq!(tree.node(ROOT).expect("root").children.len(), 1);
    }

    #[test]
    fn siblings_share_parent() {
        let mut tree = PathTree::new();
        let x = tree.get_or_create("a.x").expect("x");
        let y = tree.get_or_create("a.y").expect("y");
        let a = tree.find("a").expect("a");
        assert_eq!(tree.node(a).expect("a").children, vec![x, y]);
    }

    #[test]
    fn empty_segment_is_rejected() {
        let mut tree = PathTree::new();
        assert!(matches!(
            tree.get_or_create("a..b"),
            Err(GenerationError::InvalidConfig(_))
        ));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn empty_path_is_root() {
        let mut tree = PathTree::new();
        assert_eq!(tree.get_or_create("").expect("root"), ROOT);
    }

    #[test]
    fn child_path_joins_segments() {
        assert_eq!(child_path("", "a"), "a");
        assert_eq!(child_path("a.b", "c"), "a.b.c");
    }
}
