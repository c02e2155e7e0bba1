//! Traversal, selection and surgery helpers over content trees.
//!
//! Nodes are addressed by *paths*: the sequence of child indices leading from
//! a root to the node. Paths stay valid as long as the tree's structure above
//! the addressed node is not changed.

use crate::types::node_types::HEADING;
use crate::types::{Node, NON_TARGET_IDENTIFIER_TYPES};

/// Child-index path from a root to one of its descendants.
pub type NodePath = Vec<usize>;

/// Visits every node in document order.
pub fn walk<'a>(node: &'a Node, visit: &mut impl FnMut(&'a Node)) {
    visit(node);
    for child in &node.children {
        walk(child, visit);
    }
}

/// Visits every node in document order, allowing mutation.
///
/// A node is visited before its children, so changes a visitor makes to a
/// node's children are seen when the walk descends.
pub fn walk_mut(node: &mut Node, visit: &mut impl FnMut(&mut Node)) {
    visit(node);
    for child in &mut node.children {
        walk_mut(child, visit);
    }
}

/// Returns every node matching `predicate`, in document order.
pub fn select_all<'a>(root: &'a Node, predicate: impl Fn(&Node) -> bool) -> Vec<&'a Node> {
    let mut found = Vec::new();
    walk(root, &mut |node| {
        if predicate(node) {
            found.push(node);
        }
    });
    found
}

/// Returns the paths of every node matching `predicate`, in document order.
///
/// Matching nodes are not descended into, so no returned path is a prefix of
/// another.
pub fn collect_paths(root: &Node, predicate: &impl Fn(&Node) -> bool) -> Vec<NodePath> {
    let mut paths = Vec::new();
    let mut current = Vec::new();
    collect_paths_into(root, predicate, &mut current, &mut paths);
    paths
}

fn collect_paths_into(
    node: &Node,
    predicate: &impl Fn(&Node) -> bool,
    current: &mut NodePath,
    paths: &mut Vec<NodePath>,
) {
    if predicate(node) {
        paths.push(current.clone());
        return;
    }
    for (index, child) in node.children.iter().enumerate() {
        current.push(index);
        collect_paths_into(child, predicate, current, paths);
        current.pop();
    }
}

/// Resolves a path to a node.
pub fn node_at<'a>(root: &'a Node, path: &[usize]) -> Option<&'a Node> {
    path.iter()
        .try_fold(root, |node, &index| node.children.get(index))
}

/// Resolves a path to a mutable node.
pub fn node_at_mut<'a>(root: &'a mut Node, path: &[usize]) -> Option<&'a mut Node> {
    path.iter()
        .try_fold(root, |node, &index| node.children.get_mut(index))
}

/// Returns `true` if the node marks itself as a reference target, as opposed
/// to carrying an identifier that points elsewhere.
pub fn is_target_identifier_node(node: &Node) -> bool {
    let has_identity = node.identifier.is_some() || node.label.is_some() || node.html_id.is_some();
    has_identity && !NON_TARGET_IDENTIFIER_TYPES.contains(&node.node_type.as_str())
}

fn is_target_for(node: &Node, identifier: &str) -> bool {
    node.identifier.as_deref() == Some(identifier) && is_target_identifier_node(node)
}

/// Copies the nodes a reference to `identifier` denotes.
///
/// A heading denotes its whole section: the heading and the siblings after it
/// up to the next heading of the same or shallower depth. Any other node
/// denotes itself. Returns an empty vector when nothing matches.
pub fn select_target_nodes(root: &Node, identifier: &str) -> Vec<Node> {
    if is_target_for(root, identifier) {
        return vec![root.clone()];
    }
    find_in_children(&root.children, identifier).unwrap_or_default()
}

fn find_in_children(children: &[Node], identifier: &str) -> Option<Vec<Node>> {
    for (index, child) in children.iter().enumerate() {
        if is_target_for(child, identifier) {
            if !child.is(HEADING) {
                return Some(vec![child.clone()]);
            }
            let depth = child.depth.unwrap_or(1);
            let mut section = vec![child.clone()];
            section.extend(
                children[index + 1..]
                    .iter()
                    .take_while(|n| !(n.is(HEADING) && n.depth.unwrap_or(1) <= depth))
                    .cloned(),
            );
            return Some(section);
        }
        if let Some(found) = find_in_children(&child.children, identifier) {
            return Some(found);
        }
    }
    None
}

/// Drops every node failing `keep`, together with its descendants.
///
/// Removal cascades upward: a parent whose children were all dropped goes
/// too. Returns `None` when the root itself is removed.
pub fn filter_tree(mut node: Node, keep: &impl Fn(&Node) -> bool) -> Option<Node> {
    if !keep(&node) {
        return None;
    }
    if node.children.is_empty() {
        return Some(node);
    }
    node.children = std::mem::take(&mut node.children)
        .into_iter()
        .filter_map(|child| filter_tree(child, keep))
        .collect();
    (!node.children.is_empty()).then_some(node)
}

/// Removes every descendant of the given type.
pub fn remove_descendants(node: &mut Node, node_type: &str) {
    node.children.retain(|child| !child.is(node_type));
    for child in &mut node.children {
        remove_descendants(child, node_type);
    }
}
