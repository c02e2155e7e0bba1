use crate::tree::{remove_descendants, walk_mut};
use crate::types::node_types::{CAPTION, CONTAINER, EMBED, LEGEND};
use crate::types::{Disposition, Node};

fn single_container_child(node: &Node) -> bool {
    node.children.len() == 1 && node.children[0].is(CONTAINER)
}

/// Marks redundant embed wrappers for elision, then removes them.
///
/// A container holding exactly one embed takes over the embed's source; if
/// that embed wraps a single container, the inner container is dropped too,
/// along with its caption and legend, so the outer caption is the one kept.
/// Any other embed wrapping a single container hands its source to that
/// container. Returns the number of nodes elided.
pub fn lift_embeds(tree: &mut Node) -> usize {
    walk_mut(tree, &mut |node| {
        if !node.is(CONTAINER) || node.disposition == Disposition::Elide {
            return;
        }
        let mut embeds = node
            .children
            .iter()
            .enumerate()
            .filter(|(_, child)| child.is(EMBED));
        let (Some((index, _)), None) = (embeds.next(), embeds.next()) else {
            return;
        };
        node.source = node.children[index].source.clone();
        let embed = &mut node.children[index];
        embed.disposition = Disposition::Elide;
        if single_container_child(embed) {
            let inner = &mut embed.children[0];
            inner.disposition = Disposition::Elide;
            remove_descendants(inner, CAPTION);
            remove_descendants(inner, LEGEND);
        }
    });

    walk_mut(tree, &mut |node| {
        if !node.is(EMBED) || node.disposition == Disposition::Elide {
            return;
        }
        if single_container_child(node) {
            node.children[0].source = node.source.clone();
            node.disposition = Disposition::Elide;
        }
    });

    lift_elided(tree)
}

/// Replaces every node marked [`Disposition::Elide`] by its children, in
/// place and in document order. The root itself is never elided.
///
/// Returns the number of nodes removed.
pub fn lift_elided(node: &mut Node) -> usize {
    let mut removed = 0;
    let children = std::mem::take(&mut node.children);
    for mut child in children {
        removed += lift_elided(&mut child);
        if child.disposition == Disposition::Elide {
            removed += 1;
            node.children.append(&mut child.children);
        } else {
            node.children.push(child);
        }
    }
    removed
}
