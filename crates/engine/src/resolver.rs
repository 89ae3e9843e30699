//! Walks the link hierarchy. Nodes reference their parent by id only, so
//! every walk carries an explicit depth bound; exceeding it means the table
//! holds a cycle or a chain deeper than any write could have produced.

use timeslice_core::{EntityRef, LinkComposition};
use timeslice_storage::{LinkNode, Store};

use crate::error::EngineError;

/// Every leaf at or beneath `node`, depth-first in child id order.
pub fn collect_leaves<S: Store>(
    store: &S,
    node: &LinkNode,
    max_depth: usize,
) -> Result<Vec<LinkNode>, EngineError> {
    let mut leaves = Vec::new();
    collect(store, node, 0, max_depth, &mut leaves)?;
    Ok(leaves)
}

fn collect<S: Store>(
    store: &S,
    node: &LinkNode,
    depth: usize,
    max_depth: usize,
    leaves: &mut Vec<LinkNode>,
) -> Result<(), EngineError> {
    if node.is_leaf() {
        leaves.push(node.clone());
        return Ok(());
    }
    if depth >= max_depth {
        return Err(EngineError::LinkDepthExceeded {
            node: node.id,
            max: max_depth,
        });
    }
    for child in store.link_children(node.id)? {
        collect(store, &child, depth + 1, max_depth, leaves)?;
    }
    Ok(())
}

/// The entities on the chain from the root down to `leaf`, root first.
pub fn chain<S: Store>(
    store: &S,
    leaf: &LinkNode,
    max_depth: usize,
) -> Result<Vec<EntityRef>, EngineError> {
    let mut entities = vec![leaf.entity];
    let mut parent_id = leaf.parent_id;
    while let Some(id) = parent_id {
        if entities.len() > max_depth {
            return Err(EngineError::LinkDepthExceeded {
                node: leaf.id,
                max: max_depth,
            });
        }
        let parent = store
            .get_link_node(id)?
            .ok_or_else(|| EngineError::FactNotFound(format!("link node {id}")))?;
        entities.push(parent.entity);
        parent_id = parent.parent_id;
    }
    entities.reverse();
    Ok(entities)
}

/// Reconstruct the full composite key of `leaf` together with its window
/// and provenance.
pub fn composition<S: Store>(
    store: &S,
    leaf: &LinkNode,
    max_depth: usize,
) -> Result<LinkComposition, EngineError> {
    Ok(LinkComposition {
        node: leaf.id,
        entities: chain(store, leaf, max_depth)?,
        begin: leaf.begin,
        end: leaf.end,
        timestamp: leaf.timestamp,
        actor: leaf.actor.clone().unwrap_or_default(),
        data: leaf.data.clone(),
    })
}
