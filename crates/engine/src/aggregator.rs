use std::collections::BTreeSet;

use timeslice_core::{EntityRef, aggregate};
use timeslice_storage::Store;

use crate::error::EngineError;
use crate::resolver;

/// Rebuild the override timeline of `entity` from its live facts. Must run
/// inside the caller's transaction.
pub(crate) fn rebuild_overrides<S: Store>(
    store: &mut S,
    entity: EntityRef,
) -> Result<usize, EngineError> {
    let facts = store.overrides_for(entity)?;
    let segments = aggregate::aggregate_overrides(
        facts
            .iter()
            .filter(|fact| !fact.idle)
            .map(|fact| (fact.interval(), &fact.data)),
    )?;
    store.replace_override_segments(entity, &segments)?;
    log::debug!(
        "rebuilt {} override segments for {entity} from {} facts",
        segments.len(),
        facts.len()
    );
    Ok(segments.len())
}

/// Rebuild the link timeline of `entity` from every live leaf reachable
/// through a node addressing it. Must run inside the caller's transaction.
pub(crate) fn rebuild_links<S: Store>(
    store: &mut S,
    entity: EntityRef,
    max_depth: usize,
) -> Result<usize, EngineError> {
    let mut seen = BTreeSet::new();
    let mut compositions = Vec::new();
    for node in store.link_nodes_for(entity)? {
        for leaf in resolver::collect_leaves(store, &node, max_depth)? {
            if leaf.idle || !seen.insert(leaf.id) {
                continue;
            }
            compositions.push(resolver::composition(store, &leaf, max_depth)?);
        }
    }
    compositions.sort_by_key(|c| c.node);

    let segments = aggregate::aggregate_links(
        compositions
            .into_iter()
            .map(|composition| (composition.interval(), composition)),
    )?;
    store.replace_link_segments(entity, &segments)?;
    log::debug!(
        "rebuilt {} link segments for {entity} from {} leaves",
        segments.len(),
        seen.len()
    );
    Ok(segments.len())
}
