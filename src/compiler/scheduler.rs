use crate::graph::{GraphContext, NodeId};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("Dependency cycle among {0} nodes")]
    Cycle(usize),
    #[error("Output {0} is not part of this graph")]
    UnboundOutput(NodeId),
}

/// Execution order of the nodes needed for a set of outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub nodes: Vec<NodeId>,
    pub outputs: Vec<NodeId>,
}

/// Everything `id` has to wait for: data inputs followed by execution-order constraints.
pub(crate) fn predecessors(ctx: &GraphContext, id: NodeId) -> Vec<NodeId> {
    let mut deps = ctx.data_inputs(id).unwrap_or_default();
    if let Ok(control) = ctx.control_deps(id) {
        deps.extend_from_slice(control);
    }
    deps
}

/// Nodes reachable backwards from `outputs` over data and control edges.
fn reachable(ctx: &GraphContext, outputs: &[NodeId]) -> HashSet<NodeId> {
    let mut seen = HashSet::new();
    let mut stack: Vec<NodeId> = outputs.to_vec();
    while let Some(id) = stack.pop() {
        if seen.insert(id) {
            stack.extend(predecessors(ctx, id).into_iter().filter(|x| !seen.contains(x)));
        }
    }
    seen
}

/// Prune to what `outputs` need and order it.
///
/// Independent nodes keep their creation order so identical traces produce identical schedules.
/// With `raw` set, every node of the context is kept; such a schedule is for inspection only.
pub fn schedule(ctx: &GraphContext, outputs: &[NodeId], raw: bool) -> Result<Schedule, ScheduleError> {
    if let Some(missing) = outputs.iter().find(|x| !ctx.contains(**x)) {
        return Err(ScheduleError::UnboundOutput(*missing));
    }
    let kept: HashSet<NodeId> = if raw {
        ctx.nodes().iter().map(|x| x.id).collect()
    } else {
        reachable(ctx, outputs)
    };

    let mut in_degree: HashMap<NodeId, usize> = HashMap::new();
    let mut successors: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for id in &kept {
        let mut preds = predecessors(ctx, *id);
        preds.sort();
        preds.dedup();
        in_degree.insert(*id, preds.len());
        for pred in preds {
            successors.entry(pred).or_default().push(*id);
        }
    }

    let mut ready: BinaryHeap<Reverse<NodeId>> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| Reverse(*id))
        .collect();
    let mut order = Vec::with_capacity(kept.len());
    while let Some(Reverse(id)) = ready.pop() {
        order.push(id);
        for next in successors.get(&id).map(|x| x.as_slice()).unwrap_or_default() {
            if let Some(degree) = in_degree.get_mut(next) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push(Reverse(*next));
                }
            }
        }
    }
    if order.len() != kept.len() {
        return Err(ScheduleError::Cycle(kept.len() - order.len()));
    }

    log::debug!(
        "Scheduled {} of {} nodes for {} outputs",
        order.len(),
        ctx.nodes().len(),
        outputs.len()
    );
    Ok(Schedule {
        nodes: order,
        outputs: outputs.to_vec(),
    })
}
