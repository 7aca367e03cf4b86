use crate::compiler::scheduler::Schedule;
use crate::graph::ops::AnyOp;
use crate::graph::{GraphContext, NodeId, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Expression over scheduled values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprTree {
    /// A value computed by an earlier item, or a placeholder, variable or constant.
    Leaf(NodeId),
    Op {
        node: NodeId,
        op: AnyOp,
        args: Vec<ExprTree>,
    },
}

impl ExprTree {
    /// Operation nodes in evaluation order (children before parents).
    pub fn op_nodes(&self) -> Vec<NodeId> {
        let mut out = vec![];
        self.visit_ops(&mut out);
        out
    }

    fn visit_ops(&self, out: &mut Vec<NodeId>) {
        if let ExprTree::Op { node, args, .. } = self {
            for arg in args {
                arg.visit_ops(out);
            }
            out.push(*node);
        }
    }

    /// Leaves in first-use order, with repeats.
    pub fn leaves(&self) -> Vec<NodeId> {
        match self {
            ExprTree::Leaf(id) => vec![*id],
            ExprTree::Op { args, .. } => args.iter().flat_map(|x| x.leaves()).collect(),
        }
    }
}

/// Elementwise chain collapsed into one expression, stored under `root`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedExpr {
    pub root: NodeId,
    pub tree: ExprTree,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScheduledItem {
    Node(NodeId),
    Fused(FusedExpr),
}

impl ScheduledItem {
    /// The node whose value this item produces.
    pub fn root(&self) -> NodeId {
        match self {
            ScheduledItem::Node(id) => *id,
            ScheduledItem::Fused(expr) => expr.root,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedSchedule {
    pub items: Vec<ScheduledItem>,
    pub outputs: Vec<NodeId>,
}

impl FusedSchedule {
    /// One item per scheduled node.
    pub fn unfused(schedule: &Schedule) -> Self {
        Self {
            items: schedule.nodes.iter().map(|x| ScheduledItem::Node(*x)).collect(),
            outputs: schedule.outputs.clone(),
        }
    }

    /// Every node the items evaluate, in order.
    pub fn evaluated_nodes(&self) -> Vec<NodeId> {
        self.items
            .iter()
            .flat_map(|item| match item {
                ScheduledItem::Node(id) => vec![*id],
                ScheduledItem::Fused(expr) => expr.tree.op_nodes(),
            })
            .collect()
    }
}

/// Inline single-use elementwise operations into their elementwise consumer.
///
/// A node is inlined only when it is read exactly once (a consumer reading it twice counts
/// twice), is not an output, and takes part in no execution-order constraint. Moving its
/// evaluation to the consumer is then unobservable.
pub fn fuse(ctx: &GraphContext, schedule: &Schedule) -> FusedSchedule {
    let outputs: HashSet<NodeId> = schedule.outputs.iter().copied().collect();
    let mut uses: HashMap<NodeId, usize> = HashMap::new();
    let mut consumer: HashMap<NodeId, NodeId> = HashMap::new();
    for id in &schedule.nodes {
        for input in ctx.data_inputs(*id).unwrap_or_default() {
            *uses.entry(input).or_default() += 1;
            consumer.insert(input, *id);
        }
    }
    let mut constrained: HashSet<NodeId> = HashSet::new();
    for node in ctx.nodes() {
        if let Ok(deps) = ctx.control_deps(node.id) {
            if !deps.is_empty() {
                constrained.insert(node.id);
                constrained.extend(deps.iter().copied());
            }
        }
    }
    let is_elementwise = |id: NodeId| ctx.node(id).map(|x| x.is_elementwise()).unwrap_or(false);

    let inlined: HashSet<NodeId> = schedule
        .nodes
        .iter()
        .copied()
        .filter(|id| {
            is_elementwise(*id)
                && uses.get(id).copied() == Some(1)
                && !outputs.contains(id)
                && !constrained.contains(id)
                && consumer.get(id).is_some_and(|c| is_elementwise(*c))
        })
        .collect();

    let items: Vec<ScheduledItem> = schedule
        .nodes
        .iter()
        .filter(|id| !inlined.contains(id))
        .map(|id| {
            let absorbs = ctx
                .data_inputs(*id)
                .unwrap_or_default()
                .iter()
                .any(|x| inlined.contains(x));
            if is_elementwise(*id) && absorbs {
                ScheduledItem::Fused(FusedExpr {
                    root: *id,
                    tree: build_tree(ctx, *id, &inlined),
                })
            } else {
                ScheduledItem::Node(*id)
            }
        })
        .collect();

    log::debug!(
        "Fused {} operations into {} expressions",
        inlined.len(),
        items.iter().filter(|x| matches!(x, ScheduledItem::Fused(_))).count()
    );
    FusedSchedule {
        items,
        outputs: schedule.outputs.clone(),
    }
}

fn build_tree(ctx: &GraphContext, id: NodeId, inlined: &HashSet<NodeId>) -> ExprTree {
    match ctx.node(id).map(|x| &x.kind) {
        Ok(NodeKind::Operation { op, inputs }) => ExprTree::Op {
            node: id,
            op: op.clone(),
            args: inputs
                .iter()
                .map(|input| {
                    if inlined.contains(input) {
                        build_tree(ctx, *input, inlined)
                    } else {
                        ExprTree::Leaf(*input)
                    }
                })
                .collect(),
        },
        _ => ExprTree::Leaf(id),
    }
}
