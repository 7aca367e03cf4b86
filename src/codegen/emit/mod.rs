mod dot;
mod elementwise;
mod mutation;
mod reduce;
mod shape;

use super::{EmitContext, EmitError};
use crate::compiler::fusion::{ExprTree, ScheduledItem};
use crate::graph::NodeKind;
use crate::graph::ops::AnyOp;

pub(super) fn emit_item(ctx: &mut EmitContext<'_>, item: &ScheduledItem) -> Result<(), EmitError> {
    let node = match item {
        ScheduledItem::Fused(expr) => {
            return elementwise::emit_expression(ctx, expr.root, &expr.tree);
        }
        ScheduledItem::Node(id) => ctx.node(*id)?,
    };
    match &node.kind {
        NodeKind::Placeholder | NodeKind::Variable { .. } | NodeKind::Constant { .. } => Ok(()),
        NodeKind::Mutation { target, index, value } => mutation::emit_mutation(ctx, node, *target, index, *value),
        NodeKind::Operation { op, inputs } => match op {
            AnyOp::SimpleBinary(_) | AnyOp::SimpleUnary(_) | AnyOp::Cast(_) | AnyOp::Where(_) => {
                let tree = ExprTree::Op {
                    node: node.id,
                    op: op.clone(),
                    args: inputs.iter().map(|x| ExprTree::Leaf(*x)).collect(),
                };
                elementwise::emit_expression(ctx, node.id, &tree)
            }
            AnyOp::MatMul(_) => dot::emit_matmul(ctx, node, inputs),
            AnyOp::Cross(_) => dot::emit_cross(ctx, node, inputs),
            AnyOp::Transpose(_) => shape::emit_transpose(ctx, node, inputs),
            AnyOp::Slice(slice) => shape::emit_slice(ctx, node, slice, inputs),
            AnyOp::Concat(concat) => shape::emit_concat(ctx, node, concat, inputs),
            AnyOp::Stack(_) => shape::emit_stack(ctx, node, inputs),
            AnyOp::ReduceSum(_) => reduce::emit_sum(ctx, node, inputs),
            AnyOp::Norm(norm) => reduce::emit_norm(ctx, node, norm, inputs),
        },
    }
}
