use super::super::utils::{broadcast_index_expr, convert_expr, emit_range_loops, linear_index_expr, push_line};
use super::super::{EmitContext, EmitError};
use crate::graph::index::IndexSpec;
use crate::graph::{Node, NodeId};

/// In-place update of the target's storage over the selected region.
pub(super) fn emit_mutation(
    ctx: &mut EmitContext<'_>,
    node: &Node,
    target: NodeId,
    index: &IndexSpec,
    value: NodeId,
) -> Result<(), EmitError> {
    let target_node = ctx.node(target)?;
    let value_node = ctx.node(value)?;
    let resolved = index.resolve(&target_node.info.shape)?;
    let target_buf = ctx.buffer(target)?;
    let value_buf = ctx.buffer(value)?;

    let ranges: Vec<(usize, usize)> = resolved.region.0.iter().map(|r| (r.start, r.end)).collect();
    let value_shape = value_node.info.shape.clone();
    let target_shape = target_node.info.shape.clone();
    let (from, to) = (value_node.info.dtype, target_node.info.dtype);

    ctx.begin_item(node, &format!("{}{} = {}", target_node.name, index, value_node.name));
    emit_range_loops(&mut ctx.module, &ranges, 1, "i", |module, indices, indent| {
        let selected: Vec<String> = indices
            .iter()
            .zip(resolved.kept.iter())
            .zip(ranges.iter())
            .filter(|((_, kept), _)| **kept)
            .map(|((idx, _), (start, _))| {
                if *start == 0 {
                    idx.clone()
                } else {
                    format!("({idx} - {start})")
                }
            })
            .collect();
        let src = format!("{value_buf}[{}]", broadcast_index_expr(&value_shape, &selected));
        push_line(
            module,
            indent,
            &format!(
                "{target_buf}[{}] = {};",
                linear_index_expr(&target_shape, indices),
                convert_expr(&src, from, to)
            ),
        );
    });
    Ok(())
}
