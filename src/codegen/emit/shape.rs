use super::super::utils::{convert_expr, emit_loops_with_indices, emit_range_loops, linear_index_expr, push_line};
use super::super::{EmitContext, EmitError};
use crate::graph::ops::{Concat, Slice};
use crate::graph::{Node, NodeId};

pub(super) fn emit_transpose(ctx: &mut EmitContext<'_>, node: &Node, inputs: &[NodeId]) -> Result<(), EmitError> {
    let [input] = ctx.inputs::<1>(node, inputs)?;
    let out = ctx.buffer(node.id)?;
    let src = ctx.buffer(input.id)?;
    let shape = input.info.shape.clone();
    let out_shape = node.info.shape.clone();

    ctx.begin_item(node, &format!("Transpose({})", input.name));
    emit_loops_with_indices(&mut ctx.module, &shape, 1, "i", |module, indices, indent| {
        let reversed: Vec<String> = indices.iter().rev().cloned().collect();
        push_line(
            module,
            indent,
            &format!(
                "{out}[{}] = {src}[{}];",
                linear_index_expr(&out_shape, &reversed),
                linear_index_expr(&shape, indices)
            ),
        );
    });
    Ok(())
}

/// Copies the selected region; indexed axes contribute a single iteration.
pub(super) fn emit_slice(ctx: &mut EmitContext<'_>, node: &Node, slice: &Slice, inputs: &[NodeId]) -> Result<(), EmitError> {
    let [input] = ctx.inputs::<1>(node, inputs)?;
    let resolved = slice.index.resolve(&input.info.shape)?;
    let out = ctx.buffer(node.id)?;
    let src = ctx.buffer(input.id)?;
    let shape = input.info.shape.clone();
    let ranges: Vec<(usize, usize)> = resolved.region.0.iter().map(|r| (r.start, r.end)).collect();
    let out_shape = node.info.shape.clone();
    let relative: Vec<bool> = resolved.kept.clone();

    ctx.begin_item(node, &format!("{}{}", input.name, slice.index));
    emit_range_loops(&mut ctx.module, &ranges, 1, "i", |module, indices, indent| {
        let out_indices: Vec<String> = indices
            .iter()
            .zip(ranges.iter())
            .zip(relative.iter())
            .filter(|(_, kept)| **kept)
            .map(|((idx, (start, _)), _)| {
                if *start == 0 {
                    idx.clone()
                } else {
                    format!("({idx} - {start})")
                }
            })
            .collect();
        push_line(
            module,
            indent,
            &format!(
                "{out}[{}] = {src}[{}];",
                linear_index_expr(&out_shape, &out_indices),
                linear_index_expr(&shape, indices)
            ),
        );
    });
    Ok(())
}

/// Each input is copied as `outer` blocks into its offset along the axis.
pub(super) fn emit_concat(ctx: &mut EmitContext<'_>, node: &Node, concat: &Concat, inputs: &[NodeId]) -> Result<(), EmitError> {
    let axis = concat.axis;
    let out = ctx.buffer(node.id)?;
    let outer: usize = node.info.shape[..axis].iter().product();
    let out_block: usize = node.info.shape[axis..].iter().product();
    let mut names = vec![];
    let mut lines = vec![];
    let mut offset = 0;
    for id in inputs {
        let input = ctx.node(*id)?;
        let block: usize = input.info.shape[axis..].iter().product();
        let src = convert_expr(&format!("{}[o * {block} + j]", ctx.buffer(*id)?), input.info.dtype, node.info.dtype);
        lines.push(format!(
            "for (size_t o = 0; o < {outer}; ++o) for (size_t j = 0; j < {block}; ++j) {out}[o * {out_block} + {offset} + j] = {src};"
        ));
        offset += block;
        names.push(input.name.clone());
    }

    ctx.begin_item(node, &format!("Concat(({}), axis={axis})", names.join(", ")));
    for line in lines {
        push_line(&mut ctx.module, 1, &line);
    }
    Ok(())
}

pub(super) fn emit_stack(ctx: &mut EmitContext<'_>, node: &Node, inputs: &[NodeId]) -> Result<(), EmitError> {
    let out = ctx.buffer(node.id)?;
    let mut names = vec![];
    let mut lines = vec![];
    for (k, id) in inputs.iter().enumerate() {
        let input = ctx.node(*id)?;
        let n = input.info.num_elements();
        let src = convert_expr(&format!("{}[j]", ctx.buffer(*id)?), input.info.dtype, node.info.dtype);
        lines.push(format!("for (size_t j = 0; j < {n}; ++j) {out}[{} + j] = {src};", k * n));
        names.push(input.name.clone());
    }

    ctx.begin_item(node, &format!("Stack({})", names.join(", ")));
    for line in lines {
        push_line(&mut ctx.module, 1, &line);
    }
    Ok(())
}
