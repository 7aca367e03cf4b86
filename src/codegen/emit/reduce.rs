use super::super::utils::{convert_expr, push_block};
use super::super::{EmitContext, EmitError};
use crate::dtype::DType;
use crate::graph::ops::{Norm, NormOrd};
use crate::graph::{Node, NodeId};

pub(super) fn emit_sum(ctx: &mut EmitContext<'_>, node: &Node, inputs: &[NodeId]) -> Result<(), EmitError> {
    let [input] = ctx.inputs::<1>(node, inputs)?;
    let out = ctx.buffer(node.id)?;
    let n = input.info.num_elements();
    let value = convert_expr(&format!("{}[j]", ctx.buffer(input.id)?), input.info.dtype, node.info.dtype);
    let c_type = node.info.dtype.c_type();

    ctx.begin_item(node, &format!("ReduceSum({})", input.name));
    push_block(
        &mut ctx.module,
        1,
        &format!(
            r#"
            {{
              {c_type} acc = 0;
              for (size_t j = 0; j < {n}; ++j) acc += {value};
              {out}[0] = acc;
            }}
            "#
        ),
    );
    Ok(())
}

/// Accumulates in double precision regardless of the element type.
pub(super) fn emit_norm(ctx: &mut EmitContext<'_>, node: &Node, norm: &Norm, inputs: &[NodeId]) -> Result<(), EmitError> {
    let [input] = ctx.inputs::<1>(node, inputs)?;
    let out = ctx.buffer(node.id)?;
    let n = input.info.num_elements();
    let value = convert_expr(&format!("{}[j]", ctx.buffer(input.id)?), input.info.dtype, DType::F64);
    let (step, result) = match norm.ord {
        NormOrd::Default | NormOrd::Two => ("acc += x * x;", "sqrt(acc)"),
        NormOrd::One => ("acc += fabs(x);", "acc"),
        NormOrd::Inf => ("acc = fmax(acc, fabs(x));", "acc"),
    };
    let result = convert_expr(result, DType::F64, node.info.dtype);

    ctx.begin_item(node, &format!("Norm({}, {})", input.name, norm.ord));
    push_block(
        &mut ctx.module,
        1,
        &format!(
            r#"
            {{
              double acc = 0.0;
              for (size_t j = 0; j < {n}; ++j) {{
                double x = {value};
                {step}
              }}
              {out}[0] = {result};
            }}
            "#
        ),
    );
    Ok(())
}
