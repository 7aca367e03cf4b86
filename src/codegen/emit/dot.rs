use super::super::utils::{convert_expr, push_block};
use super::super::{EmitContext, EmitError};
use crate::graph::{Node, NodeId};

/// Naive triple loop; vectors are treated as a 1-row or 1-column matrix.
pub(super) fn emit_matmul(ctx: &mut EmitContext<'_>, node: &Node, inputs: &[NodeId]) -> Result<(), EmitError> {
    let [a, b] = ctx.inputs::<2>(node, inputs)?;
    let (m, k) = match a.info.shape.as_slice() {
        [k] => (1, *k),
        [m, k] => (*m, *k),
        _ => return Err(ctx.unsupported(node, "matmul operand must be a vector or matrix")),
    };
    let n = match b.info.shape.as_slice() {
        [_] => 1,
        [_, n] => *n,
        _ => return Err(ctx.unsupported(node, "matmul operand must be a vector or matrix")),
    };
    let dtype = node.info.dtype;
    let out = ctx.buffer(node.id)?;
    let lhs = convert_expr(&format!("{}[i * {k} + p]", ctx.buffer(a.id)?), a.info.dtype, dtype);
    let rhs = convert_expr(&format!("{}[p * {n} + j]", ctx.buffer(b.id)?), b.info.dtype, dtype);
    let c_type = dtype.c_type();

    ctx.begin_item(node, &format!("MatMul({}, {})", a.name, b.name));
    push_block(
        &mut ctx.module,
        1,
        &format!(
            r#"
            for (size_t i = 0; i < {m}; ++i) {{
              for (size_t j = 0; j < {n}; ++j) {{
                {c_type} acc = 0;
                for (size_t p = 0; p < {k}; ++p) {{
                  acc += {lhs} * {rhs};
                }}
                {out}[i * {n} + j] = acc;
              }}
            }}
            "#
        ),
    );
    Ok(())
}

pub(super) fn emit_cross(ctx: &mut EmitContext<'_>, node: &Node, inputs: &[NodeId]) -> Result<(), EmitError> {
    let [a, b] = ctx.inputs::<2>(node, inputs)?;
    let dtype = node.info.dtype;
    let out = ctx.buffer(node.id)?;
    let (a_buf, b_buf) = (ctx.buffer(a.id)?, ctx.buffer(b.id)?);
    let x = |i: usize| convert_expr(&format!("{a_buf}[{i}]"), a.info.dtype, dtype);
    let y = |i: usize| convert_expr(&format!("{b_buf}[{i}]"), b.info.dtype, dtype);
    let block = format!(
        r#"
        {out}[0] = {a1} * {b2} - {a2} * {b1};
        {out}[1] = {a2} * {b0} - {a0} * {b2};
        {out}[2] = {a0} * {b1} - {a1} * {b0};
        "#,
        a0 = x(0),
        a1 = x(1),
        a2 = x(2),
        b0 = y(0),
        b1 = y(1),
        b2 = y(2),
    );
    ctx.begin_item(node, &format!("Cross({}, {})", a.name, b.name));
    push_block(&mut ctx.module, 1, &block);
    Ok(())
}
