use super::super::utils::{broadcast_index_expr, convert_expr, emit_loops_with_indices, linear_index_expr, math_fn, push_line};
use super::super::{EmitContext, EmitError};
use crate::compiler::fusion::ExprTree;
use crate::dtype::DType;
use crate::graph::NodeId;
use crate::graph::ops::{AnyOp, BinaryCategory, Op, WhichBinaryOp, WhichUnaryOp, comparison_dtype};

/// One loop nest over the root's shape computing the whole expression per element.
pub(super) fn emit_expression(ctx: &mut EmitContext<'_>, root: NodeId, tree: &ExprTree) -> Result<(), EmitError> {
    let out = ctx.node(root)?;
    let out_buf = ctx.buffer(root)?;
    let indices: Vec<String> = (0..out.info.rank()).map(|i| format!("i{i}")).collect();
    let (expr, dtype) = render(ctx, tree, &indices)?;
    let value = convert_expr(&expr, dtype, out.info.dtype);
    let store = format!("{out_buf}[{}] = {value};", linear_index_expr(&out.info.shape, &indices));

    let description = describe(ctx, tree)?;
    ctx.begin_item(out, &description);
    emit_loops_with_indices(&mut ctx.module, &out.info.shape, 1, "i", |module, _, indent| {
        push_line(module, indent, &store);
    });
    Ok(())
}

fn describe(ctx: &EmitContext<'_>, tree: &ExprTree) -> Result<String, EmitError> {
    Ok(match tree {
        ExprTree::Leaf(id) => ctx.node(*id)?.name.clone(),
        ExprTree::Op { op, args, .. } => {
            let args = args.iter().map(|x| describe(ctx, x)).collect::<Result<Vec<_>, _>>()?;
            format!("{}({})", op.get_name(), args.join(", "))
        }
    })
}

fn render(ctx: &EmitContext<'_>, tree: &ExprTree, indices: &[String]) -> Result<(String, DType), EmitError> {
    match tree {
        ExprTree::Leaf(id) => {
            let node = ctx.node(*id)?;
            let buf = ctx.buffer(*id)?;
            Ok((
                format!("{buf}[{}]", broadcast_index_expr(&node.info.shape, indices)),
                node.info.dtype,
            ))
        }
        ExprTree::Op { node, op, args } => {
            let out = ctx.node(*node)?.info.dtype;
            let args = args
                .iter()
                .map(|x| render(ctx, x, indices))
                .collect::<Result<Vec<_>, _>>()?;
            let expr = match (op, args.as_slice()) {
                (AnyOp::SimpleBinary(b), [lhs, rhs]) => binary_expr(b.which, lhs, rhs, out),
                (AnyOp::SimpleUnary(u), [input]) => unary_expr(u.which, input, out),
                (AnyOp::Cast(c), [(x, from)]) => convert_expr(x, *from, c.to),
                (AnyOp::Where(_), [(c, c_dtype), (x, x_dtype), (y, y_dtype)]) => format!(
                    "({} ? {} : {})",
                    convert_expr(c, *c_dtype, DType::BOOL),
                    convert_expr(x, *x_dtype, out),
                    convert_expr(y, *y_dtype, out)
                ),
                _ => {
                    return Err(EmitError::Unsupported {
                        node: ctx.node(*node)?.name.clone(),
                        reason: "not an elementwise operation".to_string(),
                    });
                }
            };
            Ok((expr, out))
        }
    }
}

fn binary_expr(which: WhichBinaryOp, lhs: &(String, DType), rhs: &(String, DType), out: DType) -> String {
    let operand_dtype = match which.category() {
        BinaryCategory::Arithmetic => out,
        BinaryCategory::Comparison => comparison_dtype(lhs.1, rhs.1),
        BinaryCategory::Logical => DType::BOOL,
    };
    let x = convert_expr(&lhs.0, lhs.1, operand_dtype);
    let y = convert_expr(&rhs.0, rhs.1, operand_dtype);
    let suffix = match out {
        DType::F64 => "f64",
        DType::F32 => "f32",
        _ => "i64",
    };
    match which {
        WhichBinaryOp::Add => format!("({x} + {y})"),
        WhichBinaryOp::Sub => format!("({x} - {y})"),
        WhichBinaryOp::Mul => format!("({x} * {y})"),
        WhichBinaryOp::Div => format!("({x} / {y})"),
        WhichBinaryOp::Pow => format!("{}({x}, {y})", math_fn("pow", out)),
        WhichBinaryOp::Modulo => format!("wj_mod_{suffix}({x}, {y})"),
        WhichBinaryOp::Max if out.is_float() => format!("{}({x}, {y})", math_fn("fmax", out)),
        WhichBinaryOp::Min if out.is_float() => format!("{}({x}, {y})", math_fn("fmin", out)),
        WhichBinaryOp::Max => format!("wj_max_i64({x}, {y})"),
        WhichBinaryOp::Min => format!("wj_min_i64({x}, {y})"),
        WhichBinaryOp::Equal => format!("({x} == {y})"),
        WhichBinaryOp::NotEqual => format!("({x} != {y})"),
        WhichBinaryOp::Less => format!("({x} < {y})"),
        WhichBinaryOp::LessOrEqual => format!("({x} <= {y})"),
        WhichBinaryOp::Greater => format!("({x} > {y})"),
        WhichBinaryOp::GreaterOrEqual => format!("({x} >= {y})"),
        WhichBinaryOp::And => format!("({x} && {y})"),
        WhichBinaryOp::Or => format!("({x} || {y})"),
        WhichBinaryOp::Xor => format!("({x} != {y})"),
    }
}

fn unary_expr(which: WhichUnaryOp, input: &(String, DType), out: DType) -> String {
    if which == WhichUnaryOp::Not {
        return format!("(!{})", convert_expr(&input.0, input.1, DType::BOOL));
    }
    let x = convert_expr(&input.0, input.1, out);
    match which {
        WhichUnaryOp::Neg => format!("(-{x})"),
        WhichUnaryOp::Abs if !out.is_float() => format!("wj_abs_i64({x})"),
        WhichUnaryOp::Floor | WhichUnaryOp::Ceil if !out.is_float() => x,
        _ => match which.c_function() {
            Some(name) => format!("{}({x})", math_fn(name, out)),
            None => x,
        },
    }
}
