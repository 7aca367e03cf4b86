use crate::dtype::DType;
use crate::numeric_array::NumericArray;

pub(super) fn emit_loops_with_indices<F>(module: &mut String, dims: &[usize], indent: usize, prefix: &str, body: F)
where
    F: FnOnce(&mut String, &[String], usize),
{
    let indices: Vec<String> = (0..dims.len()).map(|i| format!("{prefix}{i}")).collect();
    for (idx, dim) in dims.iter().enumerate() {
        let idx_name = &indices[idx];
        push_line(
            module,
            indent + idx,
            &format!("for (size_t {idx_name} = 0; {idx_name} < {dim}; ++{idx_name}) {{"),
        );
    }
    body(module, &indices, indent + dims.len());
    for idx in (0..dims.len()).rev() {
        push_line(module, indent + idx, "}");
    }
}

/// Like [`emit_loops_with_indices`], iterating `start..end` per axis.
pub(super) fn emit_range_loops<F>(module: &mut String, ranges: &[(usize, usize)], indent: usize, prefix: &str, body: F)
where
    F: FnOnce(&mut String, &[String], usize),
{
    let indices: Vec<String> = (0..ranges.len()).map(|i| format!("{prefix}{i}")).collect();
    for (idx, (start, end)) in ranges.iter().enumerate() {
        let idx_name = &indices[idx];
        push_line(
            module,
            indent + idx,
            &format!("for (size_t {idx_name} = {start}; {idx_name} < {end}; ++{idx_name}) {{"),
        );
    }
    body(module, &indices, indent + ranges.len());
    for idx in (0..ranges.len()).rev() {
        push_line(module, indent + idx, "}");
    }
}

pub(super) fn push_line(module: &mut String, indent: usize, line: &str) {
    module.push_str(&"  ".repeat(indent));
    module.push_str(line);
    module.push('\n');
}

pub(super) fn push_block(module: &mut String, indent: usize, block: &str) {
    let lines: Vec<&str> = block.lines().collect();
    let start = lines.iter().position(|x| !x.trim().is_empty()).unwrap_or(lines.len());
    let end = lines.iter().rposition(|x| !x.trim().is_empty()).map_or(start, |x| x + 1);
    let lines = &lines[start..end];
    let min_indent = lines
        .iter()
        .filter(|x| !x.trim().is_empty())
        .map(|x| x.len() - x.trim_start().len())
        .min()
        .unwrap_or(0);
    for line in lines {
        if line.trim().is_empty() {
            module.push('\n');
        } else {
            push_line(module, indent, &line[min_indent..]);
        }
    }
}

/// Row-major linear index of `indices` within `dims`.
pub(super) fn linear_index_expr(dims: &[usize], indices: &[String]) -> String {
    if dims.is_empty() {
        return "0".to_string();
    }
    let mut expr = indices[0].clone();
    for (dim, idx) in dims.iter().skip(1).zip(indices.iter().skip(1)) {
        expr = format!("({expr}) * {dim} + {idx}");
    }
    expr
}

/// Index into an operand of shape `shape` broadcast against an output indexed by `out_indices`.
///
/// Operand axes are aligned with the trailing output axes; axes of size 1 always read element 0.
pub(super) fn broadcast_index_expr(shape: &[usize], out_indices: &[String]) -> String {
    let offset = out_indices.len() - shape.len();
    let indices: Vec<String> = shape
        .iter()
        .enumerate()
        .map(|(axis, &dim)| {
            if dim == 1 {
                "0".to_string()
            } else {
                out_indices[axis + offset].clone()
            }
        })
        .collect();
    linear_index_expr(shape, &indices)
}

/// Convert a C expression of dtype `from` to dtype `to`.
pub(super) fn convert_expr(expr: &str, from: DType, to: DType) -> String {
    if from == to {
        expr.to_string()
    } else if to == DType::BOOL {
        format!("(({expr}) != 0)")
    } else {
        format!("(({})({expr}))", to.c_type())
    }
}

/// Name of a `<math.h>` function for the given float type.
pub(super) fn math_fn(name: &str, dtype: DType) -> String {
    if dtype == DType::F32 {
        format!("{name}f")
    } else {
        name.to_string()
    }
}

pub(super) fn format_f64(value: f64) -> String {
    if value.is_nan() {
        "NAN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_negative() { "-INFINITY" } else { "INFINITY" }.to_string()
    } else {
        format!("{value:?}")
    }
}

pub(super) fn format_f32(value: f32) -> String {
    if value.is_nan() {
        "NAN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_negative() { "-INFINITY" } else { "INFINITY" }.to_string()
    } else {
        format!("{value:?}f")
    }
}

pub(super) fn format_i64(value: i64) -> String {
    if value == i64::MIN {
        "INT64_MIN".to_string()
    } else {
        format!("INT64_C({value})")
    }
}

/// Literal initializer list for an array value, at most 8 elements per line.
pub(super) fn literal_values(value: &NumericArray) -> Vec<String> {
    let values: Vec<String> = match value {
        NumericArray::F64(x) => x.iter().map(|v| format_f64(*v)).collect(),
        NumericArray::F32(x) => x.iter().map(|v| format_f32(*v)).collect(),
        NumericArray::I64(x) => x.iter().map(|v| format_i64(*v)).collect(),
        NumericArray::BOOL(x) => x.iter().map(|v| if *v { "1" } else { "0" }.to_string()).collect(),
    };
    if values.is_empty() {
        return vec!["0".to_string()];
    }
    values
}

pub(super) fn emit_static_array(module: &mut String, name: &str, value: &NumericArray) {
    let values = literal_values(value);
    push_line(
        module,
        0,
        &format!("static const {} {name}[{}] = {{", value.dtype().c_type(), values.len()),
    );
    for chunk in values.chunks(8) {
        push_line(module, 1, &format!("{},", chunk.join(", ")));
    }
    push_line(module, 0, "};");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_indexing() {
        let out = vec!["i0".to_string(), "i1".to_string()];
        assert_eq!(broadcast_index_expr(&[], &out), "0");
        assert_eq!(broadcast_index_expr(&[2, 1], &out), "(i0) * 1 + 0");
        assert_eq!(broadcast_index_expr(&[3], &out), "i1");
        assert_eq!(broadcast_index_expr(&[2, 3], &out), "(i0) * 3 + i1");
    }

    #[test]
    fn literals() {
        assert_eq!(format_f64(1.5), "1.5");
        assert_eq!(format_f64(2.0), "2.0");
        assert_eq!(format_f64(f64::NEG_INFINITY), "-INFINITY");
        assert_eq!(format_f32(0.25), "0.25f");
        assert_eq!(format_i64(-3), "INT64_C(-3)");
    }

    #[test]
    fn conversions() {
        assert_eq!(convert_expr("x", DType::F64, DType::F64), "x");
        assert_eq!(convert_expr("x", DType::F64, DType::BOOL), "((x) != 0)");
        assert_eq!(convert_expr("x", DType::BOOL, DType::I64), "((int64_t)(x))");
    }
}
