use crate::dtype::DType;
use crate::graph::ops::{AnyOp, EvalError, InferError, Op, check_arity, shape_error, unsupported};
use crate::graph::{GraphContext, GraphError, NodeId, TraceConfig};
use crate::numeric_array::{NumericArray, NumericElement};
use crate::tensor_info::TensorInfo;
use ndarray::{ArrayD, Ix1, Ix2, IxDyn, LinalgScalar};
use serde::{Deserialize, Serialize};

/// Matrix product with `dot` semantics for vectors and matrices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatMul {}

impl MatMul {
    pub fn new(ctx: &mut GraphContext, a: NodeId, b: NodeId) -> Result<NodeId, GraphError> {
        ctx.create_node(AnyOp::MatMul(MatMul {}), vec![a, b])
    }

    /// Output shape for operands of rank one or two.
    pub fn output_shape(a: &[usize], b: &[usize]) -> Result<Vec<usize>, InferError> {
        let mismatch = |x: usize, y: usize| {
            shape_error("MatMul", format!("inner dimensions {x} and {y} of {a:?} and {b:?} do not agree"))
        };
        match (a, b) {
            ([k1], [k2]) => {
                if k1 != k2 {
                    return Err(mismatch(*k1, *k2));
                }
                Ok(vec![])
            }
            ([m, k1], [k2]) => {
                if k1 != k2 {
                    return Err(mismatch(*k1, *k2));
                }
                Ok(vec![*m])
            }
            ([k1], [k2, n]) => {
                if k1 != k2 {
                    return Err(mismatch(*k1, *k2));
                }
                Ok(vec![*n])
            }
            ([m, k1], [k2, n]) => {
                if k1 != k2 {
                    return Err(mismatch(*k1, *k2));
                }
                Ok(vec![*m, *n])
            }
            _ => Err(unsupported(
                "MatMul",
                format!("operands of rank {} and {}", a.len(), b.len()),
            )),
        }
    }
}

impl Op for MatMul {
    fn infer(&self, inputs: &[TensorInfo], config: &TraceConfig) -> Result<TensorInfo, InferError> {
        check_arity("MatMul", inputs, 2)?;
        let shape = Self::output_shape(&inputs[0].shape, &inputs[1].shape)?;
        let dtype = DType::promote(inputs[0].dtype, inputs[1].dtype, config.float_dtype).arithmetic();
        Ok(TensorInfo::new(shape, dtype))
    }

    fn eval(&self, inputs: &[&NumericArray], output: &TensorInfo) -> Result<NumericArray, EvalError> {
        let (a, b) = match inputs {
            [a, b] => (*a, *b),
            _ => return Err(EvalError::InvalidInput(self.get_name())),
        };
        match output.dtype {
            DType::F64 => dot::<f64>(a, b),
            DType::F32 => dot::<f32>(a, b),
            DType::I64 => wrapping_dot(a, b),
            DType::BOOL => Err(EvalError::InvalidInput(self.get_name())),
        }
    }

    fn get_name(&self) -> String {
        "MatMul".to_string()
    }

    fn name_stem(&self) -> &'static str {
        "matmul"
    }
}

fn dot<T: NumericElement + LinalgScalar>(a: &NumericArray, b: &NumericArray) -> Result<NumericArray, EvalError> {
    let a = a.cast(T::DTYPE);
    let b = b.cast(T::DTYPE);
    let a = a.try_array::<T>()?.view();
    let b = b.try_array::<T>()?.view();
    let out: ArrayD<T> = match (a.ndim(), b.ndim()) {
        (1, 1) => {
            let value = a.into_dimensionality::<Ix1>()?.dot(&b.into_dimensionality::<Ix1>()?);
            ArrayD::from_elem(IxDyn(&[]), value)
        }
        (2, 1) => a
            .into_dimensionality::<Ix2>()?
            .dot(&b.into_dimensionality::<Ix1>()?)
            .into_dyn(),
        (1, 2) => a
            .into_dimensionality::<Ix1>()?
            .dot(&b.into_dimensionality::<Ix2>()?)
            .into_dyn(),
        (2, 2) => a
            .into_dimensionality::<Ix2>()?
            .dot(&b.into_dimensionality::<Ix2>()?)
            .into_dyn(),
        _ => return Err(EvalError::InvalidInput("MatMul".to_string())),
    };
    Ok(NumericArray::from_ndarray(out))
}

/// Integer product accumulated in row order with two's complement wrapping, as the
/// generated loop computes it under `-fwrapv`.
fn wrapping_dot(a: &NumericArray, b: &NumericArray) -> Result<NumericArray, EvalError> {
    let (a_shape, b_shape) = (a.shape(), b.shape());
    let shape = MatMul::output_shape(&a_shape, &b_shape)?;
    let (m, k) = match a_shape.as_slice() {
        [k] => (1, *k),
        [m, k] => (*m, *k),
        _ => return Err(EvalError::InvalidInput("MatMul".to_string())),
    };
    let n = match b_shape.as_slice() {
        [_] => 1,
        [_, n] => *n,
        _ => return Err(EvalError::InvalidInput("MatMul".to_string())),
    };
    let a = a.cast(DType::I64).try_to_vec::<i64>()?;
    let b = b.cast(DType::I64).try_to_vec::<i64>()?;
    let mut values = Vec::with_capacity(m * n);
    for i in 0..m {
        for j in 0..n {
            values.push((0..k).fold(0i64, |acc, p| acc.wrapping_add(a[i * k + p].wrapping_mul(b[p * n + j]))));
        }
    }
    Ok(NumericArray::from_shape_vec(&shape, values)?)
}

/// Cross product of two 3-vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cross {}

impl Cross {
    pub fn new(ctx: &mut GraphContext, a: NodeId, b: NodeId) -> Result<NodeId, GraphError> {
        ctx.create_node(AnyOp::Cross(Cross {}), vec![a, b])
    }
}

impl Op for Cross {
    fn infer(&self, inputs: &[TensorInfo], config: &TraceConfig) -> Result<TensorInfo, InferError> {
        check_arity("Cross", inputs, 2)?;
        if inputs[0].shape != [3] || inputs[1].shape != [3] {
            return Err(shape_error(
                "Cross",
                format!("expected two vectors of length 3, got {:?} and {:?}", inputs[0].shape, inputs[1].shape),
            ));
        }
        let dtype = DType::promote(inputs[0].dtype, inputs[1].dtype, config.float_dtype).arithmetic();
        Ok(TensorInfo::new(vec![3], dtype))
    }

    fn eval(&self, inputs: &[&NumericArray], output: &TensorInfo) -> Result<NumericArray, EvalError> {
        let (a, b) = match inputs {
            [a, b] => (*a, *b),
            _ => return Err(EvalError::InvalidInput(self.get_name())),
        };
        match output.dtype {
            DType::F64 => cross::<f64>(a, b),
            DType::F32 => cross::<f32>(a, b),
            DType::I64 => {
                let a = a.cast(DType::I64).try_to_vec::<i64>()?;
                let b = b.cast(DType::I64).try_to_vec::<i64>()?;
                if a.len() != 3 || b.len() != 3 {
                    return Err(EvalError::InvalidInput(self.get_name()));
                }
                let term = |x: usize, y: usize| a[x].wrapping_mul(b[y]).wrapping_sub(a[y].wrapping_mul(b[x]));
                Ok(NumericArray::from_vec(vec![term(1, 2), term(2, 0), term(0, 1)]))
            }
            DType::BOOL => Err(EvalError::InvalidInput(self.get_name())),
        }
    }

    fn get_name(&self) -> String {
        "Cross".to_string()
    }

    fn name_stem(&self) -> &'static str {
        "cross"
    }
}

fn cross<T: NumericElement + LinalgScalar>(a: &NumericArray, b: &NumericArray) -> Result<NumericArray, EvalError> {
    let a = a.cast(T::DTYPE).try_to_vec::<T>()?;
    let b = b.cast(T::DTYPE).try_to_vec::<T>()?;
    if a.len() != 3 || b.len() != 3 {
        return Err(EvalError::InvalidInput("Cross".to_string()));
    }
    Ok(NumericArray::from_vec(vec![
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]))
}
