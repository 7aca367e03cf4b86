use crate::dtype::with_dtype;
use crate::graph::ops::{AnyOp, EvalError, InferError, Op, common_dtype, shape_error};
use crate::graph::{GraphContext, GraphError, NodeId, TraceConfig};
use crate::numeric_array::NumericArray;
use crate::tensor_info::TensorInfo;
use ndarray::{ArrayViewD, Axis};
use serde::{Deserialize, Serialize};

/// Builds an array from equally shaped elements along a new leading axis, as `array([a, b, c])`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stack {}

impl Stack {
    pub fn new(ctx: &mut GraphContext, inputs: Vec<NodeId>) -> Result<NodeId, GraphError> {
        ctx.create_node(AnyOp::Stack(Stack {}), inputs)
    }
}

impl Op for Stack {
    fn infer(&self, inputs: &[TensorInfo], config: &TraceConfig) -> Result<TensorInfo, InferError> {
        let first = inputs.first().ok_or_else(|| InferError::Arity {
            op: "Stack".to_string(),
            expected: "at least 1".to_string(),
            got: 0,
        })?;
        if let Some(other) = inputs.iter().find(|x| x.shape != first.shape) {
            return Err(shape_error(
                "Stack",
                format!("element shapes {:?} and {:?} differ", first.shape, other.shape),
            ));
        }
        let mut shape = vec![inputs.len()];
        shape.extend_from_slice(&first.shape);
        let dtype = common_dtype(inputs, config).unwrap_or(first.dtype);
        Ok(TensorInfo::new(shape, dtype))
    }

    fn eval(&self, inputs: &[&NumericArray], output: &TensorInfo) -> Result<NumericArray, EvalError> {
        let cast: Vec<NumericArray> = inputs.iter().map(|x| x.cast(output.dtype)).collect();
        with_dtype!(output.dtype, T => {
            let views = cast
                .iter()
                .map(|x| Ok(x.try_array::<T>()?.view()))
                .collect::<Result<Vec<ArrayViewD<T>>, EvalError>>()?;
            Ok(NumericArray::from_ndarray(ndarray::stack(Axis(0), &views)?))
        })
    }

    fn get_name(&self) -> String {
        "Stack".to_string()
    }

    fn name_stem(&self) -> &'static str {
        "stack"
    }
}
