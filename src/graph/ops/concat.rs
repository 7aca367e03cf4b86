use crate::dtype::{DType, with_dtype};
use crate::graph::ops::{AnyOp, EvalError, InferError, Op, shape_error};
use crate::graph::{GraphContext, GraphError, NodeId, TraceConfig};
use crate::numeric_array::NumericArray;
use crate::tensor_info::TensorInfo;
use ndarray::{ArrayViewD, Axis};
use serde::{Deserialize, Serialize};

/// Joins inputs along an existing axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concat {
    pub axis: usize,
}

impl Concat {
    pub fn new(ctx: &mut GraphContext, inputs: Vec<NodeId>, axis: usize) -> Result<NodeId, GraphError> {
        ctx.create_node(AnyOp::Concat(Concat { axis }), inputs)
    }
}

/// Promoted dtype of all inputs.
pub(crate) fn common_dtype(inputs: &[TensorInfo], config: &TraceConfig) -> Option<DType> {
    let mut iter = inputs.iter().map(|x| x.dtype);
    let first = iter.next()?;
    Some(iter.fold(first, |acc, x| DType::promote(acc, x, config.float_dtype)))
}

impl Op for Concat {
    fn infer(&self, inputs: &[TensorInfo], config: &TraceConfig) -> Result<TensorInfo, InferError> {
        let first = inputs.first().ok_or_else(|| InferError::Arity {
            op: "Concat".to_string(),
            expected: "at least 1".to_string(),
            got: 0,
        })?;
        let rank = first.rank();
        if rank == 0 {
            return Err(shape_error("Concat", "zero-rank inputs cannot be concatenated"));
        }
        if self.axis >= rank {
            return Err(shape_error("Concat", format!("axis {} out of range for rank {rank}", self.axis)));
        }
        let mut shape = first.shape.clone();
        shape[self.axis] = 0;
        for input in inputs {
            if input.rank() != rank {
                return Err(shape_error(
                    "Concat",
                    format!("rank mismatch between {:?} and {:?}", first.shape, input.shape),
                ));
            }
            for (i, (a, b)) in first.shape.iter().zip(input.shape.iter()).enumerate() {
                if i != self.axis && a != b {
                    return Err(shape_error(
                        "Concat",
                        format!("dimension {i} differs between {:?} and {:?}", first.shape, input.shape),
                    ));
                }
            }
            shape[self.axis] += input.shape[self.axis];
        }
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
            Ok(NumericArray::from_ndarray(ndarray::concatenate(Axis(self.axis), &views)?))
        })
    }

    fn get_name(&self) -> String {
        format!("Concat(axis={})", self.axis)
    }

    fn name_stem(&self) -> &'static str {
        "concat"
    }
}
