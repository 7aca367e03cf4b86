use crate::dtype::with_dtype;
use crate::graph::ops::{AnyOp, EvalError, InferError, Op, check_arity, unsupported};
use crate::graph::{GraphContext, GraphError, NodeId, TraceConfig};
use crate::numeric_array::NumericArray;
use crate::tensor_info::TensorInfo;
use serde::{Deserialize, Serialize};

/// Reverses the axes of a vector or matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transpose {}

impl Transpose {
    pub fn new(ctx: &mut GraphContext, a: NodeId) -> Result<NodeId, GraphError> {
        ctx.create_node(AnyOp::Transpose(Transpose {}), vec![a])
    }
}

impl Op for Transpose {
    fn infer(&self, inputs: &[TensorInfo], _config: &TraceConfig) -> Result<TensorInfo, InferError> {
        check_arity("Transpose", inputs, 1)?;
        let input = &inputs[0];
        if input.rank() > 2 {
            return Err(unsupported("Transpose", format!("rank {} input", input.rank())));
        }
        let shape = input.shape.iter().rev().copied().collect();
        Ok(TensorInfo::new(shape, input.dtype))
    }

    fn eval(&self, inputs: &[&NumericArray], _output: &TensorInfo) -> Result<NumericArray, EvalError> {
        let input = match inputs {
            [x] => *x,
            _ => return Err(EvalError::InvalidInput(self.get_name())),
        };
        with_dtype!(input.dtype(), T => {
            let array = input.try_array::<T>()?.view().reversed_axes();
            Ok(NumericArray::from_ndarray(array.as_standard_layout().into_owned()))
        })
    }

    fn get_name(&self) -> String {
        "Transpose".to_string()
    }

    fn name_stem(&self) -> &'static str {
        "transpose"
    }
}
