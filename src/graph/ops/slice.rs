use crate::dtype::with_dtype;
use crate::graph::index::{IndexSpec, ResolvedIndex};
use crate::graph::ops::{AnyOp, EvalError, InferError, Op, check_arity};
use crate::graph::{GraphContext, GraphError, NodeId, TraceConfig};
use crate::numeric_array::NumericArray;
use crate::tensor_info::TensorInfo;
use ndarray::{Axis, IxDyn, Slice as AxisSlice};
use serde::{Deserialize, Serialize};

/// Basic indexing `x[i, a:b, ...]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slice {
    pub index: IndexSpec,
}

impl Slice {
    pub fn new(ctx: &mut GraphContext, a: NodeId, index: IndexSpec) -> Result<NodeId, GraphError> {
        ctx.create_node(AnyOp::Slice(Slice { index }), vec![a])
    }
}

impl Op for Slice {
    fn infer(&self, inputs: &[TensorInfo], _config: &TraceConfig) -> Result<TensorInfo, InferError> {
        check_arity("Slice", inputs, 1)?;
        let resolved = self.index.resolve(&inputs[0].shape)?;
        Ok(TensorInfo::new(resolved.output_shape(), inputs[0].dtype))
    }

    fn eval(&self, inputs: &[&NumericArray], _output: &TensorInfo) -> Result<NumericArray, EvalError> {
        let input = match inputs {
            [x] => *x,
            _ => return Err(EvalError::InvalidInput(self.get_name())),
        };
        let resolved = self.index.resolve(&input.shape())?;
        extract_region(input, &resolved)
    }

    fn get_name(&self) -> String {
        format!("Slice{}", self.index)
    }

    fn name_stem(&self) -> &'static str {
        "slice"
    }
}

/// Copy out the region selected by `resolved`, dropping indexed axes.
pub(crate) fn extract_region(input: &NumericArray, resolved: &ResolvedIndex) -> Result<NumericArray, EvalError> {
    with_dtype!(input.dtype(), T => {
        let array = input.try_array::<T>()?;
        let mut view = array.slice_each_axis(|ax| AxisSlice::from(resolved.region.0[ax.axis.index()].clone()));
        for (axis, kept) in resolved.kept.iter().enumerate().rev() {
            if !kept {
                view = view.index_axis_move(Axis(axis), 0);
            }
        }
        Ok(NumericArray::from_ndarray(view.to_owned()))
    })
}

/// Copy of `target` with the selected region overwritten by `value`.
///
/// `value` is cast to the target dtype and broadcast to the shape of the selection.
pub(crate) fn assign_region(
    target: &NumericArray,
    resolved: &ResolvedIndex,
    value: &NumericArray,
) -> Result<NumericArray, EvalError> {
    let value = value.cast(target.dtype()).broadcast_to(&resolved.output_shape())?;
    with_dtype!(target.dtype(), T => {
        let mut out = target.try_array::<T>()?.to_owned();
        let value = value.try_array::<T>()?.to_shape(IxDyn(&resolved.region.dims()))?;
        out.slice_each_axis_mut(|ax| AxisSlice::from(resolved.region.0[ax.axis.index()].clone()))
            .assign(&value);
        Ok(NumericArray::from_ndarray(out))
    })
}
