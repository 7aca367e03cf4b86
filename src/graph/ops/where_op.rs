use crate::dtype::DType;
use crate::graph::ops::{AnyOp, EvalError, InferError, Op, check_arity, shape_error};
use crate::graph::{GraphContext, GraphError, NodeId, TraceConfig};
use crate::numeric_array::{NumericArray, NumericArrayError, NumericElement};
use crate::tensor_info::{TensorInfo, broadcast_shapes};
use ndarray::{IxDyn, Zip};
use serde::{Deserialize, Serialize};

/// Elementwise selection `cond ? x : y`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Where {}

impl Where {
    pub fn new(ctx: &mut GraphContext, condition: NodeId, x: NodeId, y: NodeId) -> Result<NodeId, GraphError> {
        ctx.create_node(AnyOp::Where(Where {}), vec![condition, x, y])
    }
}

impl Op for Where {
    fn infer(&self, inputs: &[TensorInfo], config: &TraceConfig) -> Result<TensorInfo, InferError> {
        check_arity("Where", inputs, 3)?;
        let shape = broadcast_shapes(&[&inputs[0].shape, &inputs[1].shape, &inputs[2].shape]).ok_or_else(|| {
            shape_error(
                "Where",
                format!(
                    "cannot broadcast {:?}, {:?} and {:?}",
                    inputs[0].shape, inputs[1].shape, inputs[2].shape
                ),
            )
        })?;
        let dtype = DType::promote(inputs[1].dtype, inputs[2].dtype, config.float_dtype);
        Ok(TensorInfo::new(shape, dtype))
    }

    fn eval(&self, inputs: &[&NumericArray], output: &TensorInfo) -> Result<NumericArray, EvalError> {
        let (condition, x, y) = match inputs {
            [c, x, y] => (*c, *x, *y),
            _ => return Err(EvalError::InvalidInput(self.get_name())),
        };
        let condition = condition.cast(DType::BOOL);
        let condition = condition.try_array::<bool>()?;
        match output.dtype {
            DType::F64 => select::<f64>(condition, x, y, &output.shape),
            DType::F32 => select::<f32>(condition, x, y, &output.shape),
            DType::I64 => select::<i64>(condition, x, y, &output.shape),
            DType::BOOL => select::<bool>(condition, x, y, &output.shape),
        }
    }

    fn get_name(&self) -> String {
        "Where".to_string()
    }

    fn name_stem(&self) -> &'static str {
        "where"
    }

    fn is_elementwise(&self) -> bool {
        true
    }
}

fn select<T: NumericElement>(
    condition: &ndarray::ArcArray<bool, IxDyn>,
    x: &NumericArray,
    y: &NumericArray,
    shape: &[usize],
) -> Result<NumericArray, EvalError> {
    let x = x.cast(T::DTYPE);
    let y = y.cast(T::DTYPE);
    let broadcast_error = |from: &[usize]| NumericArrayError::Broadcast(from.to_vec(), shape.to_vec());
    let c_view = condition
        .broadcast(IxDyn(shape))
        .ok_or_else(|| broadcast_error(condition.shape()))?;
    let x_array = x.try_array::<T>()?;
    let y_array = y.try_array::<T>()?;
    let x_view = x_array
        .broadcast(IxDyn(shape))
        .ok_or_else(|| broadcast_error(x_array.shape()))?;
    let y_view = y_array
        .broadcast(IxDyn(shape))
        .ok_or_else(|| broadcast_error(y_array.shape()))?;
    let out = Zip::from(&c_view)
        .and(&x_view)
        .and(&y_view)
        .map_collect(|c, a, b| if *c { *a } else { *b });
    Ok(NumericArray::from_ndarray(out))
}
