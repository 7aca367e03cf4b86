use crate::dtype::DType;
use crate::graph::ops::{AnyOp, EvalError, InferError, Op, check_arity, unsupported};
use crate::graph::{GraphContext, GraphError, NodeId, TraceConfig};
use crate::numeric_array::NumericArray;
use crate::tensor_info::TensorInfo;
use serde::{Deserialize, Serialize};

/// Sum of all elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReduceSum {}

impl ReduceSum {
    pub fn new(ctx: &mut GraphContext, a: NodeId) -> Result<NodeId, GraphError> {
        ctx.create_node(AnyOp::ReduceSum(ReduceSum {}), vec![a])
    }
}

impl Op for ReduceSum {
    fn infer(&self, inputs: &[TensorInfo], _config: &TraceConfig) -> Result<TensorInfo, InferError> {
        check_arity("ReduceSum", inputs, 1)?;
        Ok(TensorInfo::scalar(inputs[0].dtype.arithmetic()))
    }

    fn eval(&self, inputs: &[&NumericArray], output: &TensorInfo) -> Result<NumericArray, EvalError> {
        let input = match inputs {
            [x] => x.cast(output.dtype),
            _ => return Err(EvalError::InvalidInput(self.get_name())),
        };
        match output.dtype {
            // Sequential, in the order the generated loop adds.
            DType::F64 => Ok(NumericArray::from_scalar(input.try_array::<f64>()?.iter().fold(0.0, |acc, x| acc + x))),
            DType::F32 => Ok(NumericArray::from_scalar(input.try_array::<f32>()?.iter().fold(0.0, |acc, x| acc + x))),
            DType::I64 => Ok(NumericArray::from_scalar(
                input.try_array::<i64>()?.iter().fold(0i64, |acc, x| acc.wrapping_add(*x)),
            )),
            DType::BOOL => Err(EvalError::InvalidInput(self.get_name())),
        }
    }

    fn get_name(&self) -> String {
        "ReduceSum".to_string()
    }

    fn name_stem(&self) -> &'static str {
        "sum"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display)]
pub enum NormOrd {
    /// 2-norm for vectors, Frobenius for matrices.
    Default,
    Two,
    One,
    Inf,
}

/// Vector or matrix norm, computed in double precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Norm {
    pub ord: NormOrd,
}

impl Norm {
    pub fn new(ctx: &mut GraphContext, a: NodeId) -> Result<NodeId, GraphError> {
        Self::with_ord(ctx, a, NormOrd::Default)
    }

    pub fn with_ord(ctx: &mut GraphContext, a: NodeId, ord: NormOrd) -> Result<NodeId, GraphError> {
        ctx.create_node(AnyOp::Norm(Norm { ord }), vec![a])
    }

    pub fn compute(&self, values: &[f64]) -> f64 {
        match self.ord {
            NormOrd::Default | NormOrd::Two => values.iter().map(|x| x * x).sum::<f64>().sqrt(),
            NormOrd::One => values.iter().map(|x| x.abs()).sum(),
            NormOrd::Inf => values.iter().fold(0.0, |acc, x| acc.max(x.abs())),
        }
    }
}

impl Op for Norm {
    fn infer(&self, inputs: &[TensorInfo], config: &TraceConfig) -> Result<TensorInfo, InferError> {
        check_arity("Norm", inputs, 1)?;
        let input = &inputs[0];
        if input.rank() > 2 {
            return Err(unsupported("Norm", format!("rank {} input", input.rank())));
        }
        if self.ord != NormOrd::Default && input.rank() != 1 {
            return Err(unsupported(
                "Norm",
                format!("order {} is only supported on vectors, got rank {}", self.ord, input.rank()),
            ));
        }
        Ok(TensorInfo::scalar(input.dtype.float_or(config.float_dtype)))
    }

    fn eval(&self, inputs: &[&NumericArray], output: &TensorInfo) -> Result<NumericArray, EvalError> {
        let input = match inputs {
            [x] => *x,
            _ => return Err(EvalError::InvalidInput(self.get_name())),
        };
        let value = self.compute(&input.to_f64_vec());
        Ok(NumericArray::from_scalar(value).cast(output.dtype))
    }

    fn get_name(&self) -> String {
        format!("Norm({})", self.ord)
    }

    fn name_stem(&self) -> &'static str {
        "norm"
    }
}
