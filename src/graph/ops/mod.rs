mod binary;
mod concat;
mod matmul;
mod reduce;
mod slice;
mod stack;
mod transpose;
mod unary;
mod where_op;

pub use binary::*;
pub use concat::*;
pub use matmul::*;
pub use reduce::*;
pub use slice::*;
pub use stack::*;
pub use transpose::*;
pub use unary::*;
pub use where_op::*;

use crate::graph::TraceConfig;
use crate::numeric_array::{NumericArray, NumericArrayError};
use crate::tensor_info::TensorInfo;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferError {
    #[error("Shape mismatch in {op}: {detail}")]
    Shape { op: String, detail: String },
    #[error("Index {index} out of range for axis {axis} of size {size}")]
    Index { axis: usize, index: i64, size: usize },
    #[error("Unsupported slice on axis {axis}: {detail}")]
    UnsupportedSlice { axis: usize, detail: String },
    #[error("Unsupported operation {op}: {detail}")]
    UnsupportedOperation { op: String, detail: String },
    #[error("{op} expects {expected} inputs, got {got}")]
    Arity { op: String, expected: String, got: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error(transparent)]
    NumericArray(#[from] NumericArrayError),
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
    #[error(transparent)]
    Infer(#[from] InferError),
    #[error("Invalid input for operation {0}")]
    InvalidInput(String),
}

pub trait Op {
    /// Output shape and dtype for the given inputs.
    fn infer(&self, inputs: &[TensorInfo], config: &TraceConfig) -> Result<TensorInfo, InferError>;

    /// Evaluate on concrete values. `output` is the inferred info of the node.
    fn eval(&self, inputs: &[&NumericArray], output: &TensorInfo) -> Result<NumericArray, EvalError>;

    fn get_name(&self) -> String;

    /// Stem used for generated node names.
    fn name_stem(&self) -> &'static str;

    /// Elementwise operations may be fused into a single expression.
    fn is_elementwise(&self) -> bool {
        false
    }
}

pub(crate) fn check_arity(op: &str, inputs: &[TensorInfo], expected: usize) -> Result<(), InferError> {
    if inputs.len() != expected {
        return Err(InferError::Arity {
            op: op.to_string(),
            expected: expected.to_string(),
            got: inputs.len(),
        });
    }
    Ok(())
}

pub(crate) fn shape_error(op: &str, detail: impl Into<String>) -> InferError {
    InferError::Shape {
        op: op.to_string(),
        detail: detail.into(),
    }
}

pub(crate) fn unsupported(op: &str, detail: impl Into<String>) -> InferError {
    InferError::UnsupportedOperation {
        op: op.to_string(),
        detail: detail.into(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnyOp {
    SimpleBinary(SimpleBinary),
    SimpleUnary(SimpleUnary),
    Cast(Cast),
    Where(Where),
    MatMul(MatMul),
    Cross(Cross),
    Transpose(Transpose),
    Slice(Slice),
    Concat(Concat),
    Stack(Stack),
    ReduceSum(ReduceSum),
    Norm(Norm),
}

impl Op for AnyOp {
    fn infer(&self, inputs: &[TensorInfo], config: &TraceConfig) -> Result<TensorInfo, InferError> {
        match self {
            AnyOp::SimpleBinary(x) => x.infer(inputs, config),
            AnyOp::SimpleUnary(x) => x.infer(inputs, config),
            AnyOp::Cast(x) => x.infer(inputs, config),
            AnyOp::Where(x) => x.infer(inputs, config),
            AnyOp::MatMul(x) => x.infer(inputs, config),
            AnyOp::Cross(x) => x.infer(inputs, config),
            AnyOp::Transpose(x) => x.infer(inputs, config),
            AnyOp::Slice(x) => x.infer(inputs, config),
            AnyOp::Concat(x) => x.infer(inputs, config),
            AnyOp::Stack(x) => x.infer(inputs, config),
            AnyOp::ReduceSum(x) => x.infer(inputs, config),
            AnyOp::Norm(x) => x.infer(inputs, config),
        }
    }

    fn eval(&self, inputs: &[&NumericArray], output: &TensorInfo) -> Result<NumericArray, EvalError> {
        match self {
            AnyOp::SimpleBinary(x) => x.eval(inputs, output),
            AnyOp::SimpleUnary(x) => x.eval(inputs, output),
            AnyOp::Cast(x) => x.eval(inputs, output),
            AnyOp::Where(x) => x.eval(inputs, output),
            AnyOp::MatMul(x) => x.eval(inputs, output),
            AnyOp::Cross(x) => x.eval(inputs, output),
            AnyOp::Transpose(x) => x.eval(inputs, output),
            AnyOp::Slice(x) => x.eval(inputs, output),
            AnyOp::Concat(x) => x.eval(inputs, output),
            AnyOp::Stack(x) => x.eval(inputs, output),
            AnyOp::ReduceSum(x) => x.eval(inputs, output),
            AnyOp::Norm(x) => x.eval(inputs, output),
        }
    }

    fn get_name(&self) -> String {
        match self {
            AnyOp::SimpleBinary(x) => x.get_name(),
            AnyOp::SimpleUnary(x) => x.get_name(),
            AnyOp::Cast(x) => x.get_name(),
            AnyOp::Where(x) => x.get_name(),
            AnyOp::MatMul(x) => x.get_name(),
            AnyOp::Cross(x) => x.get_name(),
            AnyOp::Transpose(x) => x.get_name(),
            AnyOp::Slice(x) => x.get_name(),
            AnyOp::Concat(x) => x.get_name(),
            AnyOp::Stack(x) => x.get_name(),
            AnyOp::ReduceSum(x) => x.get_name(),
            AnyOp::Norm(x) => x.get_name(),
        }
    }

    fn name_stem(&self) -> &'static str {
        match self {
            AnyOp::SimpleBinary(x) => x.name_stem(),
            AnyOp::SimpleUnary(x) => x.name_stem(),
            AnyOp::Cast(x) => x.name_stem(),
            AnyOp::Where(x) => x.name_stem(),
            AnyOp::MatMul(x) => x.name_stem(),
            AnyOp::Cross(x) => x.name_stem(),
            AnyOp::Transpose(x) => x.name_stem(),
            AnyOp::Slice(x) => x.name_stem(),
            AnyOp::Concat(x) => x.name_stem(),
            AnyOp::Stack(x) => x.name_stem(),
            AnyOp::ReduceSum(x) => x.name_stem(),
            AnyOp::Norm(x) => x.name_stem(),
        }
    }

    fn is_elementwise(&self) -> bool {
        matches!(
            self,
            AnyOp::SimpleBinary(_) | AnyOp::SimpleUnary(_) | AnyOp::Cast(_) | AnyOp::Where(_)
        )
    }
}

/// Pure shape/dtype inference for an operation, independent of any graph.
pub fn infer(op: &AnyOp, inputs: &[TensorInfo], config: &TraceConfig) -> Result<TensorInfo, InferError> {
    op.infer(inputs, config)
}
