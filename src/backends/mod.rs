pub mod native;
pub mod reference;

use crate::codegen::{ArraySignature, UnitSignature};
use crate::graph::ops::EvalError;
use crate::numeric_array::NumericArray;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Expected {expected} arguments, got {got}")]
    ArgumentCount { expected: usize, got: usize },
    #[error("Argument {name} must be {expected_dtype} {expected:?}, got {got_dtype} {got:?}")]
    ArgumentMismatch {
        name: String,
        expected: Vec<usize>,
        expected_dtype: crate::dtype::DType,
        got: Vec<usize>,
        got_dtype: crate::dtype::DType,
    },
    #[error("Unknown variable {0:?}")]
    UnknownVariable(String),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error("Native call returned status {0}")]
    NativeCall(i32),
    #[error("Native unit could not allocate its state")]
    NullState,
}

/// A stateful instance of a compiled procedure.
///
/// Variables persist across calls; placeholders are bound per call in signature order.
pub trait UnitInstance {
    fn signature(&self) -> &UnitSignature;
    fn get_variable(&self, name: &str) -> Result<NumericArray, RuntimeError>;
    fn set_variable(&mut self, name: &str, value: &NumericArray) -> Result<(), RuntimeError>;
    fn call(&mut self, args: &[NumericArray]) -> Result<Vec<NumericArray>, RuntimeError>;
}

/// Values crossing the unit boundary must match their declared shape and dtype exactly.
pub(crate) fn check_value(signature: &ArraySignature, value: &NumericArray) -> Result<(), RuntimeError> {
    if value.shape() != signature.shape || value.dtype() != signature.dtype {
        return Err(RuntimeError::ArgumentMismatch {
            name: signature.name.clone(),
            expected: signature.shape.clone(),
            expected_dtype: signature.dtype,
            got: value.shape(),
            got_dtype: value.dtype(),
        });
    }
    Ok(())
}

pub(crate) fn check_arguments(signature: &UnitSignature, args: &[NumericArray]) -> Result<(), RuntimeError> {
    if args.len() != signature.parameters.len() {
        return Err(RuntimeError::ArgumentCount {
            expected: signature.parameters.len(),
            got: args.len(),
        });
    }
    for (parameter, arg) in signature.parameters.iter().zip(args) {
        check_value(parameter, arg)?;
    }
    Ok(())
}
