use crate::dtype::DType;
use crate::graph::ops::{AnyOp, EvalError, InferError, Op, check_arity, shape_error};
use crate::graph::{GraphContext, GraphError, NodeId, TraceConfig};
use crate::numeric_array::{NumericArray, NumericElement, zip_broadcast};
use crate::tensor_info::{TensorInfo, broadcast_shapes};
use num_traits::Float;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display)]
#[cfg_attr(test, derive(strum_macros::EnumIter))]
pub enum WhichBinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Modulo,
    Max,
    Min,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    And,
    Or,
    Xor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryCategory {
    Arithmetic,
    Comparison,
    Logical,
}

impl WhichBinaryOp {
    pub fn category(&self) -> BinaryCategory {
        match self {
            WhichBinaryOp::Add
            | WhichBinaryOp::Sub
            | WhichBinaryOp::Mul
            | WhichBinaryOp::Div
            | WhichBinaryOp::Pow
            | WhichBinaryOp::Modulo
            | WhichBinaryOp::Max
            | WhichBinaryOp::Min => BinaryCategory::Arithmetic,
            WhichBinaryOp::Equal
            | WhichBinaryOp::NotEqual
            | WhichBinaryOp::Less
            | WhichBinaryOp::LessOrEqual
            | WhichBinaryOp::Greater
            | WhichBinaryOp::GreaterOrEqual => BinaryCategory::Comparison,
            WhichBinaryOp::And | WhichBinaryOp::Or | WhichBinaryOp::Xor => BinaryCategory::Logical,
        }
    }

    fn stem(&self) -> &'static str {
        match self {
            WhichBinaryOp::Add => "add",
            WhichBinaryOp::Sub => "sub",
            WhichBinaryOp::Mul => "mul",
            WhichBinaryOp::Div => "div",
            WhichBinaryOp::Pow => "pow",
            WhichBinaryOp::Modulo => "mod",
            WhichBinaryOp::Max => "max",
            WhichBinaryOp::Min => "min",
            WhichBinaryOp::Equal => "eq",
            WhichBinaryOp::NotEqual => "ne",
            WhichBinaryOp::Less => "lt",
            WhichBinaryOp::LessOrEqual => "le",
            WhichBinaryOp::Greater => "gt",
            WhichBinaryOp::GreaterOrEqual => "ge",
            WhichBinaryOp::And => "and",
            WhichBinaryOp::Or => "or",
            WhichBinaryOp::Xor => "xor",
        }
    }
}

/// Type comparisons are evaluated in: double when any side is floating, int64 otherwise.
pub fn comparison_dtype(a: DType, b: DType) -> DType {
    if a.is_float() || b.is_float() {
        DType::F64
    } else {
        DType::I64
    }
}

/// Floored modulo, matching the sign of the divisor. A zero divisor yields 0.
pub fn floored_mod_i64(a: i64, b: i64) -> i64 {
    if b == 0 {
        return 0;
    }
    let r = a.wrapping_rem(b);
    if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r }
}

pub fn floored_mod_float<T: Float>(a: T, b: T) -> T {
    a - (a / b).floor() * b
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleBinary {
    pub which: WhichBinaryOp,
}

impl SimpleBinary {
    pub fn new(
        ctx: &mut GraphContext,
        a: NodeId,
        b: NodeId,
        which: WhichBinaryOp,
    ) -> Result<NodeId, GraphError> {
        ctx.create_node(AnyOp::SimpleBinary(Self { which }), vec![a, b])
    }
}

macro_rules! binary_builders {
    ($($fn_name:ident => $variant:ident),* $(,)?) => {
        impl SimpleBinary {
            $(
                pub fn $fn_name(ctx: &mut GraphContext, a: NodeId, b: NodeId) -> Result<NodeId, GraphError> {
                    Self::new(ctx, a, b, WhichBinaryOp::$variant)
                }
            )*
        }
    };
}

binary_builders!(
    add => Add,
    sub => Sub,
    mul => Mul,
    div => Div,
    pow => Pow,
    modulo => Modulo,
    max => Max,
    min => Min,
    equal => Equal,
    not_equal => NotEqual,
    less => Less,
    less_or_equal => LessOrEqual,
    greater => Greater,
    greater_or_equal => GreaterOrEqual,
    and => And,
    or => Or,
    xor => Xor,
);

impl Op for SimpleBinary {
    fn infer(&self, inputs: &[TensorInfo], config: &TraceConfig) -> Result<TensorInfo, InferError> {
        let name = self.get_name();
        check_arity(&name, inputs, 2)?;
        let (a, b) = (&inputs[0], &inputs[1]);
        let shape = broadcast_shapes(&[&a.shape, &b.shape]).ok_or_else(|| {
            shape_error(&name, format!("cannot broadcast {:?} with {:?}", a.shape, b.shape))
        })?;
        let promoted = DType::promote(a.dtype, b.dtype, config.float_dtype);
        let dtype = match self.which {
            WhichBinaryOp::Div | WhichBinaryOp::Pow => promoted.float_or(config.float_dtype),
            _ => match self.which.category() {
                BinaryCategory::Arithmetic => promoted.arithmetic(),
                BinaryCategory::Comparison | BinaryCategory::Logical => DType::BOOL,
            },
        };
        Ok(TensorInfo::new(shape, dtype))
    }

    fn eval(&self, inputs: &[&NumericArray], output: &TensorInfo) -> Result<NumericArray, EvalError> {
        let (a, b) = match inputs {
            [a, b] => (*a, *b),
            _ => return Err(EvalError::InvalidInput(self.get_name())),
        };
        match self.which.category() {
            BinaryCategory::Arithmetic => match output.dtype {
                DType::F64 => float_arithmetic::<f64>(self.which, a, b, &output.shape),
                DType::F32 => float_arithmetic::<f32>(self.which, a, b, &output.shape),
                DType::I64 => int_arithmetic(self.which, a, b, &output.shape),
                DType::BOOL => Err(EvalError::InvalidInput(self.get_name())),
            },
            BinaryCategory::Comparison => match comparison_dtype(a.dtype(), b.dtype()) {
                DType::F64 => compare::<f64>(self.which, a, b, &output.shape),
                _ => compare::<i64>(self.which, a, b, &output.shape),
            },
            BinaryCategory::Logical => {
                let a = a.cast(DType::BOOL);
                let b = b.cast(DType::BOOL);
                let f: fn(bool, bool) -> bool = match self.which {
                    WhichBinaryOp::And => |x, y| x && y,
                    WhichBinaryOp::Or => |x, y| x || y,
                    _ => |x, y| x ^ y,
                };
                let out = zip_broadcast(a.try_array::<bool>()?, b.try_array::<bool>()?, &output.shape, f)?;
                Ok(NumericArray::from_ndarray(out))
            }
        }
    }

    fn get_name(&self) -> String {
        self.which.to_string()
    }

    fn name_stem(&self) -> &'static str {
        self.which.stem()
    }

    fn is_elementwise(&self) -> bool {
        true
    }
}

fn float_arithmetic<T: NumericElement + Float>(
    which: WhichBinaryOp,
    a: &NumericArray,
    b: &NumericArray,
    shape: &[usize],
) -> Result<NumericArray, EvalError> {
    let a = a.cast(T::DTYPE);
    let b = b.cast(T::DTYPE);
    let f: fn(T, T) -> T = match which {
        WhichBinaryOp::Add => |x, y| x + y,
        WhichBinaryOp::Sub => |x, y| x - y,
        WhichBinaryOp::Mul => |x, y| x * y,
        WhichBinaryOp::Div => |x, y| x / y,
        WhichBinaryOp::Pow => |x, y| x.powf(y),
        WhichBinaryOp::Modulo => floored_mod_float::<T>,
        WhichBinaryOp::Max => |x, y| x.max(y),
        WhichBinaryOp::Min => |x, y| x.min(y),
        _ => return Err(EvalError::InvalidInput(which.to_string())),
    };
    let out = zip_broadcast(a.try_array::<T>()?, b.try_array::<T>()?, shape, f)?;
    Ok(NumericArray::from_ndarray(out))
}

fn int_arithmetic(
    which: WhichBinaryOp,
    a: &NumericArray,
    b: &NumericArray,
    shape: &[usize],
) -> Result<NumericArray, EvalError> {
    let a = a.cast(DType::I64);
    let b = b.cast(DType::I64);
    let f: fn(i64, i64) -> i64 = match which {
        WhichBinaryOp::Add => |x, y| x.wrapping_add(y),
        WhichBinaryOp::Sub => |x, y| x.wrapping_sub(y),
        WhichBinaryOp::Mul => |x, y| x.wrapping_mul(y),
        WhichBinaryOp::Modulo => floored_mod_i64,
        WhichBinaryOp::Max => |x, y| x.max(y),
        WhichBinaryOp::Min => |x, y| x.min(y),
        _ => return Err(EvalError::InvalidInput(which.to_string())),
    };
    let out = zip_broadcast(a.try_array::<i64>()?, b.try_array::<i64>()?, shape, f)?;
    Ok(NumericArray::from_ndarray(out))
}

fn compare<T: NumericElement + PartialOrd>(
    which: WhichBinaryOp,
    a: &NumericArray,
    b: &NumericArray,
    shape: &[usize],
) -> Result<NumericArray, EvalError> {
    let a = a.cast(T::DTYPE);
    let b = b.cast(T::DTYPE);
    let f: fn(T, T) -> bool = match which {
        WhichBinaryOp::Equal => |x, y| x == y,
        WhichBinaryOp::NotEqual => |x, y| x != y,
        WhichBinaryOp::Less => |x, y| x < y,
        WhichBinaryOp::LessOrEqual => |x, y| x <= y,
        WhichBinaryOp::Greater => |x, y| x > y,
        WhichBinaryOp::GreaterOrEqual => |x, y| x >= y,
        _ => return Err(EvalError::InvalidInput(which.to_string())),
    };
    let out = zip_broadcast(a.try_array::<T>()?, b.try_array::<T>()?, shape, f)?;
    Ok(NumericArray::from_ndarray(out))
}
