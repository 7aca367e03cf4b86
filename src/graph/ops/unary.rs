use crate::dtype::DType;
use crate::graph::ops::{AnyOp, EvalError, InferError, Op, check_arity};
use crate::graph::{GraphContext, GraphError, NodeId, TraceConfig};
use crate::numeric_array::{NumericArray, NumericElement};
use crate::tensor_info::TensorInfo;
use num_traits::Float;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display)]
#[cfg_attr(test, derive(strum_macros::EnumIter))]
pub enum WhichUnaryOp {
    Neg,
    Abs,
    Sqrt,
    Exp,
    Log,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Floor,
    Ceil,
    Not,
}

impl WhichUnaryOp {
    /// Functions only defined on floating point values.
    pub fn is_transcendental(&self) -> bool {
        !matches!(
            self,
            WhichUnaryOp::Neg | WhichUnaryOp::Abs | WhichUnaryOp::Floor | WhichUnaryOp::Ceil | WhichUnaryOp::Not
        )
    }

    /// Name of the C math library function, if the op maps onto one directly.
    pub fn c_function(&self) -> Option<&'static str> {
        Some(match self {
            WhichUnaryOp::Sqrt => "sqrt",
            WhichUnaryOp::Exp => "exp",
            WhichUnaryOp::Log => "log",
            WhichUnaryOp::Sin => "sin",
            WhichUnaryOp::Cos => "cos",
            WhichUnaryOp::Tan => "tan",
            WhichUnaryOp::Asin => "asin",
            WhichUnaryOp::Acos => "acos",
            WhichUnaryOp::Atan => "atan",
            WhichUnaryOp::Sinh => "sinh",
            WhichUnaryOp::Cosh => "cosh",
            WhichUnaryOp::Tanh => "tanh",
            WhichUnaryOp::Floor => "floor",
            WhichUnaryOp::Ceil => "ceil",
            WhichUnaryOp::Abs => "fabs",
            WhichUnaryOp::Neg | WhichUnaryOp::Not => return None,
        })
    }

    fn stem(&self) -> &'static str {
        match self {
            WhichUnaryOp::Neg => "neg",
            WhichUnaryOp::Abs => "abs",
            WhichUnaryOp::Sqrt => "sqrt",
            WhichUnaryOp::Exp => "exp",
            WhichUnaryOp::Log => "log",
            WhichUnaryOp::Sin => "sin",
            WhichUnaryOp::Cos => "cos",
            WhichUnaryOp::Tan => "tan",
            WhichUnaryOp::Asin => "asin",
            WhichUnaryOp::Acos => "acos",
            WhichUnaryOp::Atan => "atan",
            WhichUnaryOp::Sinh => "sinh",
            WhichUnaryOp::Cosh => "cosh",
            WhichUnaryOp::Tanh => "tanh",
            WhichUnaryOp::Floor => "floor",
            WhichUnaryOp::Ceil => "ceil",
            WhichUnaryOp::Not => "not",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleUnary {
    pub which: WhichUnaryOp,
}

impl SimpleUnary {
    pub fn new(ctx: &mut GraphContext, a: NodeId, which: WhichUnaryOp) -> Result<NodeId, GraphError> {
        ctx.create_node(AnyOp::SimpleUnary(Self { which }), vec![a])
    }
}

macro_rules! unary_builders {
    ($($fn_name:ident => $variant:ident),* $(,)?) => {
        impl SimpleUnary {
            $(
                pub fn $fn_name(ctx: &mut GraphContext, a: NodeId) -> Result<NodeId, GraphError> {
                    Self::new(ctx, a, WhichUnaryOp::$variant)
                }
            )*
        }
    };
}

unary_builders!(
    neg => Neg,
    abs => Abs,
    sqrt => Sqrt,
    exp => Exp,
    ln => Log,
    sin => Sin,
    cos => Cos,
    tan => Tan,
    asin => Asin,
    acos => Acos,
    atan => Atan,
    sinh => Sinh,
    cosh => Cosh,
    tanh => Tanh,
    floor => Floor,
    ceil => Ceil,
    not => Not,
);

impl Op for SimpleUnary {
    fn infer(&self, inputs: &[TensorInfo], config: &TraceConfig) -> Result<TensorInfo, InferError> {
        check_arity(&self.get_name(), inputs, 1)?;
        let input = &inputs[0];
        let dtype = match self.which {
            WhichUnaryOp::Not => DType::BOOL,
            WhichUnaryOp::Neg | WhichUnaryOp::Abs => input.dtype.arithmetic(),
            WhichUnaryOp::Floor | WhichUnaryOp::Ceil => input.dtype,
            _ => input.dtype.float_or(config.float_dtype),
        };
        Ok(TensorInfo::new(input.shape.clone(), dtype))
    }

    fn eval(&self, inputs: &[&NumericArray], output: &TensorInfo) -> Result<NumericArray, EvalError> {
        let input = match inputs {
            [x] => *x,
            _ => return Err(EvalError::InvalidInput(self.get_name())),
        };
        match output.dtype {
            DType::F64 => float_unary::<f64>(self.which, input),
            DType::F32 => float_unary::<f32>(self.which, input),
            DType::I64 => {
                let x = input.cast(DType::I64);
                let f: fn(i64) -> i64 = match self.which {
                    WhichUnaryOp::Neg => |v| v.wrapping_neg(),
                    WhichUnaryOp::Abs => |v| v.wrapping_abs(),
                    WhichUnaryOp::Floor | WhichUnaryOp::Ceil => |v| v,
                    _ => return Err(EvalError::InvalidInput(self.get_name())),
                };
                Ok(NumericArray::from_ndarray(x.try_array::<i64>()?.map(|v| f(*v))))
            }
            DType::BOOL => {
                let x = input.cast(DType::BOOL);
                let f: fn(bool) -> bool = match self.which {
                    WhichUnaryOp::Not => |v| !v,
                    WhichUnaryOp::Floor | WhichUnaryOp::Ceil => |v| v,
                    _ => return Err(EvalError::InvalidInput(self.get_name())),
                };
                Ok(NumericArray::from_ndarray(x.try_array::<bool>()?.map(|v| f(*v))))
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

fn float_unary<T: NumericElement + Float>(which: WhichUnaryOp, input: &NumericArray) -> Result<NumericArray, EvalError> {
    let x = input.cast(T::DTYPE);
    let f: fn(T) -> T = match which {
        WhichUnaryOp::Neg => |v| -v,
        WhichUnaryOp::Abs => |v| v.abs(),
        WhichUnaryOp::Sqrt => |v| v.sqrt(),
        WhichUnaryOp::Exp => |v| v.exp(),
        WhichUnaryOp::Log => |v| v.ln(),
        WhichUnaryOp::Sin => |v| v.sin(),
        WhichUnaryOp::Cos => |v| v.cos(),
        WhichUnaryOp::Tan => |v| v.tan(),
        WhichUnaryOp::Asin => |v| v.asin(),
        WhichUnaryOp::Acos => |v| v.acos(),
        WhichUnaryOp::Atan => |v| v.atan(),
        WhichUnaryOp::Sinh => |v| v.sinh(),
        WhichUnaryOp::Cosh => |v| v.cosh(),
        WhichUnaryOp::Tanh => |v| v.tanh(),
        WhichUnaryOp::Floor => |v| v.floor(),
        WhichUnaryOp::Ceil => |v| v.ceil(),
        WhichUnaryOp::Not => return Err(EvalError::InvalidInput(which.to_string())),
    };
    Ok(NumericArray::from_ndarray(x.try_array::<T>()?.map(|v| f(*v))))
}

/// Elementwise conversion to another dtype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cast {
    pub to: DType,
}

impl Cast {
    pub fn new(ctx: &mut GraphContext, a: NodeId, to: DType) -> Result<NodeId, GraphError> {
        ctx.create_node(AnyOp::Cast(Self { to }), vec![a])
    }
}

impl Op for Cast {
    fn infer(&self, inputs: &[TensorInfo], _config: &TraceConfig) -> Result<TensorInfo, InferError> {
        check_arity("Cast", inputs, 1)?;
        Ok(TensorInfo::new(inputs[0].shape.clone(), self.to))
    }

    fn eval(&self, inputs: &[&NumericArray], _output: &TensorInfo) -> Result<NumericArray, EvalError> {
        match inputs {
            [x] => Ok(x.cast(self.to)),
            _ => Err(EvalError::InvalidInput(self.get_name())),
        }
    }

    fn get_name(&self) -> String {
        format!("Cast({})", self.to)
    }

    fn name_stem(&self) -> &'static str {
        "cast"
    }

    fn is_elementwise(&self) -> bool {
        true
    }
}
