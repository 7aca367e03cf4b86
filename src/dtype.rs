use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum DTypeError {
    #[error("Requested dtype {0}, but had dtype {1}")]
    WrongDType(DType, DType),
}

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum DType {
    F64,
    F32,
    I64,
    BOOL,
}

impl DType {
    pub fn size(&self) -> usize {
        match self {
            DType::F64 => 8,
            DType::F32 => 4,
            DType::I64 => 8,
            DType::BOOL => 1,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DType::F64 | DType::F32)
    }

    /// Element type in emitted C code.
    pub fn c_type(&self) -> &'static str {
        match self {
            DType::F64 => "double",
            DType::F32 => "float",
            DType::I64 => "int64_t",
            DType::BOOL => "uint8_t",
        }
    }

    /// Type used for arithmetic results. Bools take part in arithmetic as integers.
    pub fn arithmetic(&self) -> DType {
        match self {
            DType::BOOL => DType::I64,
            x => *x,
        }
    }

    /// Common type of two operands.
    ///
    /// Two floats give the wider one, an integer mixed with a float is promoted to the
    /// wider of that float and `float_dtype`, and bool widens to int.
    pub fn promote(a: DType, b: DType, float_dtype: DType) -> DType {
        match (a, b) {
            (x, y) if x == y => x,
            (DType::F64, _) | (_, DType::F64) if a.is_float() && b.is_float() => DType::F64,
            (x, y) if x.is_float() || y.is_float() => {
                let float = if x.is_float() { x } else { y };
                Self::widest_float(float, float_dtype)
            }
            _ => DType::I64,
        }
    }

    /// The floating point type a value of this dtype is computed in for
    /// transcendental functions and true division.
    pub fn float_or(&self, float_dtype: DType) -> DType {
        if self.is_float() { *self } else { float_dtype }
    }

    fn widest_float(a: DType, b: DType) -> DType {
        if a == DType::F64 || b == DType::F64 {
            DType::F64
        } else {
            DType::F32
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DType::F64 => write!(f, "Float64"),
            DType::F32 => write!(f, "Float32"),
            DType::I64 => write!(f, "Int64"),
            DType::BOOL => write!(f, "Bool"),
        }
    }
}

/// Run `$body` with `$t` aliased to the primitive type of `$dtype`.
macro_rules! with_dtype {
    ($dtype:expr, $t:ident => $body:expr) => {
        match $dtype {
            $crate::dtype::DType::F64 => {
                type $t = f64;
                $body
            }
            $crate::dtype::DType::F32 => {
                type $t = f32;
                $body
            }
            $crate::dtype::DType::I64 => {
                type $t = i64;
                $body
            }
            $crate::dtype::DType::BOOL => {
                type $t = bool;
                $body
            }
        }
    };
}
pub(crate) use with_dtype;

pub trait DTypeOfPrimitive {
    const DTYPE: DType;
}

impl DTypeOfPrimitive for f64 { const DTYPE: DType = DType::F64; }
impl DTypeOfPrimitive for f32 { const DTYPE: DType = DType::F32; }
impl DTypeOfPrimitive for i64 { const DTYPE: DType = DType::I64; }
impl DTypeOfPrimitive for bool { const DTYPE: DType = DType::BOOL; }
