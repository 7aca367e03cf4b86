use crate::dtype::{DType, DTypeError, DTypeOfPrimitive};
use ndarray::{ArcArray, ArrayD, IxDyn, Zip};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, thiserror::Error)]
pub enum NumericArrayError {
    #[error(transparent)]
    DType(#[from] DTypeError),
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
    #[error("Cannot broadcast {0:?} to {1:?}")]
    Broadcast(Vec<usize>, Vec<usize>),
}

/// Element types an array can hold.
pub trait NumericElement: DTypeOfPrimitive + Copy + Clone + PartialEq + std::fmt::Debug + 'static {
    fn to_f64(self) -> f64;
    fn to_i64(self) -> i64;
    fn from_f64(x: f64) -> Self;
    fn from_i64(x: i64) -> Self;
    fn wrap(array: ArcArray<Self, IxDyn>) -> NumericArray;
    fn unwrap(array: &NumericArray) -> Option<&ArcArray<Self, IxDyn>>;
}

impl NumericElement for f64 {
    fn to_f64(self) -> f64 { self }
    fn to_i64(self) -> i64 { self as i64 }
    fn from_f64(x: f64) -> Self { x }
    fn from_i64(x: i64) -> Self { x as f64 }
    fn wrap(array: ArcArray<Self, IxDyn>) -> NumericArray { NumericArray::F64(array) }
    fn unwrap(array: &NumericArray) -> Option<&ArcArray<Self, IxDyn>> {
        if let NumericArray::F64(x) = array { Some(x) } else { None }
    }
}

impl NumericElement for f32 {
    fn to_f64(self) -> f64 { self as f64 }
    fn to_i64(self) -> i64 { self as i64 }
    fn from_f64(x: f64) -> Self { x as f32 }
    fn from_i64(x: i64) -> Self { x as f32 }
    fn wrap(array: ArcArray<Self, IxDyn>) -> NumericArray { NumericArray::F32(array) }
    fn unwrap(array: &NumericArray) -> Option<&ArcArray<Self, IxDyn>> {
        if let NumericArray::F32(x) = array { Some(x) } else { None }
    }
}

impl NumericElement for i64 {
    fn to_f64(self) -> f64 { self as f64 }
    fn to_i64(self) -> i64 { self }
    fn from_f64(x: f64) -> Self { x as i64 }
    fn from_i64(x: i64) -> Self { x }
    fn wrap(array: ArcArray<Self, IxDyn>) -> NumericArray { NumericArray::I64(array) }
    fn unwrap(array: &NumericArray) -> Option<&ArcArray<Self, IxDyn>> {
        if let NumericArray::I64(x) = array { Some(x) } else { None }
    }
}

impl NumericElement for bool {
    fn to_f64(self) -> f64 { if self { 1.0 } else { 0.0 } }
    fn to_i64(self) -> i64 { self as i64 }
    fn from_f64(x: f64) -> Self { x != 0.0 }
    fn from_i64(x: i64) -> Self { x != 0 }
    fn wrap(array: ArcArray<Self, IxDyn>) -> NumericArray { NumericArray::BOOL(array) }
    fn unwrap(array: &NumericArray) -> Option<&ArcArray<Self, IxDyn>> {
        if let NumericArray::BOOL(x) = array { Some(x) } else { None }
    }
}

fn cast_element<T: NumericElement, U: NumericElement>(x: T) -> U {
    if T::DTYPE.is_float() {
        U::from_f64(x.to_f64())
    } else {
        U::from_i64(x.to_i64())
    }
}

/// Dynamically typed n-dimensional value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NumericArray {
    F64(ArcArray<f64, IxDyn>),
    F32(ArcArray<f32, IxDyn>),
    I64(ArcArray<i64, IxDyn>),
    BOOL(ArcArray<bool, IxDyn>),
}

impl Display for NumericArray {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            NumericArray::F64(x) => x.fmt(f),
            NumericArray::F32(x) => x.fmt(f),
            NumericArray::I64(x) => x.fmt(f),
            NumericArray::BOOL(x) => x.fmt(f),
        }
    }
}

macro_rules! dispatch {
    ($value:expr, $x:ident => $body:expr) => {
        match $value {
            NumericArray::F64($x) => $body,
            NumericArray::F32($x) => $body,
            NumericArray::I64($x) => $body,
            NumericArray::BOOL($x) => $body,
        }
    };
}

impl NumericArray {
    pub fn from_shape_vec<T: NumericElement>(
        shape: &[usize],
        data: Vec<T>,
    ) -> Result<Self, NumericArrayError> {
        let array = ArrayD::from_shape_vec(IxDyn(shape), data)?;
        Ok(T::wrap(array.into_shared()))
    }

    pub fn from_vec<T: NumericElement>(data: Vec<T>) -> Self {
        T::wrap(ndarray::Array1::from_vec(data).into_dyn().into_shared())
    }

    pub fn from_scalar<T: NumericElement>(value: T) -> Self {
        T::wrap(ArrayD::from_elem(IxDyn(&[]), value).into_shared())
    }

    pub fn from_ndarray<T: NumericElement>(array: ArrayD<T>) -> Self {
        T::wrap(array.into_shared())
    }

    pub fn zeros(shape: &[usize], dtype: DType) -> Self {
        match dtype {
            DType::F64 => Self::F64(ArrayD::zeros(IxDyn(shape)).into_shared()),
            DType::F32 => Self::F32(ArrayD::zeros(IxDyn(shape)).into_shared()),
            DType::I64 => Self::I64(ArrayD::zeros(IxDyn(shape)).into_shared()),
            DType::BOOL => Self::BOOL(ArrayD::from_elem(IxDyn(shape), false).into_shared()),
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            NumericArray::F64(_) => DType::F64,
            NumericArray::F32(_) => DType::F32,
            NumericArray::I64(_) => DType::I64,
            NumericArray::BOOL(_) => DType::BOOL,
        }
    }

    pub fn shape(&self) -> Vec<usize> {
        dispatch!(self, x => x.shape().to_vec())
    }

    pub fn try_array<T: NumericElement>(&self) -> Result<&ArcArray<T, IxDyn>, NumericArrayError> {
        T::unwrap(self).ok_or(NumericArrayError::DType(DTypeError::WrongDType(
            T::DTYPE,
            self.dtype(),
        )))
    }

    /// Elements in logical (row-major) order.
    pub fn try_to_vec<T: NumericElement>(&self) -> Result<Vec<T>, NumericArrayError> {
        Ok(self.try_array::<T>()?.iter().copied().collect())
    }

    pub fn to_f64_vec(&self) -> Vec<f64> {
        dispatch!(self, x => x.iter().map(|v| v.to_f64()).collect())
    }

    pub fn cast(&self, dtype: DType) -> NumericArray {
        if dtype == self.dtype() {
            return self.clone();
        }
        fn cast_to<T: NumericElement>(value: &NumericArray) -> NumericArray {
            dispatch!(value, x => T::wrap(x.map(|v| cast_element::<_, T>(*v)).into_shared()))
        }
        match dtype {
            DType::F64 => cast_to::<f64>(self),
            DType::F32 => cast_to::<f32>(self),
            DType::I64 => cast_to::<i64>(self),
            DType::BOOL => cast_to::<bool>(self),
        }
    }

    /// Broadcast to `shape` and materialize.
    pub fn broadcast_to(&self, shape: &[usize]) -> Result<NumericArray, NumericArrayError> {
        dispatch!(self, x => {
            let view = x
                .broadcast(IxDyn(shape))
                .ok_or_else(|| NumericArrayError::Broadcast(x.shape().to_vec(), shape.to_vec()))?;
            Ok(NumericElement::wrap(view.to_owned().into_shared()))
        })
    }
}

/// Combine two arrays elementwise with numpy broadcasting.
pub(crate) fn zip_broadcast<T: Copy, U>(
    a: &ArcArray<T, IxDyn>,
    b: &ArcArray<T, IxDyn>,
    out_shape: &[usize],
    f: impl Fn(T, T) -> U,
) -> Result<ArrayD<U>, NumericArrayError> {
    let a_view = a
        .broadcast(IxDyn(out_shape))
        .ok_or_else(|| NumericArrayError::Broadcast(a.shape().to_vec(), out_shape.to_vec()))?;
    let b_view = b
        .broadcast(IxDyn(out_shape))
        .ok_or_else(|| NumericArrayError::Broadcast(b.shape().to_vec(), out_shape.to_vec()))?;
    Ok(Zip::from(&a_view).and(&b_view).map_collect(|x, y| f(*x, *y)))
}
