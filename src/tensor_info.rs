use crate::dtype::DType;
use serde::{Deserialize, Serialize};

/// Static shape and element type of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorInfo {
    pub shape: Vec<usize>,
    pub dtype: DType,
}

impl TensorInfo {
    pub fn new(shape: Vec<usize>, dtype: DType) -> Self {
        Self { shape, dtype }
    }

    pub fn scalar(dtype: DType) -> Self {
        Self { shape: vec![], dtype }
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn num_elements(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Numpy-style multidirectional broadcasting.
///
/// Shapes are aligned on their trailing dimensions; each dimension must either match or be 1.
/// Returns `None` when the shapes are incompatible.
pub fn broadcast_shapes(shapes: &[&[usize]]) -> Option<Vec<usize>> {
    let output_rank = shapes.iter().map(|x| x.len()).max()?;
    let mut output_shape = Vec::with_capacity(output_rank);
    for i in 0..output_rank {
        let mut dim = 1;
        for shape in shapes {
            let local_i = i as i64 - output_rank as i64 + shape.len() as i64;
            if local_i < 0 {
                continue;
            }
            let local_dim = shape[local_i as usize];
            if local_dim == 1 {
                continue;
            }
            if dim == 1 || dim == local_dim {
                dim = local_dim;
            } else {
                return None;
            }
        }
        output_shape.push(dim);
    }
    Some(output_shape)
}
