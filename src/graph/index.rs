use crate::graph::ops::InferError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::ops::Range;

/// Selection along one axis.
///
/// Indices are signed so that negative values coming from a front end can be reported as
/// unsupported instead of silently wrapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisIndex {
    /// Select one position and drop the axis.
    Index(i64),
    /// Half-open range `start..end` with a step.
    Range { start: i64, end: i64, step: i64 },
    /// The whole axis.
    Full,
}

impl AxisIndex {
    pub fn at(index: i64) -> Self {
        AxisIndex::Index(index)
    }

    pub fn range(start: i64, end: i64) -> Self {
        AxisIndex::Range { start, end, step: 1 }
    }
}

impl Display for AxisIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AxisIndex::Index(i) => write!(f, "{i}"),
            AxisIndex::Range { start, end, step: 1 } => write!(f, "{start}:{end}"),
            AxisIndex::Range { start, end, step } => write!(f, "{start}:{end}:{step}"),
            AxisIndex::Full => write!(f, ":"),
        }
    }
}

/// Per-axis index specification, as written `x[1, 0:2]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct IndexSpec(pub Vec<AxisIndex>);

impl IndexSpec {
    pub fn new(axes: impl IntoIterator<Item = AxisIndex>) -> Self {
        Self(axes.into_iter().collect())
    }

    /// Validate against a source shape.
    pub fn resolve(&self, shape: &[usize]) -> Result<ResolvedIndex, InferError> {
        if self.0.len() > shape.len() {
            return Err(InferError::Index {
                axis: shape.len(),
                index: self.0.len() as i64 - 1,
                size: 0,
            });
        }
        let mut ranges = Vec::with_capacity(shape.len());
        let mut kept = Vec::with_capacity(shape.len());
        for (axis, &dim) in shape.iter().enumerate() {
            match self.0.get(axis).unwrap_or(&AxisIndex::Full) {
                AxisIndex::Index(i) => {
                    if *i < 0 {
                        return Err(InferError::UnsupportedSlice {
                            axis,
                            detail: format!("negative index {i}"),
                        });
                    }
                    if *i as usize >= dim {
                        return Err(InferError::Index { axis, index: *i, size: dim });
                    }
                    ranges.push(*i as usize..*i as usize + 1);
                    kept.push(false);
                }
                AxisIndex::Range { start, end, step } => {
                    if *step != 1 {
                        return Err(InferError::UnsupportedSlice {
                            axis,
                            detail: format!("step {step}"),
                        });
                    }
                    if *start < 0 || *end < 0 {
                        return Err(InferError::UnsupportedSlice {
                            axis,
                            detail: format!("negative range {start}:{end}"),
                        });
                    }
                    if start > end {
                        return Err(InferError::UnsupportedSlice {
                            axis,
                            detail: format!("reversed range {start}:{end}"),
                        });
                    }
                    if *end as usize > dim {
                        return Err(InferError::Index { axis, index: *end, size: dim });
                    }
                    ranges.push(*start as usize..*end as usize);
                    kept.push(true);
                }
                AxisIndex::Full => {
                    ranges.push(0..dim);
                    kept.push(true);
                }
            }
        }
        Ok(ResolvedIndex {
            region: Region(ranges),
            kept,
        })
    }
}

impl Display for IndexSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|x| x.to_string()).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Rectangular sub-region of an array, one range per source axis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region(pub Vec<Range<usize>>);

impl Region {
    pub fn full(shape: &[usize]) -> Self {
        Self(shape.iter().map(|&d| 0..d).collect())
    }

    pub fn overlaps(&self, other: &Region) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .all(|(a, b)| a.start < b.end && b.start < a.end)
    }

    pub fn dims(&self) -> Vec<usize> {
        self.0.iter().map(|r| r.end - r.start).collect()
    }
}

/// An index specification checked against a concrete shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIndex {
    pub region: Region,
    /// Per source axis: whether it survives into the result (ranges) or is dropped (indices).
    pub kept: Vec<bool>,
}

impl ResolvedIndex {
    pub fn output_shape(&self) -> Vec<usize> {
        self.region
            .0
            .iter()
            .zip(self.kept.iter())
            .filter(|(_, kept)| **kept)
            .map(|(r, _)| r.end - r.start)
            .collect()
    }
}
