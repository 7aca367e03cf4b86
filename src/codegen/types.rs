use crate::dtype::DType;
use serde::{Deserialize, Serialize};

/// Name, shape and element type of an array crossing the unit boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArraySignature {
    pub name: String,
    pub shape: Vec<usize>,
    pub dtype: DType,
}

impl ArraySignature {
    pub fn num_elements(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn byte_len(&self) -> usize {
        self.num_elements() * self.dtype.size()
    }
}

/// Calling convention of an emitted unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSignature {
    pub unit_name: String,
    /// Placeholders in first-use order; this is the argument order of `<unit>_call`.
    pub parameters: Vec<ArraySignature>,
    /// In declared order.
    pub outputs: Vec<ArraySignature>,
    /// Persistent state, in the order of `<unit>_variable_data`.
    pub variables: Vec<ArraySignature>,
}

impl UnitSignature {
    pub fn symbol(&self, suffix: &str) -> String {
        format!("{}_{suffix}", self.unit_name)
    }

    pub fn variable(&self, name: &str) -> Option<(usize, &ArraySignature)> {
        self.variables.iter().enumerate().find(|(_, x)| x.name == name)
    }
}

/// C translation unit plus the description needed to call it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmittedModule {
    pub source: String,
    pub signature: UnitSignature,
}
