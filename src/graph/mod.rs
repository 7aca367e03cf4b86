pub mod index;
mod ledger;
pub mod ops;

use crate::dtype::DType;
use crate::graph::index::{IndexSpec, Region};
use crate::graph::ledger::AccessLedger;
use crate::graph::ops::{AnyOp, InferError, Op, shape_error, unsupported};
use crate::numeric_array::{NumericArray, NumericElement};
use crate::tensor_info::{TensorInfo, broadcast_shapes};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Handle to a node, valid only within the context that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    context: u64,
    index: usize,
}

impl NodeId {
    pub(crate) fn new(context: u64, index: usize) -> Self {
        Self { context, index }
    }

    /// Creation index within the owning context.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}@{}", self.index, self.context)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Result type of true division and transcendental functions on integer inputs.
    pub float_dtype: DType,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self { float_dtype: DType::F64 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Supplied per call.
    Placeholder,
    /// Persistent state of a compiled unit.
    Variable { initial: NumericArray },
    Constant { value: NumericArray },
    Operation { op: AnyOp, inputs: Vec<NodeId> },
    /// `target[index] = value`, performed in place.
    Mutation { target: NodeId, index: IndexSpec, value: NodeId },
}

impl NodeKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            NodeKind::Placeholder => "placeholder",
            NodeKind::Variable { .. } => "variable",
            NodeKind::Constant { .. } => "constant",
            NodeKind::Operation { .. } => "operation",
            NodeKind::Mutation { .. } => "mutation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub info: TensorInfo,
    pub kind: NodeKind,
}

impl Node {
    pub fn data_inputs(&self) -> Vec<NodeId> {
        match &self.kind {
            NodeKind::Operation { inputs, .. } => inputs.clone(),
            NodeKind::Mutation { target, value, .. } => vec![*target, *value],
            _ => vec![],
        }
    }

    pub fn is_elementwise(&self) -> bool {
        match &self.kind {
            NodeKind::Operation { op, .. } => op.is_elementwise(),
            _ => false,
        }
    }

    pub fn is_mutation(&self) -> bool {
        matches!(self.kind, NodeKind::Mutation { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Node {0} is not part of this graph")]
    UnknownNode(NodeId),
    #[error("The name {0:?} is already in use")]
    DuplicateName(String),
    #[error("Invalid name {0:?}: names must be C identifiers")]
    InvalidName(String),
    #[error(transparent)]
    Infer(#[from] InferError),
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Registry of everything recorded during one trace.
///
/// Nodes are immutable once created. Data edges live in the nodes themselves; execution-order
/// edges are kept alongside and derived from per-array access ledgers as nodes are created.
#[derive(Debug)]
pub struct GraphContext {
    id: u64,
    config: TraceConfig,
    nodes: Vec<Node>,
    names: HashMap<String, NodeId>,
    name_counters: HashMap<&'static str, usize>,
    control_deps: Vec<Vec<NodeId>>,
    ledgers: HashMap<NodeId, AccessLedger>,
    outputs: Vec<NodeId>,
}

impl Default for GraphContext {
    fn default() -> Self {
        Self::new(TraceConfig::default())
    }
}

impl GraphContext {
    pub fn new(config: TraceConfig) -> Self {
        Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            config,
            nodes: vec![],
            names: HashMap::new(),
            name_counters: HashMap::new(),
            control_deps: vec![],
            ledgers: HashMap::new(),
            outputs: vec![],
        }
    }

    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    pub fn create_placeholder(&mut self, name: &str, shape: Vec<usize>, dtype: DType) -> Result<NodeId, GraphError> {
        self.check_name(name)?;
        Ok(self.push_node(name.to_string(), TensorInfo::new(shape, dtype), NodeKind::Placeholder, vec![]))
    }

    pub fn create_variable(&mut self, name: &str, initial: NumericArray) -> Result<NodeId, GraphError> {
        self.check_name(name)?;
        let info = TensorInfo::new(initial.shape(), initial.dtype());
        Ok(self.push_node(name.to_string(), info, NodeKind::Variable { initial }, vec![]))
    }

    pub fn create_constant(&mut self, name: &str, value: NumericArray) -> Result<NodeId, GraphError> {
        self.check_name(name)?;
        let info = TensorInfo::new(value.shape(), value.dtype());
        Ok(self.push_node(name.to_string(), info, NodeKind::Constant { value }, vec![]))
    }

    /// Constant with a generated `const_<n>` name.
    pub fn constant(&mut self, value: NumericArray) -> NodeId {
        let name = self.fresh_name("const");
        let info = TensorInfo::new(value.shape(), value.dtype());
        self.push_node(name, info, NodeKind::Constant { value }, vec![])
    }

    /// Scalar literal appearing in an expression.
    pub fn scalar<T: NumericElement>(&mut self, value: T) -> NodeId {
        self.constant(NumericArray::from_scalar(value))
    }

    /// Record an operation over existing nodes.
    ///
    /// Fails without modifying the context if an input is unknown or inference rejects the
    /// operation.
    pub fn create_node(&mut self, op: AnyOp, inputs: Vec<NodeId>) -> Result<NodeId, GraphError> {
        let input_infos = inputs
            .iter()
            .map(|id| Ok(self.node(*id)?.info.clone()))
            .collect::<Result<Vec<_>, GraphError>>()?;
        let info = op.infer(&input_infos, &self.config)?;
        let read_regions = inputs
            .iter()
            .enumerate()
            .filter_map(|(position, input)| {
                let root = self.array_root(*input)?;
                let region = match (&op, position) {
                    (AnyOp::Slice(slice), 0) => slice.index.resolve(&input_infos[0].shape).ok()?.region,
                    _ => Region::full(&self.nodes[root.index].info.shape),
                };
                Some((root, region))
            })
            .collect::<Vec<_>>();

        let id = NodeId::new(self.id, self.nodes.len());
        let mut deps = vec![];
        for (root, region) in read_regions {
            if let Some(writer) = self.ledgers.entry(root).or_default().record_read(id, region) {
                deps.push(writer);
            }
        }
        let name = self.fresh_name(op.name_stem());
        log::trace!("{name} = {}", op.get_name());
        Ok(self.push_node(name, info, NodeKind::Operation { op, inputs }, deps))
    }

    /// Record `target[index] = value`.
    ///
    /// The target must be a placeholder or a variable, and `value` must broadcast to the
    /// selected region. The value is converted to the target's dtype when executed.
    pub fn assign_subregion(&mut self, target: NodeId, index: IndexSpec, value: NodeId) -> Result<NodeId, GraphError> {
        let target_node = self.node(target)?;
        let value_info = self.node(value)?.info.clone();
        if !matches!(target_node.kind, NodeKind::Placeholder | NodeKind::Variable { .. }) {
            return Err(unsupported(
                "Mutation",
                format!("cannot assign into {} {}", target_node.kind.kind_name(), target_node.name),
            )
            .into());
        }
        let target_info = target_node.info.clone();
        let resolved = index.resolve(&target_info.shape)?;
        let region_shape = resolved.output_shape();
        if broadcast_shapes(&[&value_info.shape, &region_shape]).as_ref() != Some(&region_shape) {
            return Err(shape_error(
                "Mutation",
                format!("cannot broadcast {:?} into region of shape {region_shape:?}", value_info.shape),
            )
            .into());
        }

        let id = NodeId::new(self.id, self.nodes.len());
        let mut deps = vec![];
        if let Some(root) = self.array_root(value) {
            let region = Region::full(&self.nodes[root.index].info.shape);
            deps.extend(self.ledgers.entry(root).or_default().record_read(id, region));
        }
        deps.extend(self.ledgers.entry(target).or_default().record_write(id, &resolved.region));
        let name = self.fresh_name("assign");
        log::trace!("{name}: {}{} = {}", self.nodes[target.index].name, index, self.nodes[value.index].name);
        Ok(self.push_node(name, target_info, NodeKind::Mutation { target, index, value }, deps))
    }

    /// Designate the outputs, replacing any previous designation.
    pub fn mark_outputs(&mut self, outputs: Vec<NodeId>) -> Result<(), GraphError> {
        for id in &outputs {
            self.node(*id)?;
        }
        self.outputs = outputs;
        Ok(())
    }

    pub fn outputs(&self) -> &[NodeId] {
        &self.outputs
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.context == self.id && id.index < self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, GraphError> {
        if !self.contains(id) {
            return Err(GraphError::UnknownNode(id));
        }
        Ok(&self.nodes[id.index])
    }

    /// All nodes in creation order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn data_inputs(&self, id: NodeId) -> Result<Vec<NodeId>, GraphError> {
        Ok(self.node(id)?.data_inputs())
    }

    /// Nodes that must execute before `id`, beyond its data inputs.
    pub fn control_deps(&self, id: NodeId) -> Result<&[NodeId], GraphError> {
        self.node(id)?;
        Ok(&self.control_deps[id.index])
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// The placeholder or variable whose storage a node denotes, if any.
    pub fn array_root(&self, id: NodeId) -> Option<NodeId> {
        match &self.node(id).ok()?.kind {
            NodeKind::Placeholder | NodeKind::Variable { .. } => Some(id),
            NodeKind::Mutation { target, .. } => Some(*target),
            _ => None,
        }
    }

    fn check_name(&self, name: &str) -> Result<(), GraphError> {
        if !is_identifier(name) {
            return Err(GraphError::InvalidName(name.to_string()));
        }
        if self.names.contains_key(name) {
            return Err(GraphError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    fn fresh_name(&mut self, stem: &'static str) -> String {
        let counter = self.name_counters.entry(stem).or_insert(0);
        loop {
            let name = format!("{stem}_{counter}");
            *counter += 1;
            if !self.names.contains_key(&name) {
                return name;
            }
        }
    }

    fn push_node(&mut self, name: String, info: TensorInfo, kind: NodeKind, mut deps: Vec<NodeId>) -> NodeId {
        let id = NodeId::new(self.id, self.nodes.len());
        deps.sort();
        deps.dedup();
        deps.retain(|x| *x != id);
        self.names.insert(name.clone(), id);
        self.nodes.push(Node { id, name, info, kind });
        self.control_deps.push(deps);
        id
    }
}
