use crate::backends::{RuntimeError, UnitInstance, check_arguments, check_value};
use crate::codegen::UnitSignature;
use crate::compiler::CompiledProgram;
use crate::compiler::fusion::{ExprTree, ScheduledItem};
use crate::graph::ops::{EvalError, Op, assign_region};
use crate::graph::{Node, NodeId, NodeKind};
use crate::numeric_array::NumericArray;
use std::collections::HashMap;
use std::sync::Arc;

/// In-process interpreter of a compiled program.
#[derive(Debug, Clone)]
pub struct ReferenceUnit {
    program: Arc<CompiledProgram>,
}

impl ReferenceUnit {
    pub fn new(program: &CompiledProgram) -> Self {
        Self {
            program: Arc::new(program.clone()),
        }
    }

    pub fn signature(&self) -> &UnitSignature {
        self.program.signature()
    }

    /// Fresh state with every variable at its initial value.
    pub fn instantiate(&self) -> ReferenceInstance {
        let variables = self
            .program
            .nodes
            .iter()
            .filter_map(|node| match &node.kind {
                NodeKind::Variable { initial } => Some((node.id, initial.clone())),
                _ => None,
            })
            .collect();
        ReferenceInstance {
            program: self.program.clone(),
            variables,
        }
    }
}

#[derive(Debug)]
pub struct ReferenceInstance {
    program: Arc<CompiledProgram>,
    variables: HashMap<NodeId, NumericArray>,
}

impl ReferenceInstance {
    fn node(&self, id: NodeId) -> Result<&Node, EvalError> {
        self.program
            .node(id)
            .ok_or_else(|| EvalError::InvalidInput(format!("node {id} is not part of the program")))
    }

    fn variable_id(&self, name: &str) -> Result<NodeId, RuntimeError> {
        self.program
            .nodes
            .iter()
            .find(|x| x.name == name && matches!(x.kind, NodeKind::Variable { .. }))
            .map(|x| x.id)
            .filter(|id| self.variables.contains_key(id))
            .ok_or_else(|| RuntimeError::UnknownVariable(name.to_string()))
    }

    /// Mutations share the storage of their target.
    fn storage(&self, id: NodeId) -> NodeId {
        match self.program.node(id).map(|x| &x.kind) {
            Some(NodeKind::Mutation { target, .. }) => *target,
            _ => id,
        }
    }

    fn read<'v>(&self, values: &'v HashMap<NodeId, NumericArray>, id: NodeId) -> Result<&'v NumericArray, EvalError> {
        lookup(values, self.storage(id))
    }

    fn eval_tree(&self, tree: &ExprTree, values: &HashMap<NodeId, NumericArray>) -> Result<NumericArray, EvalError> {
        match tree {
            ExprTree::Leaf(id) => self.read(values, *id).cloned(),
            ExprTree::Op { node, op, args } => {
                let args = args
                    .iter()
                    .map(|x| self.eval_tree(x, values))
                    .collect::<Result<Vec<_>, _>>()?;
                let refs = args.iter().collect::<Vec<_>>();
                op.eval(&refs, &self.node(*node)?.info)
            }
        }
    }

    fn eval_node(&self, node: &Node, values: &mut HashMap<NodeId, NumericArray>) -> Result<(), EvalError> {
        match &node.kind {
            NodeKind::Placeholder => {}
            NodeKind::Variable { .. } => {
                let value = lookup(&self.variables, node.id)?.clone();
                values.insert(node.id, value);
            }
            NodeKind::Constant { value } => {
                values.insert(node.id, value.clone());
            }
            NodeKind::Operation { op, inputs } => {
                let inputs = inputs
                    .iter()
                    .map(|x| self.read(values, *x))
                    .collect::<Result<Vec<_>, _>>()?;
                let out = op.eval(&inputs, &node.info)?;
                log::trace!("{} = {}", node.name, out);
                values.insert(node.id, out);
            }
            NodeKind::Mutation { target, index, value } => {
                let current = lookup(values, *target)?;
                let resolved = index.resolve(&current.shape())?;
                let updated = assign_region(current, &resolved, self.read(values, *value)?)?;
                values.insert(*target, updated);
            }
        }
        Ok(())
    }
}

fn lookup(values: &HashMap<NodeId, NumericArray>, id: NodeId) -> Result<&NumericArray, EvalError> {
    values
        .get(&id)
        .ok_or_else(|| EvalError::InvalidInput(format!("value of {id} is not available")))
}

impl UnitInstance for ReferenceInstance {
    fn signature(&self) -> &UnitSignature {
        self.program.signature()
    }

    fn get_variable(&self, name: &str) -> Result<NumericArray, RuntimeError> {
        let id = self.variable_id(name)?;
        Ok(lookup(&self.variables, id)?.clone())
    }

    fn set_variable(&mut self, name: &str, value: &NumericArray) -> Result<(), RuntimeError> {
        let id = self.variable_id(name)?;
        let (_, signature) = self
            .signature()
            .variable(name)
            .ok_or_else(|| RuntimeError::UnknownVariable(name.to_string()))?;
        check_value(signature, value)?;
        self.variables.insert(id, value.clone());
        Ok(())
    }

    fn call(&mut self, args: &[NumericArray]) -> Result<Vec<NumericArray>, RuntimeError> {
        let signature = self.program.signature();
        check_arguments(signature, args)?;
        let mut values = HashMap::new();
        for (parameter, arg) in signature.parameters.iter().zip(args) {
            let id = self
                .program
                .nodes
                .iter()
                .find(|x| x.name == parameter.name)
                .map(|x| x.id)
                .ok_or_else(|| EvalError::InvalidInput(format!("parameter {} is not part of the program", parameter.name)))?;
            values.insert(id, arg.clone());
        }

        for item in &self.program.schedule.items {
            match item {
                ScheduledItem::Node(id) => {
                    let node = self.node(*id)?;
                    self.eval_node(node, &mut values)?;
                }
                ScheduledItem::Fused(expr) => {
                    let out = self.eval_tree(&expr.tree, &values)?;
                    values.insert(expr.root, out);
                }
            }
        }

        // Outputs and variables observe the state after the last mutation.
        let outputs = self
            .program
            .schedule
            .outputs
            .iter()
            .map(|id| self.read(&values, *id).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        for (id, value) in self.variables.iter_mut() {
            if let Some(updated) = values.remove(id) {
                *value = updated;
            }
        }
        Ok(outputs)
    }
}
