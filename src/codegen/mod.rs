//! C code generation for fused schedules.
//!
//! A unit consists of static tables for constants and initial variable values, a state struct
//! holding variables, working copies of mutated placeholders and one scratch buffer per
//! materialized operation, and the entry points:
//!
//! ```c
//! void* <unit>_new(void);
//! void <unit>_free(void* state);
//! size_t <unit>_variable_count(void);
//! const char* <unit>_variable_name(size_t i);
//! void* <unit>_variable_data(void* state, size_t i);
//! int <unit>_call(void* state, const void* const* args, size_t n_args, void* const* outs, size_t n_outs);
//! ```
//!
//! Storage is role-prefixed (`p_` parameters, `w_` parameter copies, `v_` variables, `i_` initial
//! values, `c_` constants, `t_` temporaries), so user names never collide with each other or with
//! the generated code.

mod emit;
mod types;
mod utils;

pub use types::*;

use crate::compiler::fusion::{FusedSchedule, ScheduledItem};
use crate::graph::ops::InferError;
use crate::graph::{GraphContext, GraphError, Node, NodeId, NodeKind};
use std::collections::{HashMap, HashSet};
use utils::{emit_static_array, push_block, push_line};

#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Infer(#[from] InferError),
    #[error("Invalid unit name {0:?}: must be a C identifier")]
    InvalidUnitName(String),
    #[error("Cannot emit {node}: {reason}")]
    Unsupported { node: String, reason: String },
    #[error("A raw schedule keeps unreachable nodes and is for inspection only")]
    RawSchedule,
}

const PRELUDE: &str = r#"
#include <math.h>
#include <stddef.h>
#include <stdint.h>
#include <stdlib.h>
#include <string.h>

static inline int64_t wj_mod_i64(int64_t a, int64_t b) {
  if (b == 0) return 0;
  int64_t r = a % b;
  if (r != 0 && ((r < 0) != (b < 0))) r += b;
  return r;
}
static inline double wj_mod_f64(double a, double b) { return a - floor(a / b) * b; }
static inline float wj_mod_f32(float a, float b) { return a - floorf(a / b) * b; }
static inline int64_t wj_max_i64(int64_t a, int64_t b) { return a > b ? a : b; }
static inline int64_t wj_min_i64(int64_t a, int64_t b) { return a < b ? a : b; }
static inline int64_t wj_abs_i64(int64_t a) { return a < 0 ? -a : a; }
"#;

pub(crate) struct EmitContext<'a> {
    graph: &'a GraphContext,
    buffers: HashMap<NodeId, String>,
    pub(crate) module: String,
}

impl<'a> EmitContext<'a> {
    pub(crate) fn node(&self, id: NodeId) -> Result<&'a Node, EmitError> {
        Ok(self.graph.node(id)?)
    }

    /// C expression of the storage holding a node's value.
    pub(crate) fn buffer(&self, id: NodeId) -> Result<String, EmitError> {
        self.buffers.get(&id).cloned().ok_or_else(|| EmitError::Unsupported {
            node: self.graph.node(id).map(|x| x.name.clone()).unwrap_or_else(|_| id.to_string()),
            reason: "value is not materialized by an earlier item".to_string(),
        })
    }

    pub(crate) fn inputs<const N: usize>(&self, node: &Node, inputs: &[NodeId]) -> Result<[&'a Node; N], EmitError> {
        let nodes = inputs.iter().map(|x| self.node(*x)).collect::<Result<Vec<_>, _>>()?;
        nodes
            .try_into()
            .map_err(|_| self.unsupported(node, &format!("expected {N} inputs, got {}", inputs.len())))
    }

    pub(crate) fn unsupported(&self, node: &Node, reason: &str) -> EmitError {
        EmitError::Unsupported {
            node: node.name.clone(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn begin_item(&mut self, node: &Node, description: &str) {
        push_line(&mut self.module, 1, &format!("/* {}: {description} */", node.name));
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Element count of a buffer; zero-sized arrays still get one slot.
fn buffer_len(node: &Node) -> usize {
    node.info.num_elements().max(1)
}

fn signature_of(node: &Node) -> ArraySignature {
    ArraySignature {
        name: node.name.clone(),
        shape: node.info.shape.clone(),
        dtype: node.info.dtype,
    }
}

/// Placeholders in the order their values are first read, then any only named as outputs.
fn parameter_order<'a>(graph: &'a GraphContext, schedule: &FusedSchedule) -> Result<Vec<&'a Node>, EmitError> {
    let mut seen = HashSet::new();
    let mut order = vec![];
    let reads = schedule.items.iter().flat_map(|item| match item {
        ScheduledItem::Node(id) => graph.data_inputs(*id).unwrap_or_default(),
        ScheduledItem::Fused(expr) => expr.tree.leaves(),
    });
    let candidates = reads
        .chain(schedule.outputs.iter().copied())
        .chain(schedule.items.iter().map(|x| x.root()))
        .collect::<Vec<_>>();
    for id in candidates {
        let node = graph.node(id)?;
        if matches!(node.kind, NodeKind::Placeholder) && seen.insert(id) {
            order.push(node);
        }
    }
    Ok(order)
}

/// Render a C translation unit computing `schedule`.
///
/// Only nodes in the schedule are emitted. Output is a pure function of the schedule and the
/// nodes it names, so identical traces give byte-identical source.
pub fn emit(graph: &GraphContext, schedule: &FusedSchedule, unit_name: &str) -> Result<EmittedModule, EmitError> {
    if !is_identifier(unit_name) {
        return Err(EmitError::InvalidUnitName(unit_name.to_string()));
    }
    let roots = schedule
        .items
        .iter()
        .map(|x| graph.node(x.root()))
        .collect::<Result<Vec<_>, _>>()?;
    let mutated: HashSet<NodeId> = roots
        .iter()
        .filter_map(|x| match &x.kind {
            NodeKind::Mutation { target, .. } => Some(*target),
            _ => None,
        })
        .collect();

    let parameters = parameter_order(graph, schedule)?;
    let mut buffers = HashMap::new();
    let mut variables = vec![];
    let mut constants = vec![];
    let mut temporaries = vec![];
    for node in &roots {
        let buffer = match &node.kind {
            NodeKind::Placeholder if mutated.contains(&node.id) => format!("state->w_{}", node.name),
            NodeKind::Placeholder => format!("p_{}", node.name),
            NodeKind::Variable { .. } => {
                variables.push(*node);
                format!("state->v_{}", node.name)
            }
            NodeKind::Constant { .. } => {
                constants.push(*node);
                format!("c_{}", node.name)
            }
            NodeKind::Operation { .. } => {
                temporaries.push(*node);
                format!("state->t_{}", node.name)
            }
            NodeKind::Mutation { .. } => continue,
        };
        buffers.insert(node.id, buffer);
    }
    for node in &roots {
        if let NodeKind::Mutation { target, .. } = &node.kind {
            let target_buffer = buffers.get(target).cloned().ok_or_else(|| EmitError::Unsupported {
                node: node.name.clone(),
                reason: "mutation target is not scheduled".to_string(),
            })?;
            buffers.insert(node.id, target_buffer);
        }
    }
    let outputs = schedule
        .outputs
        .iter()
        .map(|id| graph.node(*id))
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(missing) = outputs.iter().find(|x| !buffers.contains_key(&x.id)) {
        return Err(EmitError::Unsupported {
            node: missing.name.clone(),
            reason: "output is not materialized".to_string(),
        });
    }

    let state = format!("struct {unit_name}_state");
    let mut module = format!("/* {unit_name}: generated by whisper-jit */\n");
    push_block(&mut module, 0, PRELUDE);
    module.push('\n');

    for node in &constants {
        if let NodeKind::Constant { value } = &node.kind {
            emit_static_array(&mut module, &format!("c_{}", node.name), value);
        }
    }
    for node in &variables {
        if let NodeKind::Variable { initial } = &node.kind {
            emit_static_array(&mut module, &format!("i_{}", node.name), initial);
        }
    }
    module.push('\n');

    push_line(&mut module, 0, &format!("{state} {{"));
    push_line(&mut module, 1, "int reserved;");
    for node in &variables {
        push_line(&mut module, 1, &format!("{} v_{}[{}];", node.info.dtype.c_type(), node.name, buffer_len(node)));
    }
    for node in parameters.iter().filter(|x| mutated.contains(&x.id)) {
        push_line(&mut module, 1, &format!("{} w_{}[{}];", node.info.dtype.c_type(), node.name, buffer_len(node)));
    }
    for node in &temporaries {
        push_line(&mut module, 1, &format!("{} t_{}[{}];", node.info.dtype.c_type(), node.name, buffer_len(node)));
    }
    push_line(&mut module, 0, "};");
    module.push('\n');

    push_line(&mut module, 0, &format!("void* {unit_name}_new(void) {{"));
    push_line(&mut module, 1, &format!("{state}* state = ({state}*)calloc(1, sizeof({state}));"));
    push_line(&mut module, 1, "if (state == NULL) return NULL;");
    for node in &variables {
        push_line(
            &mut module,
            1,
            &format!("memcpy(state->v_{0}, i_{0}, sizeof(state->v_{0}));", node.name),
        );
    }
    push_line(&mut module, 1, "return state;");
    push_line(&mut module, 0, "}");
    push_line(&mut module, 0, &format!("void {unit_name}_free(void* state) {{ free(state); }}"));
    push_line(
        &mut module,
        0,
        &format!("size_t {unit_name}_variable_count(void) {{ return {}; }}", variables.len()),
    );
    push_line(&mut module, 0, &format!("const char* {unit_name}_variable_name(size_t i) {{"));
    push_line(&mut module, 1, "switch (i) {");
    for (i, node) in variables.iter().enumerate() {
        push_line(&mut module, 2, &format!("case {i}: return \"{}\";", node.name));
    }
    push_line(&mut module, 2, "default: return NULL;");
    push_line(&mut module, 1, "}");
    push_line(&mut module, 0, "}");
    push_line(&mut module, 0, &format!("void* {unit_name}_variable_data(void* state_ptr, size_t i) {{"));
    push_line(&mut module, 1, &format!("{state}* state = ({state}*)state_ptr;"));
    push_line(&mut module, 1, "if (state == NULL) return NULL;");
    push_line(&mut module, 1, "switch (i) {");
    for (i, node) in variables.iter().enumerate() {
        push_line(&mut module, 2, &format!("case {i}: return state->v_{};", node.name));
    }
    push_line(&mut module, 2, "default: return NULL;");
    push_line(&mut module, 1, "}");
    push_line(&mut module, 0, "}");
    module.push('\n');

    push_line(
        &mut module,
        0,
        &format!(
            "int {unit_name}_call(void* state_ptr, const void* const* args, size_t n_args, void* const* outs, size_t n_outs) {{"
        ),
    );
    push_line(&mut module, 1, &format!("{state}* state = ({state}*)state_ptr;"));
    push_line(
        &mut module,
        1,
        &format!(
            "if (state == NULL || n_args != {} || n_outs != {}) return 1;",
            parameters.len(),
            outputs.len()
        ),
    );
    for (i, node) in parameters.iter().enumerate() {
        let c_type = node.info.dtype.c_type();
        if mutated.contains(&node.id) {
            push_line(
                &mut module,
                1,
                &format!("memcpy(state->w_{}, args[{i}], {});", node.name, node.info.num_elements() * node.info.dtype.size()),
            );
        } else {
            push_line(&mut module, 1, &format!("const {c_type}* p_{} = (const {c_type}*)args[{i}];", node.name));
        }
    }

    let mut ctx = EmitContext {
        graph,
        buffers,
        module,
    };
    for item in &schedule.items {
        emit::emit_item(&mut ctx, item)?;
    }
    for (i, node) in outputs.iter().enumerate() {
        let buffer = ctx.buffer(node.id)?;
        let bytes = node.info.num_elements() * node.info.dtype.size();
        push_line(&mut ctx.module, 1, &format!("memcpy(outs[{i}], {buffer}, {bytes});"));
    }
    push_line(&mut ctx.module, 1, "return 0;");
    push_line(&mut ctx.module, 0, "}");

    log::debug!(
        "Emitted unit {unit_name}: {} items, {} parameters, {} variables, {} bytes of source",
        schedule.items.len(),
        parameters.len(),
        variables.len(),
        ctx.module.len()
    );
    Ok(EmittedModule {
        source: ctx.module,
        signature: UnitSignature {
            unit_name: unit_name.to_string(),
            parameters: parameters.iter().map(|x| signature_of(x)).collect(),
            outputs: outputs.iter().map(|x| signature_of(x)).collect(),
            variables: variables.iter().map(|x| signature_of(x)).collect(),
        },
    })
}
