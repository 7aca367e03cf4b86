pub mod fusion;
pub mod scheduler;

use crate::codegen::{EmitError, EmittedModule, UnitSignature, emit};
use crate::compiler::fusion::{FusedSchedule, ScheduledItem, fuse};
use crate::compiler::scheduler::{ScheduleError, schedule};
use crate::config;
use crate::graph::{GraphContext, GraphError, Node, NodeId};
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum CompilerError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error(transparent)]
    Emit(#[from] EmitError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    pub enable_fusion: bool,
    /// Keep every node of the context. Such programs can be inspected but not emitted.
    pub raw_export: bool,
    pub unit_name: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            enable_fusion: true,
            raw_export: false,
            unit_name: "jit_unit".to_string(),
        }
    }
}

impl CompileOptions {
    /// Defaults overridden by `WHISPER_JIT_FUSION` and `WHISPER_JIT_UNIT`.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Some(fusion) = config::env_bool("WHISPER_JIT_FUSION") {
            options.enable_fusion = fusion;
        }
        if let Some(unit_name) = config::env_string("WHISPER_JIT_UNIT") {
            options.unit_name = unit_name;
        }
        options
    }
}

/// Everything needed to run a traced procedure without the context that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledProgram {
    /// Every node the schedule evaluates or reads, sorted by id.
    pub nodes: Vec<Node>,
    pub schedule: FusedSchedule,
    pub module: EmittedModule,
}

impl CompiledProgram {
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.binary_search_by_key(&id, |x| x.id).ok().map(|i| &self.nodes[i])
    }

    pub fn signature(&self) -> &UnitSignature {
        &self.module.signature
    }

    pub fn source(&self) -> &str {
        &self.module.source
    }

    /// Number of scheduled items that produce code.
    pub fn statement_count(&self) -> usize {
        self.schedule
            .items
            .iter()
            .filter(|item| match item {
                ScheduledItem::Fused(_) => true,
                ScheduledItem::Node(id) => self.node(*id).is_some_and(|x| !x.data_inputs().is_empty()),
            })
            .count()
    }
}

/// Prune, order, optionally fuse, and emit the procedure computing `outputs`.
pub fn compile(ctx: &GraphContext, outputs: &[NodeId], options: &CompileOptions) -> Result<CompiledProgram, CompilerError> {
    if options.raw_export {
        return Err(EmitError::RawSchedule.into());
    }
    let ordered = schedule(ctx, outputs, false)?;
    let fused = if options.enable_fusion {
        fuse(ctx, &ordered)
    } else {
        FusedSchedule::unfused(&ordered)
    };
    let module = emit(ctx, &fused, &options.unit_name)?;
    let mut nodes = ordered
        .nodes
        .iter()
        .map(|id| ctx.node(*id).cloned())
        .collect::<Result<Vec<_>, _>>()?;
    nodes.sort_by_key(|x| x.id);
    log::info!(
        "Compiled {} with {} of {} nodes in {} items",
        options.unit_name,
        nodes.len(),
        ctx.nodes().len(),
        fused.items.len()
    );
    Ok(CompiledProgram {
        nodes,
        schedule: fused,
        module,
    })
}

/// [`compile`] for the outputs designated with [`GraphContext::mark_outputs`].
pub fn compile_marked(ctx: &GraphContext, options: &CompileOptions) -> Result<CompiledProgram, CompilerError> {
    compile(ctx, ctx.outputs(), options)
}
