use crate::compiler::scheduler::{ScheduleError, schedule};
use crate::dtype::DType;
use crate::graph::ops::Op;
use crate::graph::{GraphContext, GraphError, NodeId, NodeKind};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
pub enum EdgeKind {
    Data,
    Control,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportNode {
    pub id: NodeId,
    pub name: String,
    pub kind: String,
    /// Operation description, e.g. `Add` or `Slice[0:2, 1]`.
    pub label: Option<String>,
    pub shape: Vec<usize>,
    pub dtype: DType,
    pub is_output: bool,
}

/// `from` must execute before `to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphExport {
    /// Every node of the context in execution order.
    pub nodes: Vec<ExportNode>,
    pub edges: Vec<ExportEdge>,
}

/// Describe the whole context, including nodes the outputs do not need.
pub fn export_graph(ctx: &GraphContext, outputs: &[NodeId]) -> Result<GraphExport, ExportError> {
    let order = schedule(ctx, outputs, true)?;
    let mut nodes = vec![];
    let mut edges = vec![];
    for id in &order.nodes {
        let node = ctx.node(*id)?;
        let label = match &node.kind {
            NodeKind::Operation { op, .. } => Some(op.get_name()),
            NodeKind::Mutation { target, index, .. } => Some(format!("{}{index} =", ctx.node(*target)?.name)),
            _ => None,
        };
        nodes.push(ExportNode {
            id: *id,
            name: node.name.clone(),
            kind: node.kind.kind_name().to_string(),
            label,
            shape: node.info.shape.clone(),
            dtype: node.info.dtype,
            is_output: outputs.contains(id),
        });
        edges.extend(node.data_inputs().into_iter().map(|from| ExportEdge {
            from,
            to: *id,
            kind: EdgeKind::Data,
        }));
        edges.extend(ctx.control_deps(*id)?.iter().map(|from| ExportEdge {
            from: *from,
            to: *id,
            kind: EdgeKind::Control,
        }));
    }
    log::debug!("Exported {} nodes and {} edges", nodes.len(), edges.len());
    Ok(GraphExport { nodes, edges })
}

impl GraphExport {
    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Graphviz rendering. Control edges are dashed.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph trace {\n  rankdir=TB;\n");
        for node in &self.nodes {
            let shape = match node.kind.as_str() {
                "placeholder" => "invhouse",
                "variable" => "box3d",
                "constant" => "note",
                "mutation" => "diamond",
                _ => "box",
            };
            let mut text = node.name.clone();
            if let Some(label) = &node.label {
                let _ = write!(text, "\\n{}", label.replace('"', "\\\""));
            }
            let _ = write!(text, "\\n{} {:?}", node.dtype, node.shape);
            let peripheries = if node.is_output { 2 } else { 1 };
            let _ = writeln!(
                out,
                "  n{} [shape={shape}, peripheries={peripheries}, label=\"{text}\"];",
                node.id.index()
            );
        }
        for edge in &self.edges {
            let style = match edge.kind {
                EdgeKind::Data => "solid",
                EdgeKind::Control => "dashed",
            };
            let _ = writeln!(out, "  n{} -> n{} [style={style}];", edge.from.index(), edge.to.index());
        }
        out.push_str("}\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::index::{AxisIndex, IndexSpec};
    use crate::graph::ops::{SimpleBinary, Slice};
    use crate::numeric_array::NumericArray;

    #[test]
    fn both_edge_kinds_are_exported() {
        let mut ctx = GraphContext::default();
        let v = ctx.create_variable("v", NumericArray::from_vec(vec![1.0f64, 2.0])).unwrap();
        let first = Slice::new(&mut ctx, v, IndexSpec::new([AxisIndex::range(0, 1)])).unwrap();
        let update = ctx.assign_subregion(v, IndexSpec::new([AxisIndex::range(0, 1)]), first).unwrap();
        let unused = ctx.scalar(5.0f64);
        let out = SimpleBinary::add(&mut ctx, v, v).unwrap();
        let export = export_graph(&ctx, &[out]).unwrap();
        assert_eq!(export.nodes.len(), 5);
        assert!(export.nodes.iter().any(|x| x.id == unused));
        assert!(export.edges.contains(&ExportEdge {
            from: first,
            to: update,
            kind: EdgeKind::Control
        }));
        assert!(export.edges.contains(&ExportEdge {
            from: update,
            to: out,
            kind: EdgeKind::Control
        }));
        let dot = export.to_dot();
        assert!(dot.contains("style=dashed"));
        assert!(dot.contains("style=solid"));
        assert!(export.to_json().unwrap().contains("\"Control\""));
    }
}
