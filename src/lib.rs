//! Traces array expressions into a dataflow graph and compiles the graph into a C procedure
//! loaded back into the process.
//!
//! ```no_run
//! use whisper_jit::{CompileOptions, DType, GraphContext, NumericArray, UnitInstance, build, compile};
//! use whisper_jit::graph::ops::SimpleBinary;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut ctx = GraphContext::default();
//! let a = ctx.create_placeholder("a", vec![2], DType::F64)?;
//! let b = ctx.create_placeholder("b", vec![], DType::F64)?;
//! let sum = SimpleBinary::add(&mut ctx, a, b)?;
//! let program = compile(&ctx, &[sum], &CompileOptions::default())?;
//! let unit = build(&program.module, &Default::default())?;
//! let mut instance = unit.instantiate()?;
//! let out = instance.call(&[NumericArray::from_vec(vec![1.0, 2.0]), NumericArray::from_scalar(2.0)])?;
//! assert_eq!(out[0].try_to_vec::<f64>()?, vec![3.0, 4.0]);
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod codegen;
pub mod compiler;
pub mod config;
pub mod dtype;
pub mod export;
pub mod graph;
pub mod numeric_array;
pub mod tensor_info;

pub use backends::native::{BuildError, BuildOptions, NativeInstance, NativeUnit, build};
pub use backends::reference::{ReferenceInstance, ReferenceUnit};
pub use backends::{RuntimeError, UnitInstance};
pub use compiler::{CompileOptions, CompiledProgram, CompilerError, compile, compile_marked};
pub use dtype::DType;
pub use export::{EdgeKind, GraphExport, export_graph};
pub use graph::{GraphContext, GraphError, NodeId, TraceConfig};
pub use numeric_array::NumericArray;
pub use tensor_info::TensorInfo;
