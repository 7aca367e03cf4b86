use whisper_jit::backends::native::{BuildError, BuildOptions, build};
use whisper_jit::codegen::{EmittedModule, UnitSignature};
use whisper_jit::compiler::fusion::{ScheduledItem, fuse};
use whisper_jit::compiler::scheduler::{ScheduleError, schedule};
use whisper_jit::graph::index::{AxisIndex, IndexSpec};
use whisper_jit::graph::ops::{Concat, Cross, InferError, MatMul, SimpleBinary, SimpleUnary, Slice, Where};
use whisper_jit::{
    CompileOptions, CompilerError, DType, EdgeKind, GraphContext, GraphError, NumericArray, compile, compile_marked,
    export_graph,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn shape_inference_table() {
    init_logging();
    let mut ctx = GraphContext::default();
    let a = ctx.create_placeholder("a", vec![2, 2], DType::F64).unwrap();
    let b = ctx.create_placeholder("b", vec![2, 2], DType::F64).unwrap();
    let s = ctx.create_placeholder("s", vec![], DType::I64).unwrap();
    let m = ctx.create_placeholder("m", vec![2, 3], DType::F64).unwrap();
    let n = ctx.create_placeholder("n", vec![3, 2], DType::F64).unwrap();
    let v = ctx.create_placeholder("v", vec![3], DType::F64).unwrap();

    let sum = SimpleBinary::add(&mut ctx, a, b).unwrap();
    assert_eq!(ctx.node(sum).unwrap().info.shape, vec![2, 2]);
    let scaled = SimpleBinary::add(&mut ctx, a, s).unwrap();
    assert_eq!(ctx.node(scaled).unwrap().info.shape, vec![2, 2]);
    assert_eq!(ctx.node(scaled).unwrap().info.dtype, DType::F64);
    assert!(matches!(
        SimpleBinary::add(&mut ctx, m, n),
        Err(GraphError::Infer(InferError::Shape { .. }))
    ));
    let dot = MatMul::new(&mut ctx, m, n).unwrap();
    assert_eq!(ctx.node(dot).unwrap().info.shape, vec![2, 2]);
    assert!(matches!(
        MatMul::new(&mut ctx, m, m),
        Err(GraphError::Infer(InferError::Shape { .. }))
    ));
    assert!(matches!(
        Slice::new(&mut ctx, v, IndexSpec::new([AxisIndex::at(3)])),
        Err(GraphError::Infer(InferError::Index { .. }))
    ));
    assert!(matches!(
        Slice::new(&mut ctx, v, IndexSpec::new([AxisIndex::at(-1)])),
        Err(GraphError::Infer(InferError::UnsupportedSlice { .. }))
    ));
}

#[test]
fn failed_construction_leaves_context_unchanged() {
    init_logging();
    let mut ctx = GraphContext::default();
    let v3 = ctx.create_placeholder("v3", vec![3], DType::F64).unwrap();
    let v4 = ctx.create_placeholder("v4", vec![4], DType::F64).unwrap();
    let m23 = ctx.create_placeholder("m23", vec![2, 3], DType::F64).unwrap();
    let m32 = ctx.create_placeholder("m32", vec![3, 2], DType::F64).unwrap();
    let cond = ctx.create_placeholder("cond", vec![2], DType::BOOL).unwrap();
    let state = ctx.create_variable("state", NumericArray::zeros(&[4], DType::F64)).unwrap();
    let count = ctx.nodes().len();

    assert!(matches!(
        Cross::new(&mut ctx, v3, v4),
        Err(GraphError::Infer(InferError::Shape { .. }))
    ));
    assert!(matches!(
        Concat::new(&mut ctx, vec![m23, m32], 0),
        Err(GraphError::Infer(InferError::Shape { .. }))
    ));
    assert!(matches!(
        Where::new(&mut ctx, cond, v3, v3),
        Err(GraphError::Infer(InferError::Shape { .. }))
    ));
    let stepped = IndexSpec::new([AxisIndex::Range { start: 0, end: 4, step: 2 }]);
    assert!(matches!(
        Slice::new(&mut ctx, v4, stepped.clone()),
        Err(GraphError::Infer(InferError::UnsupportedSlice { .. }))
    ));
    assert!(matches!(
        ctx.assign_subregion(state, stepped, v4),
        Err(GraphError::Infer(InferError::UnsupportedSlice { .. }))
    ));
    assert!(matches!(
        ctx.assign_subregion(state, IndexSpec::new([AxisIndex::range(0, 2)]), v3),
        Err(GraphError::Infer(InferError::Shape { .. }))
    ));
    assert_eq!(ctx.nodes().len(), count);
    assert!(ctx.control_deps(state).unwrap().is_empty());

    // Still usable, and the failed attempts consumed no names.
    let product = Cross::new(&mut ctx, v3, v3).unwrap();
    assert_eq!(ctx.node(product).unwrap().name, "cross_0");
    let read = SimpleUnary::neg(&mut ctx, state).unwrap();
    assert!(ctx.control_deps(read).unwrap().is_empty());
    let program = compile(&ctx, &[product, read], &CompileOptions::default()).unwrap();
    assert_eq!(program.signature().parameters.len(), 1);
}

fn trace() -> (GraphContext, Vec<whisper_jit::NodeId>) {
    let mut ctx = GraphContext::default();
    let x = ctx.create_placeholder("x", vec![4], DType::F64).unwrap();
    let w = ctx
        .create_variable("w", NumericArray::from_vec(vec![0.5f64, 1.0, 1.5, 2.0]))
        .unwrap();
    ctx.create_constant("unused_table", NumericArray::from_vec(vec![42.0f64; 4]))
        .unwrap();
    let product = SimpleBinary::mul(&mut ctx, x, w).unwrap();
    let bias = ctx.scalar(0.25f64);
    let shifted = SimpleBinary::add(&mut ctx, product, bias).unwrap();
    let out = SimpleUnary::tanh(&mut ctx, shifted).unwrap();
    ctx.mark_outputs(vec![out]).unwrap();
    (ctx, vec![out])
}

#[test]
fn emission_is_deterministic() {
    init_logging();
    let (first, outputs) = trace();
    let (second, _) = trace();
    let a = compile(&first, &outputs, &CompileOptions::default()).unwrap();
    let b = compile_marked(&second, &CompileOptions::default()).unwrap();
    assert_eq!(a.source(), b.source());
    assert_eq!(a.signature(), b.signature());
}

#[test]
fn unreachable_nodes_are_not_emitted() {
    init_logging();
    let (ctx, outputs) = trace();
    let program = compile(&ctx, &outputs, &CompileOptions::default()).unwrap();
    assert!(!program.source().contains("unused_table"));
    assert!(program.source().contains("i_w"));
    assert!(program.nodes.iter().all(|x| x.name != "unused_table"));
}

#[test]
fn unbound_outputs_are_rejected() {
    let (ctx, _) = trace();
    let (_other, other_outputs) = trace();
    assert!(matches!(
        compile(&ctx, &other_outputs, &CompileOptions::default()),
        Err(CompilerError::Schedule(ScheduleError::UnboundOutput(_)))
    ));
    assert!(matches!(
        schedule(&ctx, &other_outputs, false),
        Err(ScheduleError::UnboundOutput(_))
    ));
}

#[test]
fn disjoint_regions_are_not_ordered() {
    let mut ctx = GraphContext::default();
    let v = ctx.create_variable("v", NumericArray::zeros(&[4], DType::F64)).unwrap();
    let head = Slice::new(&mut ctx, v, IndexSpec::new([AxisIndex::range(0, 2)])).unwrap();
    let one = ctx.scalar(1.0f64);
    let tail_write = ctx
        .assign_subregion(v, IndexSpec::new([AxisIndex::range(2, 4)]), one)
        .unwrap();
    let overlapping_write = ctx
        .assign_subregion(v, IndexSpec::new([AxisIndex::range(1, 3)]), one)
        .unwrap();
    assert!(ctx.control_deps(tail_write).unwrap().is_empty());
    assert_eq!(ctx.control_deps(overlapping_write).unwrap(), &[head, tail_write]);
    assert_eq!(ctx.control_deps(head).unwrap(), &[] as &[whisper_jit::NodeId]);
}

#[test]
fn fusion_respects_uses_and_control_edges() {
    let mut ctx = GraphContext::default();
    let x = ctx.create_placeholder("x", vec![3], DType::F64).unwrap();
    let v = ctx.create_variable("v", NumericArray::zeros(&[3], DType::F64)).unwrap();
    let shared = SimpleUnary::exp(&mut ctx, x).unwrap();
    let twice = SimpleBinary::add(&mut ctx, shared, shared).unwrap();
    let read = SimpleUnary::neg(&mut ctx, v).unwrap();
    let sum = SimpleBinary::add(&mut ctx, twice, read).unwrap();
    let write = ctx.assign_subregion(v, IndexSpec::default(), x).unwrap();
    let order = schedule(&ctx, &[sum, write], false).unwrap();
    let fused = fuse(&ctx, &order);

    let roots: Vec<_> = fused.items.iter().map(|x| x.root()).collect();
    // Used twice.
    assert!(roots.contains(&shared));
    // Ordered before the write.
    assert!(roots.contains(&read));
    // Single use without constraints.
    assert!(!roots.contains(&twice));
    assert!(fused.items.iter().any(|item| matches!(item, ScheduledItem::Fused(expr) if expr.root == sum)));
    let read_position = roots.iter().position(|x| *x == read).unwrap();
    let write_position = roots.iter().position(|x| *x == write).unwrap();
    assert!(read_position < write_position);
}

#[test]
fn raw_export_lists_both_edge_kinds() {
    let (mut ctx, outputs) = trace();
    let w = ctx.find("w").unwrap();
    let x = ctx.find("x").unwrap();
    ctx.assign_subregion(w, IndexSpec::default(), x).unwrap();
    let export = export_graph(&ctx, &outputs).unwrap();
    assert_eq!(export.nodes.len(), ctx.nodes().len());
    assert!(export.edges.iter().any(|x| x.kind == EdgeKind::Data));
    assert!(export.edges.iter().any(|x| x.kind == EdgeKind::Control));
    assert!(export.to_dot().starts_with("digraph trace {"));
    let json: serde_json::Value = serde_json::from_str(&export.to_json().unwrap()).unwrap();
    assert_eq!(json["nodes"].as_array().unwrap().len(), ctx.nodes().len());
    assert!(matches!(
        compile(
            &ctx,
            &outputs,
            &CompileOptions {
                raw_export: true,
                ..CompileOptions::default()
            }
        ),
        Err(CompilerError::Emit(_))
    ));
}

#[test]
fn options_load_from_json() {
    let options: CompileOptions = serde_json::from_str(r#"{"enable_fusion": false}"#).unwrap();
    assert!(!options.enable_fusion);
    assert_eq!(options.unit_name, "jit_unit");
    let build: BuildOptions = serde_json::from_str(r#"{"compiler": "clang"}"#).unwrap();
    assert_eq!(build.compiler, "clang");
    assert!(build.flags.contains(&"-fwrapv".to_string()));
}

#[test]
fn toolchain_errors_are_verbatim() {
    init_logging();
    let options = BuildOptions::from_env();
    if !options.compiler_available() {
        log::warn!("Skipping native test: {} is not available", options.compiler);
        return;
    }
    let module = EmittedModule {
        source: "int broken( {\n".to_string(),
        signature: UnitSignature {
            unit_name: "broken".to_string(),
            parameters: vec![],
            outputs: vec![],
            variables: vec![],
        },
    };
    match build(&module, &options) {
        Err(BuildError::Toolchain(stderr)) => assert!(stderr.contains("broken"), "{stderr}"),
        other => panic!("expected a toolchain error, got {other:?}"),
    }
}
