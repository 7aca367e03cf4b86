use crate::backend_tests::{Runner, array_f64, test_eq_f64};
use whisper_jit::graph::index::{AxisIndex, IndexSpec};
use whisper_jit::graph::ops::{Concat, Norm, ReduceSum, SimpleBinary, SimpleUnary, Slice};
use whisper_jit::{CompileOptions, DType, GraphContext, NodeId, NumericArray, compile};

struct WorkedExample {
    ctx: GraphContext,
    out0: NodeId,
    out1: NodeId,
    update: NodeId,
}

/// `op = holder[1, 1] + holder[0:2, 0:2] * variable + 1.5`, followed by `holder[0:2, 0:1] = variable`.
fn worked_example() -> anyhow::Result<WorkedExample> {
    let mut ctx = GraphContext::default();
    let holder = ctx.create_placeholder("holder", vec![3, 3], DType::F64)?;
    let variable = ctx.create_variable("variable", NumericArray::zeros(&[2, 1], DType::F64))?;
    let center = Slice::new(&mut ctx, holder, IndexSpec::new([AxisIndex::at(1), AxisIndex::at(1)]))?;
    let block = Slice::new(
        &mut ctx,
        holder,
        IndexSpec::new([AxisIndex::range(0, 2), AxisIndex::range(0, 2)]),
    )?;
    let scaled = SimpleBinary::mul(&mut ctx, block, variable)?;
    let sum = SimpleBinary::add(&mut ctx, center, scaled)?;
    let offset = ctx.scalar(1.5f64);
    let op = SimpleBinary::add(&mut ctx, sum, offset)?;
    let out0 = Concat::new(&mut ctx, vec![variable, op], 1)?;
    let out1 = Norm::new(&mut ctx, variable)?;
    let update = ctx.assign_subregion(
        holder,
        IndexSpec::new([AxisIndex::range(0, 2), AxisIndex::range(0, 1)]),
        variable,
    )?;
    Ok(WorkedExample {
        ctx,
        out0,
        out1,
        update,
    })
}

pub fn test_worked_example(runner: &Runner) -> anyhow::Result<()> {
    let example = worked_example()?;
    let program = compile(&example.ctx, &[example.out0, example.out1], &CompileOptions::default())?;
    let names: Vec<&str> = program.signature().parameters.iter().map(|x| x.name.as_str()).collect();
    assert_eq!(names, vec!["holder"]);

    let mut instance = runner.instantiate(&program)?;
    instance.set_variable("variable", &array_f64(&[2, 1], vec![1.0, 2.0]))?;
    let out = instance.call(&[array_f64(&[3, 3], vec![1.0; 9])])?;
    test_eq_f64(&out[0], &array_f64(&[2, 3], vec![1.0, 3.5, 3.5, 2.0, 4.5, 4.5]));
    test_eq_f64(&out[1], &NumericArray::from_scalar(2.23606797749979));
    Ok(())
}

pub fn test_worked_example_with_mutation(runner: &Runner) -> anyhow::Result<()> {
    let example = worked_example()?;
    let program = compile(
        &example.ctx,
        &[example.out0, example.out1, example.update],
        &CompileOptions::default(),
    )?;
    let mut instance = runner.instantiate(&program)?;
    instance.set_variable("variable", &array_f64(&[2, 1], vec![1.0, 2.0]))?;
    let out = instance.call(&[array_f64(&[3, 3], vec![1.0; 9])])?;
    // Reads of holder were recorded before the assignment and must not see it.
    test_eq_f64(&out[0], &array_f64(&[2, 3], vec![1.0, 3.5, 3.5, 2.0, 4.5, 4.5]));
    test_eq_f64(
        &out[2],
        &array_f64(&[3, 3], vec![1.0, 1.0, 1.0, 2.0, 1.0, 1.0, 1.0, 1.0, 1.0]),
    );
    Ok(())
}

pub fn test_decorator_add(runner: &Runner) -> anyhow::Result<()> {
    let mut ctx = GraphContext::default();
    let a = ctx.create_placeholder("a", vec![2], DType::F64)?;
    let b = ctx.create_placeholder("b", vec![], DType::F64)?;
    let sum = SimpleBinary::add(&mut ctx, a, b)?;
    let out = runner.run(
        &ctx,
        &[sum],
        &[NumericArray::from_vec(vec![1.0f64, 2.0]), NumericArray::from_scalar(2.0f64)],
    )?;
    test_eq_f64(&out[0], &NumericArray::from_vec(vec![3.0f64, 4.0]));
    Ok(())
}

pub fn test_ordering_correctness(runner: &Runner) -> anyhow::Result<()> {
    let mut ctx = GraphContext::default();
    let v = ctx.create_variable("v", NumericArray::from_vec(vec![1.0f64, 2.0, 3.0, 4.0]))?;
    let head = Slice::new(&mut ctx, v, IndexSpec::new([AxisIndex::range(0, 2)]))?;
    let first = ReduceSum::new(&mut ctx, head)?;
    let ten = ctx.scalar(10.0f64);
    ctx.assign_subregion(v, IndexSpec::new([AxisIndex::range(1, 3)]), ten)?;
    let second = ReduceSum::new(&mut ctx, v)?;
    let program = compile(&ctx, &[first, second], &CompileOptions::default())?;
    let mut instance = runner.instantiate(&program)?;

    let out = instance.call(&[])?;
    test_eq_f64(&out[0], &NumericArray::from_scalar(3.0f64));
    test_eq_f64(&out[1], &NumericArray::from_scalar(25.0f64));

    // The assignment persisted into the variable.
    let out = instance.call(&[])?;
    test_eq_f64(&out[0], &NumericArray::from_scalar(11.0f64));
    test_eq_f64(&instance.get_variable("v")?, &NumericArray::from_vec(vec![1.0f64, 10.0, 10.0, 4.0]));
    Ok(())
}

pub fn test_fusion_transparency(runner: &Runner) -> anyhow::Result<()> {
    let mut ctx = GraphContext::default();
    let x = ctx.create_placeholder("x", vec![5], DType::F64)?;
    let s = SimpleUnary::sin(&mut ctx, x)?;
    let sx = SimpleBinary::mul(&mut ctx, s, x)?;
    let nx = SimpleUnary::neg(&mut ctx, x)?;
    let e = SimpleUnary::exp(&mut ctx, nx)?;
    let one = ctx.scalar(1.0f64);
    let xx = SimpleBinary::mul(&mut ctx, x, x)?;
    let denominator = SimpleBinary::add(&mut ctx, one, xx)?;
    let quotient = SimpleBinary::div(&mut ctx, e, denominator)?;
    let y = SimpleBinary::add(&mut ctx, sx, quotient)?;

    let fused = compile(&ctx, &[y], &CompileOptions::default())?;
    let plain = compile(
        &ctx,
        &[y],
        &CompileOptions {
            enable_fusion: false,
            ..CompileOptions::default()
        },
    )?;
    assert!(fused.statement_count() < plain.statement_count());

    let input = NumericArray::from_vec(vec![-2.0f64, -0.5, 0.0, 0.75, 3.0]);
    let a = runner.instantiate(&fused)?.call(&[input.clone()])?;
    let b = runner.instantiate(&plain)?.call(&[input.clone()])?;
    test_eq_f64(&a[0], &b[0]);

    let expected: Vec<f64> = input
        .try_to_vec::<f64>()?
        .into_iter()
        .map(|x| x.sin() * x + (-x).exp() / (1.0 + x * x))
        .collect();
    test_eq_f64(&a[0], &NumericArray::from_vec(expected));
    Ok(())
}

pub fn test_variable_state(runner: &Runner) -> anyhow::Result<()> {
    let mut ctx = GraphContext::default();
    let acc = ctx.create_variable("acc", NumericArray::zeros(&[2], DType::F64))?;
    let x = ctx.create_placeholder("x", vec![2], DType::F64)?;
    let next = SimpleBinary::add(&mut ctx, acc, x)?;
    let update = ctx.assign_subregion(acc, IndexSpec::default(), next)?;
    let program = compile(&ctx, &[update], &CompileOptions::default())?;
    let mut instance = runner.instantiate(&program)?;
    let step = NumericArray::from_vec(vec![1.0f64, 2.0]);

    instance.call(&[step.clone()])?;
    let out = instance.call(&[step.clone()])?;
    test_eq_f64(&out[0], &NumericArray::from_vec(vec![2.0f64, 4.0]));
    test_eq_f64(&instance.get_variable("acc")?, &NumericArray::from_vec(vec![2.0f64, 4.0]));

    instance.set_variable("acc", &NumericArray::from_vec(vec![-1.0f64, -1.0]))?;
    let out = instance.call(&[step])?;
    test_eq_f64(&out[0], &NumericArray::from_vec(vec![0.0f64, 1.0]));

    assert!(instance.set_variable("acc", &NumericArray::from_vec(vec![1.0f64])).is_err());
    assert!(instance.get_variable("missing").is_err());
    Ok(())
}

pub fn test_mutated_placeholder(runner: &Runner) -> anyhow::Result<()> {
    let mut ctx = GraphContext::default();
    let p = ctx.create_placeholder("p", vec![3], DType::F64)?;
    let five = ctx.scalar(5i64);
    ctx.assign_subregion(p, IndexSpec::new([AxisIndex::at(1)]), five)?;
    let two = ctx.scalar(2.0f64);
    let doubled = SimpleBinary::mul(&mut ctx, p, two)?;
    let input = NumericArray::from_vec(vec![1.0f64, 2.0, 3.0]);
    let out = runner.run(&ctx, &[doubled], &[input.clone()])?;
    test_eq_f64(&out[0], &NumericArray::from_vec(vec![2.0f64, 10.0, 6.0]));
    assert_eq!(input.try_to_vec::<f64>()?, vec![1.0, 2.0, 3.0]);
    Ok(())
}
