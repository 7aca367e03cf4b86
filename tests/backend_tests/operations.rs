use crate::backend_tests::{Runner, array_f64, test_eq_f32, test_eq_f64};
use whisper_jit::graph::ops::{
    Cast, Concat, Cross, MatMul, Norm, NormOrd, ReduceSum, SimpleBinary, SimpleUnary, Stack, Transpose, Where,
};
use whisper_jit::{DType, GraphContext, NumericArray, TraceConfig};

pub fn test_matmul(runner: &Runner) -> anyhow::Result<()> {
    let mut ctx = GraphContext::default();
    let a = ctx.create_placeholder("a", vec![2, 3], DType::F64)?;
    let b = ctx.create_placeholder("b", vec![3, 2], DType::F64)?;
    let ones = ctx.create_constant("ones", NumericArray::from_vec(vec![1.0f64; 3]))?;
    let mm = MatMul::new(&mut ctx, a, b)?;
    let mv = MatMul::new(&mut ctx, a, ones)?;
    let vv = MatMul::new(&mut ctx, ones, ones)?;
    let t = Transpose::new(&mut ctx, a)?;
    let out = runner.run(
        &ctx,
        &[mm, mv, vv, t],
        &[
            array_f64(&[2, 3], vec![1.0, -2.5, 3.0, 4.0, 0.5, -1.0]),
            array_f64(&[3, 2], vec![1.0, 2.0, 0.25, -0.75, 3.5, 0.0]),
        ],
    )?;
    test_eq_f64(&out[0], &array_f64(&[2, 2], vec![10.875, 3.875, 0.625, 7.625]));
    test_eq_f64(&out[1], &NumericArray::from_vec(vec![1.5f64, 3.5]));
    test_eq_f64(&out[2], &NumericArray::from_scalar(3.0f64));
    test_eq_f64(&out[3], &array_f64(&[3, 2], vec![1.0, 4.0, -2.5, 0.5, 3.0, -1.0]));
    Ok(())
}

pub fn test_cross(runner: &Runner) -> anyhow::Result<()> {
    let mut ctx = GraphContext::default();
    let a = ctx.create_placeholder("a", vec![3], DType::F64)?;
    let b = ctx.create_placeholder("b", vec![3], DType::F64)?;
    let c = Cross::new(&mut ctx, a, b)?;
    let out = runner.run(
        &ctx,
        &[c],
        &[
            NumericArray::from_vec(vec![1.0f64, 2.0, 3.0]),
            NumericArray::from_vec(vec![4.0f64, 5.0, 6.0]),
        ],
    )?;
    test_eq_f64(&out[0], &NumericArray::from_vec(vec![-3.0f64, 6.0, -3.0]));
    Ok(())
}

pub fn test_reductions(runner: &Runner) -> anyhow::Result<()> {
    let mut ctx = GraphContext::default();
    let x = ctx.create_placeholder("x", vec![2], DType::F64)?;
    let m = ctx.create_placeholder("m", vec![2, 2], DType::F64)?;
    let i = ctx.create_placeholder("i", vec![3], DType::I64)?;
    let flags = ctx.create_placeholder("flags", vec![3], DType::BOOL)?;
    let outputs = vec![
        ReduceSum::new(&mut ctx, x)?,
        Norm::new(&mut ctx, x)?,
        Norm::with_ord(&mut ctx, x, NormOrd::One)?,
        Norm::with_ord(&mut ctx, x, NormOrd::Inf)?,
        Norm::new(&mut ctx, m)?,
        ReduceSum::new(&mut ctx, i)?,
        ReduceSum::new(&mut ctx, flags)?,
        Norm::new(&mut ctx, i)?,
    ];
    let out = runner.run(
        &ctx,
        &outputs,
        &[
            NumericArray::from_vec(vec![3.0f64, -4.0]),
            array_f64(&[2, 2], vec![1.0, 2.0, 2.0, 4.0]),
            NumericArray::from_vec(vec![1i64, 2, 3]),
            NumericArray::from_vec(vec![true, false, true]),
        ],
    )?;
    test_eq_f64(&out[0], &NumericArray::from_scalar(-1.0f64));
    test_eq_f64(&out[1], &NumericArray::from_scalar(5.0f64));
    test_eq_f64(&out[2], &NumericArray::from_scalar(7.0f64));
    test_eq_f64(&out[3], &NumericArray::from_scalar(4.0f64));
    test_eq_f64(&out[4], &NumericArray::from_scalar(5.0f64));
    assert_eq!(out[5], NumericArray::from_scalar(6i64));
    assert_eq!(out[6], NumericArray::from_scalar(2i64));
    test_eq_f64(&out[7], &NumericArray::from_scalar(14.0f64.sqrt()));
    Ok(())
}

pub fn test_selection(runner: &Runner) -> anyhow::Result<()> {
    let mut ctx = GraphContext::default();
    let x = ctx.create_placeholder("x", vec![3], DType::F64)?;
    let y = ctx.create_placeholder("y", vec![3], DType::I64)?;
    let less = SimpleBinary::less(&mut ctx, x, y)?;
    let picked = Where::new(&mut ctx, less, x, y)?;
    let max = SimpleBinary::max(&mut ctx, x, y)?;
    let equal = SimpleBinary::equal(&mut ctx, x, y)?;
    let zero = ctx.scalar(0.0f64);
    let clipped = Where::new(&mut ctx, equal, zero, x)?;
    let out = runner.run(
        &ctx,
        &[less, picked, max, clipped],
        &[
            NumericArray::from_vec(vec![1.0f64, 5.0, 3.0]),
            NumericArray::from_vec(vec![4i64, 2, 3]),
        ],
    )?;
    assert_eq!(out[0], NumericArray::from_vec(vec![true, false, false]));
    test_eq_f64(&out[1], &NumericArray::from_vec(vec![1.0f64, 2.0, 3.0]));
    test_eq_f64(&out[2], &NumericArray::from_vec(vec![4.0f64, 5.0, 3.0]));
    test_eq_f64(&out[3], &NumericArray::from_vec(vec![1.0f64, 5.0, 0.0]));
    Ok(())
}

pub fn test_concat_and_stack(runner: &Runner) -> anyhow::Result<()> {
    let mut ctx = GraphContext::default();
    let a = ctx.create_placeholder("a", vec![2, 1], DType::F64)?;
    let b = ctx.create_placeholder("b", vec![2, 2], DType::I64)?;
    let side = Concat::new(&mut ctx, vec![a, b], 1)?;
    let row = ctx.create_constant("row", NumericArray::from_shape_vec(&[1, 2], vec![9i64, 8])?)?;
    let below = Concat::new(&mut ctx, vec![b, row], 0)?;
    let c = ctx.create_placeholder("c", vec![2], DType::F64)?;
    let stacked = Stack::new(&mut ctx, vec![c, c])?;
    let out = runner.run(
        &ctx,
        &[side, below, stacked],
        &[
            array_f64(&[2, 1], vec![1.0, 2.0]),
            NumericArray::from_shape_vec(&[2, 2], vec![3i64, 4, 5, 6])?,
            NumericArray::from_vec(vec![0.5f64, -0.5]),
        ],
    )?;
    test_eq_f64(&out[0], &array_f64(&[2, 3], vec![1.0, 3.0, 4.0, 2.0, 5.0, 6.0]));
    assert_eq!(out[1], NumericArray::from_shape_vec(&[3, 2], vec![3i64, 4, 5, 6, 9, 8])?);
    test_eq_f64(&out[2], &array_f64(&[2, 2], vec![0.5, -0.5, 0.5, -0.5]));
    Ok(())
}

pub fn test_integer_arithmetic(runner: &Runner) -> anyhow::Result<()> {
    let mut ctx = GraphContext::default();
    let a = ctx.create_placeholder("a", vec![4], DType::I64)?;
    let b = ctx.create_placeholder("b", vec![4], DType::I64)?;
    let f = ctx.create_placeholder("f", vec![2], DType::F64)?;
    let two = ctx.scalar(2.0f64);
    let outputs = vec![
        SimpleBinary::modulo(&mut ctx, a, b)?,
        SimpleBinary::div(&mut ctx, a, b)?,
        SimpleBinary::sub(&mut ctx, a, b)?,
        SimpleUnary::abs(&mut ctx, a)?,
        SimpleBinary::modulo(&mut ctx, f, two)?,
        SimpleBinary::pow(&mut ctx, f, two)?,
    ];
    let out = runner.run(
        &ctx,
        &outputs,
        &[
            NumericArray::from_vec(vec![7i64, -7, 7, -7]),
            NumericArray::from_vec(vec![3i64, 3, -3, -3]),
            NumericArray::from_vec(vec![7.5f64, -7.5]),
        ],
    )?;
    assert_eq!(out[0], NumericArray::from_vec(vec![1i64, 2, -2, -1]));
    test_eq_f64(
        &out[1],
        &NumericArray::from_vec(vec![7.0 / 3.0, -7.0 / 3.0, -7.0 / 3.0, 7.0 / 3.0]),
    );
    assert_eq!(out[2], NumericArray::from_vec(vec![4i64, -10, 10, -4]));
    assert_eq!(out[3], NumericArray::from_vec(vec![7i64, 7, 7, 7]));
    test_eq_f64(&out[4], &NumericArray::from_vec(vec![1.5f64, 0.5]));
    test_eq_f64(&out[5], &NumericArray::from_vec(vec![56.25f64, 56.25]));
    Ok(())
}

pub fn test_integer_overflow_wraps(runner: &Runner) -> anyhow::Result<()> {
    let mut ctx = GraphContext::default();
    let a = ctx.create_placeholder("a", vec![2], DType::I64)?;
    let b = ctx.create_placeholder("b", vec![2], DType::I64)?;
    let x = ctx.create_placeholder("x", vec![3], DType::I64)?;
    let y = ctx.create_placeholder("y", vec![3], DType::I64)?;
    let outputs = vec![MatMul::new(&mut ctx, a, b)?, Cross::new(&mut ctx, x, y)?];
    let out = runner.run(
        &ctx,
        &outputs,
        &[
            NumericArray::from_vec(vec![i64::MAX, 1]),
            NumericArray::from_vec(vec![2i64, 0]),
            NumericArray::from_vec(vec![i64::MAX, 2, 0]),
            NumericArray::from_vec(vec![1i64, i64::MAX, 0]),
        ],
    )?;
    assert_eq!(out[0], NumericArray::from_scalar(i64::MAX.wrapping_mul(2)));
    assert_eq!(
        out[1],
        NumericArray::from_vec(vec![0i64, 0, i64::MAX.wrapping_mul(i64::MAX).wrapping_sub(2)])
    );
    Ok(())
}

pub fn test_unary_math(runner: &Runner) -> anyhow::Result<()> {
    let mut ctx = GraphContext::default();
    let x = ctx.create_placeholder("x", vec![3], DType::F64)?;
    let outputs = vec![
        SimpleUnary::sqrt(&mut ctx, x)?,
        SimpleUnary::exp(&mut ctx, x)?,
        SimpleUnary::ln(&mut ctx, x)?,
        SimpleUnary::tan(&mut ctx, x)?,
        SimpleUnary::asin(&mut ctx, x)?,
        SimpleUnary::acos(&mut ctx, x)?,
        SimpleUnary::atan(&mut ctx, x)?,
        SimpleUnary::sinh(&mut ctx, x)?,
        SimpleUnary::cosh(&mut ctx, x)?,
        SimpleUnary::tanh(&mut ctx, x)?,
        SimpleUnary::floor(&mut ctx, x)?,
        SimpleUnary::ceil(&mut ctx, x)?,
        SimpleUnary::cos(&mut ctx, x)?,
    ];
    let input = vec![0.25f64, 0.5, 0.75];
    let out = runner.run(&ctx, &outputs, &[NumericArray::from_vec(input.clone())])?;
    let functions: [fn(f64) -> f64; 13] = [
        f64::sqrt,
        f64::exp,
        f64::ln,
        f64::tan,
        f64::asin,
        f64::acos,
        f64::atan,
        f64::sinh,
        f64::cosh,
        f64::tanh,
        f64::floor,
        f64::ceil,
        f64::cos,
    ];
    for (value, function) in out.iter().zip(functions) {
        let expected: Vec<f64> = input.iter().map(|x| function(*x)).collect();
        test_eq_f64(value, &NumericArray::from_vec(expected));
    }
    Ok(())
}

pub fn test_logic(runner: &Runner) -> anyhow::Result<()> {
    let mut ctx = GraphContext::default();
    let p = ctx.create_placeholder("p", vec![4], DType::BOOL)?;
    let q = ctx.create_placeholder("q", vec![4], DType::BOOL)?;
    let outputs = vec![
        SimpleBinary::and(&mut ctx, p, q)?,
        SimpleBinary::or(&mut ctx, p, q)?,
        SimpleBinary::xor(&mut ctx, p, q)?,
        SimpleUnary::not(&mut ctx, p)?,
        Cast::new(&mut ctx, q, DType::F64)?,
        SimpleBinary::add(&mut ctx, p, q)?,
    ];
    let out = runner.run(
        &ctx,
        &outputs,
        &[
            NumericArray::from_vec(vec![true, true, false, false]),
            NumericArray::from_vec(vec![true, false, true, false]),
        ],
    )?;
    assert_eq!(out[0], NumericArray::from_vec(vec![true, false, false, false]));
    assert_eq!(out[1], NumericArray::from_vec(vec![true, true, true, false]));
    assert_eq!(out[2], NumericArray::from_vec(vec![false, true, true, false]));
    assert_eq!(out[3], NumericArray::from_vec(vec![false, false, true, true]));
    test_eq_f64(&out[4], &NumericArray::from_vec(vec![1.0f64, 0.0, 1.0, 0.0]));
    assert_eq!(out[5], NumericArray::from_vec(vec![2i64, 1, 1, 0]));
    Ok(())
}

pub fn test_single_precision(runner: &Runner) -> anyhow::Result<()> {
    let mut ctx = GraphContext::new(TraceConfig { float_dtype: DType::F32 });
    let i = ctx.create_placeholder("i", vec![3], DType::I64)?;
    let x = ctx.create_placeholder("x", vec![3], DType::F32)?;
    let root = SimpleUnary::sqrt(&mut ctx, i)?;
    let half = ctx.scalar(0.5f32);
    let scaled = SimpleBinary::mul(&mut ctx, x, half)?;
    let sum = SimpleBinary::add(&mut ctx, root, scaled)?;
    let out = runner.run(
        &ctx,
        &[sum],
        &[
            NumericArray::from_vec(vec![1i64, 4, 9]),
            NumericArray::from_vec(vec![2.0f32, 3.0, -1.0]),
        ],
    )?;
    test_eq_f32(&out[0], &NumericArray::from_vec(vec![2.0f32, 3.5, 2.5]));
    Ok(())
}
