//! Derivatives of a pendulum hanging from a massive spring, integrated with RK4 on the host.
//!
//! The state is `z = [theta, theta_dot, x, x_dot]`. Run with `RUST_LOG=debug` to see the passes.

use std::time::Instant;
use whisper_jit::graph::index::{AxisIndex, IndexSpec};
use whisper_jit::graph::ops::{SimpleBinary, SimpleUnary, Slice, Stack};
use whisper_jit::{
    BuildOptions, CompileOptions, CompiledProgram, DType, GraphContext, NodeId, NumericArray, ReferenceUnit,
    UnitInstance, build, compile,
};

const SPRING_MASS: f64 = 1.0;
const SPRING_CONSTANT: f64 = 1.0e3;
const REST_LENGTH: f64 = 3.0e-2;
const MASS: f64 = 1.0;
const GRAVITY: f64 = 9.8;

fn component(ctx: &mut GraphContext, z: NodeId, i: i64) -> anyhow::Result<NodeId> {
    Ok(Slice::new(ctx, z, IndexSpec::new([AxisIndex::at(i)]))?)
}

fn trace_derivative() -> anyhow::Result<CompiledProgram> {
    let mut ctx = GraphContext::default();
    let z = ctx.create_placeholder("z", vec![4], DType::F64)?;
    let theta = component(&mut ctx, z, 0)?;
    let theta_dot = component(&mut ctx, z, 1)?;
    let x = component(&mut ctx, z, 2)?;
    let x_dot = component(&mut ctx, z, 3)?;

    let ratio = (SPRING_MASS / 2.0 + MASS) / (SPRING_MASS / 3.0 + MASS);
    let length = ctx.scalar(REST_LENGTH);
    let stretched = SimpleBinary::add(&mut ctx, length, x)?;

    // -1 / (l + x) * (2 theta_dot x_dot + g ratio sin(theta))
    let two = ctx.scalar(2.0f64);
    let coupling = SimpleBinary::mul(&mut ctx, two, theta_dot)?;
    let coupling = SimpleBinary::mul(&mut ctx, coupling, x_dot)?;
    let sin = SimpleUnary::sin(&mut ctx, theta)?;
    let g_ratio = ctx.scalar(GRAVITY * ratio);
    let torque = SimpleBinary::mul(&mut ctx, g_ratio, sin)?;
    let numerator = SimpleBinary::add(&mut ctx, coupling, torque)?;
    let minus_one = ctx.scalar(-1.0f64);
    let inverse = SimpleBinary::div(&mut ctx, minus_one, stretched)?;
    let theta_ddot = SimpleBinary::mul(&mut ctx, inverse, numerator)?;

    // (l + x) theta_dot^2 + ratio g cos(theta) - k / (m / 3 + M) x
    let squared = SimpleBinary::pow(&mut ctx, theta_dot, two)?;
    let centrifugal = SimpleBinary::mul(&mut ctx, stretched, squared)?;
    let cos = SimpleUnary::cos(&mut ctx, theta)?;
    let gravity = SimpleBinary::mul(&mut ctx, g_ratio, cos)?;
    let stiffness = ctx.scalar(SPRING_CONSTANT / (SPRING_MASS / 3.0 + MASS));
    let restoring = SimpleBinary::mul(&mut ctx, stiffness, x)?;
    let x_ddot = SimpleBinary::add(&mut ctx, centrifugal, gravity)?;
    let x_ddot = SimpleBinary::sub(&mut ctx, x_ddot, restoring)?;

    let derivative = Stack::new(&mut ctx, vec![theta_dot, theta_ddot, x_dot, x_ddot])?;
    Ok(compile(&ctx, &[derivative], &CompileOptions::from_env())?)
}

fn integrate(instance: &mut dyn UnitInstance, initial: &[f64], dt: f64, steps: usize) -> anyhow::Result<Vec<f64>> {
    let mut derivative = |z: &[f64]| -> anyhow::Result<Vec<f64>> {
        let out = instance.call(&[NumericArray::from_vec(z.to_vec())])?;
        Ok(out[0].try_to_vec::<f64>()?)
    };
    let axpy = |z: &[f64], k: &[f64], h: f64| z.iter().zip(k).map(|(a, b)| a + h * b).collect::<Vec<_>>();
    let mut z = initial.to_vec();
    for _ in 0..steps {
        let k1 = derivative(&z)?;
        let k2 = derivative(&axpy(&z, &k1, dt / 2.0))?;
        let k3 = derivative(&axpy(&z, &k2, dt / 2.0))?;
        let k4 = derivative(&axpy(&z, &k3, dt))?;
        for i in 0..z.len() {
            z[i] += dt / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
        }
    }
    Ok(z)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let program = trace_derivative()?;
    let initial = [std::f64::consts::FRAC_PI_2, 0.0, MASS * GRAVITY / SPRING_CONSTANT, 0.0];
    let (dt, steps) = (1.0e-4, 100_000);

    let mut reference = ReferenceUnit::new(&program).instantiate();
    let start = Instant::now();
    let expected = integrate(&mut reference, &initial, dt, steps / 100)?;
    println!("reference: {:?} in {:?} ({} steps)", expected, start.elapsed(), steps / 100);

    let options = BuildOptions::from_env();
    if !options.compiler_available() {
        log::warn!("{} is not available, skipping the native run", options.compiler);
        return Ok(());
    }
    let unit = build(&program.module, &options)?;
    let mut native = unit.instantiate()?;
    let start = Instant::now();
    let short = integrate(&mut native, &initial, dt, steps / 100)?;
    let difference = short.iter().zip(&expected).map(|(a, b)| (a - b).abs()).fold(0.0, f64::max);
    println!("native:    {:?} (max difference {difference:e})", short);
    let state = integrate(&mut native, &initial, dt, steps)?;
    println!("native:    {:?} in {:?} ({steps} steps)", state, start.elapsed());
    Ok(())
}
