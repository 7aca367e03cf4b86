use anyhow::Context;
use whisper_jit::backends::native::{BuildOptions, build};
use whisper_jit::backends::reference::ReferenceUnit;
use whisper_jit::{CompileOptions, CompiledProgram, GraphContext, NodeId, NumericArray, UnitInstance, compile};

pub mod operations;
pub mod scenarios;

pub enum Runner {
    Reference,
    Native(BuildOptions),
}

impl Runner {
    pub fn instantiate(&self, program: &CompiledProgram) -> anyhow::Result<Box<dyn UnitInstance>> {
        Ok(match self {
            Runner::Reference => Box::new(ReferenceUnit::new(program).instantiate()),
            Runner::Native(options) => {
                let unit = build(&program.module, options).with_context(|| program.source().to_string())?;
                Box::new(unit.instantiate()?)
            }
        })
    }

    /// Compile with default options and call a fresh instance once.
    pub fn run(&self, ctx: &GraphContext, outputs: &[NodeId], args: &[NumericArray]) -> anyhow::Result<Vec<NumericArray>> {
        let program = compile(ctx, outputs, &CompileOptions::default())?;
        Ok(self.instantiate(&program)?.call(args)?)
    }
}

pub fn test_eq(value: &NumericArray, correct: &NumericArray, atol: f64, rtol: f64) {
    assert_eq!(value.shape(), correct.shape());
    assert_eq!(value.dtype(), correct.dtype());
    let value_vec = value.to_f64_vec();
    let correct_vec = correct.to_f64_vec();
    for i in 0..value_vec.len() {
        let a = value_vec[i];
        let b = correct_vec[i];
        if a.is_nan() && b.is_nan() {
            continue;
        }
        let err = (a - b).abs();
        let limit = atol + rtol * (a.abs().max(b.abs()));
        assert!(err <= limit, "{a} != {b}: {err} > {limit}");
    }
}

pub fn test_eq_f64(value: &NumericArray, correct: &NumericArray) {
    test_eq(value, correct, 1e-12, 1e-12);
}

pub fn test_eq_f32(value: &NumericArray, correct: &NumericArray) {
    test_eq(value, correct, 1e-5, 1.3e-6);
}

pub fn array_f64(shape: &[usize], data: Vec<f64>) -> NumericArray {
    NumericArray::from_shape_vec(shape, data).unwrap()
}
