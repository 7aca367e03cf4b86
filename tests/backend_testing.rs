use paste::paste;
use std::sync::Once;
use whisper_jit::BuildOptions;
mod backend_tests;
use backend_tests::Runner;
use backend_tests::operations::*;
use backend_tests::scenarios::*;

static INIT: Once = Once::new();

fn init_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

fn run_reference_test(test: impl FnOnce(&Runner) -> anyhow::Result<()>) {
    init_logging();
    test(&Runner::Reference).unwrap()
}

fn run_native_test(test: impl FnOnce(&Runner) -> anyhow::Result<()>) {
    init_logging();
    let options = BuildOptions::from_env();
    if !options.compiler_available() {
        log::warn!("Skipping native test: {} is not available", options.compiler);
        return;
    }
    test(&Runner::Native(options)).unwrap()
}

macro_rules! do_test {
    ($runner_fn:expr, $runner_name:ident, $test_name:ident) => {
        paste! {
            #[allow(non_snake_case)]
            #[test]
            fn [<$runner_name _ $test_name>]() {
                $runner_fn($test_name);
            }
        }
    };
}

macro_rules! do_tests {
    ($runner_fn:expr, $runner_name:ident) => {
        do_test!($runner_fn, $runner_name, test_worked_example);
        do_test!($runner_fn, $runner_name, test_worked_example_with_mutation);
        do_test!($runner_fn, $runner_name, test_decorator_add);
        do_test!($runner_fn, $runner_name, test_ordering_correctness);
        do_test!($runner_fn, $runner_name, test_fusion_transparency);
        do_test!($runner_fn, $runner_name, test_variable_state);
        do_test!($runner_fn, $runner_name, test_mutated_placeholder);
        do_test!($runner_fn, $runner_name, test_matmul);
        do_test!($runner_fn, $runner_name, test_cross);
        do_test!($runner_fn, $runner_name, test_reductions);
        do_test!($runner_fn, $runner_name, test_selection);
        do_test!($runner_fn, $runner_name, test_concat_and_stack);
        do_test!($runner_fn, $runner_name, test_integer_arithmetic);
        do_test!($runner_fn, $runner_name, test_integer_overflow_wraps);
        do_test!($runner_fn, $runner_name, test_unary_math);
        do_test!($runner_fn, $runner_name, test_logic);
        do_test!($runner_fn, $runner_name, test_single_precision);
    };
}

do_tests!(run_reference_test, reference);
do_tests!(run_native_test, native);
