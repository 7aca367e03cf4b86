//! Builds emitted units with the system C compiler and runs them in-process.

use crate::backends::{RuntimeError, UnitInstance, check_arguments, check_value};
use crate::codegen::{ArraySignature, EmittedModule, UnitSignature};
use crate::config;
use crate::dtype::DType;
use crate::graph::ops::EvalError;
use crate::numeric_array::NumericArray;
use libloading::{Library, Symbol};
use serde::{Deserialize, Serialize};
use std::ffi::{c_int, c_void};
use std::fs;
use std::path::Path;
use std::process::Command;
use std::ptr::NonNull;
use std::sync::Arc;
use tempfile::TempDir;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("C compiler failed:\n{0}")]
    Toolchain(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Load(#[from] libloading::Error),
    #[error("Symbol {0} is missing from the built library")]
    MissingSymbol(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    pub compiler: String,
    /// Passed before the source file; `-shared -fPIC` and the math library are always added.
    pub flags: Vec<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            compiler: "cc".to_string(),
            flags: vec!["-O2".to_string(), "-fwrapv".to_string(), "-ffp-contract=off".to_string()],
        }
    }
}

impl BuildOptions {
    /// Defaults overridden by `CC` and `WHISPER_JIT_CFLAGS`.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Some(compiler) = config::env_string("CC") {
            options.compiler = compiler;
        }
        if let Some(flags) = config::env_list("WHISPER_JIT_CFLAGS") {
            options.flags = flags;
        }
        options
    }

    /// Whether the configured compiler can be started at all.
    pub fn compiler_available(&self) -> bool {
        Command::new(&self.compiler)
            .arg("--version")
            .output()
            .is_ok_and(|x| x.status.success())
    }

    fn args(&self, source: &Path, output: &Path) -> Vec<String> {
        let mut args = self.flags.clone();
        args.extend(["-shared".to_string(), "-fPIC".to_string(), "-o".to_string()]);
        args.push(output.to_string_lossy().to_string());
        args.push(source.to_string_lossy().to_string());
        args.push("-lm".to_string());
        args
    }
}

fn lib_extension() -> &'static str {
    #[cfg(target_os = "macos")]
    {
        "dylib"
    }
    #[cfg(target_os = "windows")]
    {
        "dll"
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        "so"
    }
}

type NewFn = unsafe extern "C" fn() -> *mut c_void;
type FreeFn = unsafe extern "C" fn(*mut c_void);
type VariableDataFn = unsafe extern "C" fn(*mut c_void, usize) -> *mut c_void;
type CallFn = unsafe extern "C" fn(*mut c_void, *const *const c_void, usize, *const *mut c_void, usize) -> c_int;

#[derive(Clone, Copy)]
struct UnitApi {
    new: NewFn,
    free: FreeFn,
    variable_data: VariableDataFn,
    call: CallFn,
}

fn resolve<T: Copy>(library: &Library, signature: &UnitSignature, suffix: &str) -> Result<T, BuildError> {
    let name = signature.symbol(suffix);
    let symbol: Symbol<T> = unsafe { library.get(name.as_bytes()) }.map_err(|_| BuildError::MissingSymbol(name))?;
    Ok(*symbol)
}

/// A loaded shared library holding one emitted unit.
pub struct NativeUnit {
    api: UnitApi,
    signature: UnitSignature,
    library: Arc<Library>,
    _dir: TempDir,
}

impl std::fmt::Debug for NativeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeUnit").field("signature", &self.signature).finish()
    }
}

/// Compile `module` into a shared library and load it.
///
/// Compiler diagnostics are returned verbatim in [`BuildError::Toolchain`].
pub fn build(module: &EmittedModule, options: &BuildOptions) -> Result<NativeUnit, BuildError> {
    let signature = module.signature.clone();
    let dir = TempDir::new()?;
    let source_path = dir.path().join(format!("{}.c", signature.unit_name));
    let lib_path = dir
        .path()
        .join(format!("lib{}.{}", signature.unit_name, lib_extension()));
    fs::write(&source_path, &module.source)?;

    let args = options.args(&source_path, &lib_path);
    log::debug!("Running {} {}", options.compiler, args.join(" "));
    let output = Command::new(&options.compiler)
        .args(&args)
        .output()
        .map_err(|e| BuildError::Toolchain(format!("failed to run {}: {e}", options.compiler)))?;
    if !output.status.success() {
        return Err(BuildError::Toolchain(String::from_utf8_lossy(&output.stderr).to_string()));
    }

    let library = unsafe { Library::new(&lib_path) }?;
    let api = UnitApi {
        new: resolve(&library, &signature, "new")?,
        free: resolve(&library, &signature, "free")?,
        variable_data: resolve(&library, &signature, "variable_data")?,
        call: resolve(&library, &signature, "call")?,
    };
    log::info!(
        "Built {} with {} ({} bytes of source)",
        signature.unit_name,
        options.compiler,
        module.source.len()
    );
    Ok(NativeUnit {
        api,
        signature,
        library: Arc::new(library),
        _dir: dir,
    })
}

impl NativeUnit {
    pub fn signature(&self) -> &UnitSignature {
        &self.signature
    }

    /// Allocate a fresh state with every variable at its initial value.
    pub fn instantiate(&self) -> Result<NativeInstance, RuntimeError> {
        let state = NonNull::new(unsafe { (self.api.new)() }).ok_or(RuntimeError::NullState)?;
        Ok(NativeInstance {
            api: self.api,
            signature: self.signature.clone(),
            state,
            _library: self.library.clone(),
        })
    }
}

/// Owns one native state. Not `Send` or `Sync`; callers sharing it must serialize access.
pub struct NativeInstance {
    api: UnitApi,
    signature: UnitSignature,
    state: NonNull<c_void>,
    _library: Arc<Library>,
}

impl Drop for NativeInstance {
    fn drop(&mut self) {
        unsafe { (self.api.free)(self.state.as_ptr()) }
    }
}

/// Contiguous host copy of an array in its C element type.
enum HostBuffer {
    F64(Vec<f64>),
    F32(Vec<f32>),
    I64(Vec<i64>),
    U8(Vec<u8>),
}

impl HostBuffer {
    fn from_array(value: &NumericArray) -> Result<Self, RuntimeError> {
        let buffer = match value.dtype() {
            DType::F64 => HostBuffer::F64(value.try_to_vec().map_err(EvalError::from)?),
            DType::F32 => HostBuffer::F32(value.try_to_vec().map_err(EvalError::from)?),
            DType::I64 => HostBuffer::I64(value.try_to_vec().map_err(EvalError::from)?),
            DType::BOOL => HostBuffer::U8(
                value
                    .try_to_vec::<bool>()
                    .map_err(EvalError::from)?
                    .into_iter()
                    .map(u8::from)
                    .collect(),
            ),
        };
        Ok(buffer)
    }

    /// At least one element so the pointer handed to C is always backed by memory.
    fn zeroed(signature: &ArraySignature) -> Self {
        let n = signature.num_elements().max(1);
        match signature.dtype {
            DType::F64 => HostBuffer::F64(vec![0.0; n]),
            DType::F32 => HostBuffer::F32(vec![0.0; n]),
            DType::I64 => HostBuffer::I64(vec![0; n]),
            DType::BOOL => HostBuffer::U8(vec![0; n]),
        }
    }

    /// Copy `signature.num_elements()` elements starting at `ptr`.
    ///
    /// # Safety
    /// `ptr` must point to that many initialized elements of the signature's C type.
    unsafe fn copy_from(ptr: *const c_void, signature: &ArraySignature) -> Self {
        let n = signature.num_elements();
        unsafe {
            match signature.dtype {
                DType::F64 => HostBuffer::F64(std::slice::from_raw_parts(ptr as *const f64, n).to_vec()),
                DType::F32 => HostBuffer::F32(std::slice::from_raw_parts(ptr as *const f32, n).to_vec()),
                DType::I64 => HostBuffer::I64(std::slice::from_raw_parts(ptr as *const i64, n).to_vec()),
                DType::BOOL => HostBuffer::U8(std::slice::from_raw_parts(ptr as *const u8, n).to_vec()),
            }
        }
    }

    fn as_ptr(&self) -> *const c_void {
        match self {
            HostBuffer::F64(x) => x.as_ptr() as *const c_void,
            HostBuffer::F32(x) => x.as_ptr() as *const c_void,
            HostBuffer::I64(x) => x.as_ptr() as *const c_void,
            HostBuffer::U8(x) => x.as_ptr() as *const c_void,
        }
    }

    fn as_mut_ptr(&mut self) -> *mut c_void {
        match self {
            HostBuffer::F64(x) => x.as_mut_ptr() as *mut c_void,
            HostBuffer::F32(x) => x.as_mut_ptr() as *mut c_void,
            HostBuffer::I64(x) => x.as_mut_ptr() as *mut c_void,
            HostBuffer::U8(x) => x.as_mut_ptr() as *mut c_void,
        }
    }

    fn into_array(self, shape: &[usize]) -> Result<NumericArray, RuntimeError> {
        let n: usize = shape.iter().product();
        let array = match self {
            HostBuffer::F64(mut x) => {
                x.truncate(n);
                NumericArray::from_shape_vec(shape, x)
            }
            HostBuffer::F32(mut x) => {
                x.truncate(n);
                NumericArray::from_shape_vec(shape, x)
            }
            HostBuffer::I64(mut x) => {
                x.truncate(n);
                NumericArray::from_shape_vec(shape, x)
            }
            HostBuffer::U8(x) => NumericArray::from_shape_vec(shape, x.into_iter().take(n).map(|v| v != 0).collect()),
        };
        Ok(array.map_err(EvalError::from)?)
    }
}

impl NativeInstance {
    fn variable_ptr(&self, name: &str) -> Result<(*mut c_void, &ArraySignature), RuntimeError> {
        let (index, signature) = self
            .signature
            .variable(name)
            .ok_or_else(|| RuntimeError::UnknownVariable(name.to_string()))?;
        let ptr = unsafe { (self.api.variable_data)(self.state.as_ptr(), index) };
        if ptr.is_null() {
            return Err(RuntimeError::UnknownVariable(name.to_string()));
        }
        Ok((ptr, signature))
    }
}

impl UnitInstance for NativeInstance {
    fn signature(&self) -> &UnitSignature {
        &self.signature
    }

    fn get_variable(&self, name: &str) -> Result<NumericArray, RuntimeError> {
        let (ptr, signature) = self.variable_ptr(name)?;
        let buffer = unsafe { HostBuffer::copy_from(ptr, signature) };
        buffer.into_array(&signature.shape)
    }

    fn set_variable(&mut self, name: &str, value: &NumericArray) -> Result<(), RuntimeError> {
        let (ptr, signature) = self.variable_ptr(name)?;
        check_value(signature, value)?;
        let buffer = HostBuffer::from_array(value)?;
        unsafe { std::ptr::copy_nonoverlapping(buffer.as_ptr() as *const u8, ptr as *mut u8, signature.byte_len()) };
        Ok(())
    }

    fn call(&mut self, args: &[NumericArray]) -> Result<Vec<NumericArray>, RuntimeError> {
        check_arguments(&self.signature, args)?;
        let inputs = args.iter().map(HostBuffer::from_array).collect::<Result<Vec<_>, _>>()?;
        let mut outputs = self.signature.outputs.iter().map(HostBuffer::zeroed).collect::<Vec<_>>();
        let input_ptrs = inputs.iter().map(|x| x.as_ptr()).collect::<Vec<_>>();
        let output_ptrs = outputs.iter_mut().map(|x| x.as_mut_ptr()).collect::<Vec<_>>();

        let status = unsafe {
            (self.api.call)(
                self.state.as_ptr(),
                input_ptrs.as_ptr(),
                input_ptrs.len(),
                output_ptrs.as_ptr(),
                output_ptrs.len(),
            )
        };
        if status != 0 {
            return Err(RuntimeError::NativeCall(status));
        }
        outputs
            .into_iter()
            .zip(self.signature.outputs.iter())
            .map(|(buffer, signature)| buffer.into_array(&signature.shape))
            .collect()
    }
}
