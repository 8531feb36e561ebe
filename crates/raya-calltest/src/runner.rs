//! Entry providers
//!
//! [`CodeRunner`] calls an existing code object. [`GeneratorRunner`] asks a
//! [`CodeGenerator`] for its code object the first time an entry is needed.
//! Both read the code object's entry on every call, so a regenerated object
//! is picked up by the next call.

use std::fmt;
use std::marker::PhantomData;

use log::debug;
use once_cell::unsync::OnceCell;

use crate::call::{CallHelper, CallResult};
use crate::code::{Address, CodeHandle, IntoCodeHandle};
use crate::context::ExecutionContext;
use crate::error::CodegenError;
use crate::signature::MachineSignature;

/// Calls a generated code object with the C calling convention
pub struct CodeRunner<'a, R> {
    context: &'a ExecutionContext,
    signature: &'a MachineSignature,
    code: CodeHandle,
    _result: PhantomData<fn() -> R>,
}

impl<'a, R: CallResult> CodeRunner<'a, R> {
    /// Create a runner for `code`, accepting either a [`CodeHandle`] or a
    /// [`CodeWrapper`](crate::CodeWrapper).
    ///
    /// # Safety
    ///
    /// The code object's entry must implement `signature` under the C calling
    /// convention, now and after any regeneration.
    pub unsafe fn new(
        context: &'a ExecutionContext,
        code: impl IntoCodeHandle,
        signature: &'a MachineSignature,
    ) -> Self {
        let code = code.into_code_handle();
        debug!("runner for '{}' {} at {}", code.name(), signature, code.entry());
        CodeRunner {
            context,
            signature,
            code,
            _result: PhantomData,
        }
    }

    /// The code object being called
    pub fn code(&self) -> &CodeHandle {
        &self.code
    }
}

unsafe impl<R: CallResult> CallHelper<R> for CodeRunner<'_, R> {
    fn context(&self) -> &ExecutionContext {
        self.context
    }

    fn signature(&self) -> &MachineSignature {
        self.signature
    }

    fn resolve_entry(&self) -> Address {
        self.code.entry()
    }
}

impl<R> fmt::Debug for CodeRunner<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeRunner")
            .field("signature", &self.signature.to_string())
            .field("code", &self.code)
            .finish()
    }
}

/// Produces a code object implementing a signature on demand
pub trait CodeGenerator {
    /// Generate code for `signature`
    fn generate(
        &self,
        context: &ExecutionContext,
        signature: &MachineSignature,
    ) -> Result<CodeHandle, CodegenError>;
}

impl<F> CodeGenerator for F
where
    F: Fn(&ExecutionContext, &MachineSignature) -> Result<CodeHandle, CodegenError>,
{
    fn generate(
        &self,
        context: &ExecutionContext,
        signature: &MachineSignature,
    ) -> Result<CodeHandle, CodegenError> {
        self(context, signature)
    }
}

/// Calls code that is generated the first time an entry is requested
pub struct GeneratorRunner<'a, R, G> {
    context: &'a ExecutionContext,
    signature: &'a MachineSignature,
    generator: G,
    code: OnceCell<CodeHandle>,
    _result: PhantomData<fn() -> R>,
}

impl<'a, R: CallResult, G: CodeGenerator> GeneratorRunner<'a, R, G> {
    /// Create a runner that generates its code lazily.
    ///
    /// # Safety
    ///
    /// Code returned by `generator` must implement `signature` under the C
    /// calling convention.
    pub unsafe fn new(
        context: &'a ExecutionContext,
        generator: G,
        signature: &'a MachineSignature,
    ) -> Self {
        GeneratorRunner {
            context,
            signature,
            generator,
            code: OnceCell::new(),
            _result: PhantomData,
        }
    }

    /// Generate the code now if it has not been generated yet
    pub fn try_code(&self) -> Result<&CodeHandle, CodegenError> {
        self.code.get_or_try_init(|| {
            debug!("generating code for {}", self.signature);
            self.generator.generate(self.context, self.signature)
        })
    }

    /// The generated code object, if generation already happened
    pub fn code(&self) -> Option<&CodeHandle> {
        self.code.get()
    }
}

unsafe impl<R: CallResult, G: CodeGenerator> CallHelper<R> for GeneratorRunner<'_, R, G> {
    fn context(&self) -> &ExecutionContext {
        self.context
    }

    fn signature(&self) -> &MachineSignature {
        self.signature
    }

    fn resolve_entry(&self) -> Address {
        match self.try_code() {
            Ok(code) => code.entry(),
            Err(e) => panic!("code generation for {} failed: {}", self.signature, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{Code, CodeWrapper};
    use crate::machine::MachineType;
    use crate::value::Value;
    use std::cell::Cell;

    type Binop = extern "C" fn(i32, i32) -> i32;

    extern "C" fn add(a: i32, b: i32) -> i32 {
        a.wrapping_add(b)
    }

    extern "C" fn sub(a: i32, b: i32) -> i32 {
        a.wrapping_sub(b)
    }

    extern "C" fn boxed_seven() -> u64 {
        Value::i32(7).raw()
    }

    fn handle(name: &str, entry: usize) -> CodeHandle {
        CodeHandle::new(unsafe { Code::from_entry(name, Address::new(entry), 0) })
    }

    fn binop_code(name: &str, f: Binop) -> CodeHandle {
        handle(name, f as usize)
    }

    fn binop() -> MachineSignature {
        MachineSignature::new(&[MachineType::Int32, MachineType::Int32], Some(MachineType::Int32))
    }

    fn failing(_: &ExecutionContext, _: &MachineSignature) -> Result<CodeHandle, CodegenError> {
        Err(CodegenError::Backend("no backend".to_string()))
    }

    #[test]
    fn test_code_runner_add() {
        let ctx = ExecutionContext::new("test");
        let sig = binop();
        let runner: CodeRunner<'_, i32> =
            unsafe { CodeRunner::new(&ctx, binop_code("add", add), &sig) };
        assert_eq!(runner.call((3, 4)), 7);
    }

    #[test]
    fn test_resolve_entry_is_idempotent() {
        let ctx = ExecutionContext::new("test");
        let sig = binop();
        let runner: CodeRunner<'_, i32> =
            unsafe { CodeRunner::new(&ctx, binop_code("add", add), &sig) };
        assert_eq!(runner.resolve_entry(), runner.resolve_entry());
        assert_eq!(ctx.invocations(), 0);
    }

    #[test]
    fn test_regenerated_entry_is_used() {
        let ctx = ExecutionContext::new("test");
        let sig = binop();
        let code = binop_code("op", add);
        let runner: CodeRunner<'_, i32> = unsafe { CodeRunner::new(&ctx, &code, &sig) };

        assert_eq!(runner.call((10, 3)), 13);
        unsafe { code.replace_entry(Address::new(sub as Binop as usize), 0) };
        assert_eq!(runner.call((10, 3)), 7);
    }

    #[test]
    fn test_wrapper_shape() {
        let ctx = ExecutionContext::new("test");
        let sig = binop();
        let code = binop_code("add", add);
        let runner: CodeRunner<'_, i32> =
            unsafe { CodeRunner::new(&ctx, CodeWrapper::new(code.clone()), &sig) };
        assert!(runner.code().ptr_eq(&code));
        assert_eq!(runner.call((1, 1)), 2);
    }

    #[test]
    fn test_boxed_result() {
        let ctx = ExecutionContext::new("test");
        let sig = MachineSignature::new(&[], Some(MachineType::AnyTagged));
        let entry = boxed_seven as extern "C" fn() -> u64 as usize;
        let runner: CodeRunner<'_, Value> =
            unsafe { CodeRunner::new(&ctx, handle("boxed", entry), &sig) };
        let value = runner.call(());
        assert_eq!(value, Value::i32(7));
        assert_eq!(value.raw(), Value::i32(7).raw());
    }

    #[test]
    fn test_generator_runs_once() {
        let ctx = ExecutionContext::new("test");
        let sig = binop();
        let generated = Cell::new(0);
        let generator = |_: &ExecutionContext, _: &MachineSignature| {
            generated.set(generated.get() + 1);
            Ok::<_, CodegenError>(binop_code("add", add))
        };
        let runner: GeneratorRunner<'_, i32, _> =
            unsafe { GeneratorRunner::new(&ctx, generator, &sig) };

        assert!(runner.code().is_none());
        assert_eq!(runner.call((2, 2)), 4);
        assert_eq!(runner.call((5, 2)), 7);
        assert_eq!(generated.get(), 1);
        assert!(runner.code().is_some());
    }

    #[test]
    fn test_generator_error() {
        let ctx = ExecutionContext::new("test");
        let sig = binop();
        let runner: GeneratorRunner<'_, i32, _> =
            unsafe { GeneratorRunner::new(&ctx, failing, &sig) };
        let err = runner.try_code().unwrap_err();
        assert_eq!(err.to_string(), "Backend error: no backend");
    }

    #[test]
    #[should_panic(expected = "code generation for (i32, i32) -> i32 failed")]
    fn test_generator_error_aborts_call() {
        let ctx = ExecutionContext::new("test");
        let sig = binop();
        let runner: GeneratorRunner<'_, i32, _> =
            unsafe { GeneratorRunner::new(&ctx, failing, &sig) };
        runner.call((1, 2));
    }
}
