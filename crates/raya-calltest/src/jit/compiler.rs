//! Cranelift JIT compiler producing code objects for call tests

use std::cell::RefCell;

use cranelift_codegen::ir::{self, InstBuilder};
use cranelift_codegen::settings::{self, Configurable};
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext};
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{Linkage, Module};
use log::debug;
use target_lexicon::Triple;

use super::abi;
use crate::code::{Address, Code, CodeHandle};
use crate::context::ExecutionContext;
use crate::error::CodegenError;
use crate::runner::CodeGenerator;
use crate::signature::MachineSignature;

/// Cranelift optimization level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptLevel {
    /// No optimization
    None,
    /// Optimize for speed
    #[default]
    Speed,
    /// Optimize for speed and size
    SpeedAndSize,
}

impl OptLevel {
    fn as_setting(self) -> &'static str {
        match self {
            OptLevel::None => "none",
            OptLevel::Speed => "speed",
            OptLevel::SpeedAndSize => "speed_and_size",
        }
    }
}

/// Configuration for the JIT compiler
#[derive(Debug, Clone)]
pub struct JitConfig {
    /// Optimization level (default: speed)
    pub opt_level: OptLevel,
    /// Run the Cranelift IR verifier on every function (default: true)
    pub enable_verifier: bool,
}

impl Default for JitConfig {
    fn default() -> Self {
        JitConfig {
            opt_level: OptLevel::Speed,
            enable_verifier: true,
        }
    }
}

/// Compiles single-block functions into callable [`Code`] objects
///
/// Compiled code stays mapped for the lifetime of the process, so handles
/// may outlive the compiler.
pub struct JitCompiler {
    module: JITModule,
    ctx: cranelift_codegen::Context,
    builder_ctx: FunctionBuilderContext,
    compiled: u32,
}

impl JitCompiler {
    /// Create a compiler for the host with default configuration
    pub fn host() -> Result<Self, CodegenError> {
        Self::with_config(JitConfig::default())
    }

    /// Create a compiler for the host with custom configuration
    pub fn with_config(config: JitConfig) -> Result<Self, CodegenError> {
        let mut flag_builder = settings::builder();
        flag_builder
            .set("opt_level", config.opt_level.as_setting())
            .map_err(|e| CodegenError::Backend(format!("Failed to set opt_level: {}", e)))?;
        flag_builder
            .set("enable_verifier", if config.enable_verifier { "true" } else { "false" })
            .map_err(|e| CodegenError::Backend(format!("Failed to set enable_verifier: {}", e)))?;
        // cranelift-jit requires non-PIC code
        flag_builder
            .set("is_pic", "false")
            .map_err(|e| CodegenError::Backend(format!("Failed to set is_pic: {}", e)))?;

        let flags = settings::Flags::new(flag_builder);
        let isa = cranelift_native::builder()
            .map_err(|e| {
                CodegenError::Backend(format!("Failed to create native ISA builder: {}", e))
            })?
            .finish(flags)
            .map_err(|e| CodegenError::Backend(format!("Failed to finish ISA: {}", e)))?;

        debug!("JIT compiler for {} ({:?})", isa.triple(), config);

        let builder = JITBuilder::with_isa(isa, cranelift_module::default_libcall_names());
        let module = JITModule::new(builder);
        let ctx = module.make_context();

        Ok(JitCompiler {
            module,
            ctx,
            builder_ctx: FunctionBuilderContext::new(),
            compiled: 0,
        })
    }

    /// Target triple code is generated for
    pub fn triple(&self) -> &Triple {
        self.module.isa().triple()
    }

    /// Cranelift type of a pointer-sized word
    pub fn pointer_type(&self) -> ir::Type {
        self.module.target_config().pointer_type()
    }

    /// Compile a function implementing `signature` into a new code object.
    ///
    /// `body` receives the function parameters (one per signature parameter)
    /// and returns the values to return (one if the signature has a return
    /// kind, none otherwise).
    pub fn compile<F>(
        &mut self,
        name: &str,
        signature: &MachineSignature,
        body: F,
    ) -> Result<CodeHandle, CodegenError>
    where
        F: FnOnce(&mut FunctionBuilder<'_>, &[ir::Value]) -> Vec<ir::Value>,
    {
        let (entry, size) = self.define(name, signature, body)?;
        // Safety: finalized JIT memory is never unmapped
        let code = unsafe { Code::from_entry(name, entry, size) };
        Ok(CodeHandle::new(code))
    }

    /// Re-generate `code` with a new body and point it at the new entry.
    ///
    /// `signature` must be the signature the code object was built for.
    pub fn recompile_into<F>(
        &mut self,
        code: &Code,
        signature: &MachineSignature,
        body: F,
    ) -> Result<(), CodegenError>
    where
        F: FnOnce(&mut FunctionBuilder<'_>, &[ir::Value]) -> Vec<ir::Value>,
    {
        let (entry, size) = self.define(code.name(), signature, body)?;
        // Safety: same signature, finalized JIT memory is never unmapped
        unsafe { code.replace_entry(entry, size) };
        Ok(())
    }

    fn define<F>(
        &mut self,
        name: &str,
        signature: &MachineSignature,
        body: F,
    ) -> Result<(Address, usize), CodegenError>
    where
        F: FnOnce(&mut FunctionBuilder<'_>, &[ir::Value]) -> Vec<ir::Value>,
    {
        let call_conv = self.module.isa().default_call_conv();
        let clif_sig = abi::lower_signature(signature, call_conv, self.pointer_type());

        self.module.clear_context(&mut self.ctx);
        self.ctx.func.signature = clif_sig.clone();

        let built = {
            let mut builder = FunctionBuilder::new(&mut self.ctx.func, &mut self.builder_ctx);
            let block = builder.create_block();
            builder.append_block_params_for_function_params(block);
            builder.switch_to_block(block);
            builder.seal_block(block);

            let params = builder.block_params(block).to_vec();
            let results = body(&mut builder, &params);
            let expected = usize::from(signature.return_type().is_some());
            if results.len() == expected {
                builder.ins().return_(&results);
                builder.finalize();
                Ok(())
            } else {
                Err(CodegenError::InvalidCode(format!(
                    "'{}' returns {} value(s), signature {} needs {}",
                    name,
                    results.len(),
                    signature,
                    expected
                )))
            }
        };
        if let Err(e) = built {
            // An unfinished builder leaves its context dirty
            self.builder_ctx = FunctionBuilderContext::new();
            return Err(e);
        }

        // Symbols must be unique per module; regenerated code gets a fresh one
        let symbol = format!("{}.{}", name, self.compiled);
        self.compiled += 1;

        let func_id = self
            .module
            .declare_function(&symbol, Linkage::Local, &clif_sig)
            .map_err(|e| CodegenError::Backend(format!("Failed to declare '{}': {}", symbol, e)))?;
        self.module
            .define_function(func_id, &mut self.ctx)
            .map_err(|e| CodegenError::Backend(format!("Failed to define '{}': {:?}", symbol, e)))?;
        let size = self
            .ctx
            .compiled_code()
            .map(|code| code.code_buffer().len())
            .unwrap_or(0);
        self.module.clear_context(&mut self.ctx);
        self.module
            .finalize_definitions()
            .map_err(|e| CodegenError::Backend(format!("Failed to finalize '{}': {}", symbol, e)))?;

        let entry = Address::from_ptr(self.module.get_finalized_function(func_id));
        debug!("compiled '{}' {} at {} ({} bytes)", symbol, signature, entry, size);
        Ok((entry, size))
    }
}

/// Body emitter used by [`JitGenerator`]
pub type BodyFn = dyn Fn(&mut FunctionBuilder<'_>, &[ir::Value]) -> Vec<ir::Value>;

/// A [`CodeGenerator`] that JIT-compiles a fixed body on demand
pub struct JitGenerator {
    compiler: RefCell<JitCompiler>,
    name: String,
    body: Box<BodyFn>,
}

impl JitGenerator {
    /// Create a generator compiling `body` under `name`
    pub fn new<F>(compiler: JitCompiler, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut FunctionBuilder<'_>, &[ir::Value]) -> Vec<ir::Value> + 'static,
    {
        JitGenerator {
            compiler: RefCell::new(compiler),
            name: name.into(),
            body: Box::new(body),
        }
    }
}

impl CodeGenerator for JitGenerator {
    fn generate(
        &self,
        context: &ExecutionContext,
        signature: &MachineSignature,
    ) -> Result<CodeHandle, CodegenError> {
        debug!("[{}] JIT generating '{}'", context.name(), self.name);
        self.compiler
            .borrow_mut()
            .compile(&self.name, signature, |builder, params| (self.body)(builder, params))
    }
}
