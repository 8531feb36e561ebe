//! Cranelift code generation for call tests
//!
//! Produces [`Code`](crate::Code) objects from small Cranelift IR bodies so
//! tests can exercise the call bridge against real generated machine code:
//! - `abi`: machine kinds → Cranelift types, inline boxing of tagged values
//! - `JitCompiler`: compiles and re-compiles single-block functions
//! - `JitGenerator`: lazy [`CodeGenerator`](crate::CodeGenerator) for
//!   [`GeneratorRunner`](crate::GeneratorRunner)

pub mod abi;

mod compiler;
pub use compiler::{BodyFn, JitCompiler, JitConfig, JitGenerator, OptLevel};
