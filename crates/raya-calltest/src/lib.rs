//! Raya Call Tester
//!
//! Lets test code call machine code produced by a code generator as if it
//! were an ordinary typed Rust function:
//! - **Signatures**: machine kinds of parameters and returns, checked against
//!   every call site (`signature` module)
//! - **Call helpers**: verified, typed invocation with per-call entry
//!   resolution (`call` module)
//! - **Boxed results**: tagged runtime values rebuilt from the raw returned
//!   word (`Value`)
//! - **Entry providers**: runners over existing or lazily generated code
//!   objects (`runner` module)
//! - **JIT**: Cranelift-backed code generation for tests (optional, behind
//!   the "jit" feature)
//!
//! # Example
//!
//! ```rust,ignore
//! use raya_calltest::{CallHelper, CodeRunner, ExecutionContext, MachineSignature, MachineType};
//!
//! let ctx = ExecutionContext::new("test");
//! let params = [MachineType::Int32, MachineType::Int32];
//! let sig = MachineSignature::new(&params, Some(MachineType::Int32));
//! let runner: CodeRunner<'_, i32> = unsafe { CodeRunner::new(&ctx, code, &sig) };
//! assert_eq!(runner.call((3, 4)), 7);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod call;
pub mod code;
pub mod context;
pub mod error;
pub mod generated;
pub mod machine;
pub mod runner;
pub mod signature;
pub mod value;

/// JIT code generation module (optional, behind "jit" feature)
#[cfg(feature = "jit")]
pub mod jit;

pub use call::{CallHelper, CallResult};
pub use code::{Address, Code, CodeHandle, CodeWrapper, IntoCodeHandle};
pub use context::{CallScope, ExecutionContext};
pub use error::CodegenError;
pub use generated::{CallArgs, GeneratedCode};
pub use machine::{MachineRepr, MachineRepresentation, MachineType};
pub use runner::{CodeGenerator, CodeRunner, GeneratorRunner};
pub use signature::{MachineSignature, SignatureMismatch};
pub use value::Value;
