//! Signature descriptors and call-site verification
//!
//! A [`MachineSignature`] lists the machine kinds a piece of generated code
//! expects for its parameters and returns. Call helpers check every call
//! site against it before jumping into the code: a mismatch is a bug in the
//! test, so [`MachineSignature::verify`] aborts instead of coercing.

use std::fmt;

use thiserror::Error;

use crate::call::CallResult;
use crate::generated::CallArgs;
use crate::machine::MachineType;

/// Mismatch between a signature and the static types of a call site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignatureMismatch {
    /// Wrong number of arguments
    #[error("signature declares {expected} parameter(s), call site passes {actual}")]
    Arity {
        /// Declared parameter count
        expected: usize,
        /// Number of arguments at the call site
        actual: usize,
    },

    /// A single argument has the wrong machine kind
    #[error("parameter {index}: signature declares {expected}, call site passes {actual}")]
    Parameter {
        /// Zero-based parameter index
        index: usize,
        /// Declared kind
        expected: MachineType,
        /// Kind of the call-site argument
        actual: MachineType,
    },

    /// The requested return type has the wrong machine kind
    #[error(
        "return: signature declares {}, call site expects {}",
        return_name(.expected),
        return_name(.actual)
    )]
    Return {
        /// Declared return kind (`None` for no return value)
        expected: Option<MachineType>,
        /// Return kind requested at the call site
        actual: Option<MachineType>,
    },
}

fn return_name(kind: &Option<MachineType>) -> String {
    match kind {
        Some(kind) => kind.to_string(),
        None => "void".to_string(),
    }
}

/// Parameter and return machine kinds of a generated function
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MachineSignature {
    params: Vec<MachineType>,
    ret: Option<MachineType>,
}

impl MachineSignature {
    /// Create a signature from parameter kinds and an optional return kind
    pub fn new(params: &[MachineType], ret: Option<MachineType>) -> Self {
        MachineSignature {
            params: params.to_vec(),
            ret,
        }
    }

    /// Create a signature with no return value
    pub fn void(params: &[MachineType]) -> Self {
        Self::new(params, None)
    }

    /// Derive the signature matching host argument tuple `A` and return type `R`
    pub fn of<A: CallArgs, R: CallResult>() -> Self {
        Self::new(A::TYPES, R::MACHINE_TYPE)
    }

    /// Number of declared parameters
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Kind of parameter `index`, if declared
    pub fn param(&self, index: usize) -> Option<MachineType> {
        self.params.get(index).copied()
    }

    /// All declared parameter kinds, in order
    pub fn params(&self) -> &[MachineType] {
        &self.params
    }

    /// Declared return kind (`None` for no return value)
    pub fn return_type(&self) -> Option<MachineType> {
        self.ret
    }

    /// Check the static types of a call site against this signature
    pub fn check<A: CallArgs, R: CallResult>(&self) -> Result<(), SignatureMismatch> {
        let actual = A::TYPES;
        if actual.len() != self.params.len() {
            return Err(SignatureMismatch::Arity {
                expected: self.params.len(),
                actual: actual.len(),
            });
        }

        for (index, (&expected, &actual)) in self.params.iter().zip(actual).enumerate() {
            if expected != actual {
                return Err(SignatureMismatch::Parameter {
                    index,
                    expected,
                    actual,
                });
            }
        }

        if self.ret != R::MACHINE_TYPE {
            return Err(SignatureMismatch::Return {
                expected: self.ret,
                actual: R::MACHINE_TYPE,
            });
        }

        Ok(())
    }

    /// Assert that a call site matches this signature.
    ///
    /// # Panics
    ///
    /// Panics on any mismatch. Must run before the generated code is entered.
    #[track_caller]
    pub fn verify<A: CallArgs, R: CallResult>(&self) {
        if let Err(mismatch) = self.check::<A, R>() {
            panic!("signature mismatch for {}: {}", self, mismatch);
        }
    }
}

impl fmt::Display for MachineSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param)?;
        }
        write!(f, ")")?;
        match self.ret {
            Some(ret) => write!(f, " -> {}", ret),
            None => Ok(()),
        }
    }
}
